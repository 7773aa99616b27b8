use regex::{NoExpand, Regex};

use super::Source;

/// Case-insensitive `{$basepath}` token
#[derive(Debug, Clone)]
pub struct BasepathToken {
    pattern: Regex,
}

impl BasepathToken {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(r"(?i)\{\$basepath\}").expect("Invalid basepath token regex"),
        }
    }

    /// Replace every token in `text` with `basepath`
    pub fn substitute(&self, text: &str, basepath: &str) -> String {
        self.pattern
            .replace_all(text, NoExpand(basepath))
            .into_owned()
    }
}

impl Default for BasepathToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Path-token templating for non-markup text such as scripts
#[derive(Debug, Clone)]
pub struct TemplateCompiler {
    source: Source,
    basepath: String,
    token: BasepathToken,
}

impl TemplateCompiler {
    pub fn new(source: Source, basepath: impl Into<String>) -> Self {
        Self {
            source,
            basepath: basepath.into(),
            token: BasepathToken::new(),
        }
    }

    pub async fn parse(&self) -> anyhow::Result<String> {
        let content = self.source.load().await?;
        Ok(self.token.substitute(&content, &self.basepath))
    }
}
