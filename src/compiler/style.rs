use regex::Regex;

use super::{CompileError, Source};

/// Synchronous style text transform.
///
/// Split out of [`StyleCompiler`] so the markup compiler can run it on
/// in-memory islands and tests can substitute it.
#[cfg_attr(test, mockall::automock)]
pub trait StyleTransform: Send + Sync {
    fn transform(&self, style: &str) -> Result<String, CompileError>;
}

/// Compacts style sheets: strips comments and folds whitespace
#[derive(Debug, Clone)]
pub struct StyleCompiler {
    source: Source,
    minifier: StyleMinifier,
}

impl StyleCompiler {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            minifier: StyleMinifier::new(),
        }
    }

    pub async fn parse(&self) -> anyhow::Result<String> {
        let content = self.source.load().await?;
        Ok(self.minifier.transform(&content)?)
    }
}

/// The [`StyleTransform`] used by [`StyleCompiler`]
#[derive(Debug, Clone)]
pub struct StyleMinifier {
    comment_pattern: Regex,
    whitespace_pattern: Regex,
    punctuation_pattern: Regex,
    /// Whitespace after `:` only; before it, a space separates a pseudo-class
    colon_pattern: Regex,
}

impl StyleMinifier {
    pub fn new() -> Self {
        Self {
            comment_pattern: Regex::new(r"(?s)/\*.*?\*/").expect("Invalid comment regex"),
            whitespace_pattern: Regex::new(r"\s+").expect("Invalid whitespace regex"),
            punctuation_pattern: Regex::new(r"\s*([{};,>])\s*")
                .expect("Invalid punctuation regex"),
            colon_pattern: Regex::new(r":\s+").expect("Invalid colon regex"),
        }
    }
}

impl Default for StyleMinifier {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleTransform for StyleMinifier {
    fn transform(&self, style: &str) -> Result<String, CompileError> {
        let without_comments = self.comment_pattern.replace_all(style, "");
        let folded = self.whitespace_pattern.replace_all(&without_comments, " ");
        let tight = self.punctuation_pattern.replace_all(&folded, "$1");
        let tight = self.colon_pattern.replace_all(&tight, ":");
        Ok(tight.trim().replace(";}", "}"))
    }
}
