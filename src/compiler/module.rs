use camino::Utf8PathBuf;

use super::Source;

/// Wraps shipped scripts so their top-level bindings stay module-local.
///
/// Debug builds keep the text untouched and tag it with a `sourceURL`
/// pointing at the original file instead.
#[derive(Debug, Clone)]
pub struct ModuleCompiler {
    source: Source,
    debug: bool,
    source_url: Option<Utf8PathBuf>,
}

impl ModuleCompiler {
    pub fn new(source: Source) -> Self {
        let source_url = source.path().map(|path| path.to_path_buf());
        Self {
            source,
            debug: false,
            source_url,
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Path reported in debug builds (defaults to the source file)
    pub fn with_source_url(mut self, url: impl Into<Utf8PathBuf>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub async fn parse(&self) -> anyhow::Result<String> {
        let content = self.source.load().await?;
        Ok(self.wrap(&content))
    }

    fn wrap(&self, content: &str) -> String {
        let body = content.trim_end();

        if self.debug {
            return match &self.source_url {
                Some(url) => format!("{}\n//# sourceURL={}\n", body, url),
                None => format!("{}\n", body),
            };
        }

        if is_wrapped(body) {
            format!("{}\n", body)
        } else {
            format!("(function () {{\n{}\n}})();\n", body)
        }
    }
}

/// Already an immediately-invoked function expression
fn is_wrapped(body: &str) -> bool {
    let code = body
        .lines()
        .map(str::trim_start)
        .find(|line| !is_blank_or_comment(line));
    matches!(code, Some(line) if line.starts_with("(function"))
}

fn is_blank_or_comment(line: &str) -> bool {
    line.is_empty() || line.starts_with("//") || line.starts_with("/*") || line.starts_with('*')
}
