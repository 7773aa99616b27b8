use std::sync::Arc;

use regex::Regex;

use super::style::{StyleMinifier, StyleTransform};
use super::template::BasepathToken;
use super::{CompileError, Source};

/// Stand-in for `\n` while islands are matched as single-line units
const LINE_BREAK_SENTINEL: &str = "[[__BR__]]";

/// Compiles markup: substitutes `{$basepath}` and compiles every
/// `{css}...{/css}` style island in place.
#[derive(Clone)]
pub struct MarkupCompiler {
    source: Source,
    basepath: Option<String>,
    style: Arc<dyn StyleTransform>,
    token: BasepathToken,
    island_pattern: Regex,
}

impl std::fmt::Debug for MarkupCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkupCompiler")
            .field("source", &self.source)
            .field("basepath", &self.basepath)
            .finish_non_exhaustive()
    }
}

impl MarkupCompiler {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            basepath: None,
            style: Arc::new(StyleMinifier::new()),
            token: BasepathToken::new(),
            island_pattern: Regex::new(r"(?i)\{css\}(.*?)\{/css\}")
                .expect("Invalid style island regex"),
        }
    }

    pub fn with_basepath(mut self, basepath: impl Into<String>) -> Self {
        self.basepath = Some(basepath.into());
        self
    }

    pub fn with_style_transform(mut self, style: Arc<dyn StyleTransform>) -> Self {
        self.style = style;
        self
    }

    /// Configured base path, or the source file's directory
    pub fn basepath(&self) -> String {
        if let Some(basepath) = &self.basepath {
            return basepath.clone();
        }
        match self.source.path().and_then(|path| path.parent()) {
            Some(dir) if !dir.as_str().is_empty() => {
                let mut collapsed = String::with_capacity(dir.as_str().len());
                for c in dir.as_str().chars() {
                    if c == '/' && collapsed.ends_with('/') {
                        continue;
                    }
                    collapsed.push(c);
                }
                let trimmed = collapsed.trim_end_matches('/');
                if trimmed.is_empty() {
                    "/".to_string()
                } else {
                    trimmed.to_string()
                }
            }
            _ => "/".to_string(),
        }
    }

    pub async fn parse(&self) -> anyhow::Result<String> {
        let content = self.source.load().await?;
        Ok(self.compile(&content)?)
    }

    /// Run the markup transform on already-loaded text
    pub fn compile(&self, content: &str) -> Result<String, CompileError> {
        let substituted = self.token.substitute(content, &self.basepath());
        let mut document = substituted.replace('\n', LINE_BREAK_SENTINEL);

        // One island at a time; scanning resumes after each substitution so
        // compiled output is never rescanned
        let mut cursor = 0;
        while let Some((range, inner)) = self.next_island(&document, cursor) {
            let compiled = self
                .style
                .transform(&inner.replace(LINE_BREAK_SENTINEL, "\n"))?;
            document.replace_range(range.clone(), &compiled);
            cursor = range.start + compiled.len();
        }

        Ok(document.replace(LINE_BREAK_SENTINEL, "\n"))
    }

    fn next_island(&self, document: &str, from: usize) -> Option<(std::ops::Range<usize>, String)> {
        let captures = self.island_pattern.captures_at(document, from)?;
        let whole = captures.get(0)?;
        let inner = captures.get(1).map_or("", |m| m.as_str());
        Some((whole.range(), inner.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::style::MockStyleTransform;
    use mockall::predicate::eq;

    #[test]
    fn test_plain_markup_is_unchanged() {
        let text = "<html>\n  <body>\n    <p>Hello</p>\n  </body>\n</html>\n";
        let compiler = MarkupCompiler::new(Source::content(text)).with_basepath("/x");
        assert_eq!(compiler.compile(text).unwrap(), text);
    }

    #[test]
    fn test_island_and_basepath_are_replaced() {
        let mut style = MockStyleTransform::new();
        style
            .expect_transform()
            .with(eq("\n.a {\n  color: red;\n}\n"))
            .times(1)
            .returning(|_| Ok(".a{color:red}".to_string()));

        let text = "<head>\n<link href=\"{$basepath}/main.css\">\n<style>{css}\n.a {\n  color: red;\n}\n{/css}</style>\n</head>\n";
        let compiler = MarkupCompiler::new(Source::content(text))
            .with_basepath("/static/7")
            .with_style_transform(Arc::new(style));

        assert_eq!(
            compiler.compile(text).unwrap(),
            "<head>\n<link href=\"/static/7/main.css\">\n<style>.a{color:red}</style>\n</head>\n"
        );
    }

    #[test]
    fn test_every_island_is_compiled_in_order() {
        let mut style = MockStyleTransform::new();
        let mut sequence = mockall::Sequence::new();
        style
            .expect_transform()
            .with(eq("one"))
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Ok("1".to_string()));
        style
            .expect_transform()
            .with(eq("two"))
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Ok("2".to_string()));

        let text = "{CSS}one{/CSS}\n-\n{css}two{/css}";
        let compiler = MarkupCompiler::new(Source::content(text))
            .with_basepath("")
            .with_style_transform(Arc::new(style));

        assert_eq!(compiler.compile(text).unwrap(), "1\n-\n2");
    }

    #[test]
    fn test_compiled_output_is_not_rescanned() {
        let mut style = MockStyleTransform::new();
        style
            .expect_transform()
            .times(1)
            .returning(|_| Ok("{css}x{/css}".to_string()));

        let text = "{css}a{/css}";
        let compiler = MarkupCompiler::new(Source::content(text))
            .with_basepath("")
            .with_style_transform(Arc::new(style));

        assert_eq!(compiler.compile(text).unwrap(), "{css}x{/css}");
    }

    #[test]
    fn test_style_errors_propagate() {
        let mut style = MockStyleTransform::new();
        style
            .expect_transform()
            .returning(|_| Err(CompileError::Style("bad rule".to_string())));

        let text = "{css}??{/css}";
        let compiler = MarkupCompiler::new(Source::content(text))
            .with_basepath("")
            .with_style_transform(Arc::new(style));

        assert!(matches!(compiler.compile(text), Err(CompileError::Style(_))));
    }

    #[test]
    fn test_default_basepath_from_source() {
        let compiler = MarkupCompiler::new(Source::file("views//main/index.html"));
        assert_eq!(compiler.basepath(), "views/main");

        let compiler = MarkupCompiler::new(Source::file("index.html"));
        assert_eq!(compiler.basepath(), "/");

        let compiler = MarkupCompiler::new(Source::content("<p/>"));
        assert_eq!(compiler.basepath(), "/");
    }

    #[tokio::test]
    async fn test_parse_uses_real_style_compiler() {
        let compiler =
            MarkupCompiler::new(Source::content("<style>{css}p {\n margin: 0;\n}{/css}</style>"))
                .with_basepath("/b");
        assert_eq!(compiler.parse().await.unwrap(), "<style>p{margin:0}</style>");
    }
}
