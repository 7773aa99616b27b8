use camino::Utf8Path;
use glob::{MatchOptions, Pattern};
use thiserror::Error;

#[derive(Error, Debug)]
#[error("invalid exclusion pattern '{pattern}': {source}")]
pub struct ExclusionError {
    pub pattern: String,
    #[source]
    pub source: glob::PatternError,
}

/// `*` never crosses a path separator
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Compile an exclusion pattern: literal text plus `*`.
///
/// Runs of `*` collapse to one, and every other glob metacharacter
/// (`?`, `[`, `]`) is escaped so it only matches itself.
fn literal_glob(pattern: &str) -> Result<Pattern, glob::PatternError> {
    let mut collapsed = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if c == '*' && collapsed.ends_with('*') {
            continue;
        }
        collapsed.push(c);
    }

    let escaped = collapsed
        .split('*')
        .map(Pattern::escape)
        .collect::<Vec<_>>()
        .join("*");
    Pattern::new(&escaped)
}

/// Set of exclusion patterns matched against whole relative paths
#[derive(Debug, Clone, Default)]
pub struct ExclusionRules {
    patterns: Vec<Pattern>,
}

impl ExclusionRules {
    pub fn new<I, S>(patterns: I) -> Result<Self, ExclusionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                literal_glob(pattern).map_err(|source| ExclusionError {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Extend with more patterns (e.g. a fixed ignore list)
    pub fn with_patterns<I, S>(mut self, patterns: I) -> Result<Self, ExclusionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.patterns.extend(Self::new(patterns)?.patterns);
        Ok(self)
    }

    pub fn is_excluded(&self, path: &Utf8Path) -> bool {
        self.patterns
            .iter()
            .any(|pattern| pattern.matches_with(path.as_str(), MATCH_OPTIONS))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
