//! Leaf compilers: independent text transforms applied to source files.
//!
//! Every compiler is built from a [`Source`], either a file below the project
//! root (read asynchronously on first use) or literal content, and exposes a
//! single `parse()` that resolves exactly once with the transformed text.
//!
//! - [`MarkupCompiler`]: `{$basepath}` substitution and `{css}...{/css}` islands
//! - [`StyleCompiler`]: comment stripping and whitespace folding
//! - [`TemplateCompiler`]: `{$basepath}` substitution for non-markup text
//! - [`ModuleCompiler`]: module wrapping for shipped scripts
//! - [`RoutesCompiler`]: routing table compaction
//! - [`LocaleCompiler`]: one translation bundle per locale

pub mod locale;
pub mod markup;
pub mod module;
pub mod routes;
pub mod style;
pub mod template;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

pub use locale::LocaleCompiler;
pub use markup::MarkupCompiler;
pub use module::ModuleCompiler;
pub use routes::RoutesCompiler;
pub use style::{StyleCompiler, StyleTransform};
pub use template::TemplateCompiler;

/// Errors raised by leaf compilers
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid locale file {path}: {source}")]
    InvalidLocaleFile {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("style compilation failed: {0}")]
    Style(String),
}

/// Input of a leaf compiler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// File read on first use
    File(Utf8PathBuf),
    /// Literal content, used as-is
    Content(String),
}

impl Source {
    pub fn file(path: impl Into<Utf8PathBuf>) -> Self {
        Source::File(path.into())
    }

    pub fn content(text: impl Into<String>) -> Self {
        Source::Content(text.into())
    }

    /// Path of a file source
    pub fn path(&self) -> Option<&Utf8Path> {
        match self {
            Source::File(path) => Some(path),
            Source::Content(_) => None,
        }
    }

    pub async fn load(&self) -> Result<String, CompileError> {
        match self {
            Source::File(path) => {
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| CompileError::Read {
                        path: path.clone(),
                        source,
                    })
            }
            Source::Content(text) => Ok(text.clone()),
        }
    }
}
