use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};

use crate::models::Copyright;

/// Comment block prepended to stamped files
pub fn copyright_header(copyright: &Copyright) -> String {
    format!(
        "/*\n{} {}\n{}\n*/\n",
        copyright.name, copyright.version, copyright.text
    )
}

/// Prefix `content` with the header, or return it untouched when there is none
pub fn stamp(content: &str, copyright: Option<&Copyright>) -> String {
    match copyright {
        Some(copyright) => copyright_header(copyright) + content,
        None => content.to_string(),
    }
}

/// Picks the core or application copyright for a shipped file.
///
/// Files under the runtime framework directory carry the core copyright,
/// everything else carries the application's.
#[derive(Debug, Clone, Default)]
pub struct CopyrightStamper {
    runtime_dir: Utf8PathBuf,
    core: Option<Copyright>,
    app: Option<Copyright>,
}

impl CopyrightStamper {
    pub fn new(
        runtime_dir: impl Into<Utf8PathBuf>,
        core: Option<Copyright>,
        app: Option<Copyright>,
    ) -> Self {
        Self {
            runtime_dir: runtime_dir.into(),
            core,
            app,
        }
    }

    /// Copyright for a path relative to the output root
    pub fn for_path(&self, relative: &Utf8Path) -> Option<&Copyright> {
        if relative.starts_with(&self.runtime_dir) {
            self.core.as_ref()
        } else {
            self.app.as_ref()
        }
    }

    /// Rewrite `output_root/relative` in place with its header.
    ///
    /// Returns whether a header was written.
    pub async fn stamp_file(&self, output_root: &Utf8Path, relative: &Utf8Path) -> Result<bool> {
        let Some(copyright) = self.for_path(relative) else {
            return Ok(false);
        };

        let path = output_root.join(relative);
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {} for stamping", path))?;
        tokio::fs::write(&path, stamp(&content, Some(copyright)))
            .await
            .with_context(|| format!("Failed to stamp {}", path))?;

        tracing::debug!("Stamped {} with {} {}", relative, copyright.name, copyright.version);
        Ok(true)
    }
}
