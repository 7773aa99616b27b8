use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};

use crate::models::{BuildContext, BundleConfig};

/// Redirects a source subtree to another root of the build directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleRelocation {
    pub source_prefix: Utf8PathBuf,
    /// Absolute root the subtree lands in
    pub destination_root: Utf8PathBuf,
}

impl BundleRelocation {
    /// Component-wise prefix match
    pub fn matches(&self, path: &Utf8Path) -> bool {
        path.starts_with(&self.source_prefix)
    }
}

/// Maps relative source paths to absolute output paths.
///
/// Files mirror their source path below the build's output root, unless a
/// bundle relocation claims their prefix; then the relocation's root is used
/// with the same relative path. When several relocations match, the last
/// configured one wins.
#[derive(Debug, Clone)]
pub struct DestinationResolver {
    build_dir: Utf8PathBuf,
    output_root: Utf8PathBuf,
    relocations: Vec<BundleRelocation>,
}

impl DestinationResolver {
    pub fn new(ctx: &BuildContext, bundles: &[BundleConfig]) -> Self {
        let relocations = bundles
            .iter()
            .filter_map(|bundle| {
                bundle.destination.as_ref().map(|destination| BundleRelocation {
                    source_prefix: bundle.path.clone(),
                    destination_root: ctx.build_dir.join(destination),
                })
            })
            .collect();

        Self {
            build_dir: ctx.build_dir.clone(),
            output_root: ctx.output_root.clone(),
            relocations,
        }
    }

    pub fn relocations(&self) -> &[BundleRelocation] {
        &self.relocations
    }

    /// Output root for `path`: a relocation's destination or the build's output root
    pub fn root_for(&self, path: &Utf8Path) -> &Utf8Path {
        self.relocations
            .iter()
            .rev()
            .find(|relocation| relocation.matches(path))
            .map_or(&self.output_root, |relocation| &relocation.destination_root)
    }

    pub fn resolve(&self, path: &Utf8Path) -> Utf8PathBuf {
        self.root_for(path).join(path)
    }

    /// Markup at the project root is written beside the build directories
    pub fn resolve_markup(&self, path: &Utf8Path) -> Utf8PathBuf {
        if path.components().count() == 1 {
            self.build_dir.join(path)
        } else {
            self.resolve(path)
        }
    }

    /// Create the parent directories of `destination`
    pub async fn prepare(&self, destination: &Utf8Path) -> Result<()> {
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create output directory {}", parent))?;
        }
        Ok(())
    }
}
