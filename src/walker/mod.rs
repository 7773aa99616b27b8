//! Generic asynchronous source tree walker.
//!
//! [`TreeWalker::fetch`] lists every root directory, recurses into
//! subdirectories and hands every plain file (and every explicitly listed
//! file) to a [`FileHandler`]. Each directory listing, each entry and each
//! explicit file is one branch of a [`JoinBarrier`]; subdirectories found
//! while listing add branches on the fly, and the traversal resolves once
//! every branch ever started has reported back.
//!
//! The walker has no file-type knowledge. Handlers return an optional value
//! per file which is collected and returned with the [`Traversal`].
//!
//! ```text
//! fetch(dirs, files)
//!   ├─ dir  ──► read_dir ──► entry ──► metadata ─┬─► dir  ──► read_dir ...
//!   │                                            └─► file ──► FileHandler::handle
//!   └─ file ──────────────────────────────────────────────► FileHandler::handle
//! ```

pub mod barrier;

use std::future::Future;
use std::io;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

pub use barrier::{BarrierStats, BranchGuard, JoinBarrier};

/// Errors raised by the walker itself (handler errors pass through untouched)
#[derive(Error, Debug)]
pub enum WalkError {
    #[error("[io] source directory does not exist: {0}")]
    MissingDirectory(Utf8PathBuf),

    #[error("[io] failed to read {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("path is not valid UTF-8: {0}")]
    NonUtf8Path(String),

    #[error("a traversal branch panicked")]
    BranchPanicked,
}

/// Root directories and explicit files of one traversal, relative to the project root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceTree {
    dirs: Vec<Utf8PathBuf>,
    files: Vec<Utf8PathBuf>,
}

impl SourceTree {
    pub fn new<D, F>(dirs: D, files: F) -> Self
    where
        D: IntoIterator,
        D::Item: Into<Utf8PathBuf>,
        F: IntoIterator,
        F::Item: Into<Utf8PathBuf>,
    {
        Self {
            dirs: dirs.into_iter().map(Into::into).collect(),
            files: files.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_dirs<D>(dirs: D) -> Self
    where
        D: IntoIterator,
        D::Item: Into<Utf8PathBuf>,
    {
        Self::new(dirs, Vec::<Utf8PathBuf>::new())
    }

    pub fn dirs(&self) -> &[Utf8PathBuf] {
        &self.dirs
    }

    pub fn files(&self) -> &[Utf8PathBuf] {
        &self.files
    }
}

/// Per-file hook invoked by the walker.
///
/// `path` is relative to the walker's project root. Returning `Ok(None)`
/// completes the branch without producing a value; returning an error
/// aborts the traversal.
pub trait FileHandler: Send + Sync + 'static {
    type Output: Send + 'static;

    fn handle(
        &self,
        path: Utf8PathBuf,
    ) -> impl Future<Output = Result<Option<Self::Output>>> + Send;
}

/// Result of a completed traversal
#[derive(Debug)]
pub struct Traversal<T> {
    /// Handler outputs in completion order
    pub outputs: Vec<T>,
    pub stats: BarrierStats,
}

/// Walks source trees below a project root
#[derive(Debug)]
pub struct TreeWalker<H> {
    project_root: Utf8PathBuf,
    handler: Arc<H>,
}

impl<H> Clone for TreeWalker<H> {
    fn clone(&self) -> Self {
        Self {
            project_root: self.project_root.clone(),
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<H: FileHandler> TreeWalker<H> {
    pub fn new(project_root: impl Into<Utf8PathBuf>, handler: H) -> Self {
        Self {
            project_root: project_root.into(),
            handler: Arc::new(handler),
        }
    }

    pub fn project_root(&self) -> &Utf8Path {
        &self.project_root
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Traverse `tree` and resolve once every branch has reported back
    pub async fn fetch(&self, tree: &SourceTree) -> Result<Traversal<H::Output>> {
        let walk = Arc::new(Walk {
            project_root: self.project_root.clone(),
            handler: Arc::clone(&self.handler),
            barrier: JoinBarrier::new(),
            outputs: Mutex::new(Vec::new()),
        });

        tracing::debug!(
            "Fetching {} directories and {} files below {}",
            tree.dirs().len(),
            tree.files().len(),
            self.project_root
        );

        // Held while seeding so the barrier cannot reach zero early, and so
        // an empty tree still resolves
        let seed = walk.barrier.enter();
        for dir in tree.dirs() {
            let guard = walk.barrier.enter();
            walk.spawn_dir(dir.clone(), guard);
        }
        for file in tree.files() {
            let guard = walk.barrier.enter();
            walk.spawn_file(file.clone(), guard);
        }
        seed.complete();

        let stats = walk.barrier.wait().await?;
        let outputs = std::mem::take(
            &mut *walk
                .outputs
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );

        tracing::debug!(
            "Traversal complete: {} branches, {} outputs",
            stats.completed,
            outputs.len()
        );

        Ok(Traversal { outputs, stats })
    }
}

/// Shared state of one traversal
struct Walk<H: FileHandler> {
    project_root: Utf8PathBuf,
    handler: Arc<H>,
    barrier: JoinBarrier,
    outputs: Mutex<Vec<H::Output>>,
}

impl<H: FileHandler> Walk<H> {
    fn spawn_dir(self: &Arc<Self>, path: Utf8PathBuf, guard: BranchGuard) {
        let walk = Arc::clone(self);
        tokio::spawn(async move {
            if walk.barrier.is_aborted() {
                return;
            }
            match walk.list_dir(&path).await {
                Ok(()) => guard.complete(),
                Err(e) => guard.fail(e),
            }
        });
    }

    fn spawn_file(self: &Arc<Self>, path: Utf8PathBuf, guard: BranchGuard) {
        let walk = Arc::clone(self);
        tokio::spawn(async move {
            if walk.barrier.is_aborted() {
                return;
            }
            match walk.handle_file(path).await {
                Ok(()) => guard.complete(),
                Err(e) => guard.fail(e),
            }
        });
    }

    fn spawn_entry(self: &Arc<Self>, path: Utf8PathBuf, guard: BranchGuard) {
        let walk = Arc::clone(self);
        tokio::spawn(async move {
            if walk.barrier.is_aborted() {
                return;
            }
            match walk.visit_entry(path).await {
                Ok(()) => guard.complete(),
                Err(e) => guard.fail(e),
            }
        });
    }

    /// Stat one directory entry, then recurse or dispatch it
    async fn visit_entry(self: &Arc<Self>, path: Utf8PathBuf) -> Result<()> {
        let absolute = self.project_root.join(&path);
        let metadata = tokio::fs::metadata(&absolute)
            .await
            .map_err(|source| WalkError::Io {
                path: absolute.clone(),
                source,
            })?;

        if metadata.is_dir() {
            self.list_dir(&path).await
        } else if metadata.is_file() {
            self.handle_file(path).await
        } else {
            tracing::debug!("Ignoring special file {}", path);
            Ok(())
        }
    }

    async fn list_dir(self: &Arc<Self>, path: &Utf8Path) -> Result<()> {
        let absolute = self.project_root.join(path);
        let mut entries = tokio::fs::read_dir(&absolute)
            .await
            .map_err(|source| match source.kind() {
                io::ErrorKind::NotFound => WalkError::MissingDirectory(absolute.clone()),
                _ => WalkError::Io {
                    path: absolute.clone(),
                    source,
                },
            })?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| WalkError::Io {
                path: absolute.clone(),
                source,
            })?
        {
            let name = entry.file_name();
            let name = name
                .to_str()
                .ok_or_else(|| WalkError::NonUtf8Path(name.to_string_lossy().into_owned()))?;

            // Dotfiles are not branches
            if name.starts_with('.') {
                continue;
            }

            let guard = self.barrier.enter();
            self.spawn_entry(path.join(name), guard);
        }

        Ok(())
    }

    async fn handle_file(&self, path: Utf8PathBuf) -> Result<()> {
        if let Some(output) = self.handler.handle(path).await? {
            self.outputs
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(output);
        }
        Ok(())
    }
}
