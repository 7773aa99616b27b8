use std::io;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tokio::task::JoinSet;

use super::classify::FileKind;
use super::copyright::CopyrightStamper;
use super::destination::DestinationResolver;
use super::exclusion::ExclusionRules;
use super::maker::ModuleMaker;
use crate::compiler::{
    LocaleCompiler, MarkupCompiler, ModuleCompiler, RoutesCompiler, Source, StyleCompiler,
    TemplateCompiler,
};
use crate::config::ConfigManager;
use crate::metrics::BuildMetrics;
use crate::models::{AppDescriptor, BuildContext, BuildSettings, BuildVariant, CoreDescriptor};
use crate::state::{BuildPhase, StateManager};
use crate::walker::{FileHandler, SourceTree, TreeWalker};

/// Generated and descriptor files of the config root, never shipped as-is
pub const IGNORED_CONFIG_FILES: [&str; 5] = [
    "config.js",
    "tconfig.js",
    "app_config.json",
    "dev_config.json",
    "tests_config.json",
];

/// Roots contributing modules to the loader document (plus the config root)
const MANIFEST_ROOTS: [&str; 3] = ["locales", "plugins", "views"];

/// Locale sources below the project root and bundles below the output root
const LOCALES_DIR: &str = "locales";

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("[io] {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("build directory {0} contains the project sources, refusing to clean it")]
    BuildDirContainsProject(Utf8PathBuf),

    #[error("locale compilation task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// What the build traversal did with one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Compiled { destination: Utf8PathBuf },
    Copied { destination: Utf8PathBuf },
    /// Tests and template partials
    Skipped,
    Excluded,
}

/// Leaf compiler pipeline applied to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transform {
    Routes,
    /// Path-token templating, then module wrapping
    Module,
    Style,
    Markup,
}

/// Per-file compile/copy dispatch of the build traversal
#[derive(Debug)]
pub struct FileDispatcher {
    project_root: Utf8PathBuf,
    ctx: BuildContext,
    destinations: DestinationResolver,
    exclusions: ExclusionRules,
    metrics: Arc<BuildMetrics>,
}

impl FileDispatcher {
    pub fn new(
        project_root: impl Into<Utf8PathBuf>,
        ctx: BuildContext,
        destinations: DestinationResolver,
        exclusions: ExclusionRules,
        metrics: Arc<BuildMetrics>,
    ) -> Self {
        Self {
            project_root: project_root.into(),
            ctx,
            destinations,
            exclusions,
            metrics,
        }
    }

    async fn compile(&self, path: &Utf8Path, transform: Transform) -> Result<String> {
        let source = Source::file(self.project_root.join(path));
        match transform {
            Transform::Routes => RoutesCompiler::new(source).parse().await,
            Transform::Module => {
                // Templated first, then wrapped
                let templated = TemplateCompiler::new(source, &self.ctx.base_path)
                    .parse()
                    .await?;
                ModuleCompiler::new(Source::content(templated))
                    .with_debug(self.ctx.debug)
                    .with_source_url(path)
                    .parse()
                    .await
            }
            Transform::Style => StyleCompiler::new(source).parse().await,
            Transform::Markup => {
                MarkupCompiler::new(source)
                    .with_basepath(&self.ctx.base_path)
                    .parse()
                    .await
            }
        }
    }

    async fn write_compiled(&self, path: Utf8PathBuf, transform: Transform) -> Result<FileOutcome> {
        let started = Instant::now();
        let content = self
            .compile(&path, transform)
            .await
            .with_context(|| format!("Failed to compile {}", path))?;

        let destination = match transform {
            Transform::Markup => self.destinations.resolve_markup(&path),
            _ => self.destinations.resolve(&path),
        };
        self.destinations.prepare(&destination).await?;
        tokio::fs::write(&destination, &content)
            .await
            .with_context(|| format!("Failed to write {}", destination))?;

        self.metrics.record_compiled(content.len(), started.elapsed());
        tracing::debug!("Compiled {} -> {}", path, destination);
        Ok(FileOutcome::Compiled { destination })
    }

    async fn copy(&self, path: Utf8PathBuf) -> Result<FileOutcome> {
        let destination = self.destinations.resolve(&path);
        self.destinations.prepare(&destination).await?;

        let source = self.project_root.join(&path);
        let bytes = tokio::fs::copy(&source, &destination)
            .await
            .with_context(|| format!("Failed to copy {} to {}", source, destination))?;

        self.metrics.record_copied(bytes);
        tracing::debug!("Copied {} -> {}", path, destination);
        Ok(FileOutcome::Copied { destination })
    }
}

impl FileHandler for FileDispatcher {
    type Output = FileOutcome;

    async fn handle(&self, path: Utf8PathBuf) -> Result<Option<FileOutcome>> {
        if self.exclusions.is_excluded(&path) {
            tracing::debug!("Excluded {}", path);
            self.metrics.record_excluded();
            return Ok(Some(FileOutcome::Excluded));
        }

        let outcome = match FileKind::classify(&path) {
            FileKind::Test | FileKind::Partial => {
                self.metrics.record_skipped();
                FileOutcome::Skipped
            }
            FileKind::Locale | FileKind::Static => self.copy(path).await?,
            FileKind::Routes => self.write_compiled(path, Transform::Routes).await?,
            FileKind::Script => self.write_compiled(path, Transform::Module).await?,
            FileKind::Style => self.write_compiled(path, Transform::Style).await?,
            FileKind::Markup => self.write_compiled(path, Transform::Markup).await?,
        };
        Ok(Some(outcome))
    }
}

/// Summary of a successful build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub build_id: String,
    pub output_root: Utf8PathBuf,
    pub config_path: Utf8PathBuf,
    /// Files reported back by the build traversal
    pub files: usize,
    pub modules: usize,
    /// Locale bundles in completion order
    pub locale_bundles: Vec<Utf8PathBuf>,
}

/// Build orchestrator: clean, traverse and compile, write the loader
/// document, compile locales, copy the runtime bootstrap files.
#[derive(Debug)]
pub struct Builder {
    project_root: Utf8PathBuf,
    settings: BuildSettings,
    app: AppDescriptor,
    core: CoreDescriptor,
    ctx: BuildContext,
    exclusions: ExclusionRules,
    state: Arc<StateManager>,
    metrics: Arc<BuildMetrics>,
}

impl Builder {
    pub fn new(
        project_root: impl Into<Utf8PathBuf>,
        settings: BuildSettings,
        app: AppDescriptor,
        core: CoreDescriptor,
        ctx: BuildContext,
    ) -> Result<Self> {
        let config_dir = &settings.config_dir;
        let exclusions = ExclusionRules::new(&app.exclude)?.with_patterns(
            IGNORED_CONFIG_FILES
                .iter()
                .map(|file| format!("{}/{}", config_dir, file)),
        )?;

        Ok(Self {
            project_root: project_root.into(),
            settings,
            app,
            core,
            ctx,
            exclusions,
            state: Arc::new(StateManager::new()),
            metrics: Arc::new(BuildMetrics::new()),
        })
    }

    /// Load settings and both descriptors of the project at `project_root`.
    ///
    /// Fails with a `DescriptorError` before anything is written when a
    /// descriptor is missing.
    pub fn from_project(
        project_root: impl Into<Utf8PathBuf>,
        variant: BuildVariant,
    ) -> Result<Self> {
        let project_root = project_root.into();
        let manager = ConfigManager::new(&project_root);
        let settings = manager.load_settings()?;
        let core = manager.load_core_descriptor(&settings)?;
        let app = manager.load_app_descriptor(&settings, variant)?;

        let ctx = BuildContext::new(
            BuildContext::timestamp_id(),
            project_root.join(&settings.build_dir),
            variant,
            &app.basepath,
        )
        .with_debug(settings.debug);

        Self::new(project_root, settings, app, core, ctx)
    }

    pub fn with_build_context(mut self, ctx: BuildContext) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.ctx.debug = debug;
        self
    }

    pub fn with_state(mut self, state: Arc<StateManager>) -> Self {
        self.state = state;
        self
    }

    pub fn context(&self) -> &BuildContext {
        &self.ctx
    }

    pub fn state(&self) -> &Arc<StateManager> {
        &self.state
    }

    pub fn metrics(&self) -> &BuildMetrics {
        &self.metrics
    }

    /// Run the whole pipeline
    pub async fn build(&self) -> Result<BuildReport> {
        match self.run().await {
            Ok(report) => Ok(report),
            Err(e) => {
                tracing::error!("Build {} failed: {:#}", self.ctx.build_id, e);
                self.state.fail_build(format!("{:#}", e));
                Err(e)
            }
        }
    }

    async fn run(&self) -> Result<BuildReport> {
        let build_id = &self.ctx.build_id;
        tracing::info!(
            "Starting {} build {} into {}",
            self.ctx.variant,
            build_id,
            self.ctx.output_root
        );
        self.state.start_build(build_id);

        let root_files = self.root_markup_files().await?;
        self.clean_previous(&root_files).await?;
        create_dir(&self.ctx.output_root).await?;

        self.state.set_phase(BuildPhase::Traversing);
        let tree = SourceTree::new(self.build_roots(), root_files);
        let dispatcher = FileDispatcher::new(
            self.project_root.clone(),
            self.ctx.clone(),
            DestinationResolver::new(&self.ctx, &self.app.bundles),
            self.exclusions.clone(),
            Arc::clone(&self.metrics),
        );
        let traversal = TreeWalker::new(self.project_root.clone(), dispatcher)
            .fetch(&tree)
            .await?;
        let files = traversal.outputs.len();
        tracing::info!("Build traversal complete: {} files", files);
        self.state.record_traversal(files);

        self.state.set_phase(BuildPhase::WritingConfig);
        let (config_path, modules) = self.write_loader_config().await?;

        self.state.set_phase(BuildPhase::CompilingLocales);
        let locale_bundles = self.compile_locales().await?;

        self.state.set_phase(BuildPhase::CopyingRuntime);
        self.copy_runtime().await?;

        self.state.complete_build();
        self.metrics.log_summary();
        tracing::info!("Build {} complete", build_id);

        Ok(BuildReport {
            build_id: build_id.clone(),
            output_root: self.ctx.output_root.clone(),
            config_path,
            files,
            modules,
            locale_bundles,
        })
    }

    /// Traverse the manifest roots and write the loader document only.
    ///
    /// With a development context this regenerates the project's own config.
    pub async fn write_config(&self) -> Result<Utf8PathBuf> {
        let (path, _) = self.write_loader_config().await?;
        Ok(path)
    }

    async fn write_loader_config(&self) -> Result<(Utf8PathBuf, usize)> {
        let maker = ModuleMaker::new(self.project_root.clone(), self.exclusions.clone());
        let roots = self.manifest_roots().await;
        let manifest = maker.make(&SourceTree::from_dirs(roots)).await?;
        let path = maker
            .write_config(&manifest, &self.ctx, &self.settings, &self.app, &self.core)
            .await?;

        self.metrics.record_modules(manifest.len());
        self.state.record_config(path.clone(), manifest.len());
        Ok((path, manifest.len()))
    }

    /// The config root plus every configured bundle
    fn build_roots(&self) -> Vec<Utf8PathBuf> {
        std::iter::once(self.settings.config_dir.clone())
            .chain(self.app.bundles.iter().map(|bundle| bundle.path.clone()))
            .collect()
    }

    /// Manifest roots present in this project
    async fn manifest_roots(&self) -> Vec<Utf8PathBuf> {
        let candidates = MANIFEST_ROOTS
            .iter()
            .map(Utf8PathBuf::from)
            .chain(std::iter::once(self.settings.config_dir.clone()));

        let mut roots = Vec::new();
        for dir in candidates {
            match tokio::fs::metadata(self.project_root.join(&dir)).await {
                Ok(metadata) if metadata.is_dir() => roots.push(dir),
                _ => tracing::debug!("No {} directory, not scanned for modules", dir),
            }
        }
        roots
    }

    /// `*.html` files at the project root
    async fn root_markup_files(&self) -> Result<Vec<Utf8PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.project_root)
            .await
            .map_err(|source| BuildError::Io {
                action: "failed to list",
                path: self.project_root.clone(),
                source,
            })?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|source| BuildError::Io {
            action: "failed to list",
            path: self.project_root.clone(),
            source,
        })? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.ends_with(".html") && entry.file_type().await.is_ok_and(|t| t.is_file()) {
                files.push(Utf8PathBuf::from(name));
            }
        }
        files.sort();
        Ok(files)
    }

    /// Remove earlier numeric builds and root files from the build directory,
    /// leaving anything else in place.
    async fn clean_previous(&self, root_files: &[Utf8PathBuf]) -> Result<()> {
        let build_dir = &self.ctx.build_dir;
        if self.project_root.starts_with(build_dir) {
            return Err(BuildError::BuildDirContainsProject(build_dir.clone()).into());
        }
        let mut entries = match tokio::fs::read_dir(build_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(BuildError::Io {
                    action: "failed to list",
                    path: build_dir.clone(),
                    source,
                }
                .into());
            }
        };

        while let Some(entry) = entries.next_entry().await.map_err(|source| BuildError::Io {
            action: "failed to list",
            path: build_dir.clone(),
            source,
        })? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let numeric = !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit());
            if !numeric && !root_files.iter().any(|file| file.as_str() == name) {
                continue;
            }

            let path = build_dir.join(&name);
            let removed = match entry.file_type().await {
                Ok(file_type) if file_type.is_dir() => tokio::fs::remove_dir_all(&path).await,
                _ => tokio::fs::remove_file(&path).await,
            };
            removed.map_err(|source| BuildError::Io {
                action: "failed to remove",
                path: path.clone(),
                source,
            })?;
            tracing::debug!("Removed previous output {}", path);
        }
        Ok(())
    }

    /// One independent compile per configured locale
    async fn compile_locales(&self) -> Result<Vec<Utf8PathBuf>> {
        let out_dir = self.ctx.output_root.join(LOCALES_DIR);
        create_dir(&out_dir).await?;

        let source_dir = self.project_root.join(LOCALES_DIR);
        let mut tasks = JoinSet::new();
        for locale in &self.app.locales {
            let compiler = LocaleCompiler::new(source_dir.clone(), locale.locale.clone());
            let out_path = out_dir.join(format!("{}.js", locale.locale));
            tasks.spawn(async move {
                let bundle = compiler
                    .parse()
                    .await
                    .with_context(|| format!("Failed to compile locale {}", compiler.locale()))?;
                tokio::fs::write(&out_path, &bundle)
                    .await
                    .with_context(|| format!("Failed to write {}", out_path))?;
                anyhow::Ok((compiler.locale().to_string(), out_path, bundle.len()))
            });
        }

        let mut bundles = Vec::with_capacity(self.app.locales.len());
        while let Some(joined) = tasks.join_next().await {
            let (locale, path, bytes) = joined.map_err(BuildError::Join)??;
            tracing::info!("Compiled locale {} -> {}", locale, path);
            self.metrics.record_locale(bytes);
            self.state.record_locale(&locale);
            bundles.push(path);
        }
        Ok(bundles)
    }

    /// Copy the bootstrap files and stamp them with the core copyright
    async fn copy_runtime(&self) -> Result<()> {
        let stamper = CopyrightStamper::new(
            self.settings.runtime_dir.clone(),
            self.core.copyright.clone(),
            self.app.copyright.clone(),
        );
        let bootstrap_dir = self.settings.bootstrap_dir();
        create_dir(&self.ctx.output_root.join(&bootstrap_dir)).await?;

        for file in &self.settings.bootstrap_files {
            let relative = bootstrap_dir.join(file);
            let source = self.project_root.join(&relative);
            let destination = self.ctx.output_root.join(&relative);
            tokio::fs::copy(&source, &destination)
                .await
                .with_context(|| format!("Failed to copy runtime file {}", source))?;
            stamper.stamp_file(&self.ctx.output_root, &relative).await?;
            tracing::debug!("Copied runtime file {}", relative);
        }
        Ok(())
    }
}

async fn create_dir(path: &Utf8Path) -> Result<(), BuildError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| BuildError::Io {
            action: "failed to create",
            path: path.to_path_buf(),
            source,
        })
}
