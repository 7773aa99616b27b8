use crate::models::{AppDescriptor, BuildSettings, BuildVariant, CoreDescriptor};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};
use std::fs;
use thiserror::Error;

/// Build settings file at the project root
pub const SETTINGS_FILE: &str = "modforge.yaml";

/// Application descriptor inside the config directory
pub const APP_CONFIG_FILE: &str = "app_config.json";

/// Prefix of environment variables overriding application descriptor fields
pub const ENV_PREFIX: &str = "MODFORGE";

/// Missing external descriptors. Both are fatal before any output is touched.
#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("core config is missing, restore {0}")]
    MissingCoreConfig(Utf8PathBuf),

    #[error("app config is missing, put an app_config.json file at {0}")]
    MissingAppConfig(Utf8PathBuf),
}

/// Loads build settings and the application/core descriptors of a project.
///
/// - `modforge.yaml`: optional [`BuildSettings`] (YAML)
/// - `<config_dir>/app_config.json`: [`AppDescriptor`], layered with a variant
///   overlay and `MODFORGE_*` environment overrides
/// - `<runtime_dir>/core/core_config.json`: [`CoreDescriptor`]
#[derive(Debug, Clone)]
pub struct ConfigManager {
    project_root: Utf8PathBuf,
    settings_path: Utf8PathBuf,
    env_source: Option<config::Map<String, String>>,
}

impl ConfigManager {
    pub fn new<P: AsRef<Utf8Path>>(project_root: P) -> Self {
        let project_root = project_root.as_ref().to_path_buf();
        Self {
            settings_path: project_root.join(SETTINGS_FILE),
            project_root,
            env_source: None,
        }
    }

    /// Read overrides from `vars` instead of the process environment
    pub fn with_env_source(mut self, vars: config::Map<String, String>) -> Self {
        self.env_source = Some(vars);
        self
    }

    pub fn project_root(&self) -> &Utf8Path {
        &self.project_root
    }

    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }

    /// Load build settings, or defaults if the file doesn't exist
    pub fn load_settings(&self) -> Result<BuildSettings> {
        if !self.settings_path.exists() {
            tracing::warn!(
                "Settings file not found at {}, using defaults",
                self.settings_path
            );
            return Ok(BuildSettings::default());
        }

        let file_contents = fs::read_to_string(&self.settings_path)
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?;

        let settings: BuildSettings = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse settings: {}", self.settings_path))?;

        tracing::info!("Loaded settings from {}", self.settings_path);
        Ok(settings)
    }

    /// Load the application descriptor for `variant`.
    ///
    /// Layers, later wins: `app_config.json`, the variant overlay
    /// (`dev_config.json` / `tests_config.json`, optional), environment.
    pub fn load_app_descriptor(
        &self,
        settings: &BuildSettings,
        variant: BuildVariant,
    ) -> Result<AppDescriptor> {
        let config_dir = self.project_root.join(&settings.config_dir);
        let base_path = config_dir.join(APP_CONFIG_FILE);
        if !base_path.is_file() {
            return Err(DescriptorError::MissingAppConfig(base_path).into());
        }

        let mut builder =
            Config::builder().add_source(File::new(base_path.as_str(), FileFormat::Json));

        if let Some(overlay) = variant.overlay_file() {
            let overlay_path = config_dir.join(overlay);
            if overlay_path.is_file() {
                tracing::info!("Applying {} overlay {}", variant, overlay_path);
            }
            builder = builder
                .add_source(File::new(overlay_path.as_str(), FileFormat::Json).required(false));
        }

        let environment = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .source(self.env_source.clone());
        builder = builder.add_source(environment);

        let descriptor: AppDescriptor = builder
            .build()
            .with_context(|| format!("Failed to load app config: {}", base_path))?
            .try_deserialize()
            .with_context(|| format!("Failed to parse app config: {}", base_path))?;

        tracing::info!(
            "Loaded app config for {} ({} bundles, {} locales)",
            descriptor.app,
            descriptor.bundles.len(),
            descriptor.locales.len()
        );
        Ok(descriptor)
    }

    pub fn load_core_descriptor(&self, settings: &BuildSettings) -> Result<CoreDescriptor> {
        let path = self.project_root.join(settings.core_config_path());
        if !path.is_file() {
            return Err(DescriptorError::MissingCoreConfig(path).into());
        }

        let file_contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read core config: {}", path))?;

        let descriptor: CoreDescriptor = serde_json::from_str(&file_contents)
            .with_context(|| format!("Failed to parse core config: {}", path))?;

        tracing::info!(
            "Loaded core config from {} ({} modules)",
            path,
            descriptor.modules.len()
        );
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project() -> (TempDir, Utf8PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        (temp_dir, root)
    }

    #[test]
    fn test_missing_settings_fall_back_to_defaults() {
        let (_temp_dir, root) = project();
        let settings = ConfigManager::new(&root).load_settings().unwrap();
        assert_eq!(settings, BuildSettings::default());
    }

    #[test]
    fn test_settings_file_overrides_defaults() {
        let (_temp_dir, root) = project();
        fs::write(root.join(SETTINGS_FILE), "build_dir: dist\ndebug: true\n").unwrap();

        let settings = ConfigManager::new(&root).load_settings().unwrap();
        assert_eq!(
            settings,
            BuildSettings {
                build_dir: "dist".into(),
                debug: true,
                ..BuildSettings::default()
            }
        );
    }

    #[test]
    fn test_missing_app_config_is_fatal() {
        let (_temp_dir, root) = project();
        let err = ConfigManager::new(&root)
            .load_app_descriptor(&BuildSettings::default(), BuildVariant::Production)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DescriptorError>(),
            Some(DescriptorError::MissingAppConfig(_))
        ));
    }

    #[test]
    fn test_missing_core_config_is_fatal() {
        let (_temp_dir, root) = project();
        let err = ConfigManager::new(&root)
            .load_core_descriptor(&BuildSettings::default())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DescriptorError>(),
            Some(DescriptorError::MissingCoreConfig(_))
        ));
    }

    #[test]
    fn test_variant_overlay_and_environment() {
        let (_temp_dir, root) = project();
        fs::create_dir_all(root.join("config")).unwrap();
        fs::write(
            root.join("config/app_config.json"),
            r#"{"app": "demo", "basepath": "/static", "locales": [{"locale": "en_US", "default": true}]}"#,
        )
        .unwrap();
        fs::write(
            root.join("config/tests_config.json"),
            r#"{"basepath": "/tests"}"#,
        )
        .unwrap();

        let mut env = config::Map::new();
        env.insert("MODFORGE_APPMAINVIEW".to_string(), "home".to_string());
        let manager = ConfigManager::new(&root).with_env_source(env);
        let settings = BuildSettings::default();

        let prod = manager
            .load_app_descriptor(&settings, BuildVariant::Production)
            .unwrap();
        assert_eq!(prod.basepath, "/static");
        assert_eq!(prod.appmainview, "home");
        assert_eq!(prod.locales.len(), 1);
        assert!(prod.locales[0].default);

        let tests = manager
            .load_app_descriptor(&settings, BuildVariant::Test)
            .unwrap();
        assert_eq!(tests.app, "demo");
        assert_eq!(tests.basepath, "/tests");

        // Overlay is optional
        let dev = manager
            .load_app_descriptor(&settings, BuildVariant::Development)
            .unwrap();
        assert_eq!(dev.basepath, "/static");
    }

    #[test]
    fn test_core_descriptor() {
        let (_temp_dir, root) = project();
        fs::create_dir_all(root.join("runtime/core")).unwrap();
        fs::write(
            root.join("runtime/core/core_config.json"),
            r#"{"modules": {"loader-core": {"path": "runtime/core/loader-core.js"}},
                "copyright": {"name": "Core", "version": "1.0", "text": "MIT"}}"#,
        )
        .unwrap();

        let core = ConfigManager::new(&root)
            .load_core_descriptor(&BuildSettings::default())
            .unwrap();
        assert_eq!(core.modules["loader-core"].path, "runtime/core/loader-core.js");
        assert_eq!(core.copyright.unwrap().name, "Core");
    }
}
