use camino::Utf8PathBuf;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::manifest::ModuleEntry;

/// Build settings from modforge.yaml
///
/// Controls where the pipeline reads the runtime framework from and where
/// it writes build output. Every field has a default so the file is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildSettings {
    /// Directory holding every build, relative to the project root
    #[serde(default = "default_build_dir")]
    pub build_dir: Utf8PathBuf,

    /// Runtime framework directory (core descriptor, bootstrap files)
    #[serde(default = "default_runtime_dir")]
    pub runtime_dir: Utf8PathBuf,

    /// Application configuration root
    #[serde(default = "default_config_dir")]
    pub config_dir: Utf8PathBuf,

    /// Files copied from `<runtime_dir>/build` into every build
    #[serde(default = "default_bootstrap_files")]
    pub bootstrap_files: Vec<String>,

    #[serde(default)]
    pub debug: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: Utf8PathBuf,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            build_dir: default_build_dir(),
            runtime_dir: default_runtime_dir(),
            config_dir: default_config_dir(),
            bootstrap_files: default_bootstrap_files(),
            debug: false,
            log_dir: default_log_dir(),
        }
    }
}

impl BuildSettings {
    /// Location of the core descriptor, relative to the project root
    pub fn core_config_path(&self) -> Utf8PathBuf {
        self.runtime_dir.join("core").join("core_config.json")
    }

    /// Directory the bootstrap files are copied from (and into, under the output root)
    pub fn bootstrap_dir(&self) -> Utf8PathBuf {
        self.runtime_dir.join("build")
    }
}

fn default_build_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("build")
}

fn default_runtime_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("runtime")
}

fn default_config_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("config")
}

fn default_bootstrap_files() -> Vec<String> {
    vec!["loader.js".to_string(), "init.js".to_string()]
}

fn default_log_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("logs")
}

/// Application descriptor from `<config_dir>/app_config.json`
///
/// Treated as opaque input: only the fields the pipeline consumes are typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppDescriptor {
    #[serde(default = "default_app")]
    pub app: String,

    #[serde(default = "default_main_view")]
    pub appmainview: String,

    #[serde(default)]
    pub basepath: String,

    #[serde(default)]
    pub bundles: Vec<BundleConfig>,

    #[serde(default)]
    pub locales: Vec<LocaleConfig>,

    /// Exclusion patterns matched against relative source paths
    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default)]
    pub copyright: Option<Copyright>,
}

impl Default for AppDescriptor {
    fn default() -> Self {
        Self {
            app: default_app(),
            appmainview: default_main_view(),
            basepath: String::new(),
            bundles: Vec::new(),
            locales: Vec::new(),
            exclude: Vec::new(),
            copyright: None,
        }
    }
}

fn default_app() -> String {
    "app".to_string()
}

fn default_main_view() -> String {
    "main".to_string()
}

/// A source bundle, optionally relocated to another root of the build directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleConfig {
    pub path: Utf8PathBuf,

    #[serde(default)]
    pub destination: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleConfig {
    pub locale: String,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Copyright {
    pub name: String,
    pub version: String,
    pub text: String,
}

/// Core descriptor shipped with the runtime framework
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoreDescriptor {
    #[serde(default)]
    pub modules: IndexMap<String, ModuleEntry>,

    #[serde(default)]
    pub copyright: Option<Copyright>,
}
