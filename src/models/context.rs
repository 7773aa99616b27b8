use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Build flavour selected on the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildVariant {
    Development,
    Test,
    #[default]
    Production,
}

impl BuildVariant {
    /// Name of the optional descriptor overlay for this variant
    pub fn overlay_file(&self) -> Option<&'static str> {
        match self {
            BuildVariant::Development => Some("dev_config.json"),
            BuildVariant::Test => Some("tests_config.json"),
            BuildVariant::Production => None,
        }
    }

    /// File name of the generated loader document
    pub fn loader_config_file(&self) -> &'static str {
        match self {
            BuildVariant::Test => "tconfig.js",
            _ => "config.js",
        }
    }
}

impl fmt::Display for BuildVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildVariant::Development => "dev",
            BuildVariant::Test => "test",
            BuildVariant::Production => "prod",
        };
        f.write_str(name)
    }
}

impl FromStr for BuildVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(BuildVariant::Development),
            "test" | "tests" => Ok(BuildVariant::Test),
            "prod" | "production" => Ok(BuildVariant::Production),
            other => Err(format!("unknown build variant: {}", other)),
        }
    }
}

/// Per-invocation build parameters. Read-only once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    /// Opaque identifier, numeric for timestamped builds
    pub build_id: String,

    /// Absolute directory every build lives in
    pub build_dir: Utf8PathBuf,

    /// Absolute root of this build's output (`<build_dir>/<build_id>`)
    pub output_root: Utf8PathBuf,

    pub variant: BuildVariant,

    /// Value substituted for `{$basepath}` tokens
    pub base_path: String,

    pub debug: bool,
}

impl BuildContext {
    /// Context for a versioned build below `build_dir`
    pub fn new(
        build_id: impl Into<String>,
        build_dir: impl Into<Utf8PathBuf>,
        variant: BuildVariant,
        app_base_path: &str,
    ) -> Self {
        let build_id = build_id.into();
        let build_dir = build_dir.into();
        Self {
            output_root: build_dir.join(&build_id),
            base_path: format!("{}/{}", app_base_path.trim_end_matches('/'), build_id),
            build_id,
            build_dir,
            variant,
            debug: false,
        }
    }

    /// Context writing straight into the project tree with no base path
    pub fn development(project_root: impl Into<Utf8PathBuf>) -> Self {
        let project_root = project_root.into();
        Self {
            build_id: String::new(),
            build_dir: project_root.clone(),
            output_root: project_root,
            variant: BuildVariant::Development,
            base_path: String::new(),
            debug: true,
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Time-derived identifier (milliseconds since the epoch)
    pub fn timestamp_id() -> String {
        chrono::Utc::now().timestamp_millis().to_string()
    }

    /// Base URL of every loader group
    pub fn group_base(&self) -> String {
        format!("{}/", self.base_path)
    }

    pub fn output_path(&self, relative: &Utf8Path) -> Utf8PathBuf {
        self.output_root.join(relative)
    }
}
