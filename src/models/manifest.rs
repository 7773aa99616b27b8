use camino::Utf8PathBuf;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::config::LocaleConfig;

/// Global variable the generated loader document assigns
pub const LOADER_CONFIG_GLOBAL: &str = "LOADER_CONFIG";

/// Name of the group holding the runtime framework's own modules
pub const CORE_GROUP: &str = "core";

/// Kind of asset a module resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleKind {
    #[serde(rename = "js")]
    Script,
    #[serde(rename = "css")]
    Style,
}

/// Metadata extracted from one source file.
///
/// Created once per discovered file and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor {
    pub name: String,
    pub path: Utf8PathBuf,
    pub dependencies: Option<Vec<String>>,
    pub kind: ModuleKind,
}

impl ModuleDescriptor {
    pub fn script(name: impl Into<String>, path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            dependencies: None,
            kind: ModuleKind::Script,
        }
    }

    pub fn style(name: impl Into<String>, path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            dependencies: None,
            kind: ModuleKind::Style,
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = Some(dependencies);
        self
    }
}

/// Serialized form of a module inside a loader group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleEntry {
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<Vec<String>>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ModuleKind>,
}

impl From<&ModuleDescriptor> for ModuleEntry {
    fn from(descriptor: &ModuleDescriptor) -> Self {
        Self {
            path: descriptor.path.to_string(),
            requires: descriptor.dependencies.clone(),
            // Scripts are the loader's default type
            kind: match descriptor.kind {
                ModuleKind::Script => None,
                ModuleKind::Style => Some(ModuleKind::Style),
            },
        }
    }
}

/// Module name -> descriptor, built during one traversal.
///
/// A later descriptor with a colliding name replaces the earlier one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    modules: IndexMap<String, ModuleDescriptor>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor, returning the one it replaced
    pub fn insert(&mut self, descriptor: ModuleDescriptor) -> Option<ModuleDescriptor> {
        let replaced = self.modules.insert(descriptor.name.clone(), descriptor);
        if let Some(previous) = &replaced {
            tracing::debug!(
                "Module {} from {} replaced by a later definition",
                previous.name,
                previous.path
            );
        }
        replaced
    }

    pub fn get(&self, name: &str) -> Option<&ModuleDescriptor> {
        self.modules.get(name)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleDescriptor> {
        self.modules.values()
    }

    /// Loader entries sorted by module name
    pub fn entries(&self) -> IndexMap<String, ModuleEntry> {
        let mut entries: IndexMap<String, ModuleEntry> = self
            .modules
            .iter()
            .map(|(name, descriptor)| (name.clone(), ModuleEntry::from(descriptor)))
            .collect();
        entries.sort_keys();
        entries
    }
}

impl FromIterator<ModuleDescriptor> for Manifest {
    fn from_iter<I: IntoIterator<Item = ModuleDescriptor>>(iter: I) -> Self {
        let mut manifest = Manifest::new();
        for descriptor in iter {
            manifest.insert(descriptor);
        }
        manifest
    }
}

/// One group of the loader document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderGroup {
    pub base: String,
    pub modules: IndexMap<String, ModuleEntry>,
}

/// The document the client-side module loader reads at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    pub app: String,
    pub appmainview: String,
    pub locales: Vec<LocaleConfig>,
    pub groups: IndexMap<String, LoaderGroup>,
}

impl LoaderConfig {
    /// Render as a script assigning [`LOADER_CONFIG_GLOBAL`]
    pub fn to_script(&self) -> serde_json::Result<String> {
        Ok(format!(
            "{}={};",
            LOADER_CONFIG_GLOBAL,
            serde_json::to_string(self)?
        ))
    }
}
