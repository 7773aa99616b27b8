//! Data models for the build pipeline.
//!
//! - [`BuildSettings`]: pipeline layout loaded from `modforge.yaml`
//! - [`AppDescriptor`] / [`CoreDescriptor`]: external descriptors consumed as input
//! - [`ModuleDescriptor`] / [`Manifest`]: per-module metadata gathered during a traversal
//! - [`LoaderConfig`]: the document written for the client-side module loader
//! - [`BuildContext`]: build identifier, output root, variant and base path of one build

pub mod config;
pub mod context;
pub mod manifest;

pub use config::{
    AppDescriptor, BuildSettings, BundleConfig, Copyright, CoreDescriptor, LocaleConfig,
};
pub use context::{BuildContext, BuildVariant};
pub use manifest::{
    CORE_GROUP, LOADER_CONFIG_GLOBAL, LoaderConfig, LoaderGroup, Manifest, ModuleDescriptor,
    ModuleEntry, ModuleKind,
};
