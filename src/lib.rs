// modforge - versioned build pipeline for client-side module loader applications
//
// This is the library crate containing the walker, the build services and the
// leaf compilers. The binary crate (main.rs) provides the command-line entry point.

pub mod compiler;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;
pub mod walker;

// Re-export commonly used types for convenience
pub use config::{ConfigManager, DescriptorError};
pub use models::{
    AppDescriptor, BuildContext, BuildSettings, BuildVariant, CoreDescriptor, Manifest,
};
pub use services::{BuildReport, Builder, ModuleMaker};
pub use state::{StateChange, StateManager};
pub use walker::{FileHandler, SourceTree, TreeWalker, WalkError};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
