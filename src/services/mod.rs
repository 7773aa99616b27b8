//! Services module - the build pipeline layered on the tree walker.
//!
//! # Components
//!
//! - [`FileKind`]: closed set of file kinds, decided once per path
//! - [`ExclusionRules`]: glob patterns matched against relative paths
//! - [`ModuleMaker`]: walks the source tree with a [`ModuleScanner`], assembles
//!   the module manifest and writes the loader document
//! - [`DestinationResolver`]: maps source paths to output paths, honouring
//!   bundle relocations
//! - [`CopyrightStamper`]: prepends copyright headers to shipped files
//! - [`Builder`]: the build orchestrator
//!
//! # Build pipeline
//!
//! 1. Remove numeric build directories and root markup copies of earlier builds
//! 2. Create `<build_dir>/<build id>`
//! 3. Walk the config root, every bundle and the root `*.html` files, compiling
//!    or copying each file through a [`FileDispatcher`]
//! 4. Walk `{locales, plugins, views, config}` again with a [`ModuleMaker`] and
//!    write the loader document
//! 5. Compile one bundle per configured locale
//! 6. Copy the runtime bootstrap files and stamp them
//! 7. Emit build-complete

pub mod builder;
pub mod classify;
pub mod copyright;
pub mod destination;
pub mod exclusion;
pub mod maker;

pub use builder::{BuildError, BuildReport, Builder, FileDispatcher, FileOutcome};
pub use classify::FileKind;
pub use copyright::CopyrightStamper;
pub use destination::{BundleRelocation, DestinationResolver};
pub use exclusion::{ExclusionError, ExclusionRules};
pub use maker::{HeaderParser, MakeError, ModuleMaker, ModuleScanner, ScriptHeader};
