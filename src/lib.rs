//! RCH Mounts - mount registry for build namespace virtualization
//!
//! This crate maps logical root names (mounts) onto physical directories,
//! enforces capability narrowing between nested mounts, and decides which
//! roots may be replaced by tokens when computing cache fingerprints.
//!
//! A registry is built in two phases: concurrent registration into a
//! [`MountScope`], then a single-threaded [`MountScope::finalize`] that
//! resolves the hierarchy and publishes an immutable [`MountTable`].

pub mod bootstrap;
pub mod config;
pub mod diagnostic;
pub mod expander;
pub mod mount;
pub mod overlay;
pub mod registry;
pub mod report;
mod resolver;
pub mod scope;
pub mod table;

pub use bootstrap::{populate_global, BootstrapOptions, BootstrapSummary, Platform};
pub use config::{ConfigError, MountsConfig};
pub use diagnostic::MountDiagnostic;
pub use expander::{MountExpander, PathVirtualizer, SemanticInfo};
pub use mount::{Capabilities, DeclaredMount, Location, Mount, MountDeclaration, NarrowingViolation};
pub use overlay::{populate_overlays, ModuleMounts, ModuleOverlays, OverlayError};
pub use registry::{MountRegistry, RegistryError};
pub use report::{MountTableReport, ReportError};
pub use scope::{MountLookup, MountScope, ScopeState, GLOBAL_SCOPE};
pub use table::MountTable;

pub use rch_paths::{AbsolutePath, MountName, PathStyle, RelativePath};
