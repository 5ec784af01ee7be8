//! Mount validation diagnostics
//!
//! User-configuration problems never abort registration. Each one becomes a
//! `MountDiagnostic`, is emitted as a structured `tracing` event and is
//! retained by the scope so every problem surfaces in a single pass.

use rch_paths::{AbsolutePath, MountName, NameError, PathError};
use thiserror::Error;

use crate::mount::{Location, NarrowingViolation};

/// A user-configuration error found while registering or resolving mounts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MountDiagnostic {
    #[error("{location}: mount name '{name}' is invalid: {error}")]
    InvalidName {
        name: String,
        error: NameError,
        location: Location,
    },

    #[error("{location}: mount '{name}' has invalid path '{path}': {error}")]
    InvalidPath {
        name: String,
        path: String,
        error: PathError,
        location: Location,
    },

    #[error("{location}: alternate root '{path}' for mount '{name}' is invalid: {error}")]
    InvalidAlternatePath {
        name: MountName,
        path: String,
        error: PathError,
        location: Location,
    },

    #[error("{location}: mount '{name}' at '{path}' conflicts with mount '{name}' already registered at '{existing_path}'")]
    DuplicateName {
        name: MountName,
        path: AbsolutePath,
        existing_path: AbsolutePath,
        location: Location,
    },

    #[error("{location}: mount '{name}' at '{path}' conflicts with mount '{existing_name}' already registered at the same path")]
    DuplicatePath {
        name: MountName,
        path: AbsolutePath,
        existing_name: MountName,
        location: Location,
    },

    #[error("{location}: module mounts with same name must have same path: '{name}' is '{path}' here but '{parent_path}' in scope '{parent_scope}'")]
    ModuleNameConflict {
        name: MountName,
        path: AbsolutePath,
        parent_path: AbsolutePath,
        parent_scope: String,
        location: Location,
    },

    #[error("{location}: module mounts with same path must have same name: '{path}' is '{name}' here but '{parent_name}' in scope '{parent_scope}'")]
    ModulePathConflict {
        name: MountName,
        path: AbsolutePath,
        parent_name: MountName,
        parent_scope: String,
        location: Location,
    },

    #[error("{location}: {violation}: mount '{name}' at '{path}' is nested in mount '{parent_name}' at '{parent_path}'")]
    Narrowing {
        violation: NarrowingViolation,
        name: MountName,
        path: AbsolutePath,
        parent_name: MountName,
        parent_path: AbsolutePath,
        location: Location,
    },
}

impl MountDiagnostic {
    /// Stable identifier for automation
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidName { .. } => "InvalidMountName",
            Self::InvalidPath { .. } => "InvalidMountPath",
            Self::InvalidAlternatePath { .. } => "InvalidAlternateRootPath",
            Self::DuplicateName { .. } => "DuplicateMountName",
            Self::DuplicatePath { .. } => "DuplicateMountPath",
            Self::ModuleNameConflict { .. } => "ModuleMountsWithSameNameMustHaveSamePath",
            Self::ModulePathConflict { .. } => "ModuleMountsWithSamePathMustHaveSameName",
            Self::Narrowing { violation, .. } => violation.code(),
        }
    }

    /// Provenance of the offending mount
    pub fn location(&self) -> &Location {
        match self {
            Self::InvalidName { location, .. }
            | Self::InvalidPath { location, .. }
            | Self::InvalidAlternatePath { location, .. }
            | Self::DuplicateName { location, .. }
            | Self::DuplicatePath { location, .. }
            | Self::ModuleNameConflict { location, .. }
            | Self::ModulePathConflict { location, .. }
            | Self::Narrowing { location, .. } => location,
        }
    }

    /// Emit this diagnostic as a structured event.
    pub(crate) fn emit(&self, scope: &str) {
        match self {
            Self::Narrowing {
                name,
                path,
                parent_name,
                parent_path,
                location,
                ..
            } => tracing::error!(
                scope,
                code = self.code(),
                mount = %name,
                path = %path,
                parent_mount = %parent_name,
                parent_path = %parent_path,
                location = %location,
                "{}",
                self
            ),
            Self::ModuleNameConflict {
                name,
                path,
                parent_path,
                location,
                ..
            } => tracing::error!(
                scope,
                code = self.code(),
                mount = %name,
                path = %path,
                parent_mount = %name,
                parent_path = %parent_path,
                location = %location,
                "{}",
                self
            ),
            Self::ModulePathConflict {
                name,
                path,
                parent_name,
                location,
                ..
            } => tracing::error!(
                scope,
                code = self.code(),
                mount = %name,
                path = %path,
                parent_mount = %parent_name,
                parent_path = %path,
                location = %location,
                "{}",
                self
            ),
            _ => tracing::error!(
                scope,
                code = self.code(),
                location = %self.location(),
                "{}",
                self
            ),
        }
    }
}
