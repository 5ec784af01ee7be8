//! Mount definitions
//!
//! A mount binds a logical name to a physical directory together with the
//! capabilities the build may exercise below it.

use std::fmt;

use rch_paths::{AbsolutePath, MountName};
use serde::{Deserialize, Serialize};

/// Capability flags carried by a mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// Pips may read below this mount
    pub readable: bool,

    /// Pips may write below this mount
    pub writable: bool,

    /// Housekeeping may delete contents between builds
    pub scrubbable: bool,

    /// Derived from an OS special folder, never user-authored
    pub system: bool,

    /// The directory may be created on demand
    pub create_on_demand: bool,

    /// Content changes below this mount invalidate incremental state
    pub track_changes: bool,

    /// Known before module evaluation
    #[serde(rename = "static")]
    pub is_static: bool,
}

impl Capabilities {
    /// Readable, not writable.
    pub const fn read_only() -> Self {
        Self {
            readable: true,
            writable: false,
            scrubbable: false,
            system: false,
            create_on_demand: false,
            track_changes: false,
            is_static: false,
        }
    }

    /// Readable and writable.
    pub const fn read_write() -> Self {
        Self {
            writable: true,
            ..Self::read_only()
        }
    }

    pub const fn with_scrubbable(mut self, scrubbable: bool) -> Self {
        self.scrubbable = scrubbable;
        self
    }

    pub const fn with_system(mut self, system: bool) -> Self {
        self.system = system;
        self
    }

    pub const fn with_create_on_demand(mut self, create_on_demand: bool) -> Self {
        self.create_on_demand = create_on_demand;
        self
    }

    pub const fn with_track_changes(mut self, track_changes: bool) -> Self {
        self.track_changes = track_changes;
        self
    }

    pub const fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    /// Check these capabilities against those of an enclosing mount.
    ///
    /// Capability may only narrow going inward: a nested mount may not be
    /// writable below a non-writable mount or readable below a non-readable
    /// one, and must be scrubbable below a scrubbable one.
    pub fn narrowing_violations(&self, enclosing: &Capabilities) -> Vec<NarrowingViolation> {
        let mut violations = Vec::new();
        if !enclosing.writable && self.writable {
            violations.push(NarrowingViolation::WritableInsideNonWritable);
        }
        if !enclosing.readable && self.readable {
            violations.push(NarrowingViolation::ReadableInsideNonReadable);
        }
        if enclosing.scrubbable && !self.scrubbable {
            violations.push(NarrowingViolation::UnscrubbableInsideScrubbable);
        }
        violations
    }
}

/// One axis on which a nested mount is less restricted than its enclosing mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NarrowingViolation {
    WritableInsideNonWritable,
    ReadableInsideNonReadable,
    UnscrubbableInsideScrubbable,
}

impl NarrowingViolation {
    /// Stable diagnostic code
    pub fn code(self) -> &'static str {
        match self {
            Self::WritableInsideNonWritable => "NonWritableMountsMayOnlyContainNonWritableMounts",
            Self::ReadableInsideNonReadable => "NonReadableMountsMayOnlyContainNonReadableMounts",
            Self::UnscrubbableInsideScrubbable => "ScrubbableMountsMayOnlyContainScrubbableMounts",
        }
    }
}

impl fmt::Display for NarrowingViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Where a mount was declared.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// Location for mounts synthesized by the registry itself
    pub fn builtin(origin: &str) -> Self {
        Self::new(format!("<{}>", origin), 0, 0)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "{}", self.file)
        } else {
            write!(f, "{}:{}:{}", self.file, self.line, self.column)
        }
    }
}

/// A validated mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
    pub name: MountName,
    pub path: AbsolutePath,
    pub capabilities: Capabilities,
    pub location: Location,
}

/// An unvalidated mount as written by a configuration source.
///
/// Registration parses the name and path; parse failures are reported as
/// diagnostics rather than errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountDeclaration {
    pub name: String,
    pub path: String,
    pub capabilities: Capabilities,
    pub location: Location,
}

impl MountDeclaration {
    pub fn new(name: impl Into<String>, path: impl Into<String>, capabilities: Capabilities) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            capabilities,
            location: Location::default(),
        }
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = location;
        self
    }
}

/// A declaration together with the alternate paths that alias it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredMount {
    pub declaration: MountDeclaration,
    pub alternates: Vec<String>,
}

impl From<MountDeclaration> for DeclaredMount {
    fn from(declaration: MountDeclaration) -> Self {
        Self {
            declaration,
            alternates: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_narrowing_allows_tighter_nested_mounts() {
        let outer = Capabilities::read_write();
        let inner = Capabilities::read_only();
        assert!(inner.narrowing_violations(&outer).is_empty());

        let scrubbable = Capabilities::read_write().with_scrubbable(true);
        assert!(scrubbable.narrowing_violations(&scrubbable).is_empty());
        assert!(scrubbable.narrowing_violations(&outer).is_empty());
    }

    #[test]
    fn test_narrowing_reports_every_axis() {
        let outer = Capabilities {
            readable: false,
            writable: false,
            scrubbable: true,
            ..Capabilities::default()
        };
        let inner = Capabilities::read_write();
        assert_eq!(
            inner.narrowing_violations(&outer),
            vec![
                NarrowingViolation::WritableInsideNonWritable,
                NarrowingViolation::ReadableInsideNonReadable,
                NarrowingViolation::UnscrubbableInsideScrubbable,
            ]
        );
    }

    #[test]
    fn test_system_flag_does_not_constrain_nesting() {
        let outer = Capabilities::read_only().with_system(true);
        let inner = Capabilities::read_only();
        assert!(inner.narrowing_violations(&outer).is_empty());
    }

    #[test]
    fn test_location_display() {
        assert_eq!(Location::new("config.toml", 3, 7).to_string(), "config.toml:3:7");
        assert_eq!(Location::builtin("layout").to_string(), "<layout>");
    }

    #[test]
    fn test_capabilities_serialize_static_key() {
        let value = serde_json::to_value(Capabilities::read_only().with_static(true)).unwrap();
        assert_eq!(value["static"], true);
        assert_eq!(value["readable"], true);
        assert_eq!(value["writable"], false);
    }
}
