//! Mount table reports (mount_table.json)
//!
//! A report is a serializable snapshot of a finalized scope. Its
//! `portable_key` is the SHA-256 of the JCS (RFC 8785) encoding of the
//! machine-independent view of the table: tokenizable roots contribute
//! only their names, so two hosts with the same layout produce the same
//! key even when their system folders live in different places.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::diagnostic::MountDiagnostic;
use crate::mount::{Capabilities, Location};
use crate::scope::MountScope;
use crate::table::MountTable;
use rch_paths::MountName;

/// Schema version for mount_table.json
pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Schema identifier for mount_table.json
pub const REPORT_SCHEMA_ID: &str = "rch-mounts/mount_table@1";

/// Schema identifier for resolution failure reports
pub const FAILURE_SCHEMA_ID: &str = "rch-mounts/resolution_failure@1";

/// Errors from report generation
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Scope '{0}' is not finalized")]
    NotFinalized(String),

    #[error("JCS serialization failed: {0}")]
    Jcs(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// An alternate root of a reported mount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternateRoot {
    pub path: String,
    pub tokenizable: bool,
}

/// One mount in a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountRecord {
    pub name: String,
    pub path: String,
    pub capabilities: Capabilities,
    pub tokenizable: bool,
    /// Scope that registered the mount
    pub scope: String,
    pub location: Location,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternates: Vec<AlternateRoot>,
}

/// Snapshot of a finalized scope (mount_table.json)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountTableReport {
    /// Schema version
    pub schema_version: u32,

    /// Schema identifier
    pub schema_id: String,

    /// When the report was created
    pub created_at: DateTime<Utc>,

    /// Label of the reported scope
    pub scope: String,

    /// SHA-256 of the configuration file the registry was built from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_digest: Option<String>,

    /// Every visible mount, ordered by name
    pub mounts: Vec<MountRecord>,

    /// Machine-independent digest of the table
    pub portable_key: String,
}

/// Portable view of one mount; field order is irrelevant under JCS
#[derive(Serialize)]
struct PortableMount<'a> {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<&'a str>,
    capabilities: &'a Capabilities,
    alternates: Vec<&'a str>,
}

impl MountTableReport {
    /// Snapshot the mounts visible through `scope`
    pub fn from_scope(scope: &MountScope) -> Result<Self, ReportError> {
        if scope.table().is_none() {
            return Err(ReportError::NotFinalized(scope.label().to_string()));
        }

        let mut mounts = Vec::new();
        for mount in scope.enumerate_all() {
            let (owner, table) = owning_table(scope, &mount.name)
                .ok_or_else(|| ReportError::NotFinalized(scope.label().to_string()))?;
            let alternates = table
                .alternates_of(&mount.name)
                .iter()
                .map(|path| AlternateRoot {
                    path: path.to_string(),
                    tokenizable: table.is_root_tokenizable(path).unwrap_or(false),
                })
                .collect();
            mounts.push(MountRecord {
                name: mount.name.to_string(),
                path: mount.path.to_string(),
                capabilities: mount.capabilities,
                tokenizable: table.is_tokenizable(&mount.name).unwrap_or(false),
                scope: owner,
                location: mount.location.clone(),
                alternates,
            });
        }

        let portable_key = portable_key(&mounts)?;
        Ok(Self {
            schema_version: REPORT_SCHEMA_VERSION,
            schema_id: REPORT_SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            scope: scope.label().to_string(),
            config_digest: None,
            mounts,
            portable_key,
        })
    }

    pub fn with_config_digest(mut self, digest: Option<String>) -> Self {
        self.config_digest = digest;
        self
    }

    /// Serialize to JSON (pretty printed)
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Write to file
    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("JSON error: {}", e))
        })?;
        fs::write(path, json)
    }
}

/// Label and table of the nearest scope in the chain that owns `name`
fn owning_table(
    scope: &MountScope,
    name: &MountName,
) -> Option<(String, Arc<MountTable>)> {
    let mut current = Some(scope);
    while let Some(candidate) = current {
        if let Some(table) = candidate.table() {
            if table.get(name).is_some() {
                return Some((candidate.label().to_string(), table));
            }
        }
        current = candidate.parent().map(Arc::as_ref);
    }
    None
}

fn portable_key(mounts: &[MountRecord]) -> Result<String, ReportError> {
    let portable: Vec<PortableMount<'_>> = mounts
        .iter()
        .map(|mount| PortableMount {
            name: mount.name.to_uppercase().to_lowercase(),
            path: (!mount.tokenizable).then_some(mount.path.as_str()),
            capabilities: &mount.capabilities,
            alternates: mount
                .alternates
                .iter()
                .filter(|alternate| !alternate.tokenizable)
                .map(|alternate| alternate.path.as_str())
                .collect(),
        })
        .collect();

    let jcs_bytes =
        serde_json_canonicalizer::to_vec(&portable).map_err(|e| ReportError::Jcs(e.to_string()))?;
    let mut hasher = Sha256::new();
    hasher.update(&jcs_bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// One diagnostic in a failure report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    pub scope: String,
    pub code: String,
    pub message: String,
    pub location: Location,
}

impl DiagnosticRecord {
    pub fn new(scope: &str, diagnostic: &MountDiagnostic) -> Self {
        Self {
            scope: scope.to_string(),
            code: diagnostic.code().to_string(),
            message: diagnostic.to_string(),
            location: diagnostic.location().clone(),
        }
    }
}

/// Report of a registry that failed to resolve
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureReport {
    pub schema_version: u32,
    pub schema_id: String,
    pub created_at: DateTime<Utc>,
    /// Human-readable summary
    pub human_summary: String,
    pub diagnostics: Vec<DiagnosticRecord>,
}

impl FailureReport {
    pub fn new<'a>(
        human_summary: impl Into<String>,
        diagnostics: impl IntoIterator<Item = (&'a str, &'a MountDiagnostic)>,
    ) -> Self {
        Self {
            schema_version: REPORT_SCHEMA_VERSION,
            schema_id: FAILURE_SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            human_summary: human_summary.into(),
            diagnostics: diagnostics
                .into_iter()
                .map(|(scope, diagnostic)| DiagnosticRecord::new(scope, diagnostic))
                .collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
