//! Mount registry configuration
//!
//! Parses the `rch-mounts.toml` file:
//! - `[layout]`: directories owned by the build engine
//! - `[resolver]`: resolver settings
//! - `[[mount]]`: additional static mounts
//! - `[[module]]`: per-module mounts, each module becoming an overlay scope

mod defaults;
mod layout;

pub use defaults::LayoutDefaults;
pub use layout::{LayoutConfig, ResolvedLayout};

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::mount::{Capabilities, DeclaredMount, Location, MountDeclaration};
use crate::overlay::ModuleMounts;

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "rch-mounts.toml";

/// Origin label for configuration parsed from memory
const INLINE_ORIGIN: &str = "<inline>";

/// Errors from configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Config file is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Where the configuration came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigSource {
    pub path: String,
    /// SHA-256 of the raw file bytes
    pub digest: String,
}

/// `[resolver]` settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverSettings {
    /// Whether the source root is writable
    #[serde(default = "default_writable_source_directory")]
    pub writable_source_directory: bool,

    /// Take profile folders from environment variables, keeping the OS
    /// location as an alternate root
    #[serde(default)]
    pub redirect_user_profile: bool,

    /// Mount OS special folders
    #[serde(default = "default_system_mounts")]
    pub system_mounts: bool,
}

fn default_writable_source_directory() -> bool {
    LayoutDefaults::default().writable_source_directory
}

fn default_system_mounts() -> bool {
    LayoutDefaults::default().system_mounts
}

impl Default for ResolverSettings {
    fn default() -> Self {
        let defaults = LayoutDefaults::default();
        Self {
            writable_source_directory: defaults.writable_source_directory,
            redirect_user_profile: defaults.redirect_user_profile,
            system_mounts: defaults.system_mounts,
        }
    }
}

fn default_true() -> bool {
    true
}

/// A `[[mount]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct MountEntry {
    pub name: toml::Spanned<String>,

    pub path: String,

    #[serde(default = "default_true")]
    pub readable: bool,

    #[serde(default)]
    pub writable: bool,

    #[serde(default)]
    pub scrubbable: bool,

    #[serde(default)]
    pub track_changes: bool,

    #[serde(default)]
    pub create_on_demand: bool,

    /// Additional physical paths aliasing this mount
    #[serde(default)]
    pub alternates: Vec<String>,

    /// Filled in after parsing from the span of `name`
    #[serde(skip)]
    pub location: Location,
}

impl MountEntry {
    pub fn capabilities(&self, is_static: bool) -> Capabilities {
        Capabilities {
            readable: self.readable,
            writable: self.writable,
            scrubbable: self.scrubbable,
            system: false,
            create_on_demand: self.create_on_demand,
            track_changes: self.track_changes,
            is_static,
        }
    }

    pub fn to_declared(&self, is_static: bool) -> DeclaredMount {
        DeclaredMount {
            declaration: MountDeclaration::new(
                self.name.get_ref().as_str(),
                self.path.as_str(),
                self.capabilities(is_static),
            )
            .at(self.location.clone()),
            alternates: self.alternates.clone(),
        }
    }
}

/// A `[[module]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleEntry {
    pub name: String,

    #[serde(default, rename = "mount")]
    pub mounts: Vec<MountEntry>,
}

/// Parsed configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct MountsConfig {
    pub layout: LayoutConfig,

    #[serde(default)]
    pub resolver: ResolverSettings,

    #[serde(default, rename = "mount")]
    pub mounts: Vec<MountEntry>,

    #[serde(default, rename = "module")]
    pub modules: Vec<ModuleEntry>,

    #[serde(skip)]
    pub source: Option<ConfigSource>,
}

impl MountsConfig {
    /// Load configuration from a file
    ///
    /// Relative layout directories are resolved against the directory
    /// containing the file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let bytes = fs::read(path)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());
        let content = String::from_utf8(bytes)?;

        let origin = path.display().to_string();
        let mut config = Self::parse_with_origin(&content, &origin)?;
        if let Some(base) = path.parent() {
            config.layout.rebase(base);
        }
        config.source = Some(ConfigSource {
            path: origin,
            digest,
        });

        tracing::debug!(
            path = %path.display(),
            mounts = config.mounts.len(),
            modules = config.modules.len(),
            "Loaded mount configuration"
        );
        Ok(config)
    }

    /// Parse configuration from TOML content
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Self::parse_with_origin(content, INLINE_ORIGIN)
    }

    fn parse_with_origin(content: &str, origin: &str) -> Result<Self, ConfigError> {
        let mut config: MountsConfig = toml::from_str(content)?;
        config.validate()?;

        let locate = |entry: &mut MountEntry| {
            let (line, column) = line_column(content, entry.name.span().start);
            entry.location = Location::new(origin, line, column);
        };
        config.mounts.iter_mut().for_each(locate);
        config
            .modules
            .iter_mut()
            .flat_map(|module| module.mounts.iter_mut())
            .for_each(locate);

        Ok(config)
    }

    /// Validate the configuration
    ///
    /// Mount names and paths are not checked here; registration reports
    /// them as mount diagnostics with their source locations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.layout.source_directory.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "layout.source_directory must not be empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for module in &self.modules {
            if module.name.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "module name must not be empty".to_string(),
                ));
            }
            if !seen.insert(module.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "module '{}' is declared more than once",
                    module.name
                )));
            }
        }

        Ok(())
    }

    pub fn resolved_layout(&self) -> ResolvedLayout {
        self.layout.resolve(&LayoutDefaults::default())
    }

    /// `[[mount]]` entries as static declarations
    pub fn static_mounts(&self) -> Vec<DeclaredMount> {
        self.mounts.iter().map(|entry| entry.to_declared(true)).collect()
    }

    /// `[[module]]` entries as overlay inputs
    pub fn module_mounts(&self) -> Vec<ModuleMounts> {
        self.modules
            .iter()
            .map(|module| ModuleMounts {
                module: module.name.clone(),
                mounts: module
                    .mounts
                    .iter()
                    .map(|entry| entry.to_declared(false))
                    .collect(),
            })
            .collect()
    }
}

/// 1-based line and column of a byte offset
fn line_column(content: &str, offset: usize) -> (u32, u32) {
    let prefix = content.get(..offset).unwrap_or(content);
    let line = prefix.matches('\n').count() + 1;
    let column = match prefix.rfind('\n') {
        Some(newline) => prefix[newline + 1..].chars().count() + 1,
        None => prefix.chars().count() + 1,
    };
    (line as u32, column as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[layout]
source_directory = "/repo"
object_directory = "/repo/out"

[resolver]
redirect_user_profile = true

[[mount]]
name = "Tools"
path = "/opt/tools"
alternates = ["/mnt/tools"]

[[mount]]
name = "Scratch"
path = "/scratch"
writable = true
scrubbable = true

[[module]]
name = "Compiler"

[[module.mount]]
name = "Generated"
path = "/repo/out/gen"
writable = true
scrubbable = true
"#;

    #[test]
    fn test_parse_sample() {
        let config = MountsConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.layout.source_directory, PathBuf::from("/repo"));
        assert!(config.resolver.redirect_user_profile);
        assert!(config.resolver.writable_source_directory);
        assert!(config.resolver.system_mounts);
        assert_eq!(config.mounts.len(), 2);
        assert_eq!(config.modules.len(), 1);
        assert!(config.source.is_none());
    }

    #[test]
    fn test_entry_flags_default_to_read_only() {
        let config = MountsConfig::parse(SAMPLE).unwrap();
        let tools = config.mounts[0].capabilities(true);
        assert!(tools.readable);
        assert!(!tools.writable);
        assert!(!tools.scrubbable);
        assert!(!tools.system);
        assert!(tools.is_static);
    }

    #[test]
    fn test_static_and_module_declarations() {
        let config = MountsConfig::parse(SAMPLE).unwrap();

        let statics = config.static_mounts();
        assert_eq!(statics[0].declaration.name, "Tools");
        assert_eq!(statics[0].alternates, vec!["/mnt/tools".to_string()]);
        assert!(statics[1].declaration.capabilities.scrubbable);

        let modules = config.module_mounts();
        assert_eq!(modules[0].module, "Compiler");
        let generated = &modules[0].mounts[0].declaration;
        assert_eq!(generated.name, "Generated");
        assert!(!generated.capabilities.is_static);
    }

    #[test]
    fn test_locations_point_at_mount_names() {
        let config = MountsConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.mounts[0].location.file, "<inline>");
        assert_eq!(config.mounts[0].location.line, 10);
        assert_eq!(config.mounts[1].location.line, 15);
        assert_eq!(config.modules[0].mounts[0].location.line, 24);
    }

    #[test]
    fn test_missing_layout_is_parse_error() {
        let result = MountsConfig::parse("[[mount]]\nname = \"A\"\npath = \"/a\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_empty_source_directory_rejected() {
        let result = MountsConfig::parse("[layout]\nsource_directory = \"\"\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_duplicate_module_rejected() {
        let content = r#"
[layout]
source_directory = "/repo"

[[module]]
name = "A"

[[module]]
name = "A"
"#;
        let err = MountsConfig::parse(content).unwrap_err();
        assert!(err.to_string().contains("declared more than once"));
    }

    #[test]
    fn test_line_column() {
        assert_eq!(line_column("abc", 0), (1, 1));
        assert_eq!(line_column("abc\ndef", 5), (2, 2));
        assert_eq!(line_column("a\n\nb", 3), (3, 1));
    }
}
