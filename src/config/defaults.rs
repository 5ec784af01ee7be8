//! Built-in layout defaults
//!
//! Hardcoded values used when the configuration file leaves a layout
//! directory or resolver setting unspecified.

use serde::{Deserialize, Serialize};

/// Built-in default layout values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutDefaults {
    /// Object directory relative to the source directory (default: "Out/Objects")
    pub object_subdirectory: String,

    /// Logs directory relative to the source directory (default: "Out/Logs")
    pub logs_subdirectory: String,

    /// Temp directory relative to the object directory (default: "Temp")
    pub temp_subdirectory: String,

    /// Whether the source root is writable (default: true)
    pub writable_source_directory: bool,

    /// Whether profile folders come from environment variables (default: false)
    pub redirect_user_profile: bool,

    /// Whether OS special folders are mounted (default: true)
    pub system_mounts: bool,
}

impl Default for LayoutDefaults {
    fn default() -> Self {
        Self {
            object_subdirectory: "Out/Objects".to_string(),
            logs_subdirectory: "Out/Logs".to_string(),
            temp_subdirectory: "Temp".to_string(),
            writable_source_directory: true,
            redirect_user_profile: false,
            system_mounts: true,
        }
    }
}
