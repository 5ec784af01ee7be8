//! Build layout directories
//!
//! The layout names the directories the build engine itself owns. Each one
//! becomes a static mount during bootstrap.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::defaults::LayoutDefaults;

/// `[layout]` table as written in the configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Directory holding the build engine binaries
    pub engine_directory: Option<PathBuf>,

    /// Root of the source tree (required)
    pub source_directory: PathBuf,

    /// Output directory (default: <source>/Out/Objects)
    pub object_directory: Option<PathBuf>,

    /// Log directory (default: <source>/Out/Logs)
    pub logs_directory: Option<PathBuf>,

    /// Scratch directory (default: <object>/Temp)
    pub temp_directory: Option<PathBuf>,

    /// Front-end cache directory (no mount when unset)
    pub front_end_cache_directory: Option<PathBuf>,
}

/// Layout with every default applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedLayout {
    pub engine_directory: Option<PathBuf>,
    pub source_directory: PathBuf,
    pub object_directory: PathBuf,
    pub logs_directory: PathBuf,
    pub temp_directory: PathBuf,
    pub front_end_cache_directory: Option<PathBuf>,
}

impl LayoutConfig {
    /// Apply defaults for unspecified directories.
    pub fn resolve(&self, defaults: &LayoutDefaults) -> ResolvedLayout {
        let source = self.source_directory.clone();
        let object = self
            .object_directory
            .clone()
            .unwrap_or_else(|| source.join(&defaults.object_subdirectory));
        let logs = self
            .logs_directory
            .clone()
            .unwrap_or_else(|| source.join(&defaults.logs_subdirectory));
        let temp = self
            .temp_directory
            .clone()
            .unwrap_or_else(|| object.join(&defaults.temp_subdirectory));

        ResolvedLayout {
            engine_directory: self.engine_directory.clone(),
            source_directory: source,
            object_directory: object,
            logs_directory: logs,
            temp_directory: temp,
            front_end_cache_directory: self.front_end_cache_directory.clone(),
        }
    }

    /// Resolve relative directories against `base`.
    pub(crate) fn rebase(&mut self, base: &Path) {
        let rebase = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        rebase(&mut self.source_directory);
        for path in [
            &mut self.engine_directory,
            &mut self.object_directory,
            &mut self.logs_directory,
            &mut self.temp_directory,
            &mut self.front_end_cache_directory,
        ]
        .into_iter()
        .flatten()
        {
            rebase(path);
        }
    }
}
