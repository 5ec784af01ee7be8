//! Registry assembly
//!
//! Builds the finalized global scope from configuration and host inputs,
//! then populates one overlay per module that declares mounts.

use std::sync::Arc;

use thiserror::Error;

use crate::bootstrap::{populate_global, BootstrapOptions, BootstrapSummary};
use crate::config::MountsConfig;
use crate::diagnostic::MountDiagnostic;
use crate::overlay::{populate_overlays, ModuleOverlays, OverlayError};
use crate::scope::MountScope;

/// Errors from registry assembly
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Global mount scope failed to finalize with {} error(s)", .diagnostics.len())]
    Global { diagnostics: Vec<MountDiagnostic> },

    #[error(transparent)]
    Overlay(#[from] OverlayError),
}

impl RegistryError {
    /// Every mount diagnostic behind this error
    pub fn diagnostics(&self) -> Vec<(&str, &MountDiagnostic)> {
        match self {
            RegistryError::Global { diagnostics } => diagnostics
                .iter()
                .map(|d| (crate::scope::GLOBAL_SCOPE, d))
                .collect(),
            RegistryError::Overlay(OverlayError::Failed { failures }) => failures
                .iter()
                .flat_map(|f| f.diagnostics.iter().map(move |d| (f.module.as_str(), d)))
                .collect(),
            RegistryError::Overlay(_) => Vec::new(),
        }
    }
}

/// Finalized global scope plus module overlays.
#[derive(Debug)]
pub struct MountRegistry {
    global: Arc<MountScope>,
    overlays: ModuleOverlays,
    summary: BootstrapSummary,
}

impl MountRegistry {
    pub fn build(
        config: &MountsConfig,
        options: &BootstrapOptions<'_>,
    ) -> Result<Self, RegistryError> {
        let global = MountScope::global();
        let summary = populate_global(&global, config, options);
        if !global.finalize() {
            return Err(RegistryError::Global {
                diagnostics: global.diagnostics(),
            });
        }

        let global = Arc::new(global);
        let overlays = populate_overlays(&global, &config.module_mounts())?;

        Ok(Self {
            global,
            overlays,
            summary,
        })
    }

    pub fn global(&self) -> &Arc<MountScope> {
        &self.global
    }

    pub fn overlays(&self) -> &ModuleOverlays {
        &self.overlays
    }

    /// Scope a module's lookups go through
    ///
    /// Modules without mounts of their own see the global scope.
    pub fn scope_for(&self, module: &str) -> &Arc<MountScope> {
        self.overlays.get(module).unwrap_or(&self.global)
    }

    pub fn summary(&self) -> &BootstrapSummary {
        &self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::{Platform, SpecialFolder, SpecialFolders};
    use std::path::PathBuf;

    struct NoFolders;

    impl SpecialFolders for NoFolders {
        fn locate(&self, _: SpecialFolder) -> Option<PathBuf> {
            None
        }
    }

    fn options() -> BootstrapOptions<'static> {
        static FOLDERS: NoFolders = NoFolders;
        static ENV: fn(&str) -> Option<String> = |_| None;
        BootstrapOptions {
            platform: Platform::Unix,
            folders: &FOLDERS,
            env: &ENV,
        }
    }

    #[test]
    fn test_build_with_overlays() {
        let config = MountsConfig::parse(
            r#"
[layout]
source_directory = "/repo"

[[module]]
name = "Compiler"

[[module.mount]]
name = "CompilerGen"
path = "/repo/Out/Objects/compiler"
writable = true
scrubbable = true
"#,
        )
        .unwrap();

        let registry = MountRegistry::build(&config, &options()).unwrap();
        assert_eq!(registry.overlays().len(), 1);
        assert!(registry.scope_for("Compiler").lookup("CompilerGen").is_found());
        assert!(registry.scope_for("Compiler").lookup("SourceRoot").is_found());
        assert!(!registry.global().lookup("CompilerGen").is_found());
        // Unknown modules resolve through the global scope
        assert_eq!(registry.scope_for("Linker").label(), "global");
    }

    #[test]
    fn test_global_failure_carries_diagnostics() {
        let config = MountsConfig::parse(
            r#"
[layout]
source_directory = "/repo"

[[mount]]
name = "Kept"
path = "/repo/Out/Objects/kept"
writable = true
"#,
        )
        .unwrap();

        let err = MountRegistry::build(&config, &options()).unwrap_err();
        let diagnostics = err.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].0, "global");
        assert_eq!(
            diagnostics[0].1.code(),
            "ScrubbableMountsMayOnlyContainScrubbableMounts"
        );
    }

    #[test]
    fn test_overlay_failure_names_module() {
        let config = MountsConfig::parse(
            r#"
[layout]
source_directory = "/repo"

[[module]]
name = "Bad"

[[module.mount]]
name = "SourceRoot"
path = "/elsewhere"
"#,
        )
        .unwrap();

        let err = MountRegistry::build(&config, &options()).unwrap_err();
        assert!(err.to_string().contains("Bad"));
        let diagnostics = err.diagnostics();
        assert_eq!(diagnostics[0].0, "Bad");
    }
}
