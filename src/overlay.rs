//! Module overlay scopes
//!
//! Each module that declares mounts gets its own child scope on top of the
//! finalized global scope. Modules are populated concurrently; the result is
//! all-or-nothing: if any overlay fails to finalize, none is returned.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::thread;

use thiserror::Error;

use crate::diagnostic::MountDiagnostic;
use crate::mount::DeclaredMount;
use crate::scope::{MountScope, ScopeState};

/// Mounts declared by one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleMounts {
    pub module: String,
    pub mounts: Vec<DeclaredMount>,
}

/// A module whose overlay failed to finalize.
#[derive(Debug, Clone)]
pub struct ModuleFailure {
    pub module: String,
    pub diagnostics: Vec<MountDiagnostic>,
}

/// Errors from overlay population
#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("Parent scope '{0}' must be finalized before module overlays are populated")]
    ParentNotFinalized(String),

    #[error("Module '{0}' is declared more than once")]
    DuplicateModule(String),

    #[error("{} module overlay(s) failed to finalize: {}", .failures.len(), module_list(.failures))]
    Failed { failures: Vec<ModuleFailure> },
}

fn module_list(failures: &[ModuleFailure]) -> String {
    failures
        .iter()
        .map(|f| f.module.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Finalized overlays keyed by module name.
#[derive(Debug, Default)]
pub struct ModuleOverlays {
    scopes: BTreeMap<String, Arc<MountScope>>,
}

impl ModuleOverlays {
    pub fn get(&self, module: &str) -> Option<&Arc<MountScope>> {
        self.scopes.get(module)
    }

    /// Iterate overlays ordered by module name
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<MountScope>)> + '_ {
        self.scopes.iter().map(|(module, scope)| (module.as_str(), scope))
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

/// Build, populate and finalize one overlay per module that declares mounts.
///
/// Modules without mounts get no overlay. Registration runs on one thread
/// per module; each overlay is finalized on its own thread once its
/// registrations have returned.
pub fn populate_overlays(
    parent: &Arc<MountScope>,
    modules: &[ModuleMounts],
) -> Result<ModuleOverlays, OverlayError> {
    if parent.state() != ScopeState::Finalized {
        return Err(OverlayError::ParentNotFinalized(parent.label().to_string()));
    }

    let mut seen = HashSet::new();
    for module in modules {
        if !seen.insert(module.module.as_str()) {
            return Err(OverlayError::DuplicateModule(module.module.clone()));
        }
    }

    let declaring: Vec<&ModuleMounts> = modules.iter().filter(|m| !m.mounts.is_empty()).collect();

    let results: Vec<(String, MountScope, bool)> = thread::scope(|s| {
        let handles: Vec<_> = declaring
            .iter()
            .map(|module| {
                let parent = Arc::clone(parent);
                s.spawn(move || {
                    let scope = MountScope::child(parent, module.module.clone());
                    for declared in &module.mounts {
                        scope.declare(declared);
                    }
                    let finalized = scope.finalize();
                    (module.module.clone(), scope, finalized)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    });

    let failures: Vec<ModuleFailure> = results
        .iter()
        .filter(|(_, _, finalized)| !finalized)
        .map(|(module, scope, _)| ModuleFailure {
            module: module.clone(),
            diagnostics: scope.diagnostics(),
        })
        .collect();

    if !failures.is_empty() {
        tracing::error!(
            failed = failures.len(),
            total = results.len(),
            "Module overlays failed to finalize"
        );
        return Err(OverlayError::Failed { failures });
    }

    tracing::info!(overlays = results.len(), "Module overlays finalized");
    Ok(ModuleOverlays {
        scopes: results
            .into_iter()
            .map(|(module, scope, _)| (module, Arc::new(scope)))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mount::{Capabilities, Location, MountDeclaration};

    fn declared(name: &str, path: &str) -> DeclaredMount {
        MountDeclaration::new(name, path, Capabilities::read_only())
            .at(Location::new("module.toml", 2, 1))
            .into()
    }

    fn global_with(name: &str, path: &str) -> Arc<MountScope> {
        let global = MountScope::global();
        global.register(MountDeclaration::new(
            name,
            path,
            Capabilities::read_write().with_static(true),
        ));
        assert!(global.finalize());
        Arc::new(global)
    }

    #[test]
    fn test_requires_finalized_parent() {
        let parent = Arc::new(MountScope::global());
        let result = populate_overlays(&parent, &[]);
        assert!(matches!(result, Err(OverlayError::ParentNotFinalized(_))));
    }

    #[test]
    fn test_rejects_duplicate_modules() {
        let parent = global_with("Src", "/src");
        let modules = vec![
            ModuleMounts { module: "A".to_string(), mounts: vec![] },
            ModuleMounts { module: "A".to_string(), mounts: vec![] },
        ];
        assert!(matches!(
            populate_overlays(&parent, &modules),
            Err(OverlayError::DuplicateModule(m)) if m == "A"
        ));
    }

    #[test]
    fn test_modules_without_mounts_get_no_overlay() {
        let parent = global_with("Src", "/src");
        let modules = vec![
            ModuleMounts { module: "Empty".to_string(), mounts: vec![] },
            ModuleMounts { module: "Gen".to_string(), mounts: vec![declared("Gen", "/src/gen")] },
        ];
        let overlays = populate_overlays(&parent, &modules).unwrap();
        assert_eq!(overlays.len(), 1);
        assert!(overlays.get("Empty").is_none());

        let gen = overlays.get("Gen").unwrap();
        assert!(gen.lookup("Gen").is_found());
        // Parent mounts remain visible through the overlay
        assert!(gen.lookup("Src").is_found());
        // The parent is never mutated by its overlays
        assert_eq!(parent.registered_len(), 1);
        assert!(!parent.lookup("Gen").is_found());
    }

    #[test]
    fn test_one_failing_module_fails_all() {
        let parent = global_with("Src", "/src");
        let modules = vec![
            ModuleMounts { module: "Good".to_string(), mounts: vec![declared("Gen", "/src/gen")] },
            ModuleMounts { module: "Bad".to_string(), mounts: vec![declared("Src", "/elsewhere")] },
        ];
        match populate_overlays(&parent, &modules) {
            Err(OverlayError::Failed { failures }) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].module, "Bad");
                assert_eq!(
                    failures[0].diagnostics[0].code(),
                    "ModuleMountsWithSameNameMustHaveSamePath"
                );
            }
            other => panic!("expected overlay failure, got {:?}", other),
        }
    }
}
