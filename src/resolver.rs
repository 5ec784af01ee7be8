//! Hierarchy resolution
//!
//! Runs once per scope, single-threaded, after registration has quiesced:
//! 1. Compute the depth of every root by parent traversal
//! 2. Mark roots with a system-derived ancestor (or self) as tokenizable
//! 3. Walk roots in ascending depth (ties in registration order) and check
//!    each against its nearest enclosing root: current scope first, then
//!    the parent chain
//! 4. Stage every root and alternate root into a fresh expander
//!
//! Every violation is collected; processing never stops at the first one.
//! The staged expander is only published by the caller when no diagnostic
//! was produced, so a failed resolution leaks nothing downstream.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rch_paths::{AbsolutePath, MountName};

use crate::diagnostic::MountDiagnostic;
use crate::expander::{MountExpander, PathVirtualizer, SemanticInfo};
use crate::mount::Mount;
use crate::table::MountTable;

/// A mount together with its registration position.
#[derive(Debug, Clone)]
pub(crate) struct RegisteredMount {
    pub mount: Mount,
    pub seq: u64,
}

/// Snapshot of a scope handed to the resolver.
pub(crate) struct ResolverInput<'a> {
    pub scope: &'a str,
    /// Mounts in registration order
    pub mounts: Vec<RegisteredMount>,
    pub alternates: HashMap<MountName, Vec<AbsolutePath>>,
    /// Finalized tables of the parent chain, nearest first
    pub ancestors: Vec<Arc<MountTable>>,
}

/// Outcome of a resolution pass.
pub(crate) struct Resolution {
    pub expander: MountExpander,
    pub diagnostics: Vec<MountDiagnostic>,
}

impl Resolution {
    pub fn is_success(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

enum WorkItem<'a> {
    Primary(&'a Mount),
    Alternate(&'a Mount, &'a AbsolutePath),
}

pub(crate) fn resolve(input: &ResolverInput<'_>) -> Resolution {
    let mut work: Vec<(usize, u64, WorkItem<'_>)> = Vec::new();
    for registered in &input.mounts {
        let mount = &registered.mount;
        work.push((mount.path.depth(), registered.seq, WorkItem::Primary(mount)));
        if let Some(alternates) = input.alternates.get(&mount.name) {
            for alternate in alternates {
                work.push((alternate.depth(), registered.seq, WorkItem::Alternate(mount, alternate)));
            }
        }
    }
    // Stable: equal depths keep registration order, a primary ahead of its alternates
    work.sort_by_key(|(depth, seq, _)| (*depth, *seq));

    let system_roots = system_roots(input);
    let is_tokenizable =
        |path: &AbsolutePath| path.ancestors().any(|ancestor| system_roots.contains(&ancestor));

    let mut expander = MountExpander::new();
    let mut diagnostics = Vec::new();

    for (depth, _, item) in work {
        match item {
            WorkItem::Primary(mount) => {
                if let Some(existing) = expander.root_at(&mount.path) {
                    diagnostics.push(MountDiagnostic::DuplicatePath {
                        name: mount.name.clone(),
                        path: mount.path.clone(),
                        existing_name: existing.name.clone(),
                        location: mount.location.clone(),
                    });
                    continue;
                }

                if let Some(enclosing) = enclosing_root(&expander, &input.ancestors, &mount.path) {
                    for violation in mount.capabilities.narrowing_violations(&enclosing.capabilities) {
                        diagnostics.push(MountDiagnostic::Narrowing {
                            violation,
                            name: mount.name.clone(),
                            path: mount.path.clone(),
                            parent_name: enclosing.name.clone(),
                            parent_path: enclosing.root.clone(),
                            location: mount.location.clone(),
                        });
                    }
                }

                let tokenizable = is_tokenizable(&mount.path);
                tracing::debug!(
                    scope = input.scope,
                    mount = %mount.name,
                    path = %mount.path,
                    depth,
                    tokenizable,
                    "Staging mount"
                );
                expander.commit(mount, tokenizable);
            }
            WorkItem::Alternate(mount, alternate) => {
                if let Some(existing) = expander.root_at(alternate) {
                    if existing.name != mount.name {
                        diagnostics.push(MountDiagnostic::DuplicatePath {
                            name: mount.name.clone(),
                            path: alternate.clone(),
                            existing_name: existing.name.clone(),
                            location: mount.location.clone(),
                        });
                    }
                    continue;
                }

                let tokenizable = is_tokenizable(alternate);
                tracing::debug!(
                    scope = input.scope,
                    mount = %mount.name,
                    path = %alternate,
                    depth,
                    tokenizable,
                    "Staging alternate root"
                );
                expander.commit_alias(mount, alternate, tokenizable);
            }
        }
    }

    Resolution {
        expander,
        diagnostics,
    }
}

/// Paths whose presence at or above a root makes that root tokenizable.
///
/// Alternates of system mounts inherit the system flag, so they seed the set
/// as well.
fn system_roots(input: &ResolverInput<'_>) -> HashSet<AbsolutePath> {
    let mut roots = HashSet::new();
    for registered in &input.mounts {
        let mount = &registered.mount;
        if !mount.capabilities.system {
            continue;
        }
        roots.insert(mount.path.clone());
        if let Some(alternates) = input.alternates.get(&mount.name) {
            roots.extend(alternates.iter().cloned());
        }
    }
    for table in &input.ancestors {
        roots.extend(table.expander().system_roots().cloned());
    }
    roots
}

/// Nearest root strictly above `path`, across the staged roots and the
/// parent chain.
///
/// An unresolvable lookup means the root is top-level.
fn enclosing_root(
    staged: &MountExpander,
    ancestors: &[Arc<MountTable>],
    path: &AbsolutePath,
) -> Option<SemanticInfo> {
    let parent = path.parent()?;
    let candidates = std::iter::once(staged.semantic_info_for(&parent))
        .chain(ancestors.iter().map(|table| table.semantic_info_for(&parent)))
        .flatten();
    deepest(candidates)
}

/// The candidate with the deepest root; on equal depth the earliest wins.
pub(crate) fn deepest(candidates: impl Iterator<Item = SemanticInfo>) -> Option<SemanticInfo> {
    candidates.fold(None, |best: Option<SemanticInfo>, info| match best {
        Some(current) if current.root.depth() >= info.root.depth() => Some(current),
        _ => Some(info),
    })
}
