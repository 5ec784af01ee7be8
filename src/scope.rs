//! Mount registry scopes
//!
//! A scope accumulates mounts from concurrent producers and is then
//! finalized once:
//! - Building: registration allowed; queries see only static mounts
//! - Finalized: registration forbidden; queries see every mount
//!
//! A scope with a parent is a module overlay. Overlays validate their
//! mounts against the parent chain but never mutate it.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use rch_paths::{AbsolutePath, MountName};
use serde::{Deserialize, Serialize};

use crate::diagnostic::MountDiagnostic;
use crate::expander::{PathVirtualizer, SemanticInfo};
use crate::mount::{DeclaredMount, Location, Mount, MountDeclaration};
use crate::resolver::{self, RegisteredMount, ResolverInput};
use crate::table::MountTable;

/// Label of the configuration-level scope
pub const GLOBAL_SCOPE: &str = "global";

/// Lifecycle state of a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScopeState {
    /// Mounts may still be registered
    Building,
    /// The resolver succeeded; the scope is read-only
    Finalized,
}

/// Result of a name lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountLookup {
    Found(Mount),
    NotFound,
    NameEmpty,
}

impl MountLookup {
    pub fn found(self) -> Option<Mount> {
        match self {
            MountLookup::Found(mount) => Some(mount),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, MountLookup::Found(_))
    }
}

/// One registry scope.
#[derive(Debug)]
pub struct MountScope {
    label: String,
    parent: Option<Arc<MountScope>>,
    by_name: DashMap<MountName, RegisteredMount>,
    by_path: DashMap<AbsolutePath, MountName>,
    alternates: DashMap<MountName, Vec<AbsolutePath>>,
    alternate_owners: DashMap<AbsolutePath, MountName>,
    next_seq: AtomicU64,
    has_error: AtomicBool,
    diagnostics: Mutex<Vec<MountDiagnostic>>,
    /// Set when finalize starts; no mutation afterwards
    sealed: AtomicBool,
    /// None inside the cell records a failed finalize
    outcome: OnceLock<Option<Arc<MountTable>>>,
}

impl MountScope {
    /// Create a scope without a parent.
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_parent(label.into(), None)
    }

    /// Create the configuration-level scope.
    pub fn global() -> Self {
        Self::new(GLOBAL_SCOPE)
    }

    /// Create a module overlay on top of `parent`.
    pub fn child(parent: Arc<MountScope>, label: impl Into<String>) -> Self {
        Self::with_parent(label.into(), Some(parent))
    }

    fn with_parent(label: String, parent: Option<Arc<MountScope>>) -> Self {
        Self {
            label,
            parent,
            by_name: DashMap::new(),
            by_path: DashMap::new(),
            alternates: DashMap::new(),
            alternate_owners: DashMap::new(),
            next_seq: AtomicU64::new(0),
            has_error: AtomicBool::new(false),
            diagnostics: Mutex::new(Vec::new()),
            sealed: AtomicBool::new(false),
            outcome: OnceLock::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn parent(&self) -> Option<&Arc<MountScope>> {
        self.parent.as_ref()
    }

    pub fn state(&self) -> ScopeState {
        match self.outcome.get() {
            Some(Some(_)) => ScopeState::Finalized,
            _ => ScopeState::Building,
        }
    }

    /// The finalized table, if finalize succeeded
    pub fn table(&self) -> Option<Arc<MountTable>> {
        self.outcome.get().and_then(Clone::clone)
    }

    /// True once any registration or resolution problem was recorded
    pub fn has_errors(&self) -> bool {
        self.has_error.load(Ordering::SeqCst)
    }

    /// Every diagnostic recorded so far, in the order recorded
    pub fn diagnostics(&self) -> Vec<MountDiagnostic> {
        self.diagnostics.lock().clone()
    }

    /// Number of mounts registered in this scope (parents excluded)
    pub fn registered_len(&self) -> usize {
        self.by_name.len()
    }

    /// Register a mount.
    ///
    /// Returns false when the declaration was rejected; the reason is
    /// recorded as a diagnostic and the scope will fail to finalize.
    /// Registering the same name at the same path again overwrites the
    /// earlier capabilities and keeps the earlier registration position.
    ///
    /// # Panics
    /// If the scope has already been finalized.
    pub fn register(&self, declaration: MountDeclaration) -> bool {
        self.assert_unsealed("register a mount");

        let MountDeclaration {
            name,
            path,
            capabilities,
            location,
        } = declaration;

        let name = match MountName::parse(&name) {
            Ok(parsed) => parsed,
            Err(error) => {
                self.record(MountDiagnostic::InvalidName {
                    name,
                    error,
                    location,
                });
                return false;
            }
        };
        let path = match AbsolutePath::parse(&path) {
            Ok(parsed) => parsed,
            Err(error) => {
                self.record(MountDiagnostic::InvalidPath {
                    name: name.to_string(),
                    path,
                    error,
                    location,
                });
                return false;
            }
        };

        let mount = Mount {
            name,
            path,
            capabilities,
            location,
        };

        let conflicts = self.parent_conflicts(&mount);
        if !conflicts.is_empty() {
            for conflict in conflicts {
                self.record(conflict);
            }
            return false;
        }

        match self.insert(mount) {
            Ok(()) => true,
            Err(diagnostic) => {
                self.record(diagnostic);
                false
            }
        }
    }

    fn insert(&self, mount: Mount) -> Result<(), MountDiagnostic> {
        if let Some(owner) = self.alternate_owners.get(&mount.path).map(|o| o.clone()) {
            if owner != mount.name {
                return Err(MountDiagnostic::DuplicatePath {
                    name: mount.name,
                    path: mount.path,
                    existing_name: owner,
                    location: mount.location,
                });
            }
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);

        // Lock order: by_name, then by_path
        match self.by_name.entry(mount.name.clone()) {
            Entry::Occupied(mut entry) => {
                if entry.get().mount.path != mount.path {
                    return Err(MountDiagnostic::DuplicateName {
                        existing_path: entry.get().mount.path.clone(),
                        name: mount.name,
                        path: mount.path,
                        location: mount.location,
                    });
                }
                let seq = entry.get().seq;
                tracing::debug!(
                    scope = %self.label,
                    mount = %mount.name,
                    path = %mount.path,
                    "Mount re-registered, last write wins"
                );
                self.by_path.insert(mount.path.clone(), mount.name.clone());
                entry.insert(RegisteredMount { mount, seq });
                Ok(())
            }
            Entry::Vacant(entry) => match self.by_path.entry(mount.path.clone()) {
                Entry::Occupied(existing) => Err(MountDiagnostic::DuplicatePath {
                    existing_name: existing.get().clone(),
                    name: mount.name,
                    path: mount.path,
                    location: mount.location,
                }),
                Entry::Vacant(slot) => {
                    slot.insert(mount.name.clone());
                    tracing::debug!(
                        scope = %self.label,
                        mount = %mount.name,
                        path = %mount.path,
                        "Mount registered"
                    );
                    entry.insert(RegisteredMount { mount, seq });
                    Ok(())
                }
            },
        }
    }

    /// Name/path consistency against every scope up the parent chain.
    fn parent_conflicts(&self, mount: &Mount) -> Vec<MountDiagnostic> {
        let mut conflicts = Vec::new();
        let mut current = self.parent.as_deref();
        while let Some(scope) = current {
            if let Some(parent_path) = scope.path_of(&mount.name) {
                if parent_path != mount.path {
                    conflicts.push(MountDiagnostic::ModuleNameConflict {
                        name: mount.name.clone(),
                        path: mount.path.clone(),
                        parent_path,
                        parent_scope: scope.label.clone(),
                        location: mount.location.clone(),
                    });
                }
            }
            if let Some(parent_name) = scope.owner_of(&mount.path) {
                if parent_name != mount.name {
                    conflicts.push(MountDiagnostic::ModulePathConflict {
                        name: mount.name.clone(),
                        path: mount.path.clone(),
                        parent_name,
                        parent_scope: scope.label.clone(),
                        location: mount.location.clone(),
                    });
                }
            }
            current = scope.parent.as_deref();
        }
        conflicts
    }

    fn path_of(&self, name: &MountName) -> Option<AbsolutePath> {
        self.by_name.get(name).map(|r| r.mount.path.clone())
    }

    /// Mount bound to `path`, either as its primary root or an alternate
    fn owner_of(&self, path: &AbsolutePath) -> Option<MountName> {
        self.by_path
            .get(path)
            .map(|name| name.clone())
            .or_else(|| self.alternate_owners.get(path).map(|name| name.clone()))
    }

    /// Nearest parent scope binding `path` to a mount other than `name`.
    fn parent_path_owner(
        &self,
        name: &MountName,
        path: &AbsolutePath,
    ) -> Option<(String, MountName)> {
        let mut current = self.parent.as_deref();
        while let Some(scope) = current {
            if let Some(owner) = scope.owner_of(path) {
                if owner != *name {
                    return Some((scope.label.clone(), owner));
                }
            }
            current = scope.parent.as_deref();
        }
        None
    }

    /// Bind an additional physical path to an already registered mount.
    ///
    /// # Panics
    /// If `name` is not registered in this scope, if `alternate` is already
    /// bound to a different mount here or in a parent scope, or if the scope
    /// has been finalized.
    /// These are defects in the caller, not configuration errors.
    pub fn register_alternate_root(&self, name: &MountName, alternate: AbsolutePath) {
        self.assert_unsealed("register an alternate root");

        let primary = match self.path_of(name) {
            Some(path) => path,
            None => panic!(
                "cannot register alternate root '{}' for unknown mount '{}' in scope '{}'",
                alternate, name, self.label
            ),
        };
        if primary == alternate {
            return;
        }
        if let Some(owner) = self.by_path.get(&alternate).map(|o| o.clone()) {
            panic!(
                "alternate root '{}' for mount '{}' is already the root of mount '{}' in scope '{}'",
                alternate, name, owner, self.label
            );
        }
        if let Some((parent_scope, owner)) = self.parent_path_owner(name, &alternate) {
            panic!(
                "alternate root '{}' for mount '{}' is already bound to mount '{}' in parent scope '{}'",
                alternate, name, owner, parent_scope
            );
        }

        match self.alternate_owners.entry(alternate.clone()) {
            Entry::Occupied(entry) => {
                assert!(
                    entry.get() == name,
                    "alternate root '{}' for mount '{}' is already bound to mount '{}' in scope '{}'",
                    alternate,
                    name,
                    entry.get(),
                    self.label
                );
            }
            Entry::Vacant(entry) => {
                entry.insert(name.clone());
                tracing::debug!(
                    scope = %self.label,
                    mount = %name,
                    path = %alternate,
                    "Alternate root registered"
                );
                self.alternates.entry(name.clone()).or_default().push(alternate);
            }
        }
    }

    /// Register a configuration-sourced mount and its alternate roots.
    ///
    /// Unlike [`MountScope::register_alternate_root`], problems with the
    /// alternates are configuration errors and are recorded as diagnostics.
    pub fn declare(&self, declared: &DeclaredMount) -> bool {
        if !self.register(declared.declaration.clone()) {
            return false;
        }
        let Ok(name) = MountName::parse(&declared.declaration.name) else {
            return false;
        };

        let mut ok = true;
        for text in &declared.alternates {
            let location = declared.declaration.location.clone();
            match AbsolutePath::parse(text) {
                Ok(path) => match self.alternate_conflict(&name, path, location) {
                    Ok(path) => self.register_alternate_root(&name, path),
                    Err(conflict) => {
                        self.record(conflict);
                        ok = false;
                    }
                },
                Err(error) => {
                    self.record(MountDiagnostic::InvalidAlternatePath {
                        name: name.clone(),
                        path: text.clone(),
                        error,
                        location,
                    });
                    ok = false;
                }
            }
        }
        ok
    }

    /// Why `path` may not become an alternate root of `name`, if anything.
    fn alternate_conflict(
        &self,
        name: &MountName,
        path: AbsolutePath,
        location: Location,
    ) -> Result<AbsolutePath, MountDiagnostic> {
        if let Some(owner) = self.owner_of(&path).filter(|owner| owner != name) {
            return Err(MountDiagnostic::DuplicatePath {
                name: name.clone(),
                path,
                existing_name: owner,
                location,
            });
        }
        if let Some((parent_scope, parent_name)) = self.parent_path_owner(name, &path) {
            return Err(MountDiagnostic::ModulePathConflict {
                name: name.clone(),
                path,
                parent_name,
                parent_scope,
                location,
            });
        }
        Ok(path)
    }

    /// Resolve the hierarchy and seal the scope.
    ///
    /// Must only be called once every concurrent registration has returned.
    /// Runs the resolver exactly once; concurrent callers wait for it and
    /// later calls return the first outcome.
    /// On failure nothing is published and queries keep their restricted
    /// Building view.
    pub fn finalize(&self) -> bool {
        self.outcome.get_or_init(|| self.resolve_and_seal()).is_some()
    }

    fn resolve_and_seal(&self) -> Option<Arc<MountTable>> {
        self.sealed.store(true, Ordering::SeqCst);

        let input = self.resolver_input();
        let resolution = resolver::resolve(&input);
        let resolved_cleanly = resolution.is_success();
        for diagnostic in resolution.diagnostics {
            self.record(diagnostic);
        }

        if self.has_errors() {
            tracing::info!(
                scope = %self.label,
                resolved_cleanly,
                errors = self.diagnostics.lock().len(),
                "Mount scope failed to finalize"
            );
            return None;
        }

        let table = MountTable::new(
            &self.label,
            input.mounts.into_iter().map(|r| r.mount),
            input.alternates,
            resolution.expander,
        );
        tracing::info!(scope = %self.label, mounts = table.len(), "Mount scope finalized");
        Some(Arc::new(table))
    }

    fn resolver_input(&self) -> ResolverInput<'_> {
        let mut mounts: Vec<RegisteredMount> =
            self.by_name.iter().map(|entry| entry.value().clone()).collect();
        mounts.sort_by_key(|r| r.seq);

        let alternates: HashMap<MountName, Vec<AbsolutePath>> = self
            .alternates
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut ancestors = Vec::new();
        let mut current = self.parent.as_deref();
        while let Some(scope) = current {
            if let Some(table) = scope.table() {
                ancestors.push(table);
            }
            current = scope.parent.as_deref();
        }

        ResolverInput {
            scope: &self.label,
            mounts,
            alternates,
            ancestors,
        }
    }

    /// Look up a mount by case-insensitive name, falling back to the
    /// parent chain.
    ///
    /// Before a successful finalize only static mounts are visible.
    pub fn lookup(&self, name: &str) -> MountLookup {
        if name.is_empty() {
            return MountLookup::NameEmpty;
        }
        let Ok(key) = MountName::parse(name) else {
            return MountLookup::NotFound;
        };
        if let Some(mount) = self.visible_mount(&key) {
            return MountLookup::Found(mount);
        }
        match &self.parent {
            Some(parent) => parent.lookup(name),
            None => MountLookup::NotFound,
        }
    }

    /// Every visible mount of this scope and its parents, ordered by name.
    ///
    /// A mount in this scope shadows a parent mount of the same name.
    pub fn enumerate_all(&self) -> Vec<Mount> {
        let mut mounts: BTreeMap<MountName, Mount> = BTreeMap::new();
        let mut current = Some(self);
        while let Some(scope) = current {
            for mount in scope.visible_mounts() {
                mounts.entry(mount.name.clone()).or_insert(mount);
            }
            current = scope.parent.as_deref();
        }
        mounts.into_values().collect()
    }

    pub fn enumerate_names(&self) -> Vec<String> {
        self.enumerate_all()
            .into_iter()
            .map(|mount| mount.name.to_string())
            .collect()
    }

    fn visible_mount(&self, name: &MountName) -> Option<Mount> {
        match self.table() {
            Some(table) => table.get(name).cloned(),
            None => self
                .by_name
                .get(name)
                .filter(|r| r.mount.capabilities.is_static)
                .map(|r| r.mount.clone()),
        }
    }

    fn visible_mounts(&self) -> Vec<Mount> {
        match self.table() {
            Some(table) => table.mounts().cloned().collect(),
            None => self
                .by_name
                .iter()
                .filter(|r| r.mount.capabilities.is_static)
                .map(|r| r.mount.clone())
                .collect(),
        }
    }

    /// Enclosing mount of `path` across this scope and its finalized parents.
    ///
    /// The deepest matching root wins, wherever in the chain it lives.
    pub fn semantic_info_for(&self, path: &AbsolutePath) -> Option<SemanticInfo> {
        let mut candidates = Vec::new();
        let mut current = Some(self);
        while let Some(scope) = current {
            if let Some(info) = scope.table().and_then(|t| t.semantic_info_for(path)) {
                candidates.push(info);
            }
            current = scope.parent.as_deref();
        }
        resolver::deepest(candidates.into_iter())
    }

    /// Replay this scope's resolved mounts into a downstream virtualizer.
    ///
    /// Returns false, delivering nothing, unless the scope finalized.
    pub fn publish_into(&self, sink: &mut dyn PathVirtualizer) -> bool {
        match self.table() {
            Some(table) => {
                table.expander().replay_into(sink);
                true
            }
            None => false,
        }
    }

    pub(crate) fn record(&self, diagnostic: MountDiagnostic) {
        diagnostic.emit(&self.label);
        self.has_error.store(true, Ordering::SeqCst);
        self.diagnostics.lock().push(diagnostic);
    }

    fn assert_unsealed(&self, action: &str) {
        assert!(
            !self.sealed.load(Ordering::SeqCst),
            "cannot {} in scope '{}' after finalize",
            action,
            self.label
        );
    }
}
