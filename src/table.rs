//! Finalized mount tables

use std::collections::{BTreeMap, HashMap};

use rch_paths::{AbsolutePath, MountName};

use crate::expander::{MountExpander, PathVirtualizer, SemanticInfo};
use crate::mount::Mount;

/// The immutable result of a successful finalize.
#[derive(Debug)]
pub struct MountTable {
    scope: String,
    mounts: BTreeMap<MountName, Mount>,
    alternates: BTreeMap<MountName, Vec<AbsolutePath>>,
    expander: MountExpander,
}

impl MountTable {
    pub(crate) fn new(
        scope: &str,
        mounts: impl IntoIterator<Item = Mount>,
        alternates: HashMap<MountName, Vec<AbsolutePath>>,
        expander: MountExpander,
    ) -> Self {
        let mut alternates: BTreeMap<_, _> = alternates.into_iter().collect();
        for paths in alternates.values_mut() {
            paths.sort();
        }
        Self {
            scope: scope.to_string(),
            mounts: mounts.into_iter().map(|m| (m.name.clone(), m)).collect(),
            alternates,
            expander,
        }
    }

    /// Label of the scope that produced this table
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn get(&self, name: &MountName) -> Option<&Mount> {
        self.mounts.get(name)
    }

    /// Mounts ordered by case-insensitive name
    pub fn mounts(&self) -> impl Iterator<Item = &Mount> + '_ {
        self.mounts.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &MountName> + '_ {
        self.mounts.keys()
    }

    /// Alternate roots of a mount, sorted
    pub fn alternates_of(&self, name: &MountName) -> &[AbsolutePath] {
        self.alternates.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether the mount's primary root is tokenizable
    pub fn is_tokenizable(&self, name: &MountName) -> Option<bool> {
        let mount = self.mounts.get(name)?;
        self.expander.root_at(&mount.path).map(|info| info.tokenizable)
    }

    /// Whether a specific root (primary or alternate) is tokenizable
    pub fn is_root_tokenizable(&self, root: &AbsolutePath) -> Option<bool> {
        self.expander.root_at(root).map(|info| info.tokenizable)
    }

    pub fn semantic_info_for(&self, path: &AbsolutePath) -> Option<SemanticInfo> {
        self.expander.semantic_info_for(path)
    }

    pub fn expander(&self) -> &MountExpander {
        &self.expander
    }

    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }
}
