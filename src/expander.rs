//! Path virtualization
//!
//! The `PathVirtualizer` trait is the seam between the resolver and the
//! layer that maps physical paths onto mounts when computing fingerprints.
//! `MountExpander` is the in-memory implementation each finalized scope owns.

use std::collections::HashMap;

use rch_paths::{AbsolutePath, MountName, RelativePath};
use serde::Serialize;

use crate::mount::{Capabilities, Mount};

/// What the virtualizer knows about the mount enclosing a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SemanticInfo {
    /// Logical mount name
    pub name: MountName,

    /// Physical root the lookup matched (an alternate root when `alternate`)
    pub root: AbsolutePath,

    /// Capabilities of the owning mount
    pub capabilities: Capabilities,

    /// Whether the root may be replaced by a token in fingerprints
    pub tokenizable: bool,

    /// True when `root` is an alternate root of `name`
    pub alternate: bool,
}

/// Receiver of resolved mounts.
pub trait PathVirtualizer {
    /// Record a primary mount.
    fn commit(&mut self, mount: &Mount, tokenizable: bool);

    /// Record an alternate root that resolves to `mount`'s name.
    fn commit_alias(&mut self, mount: &Mount, alternate: &AbsolutePath, tokenizable: bool);

    /// Nearest committed root at or above `path`.
    fn semantic_info_for(&self, path: &AbsolutePath) -> Option<SemanticInfo>;
}

/// A single commit, kept in order so it can be replayed downstream.
#[derive(Debug, Clone)]
enum Commit {
    Mount { mount: Mount, tokenizable: bool },
    Alias { mount: Mount, alternate: AbsolutePath, tokenizable: bool },
}

/// In-memory path virtualizer.
#[derive(Debug, Clone, Default)]
pub struct MountExpander {
    roots: HashMap<AbsolutePath, SemanticInfo>,
    log: Vec<Commit>,
}

impl MountExpander {
    pub fn new() -> Self {
        Self::default()
    }

    /// Info for a root committed at exactly `path`
    pub fn root_at(&self, path: &AbsolutePath) -> Option<&SemanticInfo> {
        self.roots.get(path)
    }

    /// Split `path` into its enclosing mount and the remainder below it.
    pub fn make_relative(&self, path: &AbsolutePath) -> Option<(SemanticInfo, RelativePath)> {
        let info = self.semantic_info_for(path)?;
        let relative = path.relative_to(&info.root)?;
        Some((info, relative))
    }

    /// Every committed root, primaries and alternates, in commit order
    pub fn entries(&self) -> impl Iterator<Item = &SemanticInfo> + '_ {
        self.log.iter().filter_map(|commit| {
            let path = match commit {
                Commit::Mount { mount, .. } => &mount.path,
                Commit::Alias { alternate, .. } => alternate,
            };
            self.roots.get(path)
        })
    }

    /// Roots that seed tokenizability for nested mounts
    pub fn system_roots(&self) -> impl Iterator<Item = &AbsolutePath> + '_ {
        self.roots
            .iter()
            .filter(|(_, info)| info.capabilities.system)
            .map(|(path, _)| path)
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Replay every commit, in order, into another virtualizer.
    pub fn replay_into(&self, sink: &mut dyn PathVirtualizer) {
        for commit in &self.log {
            match commit {
                Commit::Mount { mount, tokenizable } => sink.commit(mount, *tokenizable),
                Commit::Alias {
                    mount,
                    alternate,
                    tokenizable,
                } => sink.commit_alias(mount, alternate, *tokenizable),
            }
        }
    }
}

impl PathVirtualizer for MountExpander {
    fn commit(&mut self, mount: &Mount, tokenizable: bool) {
        self.roots.insert(
            mount.path.clone(),
            SemanticInfo {
                name: mount.name.clone(),
                root: mount.path.clone(),
                capabilities: mount.capabilities,
                tokenizable,
                alternate: false,
            },
        );
        self.log.push(Commit::Mount {
            mount: mount.clone(),
            tokenizable,
        });
    }

    fn commit_alias(&mut self, mount: &Mount, alternate: &AbsolutePath, tokenizable: bool) {
        self.roots.insert(
            alternate.clone(),
            SemanticInfo {
                name: mount.name.clone(),
                root: alternate.clone(),
                capabilities: mount.capabilities,
                tokenizable,
                alternate: true,
            },
        );
        self.log.push(Commit::Alias {
            mount: mount.clone(),
            alternate: alternate.clone(),
            tokenizable,
        });
    }

    fn semantic_info_for(&self, path: &AbsolutePath) -> Option<SemanticInfo> {
        path.ancestors().find_map(|ancestor| self.roots.get(&ancestor).cloned())
    }
}
