//! Shared test fixtures
//!
//! This module provides:
//! - Declaration shorthands for registering mounts
//! - A fake special-folder source for deterministic bootstrap
//! - A recording path virtualizer for observing published commits

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rch_mounts::bootstrap::{BootstrapOptions, Platform, SpecialFolder, SpecialFolders};
use rch_mounts::{
    AbsolutePath, Capabilities, Location, Mount, MountDeclaration, PathVirtualizer, SemanticInfo,
};

/// Declaration located in a fake module file
pub fn declaration(name: &str, path: &str, capabilities: Capabilities) -> MountDeclaration {
    MountDeclaration::new(name, path, capabilities).at(Location::new("module.toml", 1, 1))
}

/// Static declaration, visible before finalize
pub fn static_declaration(name: &str, path: &str, capabilities: Capabilities) -> MountDeclaration {
    declaration(name, path, capabilities.with_static(true))
}

pub fn abs(path: &str) -> AbsolutePath {
    AbsolutePath::parse(path).expect("valid absolute path")
}

/// Special folders backed by a fixed map; `Fixed` folders resolve as-is
#[derive(Debug, Default)]
pub struct FakeFolders(pub HashMap<SpecialFolder, PathBuf>);

impl FakeFolders {
    pub fn unix_home(home: &str) -> Self {
        Self(HashMap::from([
            (SpecialFolder::UserProfile, PathBuf::from(home)),
            (SpecialFolder::UserConfig, Path::new(home).join(".config")),
            (SpecialFolder::UserData, Path::new(home).join(".local/share")),
            (SpecialFolder::UserCache, Path::new(home).join(".cache")),
        ]))
    }
}

impl SpecialFolders for FakeFolders {
    fn locate(&self, folder: SpecialFolder) -> Option<PathBuf> {
        match folder {
            SpecialFolder::Fixed(path) => Some(PathBuf::from(path)),
            other => self.0.get(&other).cloned(),
        }
    }
}

pub fn no_env(_: &str) -> Option<String> {
    None
}

pub fn unix_options(folders: &FakeFolders) -> BootstrapOptions<'_> {
    BootstrapOptions {
        platform: Platform::Unix,
        folders,
        env: &no_env,
    }
}

/// One call received by [`RecordingVirtualizer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Commit { name: String, path: String, tokenizable: bool },
    Alias { name: String, path: String, tokenizable: bool },
}

/// Virtualizer that records every commit in order
#[derive(Debug, Default)]
pub struct RecordingVirtualizer {
    pub calls: Vec<Recorded>,
}

impl PathVirtualizer for RecordingVirtualizer {
    fn commit(&mut self, mount: &Mount, tokenizable: bool) {
        self.calls.push(Recorded::Commit {
            name: mount.name.to_string(),
            path: mount.path.to_string(),
            tokenizable,
        });
    }

    fn commit_alias(&mut self, mount: &Mount, alternate: &AbsolutePath, tokenizable: bool) {
        self.calls.push(Recorded::Alias {
            name: mount.name.to_string(),
            path: alternate.to_string(),
            tokenizable,
        });
    }

    fn semantic_info_for(&self, _path: &AbsolutePath) -> Option<SemanticInfo> {
        None
    }
}
