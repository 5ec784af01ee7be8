//! Global scope bootstrap
//!
//! Registers the static mounts every build sees, in this order:
//! 1. Layout mounts (engine, source, object, logs, temp, front-end cache)
//! 2. System mounts for the selected platform
//! 3. `[[mount]]` entries from the configuration
//!
//! A system folder that the host does not define, or whose path is already
//! taken by an earlier mount, is skipped rather than reported.

mod platform;

pub use platform::{OsSpecialFolders, Platform, SpecialFolder, SpecialFolders, SystemMount};

use std::collections::HashMap;
use std::path::PathBuf;

use rch_paths::AbsolutePath;
use serde::Serialize;

use crate::config::{MountsConfig, ResolvedLayout, ResolverSettings};
use crate::mount::{Capabilities, DeclaredMount, Location, MountDeclaration};
use crate::scope::MountScope;

static OS_FOLDERS: OsSpecialFolders = OsSpecialFolders;
static HOST_ENV: fn(&str) -> Option<String> = host_env;

fn host_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|value| !value.is_empty())
}

/// Host inputs to bootstrap.
pub struct BootstrapOptions<'a> {
    pub platform: Platform,
    pub folders: &'a dyn SpecialFolders,
    /// Environment lookup used for profile redirection
    pub env: &'a (dyn Fn(&str) -> Option<String> + Sync),
}

impl BootstrapOptions<'static> {
    /// Options reading the running host's folders and environment
    pub fn host() -> Self {
        Self {
            platform: Platform::current(),
            folders: &OS_FOLDERS,
            env: &HOST_ENV,
        }
    }
}

impl<'a> BootstrapOptions<'a> {
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }
}

/// Why a system mount was not registered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The host does not define the folder
    Undefined,
    /// The folder is not an absolute path
    InvalidPath { path: String },
    /// Another mount already has this path
    PathClaimed { path: String, by: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedMount {
    pub name: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// What bootstrap registered.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BootstrapSummary {
    /// Mount names accepted by the scope, in registration order
    pub registered: Vec<String>,
    pub skipped: Vec<SkippedMount>,
    /// System mounts whose path came from the environment
    pub redirected: Vec<String>,
}

/// Register layout, system, and configured static mounts into `scope`.
///
/// Rejected declarations are recorded on the scope and surface when it is
/// finalized.
pub fn populate_global(
    scope: &MountScope,
    config: &MountsConfig,
    options: &BootstrapOptions<'_>,
) -> BootstrapSummary {
    let mut summary = BootstrapSummary::default();
    let mut claimed: HashMap<AbsolutePath, String> = HashMap::new();

    for (name, path, capabilities) in layout_mounts(&config.resolved_layout(), &config.resolver) {
        if let Ok(root) = AbsolutePath::from_std(&path) {
            claimed.entry(root).or_insert_with(|| name.to_string());
        }
        let declaration = MountDeclaration::new(name, path.to_string_lossy(), capabilities)
            .at(Location::builtin("layout"));
        if scope.register(declaration) {
            summary.registered.push(name.to_string());
        }
    }

    if config.resolver.system_mounts {
        for system in options.platform.system_mounts() {
            register_system_mount(
                scope,
                system,
                config.resolver.redirect_user_profile,
                options,
                &mut claimed,
                &mut summary,
            );
        }
    }

    for declared in config.static_mounts() {
        if scope.declare(&declared) {
            summary.registered.push(declared.declaration.name.clone());
        }
    }

    tracing::info!(
        scope = scope.label(),
        platform = %options.platform,
        registered = summary.registered.len(),
        skipped = summary.skipped.len(),
        "Global scope populated"
    );
    summary
}

fn layout_mounts(
    layout: &ResolvedLayout,
    settings: &ResolverSettings,
) -> Vec<(&'static str, PathBuf, Capabilities)> {
    let mut mounts = Vec::new();

    if let Some(engine) = &layout.engine_directory {
        mounts.push((
            "BuildEnginePath",
            engine.clone(),
            Capabilities::read_only().with_static(true),
        ));
    }

    let source = if settings.writable_source_directory {
        Capabilities::read_write()
    } else {
        Capabilities::read_only()
    };
    mounts.push((
        "SourceRoot",
        layout.source_directory.clone(),
        source.with_track_changes(true).with_static(true),
    ));
    mounts.push((
        "ObjectRoot",
        layout.object_directory.clone(),
        Capabilities::read_write()
            .with_scrubbable(true)
            .with_create_on_demand(true)
            .with_static(true),
    ));
    mounts.push((
        "LogsDirectory",
        layout.logs_directory.clone(),
        Capabilities::read_write()
            .with_create_on_demand(true)
            .with_static(true),
    ));
    mounts.push((
        "TempRoot",
        layout.temp_directory.clone(),
        Capabilities::read_write()
            .with_scrubbable(true)
            .with_create_on_demand(true)
            .with_static(true),
    ));

    if let Some(cache) = &layout.front_end_cache_directory {
        mounts.push((
            "FrontEndCache",
            cache.clone(),
            Capabilities::read_write()
                .with_create_on_demand(true)
                .with_static(true),
        ));
    }

    mounts
}

fn register_system_mount(
    scope: &MountScope,
    system: &SystemMount,
    redirect: bool,
    options: &BootstrapOptions<'_>,
    claimed: &mut HashMap<AbsolutePath, String>,
    summary: &mut BootstrapSummary,
) {
    let mut skip = |reason: SkipReason| {
        tracing::debug!(mount = system.name, reason = ?reason, "Skipping system mount");
        summary.skipped.push(SkippedMount {
            name: system.name.to_string(),
            reason,
        });
    };

    let real = options.folders.locate(system.folder);
    let redirected = if redirect {
        system.redirect_var.and_then(|var| (options.env)(var)).map(PathBuf::from)
    } else {
        None
    };

    let Some(primary) = redirected.clone().or_else(|| real.clone()) else {
        skip(SkipReason::Undefined);
        return;
    };
    let root = match AbsolutePath::from_std(&primary) {
        Ok(root) => root,
        Err(_) => {
            skip(SkipReason::InvalidPath {
                path: primary.to_string_lossy().into_owned(),
            });
            return;
        }
    };
    if let Some(owner) = claimed.get(&root) {
        skip(SkipReason::PathClaimed {
            path: root.to_string(),
            by: owner.clone(),
        });
        return;
    }
    claimed.insert(root.clone(), system.name.to_string());

    let capabilities = if system.writable {
        Capabilities::read_write()
    } else {
        Capabilities::read_only()
    };
    let mut declared: DeclaredMount = MountDeclaration::new(
        system.name,
        root.as_str(),
        capabilities.with_system(true).with_static(true),
    )
    .at(Location::builtin("system"))
    .into();

    // The OS location stays reachable under the same name
    if redirected.is_some() {
        if let Some(real) = real.and_then(|path| AbsolutePath::from_std(&path).ok()) {
            if real != root && !claimed.contains_key(&real) {
                tracing::debug!(
                    mount = system.name,
                    path = %root,
                    alternate = %real,
                    "System mount redirected"
                );
                claimed.insert(real.clone(), system.name.to_string());
                declared.alternates.push(real.to_string());
                summary.redirected.push(system.name.to_string());
            }
        }
    }

    if scope.declare(&declared) {
        summary.registered.push(system.name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ScopeState;

    struct FakeFolders(HashMap<SpecialFolder, PathBuf>);

    impl SpecialFolders for FakeFolders {
        fn locate(&self, folder: SpecialFolder) -> Option<PathBuf> {
            match folder {
                SpecialFolder::Fixed(path) => Some(PathBuf::from(path)),
                other => self.0.get(&other).cloned(),
            }
        }
    }

    fn unix_folders() -> FakeFolders {
        FakeFolders(HashMap::from([
            (SpecialFolder::UserProfile, PathBuf::from("/home/dev")),
            (SpecialFolder::UserConfig, PathBuf::from("/home/dev/.config")),
            (SpecialFolder::UserData, PathBuf::from("/home/dev/.local/share")),
        ]))
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn config(extra: &str) -> MountsConfig {
        MountsConfig::parse(&format!(
            "[layout]\nsource_directory = \"/repo\"\nengine_directory = \"/opt/engine\"\n{}",
            extra
        ))
        .unwrap()
    }

    #[test]
    fn test_layout_mounts_resolve() {
        let folders = unix_folders();
        let options = BootstrapOptions {
            platform: Platform::Unix,
            folders: &folders,
            env: &no_env,
        };
        let scope = MountScope::global();
        let summary = populate_global(&scope, &config(""), &options);
        assert!(scope.finalize(), "{:?}", scope.diagnostics());

        for name in ["BuildEnginePath", "SourceRoot", "ObjectRoot", "LogsDirectory", "TempRoot"] {
            assert!(summary.registered.iter().any(|n| n == name), "{} missing", name);
        }
        let temp = scope.lookup("TempRoot").found().unwrap();
        assert_eq!(temp.path.as_str(), "/repo/Out/Objects/Temp");
        assert!(temp.capabilities.scrubbable);
        assert!(scope.lookup("FrontEndCache").found().is_none());
    }

    #[test]
    fn test_undefined_folders_are_skipped() {
        let folders = unix_folders();
        let options = BootstrapOptions {
            platform: Platform::Unix,
            folders: &folders,
            env: &no_env,
        };
        let scope = MountScope::global();
        let summary = populate_global(&scope, &config(""), &options);

        assert!(summary
            .skipped
            .iter()
            .any(|s| s.name == "UserCache" && s.reason == SkipReason::Undefined));
        assert!(scope.lookup("UserConfig").is_found());
    }

    #[test]
    fn test_system_mounts_are_tokenizable() {
        let folders = unix_folders();
        let options = BootstrapOptions {
            platform: Platform::Unix,
            folders: &folders,
            env: &no_env,
        };
        let scope = MountScope::global();
        populate_global(&scope, &config(""), &options);
        assert!(scope.finalize());

        let table = scope.table().unwrap();
        let usr = rch_paths::MountName::parse("Usr").unwrap();
        let src = rch_paths::MountName::parse("SourceRoot").unwrap();
        assert_eq!(table.is_tokenizable(&usr), Some(true));
        assert_eq!(table.is_tokenizable(&src), Some(false));
        assert!(table.get(&usr).unwrap().capabilities.system);
    }

    #[test]
    fn test_system_mount_yields_to_layout_path() {
        let folders = unix_folders();
        let options = BootstrapOptions {
            platform: Platform::Unix,
            folders: &folders,
            env: &no_env,
        };
        let scope = MountScope::global();
        let summary = populate_global(
            &scope,
            &config("temp_directory = \"/tmp\"\n"),
            &options,
        );
        assert!(scope.finalize(), "{:?}", scope.diagnostics());

        assert!(summary.skipped.iter().any(|s| s.name == "Tmp"
            && matches!(&s.reason, SkipReason::PathClaimed { by, .. } if by == "TempRoot")));
        assert!(!scope.lookup("Tmp").is_found());
    }

    #[test]
    fn test_profile_redirection_keeps_real_path_as_alternate() {
        let folders = unix_folders();
        let env = |var: &str| (var == "HOME").then(|| "/redirected/dev".to_string());
        let options = BootstrapOptions {
            platform: Platform::Unix,
            folders: &folders,
            env: &env,
        };
        let scope = MountScope::global();
        let summary = populate_global(
            &scope,
            &config("[resolver]\nredirect_user_profile = true\n"),
            &options,
        );
        assert!(scope.finalize(), "{:?}", scope.diagnostics());
        assert_eq!(summary.redirected, vec!["UserProfile".to_string()]);

        let profile = scope.lookup("UserProfile").found().unwrap();
        assert_eq!(profile.path.as_str(), "/redirected/dev");

        let real = AbsolutePath::parse("/home/dev/projects").unwrap();
        let info = scope.semantic_info_for(&real).unwrap();
        assert_eq!(info.name.as_str(), "UserProfile");
        assert!(info.alternate);
        assert!(info.tokenizable);
    }

    #[test]
    fn test_redirection_disabled_ignores_environment() {
        let folders = unix_folders();
        let env = |_: &str| Some("/redirected".to_string());
        let options = BootstrapOptions {
            platform: Platform::Unix,
            folders: &folders,
            env: &env,
        };
        let scope = MountScope::global();
        let summary = populate_global(&scope, &config(""), &options);
        assert!(summary.redirected.is_empty());
        assert_eq!(
            scope.lookup("UserProfile").found().unwrap().path.as_str(),
            "/home/dev"
        );
    }

    #[test]
    fn test_system_mounts_can_be_disabled() {
        let folders = unix_folders();
        let options = BootstrapOptions {
            platform: Platform::Unix,
            folders: &folders,
            env: &no_env,
        };
        let scope = MountScope::global();
        populate_global(&scope, &config("[resolver]\nsystem_mounts = false\n"), &options);
        assert!(!scope.lookup("Usr").is_found());
        assert!(scope.lookup("SourceRoot").is_found());
    }

    #[test]
    fn test_windows_table_on_any_host() {
        let folders = FakeFolders(HashMap::from([
            (SpecialFolder::WindowsDirectory, PathBuf::from(r"C:\Windows")),
            (SpecialFolder::ProgramFiles, PathBuf::from(r"C:\Program Files")),
        ]));
        let options = BootstrapOptions {
            platform: Platform::Windows,
            folders: &folders,
            env: &no_env,
        };
        let scope = MountScope::global();
        let config = MountsConfig::parse("[layout]\nsource_directory = 'D:\\src'\n").unwrap();
        populate_global(&scope, &config, &options);
        assert!(scope.finalize(), "{:?}", scope.diagnostics());
        assert_eq!(scope.state(), ScopeState::Finalized);

        let windows = scope.lookup("windows").found().unwrap();
        assert_eq!(windows.path.as_str(), r"C:\Windows");
        let info = scope
            .semantic_info_for(&AbsolutePath::parse(r"c:\windows\system32").unwrap())
            .unwrap();
        assert!(info.tokenizable);
    }

    #[test]
    fn test_read_only_source_rejects_nested_object_root() {
        let folders = unix_folders();
        let options = BootstrapOptions {
            platform: Platform::Unix,
            folders: &folders,
            env: &no_env,
        };
        let scope = MountScope::global();
        populate_global(
            &scope,
            &config("[resolver]\nwritable_source_directory = false\n"),
            &options,
        );
        assert!(!scope.finalize());
        assert!(scope
            .diagnostics()
            .iter()
            .any(|d| d.code() == "NonWritableMountsMayOnlyContainNonWritableMounts"));
    }
}
