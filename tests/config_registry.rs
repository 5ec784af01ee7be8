//! Configuration to Registry Tests
//!
//! Loads `rch-mounts.toml` files from disk and builds complete registries:
//! - Relative layout directories resolve against the config file
//! - Config diagnostics carry file and line provenance
//! - Reports are stable across hosts with relocated system folders

mod fixtures;

use std::fs;

use fixtures::{abs, unix_options, FakeFolders};
use rch_mounts::config::{ConfigError, CONFIG_FILE_NAME};
use rch_mounts::report::{FailureReport, MountTableReport};
use rch_mounts::{MountRegistry, MountsConfig};
use tempfile::TempDir;

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(CONFIG_FILE_NAME);
    fs::write(&path, content).unwrap();
    path
}

// === Loading ===

#[test]
fn test_load_missing_file() {
    let dir = TempDir::new().unwrap();
    let result = MountsConfig::load(&dir.path().join("absent.toml"));
    assert!(matches!(result, Err(ConfigError::NotFound(_))));
}

#[test]
fn test_load_rebases_relative_layout() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[layout]
source_directory = "src"
logs_directory = "/var/log/build"
"#,
    );

    let config = MountsConfig::load(&path).unwrap();
    let layout = config.resolved_layout();
    assert_eq!(layout.source_directory, dir.path().join("src"));
    assert_eq!(layout.object_directory, dir.path().join("src").join("Out/Objects"));
    assert_eq!(layout.logs_directory, std::path::PathBuf::from("/var/log/build"));

    let source = config.source.unwrap();
    assert_eq!(source.digest.len(), 64);
    assert!(source.path.ends_with(CONFIG_FILE_NAME));
}

#[test]
fn test_load_reports_toml_errors() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[layout\nsource_directory = 1\n");
    assert!(matches!(MountsConfig::load(&path), Err(ConfigError::Parse(_))));
}

// === Registry ===

#[test]
fn test_registry_from_config_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[layout]
source_directory = "/repo"
engine_directory = "/opt/engine"
front_end_cache_directory = "/repo/Out/FrontEnd"

[[mount]]
name = "SdkTools"
path = "/usr/local/sdk"

[[module]]
name = "Compiler"

[[module.mount]]
name = "CompilerOut"
path = "/repo/Out/Objects/compiler"
writable = true
scrubbable = true
"#,
    );
    let config = MountsConfig::load(&path).unwrap();
    let folders = FakeFolders::unix_home("/home/dev");
    let registry = MountRegistry::build(&config, &unix_options(&folders)).unwrap();

    let global = registry.global();
    for name in [
        "BuildEnginePath",
        "SourceRoot",
        "ObjectRoot",
        "LogsDirectory",
        "TempRoot",
        "FrontEndCache",
        "UserProfile",
        "Usr",
        "SdkTools",
    ] {
        assert!(global.lookup(name).is_found(), "{} missing", name);
    }

    // SdkTools sits below the system Usr mount
    let sdk = global.semantic_info_for(&abs("/usr/local/sdk/bin/cc")).unwrap();
    assert_eq!(sdk.name.as_str(), "SdkTools");
    assert!(sdk.tokenizable);

    let compiler = registry.scope_for("Compiler");
    assert!(compiler.lookup("CompilerOut").is_found());
    assert!(!global.lookup("CompilerOut").is_found());
}

#[test]
fn test_config_errors_carry_line_numbers() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"[layout]
source_directory = "/repo"

[[mount]]
name = "Pinned"
path = "/repo/Out/Objects/pinned"
writable = true
"#,
    );
    let config = MountsConfig::load(&path).unwrap();
    let folders = FakeFolders::default();
    let err = MountRegistry::build(&config, &unix_options(&folders)).unwrap_err();

    let report = FailureReport::new(err.to_string(), err.diagnostics());
    assert_eq!(report.diagnostics.len(), 1);
    let record = &report.diagnostics[0];
    assert_eq!(record.code, "ScrubbableMountsMayOnlyContainScrubbableMounts");
    assert_eq!(record.location.line, 5);
    assert!(record.location.file.ends_with(CONFIG_FILE_NAME));
    assert!(record.message.contains("ObjectRoot"));
}

// === Reports ===

#[test]
fn test_portable_key_stable_across_home_directories() {
    let content = r#"
[layout]
source_directory = "/repo"
"#;
    let config = MountsConfig::parse(content).unwrap();

    let alice = FakeFolders::unix_home("/home/alice");
    let bob = FakeFolders::unix_home("/Users/bob");
    let a = MountRegistry::build(&config, &unix_options(&alice)).unwrap();
    let b = MountRegistry::build(&config, &unix_options(&bob)).unwrap();

    let report_a = MountTableReport::from_scope(a.global()).unwrap();
    let report_b = MountTableReport::from_scope(b.global()).unwrap();
    assert_ne!(report_a.mounts, report_b.mounts);
    assert_eq!(report_a.portable_key, report_b.portable_key);
}

#[test]
fn test_report_written_to_disk() {
    let dir = TempDir::new().unwrap();
    let config = MountsConfig::parse("[layout]\nsource_directory = \"/repo\"\n").unwrap();
    let folders = FakeFolders::default();
    let registry = MountRegistry::build(&config, &unix_options(&folders)).unwrap();

    let report = MountTableReport::from_scope(registry.global()).unwrap();
    let out = dir.path().join("mount_table.json");
    report.write_to_file(&out).unwrap();

    let parsed = MountTableReport::from_json(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(parsed.schema_id, "rch-mounts/mount_table@1");
    assert_eq!(parsed.portable_key, report.portable_key);
}
