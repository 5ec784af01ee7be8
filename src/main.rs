//! RCH Mounts CLI
//!
//! Entry point for the `rch-mounts` command-line tool.

use clap::{Parser, Subcommand};
use rch_mounts::config::CONFIG_FILE_NAME;
use rch_mounts::report::FailureReport;
use rch_mounts::{
    AbsolutePath, BootstrapOptions, Capabilities, MountLookup, MountRegistry, MountScope,
    MountTableReport, MountsConfig, Platform,
};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter
const LOG_ENV: &str = "RCH_MOUNTS_LOG";

#[derive(Parser)]
#[command(name = "rch-mounts")]
#[command(about = "Mount registry for build namespace virtualization", version)]
struct Cli {
    /// Enable debug logging (overridden by RCH_MOUNTS_LOG)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve every mount and print the mount table
    Resolve {
        /// Path to config file (default: rch-mounts.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Platform whose system mounts are registered (windows, macos, unix)
        #[arg(long)]
        platform: Option<String>,

        /// Show the table as seen by this module's overlay
        #[arg(long, short = 'm')]
        module: Option<String>,

        /// Write mount_table.json to this path
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Look up a single mount by name
    Lookup {
        /// Mount name (case-insensitive)
        name: String,

        /// Path to config file (default: rch-mounts.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Look up through this module's overlay
        #[arg(long, short = 'm')]
        module: Option<String>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show the mount enclosing a path
    Which {
        /// Absolute path to classify
        path: String,

        /// Path to config file (default: rch-mounts.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Classify through this module's overlay
        #[arg(long, short = 'm')]
        module: Option<String>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// List visible mount names
    Names {
        /// Path to config file (default: rch-mounts.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// List names visible to this module's overlay
        #[arg(long, short = 'm')]
        module: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Resolve {
            config,
            platform,
            module,
            output,
            json,
        } => {
            run_resolve(config, platform, module, output, json);
        }
        Commands::Lookup {
            name,
            config,
            module,
            json,
        } => {
            run_lookup(&name, config, module, json);
        }
        Commands::Which {
            path,
            config,
            module,
            json,
        } => {
            run_which(&path, config, module, json);
        }
        Commands::Names { config, module } => {
            run_names(config, module);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "rch_mounts=debug" } else { "rch_mounts=warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(config_path: Option<PathBuf>) -> MountsConfig {
    let path = config_path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
    let mut config = match MountsConfig::load(&path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(1);
        }
    };

    // The running binary stands in for the engine directory
    if config.layout.engine_directory.is_none() {
        config.layout.engine_directory = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
    }
    config
}

fn build_registry(config: &MountsConfig, platform: Option<String>, json: bool) -> MountRegistry {
    let mut options = BootstrapOptions::host();
    if let Some(name) = platform {
        match name.parse::<Platform>() {
            Ok(platform) => options = options.with_platform(platform),
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
    }

    match MountRegistry::build(config, &options) {
        Ok(registry) => registry,
        Err(e) => {
            if json {
                let report = FailureReport::new(e.to_string(), e.diagnostics());
                match report.to_json() {
                    Ok(out) => println!("{}", out),
                    Err(err) => eprintln!("Error serializing failure report: {}", err),
                }
            } else {
                // Individual diagnostics were already logged as they were recorded
                eprintln!("Error: {}", e);
            }
            process::exit(1);
        }
    }
}

fn select_scope<'a>(registry: &'a MountRegistry, module: Option<&str>) -> &'a Arc<MountScope> {
    match module {
        Some(module) => registry.scope_for(module),
        None => registry.global(),
    }
}

fn run_resolve(
    config_path: Option<PathBuf>,
    platform: Option<String>,
    module: Option<String>,
    output: Option<PathBuf>,
    json: bool,
) {
    let config = load_config(config_path);
    let registry = build_registry(&config, platform, json);
    let scope = select_scope(&registry, module.as_deref());

    let report = match MountTableReport::from_scope(scope) {
        Ok(r) => r.with_config_digest(config.source.as_ref().map(|s| s.digest.clone())),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    if let Some(path) = output {
        if let Err(e) = report.write_to_file(&path) {
            eprintln!("Error writing {}: {}", path.display(), e);
            process::exit(1);
        }
    }

    if json {
        match report.to_json() {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("Error serializing report: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    println!("Scope: {}", report.scope);
    println!();
    for mount in &report.mounts {
        println!(
            "  {:<20} {}  {}{}",
            mount.name,
            flags(&mount.capabilities),
            mount.path,
            if mount.tokenizable { "  (tokenizable)" } else { "" }
        );
        for alternate in &mount.alternates {
            println!("  {:<20} {}  {}  (alternate)", "", " ".repeat(6), alternate.path);
        }
    }
    println!();
    for skipped in &registry.summary().skipped {
        println!("  skipped {}: {:?}", skipped.name, skipped.reason);
    }
    println!("Portable key: {}", report.portable_key);
}

fn run_lookup(name: &str, config_path: Option<PathBuf>, module: Option<String>, json: bool) {
    let config = load_config(config_path);
    let registry = build_registry(&config, None, json);
    let scope = select_scope(&registry, module.as_deref());

    let mount = match scope.lookup(name) {
        MountLookup::Found(mount) => mount,
        MountLookup::NameEmpty => {
            eprintln!("Error: mount name is empty");
            process::exit(1);
        }
        MountLookup::NotFound => {
            eprintln!("Mount '{}' not found in scope '{}'", name, scope.label());
            process::exit(1);
        }
    };

    if json {
        match serde_json::to_string_pretty(&mount) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("Error serializing mount: {}", e);
                process::exit(1);
            }
        }
    } else {
        println!("{} {} {}", mount.name, flags(&mount.capabilities), mount.path);
    }
}

fn run_which(path: &str, config_path: Option<PathBuf>, module: Option<String>, json: bool) {
    let path = match AbsolutePath::parse(path) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let config = load_config(config_path);
    let registry = build_registry(&config, None, json);
    let scope = select_scope(&registry, module.as_deref());

    let Some(info) = scope.semantic_info_for(&path) else {
        eprintln!("No mount encloses '{}'", path);
        process::exit(1);
    };

    if json {
        match serde_json::to_string_pretty(&info) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("Error serializing mount info: {}", e);
                process::exit(1);
            }
        }
    } else {
        let relative = path
            .relative_to(&info.root)
            .map(|r| r.to_string())
            .unwrap_or_default();
        println!(
            "{} {} {}{}",
            info.name,
            flags(&info.capabilities),
            relative,
            if info.tokenizable { "  (tokenizable)" } else { "" }
        );
    }
}

fn run_names(config_path: Option<PathBuf>, module: Option<String>) {
    let config = load_config(config_path);
    let registry = build_registry(&config, None, false);
    let scope = select_scope(&registry, module.as_deref());

    for name in scope.enumerate_names() {
        println!("{}", name);
    }
}

/// Compact capability flags: r(ead) w(rite) s(crub) S(ystem) c(reate) t(rack)
fn flags(capabilities: &Capabilities) -> String {
    [
        (capabilities.readable, 'r'),
        (capabilities.writable, 'w'),
        (capabilities.scrubbable, 's'),
        (capabilities.system, 'S'),
        (capabilities.create_on_demand, 'c'),
        (capabilities.track_changes, 't'),
    ]
    .iter()
    .map(|&(on, flag)| if on { flag } else { '-' })
    .collect()
}
