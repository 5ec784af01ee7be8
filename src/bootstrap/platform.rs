//! Host platforms and their special folders
//!
//! Each platform has a fixed table of system mounts. A table entry names the
//! special folder it is read from, whether builds may write below it, and
//! the environment variable that may redirect it when profile redirection
//! is enabled.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Host platform whose system mounts are registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    #[serde(rename = "macos")]
    MacOs,
    Unix,
}

impl Platform {
    /// Platform of the running host
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Unix
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::MacOs => "macos",
            Platform::Unix => "unix",
        }
    }

    /// System mounts registered on this platform, in registration order
    pub fn system_mounts(self) -> &'static [SystemMount] {
        match self {
            Platform::Windows => WINDOWS_MOUNTS,
            Platform::MacOs => MACOS_MOUNTS,
            Platform::Unix => UNIX_MOUNTS,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "windows" => Ok(Platform::Windows),
            "macos" | "darwin" => Ok(Platform::MacOs),
            "unix" | "linux" => Ok(Platform::Unix),
            other => Err(format!("unknown platform '{}'", other)),
        }
    }
}

/// OS-defined folder a system mount is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialFolder {
    /// A well-known absolute path that needs no lookup
    Fixed(&'static str),
    WindowsDirectory,
    ProgramFiles,
    ProgramFilesX86,
    ProgramData,
    UserProfile,
    AppData,
    LocalAppData,
    InternetCache,
    UserLibrary,
    UserConfig,
    UserData,
    UserCache,
}

/// Source of special-folder locations.
pub trait SpecialFolders: Send + Sync {
    /// Location of `folder`, or `None` when the host does not define it
    fn locate(&self, folder: SpecialFolder) -> Option<PathBuf>;
}

/// Special folders of the running host.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsSpecialFolders;

impl SpecialFolders for OsSpecialFolders {
    fn locate(&self, folder: SpecialFolder) -> Option<PathBuf> {
        match folder {
            SpecialFolder::Fixed(path) => Some(PathBuf::from(path)),
            SpecialFolder::WindowsDirectory => env_path("SystemRoot").or_else(|| env_path("windir")),
            SpecialFolder::ProgramFiles => env_path("ProgramFiles"),
            SpecialFolder::ProgramFilesX86 => env_path("ProgramFiles(x86)"),
            SpecialFolder::ProgramData => env_path("ProgramData"),
            SpecialFolder::UserProfile => dirs::home_dir(),
            SpecialFolder::AppData => dirs::config_dir(),
            SpecialFolder::LocalAppData => dirs::data_local_dir(),
            SpecialFolder::InternetCache => dirs::data_local_dir()
                .map(|local| local.join("Microsoft").join("Windows").join("INetCache")),
            SpecialFolder::UserLibrary => dirs::home_dir().map(|home| home.join("Library")),
            SpecialFolder::UserConfig => dirs::config_dir(),
            SpecialFolder::UserData => dirs::data_dir(),
            SpecialFolder::UserCache => dirs::cache_dir(),
        }
    }
}

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var_os(var)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// One entry of a platform's system mount table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemMount {
    pub name: &'static str,
    pub folder: SpecialFolder,
    pub writable: bool,
    /// Environment variable that overrides the folder under profile redirection
    pub redirect_var: Option<&'static str>,
}

const fn read_only(name: &'static str, folder: SpecialFolder) -> SystemMount {
    SystemMount {
        name,
        folder,
        writable: false,
        redirect_var: None,
    }
}

const fn read_write(name: &'static str, folder: SpecialFolder) -> SystemMount {
    SystemMount {
        name,
        folder,
        writable: true,
        redirect_var: None,
    }
}

const fn profile(name: &'static str, folder: SpecialFolder, var: &'static str) -> SystemMount {
    SystemMount {
        name,
        folder,
        writable: true,
        redirect_var: Some(var),
    }
}

static WINDOWS_MOUNTS: &[SystemMount] = &[
    read_only("Windows", SpecialFolder::WindowsDirectory),
    read_only("ProgramFiles", SpecialFolder::ProgramFiles),
    read_only("ProgramFilesX86", SpecialFolder::ProgramFilesX86),
    read_write("ProgramData", SpecialFolder::ProgramData),
    profile("UserProfile", SpecialFolder::UserProfile, "USERPROFILE"),
    profile("AppData", SpecialFolder::AppData, "APPDATA"),
    profile("LocalAppData", SpecialFolder::LocalAppData, "LOCALAPPDATA"),
    read_write("InternetCache", SpecialFolder::InternetCache),
];

static MACOS_MOUNTS: &[SystemMount] = &[
    read_only("Applications", SpecialFolder::Fixed("/Applications")),
    read_only("Bin", SpecialFolder::Fixed("/bin")),
    read_only("Sbin", SpecialFolder::Fixed("/sbin")),
    read_only("Library", SpecialFolder::Fixed("/Library")),
    read_only("System", SpecialFolder::Fixed("/System")),
    read_only("Usr", SpecialFolder::Fixed("/usr")),
    read_only("Etc", SpecialFolder::Fixed("/etc")),
    read_write("Var", SpecialFolder::Fixed("/var")),
    read_write("Tmp", SpecialFolder::Fixed("/tmp")),
    read_write("Dev", SpecialFolder::Fixed("/dev")),
    read_only("Volumes", SpecialFolder::Fixed("/Volumes")),
    profile("UserProfile", SpecialFolder::UserProfile, "HOME"),
    read_write("UserLibrary", SpecialFolder::UserLibrary),
];

static UNIX_MOUNTS: &[SystemMount] = &[
    read_only("Bin", SpecialFolder::Fixed("/bin")),
    read_only("Sbin", SpecialFolder::Fixed("/sbin")),
    read_only("Lib", SpecialFolder::Fixed("/lib")),
    read_only("Usr", SpecialFolder::Fixed("/usr")),
    read_only("Etc", SpecialFolder::Fixed("/etc")),
    read_write("Var", SpecialFolder::Fixed("/var")),
    read_write("Tmp", SpecialFolder::Fixed("/tmp")),
    read_write("Dev", SpecialFolder::Fixed("/dev")),
    read_only("Proc", SpecialFolder::Fixed("/proc")),
    read_only("Sys", SpecialFolder::Fixed("/sys")),
    profile("UserProfile", SpecialFolder::UserProfile, "HOME"),
    profile("UserConfig", SpecialFolder::UserConfig, "XDG_CONFIG_HOME"),
    profile("UserData", SpecialFolder::UserData, "XDG_DATA_HOME"),
    profile("UserCache", SpecialFolder::UserCache, "XDG_CACHE_HOME"),
];
