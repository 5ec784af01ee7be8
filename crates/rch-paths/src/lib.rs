//! RCH path values
//!
//! Value types shared by the mount registry and its consumers:
//! normalized absolute paths, the relative remainder of a path below a
//! mount, and case-insensitive mount names.

pub mod error;
mod name;
mod path;

pub use error::{NameError, PathError};
pub use name::MountName;
pub use path::{AbsolutePath, Ancestors, PathStyle, RelativePath};
