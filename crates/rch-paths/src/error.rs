//! Error types for path and name parsing.

use thiserror::Error;

/// Errors produced when parsing an absolute path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path is empty")]
    Empty,

    #[error("path '{0}' is not absolute")]
    NotAbsolute(String),

    #[error("path '{path}' contains invalid character {ch:?}")]
    InvalidCharacter { path: String, ch: char },

    #[error("path '{0}' escapes its root through '..'")]
    EscapesRoot(String),

    #[error("UNC path '{0}' must name both a server and a share")]
    InvalidUnc(String),
}

/// Errors produced when parsing a mount name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("mount name is empty")]
    Empty,

    #[error("mount name '{0}' has leading or trailing whitespace")]
    Whitespace(String),

    #[error("mount name '{name}' contains invalid character {ch:?}")]
    InvalidCharacter { name: String, ch: char },
}
