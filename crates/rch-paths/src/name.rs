//! Case-insensitive mount names

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::NameError;

/// Characters that may not appear in a mount name.
const INVALID_NAME_CHARS: &[char] = &['"', '<', '>', '|', '*', '?', ':'];

/// A mount name.
///
/// Comparison, hashing and ordering ignore case; the original spelling is
/// kept for display.
#[derive(Clone)]
pub struct MountName {
    text: Arc<str>,
    key: Arc<str>,
}

impl MountName {
    /// Parse a mount name.
    pub fn parse(text: &str) -> Result<Self, NameError> {
        if text.is_empty() {
            return Err(NameError::Empty);
        }
        if text.trim() != text {
            return Err(NameError::Whitespace(text.to_string()));
        }
        if let Some(ch) = text
            .chars()
            .find(|c| c.is_control() || INVALID_NAME_CHARS.contains(c))
        {
            return Err(NameError::InvalidCharacter {
                name: text.to_string(),
                ch,
            });
        }

        Ok(Self {
            text: text.into(),
            key: fold(text).into(),
        })
    }

    /// Name as originally spelled
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Case-folded comparison key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Case-insensitive comparison against raw text
    pub fn matches(&self, text: &str) -> bool {
        *self.key == *fold(text)
    }
}

/// Case fold that is stable under full Unicode upper-casing (`ß` and `SS`
/// fold alike).
fn fold(text: &str) -> String {
    text.to_uppercase().to_lowercase()
}

impl PartialEq for MountName {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for MountName {}

impl Hash for MountName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for MountName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MountName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for MountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl fmt::Debug for MountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MountName({:?})", &*self.text)
    }
}

impl Serialize for MountName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for MountName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        MountName::parse(&text).map_err(serde::de::Error::custom)
    }
}
