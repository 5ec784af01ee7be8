//! Normalized absolute paths
//!
//! Three path forms are recognized:
//! - Unix: `/usr/local/bin`
//! - Drive: `C:\Program Files` (drive letter is upper-cased)
//! - UNC: `\\server\share\dir`
//!
//! Parsing removes `.` segments, resolves `..`, collapses repeated
//! separators and strips trailing separators, so two spellings of the same
//! location compare equal. Drive and UNC paths compare case-insensitively.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::PathError;

/// Characters rejected inside Drive and UNC path segments.
const WINDOWS_INVALID_CHARS: &[char] = &['<', '>', '"', '|', '?', '*', ':'];

fn check_windows_segment(path: &str, segment: &str) -> Result<(), PathError> {
    match segment.chars().find(|c| WINDOWS_INVALID_CHARS.contains(c)) {
        Some(ch) => Err(PathError::InvalidCharacter {
            path: path.to_string(),
            ch,
        }),
        None => Ok(()),
    }
}

/// Syntactic family of an absolute path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathStyle {
    Unix,
    Drive,
    Unc,
}

impl PathStyle {
    /// Separator used when rendering paths of this style
    pub fn separator(self) -> char {
        match self {
            PathStyle::Unix => '/',
            PathStyle::Drive | PathStyle::Unc => '\\',
        }
    }

    /// Whether segment comparison is case-sensitive
    pub fn is_case_sensitive(self) -> bool {
        matches!(self, PathStyle::Unix)
    }
}

/// A normalized absolute path.
#[derive(Clone)]
pub struct AbsolutePath {
    style: PathStyle,
    /// Rendered text, e.g. `/a/b` or `C:\a\b`
    text: Arc<str>,
    /// Comparison key (lower-cased for case-insensitive styles)
    key: Arc<str>,
    /// Byte offset in `text` where the first segment starts
    rest_start: usize,
}

impl AbsolutePath {
    /// Parse and normalize an absolute path.
    pub fn parse(text: &str) -> Result<Self, PathError> {
        if text.trim().is_empty() {
            return Err(PathError::Empty);
        }
        if let Some(ch) = text.chars().find(|c| c.is_control()) {
            return Err(PathError::InvalidCharacter {
                path: text.to_string(),
                ch,
            });
        }

        let bytes = text.as_bytes();
        let (style, root, rest) = if let Some(body) = text.strip_prefix(r"\\") {
            let mut parts = body.split(['\\', '/']).filter(|s| !s.is_empty());
            let (Some(server), Some(share)) = (parts.next(), parts.next()) else {
                return Err(PathError::InvalidUnc(text.to_string()));
            };
            check_windows_segment(text, server)?;
            check_windows_segment(text, share)?;
            let rest: Vec<&str> = parts.collect();
            (PathStyle::Unc, format!(r"\\{}\{}", server, share), rest)
        } else if bytes.len() >= 3
            && bytes[0].is_ascii_alphabetic()
            && bytes[1] == b':'
            && (bytes[2] == b'\\' || bytes[2] == b'/')
        {
            let letter = (bytes[0] as char).to_ascii_uppercase();
            let rest: Vec<&str> = text[3..].split(['\\', '/']).collect();
            (PathStyle::Drive, format!("{}:\\", letter), rest)
        } else if let Some(body) = text.strip_prefix('/') {
            (PathStyle::Unix, "/".to_string(), body.split('/').collect())
        } else {
            return Err(PathError::NotAbsolute(text.to_string()));
        };

        let mut segments: Vec<&str> = Vec::with_capacity(rest.len());
        for segment in rest {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Err(PathError::EscapesRoot(text.to_string()));
                    }
                }
                _ => {
                    if !style.is_case_sensitive() {
                        check_windows_segment(text, segment)?;
                    }
                    segments.push(segment);
                }
            }
        }

        Ok(Self::assemble(style, &root, &segments))
    }

    /// Parse a standard library path.
    pub fn from_std(path: &Path) -> Result<Self, PathError> {
        Self::parse(&path.to_string_lossy())
    }

    fn assemble(style: PathStyle, root: &str, segments: &[&str]) -> Self {
        let sep = style.separator();
        let mut text = String::from(root);
        if style == PathStyle::Unc && !segments.is_empty() {
            text.push(sep);
        }
        let rest_start = text.len();
        for (i, segment) in segments.iter().enumerate() {
            if i > 0 {
                text.push(sep);
            }
            text.push_str(segment);
        }

        let key = if style.is_case_sensitive() {
            text.clone()
        } else {
            text.to_lowercase()
        };

        Self {
            style,
            text: text.into(),
            key: key.into(),
            rest_start,
        }
    }

    /// Rendered path text
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn style(&self) -> PathStyle {
        self.style
    }

    /// Convert to a standard library path
    pub fn to_path_buf(&self) -> PathBuf {
        PathBuf::from(&*self.text)
    }

    /// The root portion (`/`, `C:\` or `\\server\share`)
    pub fn root_str(&self) -> &str {
        let end = if self.style == PathStyle::Unc && self.rest_start < self.text.len() {
            self.rest_start - 1
        } else {
            self.rest_start.min(self.text.len())
        };
        &self.text[..end]
    }

    /// Segments below the root, in order
    pub fn segments(&self) -> impl Iterator<Item = &str> + '_ {
        let sep = self.style.separator();
        self.text[self.rest_start..].split(sep).filter(|s| !s.is_empty())
    }

    /// True when the path is a filesystem root
    pub fn is_root(&self) -> bool {
        self.rest_start >= self.text.len()
    }

    /// Last segment, or None for a root
    pub fn file_name(&self) -> Option<&str> {
        self.segments().last()
    }

    /// The enclosing directory, or None for a root.
    pub fn parent(&self) -> Option<AbsolutePath> {
        if self.is_root() {
            return None;
        }
        let segments: Vec<&str> = self.segments().collect();
        let root = self.root_str().to_string();
        Some(Self::assemble(self.style, &root, &segments[..segments.len() - 1]))
    }

    /// Iterate over this path and all of its ancestors, nearest first.
    pub fn ancestors(&self) -> Ancestors {
        Ancestors {
            next: Some(self.clone()),
        }
    }

    /// Number of ancestors between this path and its filesystem root.
    ///
    /// A root has depth 0.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.parent();
        while let Some(path) = current {
            depth += 1;
            current = path.parent();
        }
        depth
    }

    /// Append a relative path. An absolute argument replaces this path.
    pub fn join(&self, relative: &str) -> Result<AbsolutePath, PathError> {
        match Self::parse(relative) {
            Ok(absolute) => Ok(absolute),
            Err(PathError::NotAbsolute(_)) => {
                let joined = format!("{}{}{}", self.text, self.style.separator(), relative);
                Self::parse(&joined)
            }
            Err(e) => Err(e),
        }
    }

    /// True when `self` equals `base` or lies below it.
    pub fn starts_with(&self, base: &AbsolutePath) -> bool {
        if self.style != base.style || !self.fold_eq(self.root_str(), base.root_str()) {
            return false;
        }
        let mut ours = self.segments();
        for theirs in base.segments() {
            match ours.next() {
                Some(segment) if self.fold_eq(segment, theirs) => {}
                _ => return false,
            }
        }
        true
    }

    /// The remainder of this path below `base`, if it lies within it.
    pub fn relative_to(&self, base: &AbsolutePath) -> Option<RelativePath> {
        if !self.starts_with(base) {
            return None;
        }
        let skip = base.segments().count();
        Some(RelativePath {
            segments: self.segments().skip(skip).map(str::to_string).collect(),
        })
    }

    fn fold_eq(&self, a: &str, b: &str) -> bool {
        if self.style.is_case_sensitive() {
            a == b
        } else {
            a.to_lowercase() == b.to_lowercase()
        }
    }
}

impl PartialEq for AbsolutePath {
    fn eq(&self, other: &Self) -> bool {
        self.style == other.style && self.key == other.key
    }
}

impl Eq for AbsolutePath {}

impl Hash for AbsolutePath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.style.hash(state);
        self.key.hash(state);
    }
}

impl PartialOrd for AbsolutePath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AbsolutePath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for AbsolutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl fmt::Debug for AbsolutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AbsolutePath({:?})", &*self.text)
    }
}

impl Serialize for AbsolutePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for AbsolutePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        AbsolutePath::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Iterator returned by [`AbsolutePath::ancestors`].
pub struct Ancestors {
    next: Option<AbsolutePath>,
}

impl Iterator for Ancestors {
    type Item = AbsolutePath;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        self.next = current.parent();
        Some(current)
    }
}

/// Segments of a path below some root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelativePath {
    segments: Vec<String>,
}

impl RelativePath {
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// True when the path is the root itself
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}
