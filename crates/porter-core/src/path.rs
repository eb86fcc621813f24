//! Repository-relative paths.
//!
//! Every path exchanged with the helper or stored in a proxy record is
//! relative to the repository root, uses `/` separators, and is UTF-8.
//! [`RepoPathBuf`] enforces that shape at construction so the rest of the
//! crate can treat paths as plain validated strings. The repository root
//! itself is the empty path.

use std::fmt;

/// Errors from validating repository paths.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("absolute paths are not allowed: {0:?}")]
    Absolute(String),

    #[error("empty component in path {0:?}")]
    EmptyComponent(String),

    #[error("dot components are not allowed: {0:?}")]
    DotComponent(String),

    #[error("NUL byte in path")]
    ContainsNul,

    #[error("path is not valid UTF-8")]
    NotUtf8,

    #[error("invalid entry name: {0:?}")]
    BadName(String),
}

/// An owned, validated repository-relative path.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RepoPathBuf(String);

impl RepoPathBuf {
    /// The repository root.
    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn new(path: impl Into<String>) -> Result<Self, PathError> {
        let path = path.into();
        if path.is_empty() {
            return Ok(Self(path));
        }
        if path.contains('\0') {
            return Err(PathError::ContainsNul);
        }
        if path.starts_with('/') {
            return Err(PathError::Absolute(path));
        }
        for component in path.split('/') {
            match component {
                "" => return Err(PathError::EmptyComponent(path)),
                "." | ".." => return Err(PathError::DotComponent(path)),
                _ => {}
            }
        }
        Ok(Self(path))
    }

    /// Parse a path out of a wire or record payload.
    pub fn from_wire_bytes(bytes: &[u8]) -> Result<Self, PathError> {
        let s = std::str::from_utf8(bytes).map_err(|_| PathError::NotUtf8)?;
        Self::new(s)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Append one entry name. The name must be a single component.
    pub fn join(&self, name: &str) -> Result<RepoPathBuf, PathError> {
        if name.is_empty() || name == "." || name == ".." || name.contains('/') {
            return Err(PathError::BadName(name.to_string()));
        }
        if name.contains('\0') {
            return Err(PathError::ContainsNul);
        }
        if self.0.is_empty() {
            Ok(Self(name.to_string()))
        } else {
            Ok(Self(format!("{}/{}", self.0, name)))
        }
    }

    /// Split into `(directory, file name)`. The directory part is `""` for
    /// top-level entries. Returns `None` for the root.
    pub fn split_last(&self) -> Option<(&str, &str)> {
        if self.0.is_empty() {
            return None;
        }
        match self.0.rsplit_once('/') {
            Some((dir, name)) => Some((dir, name)),
            None => Some(("", &self.0)),
        }
    }

    /// Iterate path components, top-down. Empty for the root.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|c| !c.is_empty())
    }
}

impl fmt::Debug for RepoPathBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RepoPathBuf({:?})", self.0)
    }
}

impl fmt::Display for RepoPathBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
