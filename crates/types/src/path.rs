use serde::{Deserialize, Serialize};
use std::fmt;

/// Home directory every owner's filetree is rooted under.
pub const FILETREE_ROOT: &str = "s";

/// Leaf appended to extension-less paths on static-site routes.
pub const INDEX_DOCUMENT: &str = "index.html";

/// Errors that can occur when parsing a request path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("path must contain at least one segment")]
    Empty,
    #[error("path segment '..' is not allowed")]
    ParentTraversal,
}

/// Slash-separated path inside an owner's filetree.
///
/// Segments keep the order they were supplied in and are never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VirtualPath {
    segments: Vec<String>,
}

impl VirtualPath {
    /// Split `raw` on `/`, dropping empty and `.` segments.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let mut segments = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => continue,
                ".." => return Err(PathError::ParentTraversal),
                other => segments.push(other.to_string()),
            }
        }

        if segments.is_empty() {
            return Err(PathError::Empty);
        }

        Ok(Self { segments })
    }

    /// Parse a request path relative to the filetree home directory.
    ///
    /// `docs/readme.md` becomes `s/docs/readme.md`.
    pub fn under_root(relative: &str) -> Result<Self, PathError> {
        let relative = Self::parse(relative)?;
        let mut segments = Vec::with_capacity(relative.segments.len() + 1);
        segments.push(FILETREE_ROOT.to_string());
        segments.extend(relative.segments);
        Ok(Self { segments })
    }

    /// Append `other` beneath this path.
    pub fn join(&self, other: &VirtualPath) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// Static-site convention: a leaf without an extension names a directory,
    /// so serve its `index.html`.
    pub fn with_index_document(mut self) -> Self {
        if !self.leaf().contains('.') {
            self.segments.push(INDEX_DOCUMENT.to_string());
        }
        self
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Directory components, i.e. every segment except the leaf.
    pub fn parents(&self) -> &[String] {
        &self.segments[..self.segments.len() - 1]
    }

    /// Final (file) segment.
    pub fn leaf(&self) -> &str {
        // parse() guarantees at least one segment
        &self.segments[self.segments.len() - 1]
    }

    /// Extension of the leaf including the leading dot, e.g. `.md`.
    pub fn extension(&self) -> Option<&str> {
        let leaf = self.leaf();
        leaf.rfind('.').map(|idx| &leaf[idx..])
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl From<VirtualPath> for String {
    fn from(value: VirtualPath) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for VirtualPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        VirtualPath::parse(&value)
    }
}
