//! Types for name registry records

use serde::{Deserialize, Serialize};
use shepherd_types::{CanonicalOwner, VirtualPath};

/// Registry record for one registered name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRecord {
    /// Registered name without the suffix
    #[serde(default)]
    pub name: String,
    /// Owner account the name points at
    #[serde(default, alias = "Value")]
    pub value: String,
    /// Free-form JSON metadata set by the owner
    #[serde(default, alias = "Data")]
    pub data: String,
}

impl NameRecord {
    pub fn new(name: impl Into<String>, value: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            data: data.into(),
        }
    }
}

/// Metadata document stored in [`NameRecord::data`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasMetadata {
    /// Directory under the owner's home that the alias serves as a site.
    #[serde(rename = "WWW", default)]
    pub www: Option<String>,
}

/// A resolved alias site: owner plus the site's root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasSite {
    pub owner: CanonicalOwner,
    /// Site root including the home directory, e.g. `s/site`
    pub root: VirtualPath,
}
