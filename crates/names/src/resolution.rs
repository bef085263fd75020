//! Alias resolution service

use crate::errors::*;
use crate::registry::NameRegistry;
use crate::types::*;
use shepherd_types::{CanonicalOwner, OwnerIdentity, VirtualPath};
use std::sync::Arc;

/// Default suffix appended to aliases before a registry lookup.
pub const DEFAULT_ALIAS_SUFFIX: &str = "jkl";

/// Alias resolution service
///
/// Turns whatever the caller put in the owner position into a canonical
/// account. Canonical input never reaches the registry. Lookups are not
/// retried and not cached.
#[derive(Clone)]
pub struct AliasResolver {
    registry: Arc<dyn NameRegistry>,
    suffix: String,
}

impl AliasResolver {
    pub fn new(registry: Arc<dyn NameRegistry>, suffix: impl Into<String>) -> Self {
        Self {
            registry,
            suffix: suffix.into(),
        }
    }

    /// `alias` -> `alias.<suffix>`
    pub fn qualified_name(&self, alias: &str) -> String {
        format!("{}.{}", alias, self.suffix)
    }

    /// Resolve an owner that may be an alias.
    pub async fn resolve(&self, owner: &str) -> Result<CanonicalOwner> {
        match OwnerIdentity::classify(owner) {
            OwnerIdentity::Canonical(owner) => Ok(owner),
            OwnerIdentity::Alias(alias) => {
                let record = self.lookup(&alias).await?;
                owner_of(&alias, &record)
            }
        }
    }

    /// Resolve an alias to its owner and `WWW` site root.
    ///
    /// The root is placed under the owner's home directory, so `WWW = "site"`
    /// yields `s/site`.
    pub async fn resolve_site(&self, alias: &str) -> Result<AliasSite> {
        let record = self.lookup(alias).await?;
        let owner = owner_of(alias, &record)?;

        let metadata: AliasMetadata =
            serde_json::from_str(&record.data).map_err(|source| AliasError::Metadata {
                name: alias.to_string(),
                source,
            })?;
        let www = metadata
            .www
            .filter(|www| !www.trim().is_empty())
            .ok_or_else(|| AliasError::NoSiteRoot {
                name: alias.to_string(),
            })?;
        let root = VirtualPath::under_root(&www).map_err(|source| AliasError::InvalidSiteRoot {
            name: alias.to_string(),
            source,
        })?;

        Ok(AliasSite { owner, root })
    }

    async fn lookup(&self, alias: &str) -> Result<NameRecord> {
        let name = self.qualified_name(alias);
        tracing::debug!("resolving alias {}", name);
        self.registry
            .names(&name)
            .await
            .map_err(|source| AliasError::Lookup {
                name: alias.to_string(),
                source,
            })
    }
}

fn owner_of(alias: &str, record: &NameRecord) -> Result<CanonicalOwner> {
    if record.value.trim().is_empty() {
        return Err(AliasError::MissingOwner {
            name: alias.to_string(),
        });
    }
    Ok(CanonicalOwner::from_registry(record.value.clone()))
}
