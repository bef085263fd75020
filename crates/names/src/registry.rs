//! Name registry backends.

use crate::errors::RegistryError;
use crate::types::NameRecord;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const RNS_NAMES_PATH: &str = "jackal/canine-chain/rns/names";

#[async_trait]
pub trait NameRegistry: Send + Sync {
    /// Look up a fully-qualified name such as `myproject.jkl`.
    async fn names(&self, name: &str) -> Result<NameRecord, RegistryError>;
}

#[derive(Debug, Deserialize)]
struct NamesResponse {
    names: NameRecord,
}

/// [`NameRegistry`] over the chain's REST (LCD) endpoint.
#[derive(Debug, Clone)]
pub struct RestNameRegistry {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl RestNameRegistry {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            timeout,
        }
    }
}

#[async_trait]
impl NameRegistry for RestNameRegistry {
    async fn names(&self, name: &str) -> Result<NameRecord, RegistryError> {
        let url = format!("{}/{}/{}", self.base_url, RNS_NAMES_PATH, name);
        tracing::debug!("registry query {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RegistryError::NameNotFound {
                name: name.to_string(),
            });
        }
        if !status.is_success() {
            return Err(RegistryError::Status {
                status: status.as_u16(),
                name: name.to_string(),
            });
        }

        let body = response.bytes().await?;
        let parsed: NamesResponse = serde_json::from_slice(&body)?;
        Ok(parsed.names)
    }
}

/// Registry backed by an in-memory hashmap.
#[derive(Clone, Default)]
pub struct MemoryNameRegistry {
    records: Arc<RwLock<HashMap<String, NameRecord>>>,
    lookups: Arc<AtomicUsize>,
}

impl MemoryNameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `record` under its fully-qualified name.
    pub fn insert(&self, name: impl Into<String>, record: NameRecord) {
        self.records.write().insert(name.into(), record);
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl NameRegistry for MemoryNameRegistry {
    async fn names(&self, name: &str) -> Result<NameRecord, RegistryError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.records
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NameNotFound {
                name: name.to_string(),
            })
    }
}
