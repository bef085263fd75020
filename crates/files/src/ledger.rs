//! Read-only queries against the ledger's REST endpoint.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shepherd_types::{ContentAddress, OwnerScopedAddress};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const FILETREE_FILES_PATH: &str = "jackal/canine-chain/filetree/files";
const STORAGE_FIND_FILE_PATH: &str = "jackal/canine-chain/storage/find_file";

/// Errors that can occur while querying the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("ledger has no record at {0}")]
    NotFound(String),

    #[error("ledger returned status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("malformed ledger response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Filetree entry stored at an (address, owner address) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTreeEntry {
    #[serde(default)]
    pub address: String,

    /// JSON document describing the file, e.g. `{"fids": ["jklf1..."]}`.
    pub contents: String,

    #[serde(default)]
    pub owner: String,
}

/// Answer to "which providers hold this fid".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindFileResponse {
    /// JSON-encoded list of provider base URLs.
    pub provider_ips: String,
}

#[derive(Debug, Deserialize)]
struct FilesResponse {
    files: FileTreeEntry,
}

#[async_trait]
pub trait LedgerQuery: Send + Sync {
    /// Fetch the filetree entry for a derived address pair.
    async fn files(
        &self,
        address: &ContentAddress,
        owner_address: &OwnerScopedAddress,
    ) -> Result<FileTreeEntry, LedgerError>;

    /// Fetch the providers advertising `fid`.
    async fn find_file(&self, fid: &str) -> Result<FindFileResponse, LedgerError>;
}

/// [`LedgerQuery`] over the chain's REST (LCD) endpoint.
#[derive(Debug, Clone)]
pub struct RestLedgerQuery {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl RestLedgerQuery {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            client,
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, LedgerError> {
        let url = format!("{}/{}", self.base_url, path);
        tracing::debug!("ledger query {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(LedgerError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            return Err(LedgerError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl LedgerQuery for RestLedgerQuery {
    async fn files(
        &self,
        address: &ContentAddress,
        owner_address: &OwnerScopedAddress,
    ) -> Result<FileTreeEntry, LedgerError> {
        let path = format!("{FILETREE_FILES_PATH}/{address}/{owner_address}");
        let response: FilesResponse = self.get_json(&path).await?;
        Ok(response.files)
    }

    async fn find_file(&self, fid: &str) -> Result<FindFileResponse, LedgerError> {
        self.get_json(&format!("{STORAGE_FIND_FILE_PATH}/{fid}"))
            .await
    }
}

/// In-memory ledger for tests and offline runs.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    files: Arc<RwLock<HashMap<(String, String), FileTreeEntry>>>,
    providers: Arc<RwLock<HashMap<String, String>>>,
    queries: Arc<AtomicUsize>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `contents` under the given address pair.
    pub fn insert_file(
        &self,
        address: &ContentAddress,
        owner_address: &OwnerScopedAddress,
        contents: impl Into<String>,
    ) {
        let entry = FileTreeEntry {
            address: address.to_string(),
            contents: contents.into(),
            owner: owner_address.to_string(),
        };
        self.files
            .write()
            .insert((address.to_string(), owner_address.to_string()), entry);
    }

    /// Advertise `providers` for `fid`.
    pub fn insert_providers<S: AsRef<str>>(&self, fid: &str, providers: &[S]) {
        let list: Vec<&str> = providers.iter().map(AsRef::as_ref).collect();
        // a list of strings always serializes
        let encoded = serde_json::to_string(&list).unwrap_or_else(|_| "[]".to_string());
        self.insert_raw_providers(fid, encoded);
    }

    /// Store the provider field verbatim, including malformed payloads.
    pub fn insert_raw_providers(&self, fid: &str, provider_ips: impl Into<String>) {
        self.providers
            .write()
            .insert(fid.to_string(), provider_ips.into());
    }

    /// Number of queries answered so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl LedgerQuery for MemoryLedger {
    async fn files(
        &self,
        address: &ContentAddress,
        owner_address: &OwnerScopedAddress,
    ) -> Result<FileTreeEntry, LedgerError> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        self.files
            .read()
            .get(&(address.to_string(), owner_address.to_string()))
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("{address}/{owner_address}")))
    }

    async fn find_file(&self, fid: &str) -> Result<FindFileResponse, LedgerError> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        self.providers
            .read()
            .get(fid)
            .map(|provider_ips| FindFileResponse {
                provider_ips: provider_ips.clone(),
            })
            .ok_or_else(|| LedgerError::NotFound(fid.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shepherd_types::{resolve_address, scope_to_owner, CanonicalOwner, VirtualPath};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const OWNER: &str = "jkl1qqqsyqcyq5rqwzqfpg9scrgwpugpzysn6gltgx";

    fn addresses() -> (ContentAddress, OwnerScopedAddress) {
        let address = resolve_address(&VirtualPath::parse("s/docs/readme.md").unwrap());
        let owner = CanonicalOwner::parse(OWNER).unwrap();
        let scoped = scope_to_owner(&address, &owner);
        (address, scoped)
    }

    fn client(server: &MockServer) -> RestLedgerQuery {
        RestLedgerQuery::new(
            format!("{}/", server.uri()),
            reqwest::Client::new(),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn rest_files_reads_entry() {
        let server = MockServer::start().await;
        let (address, scoped) = addresses();

        Mock::given(method("GET"))
            .and(path(format!("/{FILETREE_FILES_PATH}/{address}/{scoped}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "files": {
                    "address": address.as_str(),
                    "contents": "{\"fids\":[\"jklf1abc\"]}",
                    "owner": scoped.as_str(),
                }
            })))
            .mount(&server)
            .await;

        let entry = client(&server).files(&address, &scoped).await.unwrap();
        assert_eq!(entry.contents, "{\"fids\":[\"jklf1abc\"]}");
    }

    #[tokio::test]
    async fn rest_maps_404_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client(&server).find_file("jklf1missing").await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[tokio::test]
    async fn rest_maps_other_errors_to_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client(&server).find_file("jklf1abc").await.unwrap_err();
        assert!(matches!(err, LedgerError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn rest_find_file_keeps_embedded_list_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/{STORAGE_FIND_FILE_PATH}/jklf1abc")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "provider_ips": "[\"https://p1.example\",\"https://p2.example\"]"
            })))
            .mount(&server)
            .await;

        let response = client(&server).find_file("jklf1abc").await.unwrap();
        assert_eq!(
            response.provider_ips,
            "[\"https://p1.example\",\"https://p2.example\"]"
        );
    }

    #[tokio::test]
    async fn memory_ledger_counts_queries() {
        let ledger = MemoryLedger::new();
        let (address, scoped) = addresses();
        ledger.insert_file(&address, &scoped, "{\"fids\":[]}");
        ledger.insert_providers("jklf1abc", &["https://p1.example"]);

        assert!(ledger.files(&address, &scoped).await.is_ok());
        let providers = ledger.find_file("jklf1abc").await.unwrap();
        assert_eq!(providers.provider_ips, "[\"https://p1.example\"]");
        assert_eq!(ledger.query_count(), 2);
    }
}
