//! Filetree lookup: derived address -> fids.

use crate::ledger::{LedgerError, LedgerQuery};
use serde::{Deserialize, Serialize};
use shepherd_types::{ContentAddress, OwnerScopedAddress};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocateError {
    #[error("cannot find file: {0}")]
    NotFound(#[source] LedgerError),

    #[error("cannot unmarshal file: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("file at {0} lists no fids")]
    NoFids(String),
}

/// Parsed `contents` of a filetree entry.
///
/// Fid order is preserved exactly as stored; only the first one is served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub fids: Vec<String>,
}

impl FileRecord {
    pub fn primary_fid(&self) -> Option<&str> {
        self.fids.first().map(String::as_str)
    }
}

/// Resolves derived addresses through the ledger's filetree.
#[derive(Clone)]
pub struct FileLocator {
    ledger: Arc<dyn LedgerQuery>,
}

impl FileLocator {
    pub fn new(ledger: Arc<dyn LedgerQuery>) -> Self {
        Self { ledger }
    }

    /// One lookup, no retry. The returned record always has at least one fid.
    pub async fn locate(
        &self,
        owner_address: &OwnerScopedAddress,
        address: &ContentAddress,
    ) -> Result<FileRecord, LocateError> {
        let entry = self
            .ledger
            .files(address, owner_address)
            .await
            .map_err(LocateError::NotFound)?;

        let record: FileRecord =
            serde_json::from_str(&entry.contents).map_err(LocateError::Malformed)?;

        if record.fids.is_empty() {
            return Err(LocateError::NoFids(address.to_string()));
        }

        tracing::debug!("{} -> {} fid(s)", address, record.fids.len());
        Ok(record)
    }
}
