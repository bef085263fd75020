//! Shepherd file retrieval
//!
//! Looks up which content identifiers (fids) the ledger's filetree stores at a
//! derived address, then downloads a fid from one of the storage providers
//! that claim to hold it. Providers are untrusted third-party hosts: they are
//! tried one at a time in random order, each under its own deadline, and the
//! first one that answers 200 wins.

pub mod fetcher;
pub mod ledger;
pub mod locator;
pub mod markdown;

pub use fetcher::{EmptyBodyPolicy, FetchConfig, FetchError, FetchMode, ProviderFetcher};
pub use ledger::{
    FileTreeEntry, FindFileResponse, LedgerError, LedgerQuery, MemoryLedger, RestLedgerQuery,
};
pub use locator::{FileLocator, FileRecord, LocateError};
pub use markdown::render_page;
