//! Name Registry for Human-Readable Owners
//!
//! Aliases such as `myproject` are registered on the ledger's name service as
//! `myproject.jkl`. Each record points at an owner account (`value`) and may
//! carry JSON metadata (`data`), including the `WWW` directory a site is
//! served from.

pub mod errors;
pub mod registry;
pub mod resolution;
pub mod types;

pub use errors::*;
pub use registry::{MemoryNameRegistry, NameRegistry, RestNameRegistry};
pub use resolution::{AliasResolver, DEFAULT_ALIAS_SUFFIX};
pub use types::*;
