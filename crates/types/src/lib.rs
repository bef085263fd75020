//! Shared types for the Shepherd gateway.
//!
//! Everything in this crate is pure: splitting request paths into
//! [`VirtualPath`]s, classifying owners, deriving the filetree addresses the
//! ledger indexes files under, and mapping file extensions to MIME types.

pub mod address;
pub mod mime;
pub mod owner;
pub mod path;

pub use address::*;
pub use mime::*;
pub use owner::*;
pub use path::*;
