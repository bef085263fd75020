//! Error types for name resolution

use shepherd_types::PathError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("name not found: {name}")]
    NameNotFound { name: String },

    #[error("registry request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("registry returned status {status} for {name}")]
    Status { status: u16, name: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum AliasError {
    #[error("cannot resolve alias {name}: {source}")]
    Lookup {
        name: String,
        #[source]
        source: RegistryError,
    },

    #[error("alias {name} does not point at an owner")]
    MissingOwner { name: String },

    #[error("alias {name} has malformed metadata: {source}")]
    Metadata {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("alias {name} has no WWW root")]
    NoSiteRoot { name: String },

    #[error("alias {name} has an invalid WWW root: {source}")]
    InvalidSiteRoot {
        name: String,
        #[source]
        source: PathError,
    },
}

pub type Result<T> = std::result::Result<T, AliasError>;
