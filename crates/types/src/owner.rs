use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors that can occur when parsing a canonical owner.
#[derive(Debug, thiserror::Error)]
pub enum OwnerError {
    #[error("owner is not a valid bech32 account: {0}")]
    InvalidBech32(String),
}

/// Owner as supplied by a caller: either an account or an alias that still
/// has to go through the name registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OwnerIdentity {
    Canonical(CanonicalOwner),
    Alias(String),
}

impl OwnerIdentity {
    /// Classify `raw` without touching the network.
    pub fn classify(raw: &str) -> Self {
        match CanonicalOwner::parse(raw) {
            Ok(owner) => OwnerIdentity::Canonical(owner),
            Err(_) => OwnerIdentity::Alias(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            OwnerIdentity::Canonical(owner) => owner.as_str(),
            OwnerIdentity::Alias(alias) => alias,
        }
    }

    pub fn is_canonical(&self) -> bool {
        matches!(self, OwnerIdentity::Canonical(_))
    }
}

/// Account identifier in its self-checksummed bech32 form (`jkl1...`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalOwner(String);

impl CanonicalOwner {
    /// Accept `raw` only if it decodes as bech32 with a valid checksum.
    pub fn parse(raw: &str) -> Result<Self, OwnerError> {
        bech32::decode(raw).map_err(|err| OwnerError::InvalidBech32(err.to_string()))?;
        Ok(Self(raw.to_string()))
    }

    /// Wrap an account taken verbatim from the name registry.
    ///
    /// Registry values are authoritative; they are not re-validated.
    pub fn from_registry(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
