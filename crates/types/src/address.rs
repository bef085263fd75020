//! Filetree address derivation.
//!
//! The ledger indexes every file under two keys: a content address built by
//! hash-chaining the path segments, and an owner-scoped address that binds the
//! content address to one account. Both must match the chain's own scheme
//! exactly; a wrong digest is indistinguishable from a missing file.

use crate::owner::CanonicalOwner;
use crate::path::VirtualPath;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Length of a hex-encoded sha256 digest.
pub const ADDRESS_HEX_LENGTH: usize = 64;

/// Prefix mixed into the owner-scoped digest.
const OWNER_SCOPE_PREFIX: &str = "o";

/// Hex digest identifying a path in the filetree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentAddress(String);

/// Hex digest binding a [`ContentAddress`] to an owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerScopedAddress(String);

impl ContentAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl OwnerScopedAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for OwnerScopedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `hex(sha256(input))`
pub fn hash_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// One link of the chain: `H(acc + H(segment))`.
fn chain(acc: &str, segment: &str) -> String {
    let mut joined = String::with_capacity(acc.len() + ADDRESS_HEX_LENGTH);
    joined.push_str(acc);
    joined.push_str(&hash_hex(segment));
    hash_hex(&joined)
}

/// Fold the directory segments, seeded with the empty string.
pub fn parent_digest(parents: &[String]) -> String {
    parents
        .iter()
        .fold(String::new(), |acc, segment| chain(&acc, segment))
}

/// Derive the content address of `path`.
pub fn resolve_address(path: &VirtualPath) -> ContentAddress {
    let parent = parent_digest(path.parents());
    ContentAddress(chain(&parent, path.leaf()))
}

/// Bind `address` to `owner`: `H("o" + address + H(owner))`.
pub fn scope_to_owner(address: &ContentAddress, owner: &CanonicalOwner) -> OwnerScopedAddress {
    let input = format!(
        "{OWNER_SCOPE_PREFIX}{}{}",
        address.as_str(),
        hash_hex(owner.as_str())
    );
    OwnerScopedAddress(hash_hex(&input))
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: &str = "jkl1qqqsyqcyq5rqwzqfpg9scrgwpugpzysn6gltgx";
    const OTHER_OWNER: &str = "jkl1qurswpc8qurswpc8qurswpc8qurswpc82dfte7";

    fn path(raw: &str) -> VirtualPath {
        VirtualPath::parse(raw).unwrap()
    }

    #[test]
    fn hash_hex_of_empty_string() {
        assert_eq!(
            hash_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn content_address_matches_known_vector() {
        let address = resolve_address(&path("s/docs/readme.md"));
        assert_eq!(
            address.as_str(),
            "c2aed87b1ddae2bb3ac2f6295721e9ee626776abe2b27b8ca64f9ec745c980b7"
        );
        assert_eq!(address.as_str().len(), ADDRESS_HEX_LENGTH);
    }

    #[test]
    fn single_segment_is_chained_from_empty_seed() {
        let address = resolve_address(&path("s"));
        assert_eq!(address.as_str(), hash_hex(&hash_hex("s")));
    }

    #[test]
    fn owner_scope_matches_known_vector() {
        let address = resolve_address(&path("s/docs/readme.md"));
        let owner = CanonicalOwner::parse(OWNER).unwrap();
        assert_eq!(
            scope_to_owner(&address, &owner).as_str(),
            "b791b2cb3bccb083c41a437cdbe47726df93c46a4de2da7a54858752231aaf86"
        );
    }

    #[test]
    fn address_is_deterministic() {
        let first = resolve_address(&path("s/a/b/c.txt"));
        let second = resolve_address(&path("s/a/b/c.txt"));
        assert_eq!(first, second);
    }

    #[test]
    fn segment_changes_and_reordering_change_address() {
        let base = resolve_address(&path("s/a/b/c.txt"));
        let changed = resolve_address(&path("s/a/x/c.txt"));
        let reordered = resolve_address(&path("s/b/a/c.txt"));
        let leaf = resolve_address(&path("s/a/b/d.txt"));

        assert_ne!(base, changed);
        assert_ne!(base, reordered);
        assert_ne!(base, leaf);
        assert_ne!(changed, reordered);
    }

    #[test]
    fn owner_scope_differs_per_owner() {
        let address = resolve_address(&path("s/site/index.html"));
        let alice = CanonicalOwner::parse(OWNER).unwrap();
        let bob = CanonicalOwner::parse(OTHER_OWNER).unwrap();

        assert_ne!(scope_to_owner(&address, &alice), scope_to_owner(&address, &bob));
        assert_eq!(scope_to_owner(&address, &alice), scope_to_owner(&address, &alice));
    }
}
