//! Content cache for the gateway.
//!
//! Maps `(owner as supplied, path as supplied)` to the bytes that were served
//! for it. Entries never expire: content is assumed immutable per address, so
//! nothing here evicts, bounds, or invalidates. Concurrent misses for the same
//! key may both fetch and both write; the last write wins.

use parking_lot::RwLock;
use sled::{Db, Tree};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Cache errors
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),
}

pub type Result<T> = std::result::Result<T, CacheError>;

/// Separator between the owner and the path inside a key.
pub const KEY_SEPARATOR: u8 = b'_';

/// Which route family an entry was served through.
///
/// Keys hold the path as the caller wrote it, so the same key can name
/// different bytes on different routes (`/p/x/blog` is a file, `/www/x/blog`
/// is `blog/index.html`). Each route gets its own keyspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyspace {
    /// `/p` and `/f`-style raw bytes.
    Raw,
    /// `/www`, with directory requests answered by `index.html`.
    Site,
    /// `/md`, rendered to an HTML page.
    Markdown,
    /// `/{alias}`, beneath the alias's site root.
    Alias,
}

impl Keyspace {
    fn tree_name(self) -> &'static str {
        match self {
            Keyspace::Raw => "raw",
            Keyspace::Site => "site",
            Keyspace::Markdown => "markdown",
            Keyspace::Alias => "alias",
        }
    }

    pub const ALL: [Keyspace; 4] = [
        Keyspace::Raw,
        Keyspace::Site,
        Keyspace::Markdown,
        Keyspace::Alias,
    ];
}

impl fmt::Display for Keyspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tree_name())
    }
}

/// Key of a cache entry: `owner + "_" + path` as bytes.
///
/// Both halves are kept exactly as the caller supplied them: the owner before
/// any registry lookup, the path before it is placed under the home directory
/// or completed with `index.html`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    keyspace: Keyspace,
    bytes: Vec<u8>,
}

impl CacheKey {
    pub fn new(owner: &str, path: &str, keyspace: Keyspace) -> Self {
        let mut bytes = Vec::with_capacity(owner.len() + 1 + path.len());
        bytes.extend_from_slice(owner.as_bytes());
        bytes.push(KEY_SEPARATOR);
        bytes.extend_from_slice(path.as_bytes());
        Self { keyspace, bytes }
    }

    pub fn keyspace(&self) -> Keyspace {
        self.keyspace
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            self.keyspace,
            String::from_utf8_lossy(&self.bytes)
        )
    }
}

/// Abstract cache trait
pub trait ContentCache: Send + Sync {
    /// `Ok(None)` on a miss; a miss is not an error.
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>>;
    fn put(&self, key: &CacheKey, content: &[u8]) -> Result<()>;
    fn len(&self) -> Result<usize>;
    fn keys(&self) -> Result<Vec<CacheKey>>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Sled-backed implementation
pub struct SledContentCache {
    db: Db,
    raw: Tree,
    site: Tree,
    markdown: Tree,
    alias: Tree,
}

impl SledContentCache {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        let raw = db.open_tree(Keyspace::Raw.tree_name())?;
        let site = db.open_tree(Keyspace::Site.tree_name())?;
        let markdown = db.open_tree(Keyspace::Markdown.tree_name())?;
        let alias = db.open_tree(Keyspace::Alias.tree_name())?;
        Ok(Self {
            db,
            raw,
            site,
            markdown,
            alias,
        })
    }

    fn tree(&self, keyspace: Keyspace) -> &Tree {
        match keyspace {
            Keyspace::Raw => &self.raw,
            Keyspace::Site => &self.site,
            Keyspace::Markdown => &self.markdown,
            Keyspace::Alias => &self.alias,
        }
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl ContentCache for SledContentCache {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        Ok(self
            .tree(key.keyspace)
            .get(key.as_bytes())?
            .map(|value| value.to_vec()))
    }

    fn put(&self, key: &CacheKey, content: &[u8]) -> Result<()> {
        self.tree(key.keyspace).insert(key.as_bytes(), content)?;
        tracing::debug!("cached {} ({} bytes)", key, content.len());
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(Keyspace::ALL
            .iter()
            .map(|keyspace| self.tree(*keyspace).len())
            .sum())
    }

    fn keys(&self) -> Result<Vec<CacheKey>> {
        let mut keys = Vec::new();
        for keyspace in Keyspace::ALL {
            for entry in self.tree(keyspace).iter().keys() {
                keys.push(CacheKey {
                    keyspace,
                    bytes: entry?.to_vec(),
                });
            }
        }
        Ok(keys)
    }
}

/// In-memory testing backend
#[derive(Default, Clone)]
pub struct MemoryContentCache {
    entries: Arc<RwLock<HashMap<CacheKey, Vec<u8>>>>,
}

impl MemoryContentCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContentCache for MemoryContentCache {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: &CacheKey, content: &[u8]) -> Result<()> {
        self.entries.write().insert(key.clone(), content.to_vec());
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.entries.read().len())
    }

    fn keys(&self) -> Result<Vec<CacheKey>> {
        Ok(self.entries.read().keys().cloned().collect())
    }
}
