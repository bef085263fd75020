//! Request pipeline: alias -> address -> cache -> filetree -> providers -> cache.

use std::sync::Arc;

use shepherd_files::{FetchMode, FileLocator, LocateError, ProviderFetcher};
use shepherd_names::AliasResolver;
use shepherd_storage::{CacheKey, ContentCache, Keyspace};
use shepherd_types::{resolve_address, scope_to_owner, CanonicalOwner, VirtualPath};
use tracing::{debug, error, info, warn};

use crate::errors::GatewayError;

/// Which owner/path route a request came in on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRoute {
    /// `/p`: bytes as stored.
    Raw,
    /// `/www`: bytes as stored, directories resolve to `index.html`.
    Site,
    /// `/md`: rendered to an HTML page.
    Markdown,
}

impl PathRoute {
    pub fn prefix(self) -> &'static str {
        match self {
            PathRoute::Raw => "p",
            PathRoute::Site => "www",
            PathRoute::Markdown => "md",
        }
    }

    pub fn keyspace(self) -> Keyspace {
        match self {
            PathRoute::Raw => Keyspace::Raw,
            PathRoute::Site => Keyspace::Site,
            PathRoute::Markdown => Keyspace::Markdown,
        }
    }

    fn prepare(self, path: VirtualPath) -> VirtualPath {
        match self {
            PathRoute::Site => path.with_index_document(),
            PathRoute::Raw | PathRoute::Markdown => path,
        }
    }

    fn fetch_mode(self, path: &VirtualPath) -> FetchMode {
        match self {
            PathRoute::Markdown => FetchMode::Markdown {
                title: path.leaf().to_string(),
            },
            PathRoute::Raw | PathRoute::Site => FetchMode::Raw,
        }
    }
}

/// A successful response body plus what the router needs to label it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    pub body: Vec<u8>,
    /// Resolved virtual path; `None` for fid requests.
    pub path: Option<VirtualPath>,
    pub keyspace: Keyspace,
    pub from_cache: bool,
}

/// Runs one request through every stage in order, sequentially.
///
/// Dropping the returned future abandons the request at whichever await point
/// it reached; nothing is written to the cache unless the fetch completed.
#[derive(Clone)]
pub struct Gateway {
    resolver: AliasResolver,
    locator: FileLocator,
    fetcher: ProviderFetcher,
    cache: Option<Arc<dyn ContentCache>>,
}

impl Gateway {
    pub fn new(
        resolver: AliasResolver,
        locator: FileLocator,
        fetcher: ProviderFetcher,
        cache: Option<Arc<dyn ContentCache>>,
    ) -> Self {
        Self {
            resolver,
            locator,
            fetcher,
            cache,
        }
    }

    pub fn cache(&self) -> Option<&Arc<dyn ContentCache>> {
        self.cache.as_ref()
    }

    /// `/f/{fid}`: download by fid. Never touches the cache.
    pub async fn by_fid(&self, fid: &str) -> Result<Served, GatewayError> {
        if fid.trim().is_empty() {
            return Err(GatewayError::MissingParameter("fid"));
        }

        let body = self
            .fetcher
            .fetch(fid, &FetchMode::Raw)
            .await
            .map_err(|err| failed(&format!("/f/{fid}"), err.into()))?;

        Ok(Served {
            body,
            path: None,
            keyspace: Keyspace::Raw,
            from_cache: false,
        })
    }

    /// `/p`, `/www` and `/md`: `relative` is taken beneath the owner's home
    /// directory. `owner` may be canonical or an alias.
    pub async fn by_path(
        &self,
        owner: &str,
        relative: &str,
        route: PathRoute,
    ) -> Result<Served, GatewayError> {
        let request = format!("/{}/{}/{}", route.prefix(), owner, relative);
        if owner.trim().is_empty() {
            return Err(GatewayError::MissingParameter("owner"));
        }
        let supplied = VirtualPath::parse(relative)?;
        let path = route.prepare(VirtualPath::under_root(relative)?);
        let key = CacheKey::new(owner, &supplied.to_string(), route.keyspace());

        let canonical = self
            .resolver
            .resolve(owner)
            .await
            .map_err(|err| failed(&request, err.into()))?;

        self.serve(key, &canonical, path, route.fetch_mode(&supplied))
            .await
            .map_err(|err| failed(&request, err))
    }

    /// `/{alias}` and `/{alias}/{path}`: served like `/www` beneath the
    /// alias's `WWW` site root.
    pub async fn by_alias(
        &self,
        alias: &str,
        relative: Option<&str>,
    ) -> Result<Served, GatewayError> {
        let request = format!("/{}/{}", alias, relative.unwrap_or_default());
        let relative = match relative {
            Some(raw) if !raw.trim_matches('/').is_empty() => Some(VirtualPath::parse(raw)?),
            _ => None,
        };
        let supplied = relative.as_ref().map(ToString::to_string).unwrap_or_default();
        let key = CacheKey::new(alias, &supplied, Keyspace::Alias);

        let site = self
            .resolver
            .resolve_site(alias)
            .await
            .map_err(|err| failed(&request, err.into()))?;
        let path = match relative {
            Some(relative) => site.root.join(&relative),
            None => site.root.clone(),
        };
        let path = PathRoute::Site.prepare(path);

        self.serve(key, &site.owner, path, FetchMode::Raw)
            .await
            .map_err(|err| failed(&request, err))
    }

    async fn serve(
        &self,
        key: CacheKey,
        owner: &CanonicalOwner,
        path: VirtualPath,
        mode: FetchMode,
    ) -> Result<Served, GatewayError> {
        let address = resolve_address(&path);
        let scoped = scope_to_owner(&address, owner);
        debug!("{} owned by {} -> {}", path, owner, address);

        if let Some(body) = self.cached(&key) {
            return Ok(Served {
                body,
                path: Some(path),
                keyspace: key.keyspace(),
                from_cache: true,
            });
        }

        let record = self.locator.locate(&scoped, &address).await?;
        let fid = record
            .primary_fid()
            .ok_or_else(|| LocateError::NoFids(address.to_string()))?;

        let body = self.fetcher.fetch(fid, &mode).await?;
        self.store(&key, &body);

        Ok(Served {
            body,
            path: Some(path),
            keyspace: key.keyspace(),
            from_cache: false,
        })
    }

    fn cached(&self, key: &CacheKey) -> Option<Vec<u8>> {
        let cache = self.cache.as_ref()?;
        match cache.get(key) {
            Ok(Some(body)) => {
                debug!("cache hit {}", key);
                Some(body)
            }
            Ok(None) => None,
            Err(err) => {
                warn!("cache read for {} failed, fetching instead: {}", key, err);
                None
            }
        }
    }

    fn store(&self, key: &CacheKey, body: &[u8]) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        match cache.put(key, body) {
            Ok(()) => info!("cached {} ({} bytes)", key, body.len()),
            Err(err) => warn!("failed to cache {}: {}", key, err),
        }
    }
}

fn failed(request: &str, err: GatewayError) -> GatewayError {
    if err.is_input() {
        debug!("rejected {}: {}", request, err);
    } else {
        error!("{} failed: {}", request, err);
    }
    err
}
