//! Provider download with randomized fail-over.

use crate::ledger::{LedgerError, LedgerQuery};
use crate::markdown::render_page;
use rand::seq::SliceRandom;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION, USER_AGENT};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const BROWSER_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("cannot find providers for {fid}: {source}")]
    ProviderLookup {
        fid: String,
        #[source]
        source: LedgerError,
    },

    #[error("provider list for {fid} is malformed: {source}")]
    ProviderList {
        fid: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to download {fid} from any provider ({attempted} attempted)")]
    AllProvidersFailed { fid: String, attempted: usize },
}

/// Why a single provider attempt was abandoned.
#[derive(Debug, Error)]
enum AttemptError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("bad status: {0}")]
    Status(reqwest::StatusCode),
    #[error("file cannot be empty")]
    EmptyBody,
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// What to do with an empty Markdown body.
///
/// Non-Markdown downloads always reject empty bodies; Markdown downloads
/// accept them by default and render an empty page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyBodyPolicy {
    #[default]
    Allow,
    Reject,
}

impl EmptyBodyPolicy {
    pub fn from_config(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "reject" => EmptyBodyPolicy::Reject,
            _ => EmptyBodyPolicy::Allow,
        }
    }
}

/// Post-processing applied to a downloaded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchMode {
    Raw,
    /// Render to a complete HTML page with the given title.
    Markdown { title: String },
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Deadline for one provider, connect to last byte.
    pub provider_timeout: Duration,
    /// Providers tried per fetch at most.
    pub max_attempts: usize,
    /// Wall-clock cap across all attempts.
    pub total_budget: Duration,
    pub empty_markdown: EmptyBodyPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(30),
            max_attempts: 16,
            total_budget: Duration::from_secs(120),
            empty_markdown: EmptyBodyPolicy::Allow,
        }
    }
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert("upgrade-insecure-requests", HeaderValue::from_static("1"));
    headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.8"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers
}

/// Downloads fids from the providers that advertise them.
#[derive(Clone)]
pub struct ProviderFetcher {
    ledger: Arc<dyn LedgerQuery>,
    http: reqwest::Client,
    config: FetchConfig,
}

impl ProviderFetcher {
    pub fn new(ledger: Arc<dyn LedgerQuery>, http: reqwest::Client, config: FetchConfig) -> Self {
        Self {
            ledger,
            http,
            config,
        }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Providers advertised for `fid`, in ledger order.
    pub async fn providers(&self, fid: &str) -> Result<Vec<String>, FetchError> {
        let response = self
            .ledger
            .find_file(fid)
            .await
            .map_err(|source| FetchError::ProviderLookup {
                fid: fid.to_string(),
                source,
            })?;

        serde_json::from_str(&response.provider_ips).map_err(|source| FetchError::ProviderList {
            fid: fid.to_string(),
            source,
        })
    }

    /// Download `fid` from the first provider that serves it.
    ///
    /// Providers are shuffled, then tried sequentially, each under
    /// `provider_timeout`, until one answers 200 with a usable body or the
    /// attempt/time budget runs out. Nothing is returned on failure, so no
    /// partial bytes ever reach the caller.
    pub async fn fetch(&self, fid: &str, mode: &FetchMode) -> Result<Vec<u8>, FetchError> {
        let mut providers = self.providers(fid).await?;
        providers.shuffle(&mut rand::thread_rng());

        let deadline = Instant::now() + self.config.total_budget;
        let mut attempted = 0;

        for provider in providers.iter().take(self.config.max_attempts.max(1)) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!("fetch budget for {} exhausted after {} attempt(s)", fid, attempted);
                break;
            }
            let limit = remaining.min(self.config.provider_timeout);
            attempted += 1;

            let outcome = match timeout(limit, self.download(provider, fid)).await {
                Ok(result) => result.and_then(|body| self.finish(body, mode)),
                Err(_) => Err(AttemptError::Timeout(limit)),
            };

            match outcome {
                Ok(content) => {
                    debug!("{} served by {} ({} bytes)", fid, provider, content.len());
                    return Ok(content);
                }
                Err(err) => warn!("provider {} failed for {}: {}", provider, fid, err),
            }
        }

        Err(FetchError::AllProvidersFailed {
            fid: fid.to_string(),
            attempted,
        })
    }

    async fn download(&self, provider: &str, fid: &str) -> Result<Vec<u8>, AttemptError> {
        let url = format!("{}/download/{}", provider.trim_end_matches('/'), fid);
        let response = self
            .http
            .get(&url)
            .headers(browser_headers())
            .send()
            .await?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(AttemptError::Status(response.status()));
        }

        Ok(response.bytes().await?.to_vec())
    }

    /// Apply `mode` to a downloaded body.
    fn finish(&self, body: Vec<u8>, mode: &FetchMode) -> Result<Vec<u8>, AttemptError> {
        match mode {
            FetchMode::Raw => {
                if body.is_empty() {
                    return Err(AttemptError::EmptyBody);
                }
                Ok(body)
            }
            FetchMode::Markdown { title } => {
                if body.is_empty() && self.config.empty_markdown == EmptyBodyPolicy::Reject {
                    return Err(AttemptError::EmptyBody);
                }
                // invalid sequences become U+FFFD
                let markdown = String::from_utf8_lossy(&body);
                Ok(render_page(&markdown, title).into_bytes())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FID: &str = "jklf1testfid";
    const UNREACHABLE: &str = "http://127.0.0.1:1";

    fn fetcher(ledger: &MemoryLedger, config: FetchConfig) -> ProviderFetcher {
        ProviderFetcher::new(Arc::new(ledger.clone()), reqwest::Client::new(), config)
    }

    async fn provider(status: u16, body: &'static str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/download/{FID}")))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn single_responsive_provider_always_wins() {
        let good = provider(200, "payload").await;
        let bad_a = provider(500, "").await;
        let bad_b = provider(404, "").await;

        let ledger = MemoryLedger::new();
        ledger.insert_providers(
            FID,
            &[bad_a.uri(), UNREACHABLE.to_string(), good.uri(), bad_b.uri()],
        );
        let fetcher = fetcher(&ledger, FetchConfig::default());

        // shuffling puts the good provider anywhere; every order must succeed
        for _ in 0..8 {
            let content = fetcher.fetch(FID, &FetchMode::Raw).await.unwrap();
            assert_eq!(content, b"payload");
        }
    }

    #[tokio::test]
    async fn no_responsive_provider_is_aggregate_failure() {
        let bad = provider(503, "").await;
        let ledger = MemoryLedger::new();
        ledger.insert_providers(FID, &[bad.uri(), UNREACHABLE.to_string()]);

        let err = fetcher(&ledger, FetchConfig::default())
            .fetch(FID, &FetchMode::Raw)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FetchError::AllProvidersFailed { attempted: 2, .. }
        ));
    }

    #[tokio::test]
    async fn empty_provider_list_fails() {
        let ledger = MemoryLedger::new();
        ledger.insert_providers::<&str>(FID, &[]);

        let err = fetcher(&ledger, FetchConfig::default())
            .fetch(FID, &FetchMode::Raw)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FetchError::AllProvidersFailed { attempted: 0, .. }
        ));
    }

    #[tokio::test]
    async fn malformed_provider_list_is_rejected() {
        let ledger = MemoryLedger::new();
        ledger.insert_raw_providers(FID, "not a list");

        let err = fetcher(&ledger, FetchConfig::default())
            .fetch(FID, &FetchMode::Raw)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::ProviderList { .. }));
    }

    #[tokio::test]
    async fn unknown_fid_is_provider_lookup_error() {
        let ledger = MemoryLedger::new();
        let err = fetcher(&ledger, FetchConfig::default())
            .fetch(FID, &FetchMode::Raw)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::ProviderLookup { .. }));
    }

    #[tokio::test]
    async fn empty_body_rejected_for_raw_but_rendered_for_markdown() {
        let empty = provider(200, "").await;
        let ledger = MemoryLedger::new();
        ledger.insert_providers(FID, &[empty.uri()]);
        let fetcher = fetcher(&ledger, FetchConfig::default());

        let raw = fetcher.fetch(FID, &FetchMode::Raw).await;
        assert!(matches!(raw, Err(FetchError::AllProvidersFailed { .. })));

        let markdown = FetchMode::Markdown {
            title: "empty.md".into(),
        };
        let page = fetcher.fetch(FID, &markdown).await.unwrap();
        assert!(String::from_utf8(page).unwrap().contains("<title>empty.md</title>"));
    }

    #[tokio::test]
    async fn empty_markdown_rejected_when_configured() {
        let empty = provider(200, "").await;
        let ledger = MemoryLedger::new();
        ledger.insert_providers(FID, &[empty.uri()]);
        let config = FetchConfig {
            empty_markdown: EmptyBodyPolicy::Reject,
            ..FetchConfig::default()
        };

        let markdown = FetchMode::Markdown {
            title: "empty.md".into(),
        };
        let err = fetcher(&ledger, config).fetch(FID, &markdown).await.unwrap_err();
        assert!(matches!(err, FetchError::AllProvidersFailed { .. }));
    }

    #[tokio::test]
    async fn markdown_is_rendered() {
        let md = provider(200, "# Hi").await;
        let ledger = MemoryLedger::new();
        ledger.insert_providers(FID, &[md.uri()]);

        let page = fetcher(&ledger, FetchConfig::default())
            .fetch(
                FID,
                &FetchMode::Markdown {
                    title: "readme.md".into(),
                },
            )
            .await
            .unwrap();
        assert!(String::from_utf8(page).unwrap().contains("<h1>Hi</h1>"));
    }

    #[tokio::test]
    async fn markdown_with_invalid_utf8_still_renders() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/download/{FID}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"# Caf\xe9".to_vec()))
            .mount(&server)
            .await;
        let ledger = MemoryLedger::new();
        ledger.insert_providers(FID, &[server.uri()]);

        let page = fetcher(&ledger, FetchConfig::default())
            .fetch(
                FID,
                &FetchMode::Markdown {
                    title: "cafe.md".into(),
                },
            )
            .await
            .unwrap();
        let page = String::from_utf8(page).unwrap();
        assert!(page.contains("<h1>Caf\u{fffd}</h1>"));
    }

    #[tokio::test]
    async fn slow_provider_times_out_and_next_is_tried() {
        let slow = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&slow)
            .await;
        let good = provider(200, "fast").await;

        let ledger = MemoryLedger::new();
        ledger.insert_providers(FID, &[slow.uri(), good.uri()]);
        let config = FetchConfig {
            provider_timeout: Duration::from_millis(200),
            ..FetchConfig::default()
        };

        let started = std::time::Instant::now();
        let content = fetcher(&ledger, config).fetch(FID, &FetchMode::Raw).await.unwrap();
        assert_eq!(content, b"fast");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn attempts_are_capped() {
        let bad_a = provider(500, "").await;
        let bad_b = provider(500, "").await;
        let bad_c = provider(500, "").await;
        let ledger = MemoryLedger::new();
        ledger.insert_providers(FID, &[bad_a.uri(), bad_b.uri(), bad_c.uri()]);
        let config = FetchConfig {
            max_attempts: 2,
            ..FetchConfig::default()
        };

        let err = fetcher(&ledger, config)
            .fetch(FID, &FetchMode::Raw)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FetchError::AllProvidersFailed { attempted: 2, .. }
        ));
    }

    #[tokio::test]
    async fn total_budget_stops_further_attempts() {
        let mut slow = Vec::new();
        for _ in 0..4 {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(
                    ResponseTemplate::new(500).set_delay(Duration::from_millis(250)),
                )
                .mount(&server)
                .await;
            slow.push(server);
        }
        let uris: Vec<String> = slow.iter().map(MockServer::uri).collect();
        let ledger = MemoryLedger::new();
        ledger.insert_providers(FID, &uris);
        let config = FetchConfig {
            provider_timeout: Duration::from_secs(1),
            total_budget: Duration::from_millis(300),
            ..FetchConfig::default()
        };

        let started = std::time::Instant::now();
        let err = fetcher(&ledger, config)
            .fetch(FID, &FetchMode::Raw)
            .await
            .unwrap_err();

        match err {
            FetchError::AllProvidersFailed { attempted, .. } => {
                assert!(attempted >= 1);
                assert!(attempted < uris.len());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn browser_headers_are_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/download/{FID}")))
            .and(header("upgrade-insecure-requests", "1"))
            .and(header_exists("user-agent"))
            .and(header_exists("accept-language"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;
        let ledger = MemoryLedger::new();
        ledger.insert_providers(FID, &[server.uri()]);

        let content = fetcher(&ledger, FetchConfig::default())
            .fetch(FID, &FetchMode::Raw)
            .await
            .unwrap();
        assert_eq!(content, b"ok");
    }

    #[test]
    fn empty_body_policy_parses() {
        assert_eq!(EmptyBodyPolicy::from_config("Reject"), EmptyBodyPolicy::Reject);
        assert_eq!(EmptyBodyPolicy::from_config("allow"), EmptyBodyPolicy::Allow);
        assert_eq!(EmptyBodyPolicy::from_config("anything"), EmptyBodyPolicy::Allow);
    }
}
