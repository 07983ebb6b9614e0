//! # Module map fetching.
//!
//! [`ManifestFetcher`] is the seam between the poll loop and the transport. The shipped
//! implementation, [`HttpManifestFetcher`], performs a conditional `GET`:
//!
//! ```text
//! previous token is an ETag ──► If-None-Match: <etag>
//!
//! 304 Not Modified             ──► FetchOutcome::Unchanged
//! 2xx, token == previous       ──► FetchOutcome::Unchanged   (hash match when no ETag)
//! 2xx, new token               ──► FetchOutcome::Changed(map)
//! other status                 ──► FetchError::HttpStatus
//! transport error              ──► FetchError::Network
//! invalid document             ──► FetchError::Parse
//! deadline exceeded            ──► FetchError::Timeout
//! ```
//!
//! ## Rules
//! - Never panics and never retries; the poll loop owns retry policy.
//! - No side effects besides the request itself.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, header};

use crate::error::FetchError;
use crate::manifest::{FreshnessToken, ModuleMap};

/// Outcome of a successful fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The server confirmed the previous document is still current.
    Unchanged,
    /// A new document was fetched and parsed.
    Changed(Arc<ModuleMap>),
}

/// Retrieves the module map document.
#[async_trait]
pub trait ManifestFetcher: Send + Sync + 'static {
    /// Fetches `url`, using `previous` to avoid transferring an unchanged document.
    async fn fetch(
        &self,
        url: &str,
        previous: Option<&FreshnessToken>,
    ) -> Result<FetchOutcome, FetchError>;
}

/// [`ManifestFetcher`] over HTTP(S) using `reqwest`.
#[derive(Clone, Debug)]
pub struct HttpManifestFetcher {
    client: reqwest::Client,
    timeout: Option<Duration>,
}

impl HttpManifestFetcher {
    /// Builds a fetcher with its own client. `timeout = None` disables the deadline.
    pub fn new(timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("holocron-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, timeout))
    }

    /// Wraps an existing client (shared connection pool, custom TLS, proxies).
    pub fn with_client(client: reqwest::Client, timeout: Option<Duration>) -> Self {
        Self {
            client,
            timeout: timeout.filter(|d| *d > Duration::ZERO),
        }
    }

    async fn fetch_inner(
        &self,
        url: &str,
        previous: Option<&FreshnessToken>,
    ) -> Result<FetchOutcome, FetchError> {
        let mut req = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json");
        if let Some(etag) = previous.filter(|t| t.is_etag()) {
            req = req.header(header::IF_NONE_MATCH, etag.as_str());
        }

        let resp = req.send().await.map_err(|e| self.transport_error(url, e))?;
        let status = resp.status();
        if status == StatusCode::NOT_MODIFIED {
            return Ok(FetchOutcome::Unchanged);
        }
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let etag = resp
            .headers()
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(FreshnessToken::etag);
        let body = resp
            .bytes()
            .await
            .map_err(|e| self.transport_error(url, e))?;

        let token = etag.unwrap_or_else(|| FreshnessToken::content_hash(&body));
        if previous == Some(&token) {
            return Ok(FetchOutcome::Unchanged);
        }

        let map = ModuleMap::from_json(&body, Some(token)).map_err(|e| FetchError::Parse {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(FetchOutcome::Changed(Arc::new(map)))
    }

    fn transport_error(&self, url: &str, e: reqwest::Error) -> FetchError {
        match self.timeout {
            Some(timeout) if e.is_timeout() => FetchError::Timeout {
                url: url.to_string(),
                timeout,
            },
            _ => FetchError::Network {
                url: url.to_string(),
                reason: e.to_string(),
            },
        }
    }
}

#[async_trait]
impl ManifestFetcher for HttpManifestFetcher {
    async fn fetch(
        &self,
        url: &str,
        previous: Option<&FreshnessToken>,
    ) -> Result<FetchOutcome, FetchError> {
        if url.is_empty() {
            return Err(FetchError::Network {
                url: String::new(),
                reason: "manifest url is empty".to_string(),
            });
        }

        match self.timeout {
            Some(dur) => tokio::time::timeout(dur, self.fetch_inner(url, previous))
                .await
                .unwrap_or_else(|_elapsed| {
                    Err(FetchError::Timeout {
                        url: url.to_string(),
                        timeout: dur,
                    })
                }),
            None => self.fetch_inner(url, previous).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const DOC: &str = r#"{"modules": {
        "root": { "version": "1.0.0", "node": { "url": "https://cdn/root.node.js", "integrity": "sha256-r" } },
        "nav":  { "version": "2.0.0", "browser": { "url": "https://cdn/nav.browser.js", "integrity": "sha256-n" } }
    }}"#;

    fn fetcher() -> HttpManifestFetcher {
        HttpManifestFetcher::new(Some(Duration::from_secs(5))).unwrap()
    }

    #[tokio::test]
    async fn changed_with_etag_then_not_modified() {
        let mut server = mockito::Server::new_async().await;
        let fresh = server
            .mock("GET", "/module-map.json")
            .match_header("if-none-match", Matcher::Missing)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_header("etag", "\"v1\"")
            .with_body(DOC)
            .create_async()
            .await;
        let conditional = server
            .mock("GET", "/module-map.json")
            .match_header("if-none-match", "\"v1\"")
            .with_status(304)
            .create_async()
            .await;

        let url = format!("{}/module-map.json", server.url());
        let f = fetcher();

        let map = match f.fetch(&url, None).await.unwrap() {
            FetchOutcome::Changed(map) => map,
            other => panic!("expected Changed, got {other:?}"),
        };
        assert_eq!(map.len(), 2);
        assert_eq!(map.token(), Some(&FreshnessToken::etag("\"v1\"")));

        let again = f.fetch(&url, map.token()).await.unwrap();
        assert_eq!(again, FetchOutcome::Unchanged);

        fresh.assert_async().await;
        conditional.assert_async().await;
    }

    #[tokio::test]
    async fn content_hash_detects_unchanged_without_etag() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/map")
            .match_header("if-none-match", Matcher::Missing)
            .with_status(200)
            .with_body(DOC)
            .expect(2)
            .create_async()
            .await;

        let url = format!("{}/map", server.url());
        let f = fetcher();

        let FetchOutcome::Changed(map) = f.fetch(&url, None).await.unwrap() else {
            panic!("first fetch must report a change");
        };
        let token = map.token().cloned().unwrap();
        assert!(!token.is_etag());

        assert_eq!(
            f.fetch(&url, Some(&token)).await.unwrap(),
            FetchOutcome::Unchanged
        );
    }

    #[tokio::test]
    async fn non_success_status_is_http_status_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/map")
            .with_status(503)
            .create_async()
            .await;

        let url = format!("{}/map", server.url());
        let err = fetcher().fetch(&url, None).await.unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus { status: 503, .. }));
    }

    #[tokio::test]
    async fn malformed_document_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/map")
            .with_status(200)
            .with_body("{\"modules\": [1, 2, 3]}")
            .create_async()
            .await;

        let url = format!("{}/map", server.url());
        let err = fetcher().fetch(&url, None).await.unwrap_err();
        assert_eq!(err.as_label(), "fetch_parse");
    }

    #[tokio::test]
    async fn empty_url_and_refused_connection_are_network_errors() {
        let f = fetcher();
        assert!(matches!(
            f.fetch("", None).await,
            Err(FetchError::Network { .. })
        ));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = f
            .fetch(&format!("http://{addr}/map"), None)
            .await
            .unwrap_err();
        assert!(err.is_network(), "unexpected error: {err:?}");
    }

    #[tokio::test]
    async fn silent_server_hits_deadline() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hold = tokio::spawn(async move {
            let (_sock, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let f = HttpManifestFetcher::new(Some(Duration::from_millis(200))).unwrap();
        let err = f
            .fetch(&format!("http://{addr}/map"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout { .. }), "got {err:?}");
        hold.abort();
    }
}
