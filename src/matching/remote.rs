//! Remote wine search
//!
//! Stateless, idempotent search call over HTTP. Transient failures are
//! retried with exponential backoff; whatever still fails is reported to the
//! matcher, which treats it as "no remote match".

use async_trait::async_trait;
use backoff::{future::retry_notify, ExponentialBackoff};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{MatchResult, MatchType};
use crate::catalog::WineRecord;
use crate::config::RemoteConfig;
use crate::error::{Result, ScanError};

/// Initial retry interval
const INITIAL_INTERVAL: Duration = Duration::from_millis(200);

/// Maximum retry interval
const MAX_INTERVAL: Duration = Duration::from_secs(2);

/// Remote search collaborator
#[async_trait]
pub trait RemoteWineSearch: Send + Sync {
    /// Top result for normalized candidate text, `None` when nothing matched
    async fn search(&self, normalized_text: &str) -> Result<Option<MatchResult>>;
}

/// One hit in the search response
#[derive(Debug, Deserialize)]
struct SearchHit {
    wine: WineRecord,
    confidence: f32,
    #[serde(default)]
    matched_vintage: Option<u16>,
}

/// Search response body, results best first
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

impl SearchResponse {
    fn into_top_match(self) -> Option<MatchResult> {
        self.results.into_iter().next().map(|hit| MatchResult {
            wine: hit.wine,
            confidence: hit.confidence,
            matched_vintage: hit.matched_vintage,
            match_type: MatchType::FuzzyRemote,
            requested_vintage: None,
        })
    }
}

/// HTTP client for the wine search service
pub struct HttpWineSearch {
    client: Client,
    search_url: String,
    config: RemoteConfig,
}

impl HttpWineSearch {
    /// Create a client for `<base_url>/search`
    pub fn new(base_url: &str, config: RemoteConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            search_url: format!("{}/search", base_url.trim_end_matches('/')),
            config,
        })
    }

    pub fn search_url(&self) -> &str {
        &self.search_url
    }

    fn is_transient_error(error: &reqwest::Error) -> bool {
        error.is_timeout() || error.is_connect() || error.is_request()
    }

    fn is_transient_status(status: StatusCode) -> bool {
        matches!(
            status,
            StatusCode::TOO_MANY_REQUESTS
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT
                | StatusCode::BAD_GATEWAY
        )
    }

    fn build_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: INITIAL_INTERVAL,
            max_interval: MAX_INTERVAL,
            max_elapsed_time: Some(self.config.request_timeout() * (self.config.max_retries + 1)),
            ..Default::default()
        }
    }

    /// Single attempt
    async fn search_once(
        &self,
        normalized_text: &str,
    ) -> std::result::Result<Option<MatchResult>, backoff::Error<ScanError>> {
        let response = self
            .client
            .get(&self.search_url)
            .query(&[("q", normalized_text)])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    backoff::Error::transient(ScanError::Timeout(self.config.request_timeout()))
                } else if Self::is_transient_error(&e) {
                    backoff::Error::transient(ScanError::Http(e))
                } else {
                    backoff::Error::permanent(ScanError::Http(e))
                }
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let err = ScanError::RemoteSearch(format!("search service returned status {status}"));
            return if Self::is_transient_status(status) {
                Err(backoff::Error::transient(err))
            } else {
                Err(backoff::Error::permanent(err))
            };
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| backoff::Error::permanent(ScanError::Http(e)))?;
        Ok(body.into_top_match())
    }
}

#[async_trait]
impl RemoteWineSearch for HttpWineSearch {
    async fn search(&self, normalized_text: &str) -> Result<Option<MatchResult>> {
        let start = Instant::now();
        let attempts = AtomicU32::new(0);
        let max_attempts = self.config.max_retries + 1;

        let result = retry_notify(
            self.build_backoff(),
            || async {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                match self.search_once(normalized_text).await {
                    Err(backoff::Error::Transient { err, .. }) if attempt >= max_attempts => {
                        Err(backoff::Error::permanent(err))
                    }
                    other => other,
                }
            },
            |err: ScanError, duration: Duration| {
                warn!("Remote search failed ({}), retrying in {:?}", err, duration);
            },
        )
        .await;

        debug!(
            "Remote search for {:?} finished in {:?} after {} attempt(s)",
            normalized_text,
            start.elapsed(),
            attempts.load(Ordering::SeqCst)
        );
        result
    }
}
