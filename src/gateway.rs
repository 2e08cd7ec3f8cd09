//! Content gateway fetching
//!
//! Content objects live off-chain and are served by interchangeable HTTP
//! gateways. A fetch walks an ordered candidate list one URL at a time, with a
//! bounded timeout per attempt and no retries, and stops at the first response
//! that is a 2xx carrying a JSON document. Running out of candidates is an
//! ordinary outcome, not an error.

use crate::config::{GatewayConfig, CID_PLACEHOLDER};
use crate::error::LedgerError;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Largest response body accepted from a gateway by default.
pub const DEFAULT_MAX_BODY_BYTES: u64 = 8 * 1024 * 1024;

/// Why a single candidate URL was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    #[error("timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("response body exceeds {limit} bytes")]
    Oversized { limit: u64 },
    #[error("unparsable payload: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    pub url: String,
    pub error: AttemptError,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Found { url: String, content: Value },
    Exhausted { failures: Vec<AttemptFailure> },
}

impl FetchOutcome {
    pub fn content(self) -> Option<Value> {
        match self {
            FetchOutcome::Found { content, .. } => Some(content),
            FetchOutcome::Exhausted { .. } => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, FetchOutcome::Found { .. })
    }
}

#[derive(Debug, Clone)]
pub struct GatewayFetcher {
    client: reqwest::Client,
    templates: Vec<String>,
    timeout: Duration,
    max_body_bytes: u64,
}

impl GatewayFetcher {
    /// `templates` are URLs containing a `{cid}` placeholder, tried in order.
    pub fn new(templates: Vec<String>, timeout: Duration) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| LedgerError::Gateway(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            templates,
            timeout,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        })
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, LedgerError> {
        Ok(Self::new(config.gateways.clone(), config.timeout)?
            .with_max_body_bytes(config.max_body_bytes))
    }

    pub fn with_max_body_bytes(mut self, limit: u64) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Candidate URLs for `cid`: the preferred URL first when given, then every
    /// template. Duplicates keep their first position.
    pub fn candidates(&self, cid: &str, preferred: Option<&str>) -> Vec<String> {
        let mut urls: Vec<String> = Vec::with_capacity(self.templates.len() + 1);
        let preferred = preferred.map(str::trim).filter(|u| !u.is_empty());
        let templated = self
            .templates
            .iter()
            .map(|t| t.replace(CID_PLACEHOLDER, cid));

        for url in preferred.map(str::to_string).into_iter().chain(templated) {
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
        urls
    }

    pub async fn fetch(&self, cid: &str, preferred: Option<&str>) -> FetchOutcome {
        let cid = cid.trim();
        if cid.is_empty() {
            return FetchOutcome::Exhausted {
                failures: Vec::new(),
            };
        }

        let mut failures = Vec::new();
        for url in self.candidates(cid, preferred) {
            match self.attempt(&url).await {
                Ok(content) => {
                    debug!(cid, url = %url, "gateway hit");
                    return FetchOutcome::Found { url, content };
                }
                Err(error) => {
                    debug!(cid, url = %url, error = %error, "gateway miss");
                    failures.push(AttemptFailure { url, error });
                }
            }
        }

        warn!(cid, attempts = failures.len(), "all gateways exhausted");
        FetchOutcome::Exhausted { failures }
    }

    async fn attempt(&self, url: &str) -> Result<Value, AttemptError> {
        let mut response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status.as_u16()));
        }

        let limit = self.max_body_bytes;
        if response.content_length().is_some_and(|len| len > limit) {
            return Err(AttemptError::Oversized { limit });
        }

        // Content-Length may be absent or wrong, so the cap also holds while streaming.
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(classify)? {
            if (body.len() + chunk.len()) as u64 > limit {
                return Err(AttemptError::Oversized { limit });
            }
            body.extend_from_slice(&chunk);
        }
        serde_json::from_slice(&body).map_err(|e| AttemptError::Parse(e.to_string()))
    }
}

fn classify(err: reqwest::Error) -> AttemptError {
    if err.is_timeout() {
        AttemptError::Timeout
    } else {
        AttemptError::Transport(err.to_string())
    }
}
