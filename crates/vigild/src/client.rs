//! Client for the remote identity match service.

use crate::config::Config;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use vigil_core::MatchVerdict;

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("match service unavailable after {attempts} attempts: {last}")]
    ServiceUnavailable { attempts: u32, last: String },
}

/// Failure of a single request; retried up to the transport cap.
#[derive(Error, Debug)]
enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server error: HTTP {0}")]
    Server(u16),
    #[error("unparseable response (HTTP {status}): {detail}")]
    Body { status: u16, detail: String },
}

/// Remote identity match service.
#[async_trait]
pub trait MatchService: Send + Sync {
    /// Submit one captured JPEG for `claimed_identity`.
    ///
    /// Transport failures are retried internally; only an exhausted retry
    /// cap surfaces as an error.
    async fn submit(&self, image: Vec<u8>, claimed_identity: &str)
        -> Result<MatchVerdict, SubmitError>;
}

/// Wire response of the match service.
#[derive(Debug, Deserialize)]
struct MatchResponse {
    status: String,
    #[serde(default)]
    distance: Option<f32>,
    #[serde(default)]
    message: Option<String>,
}

/// Display confidence (0–100) for a match distance.
pub fn display_confidence(distance: f32) -> f32 {
    (1.0 - distance).clamp(0.0, 1.0) * 100.0
}

/// The service's status field decides; no local threshold is applied.
fn interpret(response: MatchResponse, fallback_distance: f32) -> MatchVerdict {
    if response.status == "success" {
        let distance = response.distance.unwrap_or(fallback_distance);
        MatchVerdict::Accepted {
            match_score: display_confidence(distance),
        }
    } else {
        MatchVerdict::Rejected {
            message: response.message,
        }
    }
}

/// Multipart HTTP client (`live_image` + `voter_id`).
#[derive(Clone)]
pub struct HttpMatchClient {
    http: reqwest::Client,
    url: String,
    transport_retries: u32,
    retry_backoff: Duration,
    fallback_distance: f32,
}

impl HttpMatchClient {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        transport_retries: u32,
        retry_backoff: Duration,
        fallback_distance: f32,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.into(),
            transport_retries,
            retry_backoff,
            fallback_distance,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        Self::new(
            config.match_url.clone(),
            config.match_timeout,
            config.transport_retries,
            config.retry_backoff,
            config.fallback_distance,
        )
    }

    async fn attempt(&self, image: &[u8], claimed_identity: &str) -> Result<MatchVerdict, TransportError> {
        let part = Part::bytes(image.to_vec())
            .file_name("live.jpg")
            .mime_str("image/jpeg")?;
        let form = Form::new()
            .part("live_image", part)
            .text("voter_id", claimed_identity.to_string());

        let response = self.http.post(&self.url).multipart(form).send().await?;
        let status = response.status();
        if status.is_server_error() {
            return Err(TransportError::Server(status.as_u16()));
        }

        let body = response.bytes().await?;
        let parsed: MatchResponse =
            serde_json::from_slice(&body).map_err(|e| TransportError::Body {
                status: status.as_u16(),
                detail: e.to_string(),
            })?;
        Ok(interpret(parsed, self.fallback_distance))
    }
}

#[async_trait]
impl MatchService for HttpMatchClient {
    async fn submit(
        &self,
        image: Vec<u8>,
        claimed_identity: &str,
    ) -> Result<MatchVerdict, SubmitError> {
        let attempts = self.transport_retries + 1;
        let mut last = String::new();

        for attempt in 1..=attempts {
            match self.attempt(&image, claimed_identity).await {
                Ok(verdict) => {
                    tracing::debug!(attempt, ?verdict, "match service answered");
                    return Ok(verdict);
                }
                Err(e) => {
                    tracing::warn!(attempt, max = attempts, error = %e, "match request failed");
                    last = e.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(self.retry_backoff).await;
                    }
                }
            }
        }

        Err(SubmitError::ServiceUnavailable { attempts, last })
    }
}
