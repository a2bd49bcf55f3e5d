//! Access-challenge solving.
//!
//! Defines the `ChallengeSolver` trait and an HTTP client for an
//! external text-recognition service. A solver is a pure transform:
//! image in, best-effort guess out, bounded by a request timeout.
//! Retry policy belongs to the caller (the account worker), never to
//! the solver itself.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::{AppConfig, SolverConfig};
use crate::types::TraderError;

/// Abstraction over challenge-image recognizers.
///
/// `Ok(None)` means "no confident answer", distinct from a transport
/// or service failure, which is an `Err`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChallengeSolver: Send + Sync {
    /// Recognize the text in a rendered challenge image.
    async fn solve(&self, image: &[u8]) -> Result<Option<String>, TraderError>;

    /// Solver name for logging and identification.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// OCR service client
// ---------------------------------------------------------------------------

/// Characters a challenge answer may contain; anything else in a
/// recognized fragment is noise from the distortion overlay.
const ANSWER_ALPHABET: &str = "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

#[derive(Debug, Serialize)]
struct RecognizeRequest {
    image_base64: String,
    language: &'static str,
}

/// One recognized block of text with the service's confidence score.
#[derive(Debug, Deserialize)]
struct RecognizedFragment {
    text: String,
    confidence: f64,
}

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    fragments: Vec<RecognizedFragment>,
}

/// Client for an external OCR recognition service.
pub struct OcrSolver {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    min_confidence: f64,
}

impl OcrSolver {
    pub fn new(cfg: &SolverConfig) -> Result<Self, TraderError> {
        let api_key = match cfg.api_key_env.as_deref() {
            Some(env_name) => Some(
                AppConfig::resolve_env(env_name).map_err(|e| TraderError::Config(e.to_string()))?,
            ),
            None => None,
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| TraderError::Solver(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: cfg.endpoint.clone(),
            api_key,
            min_confidence: cfg.min_confidence,
        })
    }

    /// Combine recognized fragments into a single candidate answer,
    /// dropping low-confidence fragments and non-alphabet characters.
    fn assemble(&self, fragments: &[RecognizedFragment]) -> Option<String> {
        let answer: String = fragments
            .iter()
            .filter(|f| f.confidence >= self.min_confidence)
            .flat_map(|f| f.text.chars())
            .filter(|c| ANSWER_ALPHABET.contains(*c))
            .collect();

        if answer.is_empty() {
            None
        } else {
            Some(answer)
        }
    }
}

#[async_trait]
impl ChallengeSolver for OcrSolver {
    async fn solve(&self, image: &[u8]) -> Result<Option<String>, TraderError> {
        let request = RecognizeRequest {
            image_base64: BASE64.encode(image),
            language: "en",
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TraderError::Solver(format!("recognition request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(TraderError::Solver(format!(
                "recognition service returned {}",
                response.status()
            )));
        }

        let parsed: RecognizeResponse = response
            .json()
            .await
            .map_err(|e| TraderError::Solver(format!("malformed recognition response: {e}")))?;

        let answer = self.assemble(&parsed.fragments);
        debug!(
            fragments = parsed.fragments.len(),
            confident = answer.is_some(),
            "Recognition response processed"
        );
        Ok(answer)
    }

    fn name(&self) -> &str {
        "ocr-service"
    }
}
