//! Web platform client.
//!
//! Speaks HTTP/JSON to the brokerage's web surface using the endpoint
//! paths from configuration. Authentication is token-based: the login
//! (or accepted challenge) response carries a session token that is
//! attached to every subsequent request. One `WebSession` per account;
//! the session token is never shared.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{ChallengeVerdict, LoginStatus, SessionProvider, TradingSession};
use crate::config::PlatformConfig;
use crate::types::{Account, DraftedOrder, PriceSpec, TradeInstruction, TraderError, VolumeSpec};

// ---------------------------------------------------------------------------
// Wire types (platform JSON → Rust)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    /// "ok" once authenticated, "challenge_required" otherwise.
    status: String,
    #[serde(default)]
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChallengeImageResponse {
    /// Either a `data:` URI with the rendered image inline, or a URL
    /// (possibly relative to the platform base) to fetch it from.
    image: String,
}

#[derive(Debug, Serialize)]
struct ChallengeAnswerRequest<'a> {
    answer: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChallengeAnswerResponse {
    accepted: bool,
    #[serde(default)]
    token: Option<String>,
}

#[derive(Debug, Serialize)]
struct DraftRequest<'a> {
    ticker: &'a str,
    direction: &'a str,
    /// Absent = use the live best bid/ask.
    #[serde(skip_serializing_if = "Option::is_none")]
    price: Option<u32>,
    /// Absent = use the maximum available volume.
    #[serde(skip_serializing_if = "Option::is_none")]
    volume: Option<u32>,
}

/// Draft confirmation with any market defaults resolved by the form.
#[derive(Debug, Deserialize)]
struct DraftResponse {
    price: u32,
    volume: u32,
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    draft_id: &'a str,
    ticker: &'a str,
}

#[derive(Debug, Deserialize)]
struct MarketStatusResponse {
    open: bool,
}

// ---------------------------------------------------------------------------
// Challenge image addressing
// ---------------------------------------------------------------------------

/// Decode an inline `data:` URI challenge image, if it is one.
fn decode_data_uri(image: &str) -> Option<Result<Vec<u8>, TraderError>> {
    if !image.starts_with("data:") {
        return None;
    }
    let encoded = match image.split_once(',') {
        Some((_, tail)) => tail,
        None => return Some(Err(TraderError::Challenge("malformed data URI".into()))),
    };
    Some(
        BASE64
            .decode(encoded)
            .map_err(|e| TraderError::Challenge(format!("undecodable challenge image: {e}"))),
    )
}

/// Resolve a possibly-relative image URL against the platform base.
fn resolve_image_url(base_url: &str, image: &str) -> String {
    if image.starts_with('/') {
        format!("{}{image}", base_url.trim_end_matches('/'))
    } else {
        image.to_string()
    }
}

// ---------------------------------------------------------------------------
// Session provider
// ---------------------------------------------------------------------------

/// Opens one exclusive `WebSession` per account.
pub struct WebPlatform {
    cfg: PlatformConfig,
}

impl WebPlatform {
    pub fn new(cfg: PlatformConfig) -> Self {
        Self { cfg }
    }
}

#[async_trait]
impl SessionProvider for WebPlatform {
    async fn open_session(
        &self,
        _account: &Account,
    ) -> Result<Box<dyn TradingSession>, TraderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(self.cfg.timeout_secs))
            .build()
            .map_err(|e| TraderError::Session(format!("failed to build HTTP client: {e}")))?;

        Ok(Box::new(WebSession {
            client,
            cfg: self.cfg.clone(),
            token: None,
        }))
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// An authenticated (or authenticating) HTTP session with the platform.
pub struct WebSession {
    client: Client,
    cfg: PlatformConfig,
    token: Option<String>,
}

impl WebSession {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.cfg.base_url.trim_end_matches('/'))
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl TradingSession for WebSession {
    async fn login(&mut self, account: &Account) -> Result<LoginStatus, TraderError> {
        let request = LoginRequest {
            username: &account.username,
            password: account.password.expose_secret(),
        };

        let response = self
            .client
            .post(self.url(&self.cfg.login_path))
            .json(&request)
            .send()
            .await
            .map_err(|e| TraderError::Auth(format!("platform unreachable: {e}")))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(TraderError::Auth("invalid credentials".into()));
            }
            status if !status.is_success() => {
                return Err(TraderError::Auth(format!("login rejected: {status}")));
            }
            _ => {}
        }

        let parsed: LoginResponse = response
            .json()
            .await
            .map_err(|e| TraderError::Auth(format!("malformed login response: {e}")))?;

        match parsed.status.as_str() {
            "ok" => {
                self.token = parsed.token;
                debug!("Login accepted without challenge");
                Ok(LoginStatus::LoggedIn)
            }
            "challenge_required" => Ok(LoginStatus::ChallengeRequired),
            other => Err(TraderError::Auth(format!("unexpected login status: {other}"))),
        }
    }

    async fn fetch_challenge(&mut self) -> Result<Vec<u8>, TraderError> {
        let response = self
            .client
            .get(self.url(&self.cfg.challenge_image_path))
            .send()
            .await
            .map_err(|e| TraderError::Challenge(format!("challenge fetch failed: {e}")))?;

        if !response.status().is_success() {
            return Err(TraderError::Challenge(format!(
                "challenge fetch returned {}",
                response.status()
            )));
        }

        let parsed: ChallengeImageResponse = response
            .json()
            .await
            .map_err(|e| TraderError::Challenge(format!("malformed challenge response: {e}")))?;

        if let Some(decoded) = decode_data_uri(&parsed.image) {
            return decoded;
        }

        // Image served from a URL rather than inline.
        let image_url = resolve_image_url(&self.cfg.base_url, &parsed.image);
        let bytes = self
            .client
            .get(&image_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| TraderError::Challenge(format!("challenge image download failed: {e}")))?
            .bytes()
            .await
            .map_err(|e| TraderError::Challenge(format!("challenge image read failed: {e}")))?;

        Ok(bytes.to_vec())
    }

    async fn answer_challenge(&mut self, answer: &str) -> Result<ChallengeVerdict, TraderError> {
        let response = self
            .client
            .post(self.url(&self.cfg.challenge_answer_path))
            .json(&ChallengeAnswerRequest { answer })
            .send()
            .await
            .map_err(|e| TraderError::Challenge(format!("answer submission failed: {e}")))?;

        if !response.status().is_success() {
            return Err(TraderError::Challenge(format!(
                "answer submission returned {}",
                response.status()
            )));
        }

        let parsed: ChallengeAnswerResponse = response
            .json()
            .await
            .map_err(|e| TraderError::Challenge(format!("malformed answer response: {e}")))?;

        if parsed.accepted {
            self.token = parsed.token.or(self.token.take());
            Ok(ChallengeVerdict::Accepted)
        } else {
            Ok(ChallengeVerdict::Rejected)
        }
    }

    async fn draft_order(
        &mut self,
        instruction: &TradeInstruction,
    ) -> Result<DraftedOrder, TraderError> {
        let draft_err = |message: String| TraderError::Draft {
            ticker: instruction.ticker.clone(),
            message,
        };

        let price = match instruction.price {
            PriceSpec::Limit(p) => Some(p),
            PriceSpec::BestQuote => None,
        };
        let volume = match instruction.volume {
            VolumeSpec::Exact(v) => Some(v),
            VolumeSpec::Max => None,
        };

        let direction = instruction.direction.to_string();
        let request = DraftRequest {
            ticker: &instruction.ticker,
            direction: &direction,
            price,
            volume,
        };

        let response = self
            .authed(self.client.post(self.url(&self.cfg.draft_path)))
            .json(&request)
            .send()
            .await
            .map_err(|e| draft_err(format!("draft request failed: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(draft_err("ticker not found".into()));
        }
        if !response.status().is_success() {
            return Err(draft_err(format!("draft rejected: {}", response.status())));
        }

        let parsed: DraftResponse = response
            .json()
            .await
            .map_err(|e| draft_err(format!("malformed draft response: {e}")))?;

        Ok(DraftedOrder {
            draft_id: Uuid::new_v4(),
            ticker: instruction.ticker.clone(),
            direction: instruction.direction,
            price: parsed.price,
            volume: parsed.volume,
            resolved_price: price.is_none(),
            resolved_volume: volume.is_none(),
        })
    }

    async fn submit_order(&mut self, draft: &DraftedOrder) -> Result<(), TraderError> {
        let submit_err = |message: String| TraderError::Submit {
            ticker: draft.ticker.clone(),
            message,
        };

        let draft_id = draft.draft_id.to_string();
        let request = SubmitRequest {
            draft_id: &draft_id,
            ticker: &draft.ticker,
        };

        let response = self
            .authed(self.client.post(self.url(&self.cfg.submit_path)))
            .json(&request)
            .send()
            .await
            .map_err(|e| submit_err(format!("submit request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(submit_err(format!("submit rejected: {}", response.status())));
        }
        Ok(())
    }

    async fn market_open(&mut self) -> Result<bool, TraderError> {
        let parsed: MarketStatusResponse = self
            .authed(self.client.get(self.url(&self.cfg.market_status_path)))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| TraderError::Session(format!("market status query failed: {e}")))?
            .json()
            .await
            .map_err(|e| TraderError::Session(format!("malformed market status: {e}")))?;

        Ok(parsed.open)
    }

    async fn close(&mut self) {
        // Best effort: a failed logout must not mask the worker result.
        let result = self
            .authed(self.client.post(self.url(&self.cfg.logout_path)))
            .send()
            .await;
        if let Err(e) = result {
            warn!(error = %e, "Logout failed; abandoning session");
        }
        self.token = None;
    }

    fn name(&self) -> &str {
        &self.cfg.name
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
