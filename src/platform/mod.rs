//! Trading platform integration.
//!
//! Defines the `TradingSession` capability trait, the only
//! non-deterministic dependency of the worker state machine, and the
//! `SessionProvider` that opens one exclusive session per account.
//! The concrete web implementation lives in `web`; tests run the
//! worker against mock sessions.

pub mod web;

use async_trait::async_trait;

use crate::types::{Account, DraftedOrder, TradeInstruction, TraderError};

/// What the platform asked for after a credential submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStatus {
    /// Session is authenticated; drafting may begin.
    LoggedIn,
    /// The platform requires an access challenge before proceeding.
    ChallengeRequired,
}

/// The platform's response to a submitted challenge answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeVerdict {
    Accepted,
    Rejected,
}

/// One account's exclusive session with the trading platform.
///
/// The worker owns its session for the lifetime of its states;
/// sessions are never shared or handed off between workers. The
/// engine depends only on these operations, never on how the web
/// surface addresses them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TradingSession: Send {
    /// Submit username/password to the platform's login surface.
    async fn login(&mut self, account: &Account) -> Result<LoginStatus, TraderError>;

    /// Fetch a freshly rendered challenge image. Each fetch produces a
    /// new image; answers are not reusable across fetches.
    async fn fetch_challenge(&mut self) -> Result<Vec<u8>, TraderError>;

    /// Submit a challenge answer for the most recently fetched image.
    async fn answer_challenge(&mut self, answer: &str) -> Result<ChallengeVerdict, TraderError>;

    /// Open the order-entry surface for one instruction, resolving any
    /// market-default price/volume from the live form, and commit the
    /// draft. Failure here is per-instruction, not fatal.
    async fn draft_order(
        &mut self,
        instruction: &TradeInstruction,
    ) -> Result<DraftedOrder, TraderError>;

    /// Submit one previously drafted order.
    async fn submit_order(&mut self, draft: &DraftedOrder) -> Result<(), TraderError>;

    /// Query the platform's market-open indicator.
    async fn market_open(&mut self) -> Result<bool, TraderError>;

    /// Log out and release the session. Best effort; called on every
    /// worker exit path, success or failure.
    async fn close(&mut self);

    /// Platform name for logging and identification.
    fn name(&self) -> &str;
}

/// Opens an exclusive `TradingSession` for an account.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn open_session(&self, account: &Account)
        -> Result<Box<dyn TradingSession>, TraderError>;
}
