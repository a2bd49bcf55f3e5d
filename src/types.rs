//! Shared types for the OPENBELL engine.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that platform, worker,
//! and orchestrator modules can depend on them without circular
//! references.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// One set of login credentials for the trading platform.
///
/// The username is an opaque identifier: exact formatting (including
/// leading zeros) must be preserved, so it is never parsed as a number.
#[derive(Debug, Clone)]
pub struct Account {
    pub username: String,
    pub password: SecretString,
}

impl Account {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::new(password.into()),
        }
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.username)
    }
}

// ---------------------------------------------------------------------------
// Trade instructions
// ---------------------------------------------------------------------------

/// Order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(Direction::Buy),
            "sell" => Ok(Direction::Sell),
            _ => Err(anyhow::anyhow!("Unknown direction: {s}")),
        }
    }
}

/// Limit price for an instruction.
///
/// The source data uses `0` to mean "use the current best bid/ask";
/// that sentinel is collapsed into `BestQuote` at load time so the
/// rest of the engine never compares against a magic number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceSpec {
    /// Fixed limit price (whole currency units on this venue).
    Limit(u32),
    /// Read the live best bid/ask from the open order form.
    BestQuote,
}

impl PriceSpec {
    /// Map a raw spreadsheet value: `0` means best quote.
    pub fn from_raw(raw: u32) -> Self {
        if raw == 0 {
            PriceSpec::BestQuote
        } else {
            PriceSpec::Limit(raw)
        }
    }

    /// Whether drafting must read live market data for this field.
    pub fn is_market_default(&self) -> bool {
        matches!(self, PriceSpec::BestQuote)
    }
}

impl fmt::Display for PriceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceSpec::Limit(p) => write!(f, "{p}"),
            PriceSpec::BestQuote => write!(f, "best-quote"),
        }
    }
}

/// Order volume for an instruction. `0` in the source data means
/// "use the maximum available volume", mapped to `Max` at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeSpec {
    Exact(u32),
    /// Read the maximum available volume from the open order form.
    Max,
}

impl VolumeSpec {
    /// Map a raw spreadsheet value: `0` means maximum available.
    pub fn from_raw(raw: u32) -> Self {
        if raw == 0 {
            VolumeSpec::Max
        } else {
            VolumeSpec::Exact(raw)
        }
    }

    /// Whether drafting must read live market data for this field.
    pub fn is_market_default(&self) -> bool {
        matches!(self, VolumeSpec::Max)
    }
}

impl fmt::Display for VolumeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolumeSpec::Exact(v) => write!(f, "{v}"),
            VolumeSpec::Max => write!(f, "max"),
        }
    }
}

/// One requested order: ticker, price, volume, direction.
///
/// Immutable after load; belongs to exactly one account's trade set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeInstruction {
    pub ticker: String,
    pub price: PriceSpec,
    pub volume: VolumeSpec,
    pub direction: Direction,
}

impl TradeInstruction {
    /// Build from raw spreadsheet values (`0` sentinels mapped to defaults).
    pub fn from_raw(
        ticker: impl Into<String>,
        price: u32,
        volume: u32,
        direction: Direction,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            price: PriceSpec::from_raw(price),
            volume: VolumeSpec::from_raw(volume),
            direction,
        }
    }

    /// Whether drafting this instruction requires reading live market
    /// data (best quote and/or max volume) from the order form.
    pub fn needs_live_data(&self) -> bool {
        self.price.is_market_default() || self.volume.is_market_default()
    }

    /// How many fields fall back to a live market default (0–2).
    pub fn default_field_count(&self) -> usize {
        self.price.is_market_default() as usize + self.volume.is_market_default() as usize
    }
}

impl fmt::Display for TradeInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} @ {} x {}",
            self.direction, self.ticker, self.price, self.volume,
        )
    }
}

/// All trade instructions for one account. Order is irrelevant here;
/// the sequencer decides drafting order.
pub type TradeSet = Vec<TradeInstruction>;

// ---------------------------------------------------------------------------
// Drafted orders
// ---------------------------------------------------------------------------

/// A trade instruction bound to a populated, not-yet-submitted order
/// form, with any market defaults resolved to concrete values.
///
/// Owned exclusively by the worker that drafted it; never shared
/// across accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftedOrder {
    pub draft_id: Uuid,
    pub ticker: String,
    pub direction: Direction,
    /// Concrete price after resolving `BestQuote`.
    pub price: u32,
    /// Concrete volume after resolving `Max`.
    pub volume: u32,
    /// Whether the price came from a live best bid/ask lookup.
    pub resolved_price: bool,
    /// Whether the volume came from a live max-volume lookup.
    pub resolved_volume: bool,
}

impl fmt::Display for DraftedOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "draft {} {} @ {}{} x {}{} [{}]",
            self.direction,
            self.ticker,
            self.price,
            if self.resolved_price { "*" } else { "" },
            self.volume,
            if self.resolved_volume { "*" } else { "" },
            self.draft_id,
        )
    }
}

// ---------------------------------------------------------------------------
// Worker results
// ---------------------------------------------------------------------------

/// Terminal state an account worker reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerOutcome {
    /// Full pipeline ran: drafted, waited, submitted.
    Completed,
    /// Invalid credentials or unreachable platform during login.
    AuthFailed,
    /// Challenge answer rejected too many consecutive times.
    ChallengeExhausted,
    /// Worker task panicked or was otherwise lost.
    Aborted,
}

impl fmt::Display for WorkerOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerOutcome::Completed => write!(f, "🟢 COMPLETED"),
            WorkerOutcome::AuthFailed => write!(f, "🔴 AUTH FAILED"),
            WorkerOutcome::ChallengeExhausted => write!(f, "🔴 CHALLENGE EXHAUSTED"),
            WorkerOutcome::Aborted => write!(f, "🔴 ABORTED"),
        }
    }
}

/// Terminal record for one account's worker, consumed by the
/// orchestrator for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerResult {
    pub username: String,
    pub outcome: WorkerOutcome,
    /// Orders successfully drafted.
    pub drafted: usize,
    /// Instructions that failed drafting (recorded, not fatal).
    pub draft_failures: usize,
    /// Drafts successfully submitted.
    pub submitted: usize,
    /// Drafts that failed submission (recorded, not fatal).
    pub submit_failures: usize,
    pub failure_reason: Option<String>,
}

impl WorkerResult {
    /// A result for a worker that failed before producing any drafts.
    pub fn failed(
        username: impl Into<String>,
        outcome: WorkerOutcome,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            outcome,
            drafted: 0,
            draft_failures: 0,
            submitted: 0,
            submit_failures: 0,
            failure_reason: Some(reason.into()),
        }
    }

    /// Whether this account fully succeeded: completed pipeline with
    /// every instruction drafted and every draft submitted.
    pub fn is_success(&self) -> bool {
        self.outcome == WorkerOutcome::Completed
            && self.draft_failures == 0
            && self.submit_failures == 0
            && self.submitted == self.drafted
    }
}

impl fmt::Display for WorkerResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} | drafted {} (failed {}) | submitted {} (failed {})",
            self.username,
            self.outcome,
            self.drafted,
            self.draft_failures,
            self.submitted,
            self.submit_failures,
        )?;
        if let Some(reason) = &self.failure_reason {
            write!(f, " | {reason}")?;
        }
        Ok(())
    }
}

/// Aggregate summary of a full run across all accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub results: Vec<WorkerResult>,
    /// Accounts skipped before launch (e.g. missing trade partition).
    pub config_errors: Vec<String>,
}

impl RunSummary {
    /// Whether every account fully succeeded and nothing was skipped.
    /// This drives the process exit code.
    pub fn all_succeeded(&self) -> bool {
        self.config_errors.is_empty() && self.results.iter().all(|r| r.is_success())
    }

    pub fn completed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome == WorkerOutcome::Completed)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.len() - self.completed_count()
    }

    pub fn total_submitted(&self) -> usize {
        self.results.iter().map(|r| r.submitted).sum()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "accounts={} completed={} failed={} skipped={} orders_submitted={}",
            self.results.len(),
            self.completed_count(),
            self.failed_count(),
            self.config_errors.len(),
            self.total_submitted(),
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for OPENBELL.
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Access challenge rejected {attempts} consecutive time(s), giving up")]
    ChallengeExhausted { attempts: u32 },

    #[error("Challenge attempt failed: {0}")]
    Challenge(String),

    #[error("Draft failed for {ticker}: {message}")]
    Draft { ticker: String, message: String },

    #[error("Submit failed for {ticker}: {message}")]
    Submit { ticker: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Solver error: {0}")]
    Solver(String),
}

impl TraderError {
    /// Whether this error terminates the whole worker (as opposed to
    /// being recorded against a single instruction and skipped).
    pub fn is_worker_fatal(&self) -> bool {
        matches!(
            self,
            TraderError::Auth(_) | TraderError::ChallengeExhausted { .. } | TraderError::Session(_)
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
