//! Account worker: one account's entire lifecycle as a state machine.
//!
//! Authenticate, resolve the access challenge with a bounded retry
//! budget, draft every instruction in sequencer order, suspend until
//! the synchronized release instant, then submit all drafts in bulk.
//! Drafting happens early because it is not time-critical; submission
//! is batched at the release instant to minimize skew across accounts.
//!
//! Per-order errors are recorded and skipped; only authentication
//! failure and challenge exhaustion terminate the worker. The session
//! is closed on every exit path.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

use crate::platform::{ChallengeVerdict, LoginStatus, TradingSession};
use crate::sequencer;
use crate::solver::ChallengeSolver;
use crate::timing::ReleaseGate;
use crate::types::{
    Account, DraftedOrder, TradeSet, TraderError, WorkerOutcome, WorkerResult,
};

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

/// Lifecycle states, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerState {
    Authenticating,
    SolvingChallenge,
    Drafting,
    AwaitingRelease,
    Submitting,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Authenticating => write!(f, "authenticating"),
            WorkerState::SolvingChallenge => write!(f, "solving-challenge"),
            WorkerState::Drafting => write!(f, "drafting"),
            WorkerState::AwaitingRelease => write!(f, "awaiting-release"),
            WorkerState::Submitting => write!(f, "submitting"),
        }
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Owns one account's pipeline from login to bulk submission.
pub struct AccountWorker {
    account: Account,
    trades: TradeSet,
    solver: Arc<dyn ChallengeSolver>,
    release: ReleaseGate,
    max_challenge_attempts: u32,
}

impl AccountWorker {
    pub fn new(
        account: Account,
        trades: TradeSet,
        solver: Arc<dyn ChallengeSolver>,
        release: ReleaseGate,
        max_challenge_attempts: u32,
    ) -> Self {
        Self {
            account,
            trades,
            solver,
            release,
            max_challenge_attempts,
        }
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Run the full pipeline on an exclusive session. Always closes the
    /// session, whatever terminal state is reached. All events are
    /// emitted inside a span tagged with the owning account.
    pub async fn run(&self, mut session: Box<dyn TradingSession>) -> WorkerResult {
        let span = tracing::info_span!("worker", account = %self.account.username);
        async {
            let result = self.run_pipeline(session.as_mut()).await;
            session.close().await;
            info!(outcome = %result.outcome, "Worker finished");
            result
        }
        .instrument(span)
        .await
    }

    async fn run_pipeline(&self, session: &mut dyn TradingSession) -> WorkerResult {
        // -- Authenticating ----------------------------------------------
        debug!(state = %WorkerState::Authenticating, platform = session.name(), "State entered");
        match session.login(&self.account).await {
            Ok(LoginStatus::LoggedIn) => {
                info!("Login accepted without challenge");
            }
            Ok(LoginStatus::ChallengeRequired) => {
                debug!(state = %WorkerState::SolvingChallenge, "State entered");
                if let Err(e) = self.solve_challenge(session).await {
                    warn!(error = %e, "Challenge budget exhausted");
                    return WorkerResult::failed(
                        &self.account.username,
                        WorkerOutcome::ChallengeExhausted,
                        e.to_string(),
                    );
                }
                info!("Challenge accepted, session authenticated");
            }
            Err(e) => {
                warn!(error = %e, "Authentication failed");
                return WorkerResult::failed(
                    &self.account.username,
                    WorkerOutcome::AuthFailed,
                    e.to_string(),
                );
            }
        }

        // -- Drafting ----------------------------------------------------
        debug!(state = %WorkerState::Drafting, "State entered");
        let ordered = sequencer::sequence(&self.trades);
        let mut drafts: Vec<DraftedOrder> = Vec::with_capacity(ordered.len());
        let mut draft_failures = 0usize;

        for instruction in &ordered {
            match session.draft_order(instruction).await {
                Ok(draft) => {
                    info!(ticker = %draft.ticker, price = draft.price, volume = draft.volume, "Order drafted");
                    drafts.push(draft);
                }
                Err(e) => {
                    // A single instruction's failure never aborts the worker.
                    warn!(ticker = %instruction.ticker, error = %e, "Draft failed, skipping instruction");
                    draft_failures += 1;
                }
            }
        }
        info!(
            drafted = drafts.len(),
            failed = draft_failures,
            total = ordered.len(),
            "Drafting complete"
        );

        // -- AwaitingRelease ---------------------------------------------
        debug!(state = %WorkerState::AwaitingRelease, "State entered");
        self.release.wait().await;

        match session.market_open().await {
            Ok(open) => debug!(market_open = open, "Platform market indicator"),
            Err(e) => warn!(error = %e, "Market indicator query failed"),
        }

        // -- Submitting --------------------------------------------------
        debug!(state = %WorkerState::Submitting, "State entered");
        let mut submitted = 0usize;
        let mut submit_failures = 0usize;

        for draft in &drafts {
            match session.submit_order(draft).await {
                Ok(()) => {
                    info!(ticker = %draft.ticker, "Order submitted");
                    submitted += 1;
                }
                Err(e) => {
                    warn!(ticker = %draft.ticker, error = %e, "Submit failed, continuing");
                    submit_failures += 1;
                }
            }
        }

        WorkerResult {
            username: self.account.username.clone(),
            outcome: WorkerOutcome::Completed,
            drafted: drafts.len(),
            draft_failures,
            submitted,
            submit_failures,
            failure_reason: None,
        }
    }

    /// Bounded challenge retry loop. Every attempt fetches a fresh
    /// image; answers are not reusable. A transport failure or a
    /// "no confident answer" from the solver consumes an attempt the
    /// same as a rejected answer.
    async fn solve_challenge(&self, session: &mut dyn TradingSession) -> Result<(), TraderError> {
        for attempt in 1..=self.max_challenge_attempts {
            let verdict = self.attempt_challenge(session, attempt).await;
            match verdict {
                Ok(ChallengeVerdict::Accepted) => return Ok(()),
                Ok(ChallengeVerdict::Rejected) => {
                    warn!(attempt, "Challenge answer rejected");
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Challenge attempt failed");
                }
            }
        }
        Err(TraderError::ChallengeExhausted {
            attempts: self.max_challenge_attempts,
        })
    }

    async fn attempt_challenge(
        &self,
        session: &mut dyn TradingSession,
        attempt: u32,
    ) -> Result<ChallengeVerdict, TraderError> {
        let image = session.fetch_challenge().await?;
        debug!(attempt, image_bytes = image.len(), "Challenge image fetched");

        let answer = self
            .solver
            .solve(&image)
            .await?
            .ok_or_else(|| TraderError::Challenge("no confident answer".into()))?;

        debug!(attempt, solver = self.solver.name(), "Submitting challenge answer");
        session.answer_challenge(&answer).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
