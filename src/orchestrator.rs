//! Run orchestration: one isolated worker per account.
//!
//! Pairs each account with its trade partition, reports configuration
//! errors for accounts with no partition before anything launches,
//! then spawns one task per remaining account. Workers fail
//! independently: a panic or terminal failure in one never touches its
//! siblings, and the orchestrator only ever sees each worker's
//! terminal `WorkerResult`.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::platform::SessionProvider;
use crate::solver::ChallengeSolver;
use crate::timing::ReleaseGate;
use crate::types::{Account, RunSummary, TradeSet, WorkerOutcome, WorkerResult};
use crate::worker::AccountWorker;

pub struct Orchestrator {
    provider: Arc<dyn SessionProvider>,
    solver: Arc<dyn ChallengeSolver>,
    release: ReleaseGate,
    max_challenge_attempts: u32,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn SessionProvider>,
        solver: Arc<dyn ChallengeSolver>,
        release: ReleaseGate,
        max_challenge_attempts: u32,
    ) -> Self {
        Self {
            provider,
            solver,
            release,
            max_challenge_attempts,
        }
    }

    /// Launch a worker per account and wait for every terminal state.
    pub async fn run(
        &self,
        accounts: Vec<Account>,
        mut trade_sets: HashMap<String, TradeSet>,
    ) -> RunSummary {
        info!(accounts = accounts.len(), "Starting multi-account run");

        // Pair accounts with partitions before any worker launches.
        let mut config_errors = Vec::new();
        let mut launchable = Vec::new();
        for account in accounts {
            match trade_sets.remove(&account.username) {
                Some(trades) => launchable.push((account, trades)),
                None => {
                    let message =
                        format!("account {} has no matching trade partition", account.username);
                    error!(account = %account.username, "Configuration error: no trade partition");
                    config_errors.push(message);
                }
            }
        }
        for orphan in trade_sets.keys() {
            warn!(partition = %orphan, "Trade partition has no matching account, ignoring");
        }

        let mut handles = Vec::with_capacity(launchable.len());
        for (account, trades) in launchable {
            let username = account.username.clone();
            let provider = Arc::clone(&self.provider);
            let worker = AccountWorker::new(
                account,
                trades,
                Arc::clone(&self.solver),
                self.release,
                self.max_challenge_attempts,
            );

            info!(account = %username, "Launching worker");
            let handle = tokio::spawn(async move {
                let session = match provider.open_session(worker.account()).await {
                    Ok(session) => session,
                    Err(e) => {
                        return WorkerResult::failed(
                            &worker.account().username,
                            WorkerOutcome::AuthFailed,
                            e.to_string(),
                        );
                    }
                };
                worker.run(session).await
            });
            handles.push((username, handle));
        }

        // Wait for every terminal state. A lost task (panic) becomes a
        // failed result for that account only.
        let results = futures::future::join_all(handles.into_iter().map(
            |(username, handle)| async move {
                match handle.await {
                    Ok(result) => result,
                    Err(e) => {
                        error!(account = %username, error = %e, "Worker task lost");
                        WorkerResult::failed(
                            &username,
                            WorkerOutcome::Aborted,
                            format!("worker task lost: {e}"),
                        )
                    }
                }
            },
        ))
        .await;

        let summary = RunSummary {
            results,
            config_errors,
        };
        for result in &summary.results {
            info!(account = %result.username, "{result}");
        }
        info!(%summary, "Run complete");
        summary
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
