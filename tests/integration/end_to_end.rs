//! Full-pipeline scenarios against the mock brokerage.
//!
//! These run the real orchestrator, workers, sequencer and release
//! gate over scripted sessions, checking the terminal result of every
//! account plus the journal of what actually reached the venue.

use chrono::Local;
use std::sync::Arc;
use std::time::Duration;

use openbell::orchestrator::Orchestrator;
use openbell::platform::{SessionProvider, TradingSession};
use openbell::sources;
use openbell::timing::ReleaseGate;
use openbell::types::{Account, WorkerOutcome};

use crate::mock_platform::{AccountBehavior, MockBroker, ScriptedSolver};

const TRADES_CSV: &str = "\
username,ticker,price,volume,direction
user_a,STOCK_A,200,100,Sell
user_b,STOCK_X,100,500,Buy
user_b,STOCK_Y,0,0,Buy
user_b,STOCK_Z,150,0,Buy
";

const CREDENTIALS_CSV: &str = "\
username,password
user_a,pw-a
user_b,pw-b
";

/// A gate whose instant has already passed, so workers submit at once.
fn open_gate() -> ReleaseGate {
    ReleaseGate::new(Local::now().time(), Duration::from_secs(3600))
}

#[tokio::test]
async fn test_full_run_sequences_and_submits_everything() {
    let accounts = sources::load_accounts(CREDENTIALS_CSV.as_bytes()).unwrap();
    let trade_sets = sources::load_trade_sets(TRADES_CSV.as_bytes()).unwrap();

    let broker = Arc::new(MockBroker::new());
    let journal = Arc::clone(&broker.journal);
    let orchestrator = Orchestrator::new(broker, Arc::new(ScriptedSolver), open_gate(), 3);

    let summary = orchestrator.run(accounts, trade_sets).await;
    assert!(summary.all_succeeded(), "{summary}");
    assert_eq!(summary.total_submitted(), 4);

    // Live-data instructions come first within user_b's partition.
    let order: Vec<String> = journal
        .drafts()
        .into_iter()
        .filter(|(user, _)| user == "user_b")
        .map(|(_, draft)| draft.ticker)
        .collect();
    assert_eq!(order, vec!["STOCK_Y", "STOCK_Z", "STOCK_X"]);

    assert_eq!(journal.submissions_for("user_b").len(), 3);
    assert_eq!(journal.submissions_for("user_a").len(), 1);
    // Sessions close even on success.
    assert_eq!(journal.closed_sessions(), 2);
}

#[tokio::test]
async fn test_no_submission_before_release_instant() {
    let accounts = sources::load_accounts(CREDENTIALS_CSV.as_bytes()).unwrap();
    let trade_sets = sources::load_trade_sets(TRADES_CSV.as_bytes()).unwrap();

    let broker = Arc::new(MockBroker::new());
    let journal = Arc::clone(&broker.journal);

    // Release just under half a second out. Drafting happens before the
    // gate; no order may reach the venue before the instant.
    let release_at = Local::now() + chrono::Duration::milliseconds(400);
    let gate = ReleaseGate::new(release_at.time(), Duration::from_secs(10));
    let orchestrator = Orchestrator::new(broker, Arc::new(ScriptedSolver), gate, 3);

    let summary = orchestrator.run(accounts, trade_sets).await;
    assert!(summary.all_succeeded(), "{summary}");

    let submissions = journal.submissions();
    assert_eq!(submissions.len(), 4);
    for submission in &submissions {
        assert!(
            submission.at >= release_at - chrono::Duration::milliseconds(20),
            "{} for {} submitted at {}, before release instant {}",
            submission.ticker,
            submission.username,
            submission.at,
            release_at
        );
    }
    // Drafting is not gated.
    assert_eq!(journal.drafts().len(), 4);
}

#[tokio::test]
async fn test_challenge_solved_within_budget() {
    let broker = Arc::new(MockBroker::new());
    broker.script(
        "user_a",
        AccountBehavior {
            require_challenge: true,
            reject_challenges: 2,
            ..Default::default()
        },
    );
    let journal = Arc::clone(&broker.journal);
    let orchestrator = Orchestrator::new(broker, Arc::new(ScriptedSolver), open_gate(), 3);

    let accounts = vec![Account::new("user_a", "pw-a")];
    let trade_sets = sources::load_trade_sets(
        "username,ticker,price,volume,direction\nuser_a,STOCK_A,200,100,Sell\n".as_bytes(),
    )
    .unwrap();

    let summary = orchestrator.run(accounts, trade_sets).await;
    assert!(summary.all_succeeded(), "{summary}");
    assert_eq!(journal.submissions_for("user_a").len(), 1);
}

#[tokio::test]
async fn test_challenge_exhaustion_is_terminal_with_no_submissions() {
    let broker = Arc::new(MockBroker::new());
    broker.script(
        "user_a",
        AccountBehavior {
            require_challenge: true,
            reject_challenges: 3,
            ..Default::default()
        },
    );
    let journal = Arc::clone(&broker.journal);
    let orchestrator = Orchestrator::new(broker, Arc::new(ScriptedSolver), open_gate(), 3);

    let accounts = vec![Account::new("user_a", "pw-a")];
    let trade_sets = sources::load_trade_sets(
        "username,ticker,price,volume,direction\nuser_a,STOCK_A,200,100,Sell\n".as_bytes(),
    )
    .unwrap();

    let summary = orchestrator.run(accounts, trade_sets).await;
    assert!(!summary.all_succeeded());
    assert_eq!(summary.results[0].outcome, WorkerOutcome::ChallengeExhausted);
    assert!(journal.drafts().is_empty());
    assert!(journal.submissions().is_empty());
    // The session still gets closed on the failure path.
    assert_eq!(journal.closed_sessions(), 1);
}

#[tokio::test]
async fn test_one_bad_account_never_touches_its_siblings() {
    let broker = Arc::new(MockBroker::new());
    broker.script(
        "user_3",
        AccountBehavior {
            fail_auth: true,
            ..Default::default()
        },
    );
    let journal = Arc::clone(&broker.journal);
    let orchestrator = Orchestrator::new(broker, Arc::new(ScriptedSolver), open_gate(), 3);

    let accounts: Vec<Account> = (1..=5)
        .map(|i| Account::new(format!("user_{i}"), "pw"))
        .collect();
    let mut csv = String::from("username,ticker,price,volume,direction\n");
    for i in 1..=5 {
        csv.push_str(&format!("user_{i},STOCK_A,200,100,Sell\n"));
    }
    let trade_sets = sources::load_trade_sets(csv.as_bytes()).unwrap();

    let summary = orchestrator.run(accounts, trade_sets).await;
    assert_eq!(summary.results.len(), 5);
    assert_eq!(summary.completed_count(), 4);
    assert_eq!(summary.failed_count(), 1);

    let failed = summary
        .results
        .iter()
        .find(|r| r.username == "user_3")
        .unwrap();
    assert_eq!(failed.outcome, WorkerOutcome::AuthFailed);
    assert!(journal.submissions_for("user_3").is_empty());
    for i in [1u32, 2, 4, 5] {
        assert_eq!(journal.submissions_for(&format!("user_{i}")).len(), 1);
    }
}

#[tokio::test]
async fn test_missing_partition_is_a_config_error_before_launch() {
    let broker = Arc::new(MockBroker::new());
    let journal = Arc::clone(&broker.journal);
    let orchestrator = Orchestrator::new(broker, Arc::new(ScriptedSolver), open_gate(), 3);

    let accounts = vec![Account::new("user_a", "pw-a"), Account::new("user_b", "pw-b")];
    let trade_sets = sources::load_trade_sets(
        "username,ticker,price,volume,direction\nuser_b,STOCK_X,100,500,Buy\n".as_bytes(),
    )
    .unwrap();

    let summary = orchestrator.run(accounts, trade_sets).await;
    assert_eq!(summary.config_errors.len(), 1);
    assert!(summary.config_errors[0].contains("user_a"));
    assert!(!summary.all_succeeded());

    // user_b's worker still ran to completion.
    assert_eq!(summary.results.len(), 1);
    assert!(summary.results[0].is_success());
    assert_eq!(journal.submissions_for("user_b").len(), 1);
    assert!(journal.submissions_for("user_a").is_empty());
}

#[tokio::test]
async fn test_draft_failure_recorded_but_run_continues() {
    let broker = Arc::new(MockBroker::new());
    broker.script(
        "user_b",
        AccountBehavior {
            failing_tickers: vec!["STOCK_Z".to_string()],
            ..Default::default()
        },
    );
    let journal = Arc::clone(&broker.journal);
    let orchestrator = Orchestrator::new(broker, Arc::new(ScriptedSolver), open_gate(), 3);

    let accounts = vec![Account::new("user_b", "pw-b")];
    let trade_sets = sources::load_trade_sets(
        "username,ticker,price,volume,direction\n\
         user_b,STOCK_X,100,500,Buy\n\
         user_b,STOCK_Z,150,0,Buy\n"
            .as_bytes(),
    )
    .unwrap();

    let summary = orchestrator.run(accounts, trade_sets).await;
    let result = &summary.results[0];
    assert_eq!(result.outcome, WorkerOutcome::Completed);
    assert_eq!(result.draft_failures, 1);
    assert_eq!(result.submitted, 1);
    assert!(!result.is_success());
    assert!(!summary.all_succeeded());
    assert_eq!(journal.submissions_for("user_b").len(), 1);
    assert_eq!(journal.submissions_for("user_b")[0].ticker, "STOCK_X");
}

#[tokio::test]
async fn test_drafting_is_deterministic_per_instruction() {
    let broker = MockBroker::new();
    let account = Account::new("user_a", "pw-a");
    let mut session = broker.open_session(&account).await.unwrap();

    let trades = sources::load_trade_sets(
        "username,ticker,price,volume,direction\nuser_a,STOCK_X,100,500,Buy\n".as_bytes(),
    )
    .unwrap();
    let instruction = &trades["user_a"][0];

    let first = session.draft_order(instruction).await.unwrap();
    let second = session.draft_order(instruction).await.unwrap();

    // Fresh draft ids, identical resolved terms.
    assert_ne!(first.draft_id, second.draft_id);
    assert_eq!(first.ticker, second.ticker);
    assert_eq!(first.price, second.price);
    assert_eq!(first.volume, second.volume);
    assert_eq!(first.resolved_price, second.resolved_price);
    assert_eq!(first.resolved_volume, second.resolved_volume);
}
