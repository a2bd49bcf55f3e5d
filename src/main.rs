//! OPENBELL: Multi-account batch order bot for the opening bell
//!
//! Entry point. Loads configuration, initialises structured logging,
//! reads the credentials and trade sources, and runs one isolated
//! worker per account. The exit status reflects whether every account
//! fully succeeded.

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};

use openbell::config::AppConfig;
use openbell::orchestrator::Orchestrator;
use openbell::platform::web::WebPlatform;
use openbell::solver::OcrSolver;
use openbell::sources;
use openbell::timing::ReleaseGate;

const BANNER: &str = r#"
  ___  ____  _____ _   _ ____  _____ _     _
 / _ \|  _ \| ____| \ | | __ )| ____| |   | |
| | | | |_) |  _| |  \| |  _ \|  _| | |   | |
| |_| |  __/| |___| |\  | |_) | |___| |___| |___
 \___/|_|   |_____|_| \_|____/|_____|_____|_____|

  Multi-account batch orders at the opening bell
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML
    let cfg = AppConfig::load("config.toml")?;

    // Initialise structured logging
    init_logging();

    // Print startup banner
    println!("{BANNER}");
    info!(
        platform = %cfg.platform.name,
        release_time = %cfg.run.release_time,
        challenge_max_attempts = cfg.run.challenge_max_attempts,
        "OPENBELL starting up"
    );

    // -- Load sources ------------------------------------------------------

    let accounts = sources::load_accounts_file(&cfg.run.credentials_path)?;
    if accounts.is_empty() {
        error!("No credentials loaded. Shutting down.");
        std::process::exit(1);
    }
    let trade_sets = sources::load_trade_sets_file(&cfg.run.trades_path)?;

    // -- Initialise components ---------------------------------------------

    let release = ReleaseGate::from_config(&cfg.run.release_time, cfg.run.grace_secs)?;
    let solver = Arc::new(OcrSolver::new(&cfg.solver)?);
    let provider = Arc::new(WebPlatform::new(cfg.platform.clone()));

    let orchestrator = Orchestrator::new(
        provider,
        solver,
        release,
        cfg.run.challenge_max_attempts,
    );

    // -- Run ---------------------------------------------------------------

    let summary = orchestrator.run(accounts, trade_sets).await;
    info!(%summary, "All workers finished. Shutting down.");

    if !summary.all_succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

/// Initialise the `tracing` subscriber.
///
/// The subscriber is the shared log sink for all workers: each event
/// carries its owning account as a span field, so concurrent workers
/// never interleave within a line.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("openbell=info"));

    let json_logging = std::env::var("OPENBELL_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
