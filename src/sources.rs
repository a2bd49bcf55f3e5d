//! Tabular data sources: credentials and trade partitions.
//!
//! Credentials are one CSV row per account. Trades live in a single
//! CSV partitioned by a `username` column; partition name == username,
//! matched as an exact string. Usernames are opaque identifiers;
//! `00731` must survive the round trip with its leading zeros.
//!
//! Row cleaning mirrors the upstream data contract: tickers are
//! trimmed and uppercased, non-numeric price/volume values coerce to
//! the market-default sentinel, and rows with an unknown direction or
//! empty ticker are skipped and counted.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io;
use tracing::{info, warn};

use crate::types::{Account, Direction, TradeInstruction, TradeSet};

#[derive(Debug, Deserialize)]
struct CredentialRow {
    #[serde(alias = "Username")]
    username: String,
    #[serde(alias = "Password")]
    password: String,
}

#[derive(Debug, Deserialize)]
struct TradeRow {
    #[serde(alias = "Username")]
    username: String,
    #[serde(alias = "Ticker", alias = "Name")]
    ticker: String,
    #[serde(alias = "Price", default)]
    price: String,
    #[serde(alias = "Volume", default)]
    volume: String,
    #[serde(alias = "Direction")]
    direction: String,
}

/// Coerce a raw numeric cell. Non-numeric and negative values fall
/// back to `0`, i.e. the market-default sentinel.
fn coerce_numeric(raw: &str) -> u32 {
    let trimmed = raw.trim();
    if let Ok(v) = trimmed.parse::<u32>() {
        return v;
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => v as u32,
        _ => 0,
    }
}

/// Read all account credentials. Rows with an empty username or
/// password are skipped with a warning.
pub fn load_accounts<R: io::Read>(reader: R) -> Result<Vec<Account>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut accounts = Vec::new();

    for row in csv_reader.deserialize() {
        let row: CredentialRow = row.context("Malformed credentials row")?;
        if row.username.is_empty() {
            warn!("Skipping credentials row with empty username");
            continue;
        }
        if row.password.is_empty() {
            warn!(account = %row.username, "Skipping account: password missing");
            continue;
        }
        accounts.push(Account::new(row.username, row.password));
    }

    info!(count = accounts.len(), "Credentials loaded");
    Ok(accounts)
}

pub fn load_accounts_file(path: &str) -> Result<Vec<Account>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open credentials file: {path}"))?;
    load_accounts(file)
}

/// Read all trade instructions, grouped into per-account partitions
/// keyed by the exact `username` string.
pub fn load_trade_sets<R: io::Read>(reader: R) -> Result<HashMap<String, TradeSet>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut partitions: HashMap<String, TradeSet> = HashMap::new();
    let mut skipped = 0usize;
    let mut total = 0usize;

    for row in csv_reader.deserialize() {
        let row: TradeRow = row.context("Malformed trades row")?;
        total += 1;

        let ticker = row.ticker.trim().to_uppercase();
        let direction: Direction = match row.direction.parse() {
            Ok(d) => d,
            Err(_) => {
                warn!(
                    partition = %row.username,
                    direction = %row.direction,
                    "Skipping trade row: unknown direction"
                );
                skipped += 1;
                continue;
            }
        };
        if ticker.is_empty() {
            warn!(partition = %row.username, "Skipping trade row: empty ticker");
            skipped += 1;
            continue;
        }

        let instruction = TradeInstruction::from_raw(
            ticker,
            coerce_numeric(&row.price),
            coerce_numeric(&row.volume),
            direction,
        );
        partitions.entry(row.username).or_default().push(instruction);
    }

    if skipped > 0 {
        warn!(skipped, total, "Some trade rows were invalid and skipped");
    }
    info!(
        partitions = partitions.len(),
        instructions = total - skipped,
        "Trade data loaded"
    );
    Ok(partitions)
}

pub fn load_trade_sets_file(path: &str) -> Result<HashMap<String, TradeSet>> {
    let file = File::open(path).with_context(|| format!("Failed to open trades file: {path}"))?;
    load_trade_sets(file)
}
