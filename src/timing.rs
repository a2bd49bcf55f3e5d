//! Release timing.
//!
//! Every worker independently computes the same absolute release
//! instant from shared configuration: a local time-of-day with a short
//! grace window. Within the window the worker proceeds immediately;
//! past it, the target rolls to the next day. The wait itself is the
//! engine's only designed blocking suspension.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime, NaiveTime};
use std::time::Duration;
use tracing::info;

/// How long to suspend from `now` until the release instant.
///
/// Pure function so the three cases (before target, within grace,
/// past grace) are unit-testable without a clock.
pub fn delay_until(now: NaiveDateTime, target: NaiveTime, grace: Duration) -> Duration {
    let target_today = now.date().and_time(target);
    let grace = chrono::Duration::from_std(grace).unwrap_or_else(|_| chrono::Duration::seconds(10));

    if now < target_today {
        // Still before today's release.
        (target_today - now).to_std().unwrap_or(Duration::ZERO)
    } else if now <= target_today + grace {
        // Just past the instant: submit immediately.
        Duration::ZERO
    } else {
        // Missed today's window entirely: wait for tomorrow.
        let target_tomorrow = (now.date() + chrono::Duration::days(1)).and_time(target);
        (target_tomorrow - now).to_std().unwrap_or(Duration::ZERO)
    }
}

/// The shared synchronized-release barrier.
///
/// Cheap to clone; each worker holds its own copy and computes the
/// same instant, so there is no cross-worker synchronization primitive.
#[derive(Debug, Clone, Copy)]
pub struct ReleaseGate {
    target: NaiveTime,
    grace: Duration,
}

impl ReleaseGate {
    pub fn new(target: NaiveTime, grace: Duration) -> Self {
        Self { target, grace }
    }

    /// Parse an `HH:MM:SS` release time from configuration.
    pub fn from_config(release_time: &str, grace_secs: u64) -> Result<Self> {
        let target = NaiveTime::parse_from_str(release_time, "%H:%M:%S")
            .with_context(|| format!("Invalid release time (want HH:MM:SS): {release_time}"))?;
        Ok(Self::new(target, Duration::from_secs(grace_secs)))
    }

    pub fn target(&self) -> NaiveTime {
        self.target
    }

    /// Suspend (non-busy) until the release instant, or return at once
    /// if the instant has just passed.
    pub async fn wait(&self) {
        let delay = delay_until(Local::now().naive_local(), self.target, self.grace);
        if delay.is_zero() {
            info!(target = %self.target, "Release instant already passed, proceeding immediately");
            return;
        }
        info!(
            target = %self.target,
            wait_secs = delay.as_secs(),
            "Waiting for release instant"
        );
        tokio::time::sleep(delay).await;
        info!(target = %self.target, "Release instant reached");
    }
}
