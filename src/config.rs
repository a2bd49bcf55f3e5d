//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (API keys) are referenced by env-var name in the config and
//! resolved at runtime via `std::env::var`. All concrete platform
//! addressing (endpoint paths) lives here, not in the engine.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub run: RunConfig,
    pub platform: PlatformConfig,
    pub solver: SolverConfig,
}

/// Run-wide settings: data sources and submission timing.
#[derive(Debug, Deserialize, Clone)]
pub struct RunConfig {
    /// Path to the credentials CSV (`username,password`).
    pub credentials_path: String,
    /// Path to the trades CSV (`username,ticker,price,volume,direction`).
    pub trades_path: String,
    /// Local time-of-day at which all workers release their drafts,
    /// formatted `HH:MM:SS`.
    pub release_time: String,
    /// Seconds past the release instant within which workers still
    /// submit immediately instead of waiting for the next day.
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u64,
    /// Consecutive rejected challenge answers before a worker gives up.
    #[serde(default = "default_challenge_attempts")]
    pub challenge_max_attempts: u32,
}

/// Trading platform web surface. The engine depends only on the
/// operations these paths expose, never on the addressing itself.
#[derive(Debug, Deserialize, Clone)]
pub struct PlatformConfig {
    pub name: String,
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    pub login_path: String,
    pub challenge_image_path: String,
    pub challenge_answer_path: String,
    pub draft_path: String,
    pub submit_path: String,
    pub market_status_path: String,
    pub logout_path: String,
}

/// External text-recognition service for access challenges.
#[derive(Debug, Deserialize, Clone)]
pub struct SolverConfig {
    pub endpoint: String,
    /// Env var holding the recognition service API key, if required.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_solver_timeout_secs")]
    pub timeout_secs: u64,
    /// Minimum per-fragment confidence to accept recognized text.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
}

fn default_grace_secs() -> u64 {
    10
}

fn default_challenge_attempts() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_solver_timeout_secs() -> u64 {
    20
}

fn default_min_confidence() -> f64 {
    0.5
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
