//! OPENBELL: Multi-account batch order bot for the opening bell
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod sources;
pub mod sequencer;
pub mod timing;
pub mod solver;
pub mod platform;
pub mod worker;
pub mod orchestrator;
