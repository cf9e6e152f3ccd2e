//! TAPBOT: tap-to-earn clicker autopilot
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod game;
pub mod strategy;
pub mod engine;
