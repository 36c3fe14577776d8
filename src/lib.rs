//! Coordinator that hands out block-range replay jobs to worker hosts.
//!
//! The binary in `main.rs` wraps this library; workers can depend on
//! [`client::CoordinatorClient`] directly.

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod hosts;
pub mod logging;
pub mod manifest;
pub mod orchestrator;
pub mod server;
pub mod state_machine;
pub mod summary;
pub mod ui;
