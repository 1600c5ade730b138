//! `ntpwatch-agent` library crate.
//!
//! Re-exports internal modules for integration testing. The binary
//! entrypoint lives in `main.rs`.

pub mod config;
pub mod cycle;
pub mod gateway;
pub mod maintenance;
pub mod poller;
