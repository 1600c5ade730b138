//! Pure domain logic for the NTP/GPS health monitor.
//!
//! Nothing in this crate performs I/O. The agent crate feeds raw command
//! output in and takes samples, verdicts and alert messages out; the db crate
//! uses the partition calendar helpers and the trend vocabulary.

pub mod alert;
pub mod error;
pub mod health;
pub mod parser;
pub mod partition;
pub mod sample;
pub mod trend;
pub mod types;
