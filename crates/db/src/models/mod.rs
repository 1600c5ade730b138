//! Row types returned by the repositories.

pub mod ntp_sample;
pub mod partition;
