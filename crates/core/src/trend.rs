//! Vocabulary of the dashboard read API.
//!
//! Only the fixed windows and bucket sizes below are accepted; each maps to
//! a PostgreSQL interval literal bound as a query parameter.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Look-back window of an offset aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OffsetWindow {
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "14d")]
    Fortnight,
    #[serde(rename = "90d")]
    Quarter,
}

impl OffsetWindow {
    pub fn as_interval(self) -> &'static str {
        match self {
            OffsetWindow::Day => "24 hours",
            OffsetWindow::Fortnight => "14 days",
            OffsetWindow::Quarter => "90 days",
        }
    }

    /// Bucket size the dashboard pairs with this window.
    pub fn default_bucket(self) -> BucketInterval {
        match self {
            OffsetWindow::Day => BucketInterval::FiveMinutes,
            OffsetWindow::Fortnight => BucketInterval::Hour,
            OffsetWindow::Quarter => BucketInterval::Day,
        }
    }
}

impl FromStr for OffsetWindow {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "24h" => Ok(OffsetWindow::Day),
            "14d" => Ok(OffsetWindow::Fortnight),
            "90d" => Ok(OffsetWindow::Quarter),
            other => Err(CoreError::Validation(format!(
                "window must be one of 24h, 14d, 90d, got '{other}'"
            ))),
        }
    }
}

/// Aggregation bucket width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BucketInterval {
    #[serde(rename = "5min")]
    FiveMinutes,
    #[serde(rename = "1h")]
    Hour,
    #[serde(rename = "1d")]
    Day,
}

impl BucketInterval {
    pub fn as_interval(self) -> &'static str {
        match self {
            BucketInterval::FiveMinutes => "5 minutes",
            BucketInterval::Hour => "1 hour",
            BucketInterval::Day => "1 day",
        }
    }
}

impl FromStr for BucketInterval {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "5min" => Ok(BucketInterval::FiveMinutes),
            "1h" => Ok(BucketInterval::Hour),
            "1d" => Ok(BucketInterval::Day),
            other => Err(CoreError::Validation(format!(
                "interval must be one of 5min, 1h, 1d, got '{other}'"
            ))),
        }
    }
}
