//! Error handling for the performance index
//!
//! Two kinds of failure exist. Structural faults (`IndexError`) abort a
//! computation before any series is built. Per-day anomalies (`Anomaly`)
//! never abort: they are collected next to a fully computed index.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

/// Message prefix of [`Anomaly::DeltaWithoutAssets`]
pub const MSG_DELTA_WITHOUT_ASSETS: &str = "Delta without assets";

/// Message prefix of [`Anomaly::MissingPrice`]
pub const MSG_MISSING_PRICE: &str = "Missing price for security";

/// Message prefix of [`Anomaly::ReturnOverflow`]
pub const MSG_RETURN_OVERFLOW: &str = "Return overflow";

/// Structural faults raised before an index is computed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("invalid range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("date out of range while resolving {0}")]
    DateOverflow(String),

    #[error("invalid period '{0}'. Use: YYYY-MM-DD:YYYY-MM-DD, since:YYYY-MM-DD, YTD, QTD, MTD, <n>Y, <n>M, <n>D or YYYY")]
    InvalidPeriod(String),

    #[error("unknown transaction type '{0}'")]
    UnknownTransactionType(String),
}

/// A day whose return could not be computed reliably.
///
/// Anomalies are appended to the caller's collection. A day without
/// assets and a day whose return does not fit a `Decimal` contribute a
/// delta of zero; a missing price is bridged with the last known price of
/// the security.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    #[error("Delta without assets: change of {change} on {date} with no capital invested")]
    DeltaWithoutAssets { date: NaiveDate, change: Decimal },

    #[error("Missing price for security {security} on {date}")]
    MissingPrice { date: NaiveDate, security: String },

    #[error("Return overflow on {date}: return not representable, counted as zero")]
    ReturnOverflow { date: NaiveDate },
}

impl Anomaly {
    /// Day the anomaly refers to
    pub fn date(&self) -> NaiveDate {
        match self {
            Anomaly::DeltaWithoutAssets { date, .. }
            | Anomaly::MissingPrice { date, .. }
            | Anomaly::ReturnOverflow { date } => *date,
        }
    }
}

/// Result type alias for application-level operations (db, import, CLI)
pub type Result<T> = anyhow::Result<T>;
