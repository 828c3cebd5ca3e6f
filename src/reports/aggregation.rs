//! Re-binning of a daily index into calendar buckets
//!
//! Bucket returns are the geometric compound of the daily returns they
//! contain, so the last accumulated value of an aggregated index equals
//! the last accumulated value of its source.

use chrono::{Datelike, NaiveDate};
use itertools::Itertools;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::error::IndexError;
use crate::reports::performance::{compound, PerformanceIndex};

/// Calendar bucket size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    /// ISO weeks, Monday to Sunday
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
            Period::Quarterly => "quarterly",
            Period::Yearly => "yearly",
        }
    }

    /// Identifies the bucket a day falls into
    fn bucket(&self, date: NaiveDate) -> (i32, u32) {
        match self {
            Period::Weekly => {
                let week = date.iso_week();
                (week.year(), week.week())
            }
            Period::Monthly => (date.year(), date.month()),
            Period::Quarterly => (date.year(), date.month0() / 3),
            Period::Yearly => (date.year(), 0),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekly" | "week" | "w" => Ok(Period::Weekly),
            "monthly" | "month" | "m" => Ok(Period::Monthly),
            "quarterly" | "quarter" | "q" => Ok(Period::Quarterly),
            "yearly" | "year" | "y" => Ok(Period::Yearly),
            _ => Err(IndexError::InvalidPeriod(s.to_string())),
        }
    }
}

pub struct Aggregation;

impl Aggregation {
    /// Rebin `index` into `period` buckets.
    ///
    /// Each bucket is dated by its last day inside the reporting interval
    /// and carries the valuation of that day and the sum of its
    /// transferals. The source index is left untouched.
    pub fn aggregate(index: &PerformanceIndex, period: Period) -> PerformanceIndex {
        let source_dates = index.dates();
        let source_delta = index.delta_percentage();
        let source_totals = index.totals();
        let source_transferals = index.transferals();

        let mut dates = Vec::new();
        let mut delta = Vec::new();
        let mut totals = Vec::new();
        let mut transferals = Vec::new();

        let buckets = (0..index.len()).chunk_by(|&i| period.bucket(source_dates[i]));
        for (_, days) in &buckets {
            let mut factor = Decimal::ONE;
            let mut flows = Decimal::ZERO;
            let mut last = None;
            for i in days {
                match compound(factor, source_delta[i]) {
                    Some(next) => factor = next,
                    None => warn!(
                        "{} bucket: return of {} does not fit, counted as zero",
                        period, source_dates[i]
                    ),
                }
                flows += source_transferals[i];
                last = Some(i);
            }
            // chunks are never empty
            let Some(last) = last else { continue };

            debug!(
                "{} bucket ending {}: delta {}",
                period,
                source_dates[last],
                (factor - Decimal::ONE).round_dp(8)
            );

            dates.push(source_dates[last]);
            delta.push(factor - Decimal::ONE);
            totals.push(source_totals[last]);
            transferals.push(flows);
        }

        let (aggregated, overflowed) = PerformanceIndex::from_parts(
            index.report_interval().clone(),
            index.interval(),
            index.first_data_point(),
            dates,
            delta,
            totals,
            transferals,
        );
        for date in overflowed {
            warn!("{} bucket ending {}: return does not fit, counted as zero", period, date);
        }
        aggregated
    }
}
