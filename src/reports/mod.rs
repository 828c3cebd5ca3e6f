// Reports module - valuation sampling, performance index and aggregation

pub mod aggregation;
pub mod performance;
pub mod period;
pub mod valuation;

pub use aggregation::{Aggregation, Period};
pub use performance::{chain_link, ClientIndex, IndexSettings, PerformanceIndex};
pub use period::{Interval, ReportingPeriod};
pub use valuation::{DailySample, MissingPricePolicy, Valuation, ValuationSampler};
