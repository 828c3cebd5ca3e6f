//! Wealthindex - time-weighted performance index for an investor's holdings
//!
//! This library samples the daily valuation of cash accounts and securities
//! portfolios, separates external cash flows from investment performance,
//! chain-links the daily returns into a cumulative curve and re-aggregates
//! that curve into weekly, monthly, quarterly or yearly buckets.

pub mod config;
pub mod db;
pub mod error;
pub mod importers;
pub mod pricing;
pub mod reports;
pub mod taxonomy;
pub mod utils;
