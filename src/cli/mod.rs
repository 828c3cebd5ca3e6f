use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use wealthindex::reports::{Period, ReportingPeriod};

pub mod formatters;

#[derive(Parser)]
#[command(name = "wealthindex")]
#[command(version, about = "Time-weighted performance index of a personal wealth")]
#[command(
    long_about = "Import account and portfolio transactions plus security prices, then compute the daily time-weighted return of everything you own, net of deposits and withdrawals."
)]
pub struct Cli {
    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// SQLite database to use instead of the configured one
    #[arg(long = "db", global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import account and portfolio transactions from a CSV file
    Import {
        /// Path to the CSV file
        file: String,

        /// Preview only, don't save to database
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Price data management
    Prices {
        #[command(subcommand)]
        action: PriceCommands,
    },

    /// Compute the client performance index over a reporting period
    Index {
        /// YTD, QTD, MTD, 1Y, 6M, 30D, 2023, since:2020-01-01 or 2012-01-01:2012-12-31
        period: ReportingPeriod,

        /// Compound daily returns into weekly, monthly, quarterly or yearly buckets
        #[arg(short, long, value_name = "PERIOD")]
        aggregate: Option<Period>,

        /// Resolve relative periods against this day instead of today
        #[arg(long, value_name = "YYYY-MM-DD")]
        as_of: Option<NaiveDate>,
    },
}

#[derive(Subcommand)]
pub enum PriceCommands {
    /// Import closing prices from a CSV file (security,date,close)
    Import {
        /// Path to the CSV file
        file: String,
    },
}
