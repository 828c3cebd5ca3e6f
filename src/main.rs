mod cli;

use clap::Parser;
use colored::Colorize;
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::{formatters, Cli, Commands, PriceCommands};
use wealthindex::config::Config;
use wealthindex::db;
use wealthindex::error::Result;
use wealthindex::importers;
use wealthindex::reports::{Aggregation, ClientIndex, Period, ReportingPeriod};

fn main() -> Result<()> {
    // Logs go to stderr so that --json output stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = Config::load()?;
    let db_path = match cli.db {
        Some(path) => path,
        None => config.database_path()?,
    };

    match cli.command {
        Commands::Import { file, dry_run } => handle_import(&file, dry_run, &db_path, cli.json),
        Commands::Prices { action } => match action {
            PriceCommands::Import { file } => handle_prices_import(&file, &db_path, cli.json),
        },
        Commands::Index {
            period,
            aggregate,
            as_of,
        } => handle_index(period, aggregate, as_of, &config, &db_path, cli.json),
    }
}

/// Handle import command
fn handle_import(file_path: &str, dry_run: bool, db_path: &Path, json: bool) -> Result<()> {
    info!("Importing transactions from: {}", file_path);

    let transactions = importers::parse_transactions_file(file_path)?;

    if !json {
        println!("{}", formatters::format_import_preview(&transactions));
    }

    if dry_run {
        if json {
            println!("{}", serde_json::json!({ "parsed": transactions.len(), "dry_run": true }));
        } else {
            println!("{} Dry run - no changes saved", "ℹ".blue().bold());
        }
        return Ok(());
    }

    db::init_database(Some(db_path.to_path_buf()))?;
    let mut conn = db::open_db(Some(db_path.to_path_buf()))?;
    let stats = importers::import_transactions(&mut conn, &transactions)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("{}", formatters::format_import_stats(&stats));
    }
    Ok(())
}

/// Handle prices import command
fn handle_prices_import(file_path: &str, db_path: &Path, json: bool) -> Result<()> {
    info!("Importing prices from: {}", file_path);

    let prices = importers::parse_prices_file(file_path)?;

    db::init_database(Some(db_path.to_path_buf()))?;
    let mut conn = db::open_db(Some(db_path.to_path_buf()))?;
    let imported = importers::import_prices(&mut conn, &prices)?;

    if json {
        println!("{}", serde_json::json!({ "imported_prices": imported }));
    } else {
        println!(
            "{} Imported {} prices",
            "✓".green().bold(),
            imported.to_string().green()
        );
    }
    Ok(())
}

/// Handle index command
fn handle_index(
    period: ReportingPeriod,
    aggregate: Option<Period>,
    as_of: Option<chrono::NaiveDate>,
    config: &Config,
    db_path: &Path,
    json: bool,
) -> Result<()> {
    db::init_database(Some(db_path.to_path_buf()))?;
    let conn = db::open_db(Some(db_path.to_path_buf()))?;
    let client = db::load_client(&conn)?;
    let prices = db::load_price_history(&conn)?;

    let mut settings = config.index_settings();
    if as_of.is_some() {
        settings.reference_date = as_of;
    }

    let mut anomalies = Vec::new();
    let daily = ClientIndex::for_client_with(&client, &prices, period, &settings, &mut anomalies)?
        .into_index();
    let index = match aggregate {
        Some(bucket) => Aggregation::aggregate(&daily, bucket),
        None => daily,
    };

    if json {
        println!("{}", formatters::format_index_json(&index, &anomalies)?);
    } else {
        println!("{}", formatters::format_index_table(&index, aggregate));
        print!("{}", formatters::format_anomalies(&anomalies));
    }
    Ok(())
}
