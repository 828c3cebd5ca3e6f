//! Output formatting module for CLI display
//!
//! This module handles all terminal output formatting, separating
//! the concerns of data calculation from presentation.

use colored::Colorize;
use rust_decimal::Decimal;
use serde::Serialize;
use tabled::{
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

use wealthindex::error::Anomaly;
use wealthindex::importers::{ImportStats, RawTransaction};
use wealthindex::reports::{Period, PerformanceIndex};
use wealthindex::utils::{format_amount, format_percent};

fn colored_percent(value: Decimal, decimals: u32) -> String {
    let text = format_percent(value, decimals);
    if value > Decimal::ZERO {
        text.green().to_string()
    } else if value < Decimal::ZERO {
        text.red().to_string()
    } else {
        text
    }
}

/// Format an index for terminal table output
pub fn format_index_table(index: &PerformanceIndex, aggregate: Option<Period>) -> String {
    let mut output = String::new();

    let granularity = aggregate.map_or("daily", |p| p.as_str());
    output.push_str(&format!(
        "\n{} Performance {} ({}, {})\n",
        "📈".cyan().bold(),
        index.interval(),
        index.report_interval(),
        granularity
    ));
    if index.first_data_point() > index.interval().start() {
        output.push_str(&format!(
            "{} First data point: {}\n",
            "ℹ".blue().bold(),
            index.first_data_point()
        ));
    }
    output.push('\n');

    #[derive(Tabled)]
    struct IndexRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Delta")]
        delta: String,
        #[tabled(rename = "Accumulated")]
        accumulated: String,
        #[tabled(rename = "Valuation")]
        valuation: String,
        #[tabled(rename = "Transferal")]
        transferal: String,
    }

    let rows: Vec<IndexRow> = (0..index.len())
        .map(|i| IndexRow {
            date: index.dates()[i].to_string(),
            delta: colored_percent(index.delta_percentage()[i], 4),
            accumulated: colored_percent(index.accumulated_percentage()[i], 4),
            valuation: format_amount(index.totals()[i]),
            transferal: format_amount(index.transferals()[i]),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    // Right-align all columns except Date (0)
    table.modify(Columns::new(1..), Alignment::right());
    output.push_str(&table.to_string());

    let transferred: Decimal = index.transferals().iter().sum();
    output.push_str(&format!("\n\n{} Summary", "━".repeat(60).bright_black()));
    output.push_str(&format!(
        "\n{:<20} {}",
        "Accumulated:".bold(),
        colored_percent(index.final_accumulated(), 2)
    ));
    output.push_str(&format!(
        "\n{:<20} {}",
        "Final valuation:".bold(),
        format_amount(index.totals().last().copied().unwrap_or_default())
    ));
    output.push_str(&format!(
        "\n{:<20} {}\n",
        "Net transferals:".bold(),
        format_amount(transferred)
    ));

    output
}

/// Format anomalies as warnings below a report; empty when there are none
pub fn format_anomalies(anomalies: &[Anomaly]) -> String {
    if anomalies.is_empty() {
        return String::new();
    }

    let mut output = format!(
        "\n{} {} day(s) could not be measured reliably:\n",
        "⚠".yellow().bold(),
        anomalies.len()
    );
    for anomaly in anomalies {
        output.push_str(&format!("  {} {}\n", "•".yellow(), anomaly));
    }
    output
}

/// Format an index and its anomalies for JSON output
pub fn format_index_json(
    index: &PerformanceIndex,
    anomalies: &[Anomaly],
) -> serde_json::Result<String> {
    #[derive(Serialize)]
    struct JsonAnomaly {
        date: String,
        message: String,
    }

    #[derive(Serialize)]
    struct JsonReport<'a> {
        index: &'a PerformanceIndex,
        anomalies: Vec<JsonAnomaly>,
    }

    let report = JsonReport {
        index,
        anomalies: anomalies
            .iter()
            .map(|a| JsonAnomaly {
                date: a.date().to_string(),
                message: a.to_string(),
            })
            .collect(),
    };

    serde_json::to_string_pretty(&report)
}

/// Preview of the first parsed rows of an import file
pub fn format_import_preview(transactions: &[RawTransaction]) -> String {
    #[derive(Tabled)]
    struct TransactionPreview {
        #[tabled(rename = "Row")]
        row: usize,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Type")]
        tx_type: String,
        #[tabled(rename = "Holder")]
        holder: String,
        #[tabled(rename = "Security")]
        security: String,
        #[tabled(rename = "Amount")]
        amount: String,
    }

    let preview: Vec<TransactionPreview> = transactions
        .iter()
        .take(10)
        .map(|tx| match tx {
            RawTransaction::Account {
                row,
                date,
                account,
                transaction_type,
                amount,
            } => TransactionPreview {
                row: *row,
                date: date.to_string(),
                tx_type: transaction_type.as_str().to_string(),
                holder: account.clone(),
                security: String::new(),
                amount: format_amount(*amount),
            },
            RawTransaction::Portfolio {
                row,
                date,
                portfolio,
                security,
                transaction_type,
                quantity,
                price,
                ..
            } => TransactionPreview {
                row: *row,
                date: date.to_string(),
                tx_type: transaction_type.as_str().to_string(),
                holder: portfolio.clone(),
                security: format!("{} × {}", quantity.normalize(), security),
                amount: format_amount(*quantity * *price),
            },
        })
        .collect();

    let mut output = format!(
        "\n{} Found {} transactions\n\n",
        "✓".green().bold(),
        transactions.len()
    );
    output.push_str(&Table::new(preview).with(Style::rounded()).to_string());
    if transactions.len() > 10 {
        output.push_str(&format!(
            "\n\n... and {} more transactions",
            transactions.len() - 10
        ));
    }
    output.push('\n');
    output
}

/// Summary printed after a transactions import
pub fn format_import_stats(stats: &ImportStats) -> String {
    let mut output = format!("\n{} Import complete!\n", "✓".green().bold());
    output.push_str(&format!(
        "  Account transactions: {}\n",
        stats.account_transactions.to_string().green()
    ));
    output.push_str(&format!(
        "  Portfolio transactions: {}\n",
        stats.portfolio_transactions.to_string().green()
    ));
    if stats.skipped > 0 {
        output.push_str(&format!(
            "  Skipped: {}\n",
            stats.skipped.to_string().yellow()
        ));
    }
    output
}
