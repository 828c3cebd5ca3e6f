use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::db::models::{AccountTransactionType, PortfolioTransactionType};

/// One row of a transactions file
#[derive(Debug, Clone, PartialEq)]
pub enum RawTransaction {
    /// Cash movement; rows without a security
    Account {
        row: usize,
        date: NaiveDate,
        account: String,
        transaction_type: AccountTransactionType,
        amount: Decimal,
    },
    /// Share movement; rows naming a security
    Portfolio {
        row: usize,
        date: NaiveDate,
        portfolio: String,
        /// Settlement account of the portfolio, if given on the row
        account: Option<String>,
        security: String,
        transaction_type: PortfolioTransactionType,
        quantity: Decimal,
        price: Decimal,
        fees: Decimal,
        taxes: Decimal,
    },
}

impl RawTransaction {
    pub fn date(&self) -> NaiveDate {
        match self {
            RawTransaction::Account { date, .. } | RawTransaction::Portfolio { date, .. } => *date,
        }
    }

    pub fn row(&self) -> usize {
        match self {
            RawTransaction::Account { row, .. } | RawTransaction::Portfolio { row, .. } => *row,
        }
    }
}

/// One row of a prices file
#[derive(Debug, Clone, PartialEq)]
pub struct RawPrice {
    pub security: String,
    pub date: NaiveDate,
    pub close: Decimal,
}

/// Parse a transactions CSV
/// (`date,type,account,portfolio,security,amount,quantity,price,fees,taxes`).
///
/// Rows that cannot be parsed are skipped with a warning.
pub fn parse_transactions_csv<P: AsRef<Path>>(file_path: P) -> Result<Vec<RawTransaction>> {
    let path = file_path.as_ref();
    info!("Parsing transactions CSV file: {:?}", path);

    let mut reader = open_reader(path)?;
    let headers = reader
        .headers()
        .context("Failed to read CSV headers")?
        .clone();
    debug!("CSV headers: {:?}", headers);

    let mapping = find_transaction_columns(&headers)?;
    debug!("Column mapping: {:?}", mapping);

    let mut transactions = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.context("Failed to read CSV record")?;
        // header is row 1
        let row_num = idx + 2;

        match parse_transaction_row(&record, &mapping, row_num) {
            Ok(Some(transaction)) => transactions.push(transaction),
            Ok(None) => continue,
            Err(e) => {
                warn!("Skipping row {}: {}", row_num, e);
                continue;
            }
        }
    }

    info!(
        "Successfully parsed {} transactions from CSV",
        transactions.len()
    );
    Ok(transactions)
}

/// Parse a prices CSV (`security,date,close`)
pub fn parse_prices_csv<P: AsRef<Path>>(file_path: P) -> Result<Vec<RawPrice>> {
    let path = file_path.as_ref();
    info!("Parsing prices CSV file: {:?}", path);

    let mut reader = open_reader(path)?;
    let headers = reader
        .headers()
        .context("Failed to read CSV headers")?
        .clone();

    let security_idx = column(&headers, &["security", "ticker", "symbol"])
        .ok_or_else(|| anyhow!("Security column not found"))?;
    let date_idx =
        column(&headers, &["date"]).ok_or_else(|| anyhow!("Date column not found"))?;
    let close_idx = column(&headers, &["close", "price"])
        .ok_or_else(|| anyhow!("Close column not found"))?;

    let mut prices = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.context("Failed to read CSV record")?;
        let row_num = idx + 2;

        let parsed = (|| -> Result<Option<RawPrice>> {
            let security = field(&record, security_idx);
            if security.is_empty() {
                return Ok(None);
            }
            Ok(Some(RawPrice {
                security: security.to_string(),
                date: parse_csv_date(field(&record, date_idx))?,
                close: parse_csv_decimal(field(&record, close_idx))?,
            }))
        })();

        match parsed {
            Ok(Some(price)) => prices.push(price),
            Ok(None) => continue,
            Err(e) => warn!("Skipping row {}: {}", row_num, e),
        }
    }

    info!("Successfully parsed {} prices from CSV", prices.len());
    Ok(prices)
}

fn open_reader(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    ReaderBuilder::new()
        .flexible(true) // Allow trailing empty columns to be omitted
        .trim(Trim::All)
        .from_path(path)
        .context("Failed to open CSV file")
}

#[derive(Debug)]
struct TransactionColumns {
    date: usize,
    transaction_type: usize,
    account: Option<usize>,
    portfolio: Option<usize>,
    security: Option<usize>,
    amount: Option<usize>,
    quantity: Option<usize>,
    price: Option<usize>,
    fees: Option<usize>,
    taxes: Option<usize>,
}

fn column(headers: &StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|header| names.contains(&header.trim().to_lowercase().as_str()))
}

fn find_transaction_columns(headers: &StringRecord) -> Result<TransactionColumns> {
    let account = column(headers, &["account"]);
    let portfolio = column(headers, &["portfolio"]);
    if account.is_none() && portfolio.is_none() {
        return Err(anyhow!("Neither account nor portfolio column found"));
    }

    Ok(TransactionColumns {
        date: column(headers, &["date"]).ok_or_else(|| anyhow!("Date column not found"))?,
        transaction_type: column(headers, &["type", "transaction_type"])
            .ok_or_else(|| anyhow!("Transaction type column not found"))?,
        account,
        portfolio,
        security: column(headers, &["security", "ticker"]),
        amount: column(headers, &["amount"]),
        quantity: column(headers, &["quantity", "shares"]),
        price: column(headers, &["price"]),
        fees: column(headers, &["fees", "fee"]),
        taxes: column(headers, &["taxes", "tax"]),
    })
}

/// Trimmed cell content, empty when the row is short
fn field(record: &StringRecord, idx: usize) -> &str {
    record.get(idx).map(str::trim).unwrap_or("")
}

fn optional_field(record: &StringRecord, idx: Option<usize>) -> Option<&str> {
    idx.map(|i| field(record, i)).filter(|s| !s.is_empty())
}

fn required_decimal(record: &StringRecord, idx: Option<usize>, name: &str) -> Result<Decimal> {
    let text = optional_field(record, idx).ok_or_else(|| anyhow!("Missing {}", name))?;
    parse_csv_decimal(text).with_context(|| format!("Invalid {}: {}", name, text))
}

fn optional_decimal(record: &StringRecord, idx: Option<usize>, name: &str) -> Result<Decimal> {
    match optional_field(record, idx) {
        Some(text) => parse_csv_decimal(text).with_context(|| format!("Invalid {}: {}", name, text)),
        None => Ok(Decimal::ZERO),
    }
}

fn parse_transaction_row(
    record: &StringRecord,
    mapping: &TransactionColumns,
    row_num: usize,
) -> Result<Option<RawTransaction>> {
    // Blank lines carry no type
    let type_str = field(record, mapping.transaction_type);
    if type_str.is_empty() {
        return Ok(None);
    }

    let date = parse_csv_date(field(record, mapping.date))?;
    let account = optional_field(record, mapping.account).map(str::to_string);

    if let Some(security) = optional_field(record, mapping.security) {
        let transaction_type = PortfolioTransactionType::from_str(type_str)?;
        let portfolio = optional_field(record, mapping.portfolio)
            .ok_or_else(|| anyhow!("Missing portfolio for security {}", security))?;

        let quantity = required_decimal(record, mapping.quantity, "quantity")?;
        if quantity <= Decimal::ZERO {
            return Err(anyhow!("Quantity must be positive, got {}", quantity));
        }

        return Ok(Some(RawTransaction::Portfolio {
            row: row_num,
            date,
            portfolio: portfolio.to_string(),
            account,
            security: security.to_string(),
            transaction_type,
            quantity,
            price: required_decimal(record, mapping.price, "price")?,
            fees: optional_decimal(record, mapping.fees, "fees")?,
            taxes: optional_decimal(record, mapping.taxes, "taxes")?,
        }));
    }

    let transaction_type = AccountTransactionType::from_str(type_str)?;
    let account = account.ok_or_else(|| anyhow!("Missing account"))?;
    let amount = required_decimal(record, mapping.amount, "amount")?;

    Ok(Some(RawTransaction::Account {
        row: row_num,
        date,
        account,
        transaction_type,
        amount,
    }))
}

fn parse_csv_date(date_str: &str) -> Result<NaiveDate> {
    for format in ["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(date_str, format) {
            return Ok(date);
        }
    }

    Err(anyhow!("Could not parse date: {}", date_str))
}

fn parse_csv_decimal(text: &str) -> Result<Decimal> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'))
        .collect();

    Decimal::from_str(&cleaned).context("Failed to parse decimal")
}
