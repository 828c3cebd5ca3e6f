// Import module - CSV transaction and price files into the database

pub mod csv_import;

use anyhow::{anyhow, Result};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{
    self, AccountTransaction, AccountTransactionType, PortfolioTransaction,
    PortfolioTransactionType,
};
pub use csv_import::{RawPrice, RawTransaction};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub account_transactions: usize,
    pub portfolio_transactions: usize,
    pub skipped: usize,
}

impl ImportStats {
    pub fn imported(&self) -> usize {
        self.account_transactions + self.portfolio_transactions
    }
}

/// Parse a transactions file, checking the extension first
pub fn parse_transactions_file<P: AsRef<Path>>(file_path: P) -> Result<Vec<RawTransaction>> {
    let path = file_path.as_ref();
    check_extension(path)?;
    csv_import::parse_transactions_csv(path)
}

/// Parse a prices file, checking the extension first
pub fn parse_prices_file<P: AsRef<Path>>(file_path: P) -> Result<Vec<RawPrice>> {
    let path = file_path.as_ref();
    check_extension(path)?;
    csv_import::parse_prices_csv(path)
}

fn check_extension(path: &Path) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| anyhow!("File has no extension"))?
        .to_lowercase();

    match extension.as_str() {
        "csv" | "txt" => Ok(()),
        _ => Err(anyhow!(
            "Unsupported file format: {}. Supported formats: .csv, .txt",
            extension
        )),
    }
}

/// Caches name lookups for the duration of one import
#[derive(Default)]
struct NameCache {
    accounts: HashMap<String, Uuid>,
    securities: HashMap<String, Uuid>,
}

/// Persist parsed transactions in a single database transaction.
///
/// A security `BUY`/`SELL` writes both legs: the shares into the portfolio
/// and the settlement on the portfolio's reference account. The account
/// named on the row becomes the reference account of a portfolio that has
/// none yet. Trades whose portfolio has no reference account are skipped.
pub fn import_transactions(
    conn: &mut Connection,
    transactions: &[RawTransaction],
) -> Result<ImportStats> {
    let tx = conn.transaction()?;
    let mut cache = NameCache::default();
    let mut stats = ImportStats::default();

    for raw in transactions {
        match raw {
            RawTransaction::Account {
                date,
                account,
                transaction_type,
                amount,
                ..
            } => {
                let account_id = cached(&mut cache.accounts, account, |name| {
                    db::upsert_account(&tx, name)
                })?;
                db::insert_account_transaction(
                    &tx,
                    account_id,
                    &AccountTransaction {
                        date: *date,
                        transaction_type: *transaction_type,
                        amount: *amount,
                    },
                )?;
                stats.account_transactions += 1;
            }
            RawTransaction::Portfolio {
                row,
                date,
                portfolio,
                account,
                security,
                transaction_type,
                quantity,
                price,
                fees,
                taxes,
            } => {
                let account_id = match account {
                    Some(name) => Some(cached(&mut cache.accounts, name, |name| {
                        db::upsert_account(&tx, name)
                    })?),
                    None => None,
                };
                let portfolio_id = db::upsert_portfolio(&tx, portfolio, account_id)?;

                let transaction = PortfolioTransaction {
                    date: *date,
                    security: cached(&mut cache.securities, security, |name| {
                        db::upsert_security(&tx, name)
                    })?,
                    transaction_type: *transaction_type,
                    quantity: *quantity,
                    price: *price,
                    fees: *fees,
                    taxes: *taxes,
                };

                let cash_leg = match transaction_type {
                    PortfolioTransactionType::Buy => Some(AccountTransactionType::Buy),
                    PortfolioTransactionType::Sell => Some(AccountTransactionType::Sell),
                    PortfolioTransactionType::TransferIn | PortfolioTransactionType::TransferOut => {
                        None
                    }
                };

                if let Some(cash_leg) = cash_leg {
                    let Some(reference) = db::get_reference_account(&tx, portfolio_id)? else {
                        warn!(
                            "Skipping row {}: portfolio '{}' has no reference account",
                            row, portfolio
                        );
                        stats.skipped += 1;
                        continue;
                    };
                    db::insert_account_transaction(
                        &tx,
                        reference,
                        &AccountTransaction {
                            date: *date,
                            transaction_type: cash_leg,
                            amount: transaction.settlement_amount(),
                        },
                    )?;
                    stats.account_transactions += 1;
                }

                db::insert_portfolio_transaction(&tx, portfolio_id, &transaction)?;
                stats.portfolio_transactions += 1;
            }
        }
    }

    tx.commit()?;
    info!(
        "Imported {} account and {} portfolio transactions ({} skipped)",
        stats.account_transactions, stats.portfolio_transactions, stats.skipped
    );
    Ok(stats)
}

/// Persist parsed quotes; returns the number of stored prices
pub fn import_prices(conn: &mut Connection, prices: &[RawPrice]) -> Result<usize> {
    let tx = conn.transaction()?;
    let mut securities = HashMap::new();

    for price in prices {
        let security = cached(&mut securities, &price.security, |name| {
            db::upsert_security(&tx, name)
        })?;
        db::insert_price(&tx, security, price.date, price.close)?;
    }

    tx.commit()?;
    info!("Imported {} price records", prices.len());
    Ok(prices.len())
}

fn cached(
    cache: &mut HashMap<String, Uuid>,
    name: &str,
    fetch: impl FnOnce(&str) -> Result<Uuid>,
) -> Result<Uuid> {
    if let Some(id) = cache.get(name) {
        return Ok(*id);
    }
    let id = fetch(name)?;
    cache.insert(name.to_string(), id);
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(include_str!("../db/schema.sql")).unwrap();
        conn
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn trade(
        row: usize,
        account: Option<&str>,
        transaction_type: PortfolioTransactionType,
    ) -> RawTransaction {
        RawTransaction::Portfolio {
            row,
            date: date(2012, 1, 2),
            portfolio: "Broker".to_string(),
            account: account.map(str::to_string),
            security: "ACME".to_string(),
            transaction_type,
            quantity: dec!(10),
            price: dec!(100),
            fees: dec!(5),
            taxes: dec!(0),
        }
    }

    #[test]
    fn test_buy_writes_both_legs() {
        let mut conn = memory_db();
        let stats = import_transactions(
            &mut conn,
            &[
                RawTransaction::Account {
                    row: 2,
                    date: date(2012, 1, 1),
                    account: "Cash".to_string(),
                    transaction_type: AccountTransactionType::Deposit,
                    amount: dec!(2000),
                },
                trade(3, Some("Cash"), PortfolioTransactionType::Buy),
            ],
        )
        .unwrap();

        assert_eq!(
            stats,
            ImportStats {
                account_transactions: 2,
                portfolio_transactions: 1,
                skipped: 0
            }
        );

        let client = db::load_client(&conn).unwrap();
        let cash = &client.accounts[0];
        assert_eq!(cash.transactions[1].transaction_type, AccountTransactionType::Buy);
        assert_eq!(cash.transactions[1].amount, dec!(1005));
        assert_eq!(cash.balance_at(date(2012, 1, 2)), dec!(995));
        assert_eq!(client.portfolios[0].reference_account, Some(cash.id));
    }

    #[test]
    fn test_trade_without_reference_account_is_skipped() {
        let mut conn = memory_db();
        let stats = import_transactions(
            &mut conn,
            &[
                trade(2, None, PortfolioTransactionType::Sell),
                trade(3, None, PortfolioTransactionType::TransferIn),
            ],
        )
        .unwrap();

        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.portfolio_transactions, 1);
        assert_eq!(stats.imported(), 1);
    }

    #[test]
    fn test_import_prices_upserts_securities() {
        let mut conn = memory_db();
        let count = import_prices(
            &mut conn,
            &[
                RawPrice {
                    security: "ACME".to_string(),
                    date: date(2012, 1, 2),
                    close: dec!(10),
                },
                RawPrice {
                    security: "ACME".to_string(),
                    date: date(2012, 1, 3),
                    close: dec!(11),
                },
            ],
        )
        .unwrap();

        assert_eq!(count, 2);
        assert_eq!(db::load_client(&conn).unwrap().securities.len(), 1);
        assert_eq!(db::load_price_history(&conn).unwrap().len(), 2);
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(parse_transactions_file("transactions.xlsx").is_err());
        assert!(parse_prices_file("prices").is_err());
    }
}
