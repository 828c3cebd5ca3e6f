// Database module - SQLite storage of the client snapshot and price history

pub mod models;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

use crate::pricing::PriceHistory;
pub use models::{
    Account, AccountTransaction, AccountTransactionType, Client, Portfolio, PortfolioTransaction,
    PortfolioTransactionType, Security,
};

/// Get the default database path (~/.wealthindex/data.db)
pub fn get_default_db_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let data_dir = PathBuf::from(home).join(".wealthindex");

    // Create directory if it doesn't exist
    std::fs::create_dir_all(&data_dir).context("Failed to create .wealthindex directory")?;

    Ok(data_dir.join("data.db"))
}

/// Open database connection
pub fn open_db(db_path: Option<PathBuf>) -> Result<Connection> {
    let path = match db_path {
        Some(path) => path,
        None => get_default_db_path()?,
    };
    let conn = Connection::open(&path).context(format!("Failed to open database at {:?}", path))?;

    // Enable foreign keys
    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("Failed to enable foreign keys")?;

    Ok(conn)
}

/// Initialize the database with schema
///
/// This function creates the database file and runs the schema SQL
/// to set up all tables and indexes.
pub fn init_database(db_path: Option<PathBuf>) -> Result<()> {
    let path = match db_path {
        Some(path) => path,
        None => get_default_db_path()?,
    };

    info!("Initializing database at: {:?}", path);

    let conn = open_db(Some(path))?;
    conn.execute_batch(include_str!("schema.sql"))
        .context("Failed to execute schema")?;

    info!("Database initialized successfully");
    Ok(())
}

fn find_id(conn: &Connection, table: &str, name: &str) -> Result<Option<Uuid>> {
    let mut stmt = conn.prepare(&format!("SELECT id FROM {} WHERE name = ?1", table))?;
    let existing: Option<String> = stmt.query_row([name], |row| row.get(0)).optional()?;
    existing
        .map(|id| Uuid::parse_str(&id).context(format!("Corrupt id in {}: {}", table, id)))
        .transpose()
}

/// Insert or get account by name, returns its id
pub fn upsert_account(conn: &Connection, name: &str) -> Result<Uuid> {
    if let Some(id) = find_id(conn, "accounts", name)? {
        return Ok(id);
    }

    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO accounts (id, name) VALUES (?1, ?2)",
        params![id.to_string(), name],
    )?;
    Ok(id)
}

/// Insert or get security by name, returns its id
pub fn upsert_security(conn: &Connection, name: &str) -> Result<Uuid> {
    if let Some(id) = find_id(conn, "securities", name)? {
        return Ok(id);
    }

    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO securities (id, name) VALUES (?1, ?2)",
        params![id.to_string(), name],
    )?;
    Ok(id)
}

/// Insert or get portfolio by name. A reference account is recorded when
/// the portfolio does not have one yet.
pub fn upsert_portfolio(
    conn: &Connection,
    name: &str,
    reference_account: Option<Uuid>,
) -> Result<Uuid> {
    if let Some(id) = find_id(conn, "portfolios", name)? {
        if let Some(account) = reference_account {
            conn.execute(
                "UPDATE portfolios SET reference_account_id = ?1
                 WHERE id = ?2 AND reference_account_id IS NULL",
                params![account.to_string(), id.to_string()],
            )?;
        }
        return Ok(id);
    }

    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO portfolios (id, name, reference_account_id) VALUES (?1, ?2, ?3)",
        params![
            id.to_string(),
            name,
            reference_account.map(|a| a.to_string())
        ],
    )?;
    Ok(id)
}

/// Reference account of a portfolio, if any
pub fn get_reference_account(conn: &Connection, portfolio: Uuid) -> Result<Option<Uuid>> {
    let mut stmt = conn.prepare("SELECT reference_account_id FROM portfolios WHERE id = ?1")?;
    let account: Option<Option<String>> = stmt
        .query_row([portfolio.to_string()], |row| row.get(0))
        .optional()?;
    account
        .flatten()
        .map(|id| Uuid::parse_str(&id).context("Corrupt reference account id"))
        .transpose()
}

/// Insert account transaction
pub fn insert_account_transaction(
    conn: &Connection,
    account: Uuid,
    tx: &AccountTransaction,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO account_transactions (
            account_id, transaction_date, transaction_type, amount
        ) VALUES (?1, ?2, ?3, ?4)",
        params![
            account.to_string(),
            tx.date,
            tx.transaction_type.as_str(),
            tx.amount.to_string(),
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

/// Insert portfolio transaction
pub fn insert_portfolio_transaction(
    conn: &Connection,
    portfolio: Uuid,
    tx: &PortfolioTransaction,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO portfolio_transactions (
            portfolio_id, security_id, transaction_date, transaction_type,
            quantity, price, fees, taxes
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            portfolio.to_string(),
            tx.security.to_string(),
            tx.date,
            tx.transaction_type.as_str(),
            tx.quantity.to_string(),
            tx.price.to_string(),
            tx.fees.to_string(),
            tx.taxes.to_string(),
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

/// Insert or replace the close price of a security on a day
pub fn insert_price(
    conn: &Connection,
    security: Uuid,
    price_date: NaiveDate,
    close_price: Decimal,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO price_history (security_id, price_date, close_price)
         VALUES (?1, ?2, ?3)",
        params![security.to_string(), price_date, close_price.to_string()],
    )?;
    Ok(())
}

/// Helper to read Decimal from SQLite (stored as TEXT)
pub fn get_decimal_value(row: &rusqlite::Row, idx: usize) -> Result<Decimal, rusqlite::Error> {
    use rusqlite::types::ValueRef;

    match row.get_ref(idx)? {
        ValueRef::Text(bytes) => {
            let s = std::str::from_utf8(bytes)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            Decimal::from_str(s).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
        }
        ValueRef::Integer(i) => Ok(Decimal::from(i)),
        ValueRef::Real(f) => {
            Decimal::try_from(f).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
        }
        _ => Err(rusqlite::Error::InvalidColumnType(
            idx,
            "decimal".to_string(),
            rusqlite::types::Type::Null,
        )),
    }
}

/// Helper to read a UUID stored as TEXT
fn get_uuid_value(row: &rusqlite::Row, idx: usize) -> Result<Uuid, rusqlite::Error> {
    let text: String = row.get(idx)?;
    Uuid::parse_str(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_type<T: FromStr<Err = crate::error::IndexError>>(
    row: &rusqlite::Row,
    idx: usize,
) -> Result<T, rusqlite::Error> {
    let text: String = row.get(idx)?;
    text.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Load the complete client snapshot: accounts, portfolios, securities and
/// all their transactions in date order.
pub fn load_client(conn: &Connection) -> Result<Client> {
    let mut client = Client::new();

    let mut stmt = conn.prepare("SELECT id, name FROM securities ORDER BY name")?;
    client.securities = stmt
        .query_map([], |row| {
            Ok(Security {
                id: get_uuid_value(row, 0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare("SELECT id, name FROM accounts ORDER BY name")?;
    client.accounts = stmt
        .query_map([], |row| {
            Ok(Account {
                id: get_uuid_value(row, 0)?,
                name: row.get(1)?,
                transactions: Vec::new(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt =
        conn.prepare("SELECT id, name, reference_account_id FROM portfolios ORDER BY name")?;
    client.portfolios = stmt
        .query_map([], |row| {
            let reference: Option<String> = row.get(2)?;
            Ok(Portfolio {
                id: get_uuid_value(row, 0)?,
                name: row.get(1)?,
                reference_account: match reference {
                    Some(_) => Some(get_uuid_value(row, 2)?),
                    None => None,
                },
                transactions: Vec::new(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let account_index: HashMap<Uuid, usize> = client
        .accounts
        .iter()
        .enumerate()
        .map(|(i, a)| (a.id, i))
        .collect();
    let mut stmt = conn.prepare(
        "SELECT account_id, transaction_date, transaction_type, amount
         FROM account_transactions
         ORDER BY transaction_date ASC, id ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            get_uuid_value(row, 0)?,
            AccountTransaction {
                date: row.get(1)?,
                transaction_type: parse_type(row, 2)?,
                amount: get_decimal_value(row, 3)?,
            },
        ))
    })?;
    for row in rows {
        let (account, tx) = row?;
        let idx = account_index
            .get(&account)
            .ok_or_else(|| anyhow::anyhow!("Transaction references unknown account {}", account))?;
        client.accounts[*idx].transactions.push(tx);
    }

    let portfolio_index: HashMap<Uuid, usize> = client
        .portfolios
        .iter()
        .enumerate()
        .map(|(i, p)| (p.id, i))
        .collect();
    let mut stmt = conn.prepare(
        "SELECT portfolio_id, security_id, transaction_date, transaction_type,
                quantity, price, fees, taxes
         FROM portfolio_transactions
         ORDER BY transaction_date ASC, id ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            get_uuid_value(row, 0)?,
            PortfolioTransaction {
                security: get_uuid_value(row, 1)?,
                date: row.get(2)?,
                transaction_type: parse_type(row, 3)?,
                quantity: get_decimal_value(row, 4)?,
                price: get_decimal_value(row, 5)?,
                fees: get_decimal_value(row, 6)?,
                taxes: get_decimal_value(row, 7)?,
            },
        ))
    })?;
    for row in rows {
        let (portfolio, tx) = row?;
        let idx = portfolio_index.get(&portfolio).ok_or_else(|| {
            anyhow::anyhow!("Transaction references unknown portfolio {}", portfolio)
        })?;
        client.portfolios[*idx].transactions.push(tx);
    }

    info!(
        "Loaded client: {} accounts, {} portfolios, {} securities",
        client.accounts.len(),
        client.portfolios.len(),
        client.securities.len()
    );
    Ok(client)
}

/// Load every stored quote
pub fn load_price_history(conn: &Connection) -> Result<PriceHistory> {
    let mut stmt =
        conn.prepare("SELECT security_id, price_date, close_price FROM price_history")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            get_uuid_value(row, 0)?,
            row.get::<_, NaiveDate>(1)?,
            get_decimal_value(row, 2)?,
        ))
    })?;

    let mut history = PriceHistory::new();
    for row in rows {
        let (security, date, close) = row?;
        history.insert(security, date, close);
    }
    Ok(history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::PriceLookup;
    use rust_decimal_macros::dec;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(include_str!("schema.sql")).unwrap();
        conn
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_upserts_are_idempotent() {
        let conn = memory_db();
        let a = upsert_account(&conn, "Checking").unwrap();
        assert_eq!(upsert_account(&conn, "Checking").unwrap(), a);

        let p = upsert_portfolio(&conn, "Broker", None).unwrap();
        assert_eq!(get_reference_account(&conn, p).unwrap(), None);
        assert_eq!(upsert_portfolio(&conn, "Broker", Some(a)).unwrap(), p);
        assert_eq!(get_reference_account(&conn, p).unwrap(), Some(a));

        let s = upsert_security(&conn, "ACME").unwrap();
        assert_eq!(upsert_security(&conn, "ACME").unwrap(), s);
    }

    #[test]
    fn test_load_client_round_trips_transactions() {
        let conn = memory_db();
        let account = upsert_account(&conn, "Checking").unwrap();
        let portfolio = upsert_portfolio(&conn, "Broker", Some(account)).unwrap();
        let acme = upsert_security(&conn, "ACME").unwrap();

        insert_account_transaction(
            &conn,
            account,
            &AccountTransaction {
                date: date(2012, 1, 2),
                transaction_type: AccountTransactionType::Interest,
                amount: dec!(2.5),
            },
        )
        .unwrap();
        insert_account_transaction(
            &conn,
            account,
            &AccountTransaction {
                date: date(2012, 1, 1),
                transaction_type: AccountTransactionType::Deposit,
                amount: dec!(1000),
            },
        )
        .unwrap();
        let buy = PortfolioTransaction {
            date: date(2012, 1, 3),
            security: acme,
            transaction_type: PortfolioTransactionType::Buy,
            quantity: dec!(3),
            price: dec!(101.25),
            fees: dec!(4.95),
            taxes: dec!(0),
        };
        insert_portfolio_transaction(&conn, portfolio, &buy).unwrap();

        let client = load_client(&conn).unwrap();
        assert_eq!(client.accounts.len(), 1);
        let txs = &client.accounts[0].transactions;
        assert_eq!(txs[0].transaction_type, AccountTransactionType::Deposit);
        assert_eq!(txs[1].amount, dec!(2.5));
        assert_eq!(client.portfolios[0].reference_account, Some(account));
        assert_eq!(client.portfolios[0].transactions, vec![buy]);
        assert_eq!(client.security_name(acme), "ACME");
    }

    #[test]
    fn test_price_history_round_trip() {
        let conn = memory_db();
        let acme = upsert_security(&conn, "ACME").unwrap();
        insert_price(&conn, acme, date(2012, 1, 2), dec!(10)).unwrap();
        insert_price(&conn, acme, date(2012, 1, 2), dec!(10.5)).unwrap();
        insert_price(&conn, acme, date(2012, 1, 4), dec!(11)).unwrap();

        let history = load_price_history(&conn).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.price(acme, date(2012, 1, 3)), Some(dec!(10.5)));
    }
}
