// Pricing module - security quote lookup

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Source of security quotes.
///
/// Implementations return the latest quote on or before `date`, or `None`
/// when the security has never been quoted up to that day.
pub trait PriceLookup {
    fn price(&self, security: Uuid, date: NaiveDate) -> Option<Decimal>;
}

/// In-memory quote history keyed by security
#[derive(Debug, Clone, Default)]
pub struct PriceHistory {
    quotes: HashMap<Uuid, BTreeMap<NaiveDate, Decimal>>,
}

impl PriceHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the close price of `security` on `date`
    pub fn insert(&mut self, security: Uuid, date: NaiveDate, close: Decimal) {
        self.quotes.entry(security).or_default().insert(date, close);
    }

    /// Number of quotes stored across all securities
    pub fn len(&self) -> usize {
        self.quotes.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PriceLookup for PriceHistory {
    fn price(&self, security: Uuid, date: NaiveDate) -> Option<Decimal> {
        self.quotes
            .get(&security)?
            .range(..=date)
            .next_back()
            .map(|(_, close)| *close)
    }
}

impl<F> PriceLookup for F
where
    F: Fn(Uuid, NaiveDate) -> Option<Decimal>,
{
    fn price(&self, security: Uuid, date: NaiveDate) -> Option<Decimal> {
        self(security, date)
    }
}
