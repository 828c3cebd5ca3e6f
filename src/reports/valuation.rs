//! Daily valuation sampling
//!
//! Produces one [`DailySample`] per calendar day: the mark-to-market value
//! of all accounts and portfolios of a client, and the net external cash
//! flow (transferal) recognized that day.

use chrono::NaiveDate;
use itertools::Itertools;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::models::{AccountTransactionType, Client, PortfolioTransactionType};
use crate::error::Anomaly;
use crate::pricing::PriceLookup;
use crate::reports::period::Interval;

/// Flow type for performance calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Money crossing the boundary of the tracked wealth
    External,
    /// Money moving within the tracked wealth, or earned/spent by it
    Internal,
}

/// Deposits, withdrawals and cash transfers are external; interest,
/// dividends, fees, taxes and the cash legs of trades are internal.
pub fn classify_account_flow(transaction_type: AccountTransactionType) -> FlowType {
    match transaction_type {
        AccountTransactionType::Deposit
        | AccountTransactionType::Withdrawal
        | AccountTransactionType::TransferIn
        | AccountTransactionType::TransferOut => FlowType::External,
        _ => FlowType::Internal,
    }
}

/// Deliveries move shares across the boundary; buys and sells swap cash
/// for shares within it.
pub fn classify_portfolio_flow(transaction_type: PortfolioTransactionType) -> FlowType {
    match transaction_type {
        PortfolioTransactionType::TransferIn | PortfolioTransactionType::TransferOut => {
            FlowType::External
        }
        PortfolioTransactionType::Buy | PortfolioTransactionType::Sell => FlowType::Internal,
    }
}

/// When to report a held security that has no quote.
///
/// Either way the security is valued at its last known price (a quote or a
/// trade price) and the day's delta is computed as usual. A
/// [`Anomaly::MissingPrice`] marks a delta that rests on a stale price; it
/// does not zero it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingPricePolicy {
    /// Once at the start of every unquoted stretch of a security
    #[default]
    ReportOnce,
    /// On every day a held security is unquoted
    ReportDaily,
}

/// Valuation and transferal of one day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySample {
    pub date: NaiveDate,
    pub valuation: Decimal,
    pub transferal: Decimal,
    /// The valuation relies on a fallback price for at least one holding
    pub incomplete: bool,
}

/// Sampled interval plus the valuation at the end of the day before it
#[derive(Debug, Clone, PartialEq)]
pub struct Valuation {
    pub opening: Decimal,
    pub samples: Vec<DailySample>,
}

/// Per-security state while walking the interval
#[derive(Debug, Default)]
struct SecurityTrack {
    quantity_changes: BTreeMap<NaiveDate, Decimal>,
    trade_prices: BTreeMap<NaiveDate, Decimal>,
    quantity: Decimal,
    last_price: Option<Decimal>,
    reported: bool,
}

impl SecurityTrack {
    /// Latest trade price on or before `date`
    fn trade_price(&self, date: NaiveDate) -> Option<Decimal> {
        self.trade_prices
            .range(..=date)
            .next_back()
            .map(|(_, price)| *price)
    }
}

pub struct ValuationSampler<'a, P: PriceLookup + ?Sized> {
    client: &'a Client,
    prices: &'a P,
    policy: MissingPricePolicy,
}

impl<'a, P: PriceLookup + ?Sized> ValuationSampler<'a, P> {
    pub fn new(client: &'a Client, prices: &'a P, policy: MissingPricePolicy) -> Self {
        Self {
            client,
            prices,
            policy,
        }
    }

    /// Sample every day of `interval`. Missing prices are appended to
    /// `anomalies`; the affected samples are flagged `incomplete`.
    pub fn sample(&self, interval: &Interval, anomalies: &mut Vec<Anomaly>) -> Valuation {
        let mut cash_changes: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
        let mut transferals: HashMap<NaiveDate, Decimal> = HashMap::new();

        for account in &self.client.accounts {
            for t in &account.transactions {
                *cash_changes.entry(t.date).or_default() += t.signed_amount();
                if classify_account_flow(t.transaction_type) == FlowType::External {
                    *transferals.entry(t.date).or_default() += t.signed_amount();
                }
            }
        }

        let security_order: Vec<Uuid> = self
            .client
            .securities
            .iter()
            .map(|s| s.id)
            .chain(
                self.client
                    .portfolios
                    .iter()
                    .flat_map(|p| p.transactions.iter().map(|t| t.security)),
            )
            .unique()
            .collect();

        let mut tracks: HashMap<Uuid, SecurityTrack> = HashMap::new();
        for portfolio in &self.client.portfolios {
            for t in &portfolio.transactions {
                let track = tracks.entry(t.security).or_default();
                *track.quantity_changes.entry(t.date).or_default() += t.signed_quantity();
                track.trade_prices.insert(t.date, t.price);

                if classify_portfolio_flow(t.transaction_type) == FlowType::External {
                    let signed = if t.transaction_type.is_inbound() {
                        t.settlement_amount()
                    } else {
                        -t.settlement_amount()
                    };
                    *transferals.entry(t.date).or_default() += signed;
                }
            }
        }

        // Opening state: everything up to the end of the previous day
        let before = interval.start().pred_opt();
        let mut cash: Decimal = before.map_or(Decimal::ZERO, |day| {
            self.client.accounts.iter().map(|a| a.balance_at(day)).sum()
        });
        let mut opening = cash;
        if let Some(day) = before {
            for (id, track) in tracks.iter_mut() {
                track.quantity = self
                    .client
                    .portfolios
                    .iter()
                    .map(|p| p.quantity_at(*id, day))
                    .sum();
                track.last_price = self
                    .prices
                    .price(*id, day)
                    .or_else(|| track.trade_price(day));
                if !track.quantity.is_zero() {
                    opening += track.quantity * track.last_price.unwrap_or_default();
                }
            }
        }

        let mut samples = Vec::with_capacity(interval.days());
        for date in interval.iter() {
            cash += cash_changes.get(&date).copied().unwrap_or_default();
            let mut valuation = cash;
            let mut incomplete = false;

            for id in &security_order {
                let Some(track) = tracks.get_mut(id) else {
                    continue;
                };
                track.quantity += track
                    .quantity_changes
                    .get(&date)
                    .copied()
                    .unwrap_or_default();

                let price = match self.prices.price(*id, date) {
                    Some(quote) => {
                        track.reported = false;
                        quote
                    }
                    None => {
                        // Fall back to today's trade price or the last price seen
                        let fallback = track.trade_prices.get(&date).copied().or(track.last_price);
                        if !track.quantity.is_zero() {
                            incomplete = true;
                            if self.policy == MissingPricePolicy::ReportDaily || !track.reported {
                                let anomaly = Anomaly::MissingPrice {
                                    date,
                                    security: self.client.security_name(*id),
                                };
                                warn!("{}", anomaly);
                                anomalies.push(anomaly);
                                track.reported = true;
                            }
                        } else {
                            track.reported = false;
                        }
                        match fallback {
                            Some(price) => price,
                            None => continue,
                        }
                    }
                };
                track.last_price = Some(price);
                valuation += track.quantity * price;
            }

            samples.push(DailySample {
                date,
                valuation,
                transferal: transferals.get(&date).copied().unwrap_or_default(),
                incomplete,
            });
        }

        debug!(
            "Sampled {} days from {} (opening valuation {})",
            samples.len(),
            interval,
            opening
        );

        Valuation { opening, samples }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Account, Portfolio, PortfolioTransaction};
    use crate::pricing::PriceHistory;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn interval(from: NaiveDate, to: NaiveDate) -> Interval {
        Interval::new(from, to).unwrap()
    }

    fn buy(date: NaiveDate, security: Uuid, quantity: Decimal, price: Decimal) -> PortfolioTransaction {
        PortfolioTransaction {
            date,
            security,
            transaction_type: PortfolioTransactionType::Buy,
            quantity,
            price,
            fees: dec!(1),
            taxes: Decimal::ZERO,
        }
    }

    #[test]
    fn test_flow_classification() {
        assert_eq!(
            classify_account_flow(AccountTransactionType::Deposit),
            FlowType::External
        );
        assert_eq!(
            classify_account_flow(AccountTransactionType::TransferOut),
            FlowType::External
        );
        assert_eq!(
            classify_account_flow(AccountTransactionType::Interest),
            FlowType::Internal
        );
        assert_eq!(
            classify_account_flow(AccountTransactionType::Buy),
            FlowType::Internal
        );
        assert_eq!(
            classify_portfolio_flow(PortfolioTransactionType::TransferIn),
            FlowType::External
        );
        assert_eq!(
            classify_portfolio_flow(PortfolioTransactionType::Sell),
            FlowType::Internal
        );
    }

    #[test]
    fn test_cash_only_client_samples_every_day() {
        let mut client = Client::new();
        let mut account = Account::new("Cash");
        account.add_transaction(date(2012, 1, 1), AccountTransactionType::Deposit, dec!(1000));
        account.add_transaction(date(2012, 1, 3), AccountTransactionType::Interest, dec!(10));
        account.add_transaction(date(2012, 1, 3), AccountTransactionType::Withdrawal, dec!(100));
        client.add_account(account);

        let prices = PriceHistory::new();
        let sampler = ValuationSampler::new(&client, &prices, MissingPricePolicy::ReportOnce);
        let mut anomalies = Vec::new();
        let valuation = sampler.sample(&interval(date(2012, 1, 2), date(2012, 1, 4)), &mut anomalies);

        assert!(anomalies.is_empty());
        assert_eq!(valuation.opening, dec!(1000));
        let values: Vec<Decimal> = valuation.samples.iter().map(|s| s.valuation).collect();
        assert_eq!(values, vec![dec!(1000), dec!(910), dec!(910)]);
        let flows: Vec<Decimal> = valuation.samples.iter().map(|s| s.transferal).collect();
        assert_eq!(flows, vec![dec!(0), dec!(-100), dec!(0)]);
    }

    #[test]
    fn test_trades_are_not_transferals_but_fees_reduce_value() {
        let mut client = Client::new();
        let cash = client.add_account(Account::new("Cash"));
        let portfolio = client.add_portfolio(Portfolio::new("Depot", Some(cash)));
        let acme = client.add_security("ACME");
        client
            .account_mut(cash)
            .unwrap()
            .add_transaction(date(2012, 1, 1), AccountTransactionType::Deposit, dec!(1000));
        client
            .buy(portfolio, buy(date(2012, 1, 2), acme, dec!(10), dec!(50)))
            .unwrap();

        let mut prices = PriceHistory::new();
        prices.insert(acme, date(2012, 1, 2), dec!(50));
        prices.insert(acme, date(2012, 1, 3), dec!(55));

        let sampler = ValuationSampler::new(&client, &prices, MissingPricePolicy::ReportOnce);
        let mut anomalies = Vec::new();
        let valuation = sampler.sample(&interval(date(2012, 1, 1), date(2012, 1, 3)), &mut anomalies);

        assert!(anomalies.is_empty());
        let samples = &valuation.samples;
        assert_eq!(samples[0].transferal, dec!(1000));
        assert_eq!(samples[1].transferal, dec!(0));
        // 1000 - 501 cash + 10 * 50 shares
        assert_eq!(samples[1].valuation, dec!(999));
        assert_eq!(samples[2].valuation, dec!(1049));
    }

    #[test]
    fn test_missing_price_reported_once_per_stretch() {
        let mut client = Client::new();
        let mut portfolio = Portfolio::new("Depot", None);
        let acme = client.add_security("ACME");
        portfolio.add_transaction(PortfolioTransaction {
            transaction_type: PortfolioTransactionType::TransferIn,
            ..buy(date(2012, 1, 1), acme, dec!(2), dec!(100))
        });
        client.add_portfolio(portfolio);

        let mut prices = PriceHistory::new();
        prices.insert(acme, date(2012, 1, 4), dec!(110));

        let mut anomalies = Vec::new();
        let sampler = ValuationSampler::new(&client, &prices, MissingPricePolicy::ReportOnce);
        let valuation = sampler.sample(&interval(date(2012, 1, 1), date(2012, 1, 5)), &mut anomalies);

        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].date(), date(2012, 1, 1));
        assert!(anomalies[0].to_string().contains("ACME"));

        let samples = &valuation.samples;
        // inbound delivery: 2 * 100 + 1 fee crosses the boundary
        assert_eq!(samples[0].transferal, dec!(201));
        // trade price held forward until the first quote
        assert_eq!(samples[2].valuation, dec!(200));
        assert!(samples[2].incomplete);
        assert_eq!(samples[3].valuation, dec!(220));
        assert!(!samples[3].incomplete);

        let mut daily = Vec::new();
        ValuationSampler::new(&client, &prices, MissingPricePolicy::ReportDaily)
            .sample(&interval(date(2012, 1, 1), date(2012, 1, 5)), &mut daily);
        assert_eq!(daily.len(), 3);
    }

    #[test]
    fn test_opening_valuation_includes_prior_holdings() {
        let mut client = Client::new();
        let mut portfolio = Portfolio::new("Depot", None);
        let acme = client.add_security("ACME");
        portfolio.add_transaction(PortfolioTransaction {
            transaction_type: PortfolioTransactionType::TransferIn,
            ..buy(date(2011, 6, 1), acme, dec!(3), dec!(10))
        });
        client.add_portfolio(portfolio);

        let mut prices = PriceHistory::new();
        prices.insert(acme, date(2011, 12, 30), dec!(12));

        let mut anomalies = Vec::new();
        let valuation = ValuationSampler::new(&client, &prices, MissingPricePolicy::ReportOnce)
            .sample(&interval(date(2012, 1, 1), date(2012, 1, 2)), &mut anomalies);

        assert!(anomalies.is_empty());
        assert_eq!(valuation.opening, dec!(36));
        assert_eq!(valuation.samples[1].valuation, dec!(36));
    }
}
