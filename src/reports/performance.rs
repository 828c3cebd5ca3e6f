use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::ops::Deref;
use tracing::{info, warn};

use crate::db::models::Client;
use crate::error::{Anomaly, IndexError};
use crate::pricing::PriceLookup;
use crate::reports::period::{Interval, ReportingPeriod};
use crate::reports::valuation::{MissingPricePolicy, ValuationSampler};

/// Knobs of an index computation that do not come from the client data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexSettings {
    pub missing_price_policy: MissingPricePolicy,
    /// "Today" for relative reporting periods; the local date when unset
    pub reference_date: Option<NaiveDate>,
}

/// Index-aligned return series over a reporting period.
///
/// `delta[i]` is the return of entry `i` alone, `accumulated[i]` the
/// chain-linked return from the start of the period through entry `i`.
/// `totals` and `transferals` hold the valuation at the end of each entry
/// and the external flows recognized within it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceIndex {
    report_interval: ReportingPeriod,
    interval: Interval,
    first_data_point: NaiveDate,
    dates: Vec<NaiveDate>,
    delta: Vec<Decimal>,
    accumulated: Vec<Decimal>,
    totals: Vec<Decimal>,
    transferals: Vec<Decimal>,
}

impl PerformanceIndex {
    /// Build an index from per-entry returns; the accumulated curve is
    /// derived by chain-linking `delta`. Also returns the dates of entries
    /// neutralized because their compounding overflowed.
    pub(crate) fn from_parts(
        report_interval: ReportingPeriod,
        interval: Interval,
        first_data_point: NaiveDate,
        dates: Vec<NaiveDate>,
        mut delta: Vec<Decimal>,
        totals: Vec<Decimal>,
        transferals: Vec<Decimal>,
    ) -> (Self, Vec<NaiveDate>) {
        let (accumulated, neutralized) = chain_link(&mut delta);
        let overflowed = neutralized.into_iter().map(|i| dates[i]).collect();
        let index = Self {
            report_interval,
            interval,
            first_data_point,
            dates,
            delta,
            accumulated,
            totals,
            transferals,
        };
        (index, overflowed)
    }

    pub fn report_interval(&self) -> &ReportingPeriod {
        &self.report_interval
    }

    /// Concrete interval the reporting period resolved to
    pub fn interval(&self) -> Interval {
        self.interval
    }

    /// Earliest day in the interval with recorded client activity
    pub fn first_data_point(&self) -> NaiveDate {
        self.first_data_point
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn delta_percentage(&self) -> &[Decimal] {
        &self.delta
    }

    pub fn accumulated_percentage(&self) -> &[Decimal] {
        &self.accumulated
    }

    pub fn totals(&self) -> &[Decimal] {
        &self.totals
    }

    pub fn transferals(&self) -> &[Decimal] {
        &self.transferals
    }

    /// Cumulative return over the whole period
    pub fn final_accumulated(&self) -> Decimal {
        self.accumulated.last().copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Compound per-period returns: `acc[0] = delta[0]`,
/// `acc[i] = (1 + acc[i-1]) * (1 + delta[i]) - 1`.
///
/// An entry whose compounding does not fit a `Decimal` is neutralized: its
/// delta is set to zero and its position is returned next to the curve.
pub fn chain_link(delta: &mut [Decimal]) -> (Vec<Decimal>, Vec<usize>) {
    let mut factor = Decimal::ONE;
    let mut accumulated = Vec::with_capacity(delta.len());
    let mut neutralized = Vec::new();

    for (i, d) in delta.iter_mut().enumerate() {
        match compound(factor, *d) {
            Some(next) => factor = next,
            None => {
                *d = Decimal::ZERO;
                neutralized.push(i);
            }
        }
        accumulated.push(factor - Decimal::ONE);
    }
    (accumulated, neutralized)
}

/// `factor * (1 + delta)`, if both it and its accumulated return fit
pub(crate) fn compound(factor: Decimal, delta: Decimal) -> Option<Decimal> {
    let next = factor.checked_mul(Decimal::ONE.checked_add(delta)?)?;
    next.checked_sub(Decimal::ONE)?;
    Some(next)
}

/// Daily performance index of everything a client owns
#[derive(Debug, Clone)]
pub struct ClientIndex<'a> {
    client: &'a Client,
    index: PerformanceIndex,
}

impl<'a> ClientIndex<'a> {
    /// Compute the index with default settings.
    ///
    /// Only structural faults (an unresolvable period) fail. Days whose
    /// return cannot be computed, or overflows, are appended to
    /// `anomalies` and contribute a delta of zero.
    pub fn for_client<P: PriceLookup + ?Sized>(
        client: &'a Client,
        prices: &P,
        period: ReportingPeriod,
        anomalies: &mut Vec<Anomaly>,
    ) -> Result<Self, IndexError> {
        Self::for_client_with(client, prices, period, &IndexSettings::default(), anomalies)
    }

    pub fn for_client_with<P: PriceLookup + ?Sized>(
        client: &'a Client,
        prices: &P,
        period: ReportingPeriod,
        settings: &IndexSettings,
        anomalies: &mut Vec<Anomaly>,
    ) -> Result<Self, IndexError> {
        let today = settings
            .reference_date
            .unwrap_or_else(|| Local::now().date_naive());
        let interval = period.resolve(today)?;

        info!(
            "Computing client index for {} ({} days, {} accounts, {} portfolios)",
            interval,
            interval.days(),
            client.accounts.len(),
            client.portfolios.len()
        );

        let valuation = ValuationSampler::new(client, prices, settings.missing_price_policy)
            .sample(&interval, anomalies);

        let days = valuation.samples.len();
        let mut dates = Vec::with_capacity(days);
        let mut delta = Vec::with_capacity(days);
        let mut totals = Vec::with_capacity(days);
        let mut transferals = Vec::with_capacity(days);

        // Returns are measured against the end of the previous day, so a
        // same-day transferal never counts as capital at risk.
        let mut previous = valuation.opening;
        for sample in &valuation.samples {
            let change = sample.valuation - previous - sample.transferal;

            let day_delta = if !previous.is_zero() {
                change.checked_div(previous).unwrap_or_else(|| {
                    report_overflow(sample.date, anomalies);
                    Decimal::ZERO
                })
            } else if change.is_zero() {
                Decimal::ZERO
            } else {
                let anomaly = Anomaly::DeltaWithoutAssets {
                    date: sample.date,
                    change,
                };
                warn!("{}", anomaly);
                anomalies.push(anomaly);
                Decimal::ZERO
            };

            dates.push(sample.date);
            delta.push(day_delta);
            totals.push(sample.valuation);
            transferals.push(sample.transferal);
            previous = sample.valuation;
        }

        let first_data_point = client
            .first_transaction_date()
            .filter(|first| *first <= interval.end())
            .map_or(interval.start(), |first| first.max(interval.start()));

        let (index, overflowed) = PerformanceIndex::from_parts(
            period,
            interval,
            first_data_point,
            dates,
            delta,
            totals,
            transferals,
        );
        for date in overflowed {
            report_overflow(date, anomalies);
        }

        info!(
            "Client index complete: accumulated return {} over {}",
            index.final_accumulated().round_dp(6),
            interval
        );

        Ok(Self { client, index })
    }

    pub fn client(&self) -> &'a Client {
        self.client
    }

    pub fn index(&self) -> &PerformanceIndex {
        &self.index
    }

    pub fn into_index(self) -> PerformanceIndex {
        self.index
    }
}

fn report_overflow(date: NaiveDate, anomalies: &mut Vec<Anomaly>) {
    let anomaly = Anomaly::ReturnOverflow { date };
    warn!("{}", anomaly);
    anomalies.push(anomaly);
}

impl Deref for ClientIndex<'_> {
    type Target = PerformanceIndex;

    fn deref(&self) -> &PerformanceIndex {
        &self.index
    }
}
