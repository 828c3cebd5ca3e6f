//! Reporting intervals
//!
//! A [`ReportingPeriod`] describes an interval relative to a reference day
//! ("year to date", "last 3 years") or explicitly. Resolving it yields an
//! [`Interval`]: inclusive on both ends and never empty.

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::IndexError;

/// Inclusive, non-empty date interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Interval {
    start: NaiveDate,
    end: NaiveDate,
}

impl Interval {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, IndexError> {
        if start > end {
            return Err(IndexError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of calendar days, both ends included
    pub fn days(&self) -> usize {
        // start <= end, so the difference is never negative
        (self.end - self.start).num_days() as usize + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Every calendar day of the interval in order
    pub fn iter(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.start, self.end)
    }
}

/// Reporting period, resolved against a reference day
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportingPeriod {
    FromXtoY { start: NaiveDate, end: NaiveDate },
    SinceX { start: NaiveDate },
    LastYears { years: u32 },
    LastMonths { months: u32 },
    LastDays { days: u32 },
    YearToDate,
    QuarterToDate,
    MonthToDate,
    CalendarYear(i32),
}

impl ReportingPeriod {
    /// Explicit range; fails when `start` is after `end`
    pub fn from_x_to_y(start: NaiveDate, end: NaiveDate) -> Result<Self, IndexError> {
        Interval::new(start, end)?;
        Ok(ReportingPeriod::FromXtoY { start, end })
    }

    /// Resolve to a concrete interval, using `today` for relative variants
    pub fn resolve(&self, today: NaiveDate) -> Result<Interval, IndexError> {
        let overflow = || IndexError::DateOverflow(self.to_string());

        match *self {
            ReportingPeriod::FromXtoY { start, end } => Interval::new(start, end),
            ReportingPeriod::SinceX { start } => Interval::new(start, today),
            ReportingPeriod::LastYears { years } => {
                let start = today
                    .checked_sub_months(Months::new(years.checked_mul(12).ok_or_else(overflow)?))
                    .ok_or_else(overflow)?;
                Interval::new(start, today)
            }
            ReportingPeriod::LastMonths { months } => {
                let start = today
                    .checked_sub_months(Months::new(months))
                    .ok_or_else(overflow)?;
                Interval::new(start, today)
            }
            ReportingPeriod::LastDays { days } => {
                let start = today
                    .checked_sub_days(Days::new(u64::from(days)))
                    .ok_or_else(overflow)?;
                Interval::new(start, today)
            }
            ReportingPeriod::YearToDate => {
                let start = NaiveDate::from_ymd_opt(today.year(), 1, 1).ok_or_else(overflow)?;
                Interval::new(start, today)
            }
            ReportingPeriod::QuarterToDate => {
                let quarter_start_month = ((today.month() - 1) / 3) * 3 + 1;
                let start = NaiveDate::from_ymd_opt(today.year(), quarter_start_month, 1)
                    .ok_or_else(overflow)?;
                Interval::new(start, today)
            }
            ReportingPeriod::MonthToDate => {
                let start =
                    NaiveDate::from_ymd_opt(today.year(), today.month(), 1).ok_or_else(overflow)?;
                Interval::new(start, today)
            }
            ReportingPeriod::CalendarYear(year) => {
                let start = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(overflow)?;
                let end = NaiveDate::from_ymd_opt(year, 12, 31).ok_or_else(overflow)?;
                Interval::new(start, end)
            }
        }
    }
}

impl fmt::Display for ReportingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportingPeriod::FromXtoY { start, end } => write!(f, "{}:{}", start, end),
            ReportingPeriod::SinceX { start } => write!(f, "since:{}", start),
            ReportingPeriod::LastYears { years } => write!(f, "{}Y", years),
            ReportingPeriod::LastMonths { months } => write!(f, "{}M", months),
            ReportingPeriod::LastDays { days } => write!(f, "{}D", days),
            ReportingPeriod::YearToDate => write!(f, "YTD"),
            ReportingPeriod::QuarterToDate => write!(f, "QTD"),
            ReportingPeriod::MonthToDate => write!(f, "MTD"),
            ReportingPeriod::CalendarYear(year) => write!(f, "{}", year),
        }
    }
}

impl Serialize for ReportingPeriod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl FromStr for ReportingPeriod {
    type Err = IndexError;

    /// Parse YTD, QTD, MTD, `<n>Y`, `<n>M`, `<n>D`, YYYY, `since:YYYY-MM-DD`
    /// or `YYYY-MM-DD:YYYY-MM-DD`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || IndexError::InvalidPeriod(s.to_string());
        let trimmed = s.trim();
        let upper = trimmed.to_uppercase();
        let parse_date =
            |text: &str| NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").map_err(|_| invalid());

        match upper.as_str() {
            "YTD" => return Ok(ReportingPeriod::YearToDate),
            "QTD" => return Ok(ReportingPeriod::QuarterToDate),
            "MTD" => return Ok(ReportingPeriod::MonthToDate),
            _ => {}
        }

        if let Some(start) = upper.strip_prefix("SINCE:") {
            return Ok(ReportingPeriod::SinceX {
                start: parse_date(start)?,
            });
        }

        if let Some((from, to)) = trimmed.split_once(':') {
            return ReportingPeriod::from_x_to_y(parse_date(from)?, parse_date(to)?);
        }

        // Year shorthand: YYYY -> calendar year
        if upper.len() == 4 {
            if let Ok(year) = upper.parse::<i32>() {
                return Ok(ReportingPeriod::CalendarYear(year));
            }
        }

        let unit_at = upper.char_indices().last().map_or(0, |(idx, _)| idx);
        let (count, unit) = upper.split_at(unit_at);
        let count: u32 = count.parse().map_err(|_| invalid())?;
        match unit {
            "Y" => Ok(ReportingPeriod::LastYears { years: count }),
            "M" => Ok(ReportingPeriod::LastMonths { months: count }),
            "D" => Ok(ReportingPeriod::LastDays { days: count }),
            _ => Err(invalid()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_from_x_to_y_rejects_inverted_range() {
        let err = ReportingPeriod::from_x_to_y(date(2012, 1, 9), date(2012, 1, 1)).unwrap_err();
        assert!(matches!(err, IndexError::InvalidRange { .. }));

        // a single day is a valid interval
        let period = ReportingPeriod::from_x_to_y(date(2012, 1, 1), date(2012, 1, 1)).unwrap();
        assert_eq!(period.resolve(date(2020, 1, 1)).unwrap().days(), 1);
    }

    #[test]
    fn test_interval_counts_both_ends() {
        let interval = Interval::new(date(2011, 12, 31), date(2012, 1, 8)).unwrap();
        assert_eq!(interval.days(), 9);
        let days: Vec<NaiveDate> = interval.iter().collect();
        assert_eq!(days.len(), 9);
        assert_eq!(days[0], date(2011, 12, 31));
        assert_eq!(days[8], date(2012, 1, 8));
        assert!(interval.contains(date(2012, 1, 1)));
        assert!(!interval.contains(date(2012, 1, 9)));
    }

    #[test]
    fn test_relative_periods_resolve_against_reference_day() {
        let today = date(2024, 5, 15);

        let ytd = ReportingPeriod::YearToDate.resolve(today).unwrap();
        assert_eq!((ytd.start(), ytd.end()), (date(2024, 1, 1), today));

        let qtd = ReportingPeriod::QuarterToDate.resolve(today).unwrap();
        assert_eq!(qtd.start(), date(2024, 4, 1));

        let mtd = ReportingPeriod::MonthToDate.resolve(today).unwrap();
        assert_eq!(mtd.start(), date(2024, 5, 1));

        let last3 = ReportingPeriod::LastYears { years: 3 }.resolve(today).unwrap();
        assert_eq!(last3.start(), date(2021, 5, 15));

        let last30 = ReportingPeriod::LastDays { days: 30 }.resolve(today).unwrap();
        assert_eq!(last30.start(), date(2024, 4, 15));

        let year = ReportingPeriod::CalendarYear(2023).resolve(today).unwrap();
        assert_eq!((year.start(), year.end()), (date(2023, 1, 1), date(2023, 12, 31)));
    }

    #[test]
    fn test_since_in_the_future_is_invalid() {
        let period = ReportingPeriod::SinceX {
            start: date(2030, 1, 1),
        };
        assert!(period.resolve(date(2024, 1, 1)).is_err());
    }

    #[test]
    fn test_parse_period_strings() {
        assert_eq!("ytd".parse::<ReportingPeriod>().unwrap(), ReportingPeriod::YearToDate);
        assert_eq!(
            "3Y".parse::<ReportingPeriod>().unwrap(),
            ReportingPeriod::LastYears { years: 3 }
        );
        assert_eq!(
            "2012".parse::<ReportingPeriod>().unwrap(),
            ReportingPeriod::CalendarYear(2012)
        );
        assert_eq!(
            "2011-12-31:2012-01-08".parse::<ReportingPeriod>().unwrap(),
            ReportingPeriod::FromXtoY {
                start: date(2011, 12, 31),
                end: date(2012, 1, 8)
            }
        );
        assert_eq!(
            "since:2020-02-29".parse::<ReportingPeriod>().unwrap(),
            ReportingPeriod::SinceX {
                start: date(2020, 2, 29)
            }
        );
        assert!("2012-02-01:2012-01-01".parse::<ReportingPeriod>().is_err());
        assert!("forever".parse::<ReportingPeriod>().is_err());
        assert!("".parse::<ReportingPeriod>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for period in [
            ReportingPeriod::MonthToDate,
            ReportingPeriod::LastMonths { months: 6 },
            ReportingPeriod::CalendarYear(2019),
        ] {
            assert_eq!(period.to_string().parse::<ReportingPeriod>().unwrap(), period);
        }
    }
}
