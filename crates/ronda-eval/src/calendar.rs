//! The rebalance calendar.
//!
//! Built once per run from the panel's trading dates: one entry per
//! rebalance date at the configured frequency, each mapped to the next
//! trading day as its execution date. Immutable after construction.

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use ronda_traits::{Date, Result, RondaError};

/// How often the factor is re-evaluated and the cross-section re-ranked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalanceFrequency {
    /// Every trading day.
    Daily,
    /// The last trading day of each ISO week.
    #[default]
    Weekly,
    /// The last trading day of each calendar month.
    Monthly,
}

impl FromStr for RebalanceFrequency {
    type Err = RondaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            other => Err(RondaError::UnsupportedConfig(format!(
                "rebalance frequency `{other}` (expected daily, weekly or monthly)"
            ))),
        }
    }
}

/// One rebalance date and the execution date its trades print on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceEntry {
    /// The date the cross-section is evaluated.
    pub date: Date,
    /// The next trading day, whose price executes the rebalance.
    pub execution_date: Date,
}

/// Ordered rebalance schedule over the backtest window.
///
/// The forward return of period `i` spans execution date `i` to execution
/// date `i+1`, so a calendar of `n` entries yields `n - 1` evaluable
/// periods (see [`RebalanceCalendar::periods`]).
#[derive(Debug, Clone)]
pub struct RebalanceCalendar {
    entries: Vec<RebalanceEntry>,
}

impl RebalanceCalendar {
    /// Build the calendar from sorted trading dates.
    ///
    /// Dates in `[start, end]` are bucketed by frequency and the last
    /// trading date of each bucket becomes a rebalance date. Rebalance
    /// dates without a following trading day (the very end of the panel)
    /// are dropped, since nothing could execute.
    ///
    /// # Errors
    ///
    /// [`RondaError::InsufficientData`] when no trading date falls inside
    /// the window.
    pub fn build(
        trading_dates: &[Date],
        start: Date,
        end: Date,
        frequency: RebalanceFrequency,
    ) -> Result<Self> {
        let in_range: Vec<Date> = trading_dates
            .iter()
            .copied()
            .filter(|d| *d >= start && *d <= end)
            .collect();
        if in_range.is_empty() {
            return Err(RondaError::InsufficientData(format!(
                "no trading dates between {start} and {end}"
            )));
        }

        let mut rebalance_dates = Vec::new();
        for (index, &date) in in_range.iter().enumerate() {
            let next = in_range.get(index + 1);
            let is_bucket_end = match frequency {
                RebalanceFrequency::Daily => true,
                RebalanceFrequency::Weekly => {
                    next.is_none_or(|n| n.iso_week() != date.iso_week())
                }
                RebalanceFrequency::Monthly => next.is_none_or(|n| {
                    (n.year(), n.month()) != (date.year(), date.month())
                }),
            };
            if is_bucket_end {
                rebalance_dates.push(date);
            }
        }

        let entries = rebalance_dates
            .into_iter()
            .filter_map(|date| {
                let index = trading_dates.partition_point(|d| *d <= date);
                trading_dates.get(index).map(|&execution_date| RebalanceEntry {
                    date,
                    execution_date,
                })
            })
            .collect();

        Ok(Self { entries })
    }

    /// All calendar entries in date order.
    #[must_use]
    pub fn entries(&self) -> &[RebalanceEntry] {
        &self.entries
    }

    /// Consecutive entry pairs: each is one evaluable period, priced from
    /// the first entry's execution date to the second's.
    pub fn periods(&self) -> impl Iterator<Item = (RebalanceEntry, RebalanceEntry)> + '_ {
        self.entries.windows(2).map(|w| (w[0], w[1]))
    }

    /// Number of calendar entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the calendar has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Date {
        Date::from_ymd_opt(y, m, d).unwrap()
    }

    /// Mon-Fri trading dates over several weeks of January 2024.
    fn trading_dates() -> Vec<Date> {
        (1..=31)
            .filter_map(|d| {
                let date = date(2024, 1, d);
                (date.weekday().num_days_from_monday() < 5).then_some(date)
            })
            .collect()
    }

    #[test]
    fn test_weekly_picks_last_trading_day_of_week() {
        let dates = trading_dates();
        let calendar = RebalanceCalendar::build(
            &dates,
            date(2024, 1, 1),
            date(2024, 1, 31),
            RebalanceFrequency::Weekly,
        )
        .unwrap();

        // Fridays 5, 12, 19, 26; Wed 31 is the last bucket but has no
        // following trading date, so it is dropped.
        let rebalance: Vec<Date> = calendar.entries().iter().map(|e| e.date).collect();
        assert_eq!(
            rebalance,
            vec![date(2024, 1, 5), date(2024, 1, 12), date(2024, 1, 19), date(2024, 1, 26)]
        );
        // Execution is the following Monday.
        assert_eq!(calendar.entries()[0].execution_date, date(2024, 1, 8));
    }

    #[test]
    fn test_daily_uses_every_trading_day() {
        let dates = trading_dates();
        let calendar = RebalanceCalendar::build(
            &dates,
            date(2024, 1, 1),
            date(2024, 1, 12),
            RebalanceFrequency::Daily,
        )
        .unwrap();
        // 10 trading days in range, all have successors in the panel.
        assert_eq!(calendar.len(), 10);
        assert_eq!(calendar.periods().count(), 9);
    }

    #[test]
    fn test_monthly() {
        let mut dates = trading_dates();
        dates.push(date(2024, 2, 1));
        let calendar = RebalanceCalendar::build(
            &dates,
            date(2024, 1, 1),
            date(2024, 2, 1),
            RebalanceFrequency::Monthly,
        )
        .unwrap();
        let rebalance: Vec<Date> = calendar.entries().iter().map(|e| e.date).collect();
        assert_eq!(rebalance, vec![date(2024, 1, 31)]);
        assert_eq!(calendar.entries()[0].execution_date, date(2024, 2, 1));
    }

    #[test]
    fn test_empty_window_fails() {
        let dates = trading_dates();
        let result = RebalanceCalendar::build(
            &dates,
            date(2023, 1, 1),
            date(2023, 1, 31),
            RebalanceFrequency::Weekly,
        );
        assert!(matches!(result, Err(RondaError::InsufficientData(_))));
    }

    #[test]
    fn test_frequency_from_str() {
        assert_eq!(
            "weekly".parse::<RebalanceFrequency>().unwrap(),
            RebalanceFrequency::Weekly
        );
        assert!(matches!(
            "hourly".parse::<RebalanceFrequency>(),
            Err(RondaError::UnsupportedConfig(_))
        ));
    }
}
