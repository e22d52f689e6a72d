//! Common types used throughout the Ronda engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, RondaError};

// Re-export date type from chrono
pub use chrono::NaiveDate as Date;

/// A market symbol identifier.
///
/// Typically an exchange ticker such as "600519.SH" or "AAPL".
pub type Symbol = String;

/// Days from 0001-01-01 (CE) to 1970-01-01, the Unix epoch.
///
/// Polars stores dates as days since the Unix epoch while chrono's
/// `from_num_days_from_ce_opt` counts from the common era; adding this
/// offset converts between the two.
pub const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// A fiscal quarter: a calendar year plus a quarter number in `1..=4`.
///
/// Fiscal quarters are the period axis of fundamental data. They are
/// totally ordered, which makes them usable directly as panel keys.
///
/// # Example
///
/// ```
/// use ronda_traits::FiscalQuarter;
///
/// let q = FiscalQuarter::new(2024, 3).unwrap();
/// assert_eq!(q.to_string(), "2024Q3");
/// assert_eq!(q.pred(), FiscalQuarter::new(2024, 2).unwrap());
/// assert_eq!(q.minus(4), FiscalQuarter::new(2023, 3).unwrap());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FiscalQuarter {
    year: i32,
    quarter: u8,
}

impl FiscalQuarter {
    /// Create a fiscal quarter, validating the quarter number.
    ///
    /// # Errors
    ///
    /// Returns [`RondaError::InvalidDate`] if `quarter` is not in `1..=4`.
    pub fn new(year: i32, quarter: u8) -> Result<Self> {
        if (1..=4).contains(&quarter) {
            Ok(Self { year, quarter })
        } else {
            Err(RondaError::InvalidDate(format!(
                "quarter must be 1..=4, got {quarter}"
            )))
        }
    }

    /// The calendar year.
    #[must_use]
    pub const fn year(self) -> i32 {
        self.year
    }

    /// The quarter number in `1..=4`.
    #[must_use]
    pub const fn quarter(self) -> u8 {
        self.quarter
    }

    /// Whether this is the first quarter of its fiscal year.
    #[must_use]
    pub const fn is_first_quarter(self) -> bool {
        self.quarter == 1
    }

    /// The immediately preceding fiscal quarter.
    #[must_use]
    pub const fn pred(self) -> Self {
        if self.quarter == 1 {
            Self {
                year: self.year - 1,
                quarter: 4,
            }
        } else {
            Self {
                year: self.year,
                quarter: self.quarter - 1,
            }
        }
    }

    /// The fiscal quarter `n` quarters before this one.
    #[must_use]
    pub fn minus(self, n: usize) -> Self {
        let total = i64::from(self.year) * 4 + (i64::from(self.quarter) - 1) - n as i64;
        Self {
            year: total.div_euclid(4) as i32,
            quarter: (total.rem_euclid(4) + 1) as u8,
        }
    }

    /// The last calendar day of the quarter.
    #[must_use]
    pub fn end_date(self) -> Date {
        let (month, day) = match self.quarter {
            1 => (3, 31),
            2 => (6, 30),
            3 => (9, 30),
            _ => (12, 31),
        };
        Date::from_ymd_opt(self.year, month, day).unwrap()
    }
}

impl fmt::Display for FiscalQuarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Q{}", self.year, self.quarter)
    }
}

impl FromStr for FiscalQuarter {
    type Err = RondaError;

    fn from_str(s: &str) -> Result<Self> {
        let err = || RondaError::InvalidDate(format!("expected <year>Q<quarter>, got `{s}`"));
        let (year, quarter) = s.split_once(['Q', 'q']).ok_or_else(err)?;
        let year: i32 = year.parse().map_err(|_| err())?;
        let quarter: u8 = quarter.parse().map_err(|_| err())?;
        Self::new(year, quarter)
    }
}
