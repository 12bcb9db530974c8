//! Day count conventions.
//!
//! Calibrators use a day count twice: to accrue instrument periods and to map
//! curve dates onto model time. Only the conventions the reference products
//! need are provided.
//!
//! # Usage
//!
//! ```rust
//! use termfit_core::daycounts::DayCountConvention;
//! use termfit_core::types::Date;
//!
//! let start = Date::from_ymd(2025, 1, 15).unwrap();
//! let end = Date::from_ymd(2025, 7, 15).unwrap();
//!
//! assert_eq!(DayCountConvention::Thirty360US.day_count(start, end), 180);
//! assert!((DayCountConvention::Thirty360US.year_fraction(start, end) - 0.5).abs() < 1e-12);
//! ```

use serde::{Deserialize, Serialize};

use crate::types::Date;

/// Supported day count conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DayCountConvention {
    /// Actual/360 - money market instruments.
    Act360,

    /// Actual/365 Fixed - default model-time convention.
    #[default]
    Act365Fixed,

    /// Actual/Actual ISDA - splits the period by calendar year.
    ActActIsda,

    /// 30/360 US (Bond Basis) with February end-of-month rules.
    Thirty360US,
}

impl DayCountConvention {
    /// Returns the conventional market name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            DayCountConvention::Act360 => "ACT/360",
            DayCountConvention::Act365Fixed => "ACT/365F",
            DayCountConvention::ActActIsda => "ACT/ACT ISDA",
            DayCountConvention::Thirty360US => "30/360 US",
        }
    }

    /// Returns the number of days between two dates under the convention.
    #[must_use]
    pub fn day_count(&self, start: Date, end: Date) -> i64 {
        match self {
            DayCountConvention::Thirty360US => thirty_360_us_days(start, end),
            _ => start.days_between(&end),
        }
    }

    /// Returns the year fraction between two dates. Negative if `end < start`.
    #[must_use]
    pub fn year_fraction(&self, start: Date, end: Date) -> f64 {
        match self {
            DayCountConvention::Act360 => start.days_between(&end) as f64 / 360.0,
            DayCountConvention::Act365Fixed => start.days_between(&end) as f64 / 365.0,
            DayCountConvention::Thirty360US => thirty_360_us_days(start, end) as f64 / 360.0,
            DayCountConvention::ActActIsda => {
                if end < start {
                    return -self.year_fraction(end, start);
                }
                act_act_isda(start, end)
            }
        }
    }
}

impl std::fmt::Display for DayCountConvention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn is_last_of_february(date: Date) -> bool {
    date.month() == 2 && date.add_days(1).month() == 3
}

fn thirty_360_us_days(start: Date, end: Date) -> i64 {
    let mut d1 = start.day();
    let mut d2 = end.day();

    if is_last_of_february(start) {
        if is_last_of_february(end) {
            d2 = 30;
        }
        d1 = 30;
    }
    if d2 == 31 && d1 >= 30 {
        d2 = 30;
    }
    if d1 == 31 {
        d1 = 30;
    }

    360 * i64::from(end.year() - start.year())
        + 30 * (i64::from(end.month()) - i64::from(start.month()))
        + (i64::from(d2) - i64::from(d1))
}

fn act_act_isda(start: Date, end: Date) -> f64 {
    let days_in_year = |year: i32| -> f64 {
        if (year % 4 == 0 && year % 100 != 0) || year % 400 == 0 {
            366.0
        } else {
            365.0
        }
    };

    if start.year() == end.year() {
        return start.days_between(&end) as f64 / days_in_year(start.year());
    }

    let mut fraction = 0.0;
    let mut cursor = start;
    while cursor.year() < end.year() {
        let Ok(next_year) = Date::from_ymd(cursor.year() + 1, 1, 1) else {
            break;
        };
        fraction += cursor.days_between(&next_year) as f64 / days_in_year(cursor.year());
        cursor = next_year;
    }
    fraction + cursor.days_between(&end) as f64 / days_in_year(end.year())
}
