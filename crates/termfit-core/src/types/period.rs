//! Tenor periods such as `3M` or `5Y`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Unit of a [`Period`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodUnit {
    /// Calendar days.
    Days,
    /// Weeks of seven calendar days.
    Weeks,
    /// Calendar months (end-of-month clamped).
    Months,
    /// Calendar years.
    Years,
}

/// A tenor period, e.g. `3M`.
///
/// # Example
///
/// ```rust
/// use termfit_core::types::{Period, PeriodUnit};
///
/// let p: Period = "18M".parse().unwrap();
/// assert_eq!(p, Period::new(18, PeriodUnit::Months));
/// assert_eq!(p.to_string(), "18M");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    /// Number of units.
    pub length: i32,
    /// The unit.
    pub unit: PeriodUnit,
}

impl Period {
    /// Creates a new period.
    #[must_use]
    pub const fn new(length: i32, unit: PeriodUnit) -> Self {
        Self { length, unit }
    }

    /// Shorthand for a number of months.
    #[must_use]
    pub const fn months(length: i32) -> Self {
        Self::new(length, PeriodUnit::Months)
    }

    /// Shorthand for a number of years.
    #[must_use]
    pub const fn years(length: i32) -> Self {
        Self::new(length, PeriodUnit::Years)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            PeriodUnit::Days => 'D',
            PeriodUnit::Weeks => 'W',
            PeriodUnit::Months => 'M',
            PeriodUnit::Years => 'Y',
        };
        write!(f, "{}{}", self.length, unit)
    }
}

impl FromStr for Period {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tenor = s.trim().to_uppercase();

        match tenor.as_str() {
            "ON" | "O/N" => return Ok(Self::new(1, PeriodUnit::Days)),
            "TN" | "T/N" => return Ok(Self::new(2, PeriodUnit::Days)),
            _ => {}
        }

        let Some(unit_char) = tenor.chars().last() else {
            return Err(CoreError::invalid_period(s, "empty period"));
        };
        let unit = match unit_char {
            'D' => PeriodUnit::Days,
            'W' => PeriodUnit::Weeks,
            'M' => PeriodUnit::Months,
            'Y' => PeriodUnit::Years,
            _ => return Err(CoreError::invalid_period(s, "unit must be one of D, W, M, Y")),
        };

        let number = &tenor[..tenor.len() - 1];
        let length: i32 = number
            .parse()
            .map_err(|_| CoreError::invalid_period(s, format!("'{number}' is not a number")))?;

        Ok(Self::new(length, unit))
    }
}
