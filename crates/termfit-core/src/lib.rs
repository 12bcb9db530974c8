//! # Termfit Core
//!
//! Core types shared by the Termfit calibration crates.
//!
//! This crate provides the small set of building blocks that curves and
//! calibrators are keyed on:
//!
//! - **Types**: [`Date`], [`Period`], [`Currency`]
//! - **Day Count Conventions**: year fractions for accrual and curve time
//!
//! ## Example
//!
//! ```rust
//! use termfit_core::prelude::*;
//!
//! let as_of = Date::from_ymd(2025, 1, 15).unwrap();
//! let maturity = as_of.add_period("6M".parse().unwrap()).unwrap();
//! let tau = DayCountConvention::Act360.year_fraction(as_of, maturity);
//! assert!(tau > 0.49 && tau < 0.51);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::uninlined_format_args)]

pub mod daycounts;
pub mod error;
pub mod types;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::daycounts::DayCountConvention;
    pub use crate::error::{CoreError, CoreResult};
    pub use crate::types::{Currency, Date, Period, PeriodUnit};
}

pub use error::{CoreError, CoreResult};
pub use types::Date;
