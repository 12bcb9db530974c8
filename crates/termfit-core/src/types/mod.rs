//! Domain types.

mod currency;
mod date;
mod period;

pub use currency::Currency;
pub use date::Date;
pub use period::{Period, PeriodUnit};
