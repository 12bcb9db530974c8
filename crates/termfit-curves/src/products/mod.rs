//! Reference products and pricers.
//!
//! Each calibrator family works on one closed product enum:
//!
//! - [`DiscountProduct`]: money-market notes and zero-coupon bonds, priced
//!   off a discount curve with an optional multiplicative overlay.
//! - [`CreditDefaultSwap`]: par-spread or upfront quoted CDS, priced off a
//!   survival curve, a discount curve and a recovery assumption.
//! - [`ForwardProduct`]: spot, forward, future and average-price contracts,
//!   priced off a forward-price curve.

mod credit;
mod discount;
mod forward;

pub use credit::{CdsPricer, CreditDefaultSwap, Recovery};
pub use discount::{DiscountPricer, DiscountProduct, MoneyMarketNote, ZeroCouponBond};
pub use forward::{CashflowSchedule, ForwardPricer, ForwardProduct};

use parking_lot::RwLockReadGuard;
use termfit_core::types::Date;

use crate::curve::{Curve, SharedCurve};
use crate::error::CurveResult;

/// A read-locked auxiliary curve held by a pricer.
pub(crate) struct CurveView<'a>(RwLockReadGuard<'a, Curve>);

impl<'a> CurveView<'a> {
    pub(crate) fn shared(curve: &'a SharedCurve) -> Self {
        Self(curve.read())
    }

    pub(crate) fn value(&self, date: Date) -> CurveResult<f64> {
        self.0.interpolate(date)
    }
}

impl std::fmt::Debug for CurveView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurveView")
            .field("name", &self.0.name())
            .field("points", &self.0.len())
            .finish()
    }
}
