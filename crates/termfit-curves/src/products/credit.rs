//! Credit default swaps.

use serde::{Deserialize, Serialize};
use termfit_core::daycounts::DayCountConvention;
use termfit_core::types::Date;

use super::CurveView;
use crate::calibrator::{CloneScope, Pricer};
use crate::curve::{Curve, SharedCurve};
use crate::error::{CurveError, CurveResult};
use crate::tenor::{unsupported_quote, Instrument, QuoteConvention};

/// A single-name CDS, valued per unit notional from the protection
/// buyer's side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CreditDefaultSwap {
    /// Protection start.
    pub start: Date,
    /// Protection end.
    pub maturity: Date,
    /// Running coupon (spread) per annum.
    pub coupon: f64,
    /// Premium payment frequency in months.
    pub frequency_months: u32,
    /// Premium accrual convention.
    pub day_count: DayCountConvention,
}

impl CreditDefaultSwap {
    /// Creates a quarterly ACT/360 CDS.
    #[must_use]
    pub fn new(start: Date, maturity: Date, coupon: f64) -> Self {
        Self {
            start,
            maturity,
            coupon,
            frequency_months: 3,
            day_count: DayCountConvention::Act360,
        }
    }

    /// Premium period boundaries, starting at `start` and ending at
    /// `maturity`. The last period may be short.
    pub fn schedule(&self) -> CurveResult<Vec<Date>> {
        if self.frequency_months == 0 {
            return Err(CurveError::invalid_value("CDS payment frequency must be positive"));
        }
        if self.maturity <= self.start {
            return Err(CurveError::invalid_value(format!(
                "CDS maturity {} is not after start {}",
                self.maturity, self.start
            )));
        }
        let step = i32::try_from(self.frequency_months)
            .map_err(|_| CurveError::invalid_value("CDS payment frequency out of range"))?;
        let mut dates = vec![self.start];
        let mut k = 1;
        loop {
            let date = self.start.add_months(step * k)?;
            if date >= self.maturity {
                break;
            }
            dates.push(date);
            k += 1;
        }
        dates.push(self.maturity);
        Ok(dates)
    }
}

impl Instrument for CreditDefaultSwap {
    fn maturity(&self) -> Date {
        self.maturity
    }

    fn quote_target(&self, quote: f64, convention: QuoteConvention) -> CurveResult<(Self, f64)> {
        match convention {
            QuoteConvention::ParSpread => Ok((
                Self {
                    coupon: quote,
                    ..*self
                },
                0.0,
            )),
            QuoteConvention::Upfront => Ok((*self, quote)),
            other => Err(unsupported_quote("credit default swap", other)),
        }
    }
}

/// Recovery assumption for a survival curve.
#[derive(Debug, Clone)]
pub enum Recovery {
    /// Constant recovery rate.
    Rate(f64),
    /// Recovery rate term structure, read at each period midpoint.
    Curve(SharedCurve),
}

impl Recovery {
    pub(crate) fn scoped_clone(&self, scope: CloneScope) -> Self {
        match self {
            Self::Rate(rate) => Self::Rate(*rate),
            Self::Curve(curve) => Self::Curve(crate::calibrator::scoped_curve(curve, scope)),
        }
    }
}

impl Default for Recovery {
    fn default() -> Self {
        Self::Rate(0.4)
    }
}

#[derive(Debug)]
enum RecoveryView<'a> {
    Rate(f64),
    Curve(CurveView<'a>),
}

impl RecoveryView<'_> {
    fn value(&self, date: Date) -> CurveResult<f64> {
        match self {
            Self::Rate(rate) => Ok(*rate),
            Self::Curve(curve) => curve.value(date),
        }
    }
}

/// Prices a CDS off a survival curve, a discount curve and a recovery
/// assumption.
///
/// ```text
/// premium    = c × Σ τ_i × DF(t_i) × (Q(t_{i-1}) + Q(t_i)) / 2
/// protection = Σ (1 - R(m_i)) × DF(m_i) × (Q(t_{i-1}) - Q(t_i))
/// pv         = protection - premium
/// ```
///
/// where `m_i` is the period midpoint.
#[derive(Debug)]
pub struct CdsPricer<'a> {
    survival: &'a Curve,
    discount: CurveView<'a>,
    recovery: RecoveryView<'a>,
    product: &'a CreditDefaultSwap,
}

impl<'a> CdsPricer<'a> {
    /// Creates a pricer; the discount and recovery curves stay read-locked
    /// for the pricer's lifetime.
    #[must_use]
    pub fn new(
        survival: &'a Curve,
        discount: &'a SharedCurve,
        recovery: &'a Recovery,
        product: &'a CreditDefaultSwap,
    ) -> Self {
        let recovery = match recovery {
            Recovery::Rate(rate) => RecoveryView::Rate(*rate),
            Recovery::Curve(curve) => RecoveryView::Curve(CurveView::shared(curve)),
        };
        Self {
            survival,
            discount: CurveView::shared(discount),
            recovery,
            product,
        }
    }

    /// Premium leg value per unit of coupon.
    pub fn risky_annuity(&self) -> CurveResult<f64> {
        let (annuity, _) = self.legs()?;
        Ok(annuity)
    }

    fn legs(&self) -> CurveResult<(f64, f64)> {
        let dates = self.product.schedule()?;
        let mut annuity = 0.0;
        let mut protection = 0.0;
        let mut q_prev = self.survival.interpolate(dates[0])?;
        for window in dates.windows(2) {
            let (a, b) = (window[0], window[1]);
            let q = self.survival.interpolate(b)?;
            let tau = self.product.day_count.year_fraction(a, b);
            annuity += tau * self.discount.value(b)? * 0.5 * (q_prev + q);

            let mid = a.add_days(a.days_between(&b) / 2);
            let loss = 1.0 - self.recovery.value(mid)?;
            protection += loss * self.discount.value(mid)? * (q_prev - q);
            q_prev = q;
        }
        Ok((annuity, protection))
    }
}

impl Pricer for CdsPricer<'_> {
    fn pv(&self) -> CurveResult<f64> {
        let (annuity, protection) = self.legs()?;
        Ok(protection - self.product.coupon * annuity)
    }
}
