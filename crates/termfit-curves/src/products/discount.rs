//! Discount-curve products.

use serde::{Deserialize, Serialize};
use termfit_core::daycounts::DayCountConvention;
use termfit_core::types::Date;

use super::CurveView;
use crate::calibrator::Pricer;
use crate::curve::{Curve, SharedCurve};
use crate::error::{CurveError, CurveResult};
use crate::tenor::{unsupported_quote, Instrument, QuoteConvention};

/// A simple-interest money-market note from `start` to `maturity`.
///
/// Its price is the value at maturity per unit invested at start:
///
/// ```text
/// price = (1 + r × τ) × DF(maturity) / DF(start)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoneyMarketNote {
    /// Accrual start.
    pub start: Date,
    /// Maturity.
    pub maturity: Date,
    /// Simple interest rate.
    pub rate: f64,
    /// Accrual convention.
    pub day_count: DayCountConvention,
}

impl MoneyMarketNote {
    /// Creates an ACT/360 note.
    #[must_use]
    pub fn new(start: Date, maturity: Date, rate: f64) -> Self {
        Self {
            start,
            maturity,
            rate,
            day_count: DayCountConvention::Act360,
        }
    }

    /// Sets the accrual convention.
    #[must_use]
    pub fn with_day_count(mut self, day_count: DayCountConvention) -> Self {
        self.day_count = day_count;
        self
    }

    /// Returns the note with a different rate.
    #[must_use]
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    /// Accrual fraction of the note period.
    #[must_use]
    pub fn accrual(&self) -> f64 {
        self.day_count.year_fraction(self.start, self.maturity)
    }

    /// Growth factor `1 + r × τ`.
    #[must_use]
    pub fn growth(&self) -> f64 {
        1.0 + self.rate * self.accrual()
    }
}

/// A zero-coupon bond paying `notional` at maturity.
///
/// Yield quotes are measured from `base` to maturity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZeroCouponBond {
    /// Date yields are measured from.
    pub base: Date,
    /// Payment date.
    pub maturity: Date,
    /// Redemption amount.
    pub notional: f64,
    /// Convention for yield time.
    pub day_count: DayCountConvention,
}

impl ZeroCouponBond {
    /// Creates a unit-notional ACT/365F bond.
    #[must_use]
    pub fn new(base: Date, maturity: Date) -> Self {
        Self {
            base,
            maturity,
            notional: 1.0,
            day_count: DayCountConvention::Act365Fixed,
        }
    }

    /// Sets the notional.
    #[must_use]
    pub fn with_notional(mut self, notional: f64) -> Self {
        self.notional = notional;
        self
    }

    /// Time from base to maturity.
    #[must_use]
    pub fn time_to_maturity(&self) -> f64 {
        self.day_count.year_fraction(self.base, self.maturity)
    }
}

/// Products a discount curve calibrates to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DiscountProduct {
    /// Money-market note.
    MoneyMarket(MoneyMarketNote),
    /// Zero-coupon bond.
    ZeroCoupon(ZeroCouponBond),
}

impl From<MoneyMarketNote> for DiscountProduct {
    fn from(note: MoneyMarketNote) -> Self {
        Self::MoneyMarket(note)
    }
}

impl From<ZeroCouponBond> for DiscountProduct {
    fn from(bond: ZeroCouponBond) -> Self {
        Self::ZeroCoupon(bond)
    }
}

impl Instrument for DiscountProduct {
    fn maturity(&self) -> Date {
        match self {
            Self::MoneyMarket(note) => note.maturity,
            Self::ZeroCoupon(bond) => bond.maturity,
        }
    }

    fn quote_target(&self, quote: f64, convention: QuoteConvention) -> CurveResult<(Self, f64)> {
        match (self, convention) {
            (Self::MoneyMarket(note), QuoteConvention::SimpleYield) => {
                let quoted = MoneyMarketNote {
                    rate: quote,
                    ..*note
                };
                Ok((Self::MoneyMarket(quoted), 1.0))
            }
            (Self::MoneyMarket(_), QuoteConvention::Price) => Ok((self.clone(), quote)),
            (Self::ZeroCoupon(bond), QuoteConvention::Price) => {
                Ok((self.clone(), quote * bond.notional))
            }
            (Self::ZeroCoupon(bond), QuoteConvention::ContinuousYield) => Ok((
                self.clone(),
                bond.notional * (-quote * bond.time_to_maturity()).exp(),
            )),
            (Self::ZeroCoupon(bond), QuoteConvention::SimpleYield) => {
                let growth = 1.0 + quote * bond.time_to_maturity();
                if growth <= 0.0 {
                    return Err(CurveError::invalid_value(format!(
                        "simple yield {quote} implies a non-positive growth factor"
                    )));
                }
                Ok((self.clone(), bond.notional / growth))
            }
            (Self::MoneyMarket(_), other) => Err(unsupported_quote("money-market note", other)),
            (Self::ZeroCoupon(_), other) => Err(unsupported_quote("zero-coupon bond", other)),
        }
    }
}

/// Prices discount products off a curve of discount factors, optionally
/// scaled by a multiplicative overlay.
#[derive(Debug)]
pub struct DiscountPricer<'a> {
    curve: &'a Curve,
    overlay: Option<CurveView<'a>>,
    product: &'a DiscountProduct,
}

impl<'a> DiscountPricer<'a> {
    /// Pricer without an overlay.
    #[must_use]
    pub fn new(curve: &'a Curve, product: &'a DiscountProduct) -> Self {
        Self {
            curve,
            overlay: None,
            product,
        }
    }

    /// Pricer reading a shared overlay curve for its lifetime.
    #[must_use]
    pub fn with_overlay(
        curve: &'a Curve,
        overlay: Option<&'a SharedCurve>,
        product: &'a DiscountProduct,
    ) -> Self {
        Self {
            curve,
            overlay: overlay.map(CurveView::shared),
            product,
        }
    }

    /// Effective discount factor at `date`.
    pub fn discount_factor(&self, date: Date) -> CurveResult<f64> {
        let base = self.curve.interpolate(date)?;
        match &self.overlay {
            Some(overlay) => Ok(base * overlay.value(date)?),
            None => Ok(base),
        }
    }
}

impl Pricer for DiscountPricer<'_> {
    fn pv(&self) -> CurveResult<f64> {
        match self.product {
            DiscountProduct::MoneyMarket(note) => {
                let df_start = self.discount_factor(note.start)?;
                if df_start <= 0.0 {
                    return Err(CurveError::pricing(format!(
                        "non-positive discount factor {df_start} at {}",
                        note.start
                    )));
                }
                Ok(note.growth() * self.discount_factor(note.maturity)? / df_start)
            }
            DiscountProduct::ZeroCoupon(bond) => {
                Ok(bond.notional * self.discount_factor(bond.maturity)?)
            }
        }
    }
}
