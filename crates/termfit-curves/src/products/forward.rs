//! Forward-price contracts for commodity and equity forward curves.

use serde::{Deserialize, Serialize};
use termfit_core::types::Date;

use super::CurveView;
use crate::calibrator::Pricer;
use crate::curve::{Curve, SharedCurve};
use crate::error::{CurveError, CurveResult};
use crate::tenor::{unsupported_quote, Instrument, QuoteConvention};

/// Contracts quoted as a forward price level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ForwardProduct {
    /// Spot price observed on `date`. Seeds the curve.
    Spot {
        /// Observation date.
        date: Date,
    },
    /// Forward delivering on `delivery`, settled on `payment`.
    Forward {
        /// Delivery date.
        delivery: Date,
        /// Settlement date.
        payment: Date,
    },
    /// Exchange-traded future, margined daily (no discounting).
    Future {
        /// Expiry date.
        expiry: Date,
    },
    /// Swap on the arithmetic average of the forward price over `fixings`,
    /// settled on `payment`.
    AverageSwap {
        /// Averaging dates.
        fixings: Vec<Date>,
        /// Settlement date.
        payment: Date,
    },
}

impl ForwardProduct {
    /// Returns true for the spot contract.
    #[must_use]
    pub fn is_spot(&self) -> bool {
        matches!(self, Self::Spot { .. })
    }

    /// Fixing dates and their averaging weights, summing to one.
    pub fn fixings(&self) -> CurveResult<Vec<(Date, f64)>> {
        match self {
            Self::Spot { date } => Ok(vec![(*date, 1.0)]),
            Self::Forward { delivery, .. } => Ok(vec![(*delivery, 1.0)]),
            Self::Future { expiry } => Ok(vec![(*expiry, 1.0)]),
            Self::AverageSwap { fixings, .. } => {
                if fixings.is_empty() {
                    return Err(CurveError::invalid_value("average swap has no fixings"));
                }
                let w = 1.0 / fixings.len() as f64;
                Ok(fixings.iter().map(|d| (*d, w)).collect())
            }
        }
    }

    /// Settlement date, if the contract's value is discounted.
    #[must_use]
    pub fn payment_date(&self) -> Option<Date> {
        match self {
            Self::Forward { payment, .. } | Self::AverageSwap { payment, .. } => Some(*payment),
            Self::Spot { .. } | Self::Future { .. } => None,
        }
    }

    /// Decomposes the contract into discounted fixing coefficients.
    pub fn decompose(&self, discount: Option<&Curve>) -> CurveResult<CashflowSchedule> {
        let df = match (self.payment_date(), discount) {
            (Some(payment), Some(curve)) => curve.interpolate(payment)?,
            _ => 1.0,
        };
        let fixings = self.fixings()?;
        Ok(CashflowSchedule { fixings, df })
    }
}

impl Instrument for ForwardProduct {
    fn maturity(&self) -> Date {
        match self {
            Self::Spot { date } => *date,
            Self::Forward { delivery, .. } => *delivery,
            Self::Future { expiry } => *expiry,
            Self::AverageSwap { fixings, payment } => {
                fixings.iter().max().copied().unwrap_or(*payment)
            }
        }
    }

    fn quote_target(&self, quote: f64, convention: QuoteConvention) -> CurveResult<(Self, f64)> {
        match convention {
            QuoteConvention::Price => {
                self.fixings()?;
                Ok((self.clone(), quote))
            }
            other => Err(unsupported_quote("forward contract", other)),
        }
    }
}

/// A contract's value as a linear function of the forward curve:
/// `df × Σ w_j F(t_j)`.
#[derive(Debug, Clone, PartialEq)]
pub struct CashflowSchedule {
    fixings: Vec<(Date, f64)>,
    df: f64,
}

impl CashflowSchedule {
    /// Fixing dates with discounted coefficients `df × w_j`.
    pub fn coefficients(&self) -> impl Iterator<Item = (Date, f64)> + '_ {
        self.fixings.iter().map(move |(d, w)| (*d, self.df * w))
    }

    /// Discounted value of a quoted price level.
    #[must_use]
    pub fn discounted(&self, quote: f64) -> f64 {
        self.df * quote
    }

    /// Settlement discount factor.
    #[must_use]
    pub fn discount_factor(&self) -> f64 {
        self.df
    }
}

/// Prices a forward contract as the averaged forward level it fixes on.
///
/// When a projection curve is present, the calibrated curve is an additive
/// basis over it.
#[derive(Debug)]
pub struct ForwardPricer<'a> {
    curve: &'a Curve,
    projection: Option<CurveView<'a>>,
    product: &'a ForwardProduct,
}

impl<'a> ForwardPricer<'a> {
    /// Creates a pricer; the projection curve stays read-locked for the
    /// pricer's lifetime.
    #[must_use]
    pub fn new(
        curve: &'a Curve,
        projection: Option<&'a SharedCurve>,
        product: &'a ForwardProduct,
    ) -> Self {
        Self {
            curve,
            projection: projection.map(CurveView::shared),
            product,
        }
    }

    /// Forward price at `date`.
    pub fn forward(&self, date: Date) -> CurveResult<f64> {
        let level = self.curve.interpolate(date)?;
        match &self.projection {
            Some(projection) => Ok(projection.value(date)? + level),
            None => Ok(level),
        }
    }
}

impl Pricer for ForwardPricer<'_> {
    fn pv(&self) -> CurveResult<f64> {
        self.product
            .fixings()?
            .into_iter()
            .try_fold(0.0, |acc, (date, w)| Ok(acc + w * self.forward(date)?))
    }
}
