//! Calibration tenors.
//!
//! A [`CurveTenor`] is one quoted instrument: the product, its market quote
//! and quoting convention, a fit weight and the curve date its solved value
//! anchors.

use std::fmt;

use serde::{Deserialize, Serialize};
use termfit_core::types::Date;

use crate::error::{CurveError, CurveResult, ValidationIssue};

/// How a market quote maps to a price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuoteConvention {
    /// The quote is the price itself (per unit notional).
    Price,
    /// Simple (money-market) yield.
    SimpleYield,
    /// Continuously compounded yield.
    ContinuousYield,
    /// Running par spread; the target PV is zero.
    ParSpread,
    /// Upfront payment as a fraction of notional.
    Upfront,
}

impl fmt::Display for QuoteConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Price => "price",
            Self::SimpleYield => "simple yield",
            Self::ContinuousYield => "continuous yield",
            Self::ParSpread => "par spread",
            Self::Upfront => "upfront",
        };
        f.write_str(name)
    }
}

/// A product that can be calibrated against.
///
/// Each calibrator family works on a closed enum of products implementing
/// this trait; pricing itself lives with the calibrator.
pub trait Instrument: Clone + fmt::Debug + Send + Sync {
    /// Last date the product's value depends on.
    fn maturity(&self) -> Date;

    /// Converts a market quote into the product to price and the price it
    /// must reach.
    ///
    /// For par-spread quotes the returned product carries the quoted spread
    /// as its coupon and the target is zero.
    fn quote_target(&self, quote: f64, convention: QuoteConvention) -> CurveResult<(Self, f64)>;
}

pub(crate) fn unsupported_quote(product: &str, convention: QuoteConvention) -> CurveError {
    CurveError::invalid_config(format!("{product} cannot be quoted as {convention}"))
}

/// One calibration instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveTenor<P> {
    /// Tenor label, e.g. `"5Y"`.
    pub name: String,
    /// The product.
    pub product: P,
    /// Observed market quote.
    pub market_quote: f64,
    /// How `market_quote` converts to a price.
    pub quote_convention: QuoteConvention,
    /// Fit weight; zero disables the tenor without removing it.
    pub weight: f64,
    /// Date at which this tenor's solved value anchors the curve.
    pub curve_date: Date,
    /// Model price reached by the last fit.
    pub model_price: Option<f64>,
    /// Quote actually fitted when a forced fit moved it.
    pub forced_quote: Option<f64>,
}

impl<P: Instrument> CurveTenor<P> {
    /// Creates a tenor with unit weight, anchored at the product maturity.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        product: P,
        market_quote: f64,
        quote_convention: QuoteConvention,
    ) -> Self {
        let curve_date = product.maturity();
        Self {
            name: name.into(),
            product,
            market_quote,
            quote_convention,
            weight: 1.0,
            curve_date,
            model_price: None,
            forced_quote: None,
        }
    }

    /// Sets the fit weight.
    #[must_use]
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Overrides the anchoring curve date.
    #[must_use]
    pub fn with_curve_date(mut self, curve_date: Date) -> Self {
        self.curve_date = curve_date;
        self
    }

    /// Returns true if the tenor takes part in fits.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.weight > 0.0
    }

    /// The quote a fit targets: the forced quote if one was recorded,
    /// otherwise the market quote.
    #[must_use]
    pub fn effective_quote(&self) -> f64 {
        self.forced_quote.unwrap_or(self.market_quote)
    }

    /// Product and target price for the effective quote.
    pub fn target(&self) -> CurveResult<(P, f64)> {
        self.product
            .quote_target(self.effective_quote(), self.quote_convention)
    }

    /// Appends structural problems with this tenor.
    pub fn validate(&self, issues: &mut Vec<ValidationIssue>) {
        if !self.weight.is_finite() || self.weight < 0.0 {
            issues.push(ValidationIssue::new(
                &self.name,
                format!("weight must be finite and non-negative, got {}", self.weight),
            ));
        }
        if !self.market_quote.is_finite() {
            issues.push(ValidationIssue::new(&self.name, "market quote is not finite"));
        }
        if let Err(e) = self
            .product
            .quote_target(self.market_quote, self.quote_convention)
        {
            issues.push(ValidationIssue::new(&self.name, e.to_string()));
        }
    }
}

/// Sorts tenors by curve date, keeping the input order for equal dates.
pub fn sort_tenors<P>(tenors: &mut [CurveTenor<P>]) {
    tenors.sort_by_key(|t| t.curve_date);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Bill {
        maturity: Date,
    }

    impl Instrument for Bill {
        fn maturity(&self) -> Date {
            self.maturity
        }

        fn quote_target(
            &self,
            quote: f64,
            convention: QuoteConvention,
        ) -> CurveResult<(Self, f64)> {
            match convention {
                QuoteConvention::Price => Ok((self.clone(), quote)),
                other => Err(unsupported_quote("bill", other)),
            }
        }
    }

    fn bill(y: i32) -> Bill {
        Bill {
            maturity: Date::from_ymd(y, 1, 15).unwrap(),
        }
    }

    #[test]
    fn test_new_anchors_at_maturity() {
        let tenor = CurveTenor::new("1Y", bill(2026), 0.97, QuoteConvention::Price);
        assert_eq!(tenor.curve_date, bill(2026).maturity);
        assert!(tenor.is_active());
        assert_eq!(tenor.target().unwrap().1, 0.97);
    }

    #[test]
    fn test_forced_quote_overrides_market() {
        let mut tenor = CurveTenor::new("1Y", bill(2026), 0.97, QuoteConvention::Price);
        tenor.forced_quote = Some(0.98);
        assert_eq!(tenor.effective_quote(), 0.98);
        assert_eq!(tenor.target().unwrap().1, 0.98);
    }

    #[test]
    fn test_validate_collects_all_problems() {
        let tenor = CurveTenor::new("bad", bill(2026), f64::NAN, QuoteConvention::ParSpread)
            .with_weight(-1.0);
        let mut issues = Vec::new();
        tenor.validate(&mut issues);
        assert_eq!(issues.len(), 3);
        assert!(issues.iter().all(|i| i.subject == "bad"));
    }

    #[test]
    fn test_sort_is_stable_by_date() {
        let mut tenors = vec![
            CurveTenor::new("3Y", bill(2028), 0.9, QuoteConvention::Price),
            CurveTenor::new("1Y", bill(2026), 0.97, QuoteConvention::Price),
            CurveTenor::new("2Y", bill(2027), 0.94, QuoteConvention::Price),
        ];
        sort_tenors(&mut tenors);
        let names: Vec<_> = tenors.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["1Y", "2Y", "3Y"]);
    }
}
