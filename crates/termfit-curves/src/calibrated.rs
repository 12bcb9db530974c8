//! A curve bundled with the tenors and calibrator that produce it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use termfit_core::types::Currency;
use tracing::{debug, info, warn};

use crate::calibrator::{
    model_price, Calibrator, CloneScope, FitFlags, FitReport, FitState, FitStatus, Pricer,
};
use crate::curve::{Curve, SharedCurve};
use crate::error::{CurveError, CurveResult, ValidationIssue};
use crate::overlay::{FitHook, FitHooks};
use crate::tenor::{sort_tenors, CurveTenor};

/// What a calibrated curve represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurveCategory {
    /// Discount factors.
    Discount,
    /// Survival probabilities.
    Survival,
    /// Forward prices or a basis over a projection curve.
    Forward,
    /// Values generated by a parametric model.
    Parametric,
}

/// A curve, its calibration instruments and the calibrator that fits them.
///
/// # Example
///
/// ```rust
/// use termfit_core::types::{Currency, Date};
/// use termfit_curves::prelude::*;
///
/// let as_of = Date::from_ymd(2025, 1, 15).unwrap();
/// let tenors = vec![CurveTenor::new(
///     "6M",
///     DiscountProduct::from(MoneyMarketNote::new(as_of, as_of.add_months(6).unwrap(), 0.0)),
///     0.025,
///     QuoteConvention::SimpleYield,
/// )];
///
/// let mut curve = CalibratedCurve::new(
///     "USD-OIS",
///     Currency::USD,
///     CurveCategory::Discount,
///     DiscountCalibrator::new(as_of),
///     tenors,
/// );
/// let report = curve.fit().unwrap();
/// assert_eq!(report.status, FitStatus::Converged);
/// assert!(curve.tenors()[0].model_price.is_some());
/// ```
#[derive(Debug)]
pub struct CalibratedCurve<C: Calibrator> {
    name: String,
    currency: Currency,
    category: CurveCategory,
    curve: Curve,
    tenors: Vec<CurveTenor<C::Product>>,
    calibrator: C,
    flags: FitFlags,
    hooks: FitHooks,
    last_report: Option<FitReport>,
    fitted: bool,
}

impl<C: Calibrator> CalibratedCurve<C> {
    /// Creates an unfitted curve. Tenors are sorted by curve date.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        currency: Currency,
        category: CurveCategory,
        calibrator: C,
        mut tenors: Vec<CurveTenor<C::Product>>,
    ) -> Self {
        sort_tenors(&mut tenors);
        let name = name.into();
        let curve = calibrator.empty_curve().with_identity(name.clone(), currency);
        Self {
            name,
            currency,
            category,
            curve,
            tenors,
            calibrator,
            flags: FitFlags::default(),
            hooks: FitHooks::new(),
            last_report: None,
            fitted: false,
        }
    }

    /// Curve name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Curve currency.
    #[must_use]
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Curve category.
    #[must_use]
    pub fn category(&self) -> CurveCategory {
        self.category
    }

    /// The fitted curve.
    #[must_use]
    pub fn curve(&self) -> &Curve {
        &self.curve
    }

    /// A shared copy of the fitted curve, for use as another calibrator's
    /// auxiliary curve.
    #[must_use]
    pub fn to_shared(&self) -> SharedCurve {
        self.curve.clone().into_shared()
    }

    /// Overwrites `target` with the fitted curve's points.
    pub fn publish(&self, target: &SharedCurve) {
        *target.write() = self.curve.clone();
    }

    /// Tenors, sorted by curve date.
    #[must_use]
    pub fn tenors(&self) -> &[CurveTenor<C::Product>] {
        &self.tenors
    }

    /// The calibrator.
    #[must_use]
    pub fn calibrator(&self) -> &C {
        &self.calibrator
    }

    /// Mutable access to the calibrator, e.g. to adjust a parameter warm
    /// start between fits.
    pub fn calibrator_mut(&mut self) -> &mut C {
        &mut self.calibrator
    }

    /// Policy flags raised by the fits since the last full fit.
    #[must_use]
    pub fn flags(&self) -> FitFlags {
        self.flags
    }

    /// Report of the last fit, or `None` if the last fit failed.
    #[must_use]
    pub fn last_report(&self) -> Option<&FitReport> {
        self.last_report.as_ref()
    }

    /// True when the curve holds the result of a successful fit.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    /// Registered fit hooks.
    #[must_use]
    pub fn hooks(&self) -> &FitHooks {
        &self.hooks
    }

    /// Registers a hook that brackets every fit of this curve.
    pub fn add_hook(&mut self, hook: Arc<dyn FitHook>) {
        self.hooks.push(hook);
    }

    /// Replaces the market quote of the tenor at `index` and clears any
    /// forced quote. The curve is not refitted.
    pub fn set_quote(&mut self, index: usize, quote: f64) -> CurveResult<()> {
        let count = self.tenors.len();
        let tenor = self.tenors.get_mut(index).ok_or_else(|| {
            CurveError::invalid_value(format!("tenor index {index} out of range for {count} tenors"))
        })?;
        tenor.market_quote = quote;
        tenor.forced_quote = None;
        Ok(())
    }

    /// Builds a pricer for `product` against the current curve.
    pub fn pricer<'a>(&'a self, product: &'a C::Product) -> CurveResult<Box<dyn Pricer + 'a>> {
        self.calibrator.pricer(&self.curve, product)
    }

    /// Current model price of the tenor at `index`, after quote conversion.
    pub fn tenor_price(&self, index: usize) -> CurveResult<f64> {
        let tenor = self.tenors.get(index).ok_or_else(|| {
            CurveError::invalid_value(format!("tenor index {index} out of range"))
        })?;
        let (product, _) = tenor.target()?;
        model_price(&self.calibrator, &self.curve, &product)
    }

    /// Collects configuration, tenor and calibrator issues.
    #[must_use]
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = self.calibrator.config().validate();
        for tenor in &self.tenors {
            tenor.validate(&mut issues);
        }
        self.calibrator.validate(&self.tenors, &mut issues);
        issues
    }

    /// Fits every tenor.
    pub fn fit(&mut self) -> CurveResult<FitReport> {
        self.refit(0)
    }

    /// Re-solves tenors from index `from` onwards, keeping earlier solved
    /// points. Calibrators without partial refit support, and curves whose
    /// last fit did not succeed, are fitted in full.
    ///
    /// # Errors
    ///
    /// Returns [`CurveError::Validation`] before any work if validation finds
    /// issues, and otherwise whatever the calibrator's fit returns. A failed
    /// sequential fit leaves the curve partially solved and unusable until a
    /// later fit succeeds.
    pub fn refit(&mut self, from: usize) -> CurveResult<FitReport> {
        sort_tenors(&mut self.tenors);
        let issues = self.validate();
        if !issues.is_empty() {
            warn!(curve = %self.name, issues = issues.len(), "validation failed");
            return Err(CurveError::Validation(issues));
        }

        let from = if self.calibrator.supports_partial_refit() && self.fitted {
            from.min(self.tenors.len())
        } else {
            0
        };
        if from == 0 {
            self.flags = FitFlags::default();
        }
        debug!(curve = %self.name, from, hooks = self.hooks.len(), "fit requested");

        let Self {
            name,
            currency,
            curve,
            tenors,
            calibrator,
            flags,
            hooks,
            ..
        } = self;
        let name: &str = name;
        let result = hooks.run(name, || {
            calibrator.fit_from(
                FitState {
                    name,
                    currency: *currency,
                    curve,
                    tenors,
                    flags,
                },
                from,
            )
        });
        let report = match result {
            Ok(report) => report,
            Err(err) => {
                self.fitted = false;
                self.last_report = None;
                return Err(err);
            }
        };

        info!(
            curve = %self.name,
            status = ?report.status,
            max_error = report.max_abs_error(),
            forced = self.flags.fit_was_forced,
            negative = self.flags.negative_found,
            "fit finished"
        );
        self.fitted = report.status != FitStatus::Failed;
        self.last_report = Some(report.clone());
        Ok(report)
    }

    /// Copies the curve for scenario analysis.
    ///
    /// Hooks refer to the original's overlay curves, so they are kept only
    /// when auxiliary curves are shared.
    #[must_use]
    pub fn deep_clone(&self, scope: CloneScope) -> Self {
        let hooks = match scope {
            CloneScope::ShareAuxiliary => self.hooks.clone(),
            CloneScope::CloneAuxiliary => FitHooks::new(),
        };
        Self {
            name: self.name.clone(),
            currency: self.currency,
            category: self.category,
            curve: self.curve.clone(),
            tenors: self.tenors.clone(),
            calibrator: self.calibrator.deep_clone(scope),
            flags: self.flags,
            hooks,
            last_report: self.last_report.clone(),
            fitted: self.fitted,
        }
    }
}
