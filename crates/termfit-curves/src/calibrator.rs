//! The calibrator contract.
//!
//! A [`Calibrator`] turns a set of [`CurveTenor`]s into curve values. It is
//! bound to an as-of date at construction, holds shared references to the
//! auxiliary curves its pricers read, and is reused across repeated fits.
//!
//! Fit-local state never lives on the calibrator: every residual evaluation
//! receives an explicit [`TenorContext`], and the mutable pieces of the
//! curve under calibration arrive as a [`FitState`] that only exists for
//! the duration of one fit.

use serde::{Deserialize, Serialize};
use termfit_core::types::{Currency, Date};
use termfit_math::optimization::Termination;

use crate::config::CalibrationConfig;
use crate::curve::{Curve, SharedCurve};
use crate::error::{CurveResult, ValidationIssue};
use crate::tenor::{CurveTenor, Instrument};

/// Values a product against a curve.
pub trait Pricer {
    /// Present value (or model price) of the product.
    fn pv(&self) -> CurveResult<f64>;
}

/// How auxiliary curves are treated when a calibrated curve is cloned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CloneScope {
    /// Clones share auxiliary curves with the original.
    #[default]
    ShareAuxiliary,

    /// Auxiliary curves are copied so the clone shares nothing mutable.
    CloneAuxiliary,
}

/// Policy flags raised during a fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FitFlags {
    /// At least one tenor's quote was perturbed to reach a solution.
    pub fit_was_forced: bool,
    /// A solved point implied a negative forward or hazard rate.
    pub negative_found: bool,
}

/// Mutable view of a calibrated curve for the duration of one fit.
#[derive(Debug)]
pub struct FitState<'a, P> {
    /// Curve name, used in diagnostics.
    pub name: &'a str,
    /// Identity to propagate onto the curve after a successful fit.
    pub currency: Currency,
    /// The curve being calibrated.
    pub curve: &'a mut Curve,
    /// Tenors, sorted by curve date.
    pub tenors: &'a mut [CurveTenor<P>],
    /// Policy flags.
    pub flags: &'a mut FitFlags,
}

/// Immutable inputs for pricing one tenor during a fit.
#[derive(Debug)]
pub struct TenorContext<'a, P> {
    /// The tenor being solved.
    pub tenor: &'a CurveTenor<P>,
    /// Product to price after quote conversion.
    pub product: &'a P,
    /// Price the product must reach.
    pub target: f64,
    /// Last solved point before this tenor.
    pub previous: (Date, f64),
}

/// Outcome of a fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FitStatus {
    /// Every solve converged.
    Converged,
    /// The optimizer hit its iteration or evaluation ceiling.
    BudgetExhausted,
    /// The optimizer stopped without finding a descent step.
    Stalled,
    /// The global solve failed and the curve was left unfit.
    Failed,
    /// Nothing to fit.
    Skipped,
}

impl From<Termination> for FitStatus {
    fn from(termination: Termination) -> Self {
        match termination {
            Termination::Converged => Self::Converged,
            Termination::MaxIterations | Termination::MaxEvaluations => Self::BudgetExhausted,
            Termination::Stalled => Self::Stalled,
        }
    }
}

/// Pricing error of one tenor after a fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentError {
    /// Tenor name.
    pub tenor: String,
    /// Price the fit targeted.
    pub market_price: f64,
    /// Price reached.
    pub model_price: f64,
}

impl InstrumentError {
    /// Model minus market price.
    #[must_use]
    pub fn error(&self) -> f64 {
        self.model_price - self.market_price
    }
}

/// Summary returned by a fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    /// Outcome.
    pub status: FitStatus,
    /// Root-finder or optimizer iterations.
    pub iterations: usize,
    /// Objective evaluations (parametric fits only).
    pub evaluations: usize,
    /// Final objective value (parametric and smoothed fits).
    pub objective: Option<f64>,
    /// Per-tenor pricing errors, in tenor order.
    pub instrument_errors: Vec<InstrumentError>,
}

impl FitReport {
    /// An empty report with the given status.
    #[must_use]
    pub fn new(status: FitStatus) -> Self {
        Self {
            status,
            iterations: 0,
            evaluations: 0,
            objective: None,
            instrument_errors: Vec::new(),
        }
    }

    /// Largest absolute pricing error.
    #[must_use]
    pub fn max_abs_error(&self) -> f64 {
        self.instrument_errors
            .iter()
            .map(|e| e.error().abs())
            .fold(0.0, f64::max)
    }
}

/// The fit contract shared by every calibration strategy.
pub trait Calibrator: Send + Sync {
    /// Closed set of products this calibrator can price.
    type Product: Instrument;

    /// Valuation date.
    fn as_of(&self) -> Date;

    /// Settlement date. Calibration instruments must still be live after
    /// it; validation rejects tenors that are already settled.
    fn settlement(&self) -> Date;

    /// Calibration settings.
    fn config(&self) -> &CalibrationConfig;

    /// An empty curve with this calibrator's interpolation policy.
    fn empty_curve(&self) -> Curve;

    /// Builds a pricer for `product` against `curve` and the calibrator's
    /// auxiliary curves. The result depends on nothing else.
    fn pricer<'a>(
        &'a self,
        curve: &'a Curve,
        product: &'a Self::Product,
    ) -> CurveResult<Box<dyn Pricer + 'a>>;

    /// Appends structural problems (missing auxiliary curves, inconsistent
    /// parameter arrays, unsupported quotes).
    fn validate(&self, tenors: &[CurveTenor<Self::Product>], issues: &mut Vec<ValidationIssue>);

    /// Solves tenors from index `from` onwards, writing the curve.
    fn fit_from(
        &mut self,
        state: FitState<'_, Self::Product>,
        from: usize,
    ) -> CurveResult<FitReport>;

    /// Whether [`Self::fit_from`] honours a non-zero start index.
    fn supports_partial_refit(&self) -> bool {
        false
    }

    /// Copies the calibrator, sharing or cloning auxiliary curves per `scope`.
    #[must_use]
    fn deep_clone(&self, scope: CloneScope) -> Self
    where
        Self: Sized;
}

/// Prices `product` on `curve` with `calibrator`.
pub fn model_price<C: Calibrator>(
    calibrator: &C,
    curve: &Curve,
    product: &C::Product,
) -> CurveResult<f64> {
    calibrator.pricer(curve, product)?.pv()
}

/// Reports a settlement date before the as-of date.
pub(crate) fn validate_settlement(as_of: Date, settlement: Date, issues: &mut Vec<ValidationIssue>) {
    if settlement < as_of {
        issues.push(ValidationIssue::new(
            "settlement",
            format!("settlement {settlement} is before the as-of date {as_of}"),
        ));
    }
}

/// Shares or copies an auxiliary curve according to `scope`.
pub(crate) fn scoped_curve(curve: &SharedCurve, scope: CloneScope) -> SharedCurve {
    match scope {
        CloneScope::ShareAuxiliary => SharedCurve::clone(curve),
        CloneScope::CloneAuxiliary => curve.read().clone().into_shared(),
    }
}
