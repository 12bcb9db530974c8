//! Sequential bootstrap.
//!
//! Tenors are solved one at a time in ascending curve-date order. Each
//! tenor contributes one curve point, found by a bracketed Brent search on
//! the value at its curve date with every earlier point held fixed:
//!
//! 1. Reset the curve to the anchor point (full fit) or truncate it after
//!    the last kept tenor (partial refit)
//! 2. For each active tenor, convert its quote to a target price
//! 3. Solve in closed form when the model allows it, otherwise bracket from
//!    the previous point and root-find
//! 4. Apply the negative-value policy and append the point
//!
//! A tenor with no admissible solution fails the fit unless forced fitting
//! is enabled, in which case its quote is walked toward the previous
//! tenor's quote until a solution exists.

mod discount;
mod survival;

pub use discount::DiscountCalibrator;
pub use survival::SurvivalCalibrator;

use termfit_core::daycounts::DayCountConvention;
use termfit_core::types::Date;
use termfit_math::solvers::{brent, expand_bracket, SolverConfig};
use tracing::{debug, info, warn};

use crate::calibrator::{
    model_price, Calibrator, FitFlags, FitReport, FitState, FitStatus, InstrumentError,
    TenorContext,
};
use crate::config::NegativeTreatment;
use crate::curve::Curve;
use crate::error::{CalibrationFailure, CurveError, CurveResult, ValidationIssue};
use crate::tenor::CurveTenor;

/// A calibrator solved by sequential bootstrap.
pub trait BootstrapModel: Calibrator {
    /// Curve value at the as-of date.
    fn anchor_value(&self) -> f64 {
        1.0
    }

    /// Admissible range for solved values.
    fn value_limits(&self) -> (f64, f64);

    /// Starting search interval for a tenor.
    fn initial_bracket(&self, context: &TenorContext<'_, Self::Product>) -> (f64, f64);

    /// Direct solution for tenors that admit one.
    fn closed_form(
        &self,
        _curve: &Curve,
        _context: &TenorContext<'_, Self::Product>,
    ) -> CurveResult<Option<f64>> {
        Ok(None)
    }
}

/// Years between two dates in model time.
pub(crate) fn model_time(start: Date, end: Date) -> f64 {
    DayCountConvention::Act365Fixed.year_fraction(start, end)
}

/// Reports active tenors whose curve dates do not strictly increase after
/// the settlement date.
pub(crate) fn validate_curve_dates<P>(
    settlement: Date,
    tenors: &[CurveTenor<P>],
    issues: &mut Vec<ValidationIssue>,
) {
    let mut last = settlement;
    for tenor in tenors.iter().filter(|t| t.weight > 0.0) {
        if tenor.curve_date <= last {
            issues.push(ValidationIssue::new(
                &tenor.name,
                format!("curve date {} must be after {last}", tenor.curve_date),
            ));
        } else {
            last = tenor.curve_date;
        }
    }
}

struct Solved {
    value: f64,
    iterations: usize,
}

/// Runs the sequential bootstrap for `model` from tenor index `from`.
pub fn run_bootstrap<M: BootstrapModel>(
    model: &M,
    state: FitState<'_, M::Product>,
    from: usize,
) -> CurveResult<FitReport> {
    let FitState {
        name,
        curve,
        tenors,
        flags,
        ..
    } = state;
    let config = model.config();
    let from = from.min(tenors.len());

    if from == 0 {
        curve.clear();
        curve.add(model.as_of(), model.anchor_value())?;
    } else {
        curve.truncate_after(tenors[from - 1].curve_date);
    }
    for tenor in tenors[from..].iter_mut() {
        tenor.forced_quote = None;
        tenor.model_price = None;
    }

    info!(curve = %name, tenors = tenors.len(), from, "bootstrap started");

    let mut iterations = 0;
    for index in from..tenors.len() {
        if !tenors[index].is_active() {
            debug!(curve = %name, tenor = %tenors[index].name, "zero weight, skipped");
            continue;
        }

        let solved = match solve_tenor(model, name, curve, &tenors[index]) {
            Ok(solved) => solved,
            Err(err) if config.force_fit && err.as_calibration_failure().is_some() => {
                let solved = force_tenor(model, name, curve, tenors, index, err)?;
                flags.fit_was_forced = true;
                solved
            }
            Err(err) => return Err(err),
        };
        iterations += solved.iterations;

        let value = apply_negative_policy(model, name, curve, &tenors[index], flags, solved.value)?;
        curve.add(tenors[index].curve_date, value)?;
        debug!(
            curve = %name,
            tenor = %tenors[index].name,
            date = %tenors[index].curve_date,
            value,
            iterations = solved.iterations,
            "tenor solved"
        );
    }

    let mut report = FitReport::new(FitStatus::Converged);
    report.iterations = iterations;
    for tenor in tenors.iter_mut().filter(|t| t.is_active()) {
        let (product, target) = tenor.target()?;
        let price = model_price(model, curve, &product)?;
        tenor.model_price = Some(price);
        report.instrument_errors.push(InstrumentError {
            tenor: tenor.name.clone(),
            market_price: target,
            model_price: price,
        });
    }

    info!(
        curve = %name,
        points = curve.len(),
        iterations,
        max_error = report.max_abs_error(),
        "bootstrap finished"
    );
    Ok(report)
}

fn solve_tenor<M: BootstrapModel>(
    model: &M,
    name: &str,
    curve: &Curve,
    tenor: &CurveTenor<M::Product>,
) -> CurveResult<Solved> {
    let config = model.config();
    let (product, target) = tenor.target()?;
    let previous = curve
        .last_point()
        .ok_or_else(|| CurveError::invalid_value(format!("curve '{name}' has no anchor point")))?;
    let context = TenorContext {
        tenor,
        product: &product,
        target,
        previous,
    };

    if let Some(value) = model.closed_form(curve, &context)? {
        if value.is_finite() && value > 0.0 {
            return Ok(Solved {
                value,
                iterations: 0,
            });
        }
        return Err(failure(
            name,
            tenor,
            value,
            f64::NAN,
            format!("closed-form solution {value} is not admissible"),
        ));
    }

    let date = tenor.curve_date;
    let residual = |x: f64| {
        let mut trial = curve.clone();
        if trial.add(date, x).is_err() {
            return f64::NAN;
        }
        model_price(model, &trial, &product).unwrap_or(f64::NAN)
    };

    let (low, high) = model.initial_bracket(&context);
    let solver = SolverConfig::new(
        config.tolerance_x,
        config.tolerance_f,
        u32::try_from(config.max_iterations).unwrap_or(u32::MAX),
    );

    let result = expand_bracket(
        &residual,
        target,
        low,
        high,
        model.value_limits(),
        config.max_bracket_expansions,
    )
    .and_then(|(a, b)| brent(&residual, target, a, b, &solver));

    match result {
        Ok(root) => Ok(Solved {
            value: root.root,
            iterations: root.iterations as usize,
        }),
        Err(err) => {
            let (best, residual) = err.best_estimate().unwrap_or((previous.1, f64::NAN));
            Err(failure(name, tenor, best, residual, err.to_string()))
        }
    }
}

fn failure<P>(
    name: &str,
    tenor: &CurveTenor<P>,
    best_value: f64,
    residual: f64,
    reason: String,
) -> CurveError {
    CurveError::calibration(CalibrationFailure {
        curve: name.to_string(),
        tenor: tenor.name.clone(),
        curve_date: tenor.curve_date,
        best_value,
        residual,
        reason,
    })
}

/// Walks the failing tenor's quote toward the previous active tenor's
/// quote in equal steps until a solution exists.
fn force_tenor<M: BootstrapModel>(
    model: &M,
    name: &str,
    curve: &Curve,
    tenors: &mut [CurveTenor<M::Product>],
    index: usize,
    original: CurveError,
) -> CurveResult<Solved> {
    let Some(anchor_quote) = tenors[..index]
        .iter()
        .rev()
        .find(|t| t.is_active())
        .map(CurveTenor::effective_quote)
    else {
        return Err(original);
    };

    let steps = model.config().max_force_steps.max(1);
    let market = tenors[index].market_quote;
    for step in 1..=steps {
        let quote = market + (anchor_quote - market) * f64::from(step) / f64::from(steps);
        tenors[index].forced_quote = Some(quote);
        if let Ok(solved) = solve_tenor(model, name, curve, &tenors[index]) {
            warn!(
                curve = %name,
                tenor = %tenors[index].name,
                market_quote = market,
                forced_quote = quote,
                step,
                "quote forced to reach a solution"
            );
            return Ok(solved);
        }
    }

    tenors[index].forced_quote = None;
    Err(original)
}

fn apply_negative_policy<M: BootstrapModel>(
    model: &M,
    name: &str,
    curve: &Curve,
    tenor: &CurveTenor<M::Product>,
    flags: &mut FitFlags,
    value: f64,
) -> CurveResult<f64> {
    let Some((_, previous)) = curve.last_point() else {
        return Ok(value);
    };
    if value <= previous {
        return Ok(value);
    }

    flags.negative_found = true;
    match model.config().negative_treatment {
        NegativeTreatment::Allow => {
            warn!(curve = %name, tenor = %tenor.name, value, previous, "negative rate implied");
            Ok(value)
        }
        NegativeTreatment::Zero => {
            warn!(curve = %name, tenor = %tenor.name, value, previous, "negative rate floored at zero");
            Ok(previous)
        }
        // TODO: implement a smoothing adjustment; the value is kept unchanged for now.
        NegativeTreatment::Adjust => {
            warn!(curve = %name, tenor = %tenor.name, value, previous, "negative rate left unadjusted");
            Ok(value)
        }
    }
}
