//! Global parametric calibration.
//!
//! A parametric model maps a parameter vector to curve values in closed
//! form. The fit minimizes
//!
//! ```text
//! min Σ w_i × (model_i(θ) - market_i)²     subject to  lower ≤ θ ≤ upper
//! ```
//!
//! over the fit-flagged parameters, rebuilding the curve on a fixed date
//! grid for every trial point. Optimizer non-convergence is not an error:
//! the best point found is written back and the outcome is reported in
//! [`FitReport::status`](crate::calibrator::FitReport).

mod cir;

pub use cir::{cir_discount_factor, CirCalibrator};

use termfit_core::types::Date;
use termfit_math::optimization::{nelder_mead, projected_bfgs, OptimizerConfig};
use tracing::{debug, info, warn};

use crate::calibrator::{
    model_price, Calibrator, FitReport, FitState, FitStatus, InstrumentError,
};
use crate::config::{CalibrationConfig, OptimizerMethod};
use crate::curve::Curve;
use crate::error::{CurveError, CurveResult};
use crate::parameters::ParameterVector;
use crate::tenor::CurveTenor;

/// A calibrator whose curve is a closed-form function of model parameters.
pub trait ParametricModel: Calibrator {
    /// Model parameters; the values are the warm start for the next fit.
    fn parameters(&self) -> &ParameterVector;

    /// Mutable access to the model parameters.
    fn parameters_mut(&mut self) -> &mut ParameterVector;

    /// Curve value at `date` under the full parameter vector.
    fn model_value(&self, parameters: &[f64], date: Date) -> f64;
}

/// Dates at which a parametric curve is materialized: every
/// `grid_step_months` from the as-of date out to `grid_years`, plus every
/// tenor's curve date.
pub fn pricing_grid<P>(
    as_of: Date,
    config: &CalibrationConfig,
    tenors: &[CurveTenor<P>],
) -> CurveResult<Vec<Date>> {
    let step = i32::try_from(config.grid_step_months)
        .map_err(|_| CurveError::invalid_config("grid step out of range"))?;
    let horizon = i32::try_from(config.grid_years.saturating_mul(12))
        .map_err(|_| CurveError::invalid_config("grid length out of range"))?;
    if step <= 0 {
        return Err(CurveError::invalid_config("grid step must be positive"));
    }

    let mut grid = Vec::with_capacity((horizon / step) as usize + tenors.len() + 1);
    let mut months = 0;
    while months <= horizon {
        grid.push(as_of.add_months(months)?);
        months += step;
    }
    grid.extend(tenors.iter().map(|t| t.curve_date).filter(|d| *d > as_of));
    grid.sort();
    grid.dedup();
    Ok(grid)
}

fn write_curve<M: ParametricModel>(
    model: &M,
    grid: &[Date],
    parameters: &[f64],
    curve: &mut Curve,
) -> CurveResult<()> {
    curve.clear();
    for date in grid {
        curve.add(*date, model.model_value(parameters, *date))?;
    }
    Ok(())
}

struct Target<P> {
    index: usize,
    product: P,
    price: f64,
    weight: f64,
}

/// Runs the global fit for `model`. Partial refits are not supported; the
/// whole curve is rebuilt.
pub fn run_global<M: ParametricModel>(
    model: &mut M,
    state: FitState<'_, M::Product>,
) -> CurveResult<FitReport> {
    let FitState {
        name, curve, tenors, ..
    } = state;
    let config = model.config().clone();
    let (start, bounds) = model.parameters().reduce()?;
    let grid = pricing_grid(model.as_of(), &config, tenors)?;

    let mut targets = Vec::new();
    for (index, tenor) in tenors.iter_mut().enumerate() {
        tenor.model_price = None;
        if tenor.is_active() {
            let (product, price) = tenor.target()?;
            targets.push(Target {
                index,
                product,
                price,
                weight: tenor.weight,
            });
        }
    }

    if targets.is_empty() {
        let current = model.parameters().values().to_vec();
        write_curve(&*model, &grid, &current, curve)?;
        debug!(curve = %name, "no active tenors, curve rebuilt from current parameters");
        return Ok(FitReport::new(FitStatus::Skipped));
    }

    info!(
        curve = %name,
        tenors = targets.len(),
        parameters = start.len(),
        grid = grid.len(),
        "global fit started"
    );

    let optimizer = OptimizerConfig {
        tolerance_x: config.tolerance_x,
        tolerance_f: config.tolerance_f * config.tolerance_f,
        max_iterations: config.max_iterations,
        max_evaluations: config.max_evaluations,
        ..OptimizerConfig::default()
    };

    let result = {
        let model: &M = model;
        let mut scratch = model.empty_curve();
        for date in &grid {
            scratch.add(*date, 1.0)?;
        }
        let mut values = vec![0.0; grid.len()];

        let objective = |x: &[f64]| -> f64 {
            let full = model.parameters().expand(x);
            for (slot, date) in values.iter_mut().zip(&grid) {
                *slot = model.model_value(&full, *date);
            }
            if scratch.set_values(&values).is_err() {
                return f64::INFINITY;
            }
            targets
                .iter()
                .map(|t| match model_price(model, &scratch, &t.product) {
                    Ok(price) => t.weight * (price - t.price).powi(2),
                    Err(_) => f64::INFINITY,
                })
                .sum()
        };

        match config.optimizer {
            OptimizerMethod::NelderMead => nelder_mead(&start, &bounds, &optimizer, objective)?,
            OptimizerMethod::ProjectedBfgs => {
                projected_bfgs(&start, &bounds, &optimizer, objective)?
            }
        }
    };

    model.parameters_mut().apply(&result.parameters);
    let fitted = model.parameters().values().to_vec();
    write_curve(&*model, &grid, &fitted, curve)?;

    let mut report = FitReport::new(FitStatus::from(result.termination));
    report.iterations = result.iterations;
    report.evaluations = result.evaluations;
    report.objective = Some(result.objective_value);
    for target in &targets {
        let price = model_price(&*model, curve, &target.product)?;
        tenors[target.index].model_price = Some(price);
        report.instrument_errors.push(InstrumentError {
            tenor: tenors[target.index].name.clone(),
            market_price: target.price,
            model_price: price,
        });
    }

    if result.converged {
        info!(
            curve = %name,
            iterations = result.iterations,
            evaluations = result.evaluations,
            objective = result.objective_value,
            "global fit converged"
        );
    } else {
        warn!(
            curve = %name,
            termination = ?result.termination,
            iterations = result.iterations,
            evaluations = result.evaluations,
            objective = result.objective_value,
            "global fit stopped before convergence"
        );
    }
    Ok(report)
}
