//! Bounded Nelder-Mead simplex search.

use super::{
    check_dimension, Bounds, CountedObjective, OptimizationResult, OptimizerConfig, Termination,
};
use crate::error::MathResult;

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Minimizes `objective` inside `bounds` with a Nelder-Mead simplex.
///
/// Every trial vertex is clamped onto the box before it is evaluated. After
/// the simplex collapses the search restarts from the best vertex with a
/// fresh simplex, up to `config.restarts` times, stopping early once a
/// restart improves the objective by no more than `tolerance_f`.
///
/// # Example
///
/// ```rust
/// use termfit_math::optimization::{nelder_mead, Bounds, OptimizerConfig};
///
/// let bounds = Bounds::new(vec![0.0, 0.0], vec![1.0, 1.0]).unwrap();
/// let result = nelder_mead(&[0.9, 0.9], &bounds, &OptimizerConfig::default(), |x| {
///     (x[0] - 0.25).powi(2) + (x[1] - 0.4).powi(2)
/// })
/// .unwrap();
///
/// assert!((result.parameters[0] - 0.25).abs() < 1e-4);
/// ```
pub fn nelder_mead<F>(
    initial: &[f64],
    bounds: &Bounds,
    config: &OptimizerConfig,
    objective: F,
) -> MathResult<OptimizationResult>
where
    F: FnMut(&[f64]) -> f64,
{
    check_dimension(initial, bounds)?;

    let mut obj = CountedObjective::new(objective);
    let mut best = bounds.clamp(initial);
    let mut best_value = obj.eval(&best);

    if best.is_empty() {
        return Ok(OptimizationResult {
            parameters: best,
            objective_value: best_value,
            iterations: 0,
            evaluations: obj.evaluations,
            converged: true,
            termination: Termination::Converged,
        });
    }

    let mut iterations = 0;
    let mut termination;
    let mut round = 0;

    loop {
        let (x, value, stop) =
            simplex_search(&mut obj, &best, best_value, bounds, config, &mut iterations);
        let improvement = best_value - value;
        if value < best_value {
            best = x;
            best_value = value;
        }
        termination = stop;

        if stop != Termination::Converged
            || round >= config.restarts
            || improvement <= config.tolerance_f
        {
            break;
        }
        round += 1;
    }

    Ok(OptimizationResult {
        parameters: best,
        objective_value: best_value,
        iterations,
        evaluations: obj.evaluations,
        converged: termination == Termination::Converged,
        termination,
    })
}

fn simplex_search<F>(
    obj: &mut CountedObjective<F>,
    start: &[f64],
    start_value: f64,
    bounds: &Bounds,
    config: &OptimizerConfig,
    iterations: &mut usize,
) -> (Vec<f64>, f64, Termination)
where
    F: FnMut(&[f64]) -> f64,
{
    let dim = start.len();
    let mut simplex = Vec::with_capacity(dim + 1);
    let mut values = Vec::with_capacity(dim + 1);

    simplex.push(start.to_vec());
    values.push(start_value);

    for d in 0..dim {
        let mut x = start.to_vec();
        let step = (bounds.upper()[d] - bounds.lower()[d]).abs() * config.initial_step.max(1e-4);
        x[d] = (x[d] + step).min(bounds.upper()[d]);
        if (x[d] - start[d]).abs() < 1e-14 {
            x[d] = (start[d] - step).max(bounds.lower()[d]);
        }
        values.push(obj.eval(&x));
        simplex.push(x);
    }

    let mut termination = Termination::MaxIterations;

    while *iterations < config.max_iterations {
        if obj.evaluations >= config.max_evaluations {
            termination = Termination::MaxEvaluations;
            break;
        }
        *iterations += 1;

        let mut order: Vec<usize> = (0..=dim).collect();
        order.sort_by(|&i, &j| values[i].total_cmp(&values[j]));
        simplex = order.iter().map(|&i| simplex[i].clone()).collect();
        values = order.iter().map(|&i| values[i]).collect();

        let centroid: Vec<f64> = (0..dim)
            .map(|d| simplex.iter().take(dim).map(|x| x[d]).sum::<f64>() / dim as f64)
            .collect();

        let spread = (values[dim] - values[0]).abs();
        let size = simplex
            .iter()
            .skip(1)
            .map(|x| {
                x.iter()
                    .zip(simplex[0].iter())
                    .map(|(a, b)| (a - b).abs())
                    .fold(0.0_f64, f64::max)
            })
            .fold(0.0_f64, f64::max);

        if size <= config.tolerance_x
            || (spread <= config.tolerance_f && size <= config.tolerance_x.sqrt())
        {
            termination = Termination::Converged;
            break;
        }

        let toward = |coef: f64, from: &[f64]| -> Vec<f64> {
            let x: Vec<f64> = (0..dim)
                .map(|d| centroid[d] + coef * (from[d] - centroid[d]))
                .collect();
            bounds.clamp(&x)
        };

        let xr = toward(-REFLECTION, &simplex[dim]);
        let fr = obj.eval(&xr);

        if fr < values[0] {
            let xe = toward(EXPANSION, &xr);
            let fe = obj.eval(&xe);
            if fe < fr {
                simplex[dim] = xe;
                values[dim] = fe;
            } else {
                simplex[dim] = xr;
                values[dim] = fr;
            }
            continue;
        }

        if fr < values[dim - 1] {
            simplex[dim] = xr;
            values[dim] = fr;
            continue;
        }

        let xc = toward(CONTRACTION, &simplex[dim]);
        let fc = obj.eval(&xc);
        if fc < values[dim] {
            simplex[dim] = xc;
            values[dim] = fc;
            continue;
        }

        for i in 1..=dim {
            let shrunk: Vec<f64> = (0..dim)
                .map(|d| simplex[0][d] + SHRINK * (simplex[i][d] - simplex[0][d]))
                .collect();
            simplex[i] = bounds.clamp(&shrunk);
            values[i] = obj.eval(&simplex[i]);
        }
    }

    let best = (0..=dim)
        .min_by(|&i, &j| values[i].total_cmp(&values[j]))
        .unwrap_or(0);
    (simplex.swap_remove(best), values[best], termination)
}
