//! Projected quasi-Newton (BFGS) minimization.

use nalgebra::{DMatrix, DVector};

use super::{
    check_dimension, Bounds, CountedObjective, OptimizationResult, OptimizerConfig, Termination,
};
use crate::error::{MathError, MathResult};

const ARMIJO: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 40;
const CURVATURE_FLOOR: f64 = 1e-12;

/// Minimizes `objective` inside `bounds` with a projected BFGS method.
///
/// Gradients are taken by finite differences that stay inside the box
/// (one-sided at an active bound). Each trial point is projected onto the
/// box and accepted under an Armijo condition. The inverse-Hessian estimate
/// resets to the identity whenever the search direction stops descending.
///
/// # Example
///
/// ```rust
/// use termfit_math::optimization::{projected_bfgs, Bounds, OptimizerConfig};
///
/// let bounds = Bounds::new(vec![0.0, 0.0], vec![2.0, 2.0]).unwrap();
/// let result = projected_bfgs(&[1.5, 1.5], &bounds, &OptimizerConfig::default(), |x| {
///     (x[0] - 0.5).powi(2) + 4.0 * (x[1] - 1.0).powi(2)
/// })
/// .unwrap();
///
/// assert!((result.parameters[0] - 0.5).abs() < 1e-5);
/// assert!((result.parameters[1] - 1.0).abs() < 1e-5);
/// ```
pub fn projected_bfgs<F>(
    initial: &[f64],
    bounds: &Bounds,
    config: &OptimizerConfig,
    objective: F,
) -> MathResult<OptimizationResult>
where
    F: FnMut(&[f64]) -> f64,
{
    check_dimension(initial, bounds)?;

    let n = initial.len();
    let mut obj = CountedObjective::new(objective);
    let mut x = bounds.clamp(initial);
    let mut fx = obj.eval(&x);

    if !fx.is_finite() {
        return Err(MathError::invalid_input(
            "objective is not finite at the starting point",
        ));
    }
    if n == 0 {
        return Ok(OptimizationResult {
            parameters: x,
            objective_value: fx,
            iterations: 0,
            evaluations: obj.evaluations,
            converged: true,
            termination: Termination::Converged,
        });
    }

    let mut g = gradient(&mut obj, &x, fx, bounds);
    let mut h = DMatrix::<f64>::identity(n, n);
    let mut iterations = 0;
    let mut termination = Termination::MaxIterations;

    while iterations < config.max_iterations {
        if obj.evaluations >= config.max_evaluations {
            termination = Termination::MaxEvaluations;
            break;
        }
        iterations += 1;

        if projected_gradient_norm(&x, &g, bounds) <= config.gradient_tolerance {
            termination = Termination::Converged;
            break;
        }

        let mut direction = -(&h * &g);
        let active = active_set(&x, &g, bounds);
        for (i, is_active) in active.iter().enumerate() {
            if *is_active {
                direction[i] = 0.0;
            }
        }
        if g.dot(&direction) >= 0.0 {
            h = DMatrix::identity(n, n);
            direction = -g.clone();
            for (i, is_active) in active.iter().enumerate() {
                if *is_active {
                    direction[i] = 0.0;
                }
            }
        }

        let Some((x_new, f_new)) = line_search(&mut obj, &x, fx, &g, &direction, bounds) else {
            if h == DMatrix::identity(n, n) {
                termination = Termination::Stalled;
                break;
            }
            h = DMatrix::identity(n, n);
            continue;
        };

        let g_new = gradient(&mut obj, &x_new, f_new, bounds);
        let s = DVector::from_iterator(n, x_new.iter().zip(x.iter()).map(|(a, b)| a - b));
        let y = &g_new - &g;
        let sy = s.dot(&y);

        if sy > CURVATURE_FLOOR {
            let rho = 1.0 / sy;
            let identity = DMatrix::<f64>::identity(n, n);
            let left = &identity - rho * (&s * y.transpose());
            let right = &identity - rho * (&y * s.transpose());
            h = &left * &h * &right + rho * (&s * s.transpose());
        }

        let step = s.amax();
        let change = (fx - f_new).abs();
        x = x_new;
        fx = f_new;
        g = g_new;

        if step <= config.tolerance_x || change <= config.tolerance_f {
            termination = Termination::Converged;
            break;
        }
    }

    Ok(OptimizationResult {
        parameters: x,
        objective_value: fx,
        iterations,
        evaluations: obj.evaluations,
        converged: termination == Termination::Converged,
        termination,
    })
}

fn gradient<F>(obj: &mut CountedObjective<F>, x: &[f64], fx: f64, bounds: &Bounds) -> DVector<f64>
where
    F: FnMut(&[f64]) -> f64,
{
    let n = x.len();
    let mut g = DVector::zeros(n);
    let mut shifted = x.to_vec();

    for i in 0..n {
        let h = 1e-7 * x[i].abs().max(1.0);
        let lo = bounds.lower()[i];
        let hi = bounds.upper()[i];
        let up = (x[i] + h).min(hi);
        let down = (x[i] - h).max(lo);

        g[i] = if up > x[i] && down < x[i] {
            shifted[i] = up;
            let f_up = obj.eval(&shifted);
            shifted[i] = down;
            let f_down = obj.eval(&shifted);
            (f_up - f_down) / (up - down)
        } else if up > x[i] {
            shifted[i] = up;
            (obj.eval(&shifted) - fx) / (up - x[i])
        } else if down < x[i] {
            shifted[i] = down;
            (fx - obj.eval(&shifted)) / (x[i] - down)
        } else {
            0.0
        };
        shifted[i] = x[i];
    }
    g
}

/// Coordinates pinned at a bound with the gradient pushing outward.
fn active_set(x: &[f64], g: &DVector<f64>, bounds: &Bounds) -> Vec<bool> {
    x.iter()
        .enumerate()
        .map(|(i, v)| {
            (*v <= bounds.lower()[i] && g[i] > 0.0) || (*v >= bounds.upper()[i] && g[i] < 0.0)
        })
        .collect()
}

fn projected_gradient_norm(x: &[f64], g: &DVector<f64>, bounds: &Bounds) -> f64 {
    let moved: Vec<f64> = x.iter().zip(g.iter()).map(|(v, gi)| v - gi).collect();
    bounds
        .clamp(&moved)
        .iter()
        .zip(x.iter())
        .map(|(p, v)| (p - v).abs())
        .fold(0.0_f64, f64::max)
}

fn line_search<F>(
    obj: &mut CountedObjective<F>,
    x: &[f64],
    fx: f64,
    g: &DVector<f64>,
    direction: &DVector<f64>,
    bounds: &Bounds,
) -> Option<(Vec<f64>, f64)>
where
    F: FnMut(&[f64]) -> f64,
{
    let mut alpha = 1.0;
    for _ in 0..MAX_BACKTRACKS {
        let trial: Vec<f64> = x
            .iter()
            .zip(direction.iter())
            .map(|(v, d)| v + alpha * d)
            .collect();
        let trial = bounds.clamp(&trial);
        let decrease: f64 = trial
            .iter()
            .zip(x.iter())
            .zip(g.iter())
            .map(|((t, v), gi)| gi * (t - v))
            .sum();

        if decrease >= 0.0 {
            alpha *= 0.5;
            continue;
        }

        let f_trial = obj.eval(&trial);
        if f_trial <= fx + ARMIJO * decrease {
            return Some((trial, f_trial));
        }
        alpha *= 0.5;
    }
    None
}
