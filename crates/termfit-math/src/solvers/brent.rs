//! Brent's root-finding algorithm.

use crate::error::{MathError, MathResult};
use crate::solvers::{SolverConfig, SolverResult};

/// Brent's root-finding algorithm for `f(x) = target`.
///
/// Requires the residuals at `low` and `high` to have opposite signs (or
/// one of them to be zero). Stops when the bracket half-width falls below
/// `tolerance_x` or the absolute residual falls below `tolerance_f`.
///
/// On failure the error carries the best point reached and its residual, so
/// callers can report how close the search got.
///
/// # Example
///
/// ```rust
/// use termfit_math::solvers::{brent, SolverConfig};
///
/// let f = |x: f64| x * x * x - x;
///
/// let result = brent(f, 2.0, 1.0, 2.0, &SolverConfig::default()).unwrap();
/// assert!((f(result.root) - 2.0).abs() < 1e-10);
/// ```
pub fn brent<F>(
    f: F,
    target: f64,
    low: f64,
    high: f64,
    config: &SolverConfig,
) -> MathResult<SolverResult>
where
    F: Fn(f64) -> f64,
{
    let residual = |x: f64| f(x) - target;

    let mut a = low;
    let mut b = high;
    let mut fa = residual(a);
    let mut fb = residual(b);

    if !fa.is_finite() || !fb.is_finite() {
        return Err(MathError::invalid_input(format!(
            "non-finite residual at bracket end points ({a}, {b})"
        )));
    }
    if fa == 0.0 {
        return Ok(SolverResult {
            root: a,
            iterations: 0,
            residual: fa,
        });
    }
    if fb == 0.0 {
        return Ok(SolverResult {
            root: b,
            iterations: 0,
            residual: fb,
        });
    }
    if fa.signum() == fb.signum() {
        return Err(MathError::InvalidBracket { a, b, fa, fb });
    }

    let mut c = b;
    let mut fc = fb;
    let mut d = b - a;
    let mut e = d;

    for iteration in 0..config.max_iterations {
        // Keep the root between b and c.
        if fb.signum() == fc.signum() {
            c = a;
            fc = fa;
            d = b - a;
            e = d;
        }
        if fc.abs() < fb.abs() {
            a = b;
            b = c;
            c = a;
            fa = fb;
            fb = fc;
            fc = fa;
        }

        let tol = 2.0 * f64::EPSILON * b.abs() + 0.5 * config.tolerance_x;
        let half = 0.5 * (c - b);

        if half.abs() <= tol || fb.abs() <= config.tolerance_f {
            return Ok(SolverResult {
                root: b,
                iterations: iteration,
                residual: fb,
            });
        }

        if e.abs() >= tol && fa.abs() > fb.abs() {
            let s = fb / fa;
            let (mut p, mut q) = if a == c {
                // Secant step
                (2.0 * half * s, 1.0 - s)
            } else {
                // Inverse quadratic interpolation
                let qa = fa / fc;
                let r = fb / fc;
                (
                    s * (2.0 * half * qa * (qa - r) - (b - a) * (r - 1.0)),
                    (qa - 1.0) * (r - 1.0) * (s - 1.0),
                )
            };
            if p > 0.0 {
                q = -q;
            }
            p = p.abs();

            let bound_interp = 3.0 * half * q - (tol * q).abs();
            let bound_prev = (e * q).abs();
            if 2.0 * p < bound_interp.min(bound_prev) {
                e = d;
                d = p / q;
            } else {
                d = half;
                e = d;
            }
        } else {
            d = half;
            e = d;
        }

        a = b;
        fa = fb;
        b += if d.abs() > tol { d } else { tol.copysign(half) };
        fb = residual(b);

        if !fb.is_finite() {
            return Err(MathError::convergence_failed(iteration + 1, a, fa));
        }
    }

    let (best, best_residual) = if fc.abs() < fb.abs() { (c, fc) } else { (b, fb) };
    Err(MathError::convergence_failed(
        config.max_iterations,
        best,
        best_residual,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_brent_sqrt2() {
        let result = brent(|x| x * x, 2.0, 0.0, 2.0, &SolverConfig::default()).unwrap();
        assert_relative_eq!(result.root, std::f64::consts::SQRT_2, epsilon = 1e-10);
        assert!(result.residual.abs() <= 1e-10);
    }

    #[test]
    fn test_brent_exponential_discount() {
        // Continuously compounded rate giving a discount factor of 0.95 over 2y
        let f = |r: f64| (-r * 2.0).exp();
        let result = brent(f, 0.95, -0.1, 0.5, &SolverConfig::default()).unwrap();
        assert_relative_eq!(result.root, -(0.95_f64.ln()) / 2.0, epsilon = 1e-10);
    }

    #[test]
    fn test_brent_root_at_end_point() {
        let result = brent(|x| x - 1.0, 0.0, 1.0, 3.0, &SolverConfig::default()).unwrap();
        assert_eq!(result.root, 1.0);
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn test_brent_invalid_bracket() {
        let result = brent(|x| x * x + 1.0, 0.0, -1.0, 1.0, &SolverConfig::default());
        assert!(matches!(result, Err(MathError::InvalidBracket { .. })));
    }

    #[test]
    fn test_brent_reports_best_point_on_exhaustion() {
        let config = SolverConfig::new(1e-15, 1e-15, 2);
        let err = brent(|x: f64| x.powi(3) - 0.3, 0.0, 0.0, 1.0, &config).unwrap_err();
        let (best, residual) = err.best_estimate().unwrap();
        assert!((0.0..=1.0).contains(&best));
        assert!(residual.abs() <= 0.7);
    }

    #[test]
    fn test_brent_residual_tolerance_stops_early() {
        let loose = SolverConfig::new(1e-15, 1e-3, 100);
        let tight = SolverConfig::new(1e-15, 1e-14, 100);
        let f = |x: f64| x.exp() - 2.0;
        let a = brent(f, 0.0, 0.0, 2.0, &loose).unwrap();
        let b = brent(f, 0.0, 0.0, 2.0, &tight).unwrap();
        assert!(a.iterations <= b.iterations);
        assert!(a.residual.abs() <= 1e-3);
    }
}
