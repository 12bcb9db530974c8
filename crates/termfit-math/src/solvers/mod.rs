//! Root-finding algorithms.
//!
//! - [`brent`]: bracketing solver combining bisection, secant and inverse
//!   quadratic steps
//! - [`expand_bracket`]: outward search for a sign change inside an
//!   admissible range
//!
//! Both stop on whichever tolerance is met first: the width of the
//! remaining interval (`tolerance_x`) or the absolute residual
//! (`tolerance_f`).
//!
//! # Example
//!
//! ```rust
//! use termfit_math::solvers::{brent, SolverConfig};
//!
//! // Discount factor that reprices a 2% simple-yield note over half a year.
//! let price = |df: f64| df;
//! let target = 1.0 / (1.0 + 0.02 * 0.5);
//!
//! let result = brent(price, target, 0.5, 1.0, &SolverConfig::default()).unwrap();
//! assert!((result.root - target).abs() < 1e-10);
//! ```

mod bracket;
mod brent;

pub use bracket::expand_bracket;
pub use brent::brent;

use crate::error::MathResult;

/// Default tolerance on the solved value.
pub const DEFAULT_TOLERANCE_X: f64 = 1e-12;

/// Default tolerance on the residual.
pub const DEFAULT_TOLERANCE_F: f64 = 1e-10;

/// Default maximum iterations for root-finding algorithms.
pub const DEFAULT_MAX_ITERATIONS: u32 = 200;

/// Configuration for root-finding algorithms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverConfig {
    /// Convergence tolerance on the solved value.
    pub tolerance_x: f64,
    /// Convergence tolerance on the absolute residual.
    pub tolerance_f: f64,
    /// Maximum number of iterations.
    pub max_iterations: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance_x: DEFAULT_TOLERANCE_X,
            tolerance_f: DEFAULT_TOLERANCE_F,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl SolverConfig {
    /// Creates a new solver configuration.
    #[must_use]
    pub fn new(tolerance_x: f64, tolerance_f: f64, max_iterations: u32) -> Self {
        Self {
            tolerance_x,
            tolerance_f,
            max_iterations,
        }
    }

    /// Sets the maximum iterations.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// Result of a root-finding run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverResult {
    /// The root found.
    pub root: f64,
    /// Number of iterations used.
    pub iterations: u32,
    /// Residual `f(root) - target` at the root.
    pub residual: f64,
}

/// A one-dimensional solver for `f(x) = target` over an interval.
///
/// Implementations must be deterministic: repeated calls with the same
/// function, target and interval return the same result.
pub trait RootFinder: Send + Sync {
    /// Solves `f(x) = target` for `x` in `[low, high]`.
    fn solve<F>(
        &self,
        f: F,
        target: f64,
        low: f64,
        high: f64,
        config: &SolverConfig,
    ) -> MathResult<SolverResult>
    where
        F: Fn(f64) -> f64;

    /// Returns the name of the solver.
    fn name(&self) -> &'static str;
}

/// Brent solver implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrentSolver;

impl RootFinder for BrentSolver {
    fn solve<F>(
        &self,
        f: F,
        target: f64,
        low: f64,
        high: f64,
        config: &SolverConfig,
    ) -> MathResult<SolverResult>
    where
        F: Fn(f64) -> f64,
    {
        brent(f, target, low, high, config)
    }

    fn name(&self) -> &'static str {
        "Brent"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_brent_solver_trait() {
        let solver = BrentSolver;
        let result = solver
            .solve(|x| x * x, 2.0, 0.0, 2.0, &SolverConfig::default())
            .unwrap();
        assert_relative_eq!(result.root, std::f64::consts::SQRT_2, epsilon = 1e-10);
        assert_eq!(solver.name(), "Brent");
    }
}
