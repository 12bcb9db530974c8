//! Bounded optimization algorithms.
//!
//! Both minimizers work inside a box and never evaluate the objective
//! outside it:
//!
//! - [`nelder_mead`]: derivative-free simplex search with restarts
//! - [`projected_bfgs`]: quasi-Newton with numerical gradients, projected
//!   onto the box after every step
//!
//! Runs are deterministic: a given objective, box and starting point always
//! produce the same result.

mod bfgs;
mod nelder_mead;

pub use bfgs::projected_bfgs;
pub use nelder_mead::nelder_mead;

use crate::error::{MathError, MathResult};

/// Box constraints `lower[i] <= x[i] <= upper[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl Bounds {
    /// Creates bounds, checking that both sides are finite and ordered.
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> MathResult<Self> {
        if lower.len() != upper.len() {
            return Err(MathError::dimension_mismatch(lower.len(), upper.len()));
        }
        for (i, (lo, hi)) in lower.iter().zip(upper.iter()).enumerate() {
            if !lo.is_finite() || !hi.is_finite() || lo > hi {
                return Err(MathError::invalid_input(format!(
                    "invalid bound at index {i}: [{lo}, {hi}]"
                )));
            }
        }
        Ok(Self { lower, upper })
    }

    /// Number of constrained coordinates.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.lower.len()
    }

    /// Lower bounds.
    #[must_use]
    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    /// Upper bounds.
    #[must_use]
    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    /// Projects a point onto the box.
    #[must_use]
    pub fn clamp(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .zip(self.lower.iter().zip(self.upper.iter()))
            .map(|(v, (lo, hi))| v.clamp(*lo, *hi))
            .collect()
    }

    /// Returns true if every coordinate lies inside the box.
    #[must_use]
    pub fn contains(&self, x: &[f64]) -> bool {
        x.len() == self.dimension()
            && x
                .iter()
                .zip(self.lower.iter().zip(self.upper.iter()))
                .all(|(v, (lo, hi))| *v >= *lo && *v <= *hi)
    }
}

/// Configuration shared by the bounded minimizers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizerConfig {
    /// Convergence tolerance on parameter movement.
    pub tolerance_x: f64,
    /// Convergence tolerance on objective change.
    pub tolerance_f: f64,
    /// Projected-gradient norm treated as stationary (BFGS only).
    pub gradient_tolerance: f64,
    /// Maximum number of iterations.
    pub max_iterations: usize,
    /// Maximum number of objective evaluations, checked once per iteration.
    pub max_evaluations: usize,
    /// Initial simplex edge as a fraction of each coordinate's range.
    pub initial_step: f64,
    /// Number of simplex restarts from the best point after convergence.
    pub restarts: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            tolerance_x: 1e-10,
            tolerance_f: 1e-14,
            gradient_tolerance: 1e-10,
            max_iterations: 500,
            max_evaluations: 5000,
            initial_step: 0.08,
            restarts: 2,
        }
    }
}

/// Why an optimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// A convergence tolerance was met.
    Converged,
    /// The iteration budget ran out.
    MaxIterations,
    /// The evaluation budget ran out.
    MaxEvaluations,
    /// No descent step could be found.
    Stalled,
}

/// Result of an optimization run.
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// Best parameters found, always inside the bounds.
    pub parameters: Vec<f64>,
    /// Objective value at `parameters`.
    pub objective_value: f64,
    /// Number of iterations used.
    pub iterations: usize,
    /// Number of objective evaluations.
    pub evaluations: usize,
    /// Whether a convergence tolerance was met.
    pub converged: bool,
    /// Why the run stopped.
    pub termination: Termination,
}

/// Objective wrapper that counts evaluations and maps NaN to +inf so that
/// comparisons stay total.
struct CountedObjective<F> {
    f: F,
    evaluations: usize,
}

impl<F> CountedObjective<F>
where
    F: FnMut(&[f64]) -> f64,
{
    fn new(f: F) -> Self {
        Self { f, evaluations: 0 }
    }

    fn eval(&mut self, x: &[f64]) -> f64 {
        self.evaluations += 1;
        let value = (self.f)(x);
        if value.is_nan() {
            f64::INFINITY
        } else {
            value
        }
    }
}

fn check_dimension(initial: &[f64], bounds: &Bounds) -> MathResult<()> {
    if initial.len() == bounds.dimension() {
        Ok(())
    } else {
        Err(MathError::dimension_mismatch(bounds.dimension(), initial.len()))
    }
}
