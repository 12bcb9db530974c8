//! Penalized weighted least squares.
//!
//! Solves
//!
//! ```text
//! minimize  Σ w_i (A x - b)_i²  +  xᵀ P x
//! ```
//!
//! through the normal equations `(AᵀWA + P) x = AᵀWb`. `P` carries
//! smoothness penalties (for example weighted squared first and second
//! differences of the unknowns) and must be symmetric positive semidefinite.

use nalgebra::{DMatrix, DVector};

use crate::error::{MathError, MathResult};

/// Solves the penalized weighted least-squares problem.
///
/// `design` is `m x n`, `target` has length `m`, `weights` has length `m`
/// and `penalty` is `n x n`.
///
/// # Errors
///
/// Returns [`MathError::DimensionMismatch`] on inconsistent shapes and
/// [`MathError::SingularMatrix`] when the normal equations are singular
/// (for example when some unknown is neither observed nor penalized).
pub fn penalized_least_squares(
    design: &DMatrix<f64>,
    target: &DVector<f64>,
    weights: &[f64],
    penalty: &DMatrix<f64>,
) -> MathResult<DVector<f64>> {
    let fixed = vec![None; design.ncols()];
    penalized_least_squares_with_fixed(design, target, weights, penalty, &fixed)
}

/// Solves the penalized problem with some unknowns pinned to known values.
///
/// `fixed[j] = Some(v)` removes unknown `j` from the solve and holds it at
/// `v`; its contribution moves to the right-hand side of both the data
/// term and the penalty. The returned vector has all `n` entries, fixed
/// ones included.
pub fn penalized_least_squares_with_fixed(
    design: &DMatrix<f64>,
    target: &DVector<f64>,
    weights: &[f64],
    penalty: &DMatrix<f64>,
    fixed: &[Option<f64>],
) -> MathResult<DVector<f64>> {
    let (m, n) = design.shape();
    if target.len() != m {
        return Err(MathError::dimension_mismatch(m, target.len()));
    }
    if weights.len() != m {
        return Err(MathError::dimension_mismatch(m, weights.len()));
    }
    if penalty.shape() != (n, n) {
        return Err(MathError::dimension_mismatch(n, penalty.nrows()));
    }
    if fixed.len() != n {
        return Err(MathError::dimension_mismatch(n, fixed.len()));
    }
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(MathError::invalid_input("weights must be finite and non-negative"));
    }

    let free: Vec<usize> = (0..n).filter(|&j| fixed[j].is_none()).collect();
    let pinned = DVector::from_iterator(n, fixed.iter().map(|v| v.unwrap_or(0.0)));
    let mut solution = pinned.clone();
    if free.is_empty() {
        return Ok(solution);
    }

    let nf = free.len();
    let shifted = target - design * &pinned;
    let design_free = DMatrix::from_fn(m, nf, |i, j| design[(i, free[j])]);
    let weighted = DMatrix::from_fn(m, nf, |i, j| design_free[(i, j)] * weights[i]);
    let penalty_free = DMatrix::from_fn(nf, nf, |i, j| penalty[(free[i], free[j])]);
    let penalty_shift = penalty * &pinned;

    let lhs = design_free.transpose() * &weighted + penalty_free;
    let rhs = weighted.transpose() * shifted
        - DVector::from_iterator(nf, free.iter().map(|&j| penalty_shift[j]));

    let x = lhs.lu().solve(&rhs).ok_or(MathError::SingularMatrix)?;
    for (k, &j) in free.iter().enumerate() {
        solution[j] = x[k];
    }
    Ok(solution)
}

/// Builds `Σ λ_k D_kᵀ D_k` for the first-difference operator over `n`
/// unknowns, with one weight per difference (`n - 1` weights).
pub fn first_difference_penalty(n: usize, weights: &[f64]) -> MathResult<DMatrix<f64>> {
    if n < 2 {
        return Ok(DMatrix::zeros(n, n));
    }
    if weights.len() != n - 1 {
        return Err(MathError::dimension_mismatch(n - 1, weights.len()));
    }
    let mut p = DMatrix::zeros(n, n);
    for (k, lambda) in weights.iter().enumerate() {
        // Row of D: -1 at k, +1 at k + 1.
        p[(k, k)] += lambda;
        p[(k + 1, k + 1)] += lambda;
        p[(k, k + 1)] -= lambda;
        p[(k + 1, k)] -= lambda;
    }
    Ok(p)
}

/// Builds `Σ λ_k D_kᵀ D_k` for the second-difference operator over `n`
/// unknowns, with one weight per interior node (`n - 2` weights).
pub fn second_difference_penalty(n: usize, weights: &[f64]) -> MathResult<DMatrix<f64>> {
    if n < 3 {
        return Ok(DMatrix::zeros(n, n));
    }
    if weights.len() != n - 2 {
        return Err(MathError::dimension_mismatch(n - 2, weights.len()));
    }
    let mut p = DMatrix::zeros(n, n);
    let stencil = [1.0, -2.0, 1.0];
    for (k, lambda) in weights.iter().enumerate() {
        for (a, ca) in stencil.iter().enumerate() {
            for (b, cb) in stencil.iter().enumerate() {
                p[(k + a, k + b)] += lambda * ca * cb;
            }
        }
    }
    Ok(p)
}
