//! # Termfit Math
//!
//! Numerical building blocks for the Termfit calibration engine.
//!
//! This crate provides:
//!
//! - **Solvers**: Brent root finding with separate tolerances on the solved
//!   value and on the residual, plus outward bracket search
//! - **Optimization**: Bounded Nelder-Mead simplex and projected BFGS
//! - **Least Squares**: Penalized weighted normal equations
//!
//! Every routine is deterministic: the same inputs and starting point always
//! produce the same sequence of function evaluations.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::similar_names)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::uninlined_format_args)]

pub mod error;
pub mod least_squares;
pub mod optimization;
pub mod solvers;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{MathError, MathResult};
    pub use crate::least_squares::{
        first_difference_penalty, penalized_least_squares, penalized_least_squares_with_fixed,
        second_difference_penalty,
    };
    pub use crate::optimization::{
        nelder_mead, projected_bfgs, Bounds, OptimizationResult, OptimizerConfig, Termination,
    };
    pub use crate::solvers::{
        brent, expand_bracket, BrentSolver, RootFinder, SolverConfig, SolverResult,
    };
}

pub use error::{MathError, MathResult};
