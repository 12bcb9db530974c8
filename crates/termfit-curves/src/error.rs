//! Error types for curve calibration.
//!
//! Configuration problems are reported before any iterative work starts.
//! Convergence failures carry enough context ([`CalibrationFailure`]) to
//! locate the offending market quote in a large tenor set.

use std::fmt;

use serde::{Deserialize, Serialize};
use termfit_core::types::Date;
use termfit_core::CoreError;
use termfit_math::MathError;
use thiserror::Error;

/// A specialized Result type for curve operations.
pub type CurveResult<T> = Result<T, CurveError>;

/// Context attached to a tenor that could not be solved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationFailure {
    /// Name of the curve under calibration.
    pub curve: String,
    /// Name of the tenor that failed.
    pub tenor: String,
    /// Curve date the tenor anchors.
    pub curve_date: Date,
    /// Best curve value reached by the solver.
    pub best_value: f64,
    /// Pricing residual at `best_value`.
    pub residual: f64,
    /// Solver diagnostic.
    pub reason: String,
}

impl fmt::Display for CalibrationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "curve '{}' tenor '{}' ({}): best value {:.10}, residual {:.3e}: {}",
            self.curve, self.tenor, self.curve_date, self.best_value, self.residual, self.reason
        )
    }
}

/// A structural problem found by validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// What the issue is about (curve, tenor or parameter name).
    pub subject: String,
    /// Description of the problem.
    pub message: String,
}

impl ValidationIssue {
    /// Creates a new validation issue.
    #[must_use]
    pub fn new(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subject, self.message)
    }
}

/// Error types for curve operations.
#[derive(Error, Debug, Clone)]
pub enum CurveError {
    /// A tenor could not be solved.
    #[error("Calibration failed: {0}")]
    Calibration(Box<CalibrationFailure>),

    /// Configuration is inconsistent.
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Description of the problem.
        reason: String,
    },

    /// Validation found one or more structural problems.
    #[error("Validation failed with {} issue(s): {}", .0.len(), join_issues(.0))]
    Validation(Vec<ValidationIssue>),

    /// A required auxiliary curve is missing.
    #[error("Missing {role} curve")]
    MissingCurve {
        /// Role of the missing curve (discount, recovery, ...).
        role: String,
    },

    /// Projection curve selection did not resolve to exactly one curve.
    #[error("Projection curve '{requested}' matched {matches} of {available} curves")]
    AmbiguousProjection {
        /// Requested projection index, or `<unspecified>`.
        requested: String,
        /// Number of matching curves.
        matches: usize,
        /// Number of curves supplied.
        available: usize,
    },

    /// A pricer could not value its product.
    #[error("Pricing error: {reason}")]
    Pricing {
        /// Description of the pricing failure.
        reason: String,
    },

    /// Invalid value (NaN, Inf, or domain error).
    #[error("Invalid value: {reason}")]
    InvalidValue {
        /// Description of why value is invalid.
        reason: String,
    },

    /// Interpolation failed.
    #[error("Interpolation error: {reason}")]
    Interpolation {
        /// Description of the interpolation error.
        reason: String,
    },

    /// Numerical routine failed.
    #[error("Math error: {0}")]
    Math(#[from] MathError),

    /// Date arithmetic failed.
    #[error("Date error: {0}")]
    Core(#[from] CoreError),
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl CurveError {
    /// Creates a calibration failure error.
    #[must_use]
    pub fn calibration(failure: CalibrationFailure) -> Self {
        Self::Calibration(Box::new(failure))
    }

    /// Creates an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    /// Creates a missing curve error.
    #[must_use]
    pub fn missing_curve(role: impl Into<String>) -> Self {
        Self::MissingCurve { role: role.into() }
    }

    /// Creates a pricing error.
    #[must_use]
    pub fn pricing(reason: impl Into<String>) -> Self {
        Self::Pricing {
            reason: reason.into(),
        }
    }

    /// Creates an invalid value error.
    #[must_use]
    pub fn invalid_value(reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            reason: reason.into(),
        }
    }

    /// Creates an interpolation error.
    #[must_use]
    pub fn interpolation(reason: impl Into<String>) -> Self {
        Self::Interpolation {
            reason: reason.into(),
        }
    }

    /// Returns the calibration failure context, if this is one.
    #[must_use]
    pub fn as_calibration_failure(&self) -> Option<&CalibrationFailure> {
        match self {
            Self::Calibration(failure) => Some(failure),
            _ => None,
        }
    }

    /// Returns true for errors raised before iterative work begins.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfiguration { .. }
                | Self::Validation(_)
                | Self::MissingCurve { .. }
                | Self::AmbiguousProjection { .. }
        )
    }
}
