//! Calibration configuration.
//!
//! All settings are explicit and fixed when a calibrator is constructed;
//! nothing is read from ambient state during a fit.

use serde::{Deserialize, Serialize};

use crate::error::{CurveError, CurveResult, ValidationIssue};

// =============================================================================
// POLICY ENUMS
// =============================================================================

/// What to do when a bootstrapped point implies a negative forward rate or
/// hazard rate (a curve value above the previous one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum NegativeTreatment {
    /// Keep the solved value.
    #[default]
    Allow,

    /// Reset the point to the previous value, giving a zero forward over
    /// the interval.
    Zero,

    /// Reserved. Currently takes no action.
    Adjust,
}

/// Minimizer used by parametric calibrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OptimizerMethod {
    /// Bounded Nelder-Mead simplex.
    #[default]
    NelderMead,

    /// Bounded quasi-Newton with numerical gradients.
    ProjectedBfgs,
}

/// Global fit method for cashflow calibrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CashflowFitMethod {
    /// Exact sequential solve, one node per instrument.
    #[default]
    Bootstrap,

    /// Weighted least squares with slope and curvature penalties.
    Smoothed,
}

// =============================================================================
// CALIBRATION CONFIGURATION
// =============================================================================

/// Settings shared by every calibration strategy.
///
/// # Example
///
/// ```rust
/// use termfit_curves::config::{CalibrationConfig, NegativeTreatment};
///
/// let config = CalibrationConfig::from_json(r#"{ "force_fit": true }"#).unwrap();
/// assert!(config.force_fit);
/// assert_eq!(config.negative_treatment, NegativeTreatment::Allow);
/// assert_eq!(config.max_iterations, 500);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Root-finder tolerance on the solved curve value.
    pub tolerance_x: f64,

    /// Tolerance on the pricing residual.
    pub tolerance_f: f64,

    /// Iteration budget for root finding and optimization.
    pub max_iterations: usize,

    /// Objective evaluation budget for optimization.
    pub max_evaluations: usize,

    /// Handling of negative implied forwards during bootstrap.
    pub negative_treatment: NegativeTreatment,

    /// Permit perturbing an unsolvable tenor's quote instead of failing.
    pub force_fit: bool,

    /// Number of equal steps used to walk a forced quote toward the
    /// previous tenor's quote.
    pub max_force_steps: u32,

    /// Outward bracket expansions attempted before a tenor fails.
    pub max_bracket_expansions: u32,

    /// Spacing of the parametric pricing grid, in months.
    pub grid_step_months: u32,

    /// Length of the parametric pricing grid, in years.
    pub grid_years: u32,

    /// Minimizer for parametric calibration.
    pub optimizer: OptimizerMethod,

    /// Fit method for cashflow calibration.
    pub cashflow_method: CashflowFitMethod,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            tolerance_x: 1e-12,
            tolerance_f: 1e-10,
            max_iterations: 500,
            max_evaluations: 5000,
            negative_treatment: NegativeTreatment::Allow,
            force_fit: false,
            max_force_steps: 10,
            max_bracket_expansions: 40,
            grid_step_months: 3,
            grid_years: 30,
            optimizer: OptimizerMethod::NelderMead,
            cashflow_method: CashflowFitMethod::Bootstrap,
        }
    }
}

impl CalibrationConfig {
    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> CurveResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CurveError::invalid_config(format!("malformed configuration: {e}")))?;
        config.ensure_valid()?;
        Ok(config)
    }

    /// Sets both root-finder tolerances.
    #[must_use]
    pub fn with_tolerances(mut self, tolerance_x: f64, tolerance_f: f64) -> Self {
        self.tolerance_x = tolerance_x;
        self.tolerance_f = tolerance_f;
        self
    }

    /// Sets the iteration and evaluation budgets.
    #[must_use]
    pub fn with_budget(mut self, max_iterations: usize, max_evaluations: usize) -> Self {
        self.max_iterations = max_iterations;
        self.max_evaluations = max_evaluations;
        self
    }

    /// Sets the negative-value treatment.
    #[must_use]
    pub fn with_negative_treatment(mut self, treatment: NegativeTreatment) -> Self {
        self.negative_treatment = treatment;
        self
    }

    /// Enables or disables forced fitting.
    #[must_use]
    pub fn with_force_fit(mut self, force_fit: bool) -> Self {
        self.force_fit = force_fit;
        self
    }

    /// Sets the parametric pricing grid.
    #[must_use]
    pub fn with_grid(mut self, step_months: u32, years: u32) -> Self {
        self.grid_step_months = step_months;
        self.grid_years = years;
        self
    }

    /// Sets the parametric minimizer.
    #[must_use]
    pub fn with_optimizer(mut self, optimizer: OptimizerMethod) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Sets the cashflow fit method.
    #[must_use]
    pub fn with_cashflow_method(mut self, method: CashflowFitMethod) -> Self {
        self.cashflow_method = method;
        self
    }

    /// Returns every problem with the configuration.
    #[must_use]
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let subject = "config";

        if !(self.tolerance_x.is_finite() && self.tolerance_x > 0.0) {
            issues.push(ValidationIssue::new(subject, "tolerance_x must be positive"));
        }
        if !(self.tolerance_f.is_finite() && self.tolerance_f > 0.0) {
            issues.push(ValidationIssue::new(subject, "tolerance_f must be positive"));
        }
        if self.max_iterations == 0 {
            issues.push(ValidationIssue::new(subject, "max_iterations must be at least 1"));
        }
        if self.max_evaluations == 0 {
            issues.push(ValidationIssue::new(subject, "max_evaluations must be at least 1"));
        }
        if self.force_fit && self.max_force_steps == 0 {
            issues.push(ValidationIssue::new(
                subject,
                "max_force_steps must be at least 1 when force_fit is enabled",
            ));
        }
        if self.grid_step_months == 0 {
            issues.push(ValidationIssue::new(subject, "grid_step_months must be at least 1"));
        }
        if self.grid_years == 0 {
            issues.push(ValidationIssue::new(subject, "grid_years must be at least 1"));
        }

        issues
    }

    /// Fails with the first configuration problem, if any.
    pub fn ensure_valid(&self) -> CurveResult<()> {
        match self.validate().into_iter().next() {
            Some(issue) => Err(CurveError::invalid_config(issue.to_string())),
            None => Ok(()),
        }
    }
}
