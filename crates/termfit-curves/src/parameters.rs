//! Model parameter vectors for parametric calibration.

use serde::{Deserialize, Serialize};
use termfit_math::optimization::Bounds;

use crate::error::{CurveError, CurveResult, ValidationIssue};

/// Named model parameters with bounds and per-parameter fit flags.
///
/// The values persist between fits and are the warm start for the next
/// one. Parameters with a cleared fit flag keep their value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterVector {
    names: Vec<String>,
    values: Vec<f64>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    fit: Vec<bool>,
}

impl ParameterVector {
    /// Creates a parameter vector. Lengths are checked by [`Self::validate`],
    /// not here, so that a calibrator can report every problem at once.
    #[must_use]
    pub fn new(
        names: Vec<String>,
        values: Vec<f64>,
        lower: Vec<f64>,
        upper: Vec<f64>,
        fit: Vec<bool>,
    ) -> Self {
        Self {
            names,
            values,
            lower,
            upper,
            fit,
        }
    }

    /// Parameter names.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Current values.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
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

    /// Value of a named parameter.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .and_then(|i| self.values.get(i).copied())
    }

    /// Sets whether a named parameter takes part in the fit.
    pub fn set_fit(&mut self, name: &str, fit: bool) -> CurveResult<()> {
        let index = self
            .names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| CurveError::invalid_config(format!("unknown parameter '{name}'")))?;
        match self.fit.get_mut(index) {
            Some(flag) => {
                *flag = fit;
                Ok(())
            }
            None => Err(CurveError::invalid_config(format!(
                "parameter '{name}' has no fit flag"
            ))),
        }
    }

    /// Sets a named parameter's value.
    pub fn set_value(&mut self, name: &str, value: f64) -> CurveResult<()> {
        let index = self
            .names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| CurveError::invalid_config(format!("unknown parameter '{name}'")))?;
        match self.values.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(CurveError::invalid_config(format!(
                "parameter '{name}' has no value"
            ))),
        }
    }

    /// Number of parameters flagged for fitting.
    #[must_use]
    pub fn fitted_count(&self) -> usize {
        self.fit.iter().filter(|f| **f).count()
    }

    /// Appends length and bound problems.
    pub fn validate(&self, issues: &mut Vec<ValidationIssue>) {
        let before = issues.len();
        let n = self.values.len();
        for (label, len) in [
            ("names", self.names.len()),
            ("lower bounds", self.lower.len()),
            ("upper bounds", self.upper.len()),
            ("fit flags", self.fit.len()),
        ] {
            if len != n {
                issues.push(ValidationIssue::new(
                    "parameters",
                    format!("{label} has length {len}, expected {n}"),
                ));
            }
        }
        if issues.len() > before {
            return;
        }
        for i in 0..n {
            let (lo, hi) = (self.lower[i], self.upper[i]);
            if !lo.is_finite() || !hi.is_finite() || lo > hi {
                issues.push(ValidationIssue::new(
                    &self.names[i],
                    format!("invalid bounds [{lo}, {hi}]"),
                ));
            }
            if !self.values[i].is_finite() {
                issues.push(ValidationIssue::new(&self.names[i], "value is not finite"));
            }
        }
    }

    /// Fails with a configuration error if the arrays are inconsistent.
    pub fn ensure_consistent(&self) -> CurveResult<()> {
        let mut issues = Vec::new();
        self.validate(&mut issues);
        match issues.into_iter().next() {
            Some(issue) => Err(CurveError::invalid_config(issue.to_string())),
            None => Ok(()),
        }
    }

    /// Extracts the fitted parameters and their bounds.
    pub fn reduce(&self) -> CurveResult<(Vec<f64>, Bounds)> {
        self.ensure_consistent()?;
        let selected: Vec<usize> = (0..self.values.len()).filter(|&i| self.fit[i]).collect();
        let start = selected.iter().map(|&i| self.values[i]).collect();
        let bounds = Bounds::new(
            selected.iter().map(|&i| self.lower[i]).collect(),
            selected.iter().map(|&i| self.upper[i]).collect(),
        )?;
        Ok((start, bounds))
    }

    /// Full parameter vector with the fitted entries replaced by `reduced`.
    #[must_use]
    pub fn expand(&self, reduced: &[f64]) -> Vec<f64> {
        let mut full = self.values.clone();
        let slots = full
            .iter_mut()
            .zip(self.fit.iter())
            .filter_map(|(v, f)| f.then_some(v));
        for (slot, value) in slots.zip(reduced) {
            *slot = *value;
        }
        full
    }

    /// Writes an optimizer result back, leaving unfitted entries untouched.
    pub fn apply(&mut self, reduced: &[f64]) {
        self.values = self.expand(reduced);
    }
}
