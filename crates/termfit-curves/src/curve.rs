//! Date-keyed curve of calibrated values.
//!
//! A [`Curve`] stores `(date, value)` points in strictly increasing date
//! order and evaluates any date through its interpolation and extrapolation
//! policy. Time between points is measured in calendar days.
//!
//! Auxiliary curves that several calibrators read are shared as
//! [`SharedCurve`]. Mutating a shared curve while another fit reads it is
//! the caller's responsibility to avoid.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use termfit_core::types::{Currency, Date};

use crate::error::{CurveError, CurveResult};

/// A curve shared between calibrators.
pub type SharedCurve = Arc<RwLock<Curve>>;

/// Interpolation between neighbouring points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum InterpolationMethod {
    /// Linear in value.
    #[default]
    Linear,

    /// Linear in the logarithm of the value. Requires positive values.
    /// Piecewise-constant forward (or hazard) rates for discount factors
    /// (or survival probabilities).
    LogLinear,
}

/// Evaluation outside the first and last points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ExtrapolationMethod {
    /// Hold the end value.
    #[default]
    Flat,

    /// Extend the end segment in interpolation space.
    Linear,
}

/// An ordered, date-keyed value series.
///
/// # Example
///
/// ```rust
/// use termfit_core::types::Date;
/// use termfit_curves::curve::{Curve, ExtrapolationMethod, InterpolationMethod};
///
/// let mut curve = Curve::new(InterpolationMethod::LogLinear, ExtrapolationMethod::Linear);
/// let d0 = Date::from_ymd(2025, 1, 1).unwrap();
/// curve.add(d0, 1.0).unwrap();
/// curve.add(d0.add_days(365), 0.95).unwrap();
///
/// let mid = curve.interpolate(d0.add_days(73)).unwrap();
/// assert!(mid < 1.0 && mid > 0.95);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    name: String,
    currency: Option<Currency>,
    points: Vec<(Date, f64)>,
    interpolation: InterpolationMethod,
    extrapolation: ExtrapolationMethod,
}

impl Curve {
    /// Creates an empty curve with no identity.
    #[must_use]
    pub fn new(interpolation: InterpolationMethod, extrapolation: ExtrapolationMethod) -> Self {
        Self {
            name: String::new(),
            currency: None,
            points: Vec::new(),
            interpolation,
            extrapolation,
        }
    }

    /// Creates a curve from points, which must be strictly increasing in
    /// date and finite.
    pub fn from_points(
        points: Vec<(Date, f64)>,
        interpolation: InterpolationMethod,
        extrapolation: ExtrapolationMethod,
    ) -> CurveResult<Self> {
        let mut curve = Self::new(interpolation, extrapolation);
        for (date, value) in points {
            if curve.last_date().is_some_and(|last| date <= last) {
                return Err(CurveError::invalid_value(format!(
                    "points must be strictly increasing in date (at {date})"
                )));
            }
            curve.add(date, value)?;
        }
        Ok(curve)
    }

    /// Sets the identity metadata.
    #[must_use]
    pub fn with_identity(mut self, name: impl Into<String>, currency: Currency) -> Self {
        self.set_identity(name, currency);
        self
    }

    /// Wraps the curve for sharing between calibrators.
    #[must_use]
    pub fn into_shared(self) -> SharedCurve {
        Arc::new(RwLock::new(self))
    }

    /// Curve name; empty until identity is assigned.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Curve currency, once identity is assigned.
    #[must_use]
    pub fn currency(&self) -> Option<Currency> {
        self.currency
    }

    /// Replaces the identity metadata.
    pub fn set_identity(&mut self, name: impl Into<String>, currency: Currency) {
        self.name = name.into();
        self.currency = Some(currency);
    }

    /// Interpolation policy.
    #[must_use]
    pub fn interpolation(&self) -> InterpolationMethod {
        self.interpolation
    }

    /// Extrapolation policy.
    #[must_use]
    pub fn extrapolation(&self) -> ExtrapolationMethod {
        self.extrapolation
    }

    /// All points in date order.
    #[must_use]
    pub fn points(&self) -> &[(Date, f64)] {
        &self.points
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true if the curve has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Date of the last point.
    #[must_use]
    pub fn last_date(&self) -> Option<Date> {
        self.points.last().map(|(d, _)| *d)
    }

    /// Last point.
    #[must_use]
    pub fn last_point(&self) -> Option<(Date, f64)> {
        self.points.last().copied()
    }

    /// Inserts a point, replacing any existing value at the same date.
    pub fn add(&mut self, date: Date, value: f64) -> CurveResult<()> {
        if !value.is_finite() {
            return Err(CurveError::invalid_value(format!(
                "non-finite curve value {value} at {date}"
            )));
        }
        match self.points.binary_search_by(|(d, _)| d.cmp(&date)) {
            Ok(index) => self.points[index].1 = value,
            Err(index) => self.points.insert(index, (date, value)),
        }
        Ok(())
    }

    /// Removes every point.
    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Removes every point strictly after `date`.
    pub fn truncate_after(&mut self, date: Date) {
        let keep = self.points.partition_point(|(d, _)| *d <= date);
        self.points.truncate(keep);
    }

    /// Sets every existing point to `value`, keeping the dates.
    pub fn set_constant(&mut self, value: f64) {
        for point in &mut self.points {
            point.1 = value;
        }
    }

    /// Overwrites the values of the existing points in order.
    pub fn set_values(&mut self, values: &[f64]) -> CurveResult<()> {
        if values.len() != self.points.len() {
            return Err(CurveError::invalid_value(format!(
                "expected {} values, got {}",
                self.points.len(),
                values.len()
            )));
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(CurveError::invalid_value(format!("non-finite curve value {bad}")));
        }
        for (point, value) in self.points.iter_mut().zip(values) {
            point.1 = *value;
        }
        Ok(())
    }

    /// Evaluates the curve at `date`.
    pub fn interpolate(&self, date: Date) -> CurveResult<f64> {
        let n = self.points.len();
        match n {
            0 => {
                return Err(CurveError::interpolation(format!(
                    "curve '{}' has no points",
                    self.name
                )))
            }
            1 => return Ok(self.points[0].1),
            _ => {}
        }

        let index = self.points.partition_point(|(d, _)| *d < date);
        if index < n && self.points[index].0 == date {
            return Ok(self.points[index].1);
        }

        let segment = if index == 0 {
            match self.extrapolation {
                ExtrapolationMethod::Flat => return Ok(self.points[0].1),
                ExtrapolationMethod::Linear => 1,
            }
        } else if index == n {
            match self.extrapolation {
                ExtrapolationMethod::Flat => return Ok(self.points[n - 1].1),
                ExtrapolationMethod::Linear => n - 1,
            }
        } else {
            index
        };

        let (d0, v0) = self.points[segment - 1];
        let (d1, v1) = self.points[segment];
        let w = d0.days_between(&date) as f64 / d0.days_between(&d1) as f64;

        match self.interpolation {
            InterpolationMethod::Linear => Ok(v0 + w * (v1 - v0)),
            InterpolationMethod::LogLinear => {
                if v0 <= 0.0 || v1 <= 0.0 {
                    return Err(CurveError::interpolation(format!(
                        "log-linear interpolation needs positive values, got {v0} and {v1}"
                    )));
                }
                Ok(v0 * (v1 / v0).powf(w))
            }
        }
    }
}
