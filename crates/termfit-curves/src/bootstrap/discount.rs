//! Discount curve bootstrap.

use termfit_core::types::Date;

use super::{model_time, run_bootstrap, validate_curve_dates, BootstrapModel};
use crate::calibrator::{
    scoped_curve, validate_settlement, Calibrator, CloneScope, FitReport, FitState, Pricer,
    TenorContext,
};
use crate::config::CalibrationConfig;
use crate::curve::{Curve, ExtrapolationMethod, InterpolationMethod, SharedCurve};
use crate::error::{CurveResult, ValidationIssue};
use crate::products::{DiscountPricer, DiscountProduct};
use crate::tenor::CurveTenor;

/// Bootstraps discount factors from money-market notes and zero-coupon
/// bonds.
///
/// Discount factors are interpolated log-linearly (piecewise-flat forward
/// rates) and extrapolated along the last forward. An optional overlay
/// curve multiplies every discount factor the pricers see; isolate it with
/// an [`OverlayIsolation`](crate::overlay::OverlayIsolation) hook when the
/// overlay is itself defined relative to this curve.
///
/// Money-market notes starting on or before the last solved point are
/// solved in closed form; every other tenor is root-found.
#[derive(Debug, Clone)]
pub struct DiscountCalibrator {
    as_of: Date,
    settlement: Date,
    config: CalibrationConfig,
    overlay: Option<SharedCurve>,
}

impl DiscountCalibrator {
    /// Lowest admissible discount factor.
    pub const MIN_DISCOUNT_FACTOR: f64 = 1e-10;

    /// Highest admissible discount factor.
    pub const MAX_DISCOUNT_FACTOR: f64 = 5.0;

    /// Creates a calibrator with default settings, settling on the as-of date.
    #[must_use]
    pub fn new(as_of: Date) -> Self {
        Self {
            as_of,
            settlement: as_of,
            config: CalibrationConfig::default(),
            overlay: None,
        }
    }

    /// Sets the settlement date.
    #[must_use]
    pub fn with_settlement(mut self, settlement: Date) -> Self {
        self.settlement = settlement;
        self
    }

    /// Sets the calibration settings.
    #[must_use]
    pub fn with_config(mut self, config: CalibrationConfig) -> Self {
        self.config = config;
        self
    }

    /// Attaches a multiplicative overlay curve.
    #[must_use]
    pub fn with_overlay(mut self, overlay: SharedCurve) -> Self {
        self.overlay = Some(overlay);
        self
    }

    /// The overlay curve, if any.
    #[must_use]
    pub fn overlay(&self) -> Option<&SharedCurve> {
        self.overlay.as_ref()
    }

    fn overlay_value(&self, date: Date) -> CurveResult<f64> {
        match &self.overlay {
            Some(overlay) => overlay.read().interpolate(date),
            None => Ok(1.0),
        }
    }
}

impl Calibrator for DiscountCalibrator {
    type Product = DiscountProduct;

    fn as_of(&self) -> Date {
        self.as_of
    }

    fn settlement(&self) -> Date {
        self.settlement
    }

    fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    fn empty_curve(&self) -> Curve {
        Curve::new(InterpolationMethod::LogLinear, ExtrapolationMethod::Linear)
    }

    fn pricer<'a>(
        &'a self,
        curve: &'a Curve,
        product: &'a DiscountProduct,
    ) -> CurveResult<Box<dyn Pricer + 'a>> {
        Ok(Box::new(DiscountPricer::with_overlay(
            curve,
            self.overlay.as_ref(),
            product,
        )))
    }

    fn validate(&self, tenors: &[CurveTenor<DiscountProduct>], issues: &mut Vec<ValidationIssue>) {
        if let Some(overlay) = &self.overlay {
            if overlay.read().is_empty() {
                issues.push(ValidationIssue::new("overlay", "overlay curve has no points"));
            }
        }
        validate_settlement(self.as_of, self.settlement, issues);
        validate_curve_dates(self.settlement, tenors, issues);
    }

    fn fit_from(
        &mut self,
        state: FitState<'_, DiscountProduct>,
        from: usize,
    ) -> CurveResult<FitReport> {
        run_bootstrap(&*self, state, from)
    }

    fn supports_partial_refit(&self) -> bool {
        true
    }

    fn deep_clone(&self, scope: CloneScope) -> Self {
        Self {
            overlay: self.overlay.as_ref().map(|o| scoped_curve(o, scope)),
            ..self.clone()
        }
    }
}

impl BootstrapModel for DiscountCalibrator {
    fn value_limits(&self) -> (f64, f64) {
        (Self::MIN_DISCOUNT_FACTOR, Self::MAX_DISCOUNT_FACTOR)
    }

    fn initial_bracket(&self, context: &TenorContext<'_, DiscountProduct>) -> (f64, f64) {
        let (previous_date, previous) = context.previous;
        let dt = model_time(previous_date, context.tenor.curve_date).max(1.0 / 365.0);
        (previous * (-0.10 * dt).exp(), previous * (0.01 * dt).exp())
    }

    fn closed_form(
        &self,
        curve: &Curve,
        context: &TenorContext<'_, DiscountProduct>,
    ) -> CurveResult<Option<f64>> {
        let DiscountProduct::MoneyMarket(note) = context.product else {
            return Ok(None);
        };
        if note.maturity != context.tenor.curve_date || note.start > context.previous.0 {
            return Ok(None);
        }
        // price = growth × DF(maturity) / DF(start), with DF = base × overlay
        let df_start = curve.interpolate(note.start)? * self.overlay_value(note.start)?;
        let overlay_end = self.overlay_value(note.maturity)?;
        Ok(Some(
            context.target * df_start / (note.growth() * overlay_end),
        ))
    }
}
