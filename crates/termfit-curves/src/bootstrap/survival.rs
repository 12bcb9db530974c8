//! Survival curve bootstrap from CDS quotes.

use termfit_core::types::Date;

use super::{model_time, run_bootstrap, validate_curve_dates, BootstrapModel};
use crate::calibrator::{
    scoped_curve, validate_settlement, Calibrator, CloneScope, FitReport, FitState, Pricer,
    TenorContext,
};
use crate::config::CalibrationConfig;
use crate::curve::{Curve, ExtrapolationMethod, InterpolationMethod, SharedCurve};
use crate::error::{CurveError, CurveResult, ValidationIssue};
use crate::products::{CdsPricer, CreditDefaultSwap, Recovery};
use crate::tenor::CurveTenor;

/// Bootstraps survival probabilities from par-spread or upfront CDS quotes.
///
/// Survival probabilities are interpolated log-linearly, so each segment
/// carries a constant hazard rate. Solved values are capped at one.
#[derive(Debug, Clone)]
pub struct SurvivalCalibrator {
    as_of: Date,
    settlement: Date,
    config: CalibrationConfig,
    discount: Option<SharedCurve>,
    recovery: Recovery,
}

impl SurvivalCalibrator {
    /// Lowest admissible survival probability.
    pub const MIN_SURVIVAL: f64 = 1e-12;

    /// Creates a calibrator with 40% recovery and no discount curve.
    #[must_use]
    pub fn new(as_of: Date) -> Self {
        Self {
            as_of,
            settlement: as_of,
            config: CalibrationConfig::default(),
            discount: None,
            recovery: Recovery::default(),
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

    /// Sets the discount curve.
    #[must_use]
    pub fn with_discount(mut self, discount: SharedCurve) -> Self {
        self.discount = Some(discount);
        self
    }

    /// Sets the recovery assumption.
    #[must_use]
    pub fn with_recovery(mut self, recovery: Recovery) -> Self {
        self.recovery = recovery;
        self
    }

    /// The discount curve, if set.
    #[must_use]
    pub fn discount(&self) -> Option<&SharedCurve> {
        self.discount.as_ref()
    }

    /// The recovery assumption.
    #[must_use]
    pub fn recovery(&self) -> &Recovery {
        &self.recovery
    }
}

impl Calibrator for SurvivalCalibrator {
    type Product = CreditDefaultSwap;

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
        product: &'a CreditDefaultSwap,
    ) -> CurveResult<Box<dyn Pricer + 'a>> {
        let discount = self
            .discount
            .as_ref()
            .ok_or_else(|| CurveError::missing_curve("discount"))?;
        Ok(Box::new(CdsPricer::new(
            curve,
            discount,
            &self.recovery,
            product,
        )))
    }

    fn validate(&self, tenors: &[CurveTenor<CreditDefaultSwap>], issues: &mut Vec<ValidationIssue>) {
        match &self.discount {
            None => issues.push(ValidationIssue::new("discount", "missing discount curve")),
            Some(curve) if curve.read().is_empty() => {
                issues.push(ValidationIssue::new("discount", "discount curve has no points"));
            }
            Some(_) => {}
        }
        match &self.recovery {
            Recovery::Rate(rate) if !(0.0..1.0).contains(rate) => issues.push(
                ValidationIssue::new("recovery", format!("recovery rate {rate} outside [0, 1)")),
            ),
            Recovery::Curve(curve) if curve.read().is_empty() => {
                issues.push(ValidationIssue::new("recovery", "recovery curve has no points"));
            }
            _ => {}
        }
        validate_settlement(self.as_of, self.settlement, issues);
        validate_curve_dates(self.settlement, tenors, issues);
    }

    fn fit_from(
        &mut self,
        state: FitState<'_, CreditDefaultSwap>,
        from: usize,
    ) -> CurveResult<FitReport> {
        run_bootstrap(&*self, state, from)
    }

    fn supports_partial_refit(&self) -> bool {
        true
    }

    fn deep_clone(&self, scope: CloneScope) -> Self {
        Self {
            as_of: self.as_of,
            settlement: self.settlement,
            config: self.config.clone(),
            discount: self.discount.as_ref().map(|d| scoped_curve(d, scope)),
            recovery: self.recovery.scoped_clone(scope),
        }
    }
}

impl BootstrapModel for SurvivalCalibrator {
    fn value_limits(&self) -> (f64, f64) {
        (Self::MIN_SURVIVAL, 1.0)
    }

    fn initial_bracket(&self, context: &TenorContext<'_, CreditDefaultSwap>) -> (f64, f64) {
        let (previous_date, previous) = context.previous;
        let dt = model_time(previous_date, context.tenor.curve_date).max(1.0 / 365.0);
        (previous * (-0.5 * dt).exp(), previous)
    }
}
