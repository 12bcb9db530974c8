//! Cox-Ingersoll-Ross short-rate model.

use termfit_core::types::Date;

use super::{run_global, ParametricModel};
use crate::bootstrap::model_time;
use crate::calibrator::{
    validate_settlement, Calibrator, CloneScope, FitReport, FitState, Pricer,
};
use crate::config::CalibrationConfig;
use crate::curve::{Curve, ExtrapolationMethod, InterpolationMethod};
use crate::error::{CurveResult, ValidationIssue};
use crate::parameters::ParameterVector;
use crate::products::{DiscountPricer, DiscountProduct};
use crate::tenor::CurveTenor;

/// Zero-coupon bond price under CIR.
///
/// ```text
/// dr = a (b - r) dt + σ √r dW
///
/// P(t) = A(t) exp(-B(t) r0)
/// h    = √(a² + 2σ²)
/// A(t) = [2h exp((a + h) t / 2) / D]^(2ab / σ²)
/// B(t) = 2 (exp(h t) - 1) / D
/// D    = 2h + (a + h)(exp(h t) - 1)
/// ```
#[must_use]
pub fn cir_discount_factor(r0: f64, a: f64, b: f64, sigma: f64, t: f64) -> f64 {
    if t <= 0.0 {
        return 1.0;
    }
    let h = (a * a + 2.0 * sigma * sigma).sqrt();
    let growth = (h * t).exp_m1();
    let denominator = 2.0 * h + (a + h) * growth;
    let big_a = (2.0 * h * ((a + h) * t / 2.0).exp() / denominator)
        .powf(2.0 * a * b / (sigma * sigma));
    let big_b = 2.0 * growth / denominator;
    big_a * (-big_b * r0).exp()
}

/// Fits CIR parameters `r0`, `a`, `b`, `sigma` to discount products.
///
/// The curve holds CIR discount factors on the pricing grid, interpolated
/// log-linearly.
#[derive(Debug, Clone)]
pub struct CirCalibrator {
    as_of: Date,
    settlement: Date,
    config: CalibrationConfig,
    parameters: ParameterVector,
}

impl CirCalibrator {
    /// Parameter names, in vector order.
    pub const PARAMETERS: [&'static str; 4] = ["r0", "a", "b", "sigma"];

    /// Creates a calibrator with a neutral starting point; every parameter
    /// is fitted.
    #[must_use]
    pub fn new(as_of: Date) -> Self {
        let parameters = ParameterVector::new(
            Self::PARAMETERS.iter().map(|n| (*n).to_string()).collect(),
            vec![0.02, 0.3, 0.04, 0.1],
            vec![0.0, 0.01, 0.0, 1e-4],
            vec![0.2, 3.0, 0.2, 1.0],
            vec![true; 4],
        );
        Self {
            as_of,
            settlement: as_of,
            config: CalibrationConfig::default(),
            parameters,
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

    /// Replaces the parameter vector.
    #[must_use]
    pub fn with_parameters(mut self, parameters: ParameterVector) -> Self {
        self.parameters = parameters;
        self
    }
}

impl Calibrator for CirCalibrator {
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
        Ok(Box::new(DiscountPricer::new(curve, product)))
    }

    fn validate(&self, tenors: &[CurveTenor<DiscountProduct>], issues: &mut Vec<ValidationIssue>) {
        validate_settlement(self.as_of, self.settlement, issues);
        for tenor in tenors.iter().filter(|t| t.is_active()) {
            if tenor.curve_date <= self.settlement {
                issues.push(ValidationIssue::new(
                    &tenor.name,
                    format!("curve date {} must be after {}", tenor.curve_date, self.settlement),
                ));
            }
        }
        self.parameters.validate(issues);
        if self.parameters.names() != Self::PARAMETERS {
            issues.push(ValidationIssue::new(
                "parameters",
                format!("expected parameters {:?}", Self::PARAMETERS),
            ));
        }
        if self.parameters.lower().get(3).is_some_and(|lo| *lo <= 0.0) {
            issues.push(ValidationIssue::new("sigma", "lower bound must be positive"));
        }
    }

    fn fit_from(
        &mut self,
        state: FitState<'_, DiscountProduct>,
        _from: usize,
    ) -> CurveResult<FitReport> {
        run_global(self, state)
    }

    fn deep_clone(&self, _scope: CloneScope) -> Self {
        self.clone()
    }
}

impl ParametricModel for CirCalibrator {
    fn parameters(&self) -> &ParameterVector {
        &self.parameters
    }

    fn parameters_mut(&mut self) -> &mut ParameterVector {
        &mut self.parameters
    }

    fn model_value(&self, parameters: &[f64], date: Date) -> f64 {
        match parameters {
            [r0, a, b, sigma] => {
                cir_discount_factor(*r0, *a, *b, *sigma, model_time(self.as_of, date))
            }
            _ => f64::NAN,
        }
    }
}
