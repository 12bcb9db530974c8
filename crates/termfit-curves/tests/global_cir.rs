//! Integration tests: CIR calibration to zero-coupon yields.
//!
//! Yields are generated from r0 = 3%, a = 0.5, b = 5%, σ = 0.1 at the 1Y,
//! 5Y and 10Y points, with σ held fixed during the fit.

use approx::assert_relative_eq;
use termfit_core::daycounts::DayCountConvention;
use termfit_core::types::{Currency, Date};
use termfit_curves::prelude::*;

const TRUE_PARAMETERS: [f64; 4] = [0.03, 0.5, 0.05, 0.1];

fn as_of() -> Date {
    Date::from_ymd(2025, 1, 15).unwrap()
}

fn cir_zero(months: i32) -> CurveTenor<DiscountProduct> {
    let maturity = as_of().add_months(months).unwrap();
    let t = DayCountConvention::Act365Fixed.year_fraction(as_of(), maturity);
    let [r0, a, b, sigma] = TRUE_PARAMETERS;
    let price = cir_discount_factor(r0, a, b, sigma, t);
    CurveTenor::new(
        format!("{}Y", months / 12),
        DiscountProduct::from(ZeroCouponBond::new(as_of(), maturity)),
        -price.ln() / t,
        QuoteConvention::ContinuousYield,
    )
}

fn cir_curve(calibrator: CirCalibrator) -> CalibratedCurve<CirCalibrator> {
    CalibratedCurve::new(
        "USD-CIR",
        Currency::USD,
        CurveCategory::Parametric,
        calibrator,
        vec![cir_zero(12), cir_zero(60), cir_zero(120)],
    )
}

fn calibrator(optimizer: OptimizerMethod) -> CirCalibrator {
    let config = CalibrationConfig::default()
        .with_tolerances(1e-12, 1e-10)
        .with_optimizer(optimizer);
    let mut calibrator = CirCalibrator::new(as_of()).with_config(config);
    calibrator.parameters_mut().set_fit("sigma", false).unwrap();
    calibrator
}

#[test]
fn test_recovers_generating_parameters() {
    let mut curve = cir_curve(calibrator(OptimizerMethod::NelderMead));
    let report = curve.fit().unwrap();

    assert_eq!(report.status, FitStatus::Converged);
    assert!(report.evaluations > 0);
    assert!(report.max_abs_error() < 1e-8);
    assert!(report.objective.unwrap() < 1e-16);

    let fitted = curve.calibrator().parameters();
    for (name, expected) in CirCalibrator::PARAMETERS.iter().zip(TRUE_PARAMETERS) {
        assert_relative_eq!(fitted.get(name).unwrap(), expected, epsilon = 1e-4);
    }
    assert_eq!(fitted.get("sigma"), Some(0.1));
}

#[test]
fn test_fit_is_deterministic() {
    let mut first = cir_curve(calibrator(OptimizerMethod::NelderMead));
    let mut second = cir_curve(calibrator(OptimizerMethod::NelderMead));
    let a = first.fit().unwrap();
    let b = second.fit().unwrap();

    assert_eq!(a, b);
    assert_eq!(
        first.calibrator().parameters().values(),
        second.calibrator().parameters().values()
    );
    assert_eq!(first.curve().points(), second.curve().points());
}

#[test]
fn test_curve_is_written_on_the_pricing_grid() {
    let mut curve = cir_curve(calibrator(OptimizerMethod::NelderMead));
    curve.fit().unwrap();

    let points = curve.curve().points();
    // Quarterly grid over 30 years, tenor dates already on the grid.
    assert_eq!(points.len(), 121);
    assert_eq!(points[0], (as_of(), 1.0));
    assert!(points.windows(2).all(|w| w[1].1 < w[0].1));
}

#[test]
fn test_bounds_are_respected() {
    let mut calibrator = calibrator(OptimizerMethod::NelderMead);
    let parameters = ParameterVector::new(
        CirCalibrator::PARAMETERS.iter().map(|n| (*n).to_string()).collect(),
        vec![0.02, 0.3, 0.03, 0.1],
        vec![0.0, 0.01, 0.0, 1e-4],
        vec![0.2, 3.0, 0.04, 1.0],
        vec![true, true, true, false],
    );
    calibrator = calibrator.with_parameters(parameters);
    let mut curve = cir_curve(calibrator);

    curve.fit().unwrap();

    let fitted = curve.calibrator().parameters();
    for ((value, lo), hi) in fitted.values().iter().zip(fitted.lower()).zip(fitted.upper()) {
        assert!(value >= lo && value <= hi, "{value} outside [{lo}, {hi}]");
    }
    assert!(fitted.get("b").unwrap() <= 0.04);
}

#[test]
fn test_quasi_newton_respects_bounds() {
    let mut curve = cir_curve(calibrator(OptimizerMethod::ProjectedBfgs));
    let report = curve.fit().unwrap();

    assert_ne!(report.status, FitStatus::Failed);
    let fitted = curve.calibrator().parameters();
    for ((value, lo), hi) in fitted.values().iter().zip(fitted.lower()).zip(fitted.upper()) {
        assert!(value >= lo && value <= hi);
    }

    // Never worse than the starting point.
    let [r0, a, b, sigma] = [0.02, 0.3, 0.04, 0.1];
    let start_objective: f64 = curve
        .tenors()
        .iter()
        .map(|tenor| {
            let DiscountProduct::ZeroCoupon(bond) = &tenor.product else {
                panic!("expected a zero-coupon bond");
            };
            let t = bond.time_to_maturity();
            let target = (-tenor.market_quote * t).exp();
            (cir_discount_factor(r0, a, b, sigma, t) - target).powi(2)
        })
        .sum();
    assert!(report.objective.unwrap() <= start_objective);
}

#[test]
fn test_mismatched_parameter_arrays_fail_validation() {
    let parameters = ParameterVector::new(
        CirCalibrator::PARAMETERS.iter().map(|n| (*n).to_string()).collect(),
        vec![0.02, 0.3, 0.04, 0.1],
        vec![0.0, 0.01, 0.0],
        vec![0.2, 3.0, 0.2, 1.0],
        vec![true; 4],
    );
    let mut curve = cir_curve(CirCalibrator::new(as_of()).with_parameters(parameters));

    let err = curve.fit().unwrap_err();
    assert!(matches!(err, CurveError::Validation(_)));
    assert!(curve.curve().is_empty());
}

#[test]
fn test_validation_reports_tenor_and_bound_issues_together() {
    let parameters = ParameterVector::new(
        CirCalibrator::PARAMETERS.iter().map(|n| (*n).to_string()).collect(),
        vec![0.02, 0.3, 0.04, 0.1],
        vec![0.0, 0.01, 0.5, 1e-4],
        vec![0.2, 3.0, 0.2, 1.0],
        vec![true; 4],
    );
    let curve = CalibratedCurve::new(
        "USD-CIR",
        Currency::USD,
        CurveCategory::Parametric,
        CirCalibrator::new(as_of()).with_parameters(parameters),
        vec![cir_zero(12).with_weight(-1.0)],
    );

    let issues = curve.validate();

    assert!(issues.iter().any(|i| i.subject == "1Y"));
    assert!(issues.iter().any(|i| i.subject == "b"));
}

#[test]
fn test_tenors_settled_before_the_fit_are_rejected() {
    let settlement = as_of().add_months(24).unwrap();
    let mut curve = cir_curve(calibrator(OptimizerMethod::NelderMead).with_settlement(settlement));

    let err = curve.fit().unwrap_err();

    match err {
        CurveError::Validation(issues) => {
            let subjects: Vec<&str> = issues.iter().map(|i| i.subject.as_str()).collect();
            assert_eq!(subjects, ["1Y"]);
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(curve.curve().is_empty());
}

#[test]
fn test_no_active_tenors_skips_optimization() {
    let mut curve = CalibratedCurve::new(
        "USD-CIR",
        Currency::USD,
        CurveCategory::Parametric,
        CirCalibrator::new(as_of()),
        vec![cir_zero(12).with_weight(0.0)],
    );
    let report = curve.fit().unwrap();

    assert_eq!(report.status, FitStatus::Skipped);
    assert_eq!(report.evaluations, 0);
    assert_eq!(curve.calibrator().parameters().values(), &[0.02, 0.3, 0.04, 0.1]);
    assert!(!curve.curve().is_empty());
}
