//! Integration tests: sequential bootstrap of discount and survival curves.
//!
//! Market data (as of 15 January 2025):
//!
//! | Curve    | Tenors            | Quotes                      |
//! |----------|-------------------|-----------------------------|
//! | Discount | 3M / 6M / 1Y MM   | 2.00% / 2.50% / 3.00%       |
//! | Discount | 1Y..5Y zero bonds | continuous yields 3%..4%    |
//! | Survival | 1Y..10Y CDS       | flat 100bp, 40% recovery    |
//! | Survival | 1Y / 3Y / 5Y CDS  | 100bp / 3000bp / 1bp        |

use approx::assert_relative_eq;
use termfit_core::daycounts::DayCountConvention;
use termfit_core::types::{Currency, Date};
use termfit_curves::prelude::*;

/// Routes fit logs to the test harness; set `RUST_LOG=debug` to see them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn as_of() -> Date {
    Date::from_ymd(2025, 1, 15).unwrap()
}

fn years(t: i32) -> Date {
    as_of().add_years(t).unwrap()
}

fn note(months: i32, rate: f64) -> CurveTenor<DiscountProduct> {
    let maturity = as_of().add_months(months).unwrap();
    CurveTenor::new(
        format!("{months}M"),
        DiscountProduct::from(MoneyMarketNote::new(as_of(), maturity, 0.0)),
        rate,
        QuoteConvention::SimpleYield,
    )
}

fn zero(t: i32, continuous_yield: f64) -> CurveTenor<DiscountProduct> {
    CurveTenor::new(
        format!("{t}Y"),
        DiscountProduct::from(ZeroCouponBond::new(as_of(), years(t))),
        continuous_yield,
        QuoteConvention::ContinuousYield,
    )
}

fn zero_curve(config: CalibrationConfig) -> CalibratedCurve<DiscountCalibrator> {
    let tenors = vec![
        zero(1, 0.030),
        zero(2, 0.032),
        zero(3, 0.035),
        zero(4, 0.037),
        zero(5, 0.040),
    ];
    CalibratedCurve::new(
        "USD-ZERO",
        Currency::USD,
        CurveCategory::Discount,
        DiscountCalibrator::new(as_of()).with_config(config),
        tenors,
    )
}

/// Flat 5% continuously compounded discount curve.
fn flat_discount() -> SharedCurve {
    let points = (0..=15)
        .map(|t| {
            let date = years(t);
            let time = DayCountConvention::Act365Fixed.year_fraction(as_of(), date);
            (date, (-0.05 * time).exp())
        })
        .collect();
    Curve::from_points(
        points,
        InterpolationMethod::LogLinear,
        ExtrapolationMethod::Linear,
    )
    .unwrap()
    .into_shared()
}

fn cds(t: i32, spread: f64) -> CurveTenor<CreditDefaultSwap> {
    CurveTenor::new(
        format!("{t}Y"),
        CreditDefaultSwap::new(as_of(), years(t), 0.0),
        spread,
        QuoteConvention::ParSpread,
    )
}

fn survival_curve(
    tenors: Vec<CurveTenor<CreditDefaultSwap>>,
    config: CalibrationConfig,
) -> CalibratedCurve<SurvivalCalibrator> {
    let calibrator = SurvivalCalibrator::new(as_of())
        .with_discount(flat_discount())
        .with_recovery(Recovery::Rate(0.4))
        .with_config(config);
    CalibratedCurve::new("ACME", Currency::USD, CurveCategory::Survival, calibrator, tenors)
}

fn hazard_rates(curve: &Curve) -> Vec<f64> {
    curve
        .points()
        .windows(2)
        .map(|w| {
            let dt = DayCountConvention::Act365Fixed.year_fraction(w[0].0, w[1].0);
            -(w[1].1 / w[0].1).ln() / dt
        })
        .collect()
}

#[test]
fn test_money_market_notes_solve_in_closed_form() {
    let mut curve = CalibratedCurve::new(
        "USD-OIS",
        Currency::USD,
        CurveCategory::Discount,
        DiscountCalibrator::new(as_of()),
        vec![note(3, 0.02), note(6, 0.025), note(12, 0.03)],
    );

    let report = curve.fit().unwrap();

    assert_eq!(report.status, FitStatus::Converged);
    assert_eq!(report.iterations, 0);
    assert_eq!(curve.curve().len(), 4);
    for (tenor, (date, df)) in curve.tenors().iter().zip(&curve.curve().points()[1..]) {
        let tau = DayCountConvention::Act360.year_fraction(as_of(), *date);
        assert_relative_eq!(*df, 1.0 / (1.0 + tenor.market_quote * tau), epsilon = 1e-14);
        assert_relative_eq!(tenor.model_price.unwrap(), 1.0, epsilon = 1e-12);
    }
    assert!(!curve.flags().negative_found);
}

#[test]
fn test_zero_bonds_round_trip() {
    let mut curve = zero_curve(CalibrationConfig::default());
    let report = curve.fit().unwrap();

    assert_eq!(report.status, FitStatus::Converged);
    assert!(report.iterations > 0);
    assert_eq!(report.instrument_errors.len(), 5);
    assert!(report.max_abs_error() < 1e-9);
    for tenor in curve.tenors() {
        let DiscountProduct::ZeroCoupon(bond) = &tenor.product else {
            panic!("expected a zero-coupon bond");
        };
        let df = curve.curve().interpolate(bond.maturity).unwrap();
        let implied = -df.ln() / bond.time_to_maturity();
        assert_relative_eq!(implied, tenor.market_quote, epsilon = 1e-9);
    }
}

#[test]
fn test_refit_without_changes_is_idempotent() {
    let mut curve = zero_curve(CalibrationConfig::default());
    curve.fit().unwrap();
    let first = curve.curve().points().to_vec();

    curve.fit().unwrap();
    assert_eq!(curve.curve().points(), first.as_slice());

    curve.refit(2).unwrap();
    assert_eq!(curve.curve().points(), first.as_slice());
}

#[test]
fn test_partial_refit_matches_full_fit() {
    let mut partial = zero_curve(CalibrationConfig::default());
    partial.fit().unwrap();
    let kept = partial.curve().points()[..4].to_vec();

    partial.set_quote(3, 0.039).unwrap();
    partial.refit(3).unwrap();

    let mut full = zero_curve(CalibrationConfig::default());
    full.set_quote(3, 0.039).unwrap();
    full.fit().unwrap();

    assert_eq!(&partial.curve().points()[..4], kept.as_slice());
    assert_eq!(partial.curve().len(), full.curve().len());
    for (a, b) in partial.curve().points().iter().zip(full.curve().points()) {
        assert_eq!(a.0, b.0);
        assert_relative_eq!(a.1, b.1, epsilon = 1e-15);
    }
}

fn priced_zero(t: i32, price: f64) -> CurveTenor<DiscountProduct> {
    CurveTenor::new(
        format!("{t}Y"),
        DiscountProduct::from(ZeroCouponBond::new(as_of(), years(t))),
        price,
        QuoteConvention::Price,
    )
}

#[test]
fn test_partial_refit_after_failed_fit_refits_everything() {
    let tenors = vec![
        priced_zero(1, 0.97),
        priced_zero(2, 10.0),
        priced_zero(3, 0.91),
        priced_zero(4, 0.88),
    ];
    let mut curve = CalibratedCurve::new(
        "USD-ZERO",
        Currency::USD,
        CurveCategory::Discount,
        DiscountCalibrator::new(as_of()),
        tenors,
    );

    let err = curve.fit().unwrap_err();
    assert_eq!(err.as_calibration_failure().unwrap().tenor, "2Y");
    assert!(!curve.is_fitted());
    assert!(curve.last_report().is_none());

    curve.set_quote(1, 0.94).unwrap();
    let report = curve.refit(3).unwrap();

    assert!(curve.is_fitted());
    assert_eq!(report.status, FitStatus::Converged);
    assert_eq!(report.instrument_errors.len(), 4);
    assert!(report.max_abs_error() < 1e-9);
    assert_eq!(curve.curve().len(), 5);
    for tenor in curve.tenors() {
        let df = curve.curve().interpolate(tenor.curve_date).unwrap();
        assert_relative_eq!(df, tenor.market_quote, epsilon = 1e-9);
    }
}

#[test]
fn test_zero_treatment_floors_forward_at_zero() {
    init_tracing();
    let tenors = || vec![note(3, 0.05), note(6, 0.01)];

    let mut allowed = CalibratedCurve::new(
        "USD-OIS",
        Currency::USD,
        CurveCategory::Discount,
        DiscountCalibrator::new(as_of()),
        tenors(),
    );
    allowed.fit().unwrap();
    let points = allowed.curve().points();
    assert!(allowed.flags().negative_found);
    assert!(points[2].1 > points[1].1);

    let config = CalibrationConfig::default().with_negative_treatment(NegativeTreatment::Zero);
    let mut floored = CalibratedCurve::new(
        "USD-OIS",
        Currency::USD,
        CurveCategory::Discount,
        DiscountCalibrator::new(as_of()).with_config(config),
        tenors(),
    );
    floored.fit().unwrap();
    let points = floored.curve().points();
    assert!(floored.flags().negative_found);
    assert_eq!(points[2].1, points[1].1);

    // Zero forward between the 3M and 6M points.
    let mid = as_of().add_days(135);
    assert_eq!(floored.curve().interpolate(mid).unwrap(), points[1].1);
}

#[test]
fn test_adjust_treatment_flags_but_keeps_value() {
    let tenors = || vec![note(3, 0.05), note(6, 0.01)];
    let mut allowed = CalibratedCurve::new(
        "USD-OIS",
        Currency::USD,
        CurveCategory::Discount,
        DiscountCalibrator::new(as_of()),
        tenors(),
    );
    allowed.fit().unwrap();

    let config = CalibrationConfig::default().with_negative_treatment(NegativeTreatment::Adjust);
    let mut adjusted = CalibratedCurve::new(
        "USD-OIS",
        Currency::USD,
        CurveCategory::Discount,
        DiscountCalibrator::new(as_of()).with_config(config),
        tenors(),
    );
    let report = adjusted.fit().unwrap();

    assert!(adjusted.flags().negative_found);
    assert!(report.max_abs_error() < 1e-10);
    let points = adjusted.curve().points();
    assert!(points[2].1 > points[1].1);
    assert_eq!(points, allowed.curve().points());
}

#[test]
fn test_zero_treatment_caps_survival_at_previous_point() {
    // 300bp then 50bp implies survival rising between 1Y and 2Y.
    let tenors = || vec![cds(1, 0.03), cds(2, 0.005)];

    let mut allowed = survival_curve(tenors(), CalibrationConfig::default());
    let report = allowed.fit().unwrap();
    assert!(allowed.flags().negative_found);
    assert!(report.max_abs_error() < 1e-9);
    let points = allowed.curve().points();
    assert!(points[2].1 > points[1].1);
    assert!(points[2].1 < 1.0);

    let config = CalibrationConfig::default().with_negative_treatment(NegativeTreatment::Zero);
    let mut floored = survival_curve(tenors(), config);
    let report = floored.fit().unwrap();

    assert!(floored.flags().negative_found);
    let points = floored.curve().points();
    assert_eq!(points.len(), 3);
    assert_eq!(points[2].1, points[1].1);
    // Zero hazard after 1Y, so the 2Y contract no longer reprices.
    assert!(report.instrument_errors[1].error().abs() > 1e-6);
    assert!(report.instrument_errors[0].error().abs() < 1e-9);
}

#[test]
fn test_flat_spread_gives_constant_hazard() {
    let tenors = [1, 3, 5, 7, 10].iter().map(|t| cds(*t, 0.01)).collect();
    let mut curve = survival_curve(tenors, CalibrationConfig::default());

    let report = curve.fit().unwrap();
    assert_eq!(report.status, FitStatus::Converged);
    assert!(report.max_abs_error() < 1e-9);

    let hazards = hazard_rates(curve.curve());
    assert_eq!(hazards.len(), 5);
    for h in &hazards {
        assert_relative_eq!(*h, hazards[0], max_relative = 2e-3);
        // Credit triangle: λ ≈ s / (1 - R).
        assert_relative_eq!(*h, 0.01 / 0.6, max_relative = 2e-2);
    }
    assert!(curve
        .curve()
        .points()
        .iter()
        .all(|(_, q)| *q > 0.0 && *q <= 1.0));
}

#[test]
fn test_inconsistent_quote_fails_without_force_fit() {
    let tenors = vec![cds(1, 0.01), cds(3, 0.30), cds(5, 0.0001)];
    let mut curve = survival_curve(tenors, CalibrationConfig::default());

    let err = curve.fit().unwrap_err();
    let failure = err.as_calibration_failure().expect("calibration failure");
    assert_eq!(failure.curve, "ACME");
    assert_eq!(failure.tenor, "5Y");
    assert_eq!(failure.curve_date, years(5));
    // Earlier tenors stay solved.
    assert_eq!(curve.curve().len(), 3);
    assert!(curve.last_report().is_none());
}

#[test]
fn test_inconsistent_quote_succeeds_with_force_fit() {
    init_tracing();
    let tenors = vec![cds(1, 0.01), cds(3, 0.30), cds(5, 0.0001)];
    let config = CalibrationConfig::default().with_force_fit(true);
    let mut curve = survival_curve(tenors, config);

    let report = curve.fit().unwrap();
    assert_eq!(report.status, FitStatus::Converged);
    assert!(curve.flags().fit_was_forced);
    assert_eq!(curve.curve().len(), 4);

    let forced = &curve.tenors()[2];
    let quote = forced.forced_quote.expect("forced quote recorded");
    assert!(quote > 0.0001 && quote < 0.30);
    assert_eq!(forced.market_quote, 0.0001);
    assert!(curve.tenors()[..2].iter().all(|t| t.forced_quote.is_none()));

    // Fitted to the forced quote, not the market quote.
    assert!(report.instrument_errors[2].error().abs() < 1e-9);
    let survival = curve.curve().points().last().unwrap().1;
    assert!(survival > 0.0 && survival <= 1.0);
}

#[test]
fn test_full_fit_clears_forced_state() {
    let tenors = vec![cds(1, 0.01), cds(3, 0.30), cds(5, 0.0001)];
    let config = CalibrationConfig::default().with_force_fit(true);
    let mut curve = survival_curve(tenors, config);
    curve.fit().unwrap();
    assert!(curve.flags().fit_was_forced);

    curve.set_quote(1, 0.012).unwrap();
    curve.set_quote(2, 0.013).unwrap();
    curve.fit().unwrap();
    assert!(!curve.flags().fit_was_forced);
    assert!(curve.tenors().iter().all(|t| t.forced_quote.is_none()));
}

#[test]
fn test_zero_weight_tenor_is_ignored() {
    let tenors = vec![
        cds(1, 0.01),
        cds(3, 0.5).with_weight(0.0),
        cds(5, 0.012),
    ];
    let mut curve = survival_curve(tenors, CalibrationConfig::default());
    let report = curve.fit().unwrap();

    assert_eq!(report.instrument_errors.len(), 2);
    assert_eq!(curve.curve().len(), 3);
    assert!(curve.tenors()[1].model_price.is_none());
}

#[test]
fn test_survival_requires_discount_curve() {
    let calibrator = SurvivalCalibrator::new(as_of());
    let mut curve = CalibratedCurve::new(
        "ACME",
        Currency::USD,
        CurveCategory::Survival,
        calibrator,
        vec![cds(1, 0.01)],
    );
    let err = curve.fit().unwrap_err();
    assert!(err.is_configuration());
    assert!(curve.curve().is_empty());
}

#[test]
fn test_deep_clone_scopes_auxiliary_curves() {
    let discount = flat_discount();
    let calibrator = SurvivalCalibrator::new(as_of()).with_discount(SharedCurve::clone(&discount));
    let mut curve = CalibratedCurve::new(
        "ACME",
        Currency::USD,
        CurveCategory::Survival,
        calibrator,
        vec![cds(1, 0.01), cds(5, 0.012)],
    );
    curve.fit().unwrap();

    let shared = curve.deep_clone(CloneScope::ShareAuxiliary);
    let isolated = curve.deep_clone(CloneScope::CloneAuxiliary);
    assert_eq!(isolated.curve().points(), curve.curve().points());

    discount.write().set_constant(0.5);
    let shared_df = shared.calibrator().discount().unwrap().read().interpolate(years(2)).unwrap();
    let isolated_df = isolated
        .calibrator()
        .discount()
        .unwrap()
        .read()
        .interpolate(years(2))
        .unwrap();
    assert_eq!(shared_df, 0.5);
    assert!(isolated_df < 0.95 && isolated_df > 0.85);
}
