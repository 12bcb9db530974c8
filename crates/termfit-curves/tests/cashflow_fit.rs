//! Integration tests: forward-price curves from spot, future, forward and
//! average swap quotes.
//!
//! | Tenor | Contract                         | Quote |
//! |-------|----------------------------------|-------|
//! | Spot  | spot on the as-of date           | 70.00 |
//! | 3M    | future expiring in 3 months      | 72.00 |
//! | 6M    | forward delivering in 6 months   | 73.00 |
//! | Cal   | monthly average, months 7 to 12  | 74.00 |

use approx::assert_relative_eq;
use termfit_core::types::{Currency, Date};
use termfit_curves::calibrator::FitState;
use termfit_curves::prelude::*;

fn as_of() -> Date {
    Date::from_ymd(2025, 1, 15).unwrap()
}

fn months(m: i32) -> Date {
    as_of().add_months(m).unwrap()
}

fn tenor(name: &str, product: ForwardProduct, quote: f64) -> CurveTenor<ForwardProduct> {
    CurveTenor::new(name, product, quote, QuoteConvention::Price)
}

fn market() -> Vec<CurveTenor<ForwardProduct>> {
    vec![
        tenor("Spot", ForwardProduct::Spot { date: as_of() }, 70.0),
        tenor("3M", ForwardProduct::Future { expiry: months(3) }, 72.0),
        tenor(
            "6M",
            ForwardProduct::Forward {
                delivery: months(6),
                payment: months(6).add_days(2),
            },
            73.0,
        ),
        tenor(
            "Cal",
            ForwardProduct::AverageSwap {
                fixings: (7..=12).map(months).collect(),
                payment: months(12).add_days(5),
            },
            74.0,
        ),
    ]
}

fn discount() -> SharedCurve {
    Curve::from_points(
        vec![(as_of(), 1.0), (months(24), 0.92)],
        InterpolationMethod::LogLinear,
        ExtrapolationMethod::Linear,
    )
    .unwrap()
    .into_shared()
}

fn forward_curve(
    calibrator: CashflowCalibrator,
    tenors: Vec<CurveTenor<ForwardProduct>>,
) -> CalibratedCurve<CashflowCalibrator> {
    CalibratedCurve::new("BRENT", Currency::USD, CurveCategory::Forward, calibrator, tenors)
}

#[test]
fn test_bootstrap_reprices_every_contract() {
    let calibrator = CashflowCalibrator::new(as_of()).with_discount(discount());
    let mut curve = forward_curve(calibrator, market());

    let report = curve.fit().unwrap();

    assert_eq!(report.status, FitStatus::Converged);
    assert_eq!(report.instrument_errors.len(), 4);
    assert!(report.max_abs_error() < 1e-9);
    assert!(report.objective.is_none());

    let points = curve.curve().points();
    assert_eq!(points.len(), 4);
    assert_eq!(points[0], (as_of(), 70.0));
    assert_relative_eq!(points[1].1, 72.0, epsilon = 1e-12);
    assert_relative_eq!(points[2].1, 73.0, epsilon = 1e-12);
    assert!(points[3].1 > 74.0);

    for tenor in curve.tenors() {
        assert_relative_eq!(tenor.model_price.unwrap(), tenor.market_quote, epsilon = 1e-9);
    }
}

#[test]
fn test_identity_is_propagated() {
    let mut curve = forward_curve(CashflowCalibrator::new(as_of()), market());
    curve.fit().unwrap();

    assert_eq!(curve.curve().name(), "BRENT");
    assert_eq!(curve.curve().currency(), Some(Currency::USD));
}

#[test]
fn test_unpenalized_smoothing_matches_bootstrap() {
    let mut bootstrapped = forward_curve(CashflowCalibrator::new(as_of()), market());
    bootstrapped.fit().unwrap();

    let config = CalibrationConfig::default().with_cashflow_method(CashflowFitMethod::Smoothed);
    let mut smoothed = forward_curve(CashflowCalibrator::new(as_of()).with_config(config), market());
    let report = smoothed.fit().unwrap();

    assert_eq!(report.status, FitStatus::Converged);
    assert!(report.objective.unwrap() < 1e-12);
    for (a, b) in smoothed.curve().points().iter().zip(bootstrapped.curve().points()) {
        assert_eq!(a.0, b.0);
        assert_relative_eq!(a.1, b.1, epsilon = 1e-8);
    }
}

#[test]
fn test_smoothing_penalty_keeps_spot_pinned() {
    let flat = |value: f64| {
        Curve::from_points(
            vec![(as_of(), value)],
            InterpolationMethod::Linear,
            ExtrapolationMethod::Flat,
        )
        .unwrap()
    };
    let config = CalibrationConfig::default().with_cashflow_method(CashflowFitMethod::Smoothed);
    let calibrator = CashflowCalibrator::new(as_of())
        .with_config(config)
        .with_smoothing(flat(1.0), flat(0.1));
    let mut curve = forward_curve(calibrator, market());

    let report = curve.fit().unwrap();

    assert_eq!(report.status, FitStatus::Converged);
    assert!(report.objective.unwrap() > 0.0);
    assert_eq!(curve.curve().points()[0].1, 70.0);
    assert!(report.instrument_errors[0].error().abs() < 1e-12);
    // The penalty pulls the later nodes off an exact fit.
    assert!(report.max_abs_error() > 1e-6);
}

#[test]
fn test_projection_curve_makes_the_fit_a_basis() {
    let mut base = Curve::from_points(
        vec![(as_of(), 60.0), (months(12), 66.0)],
        InterpolationMethod::Linear,
        ExtrapolationMethod::Flat,
    )
    .unwrap();
    base.set_identity("BRENT-BASE", Currency::USD);
    let calibrator = CashflowCalibrator::new(as_of()).with_projection(base.into_shared());
    let tenors = vec![
        tenor("Spot", ForwardProduct::Spot { date: as_of() }, 62.0),
        tenor("6M", ForwardProduct::Future { expiry: months(6) }, 66.0),
    ];
    let mut curve = forward_curve(calibrator, tenors);

    let report = curve.fit().unwrap();
    assert!(report.max_abs_error() < 1e-9);

    let points = curve.curve().points();
    assert_relative_eq!(points[0].1, 2.0, epsilon = 1e-12);
    let projected_6m = 60.0 + 6.0 * months(6).days_between(&as_of()).abs() as f64
        / months(12).days_between(&as_of()).abs() as f64;
    assert_relative_eq!(points[1].1, 66.0 - projected_6m, epsilon = 1e-9);

    let product = ForwardProduct::Future { expiry: months(6) };
    assert_relative_eq!(curve.pricer(&product).unwrap().pv().unwrap(), 66.0, epsilon = 1e-9);
}

#[test]
fn test_empty_tenor_set_is_a_no_op() {
    let mut calibrator = CashflowCalibrator::new(as_of());
    let mut curve = Curve::from_points(
        vec![(as_of(), 70.0), (months(12), 75.0)],
        InterpolationMethod::Linear,
        ExtrapolationMethod::Flat,
    )
    .unwrap();
    let before = curve.points().to_vec();
    let mut tenors = vec![tenor("3M", ForwardProduct::Future { expiry: months(3) }, 72.0)
        .with_weight(0.0)];
    let mut flags = FitFlags::default();

    let report = calibrator
        .fit_from(
            FitState {
                name: "BRENT",
                currency: Currency::USD,
                curve: &mut curve,
                tenors: &mut tenors,
                flags: &mut flags,
            },
            0,
        )
        .unwrap();

    assert_eq!(report.status, FitStatus::Skipped);
    assert!(report.instrument_errors.is_empty());
    assert_eq!(curve.points(), before.as_slice());

    let mut empty = forward_curve(CashflowCalibrator::new(as_of()), Vec::new());
    assert_eq!(empty.fit().unwrap().status, FitStatus::Skipped);
    assert!(empty.curve().is_empty());
}

#[test]
fn test_ambiguous_projection_is_a_configuration_error() {
    let named = |name: &str, level: f64| {
        Curve::from_points(
            vec![(as_of(), level)],
            InterpolationMethod::Linear,
            ExtrapolationMethod::Flat,
        )
        .unwrap()
        .with_identity(name, Currency::USD)
        .into_shared()
    };
    let calibrator = CashflowCalibrator::new(as_of())
        .with_projection(named("BRENT-BASE", 60.0))
        .with_projection(named("WTI-BASE", 58.0));

    let mut direct = calibrator.clone();
    let mut curve = Curve::new(InterpolationMethod::Linear, ExtrapolationMethod::Flat);
    let mut tenors = market();
    let mut flags = FitFlags::default();
    let err = direct
        .fit_from(
            FitState {
                name: "BRENT",
                currency: Currency::USD,
                curve: &mut curve,
                tenors: &mut tenors,
                flags: &mut flags,
            },
            0,
        )
        .unwrap_err();
    assert!(matches!(err, CurveError::AmbiguousProjection { available: 2, .. }));
    assert!(curve.is_empty());

    let mut ambiguous = forward_curve(calibrator.clone(), market());
    let err = ambiguous.fit().unwrap_err();
    assert!(err.is_configuration());
    assert!(ambiguous.curve().is_empty());

    let mut resolved = forward_curve(calibrator.with_projection_index("WTI-BASE"), market());
    let report = resolved.fit().unwrap();
    assert_eq!(report.status, FitStatus::Converged);
    assert_relative_eq!(resolved.curve().points()[0].1, 12.0, epsilon = 1e-12);
}

#[test]
fn test_undetermined_node_fails_without_touching_the_curve() {
    // The forward fixes on the 3M node but anchors a 6M node nothing prices.
    let tenors = vec![
        tenor("3M", ForwardProduct::Future { expiry: months(3) }, 72.0),
        tenor(
            "3M-FWD",
            ForwardProduct::Forward {
                delivery: months(3),
                payment: months(3),
            },
            72.5,
        )
        .with_curve_date(months(6)),
    ];

    for method in [CashflowFitMethod::Bootstrap, CashflowFitMethod::Smoothed] {
        let config = CalibrationConfig::default().with_cashflow_method(method);
        let mut curve = forward_curve(
            CashflowCalibrator::new(as_of()).with_config(config),
            tenors.clone(),
        );
        let report = curve.fit().unwrap();
        assert_eq!(report.status, FitStatus::Failed, "{method:?}");
        assert!(curve.curve().is_empty());
    }
}

#[test]
fn test_refit_rebuilds_the_whole_curve() {
    let mut curve = forward_curve(CashflowCalibrator::new(as_of()), market());
    curve.fit().unwrap();

    curve.set_quote(1, 71.0).unwrap();
    curve.refit(2).unwrap();

    assert_relative_eq!(curve.curve().points()[1].1, 71.0, epsilon = 1e-12);
    assert!(curve.last_report().unwrap().max_abs_error() < 1e-9);
}
