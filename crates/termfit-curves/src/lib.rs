//! # Termfit Curves
//!
//! Calibration of term structures to market quotes.
//!
//! This crate provides:
//!
//! - **Data model**: date-keyed [`Curve`]s, [`CurveTenor`] instruments and
//!   bounded [`ParameterVector`]s
//! - **Calibrator contract**: fit, partial refit, pricer access and
//!   validation shared by every strategy
//! - **Sequential bootstrap**: discount and survival curves solved tenor by
//!   tenor with Brent root finding, negative-forward policies and forced fits
//! - **Global optimization**: bounded least-squares fits of parametric
//!   models such as CIR
//! - **Cashflow calibration**: forward-price curves from spot, forward,
//!   future and average swap quotes, bootstrapped or smoothed
//! - **Overlay isolation**: fit hooks that neutralise dependent curves while
//!   a base curve is fitted and restore them afterwards
//!
//! ## Quick Start
//!
//! ```rust
//! use termfit_core::types::{Currency, Date};
//! use termfit_curves::prelude::*;
//!
//! let as_of = Date::from_ymd(2025, 1, 15).unwrap();
//! let note = |months: i32, rate: f64| {
//!     let maturity = as_of.add_months(months).unwrap();
//!     CurveTenor::new(
//!         format!("{months}M"),
//!         DiscountProduct::from(MoneyMarketNote::new(as_of, maturity, 0.0)),
//!         rate,
//!         QuoteConvention::SimpleYield,
//!     )
//! };
//!
//! let mut curve = CalibratedCurve::new(
//!     "USD-OIS",
//!     Currency::USD,
//!     CurveCategory::Discount,
//!     DiscountCalibrator::new(as_of),
//!     vec![note(3, 0.02), note(6, 0.025), note(12, 0.03)],
//! );
//!
//! let report = curve.fit().unwrap();
//! assert_eq!(report.status, FitStatus::Converged);
//! assert!(report.max_abs_error() < 1e-12);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::similar_names)]

pub mod bootstrap;
pub mod calibrated;
pub mod calibrator;
pub mod cashflow;
pub mod config;
pub mod curve;
pub mod error;
pub mod global;
pub mod overlay;
pub mod parameters;
pub mod products;
pub mod tenor;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::bootstrap::{BootstrapModel, DiscountCalibrator, SurvivalCalibrator};
    pub use crate::calibrated::{CalibratedCurve, CurveCategory};
    pub use crate::calibrator::{
        model_price, Calibrator, CloneScope, FitFlags, FitReport, FitState, FitStatus,
        InstrumentError, Pricer, TenorContext,
    };
    pub use crate::cashflow::CashflowCalibrator;
    pub use crate::config::{
        CalibrationConfig, CashflowFitMethod, NegativeTreatment, OptimizerMethod,
    };
    pub use crate::curve::{Curve, ExtrapolationMethod, InterpolationMethod, SharedCurve};
    pub use crate::error::{CalibrationFailure, CurveError, CurveResult, ValidationIssue};
    pub use crate::global::{cir_discount_factor, CirCalibrator, ParametricModel};
    pub use crate::overlay::{FitHook, FitHooks, OverlayIsolation, SavedState};
    pub use crate::parameters::ParameterVector;
    pub use crate::products::{
        CdsPricer, CreditDefaultSwap, DiscountPricer, DiscountProduct, ForwardPricer,
        ForwardProduct, MoneyMarketNote, Recovery, ZeroCouponBond,
    };
    pub use crate::tenor::{CurveTenor, Instrument, QuoteConvention};
}

pub use calibrated::{CalibratedCurve, CurveCategory};
pub use calibrator::{Calibrator, FitReport, FitStatus};
pub use curve::{Curve, SharedCurve};
pub use error::{CurveError, CurveResult};
pub use tenor::CurveTenor;
