//! Fit hooks and overlay isolation.
//!
//! An overlay curve adjusts a base curve (for example a multiplicative
//! basis on discount factors). When the base curve's own calibration prices
//! through the overlay, fitting it with the overlay live would read a
//! quantity defined in terms of the curve being solved. [`OverlayIsolation`]
//! breaks that loop: it neutralises the overlay before the base fit and
//! restores it afterwards.
//!
//! Hooks compose in a [`FitHooks`] chain. Pre-fit hooks run in list order,
//! post-fit hooks in reverse order, and every post-fit hook whose pre-fit
//! ran is called on success, on error and while unwinding from a panic.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::curve::{Curve, SharedCurve};

/// State captured by a hook before a fit.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedState {
    snapshot: Curve,
}

impl SavedState {
    /// Captures a curve snapshot.
    #[must_use]
    pub fn new(snapshot: Curve) -> Self {
        Self { snapshot }
    }

    /// The captured curve.
    #[must_use]
    pub fn snapshot(&self) -> &Curve {
        &self.snapshot
    }

    /// Consumes the state, returning the captured curve.
    #[must_use]
    pub fn into_snapshot(self) -> Curve {
        self.snapshot
    }
}

/// A pre/post pair run around a fit.
pub trait FitHook: Send + Sync + fmt::Debug {
    /// Runs before the fit of `curve_name`. Returns `None` when the hook
    /// does not apply to this curve.
    fn pre_fit(&self, curve_name: &str) -> Option<SavedState>;

    /// Restores what [`Self::pre_fit`] changed.
    fn post_fit(&self, saved: SavedState);
}

/// Neutralises an overlay curve while its base curve is fitted.
#[derive(Debug, Clone)]
pub struct OverlayIsolation {
    base_curve: String,
    overlay: SharedCurve,
    neutral: f64,
}

impl OverlayIsolation {
    /// Creates a hook that sets `overlay` to `neutral` while the curve named
    /// `base_curve` is fitted.
    #[must_use]
    pub fn new(base_curve: impl Into<String>, overlay: SharedCurve, neutral: f64) -> Self {
        Self {
            base_curve: base_curve.into(),
            overlay,
            neutral,
        }
    }

    /// Hook for a multiplicative overlay (neutral value 1).
    #[must_use]
    pub fn multiplicative(base_curve: impl Into<String>, overlay: SharedCurve) -> Self {
        Self::new(base_curve, overlay, 1.0)
    }

    /// Hook for an additive overlay (neutral value 0).
    #[must_use]
    pub fn additive(base_curve: impl Into<String>, overlay: SharedCurve) -> Self {
        Self::new(base_curve, overlay, 0.0)
    }

    /// The overlay curve this hook guards.
    #[must_use]
    pub fn overlay(&self) -> &SharedCurve {
        &self.overlay
    }
}

impl FitHook for OverlayIsolation {
    fn pre_fit(&self, curve_name: &str) -> Option<SavedState> {
        if curve_name != self.base_curve {
            return None;
        }
        let mut overlay = self.overlay.write();
        let saved = SavedState::new(overlay.clone());
        overlay.set_constant(self.neutral);
        debug!(
            base = %self.base_curve,
            overlay = %overlay.name(),
            neutral = self.neutral,
            "overlay neutralised"
        );
        Some(saved)
    }

    fn post_fit(&self, saved: SavedState) {
        let mut overlay = self.overlay.write();
        *overlay = saved.into_snapshot();
        debug!(base = %self.base_curve, overlay = %overlay.name(), "overlay restored");
    }
}

/// An ordered chain of fit hooks.
#[derive(Debug, Clone, Default)]
pub struct FitHooks {
    hooks: Vec<Arc<dyn FitHook>>,
}

impl FitHooks {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a hook.
    pub fn push(&mut self, hook: Arc<dyn FitHook>) {
        self.hooks.push(hook);
    }

    /// Number of hooks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Returns true if the chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Runs `fit` between the chain's pre- and post-fit hooks.
    pub fn run<R>(&self, curve_name: &str, fit: impl FnOnce() -> R) -> R {
        let mut guard = RestoreGuard {
            hooks: &self.hooks,
            saved: Vec::with_capacity(self.hooks.len()),
        };
        for hook in &self.hooks {
            let saved = hook.pre_fit(curve_name);
            guard.saved.push(saved);
        }
        fit()
    }
}

/// Runs post-fit hooks in reverse order when dropped.
struct RestoreGuard<'a> {
    hooks: &'a [Arc<dyn FitHook>],
    saved: Vec<Option<SavedState>>,
}

impl Drop for RestoreGuard<'_> {
    fn drop(&mut self) {
        for (index, saved) in self.saved.drain(..).enumerate().rev() {
            if let Some(state) = saved {
                self.hooks[index].post_fit(state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{ExtrapolationMethod, InterpolationMethod};
    use parking_lot::Mutex;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use termfit_core::types::Date;

    fn overlay_curve() -> SharedCurve {
        let d0 = Date::from_ymd(2025, 1, 1).unwrap();
        Curve::from_points(
            vec![(d0, 0.99), (d0.add_days(365), 0.98)],
            InterpolationMethod::LogLinear,
            ExtrapolationMethod::Flat,
        )
        .unwrap()
        .into_shared()
    }

    #[derive(Debug)]
    struct Recorder {
        id: usize,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl FitHook for Recorder {
        fn pre_fit(&self, _curve_name: &str) -> Option<SavedState> {
            self.log.lock().push(format!("pre{}", self.id));
            Some(SavedState::new(Curve::new(
                InterpolationMethod::Linear,
                ExtrapolationMethod::Flat,
            )))
        }

        fn post_fit(&self, _saved: SavedState) {
            self.log.lock().push(format!("post{}", self.id));
        }
    }

    #[test]
    fn test_overlay_neutral_during_fit_and_restored() {
        let overlay = overlay_curve();
        let before = overlay.read().clone();
        let mut hooks = FitHooks::new();
        hooks.push(Arc::new(OverlayIsolation::multiplicative("BASE", overlay.clone())));

        let seen = hooks.run("BASE", || {
            overlay.read().points().iter().map(|(_, v)| *v).collect::<Vec<_>>()
        });
        assert_eq!(seen, vec![1.0, 1.0]);
        assert_eq!(*overlay.read(), before);
    }

    #[test]
    fn test_non_matching_hook_is_noop() {
        let overlay = overlay_curve();
        let hook = OverlayIsolation::multiplicative("BASE", overlay.clone());
        assert!(hook.pre_fit("OTHER").is_none());
        assert_eq!(overlay.read().points()[0].1, 0.99);
    }

    #[test]
    fn test_post_hooks_run_in_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = FitHooks::new();
        for id in 0..3 {
            hooks.push(Arc::new(Recorder {
                id,
                log: log.clone(),
            }));
        }
        hooks.run("ANY", || log.lock().push("fit".to_string()));
        assert_eq!(
            *log.lock(),
            vec!["pre0", "pre1", "pre2", "fit", "post2", "post1", "post0"]
        );
    }

    #[test]
    fn test_restore_on_error() {
        let overlay = overlay_curve();
        let before = overlay.read().clone();
        let mut hooks = FitHooks::new();
        hooks.push(Arc::new(OverlayIsolation::multiplicative("BASE", overlay.clone())));

        let result: Result<(), String> = hooks.run("BASE", || Err("solver failed".to_string()));
        assert!(result.is_err());
        assert_eq!(*overlay.read(), before);
    }

    #[test]
    fn test_restore_on_panic() {
        let overlay = overlay_curve();
        let before = overlay.read().clone();
        let mut hooks = FitHooks::new();
        hooks.push(Arc::new(OverlayIsolation::multiplicative("BASE", overlay.clone())));

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            hooks.run("BASE", || panic!("pricer blew up"));
        }));
        assert!(outcome.is_err());
        assert_eq!(*overlay.read(), before);
    }
}
