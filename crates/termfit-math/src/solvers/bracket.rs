//! Outward bracket search.

use crate::error::{MathError, MathResult};

/// Widens `[low, high]` until `f(x) - target` changes sign.
///
/// Each expansion doubles the interval width on the side whose residual is
/// smaller in magnitude, clipped to the admissible range `limits`. Once an
/// end reaches its limit, growth continues on the other side only.
///
/// Returns the bracketing interval, or [`MathError::InvalidBracket`] with
/// the last interval tried once `max_expansions` is exhausted or both ends
/// sit on their limits.
pub fn expand_bracket<F>(
    f: F,
    target: f64,
    low: f64,
    high: f64,
    limits: (f64, f64),
    max_expansions: u32,
) -> MathResult<(f64, f64)>
where
    F: Fn(f64) -> f64,
{
    let (min, max) = limits;
    let mut a = low.max(min);
    let mut b = high.min(max);

    if !(a < b) {
        return Err(MathError::invalid_input(format!(
            "empty search interval [{a}, {b}] within limits [{min}, {max}]"
        )));
    }

    let residual = |x: f64| {
        let value = f(x) - target;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(MathError::invalid_input(format!(
                "non-finite residual at {x} during bracket search"
            )))
        }
    };

    let mut fa = residual(a)?;
    let mut fb = residual(b)?;

    for _ in 0..max_expansions {
        if brackets(fa, fb) {
            return Ok((a, b));
        }

        let width = b - a;
        let grow_low = a > min && (fa.abs() < fb.abs() || b >= max);
        if grow_low {
            a = (a - width).max(min);
            fa = residual(a)?;
        } else if b < max {
            b = (b + width).min(max);
            fb = residual(b)?;
        } else {
            break;
        }
    }

    if brackets(fa, fb) {
        Ok((a, b))
    } else {
        Err(MathError::InvalidBracket { a, b, fa, fb })
    }
}

fn brackets(fa: f64, fb: f64) -> bool {
    fa == 0.0 || fb == 0.0 || fa.signum() != fb.signum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_bracketed() {
        let (a, b) = expand_bracket(|x| x, 0.5, 0.0, 1.0, (0.0, 10.0), 10).unwrap();
        assert_eq!((a, b), (0.0, 1.0));
    }

    #[test]
    fn test_expands_upwards() {
        let (a, b) = expand_bracket(|x| x, 5.0, 0.0, 1.0, (0.0, 100.0), 10).unwrap();
        assert_eq!(a, 0.0);
        assert!(b >= 5.0);
    }

    #[test]
    fn test_expansion_respects_limits() {
        // Survival-style search: the root sits above the cap.
        let result = expand_bracket(|x| x, 1.5, 0.5, 0.9, (1e-12, 1.0), 40);
        match result {
            Err(MathError::InvalidBracket { a, b, .. }) => {
                assert!(a >= 1e-12);
                assert!(b <= 1.0);
            }
            other => panic!("expected invalid bracket, got {other:?}"),
        }
    }

    #[test]
    fn test_expands_downwards_when_low_side_is_closer() {
        let (a, b) = expand_bracket(|x| x, -3.0, 0.0, 1.0, (-10.0, 10.0), 10).unwrap();
        assert!(a <= -3.0);
        assert!(b >= a);
    }

    #[test]
    fn test_empty_interval_rejected() {
        assert!(expand_bracket(|x| x, 0.0, 2.0, 3.0, (0.0, 1.0), 5).is_err());
    }
}
