//! Easing curves used by the warp phases.
//!
//! All curves map `[0, 1]` onto `[0, 1]` with `f(0) = 0` and `f(1) = 1`.

/// Slow start, fast middle, slow end.
pub fn ease_in_out_cubic(t: f64) -> f64 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

/// Fast start, long settle.
pub fn ease_out_quart(t: f64) -> f64 {
    1.0 - (1.0 - t).powi(4)
}

pub fn linear(t: f64) -> f64 {
    t
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_endpoints() {
        for f in [ease_in_out_cubic, ease_out_quart, linear] {
            assert_relative_eq!(f(0.0), 0.0);
            assert_relative_eq!(f(1.0), 1.0);
        }
    }

    #[test]
    fn test_cubic_is_symmetric_at_midpoint() {
        assert_relative_eq!(ease_in_out_cubic(0.5), 0.5);
        assert_relative_eq!(
            ease_in_out_cubic(0.25) + ease_in_out_cubic(0.75),
            1.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_quart_front_loaded() {
        assert!(ease_out_quart(0.25) > 0.6);
    }
}
