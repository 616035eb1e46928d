//! Random variation helpers shared by every placement mode

use rand::Rng;

use crate::config::DriftDirection;

/// Uniform draw in `[min, max)`. Degenerate or non-finite ranges return `min`.
pub fn uniform<R: Rng + ?Sized>(min: f64, max: f64, rng: &mut R) -> f64 {
    if !min.is_finite() || !max.is_finite() || max <= min {
        return min;
    }
    rng.random_range(min..max)
}

/// Random offset of up to `percent`% of `magnitude` in the given direction
pub fn variation<R: Rng + ?Sized>(
    magnitude: f64,
    percent: f64,
    direction: DriftDirection,
    rng: &mut R,
) -> f64 {
    if percent <= 0.0 || magnitude == 0.0 || !magnitude.is_finite() {
        return 0.0;
    }
    let span = magnitude.abs() * percent / 100.0;
    match direction {
        DriftDirection::Bidirectional => uniform(-span, span, rng),
        DriftDirection::Forward => uniform(0.0, span, rng),
        DriftDirection::Backward => uniform(-span, 0.0, rng),
    }
}
