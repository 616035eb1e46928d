//! Procedural noise oracle
//!
//! Hashed 1D value noise with octave summation. Pure and seed-deterministic:
//! the same `(time, range, params, seed)` always yields the same value.

use rf_core::TimeRange;

use crate::config::NoiseSettings;

/// Source of a continuous noise field in `[0, 1]`
pub trait NoiseOracle {
    fn value_at(&self, time: f64, range: TimeRange, params: &NoiseSettings, seed: u64) -> f64;
}

/// Default value-noise field
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueNoise;

/// Hash a lattice point to `[0, 1)`
fn lattice(index: i64, seed: u64) -> f64 {
    let mut z = (index as u64)
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add(seed.wrapping_mul(0xD6E8_FEB8_6659_FD93));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^= z >> 31;
    (z >> 11) as f64 / (1u64 << 53) as f64
}

/// Smoothly interpolated single-octave noise
fn value_1d(x: f64, seed: u64) -> f64 {
    let floor = x.floor();
    let t = x - floor;
    let i = floor as i64;
    let a = lattice(i, seed);
    let b = lattice(i.wrapping_add(1), seed);
    let smooth = t * t * (3.0 - 2.0 * t);
    a + (b - a) * smooth
}

impl NoiseOracle for ValueNoise {
    fn value_at(&self, time: f64, range: TimeRange, params: &NoiseSettings, seed: u64) -> f64 {
        let x = (time - range.start()) * params.frequency;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut total = 0.0;
        let mut norm = 0.0;

        for octave in 0..params.octaves.max(1) {
            total += amplitude * value_1d(x * frequency, seed.wrapping_add(octave as u64));
            norm += amplitude;
            amplitude *= params.persistence;
            frequency *= params.lacunarity;
        }

        if norm <= 0.0 {
            return 0.0;
        }
        (total / norm).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range() -> TimeRange {
        TimeRange::new(0.0, 10.0).unwrap()
    }

    #[test]
    fn test_value_noise_in_unit_range() {
        let params = NoiseSettings {
            octaves: 4,
            ..Default::default()
        };
        for k in 0..1000 {
            let v = ValueNoise.value_at(k as f64 * 0.01, range(), &params, 3);
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_value_noise_deterministic() {
        let params = NoiseSettings::default();
        let a = ValueNoise.value_at(1.234, range(), &params, 42);
        let b = ValueNoise.value_at(1.234, range(), &params, 42);
        let c = ValueNoise.value_at(1.234, range(), &params, 43);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_value_noise_hits_lattice_values() {
        let params = NoiseSettings {
            octaves: 1,
            ..Default::default()
        };
        // On integer lattice points the field equals the hashed value
        let v = ValueNoise.value_at(3.0, range(), &params, 5);
        assert_eq!(v, lattice(3, 5));
    }
}
