//! Euclidean rhythm combiner
//!
//! Each layer spreads `pulses` hits as evenly as possible over `steps`
//! (Bresenham distribution), rotated by `rotation`. Layers are tiled to the
//! least common multiple of their step counts and OR-combined.

use crate::config::EuclideanLayer;

/// Longest combined pattern (steps)
pub const MAX_PATTERN_STEPS: u64 = 65_536;

/// Combines rhythm layers into one step pattern
pub trait PatternCombiner {
    /// Returns the combined pattern and its length (`lcm` of layer steps).
    /// Both are empty/zero when no layer has steps.
    fn combine(&self, layers: &[EuclideanLayer]) -> (Vec<bool>, usize);
}

/// Default Bresenham-based combiner
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanCombiner;

pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

pub fn lcm(a: u64, b: u64) -> u64 {
    if a == 0 || b == 0 {
        return 0;
    }
    a / gcd(a, b) * b
}

/// Single-layer pattern of length `steps`
pub fn euclidean_pattern(pulses: u32, steps: u32, rotation: u32) -> Vec<bool> {
    if steps == 0 {
        return Vec::new();
    }
    let pulses = pulses.min(steps) as u64;
    let steps_u = steps as u64;
    let base: Vec<bool> = (0..steps_u).map(|i| (i * pulses) % steps_u < pulses).collect();
    let rotation = (rotation % steps) as usize;
    (0..steps as usize)
        .map(|i| base[(i + rotation) % steps as usize])
        .collect()
}

impl PatternCombiner for EuclideanCombiner {
    fn combine(&self, layers: &[EuclideanLayer]) -> (Vec<bool>, usize) {
        let mut length = 0u64;
        let mut patterns = Vec::with_capacity(layers.len());

        for layer in layers.iter().filter(|l| l.steps > 0) {
            let next = if length == 0 {
                layer.steps as u64
            } else {
                lcm(length, layer.steps as u64)
            };
            if next > MAX_PATTERN_STEPS {
                log::warn!(
                    "Euclidean layer {}/{} ignored: combined pattern would exceed {} steps",
                    layer.pulses,
                    layer.steps,
                    MAX_PATTERN_STEPS
                );
                continue;
            }
            length = next;
            patterns.push(euclidean_pattern(layer.pulses, layer.steps, layer.rotation));
        }

        let length = length as usize;
        let combined = (0..length)
            .map(|k| patterns.iter().any(|p| p[k % p.len()]))
            .collect();
        (combined, length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lcm() {
        assert_eq!(lcm(8, 12), 24);
        assert_eq!(lcm(3, 5), 15);
        assert_eq!(lcm(4, 0), 0);
        assert_eq!(gcd(12, 8), 4);
    }

    #[test]
    fn test_tresillo() {
        let p = euclidean_pattern(3, 8, 0);
        assert_eq!(
            p,
            vec![true, false, false, true, false, false, true, false]
        );
    }

    #[test]
    fn test_rotation() {
        let p = euclidean_pattern(3, 8, 1);
        assert_eq!(
            p,
            vec![false, false, true, false, false, true, false, true]
        );
        assert_eq!(p.iter().filter(|&&h| h).count(), 3);
    }

    #[test]
    fn test_pulses_clamped_to_steps() {
        assert!(euclidean_pattern(9, 4, 0).iter().all(|&h| h));
        assert!(euclidean_pattern(0, 4, 0).iter().all(|&h| !h));
    }

    #[test]
    fn test_combine_lcm_length() {
        let layers = [EuclideanLayer::new(3, 8, 0), EuclideanLayer::new(5, 12, 0)];
        let (pattern, length) = EuclideanCombiner.combine(&layers);
        assert_eq!(length, 24);
        assert_eq!(pattern.len(), 24);
        // Step 0 is a hit in both layers
        assert!(pattern[0]);
    }

    #[test]
    fn test_combine_empty() {
        let (pattern, length) = EuclideanCombiner.combine(&[EuclideanLayer::new(3, 0, 0)]);
        assert_eq!(length, 0);
        assert!(pattern.is_empty());
    }
}
