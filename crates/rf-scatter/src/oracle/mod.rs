//! Pure helpers placement modes consult: random variation, the noise field
//! and the Euclidean pattern combiner.

pub mod euclidean;
pub mod noise;
pub mod variation;

pub use euclidean::*;
pub use noise::*;
pub use variation::*;

/// Oracles used by one generation pass
#[derive(Clone, Copy)]
pub struct Oracles<'a> {
    pub noise: &'a dyn NoiseOracle,
    pub pattern: &'a dyn PatternCombiner,
}

impl Default for Oracles<'static> {
    fn default() -> Self {
        Self {
            noise: &ValueNoise,
            pattern: &EuclideanCombiner,
        }
    }
}
