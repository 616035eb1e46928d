//! Per-container generation state

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::channel::TopologyTag;
use crate::warning::ScatterWarning;

/// State a container carries from one generation pass to the next
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContainerState {
    /// Round-robin distribution counter
    #[serde(default)]
    pub round_robin: usize,
    /// Layout of the previous pass
    #[serde(default)]
    pub topology_tag: Option<TopologyTag>,
}

/// Mutable context threaded through one container's placement
pub struct GenerationContext {
    pub rng: ChaCha8Rng,
    pub round_robin: usize,
    pub warnings: Vec<ScatterWarning>,
}

impl GenerationContext {
    pub fn new(seed: u64, state: &ContainerState) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            round_robin: state.round_robin,
            warnings: Vec::new(),
        }
    }

    /// Record a warning once
    pub fn warn(&mut self, warning: ScatterWarning) {
        if !self.warnings.contains(&warning) {
            log::warn!("{}", warning);
            self.warnings.push(warning);
        }
    }

    /// Write the counters back into the persisted state
    pub fn store(&self, state: &mut ContainerState) {
        state.round_robin = self.round_robin;
    }
}

/// Seed for one container, derived from the project seed and its position
pub fn container_seed(project_seed: u64, group: usize, container: usize) -> u64 {
    let mut z = project_seed
        ^ (group as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (container as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warn_deduplicates() {
        let mut ctx = GenerationContext::new(1, &ContainerState::default());
        ctx.warn(ScatterWarning::EmptyPattern);
        ctx.warn(ScatterWarning::EmptyPattern);
        assert_eq!(ctx.warnings.len(), 1);
    }

    #[test]
    fn test_container_seed_distinct() {
        assert_ne!(container_seed(7, 0, 1), container_seed(7, 1, 0));
        assert_eq!(container_seed(7, 2, 3), container_seed(7, 2, 3));
    }

    #[test]
    fn test_round_robin_restored() {
        let state = ContainerState {
            round_robin: 5,
            topology_tag: None,
        };
        let mut ctx = GenerationContext::new(1, &state);
        ctx.round_robin += 2;
        let mut next = state.clone();
        ctx.store(&mut next);
        assert_eq!(next.round_robin, 7);
    }
}
