//! Noise placement
//!
//! Grain times follow a procedural noise field. The probability of a grain at
//! time `t` is `density ± amplitude × noise(t)`; two algorithms turn that into
//! discrete times:
//!
//! - **Threshold**: one sample per noise period, accepted when the
//!   probability clears the threshold and a second draw passes it; ±25% jitter
//! - **Accumulation**: probability integrated on a fine grid (16 steps per
//!   period), a grain each time the accumulator reaches 1
//!
//! Every draw (acceptance, jitter, item, sub-area) comes from the noise field
//! with a fixed seed offset, so output is reproducible for a seed.

use rf_core::TimeRange;

use super::context::GenerationContext;
use super::emitter::{GrainEmitter, ItemChoice};
use super::{Placer, Step};
use crate::MAX_NOISE_SAMPLES;
use crate::config::{NoiseAlgorithm, NoiseSettings};
use crate::oracle::NoiseOracle;
use crate::source::SourceItem;
use crate::warning::ScatterWarning;

const ACCEPT_SEED_OFFSET: u64 = 1_000;
const JITTER_SEED_OFFSET: u64 = 2_000;
const ITEM_SEED_OFFSET: u64 = 3_000;
const SUB_AREA_SEED_OFFSET: u64 = 4_000;

/// Threshold jitter as a fraction of the sampling step
const JITTER_FRACTION: f64 = 0.25;

/// Accumulation grid resolution (steps per noise period)
const ACCUMULATION_SUBSTEPS: f64 = 16.0;

/// Accumulator decay per step below threshold
const ACCUMULATION_DECAY: f64 = 0.9;

/// One grain time with its item choice
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseHit {
    pub time: f64,
    pub choice: ItemChoice,
}

/// Scale a noise value to an index below `count`
fn noise_index(value: f64, count: usize) -> usize {
    ((value * count as f64) as usize).min(count.saturating_sub(1))
}

/// Compute every grain time for a range. Settings must already be validated.
pub fn noise_hits(
    settings: &NoiseSettings,
    range: TimeRange,
    oracle: &dyn NoiseOracle,
    items: &[SourceItem],
    ctx: &mut GenerationContext,
) -> Vec<NoiseHit> {
    if items.is_empty() {
        return Vec::new();
    }

    let seed = settings.seed;
    let threshold = settings.threshold / 100.0;
    let probability = |t: f64| {
        let field = oracle.value_at(t, range, settings, seed);
        (settings.density / 100.0 + (2.0 * field - 1.0) * settings.amplitude / 100.0).clamp(0.0, 1.0)
    };
    let choose = |t: f64| {
        let index = noise_index(
            oracle.value_at(t, range, settings, seed.wrapping_add(ITEM_SEED_OFFSET)),
            items.len(),
        );
        let areas = items[index].sub_areas.len();
        let sub_area = (areas > 0).then(|| {
            noise_index(
                oracle.value_at(t, range, settings, seed.wrapping_add(SUB_AREA_SEED_OFFSET)),
                areas,
            )
        });
        ItemChoice { index, sub_area }
    };

    let mut hits = Vec::new();
    let mut samples = 0;
    let end = range.end();

    match settings.algorithm {
        NoiseAlgorithm::Threshold => {
            let step = 1.0 / settings.frequency;
            let mut t = range.start();
            while t < end && samples < MAX_NOISE_SAMPLES {
                samples += 1;
                let p = probability(t);
                let accept = oracle.value_at(t, range, settings, seed.wrapping_add(ACCEPT_SEED_OFFSET));
                if p > 0.0 && p >= threshold && accept <= p {
                    let jitter_draw =
                        oracle.value_at(t, range, settings, seed.wrapping_add(JITTER_SEED_OFFSET));
                    let jitter = (2.0 * jitter_draw - 1.0) * JITTER_FRACTION * step;
                    let time = (t + jitter).max(range.start());
                    if time < end {
                        hits.push(NoiseHit {
                            time,
                            choice: choose(time),
                        });
                    }
                }
                t = range.start() + samples as f64 * step;
            }
        }
        NoiseAlgorithm::Accumulation => {
            let dt = 1.0 / (settings.frequency * ACCUMULATION_SUBSTEPS);
            let mut accumulator = 0.0;
            let mut t = range.start();
            while t < end && samples < MAX_NOISE_SAMPLES {
                samples += 1;
                let p = probability(t);
                if p > 0.0 && p >= threshold {
                    accumulator += p * settings.frequency * dt;
                    if accumulator >= 1.0 {
                        hits.push(NoiseHit {
                            time: t,
                            choice: choose(t),
                        });
                        accumulator = 0.0;
                    }
                } else {
                    accumulator *= ACCUMULATION_DECAY;
                }
                t = range.start() + samples as f64 * dt;
            }
        }
    }

    if samples >= MAX_NOISE_SAMPLES && budget_exhausted(range, settings, samples) {
        ctx.warn(ScatterWarning::IterationCap {
            context: "noise sampling".to_string(),
            cap: MAX_NOISE_SAMPLES,
        });
    }
    hits
}

/// True when the sample budget ran out before the range end
fn budget_exhausted(range: TimeRange, settings: &NoiseSettings, samples: usize) -> bool {
    let per_second = match settings.algorithm {
        NoiseAlgorithm::Threshold => settings.frequency,
        NoiseAlgorithm::Accumulation => settings.frequency * ACCUMULATION_SUBSTEPS,
    };
    (samples as f64) < range.length() * per_second
}

/// Places grains at precomputed noise times
#[derive(Debug, Clone)]
pub struct NoisePlacer {
    range: TimeRange,
    hits: Vec<NoiseHit>,
    next: usize,
}

impl NoisePlacer {
    pub fn new(
        settings: &NoiseSettings,
        range: TimeRange,
        oracle: &dyn NoiseOracle,
        items: &[SourceItem],
        ctx: &mut GenerationContext,
    ) -> Self {
        let hits = noise_hits(settings, range, oracle, items, ctx);
        log::debug!("Noise field produced {} grain times", hits.len());
        Self {
            range,
            hits,
            next: 0,
        }
    }

    pub fn hits(&self) -> &[NoiseHit] {
        &self.hits
    }
}

impl Placer for NoisePlacer {
    fn name(&self) -> &'static str {
        "noise"
    }

    fn step(&mut self, ctx: &mut GenerationContext, emitter: &mut GrainEmitter<'_>) -> Step {
        let Some(hit) = self.hits.get(self.next).copied() else {
            return Step::Done;
        };
        self.next += 1;
        emitter.emit(ctx, hit.choice, hit.time, self.range.end(), None);
        Step::Continue
    }
}
