//! Timeline placement engine
//!
//! Every interval mode is a small state machine implementing [`Placer`]. The
//! driver steps it until it reports [`Step::Done`] or hits its iteration cap.
//! Placers only decide; the resulting [`PlacementPlan`] is applied to a host
//! separately.
//!
//! | Mode | Placer |
//! |------|--------|
//! | Absolute / Relative | `IntervalPlacer` |
//! | Coverage | `CoveragePlacer` |
//! | Chunk | `ChunkPlacer` (interval placer per active window) |
//! | Noise | `NoisePlacer` |
//! | Euclidean | `EuclideanPlacer` |

mod chunk;
mod context;
mod coverage;
mod distribution;
mod emitter;
mod euclidean;
mod interval;
mod noise;

pub use chunk::ChunkPlacer;
pub use context::*;
pub use coverage::CoveragePlacer;
pub use distribution::{GrainTarget, Targets, extraction_for, select_targets};
pub use emitter::{GrainEmitter, ItemChoice};
pub use euclidean::{EuclideanPlacer, euclidean_times};
pub use interval::IntervalPlacer;
pub use noise::{NoiseHit, NoisePlacer, noise_hits};

use rf_core::{TempoMap, TimeRange};
use serde::{Deserialize, Serialize};

use crate::channel::{ExtractionPlan, TrackStructure};
use crate::config::{DistributionMode, EffectiveConfig, FadeShape, IntervalMode};
use crate::oracle::Oracles;
use crate::source::SourceItem;
use crate::warning::ScatterWarning;
use crate::{MAX_PLACEMENT_ITERATIONS, ScatterResult};

// ═══════════════════════════════════════════════════════════════════════════════
// PLAN
// ═══════════════════════════════════════════════════════════════════════════════

/// Fade applied to a planned grain
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrainFade {
    pub length: f64,
    pub shape: FadeShape,
}

/// One grain decided by a placer, not yet on the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedGrain {
    /// Output track within the container layout
    pub track_index: usize,
    pub position: f64,
    pub length: f64,
    pub source_index: usize,
    pub sub_area: Option<usize>,
    pub source_offset: f64,
    /// Semitones
    pub pitch: f64,
    /// Linear gain
    pub volume: f64,
    pub pan: f64,
    pub fade_in: Option<GrainFade>,
    pub fade_out: Option<GrainFade>,
    pub extraction: ExtractionPlan,
    /// Earlier planned grain this one crossfades with
    pub crossfade_with: Option<usize>,
}

impl PlannedGrain {
    #[inline]
    pub fn end(&self) -> f64 {
        self.position + self.length
    }
}

/// Output of [`plan`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlacementPlan {
    pub grains: Vec<PlannedGrain>,
    /// Placer steps taken (all placers summed)
    pub iterations: usize,
}

/// Inputs shared by every placer of one pass
#[derive(Clone, Copy)]
pub struct PlacementInputs<'a> {
    pub range: TimeRange,
    pub tempo: &'a TempoMap,
    pub oracles: Oracles<'a>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// PLACER
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of one placer step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Done,
}

/// Placement state machine
pub trait Placer {
    /// Name used in cap warnings
    fn name(&self) -> &'static str;

    /// Advance by at most one grain
    fn step(&mut self, ctx: &mut GenerationContext, emitter: &mut GrainEmitter<'_>) -> Step;

    /// Called once after the last step (summary warnings)
    fn finish(&mut self, _ctx: &mut GenerationContext) {}

    fn iteration_cap(&self) -> usize {
        MAX_PLACEMENT_ITERATIONS
    }
}

/// Step a placer until done or capped. Returns the steps taken.
pub fn drive(
    placer: &mut dyn Placer,
    ctx: &mut GenerationContext,
    emitter: &mut GrainEmitter<'_>,
) -> usize {
    let cap = placer.iteration_cap();
    let mut iterations = 0;
    loop {
        if iterations >= cap {
            ctx.warn(ScatterWarning::IterationCap {
                context: format!("{} placement", placer.name()),
                cap,
            });
            break;
        }
        iterations += 1;
        if placer.step(ctx, emitter) == Step::Done {
            break;
        }
    }
    placer.finish(ctx);
    iterations
}

/// Decide every grain of one container
pub fn plan(
    config: &EffectiveConfig,
    structure: &TrackStructure,
    items: &[SourceItem],
    inputs: &PlacementInputs<'_>,
    ctx: &mut GenerationContext,
) -> ScatterResult<PlacementPlan> {
    let settings = &config.placement;
    if settings.interval_mode == IntervalMode::Noise {
        settings.noise.validate()?;
    }
    if items.is_empty() {
        return Ok(PlacementPlan::default());
    }

    let range = inputs.range;
    let mut emitter = GrainEmitter::new(config, structure, items);
    let mut iterations = 0;

    match settings.interval_mode {
        IntervalMode::Absolute | IntervalMode::Relative => {
            let interval = match settings.interval_mode {
                IntervalMode::Relative => range.length() * settings.trigger_rate / 100.0,
                _ => settings.trigger_rate,
            };

            let independent = config.channels.distribution_mode == DistributionMode::AllTracks
                && structure.use_distribution
                && structure.num_tracks > 1
                && config.channels.routing_matrix.is_empty();

            if independent {
                for track in 0..structure.num_tracks {
                    let mut placer = IntervalPlacer::new(range, interval, settings, Some(track));
                    iterations += drive(&mut placer, ctx, &mut emitter);
                }
            } else {
                let mut placer = IntervalPlacer::new(range, interval, settings, None);
                iterations += drive(&mut placer, ctx, &mut emitter);
            }
        }
        IntervalMode::Coverage => {
            let mut placer = CoveragePlacer::new(range, settings);
            iterations += drive(&mut placer, ctx, &mut emitter);
        }
        IntervalMode::Chunk => {
            let mut placer = ChunkPlacer::new(range, settings);
            iterations += drive(&mut placer, ctx, &mut emitter);
        }
        IntervalMode::Noise => {
            let mut placer = NoisePlacer::new(&settings.noise, range, inputs.oracles.noise, items, ctx);
            iterations += drive(&mut placer, ctx, &mut emitter);
        }
        IntervalMode::Euclidean => {
            let mut placer = EuclideanPlacer::new(
                &settings.euclidean,
                range,
                inputs.tempo,
                inputs.oracles.pattern,
                ctx,
            );
            iterations += drive(&mut placer, ctx, &mut emitter);
        }
    }

    let grains = emitter.into_grains();
    log::debug!(
        "Placed {} grains ({} mode, {} steps)",
        grains.len(),
        settings.interval_mode.name(),
        iterations
    );
    Ok(PlacementPlan { grains, iterations })
}
