//! Euclidean placement
//!
//! Layers are combined into one step pattern; active steps become grain
//! times either on a tempo-locked grid (pattern repeats until the range end)
//! or stretched once over the whole range.

use rf_core::{TempoMap, TimeRange};

use super::context::GenerationContext;
use super::emitter::GrainEmitter;
use super::{Placer, Step};
use crate::MAX_PLACEMENT_ITERATIONS;
use crate::config::{EuclideanSettings, EuclideanTiming};
use crate::oracle::PatternCombiner;
use crate::warning::ScatterWarning;

/// Grain times for a Euclidean configuration
pub fn euclidean_times(
    settings: &EuclideanSettings,
    range: TimeRange,
    tempo: &TempoMap,
    combiner: &dyn PatternCombiner,
    ctx: &mut GenerationContext,
) -> Vec<f64> {
    let (pattern, length) = combiner.combine(&settings.layers);
    // Steps past the end of the pattern are rests
    let hit = |k: usize| pattern.get(k).copied().unwrap_or(false);
    if length == 0 || !pattern.iter().any(|&hit| hit) {
        ctx.warn(ScatterWarning::EmptyPattern);
        return Vec::new();
    }

    let mut times = Vec::new();
    match settings.timing {
        EuclideanTiming::Fit => {
            let step = range.length() / length as f64;
            times.extend(
                (0..length)
                    .filter(|&k| hit(k))
                    .map(|k| range.start() + k as f64 * step)
                    .filter(|&t| t < range.end()),
            );
        }
        EuclideanTiming::TempoLocked { grid } => {
            let grid_beats = grid.to_beats();
            if !grid_beats.is_finite() || grid_beats <= 0.0 {
                log::warn!("Euclidean grid {} has no length", grid.name());
                ctx.warn(ScatterWarning::EmptyPattern);
                return times;
            }
            let start_beats = tempo.seconds_to_beats(range.start());
            let mut capped = true;
            for k in 0..MAX_PLACEMENT_ITERATIONS {
                let t = tempo.beats_to_seconds(start_beats + k as f64 * grid_beats);
                if t >= range.end() {
                    capped = false;
                    break;
                }
                if hit(k % length) {
                    times.push(t.max(range.start()));
                }
            }
            if capped {
                ctx.warn(ScatterWarning::IterationCap {
                    context: "euclidean grid".to_string(),
                    cap: MAX_PLACEMENT_ITERATIONS,
                });
            }
        }
    }
    log::debug!(
        "Euclidean pattern of {} steps → {} grain times",
        length,
        times.len()
    );
    times
}

#[derive(Debug, Clone)]
pub struct EuclideanPlacer {
    range: TimeRange,
    times: Vec<f64>,
    next: usize,
}

impl EuclideanPlacer {
    pub fn new(
        settings: &EuclideanSettings,
        range: TimeRange,
        tempo: &TempoMap,
        combiner: &dyn PatternCombiner,
        ctx: &mut GenerationContext,
    ) -> Self {
        Self {
            range,
            times: euclidean_times(settings, range, tempo, combiner, ctx),
            next: 0,
        }
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }
}

impl Placer for EuclideanPlacer {
    fn name(&self) -> &'static str {
        "euclidean"
    }

    fn step(&mut self, ctx: &mut GenerationContext, emitter: &mut GrainEmitter<'_>) -> Step {
        let Some(&time) = self.times.get(self.next) else {
            return Step::Done;
        };
        self.next += 1;
        let Some(choice) = emitter.choose_item(ctx) else {
            return Step::Done;
        };
        emitter.emit(ctx, choice, time, self.range.end(), None);
        Step::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EuclideanLayer;
    use crate::oracle::EuclideanCombiner;
    use crate::placement::ContainerState;
    use approx::assert_abs_diff_eq;
    use rf_core::GridValue;

    fn ctx() -> GenerationContext {
        GenerationContext::new(0, &ContainerState::default())
    }

    #[test]
    fn test_fit_single_repetition() {
        let settings = EuclideanSettings {
            layers: vec![EuclideanLayer::new(3, 8, 0)],
            timing: EuclideanTiming::Fit,
        };
        let range = TimeRange::new(0.0, 8.0).unwrap();
        let times = euclidean_times(&settings, range, &TempoMap::default(), &EuclideanCombiner, &mut ctx());
        assert_eq!(times, vec![0.0, 3.0, 6.0]);
    }

    #[test]
    fn test_tempo_locked_repeats() {
        // 120 BPM, eighth grid → 0.25s per step, 8 steps = 2s per cycle
        let settings = EuclideanSettings {
            layers: vec![EuclideanLayer::new(3, 8, 0)],
            timing: EuclideanTiming::TempoLocked {
                grid: GridValue::Eighth,
            },
        };
        let range = TimeRange::new(0.0, 4.0).unwrap();
        let times = euclidean_times(&settings, range, &TempoMap::constant(120.0), &EuclideanCombiner, &mut ctx());
        let expected = [0.0, 0.75, 1.5, 2.0, 2.75, 3.5];
        assert_eq!(times.len(), expected.len());
        for (t, e) in times.iter().zip(expected) {
            assert_abs_diff_eq!(*t, e, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_combined_layers_lcm() {
        let settings = EuclideanSettings {
            layers: vec![EuclideanLayer::new(1, 8, 0), EuclideanLayer::new(1, 12, 0)],
            timing: EuclideanTiming::Fit,
        };
        let range = TimeRange::new(0.0, 24.0).unwrap();
        let times = euclidean_times(&settings, range, &TempoMap::default(), &EuclideanCombiner, &mut ctx());
        // Hits at 0, 8, 16 (layer 1) and 0, 12 (layer 2) on a 24-step grid
        assert_eq!(times, vec![0.0, 8.0, 12.0, 16.0]);
    }

    /// Reports a grid longer than the pattern it returns
    struct LongGridCombiner;

    impl PatternCombiner for LongGridCombiner {
        fn combine(&self, _layers: &[EuclideanLayer]) -> (Vec<bool>, usize) {
            (vec![true, false], 4)
        }
    }

    #[test]
    fn test_steps_beyond_pattern_are_rests() {
        let fit = EuclideanSettings {
            layers: vec![EuclideanLayer::new(1, 2, 0)],
            timing: EuclideanTiming::Fit,
        };
        let range = TimeRange::new(0.0, 8.0).unwrap();
        let times = euclidean_times(&fit, range, &TempoMap::default(), &LongGridCombiner, &mut ctx());
        assert_eq!(times, vec![0.0]);

        // 120 BPM quarter grid → 0.5s per step, 4 steps per cycle
        let locked = EuclideanSettings {
            timing: EuclideanTiming::TempoLocked {
                grid: GridValue::Quarter,
            },
            ..fit
        };
        let times = euclidean_times(&locked, range, &TempoMap::constant(120.0), &LongGridCombiner, &mut ctx());
        assert_eq!(times.len(), 4);
        for (t, e) in times.iter().zip([0.0, 2.0, 4.0, 6.0]) {
            assert_abs_diff_eq!(*t, e, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_empty_pattern_warns() {
        let settings = EuclideanSettings {
            layers: vec![EuclideanLayer::new(0, 8, 0)],
            timing: EuclideanTiming::Fit,
        };
        let range = TimeRange::new(0.0, 8.0).unwrap();
        let mut ctx = ctx();
        let times = euclidean_times(&settings, range, &TempoMap::default(), &EuclideanCombiner, &mut ctx);
        assert!(times.is_empty());
        assert_eq!(ctx.warnings, vec![ScatterWarning::EmptyPattern]);
    }
}
