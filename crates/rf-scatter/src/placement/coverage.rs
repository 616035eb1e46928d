//! Coverage placement
//!
//! `coverage` percent of the range is filled with sound. After each grain a
//! theoretical cursor advances by `length × 100 / coverage`; drift perturbs
//! the next start around it but never before the previous grain's end.

use rf_core::TimeRange;

use super::context::GenerationContext;
use super::emitter::GrainEmitter;
use super::{Placer, Step};
use crate::NEGATIVE_INTERVAL_NUDGE;
use crate::config::{DriftDirection, PlacementSettings};
use crate::oracle::variation;

#[derive(Debug, Clone)]
pub struct CoveragePlacer {
    range: TimeRange,
    /// Percent of the range covered
    coverage: f64,
    drift_percent: f64,
    direction: DriftDirection,
    /// End of the last placed grain
    cursor: f64,
    /// Drift-free start of the next grain
    theoretical: f64,
    placed_first: bool,
}

impl CoveragePlacer {
    pub fn new(range: TimeRange, settings: &PlacementSettings) -> Self {
        Self {
            range,
            coverage: settings.trigger_rate,
            drift_percent: settings.trigger_drift,
            direction: settings.drift_direction,
            cursor: range.start(),
            theoretical: range.start(),
            placed_first: false,
        }
    }

    /// Gap between theoretical starts for a grain of `length`
    fn interval_for(&self, length: f64) -> f64 {
        if self.coverage <= 0.0 {
            return self.range.length();
        }
        length * 100.0 / self.coverage
    }
}

impl Placer for CoveragePlacer {
    fn name(&self) -> &'static str {
        "coverage"
    }

    fn step(&mut self, ctx: &mut GenerationContext, emitter: &mut GrainEmitter<'_>) -> Step {
        let end = self.range.end();
        if self.cursor >= end {
            return Step::Done;
        }
        let Some(choice) = emitter.choose_item(ctx) else {
            return Step::Done;
        };

        let expected = emitter.playable_length(choice).min(self.range.length());
        let drift = variation(
            self.interval_for(expected),
            self.drift_percent,
            self.direction,
            &mut ctx.rng,
        );

        let mut position = self.theoretical + drift;
        if self.placed_first {
            position = position.max(self.cursor);
        }
        let position = position.max(self.range.start());
        if position >= end {
            return Step::Done;
        }

        match emitter.emit(ctx, choice, position, end, None) {
            Some(grain_end) => {
                self.theoretical += self.interval_for(grain_end - position);
                self.cursor = grain_end;
                self.placed_first = true;
            }
            None => {
                self.theoretical += NEGATIVE_INTERVAL_NUDGE;
                self.cursor = self.cursor.max(position) + NEGATIVE_INTERVAL_NUDGE;
            }
        }
        Step::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ItemsAnalysis, OutputFormat, resolve};
    use crate::config::{ChannelSettings, EffectiveConfig, IntervalMode};
    use crate::placement::{ContainerState, drive};
    use crate::source::SourceItem;

    fn positions(coverage: f64, drift: f64, length: f64, range: TimeRange) -> Vec<(f64, f64)> {
        let config = EffectiveConfig {
            placement: PlacementSettings::default()
                .with_interval(IntervalMode::Coverage, coverage)
                .with_drift(drift, DriftDirection::Bidirectional),
            channels: ChannelSettings::new(OutputFormat::Stereo),
        };
        let items = vec![SourceItem::new("a.wav", 2, length)];
        let structure = resolve(&config.channels, &ItemsAnalysis::analyze(&items));
        let mut emitter = GrainEmitter::new(&config, &structure, &items);
        let mut ctx = GenerationContext::new(5, &ContainerState::default());
        drive(&mut CoveragePlacer::new(range, &config.placement), &mut ctx, &mut emitter);
        emitter.grains().iter().map(|g| (g.position, g.end())).collect()
    }

    #[test]
    fn test_half_coverage() {
        let grains = positions(50.0, 0.0, 2.0, TimeRange::new(0.0, 10.0).unwrap());
        let starts: Vec<f64> = grains.iter().map(|g| g.0).collect();
        assert_eq!(starts, vec![0.0, 4.0, 8.0]);
    }

    #[test]
    fn test_zero_coverage_single_grain() {
        let grains = positions(0.0, 0.0, 2.0, TimeRange::new(0.0, 10.0).unwrap());
        assert_eq!(grains.len(), 1);
    }

    #[test]
    fn test_drift_never_overlaps() {
        let grains = positions(90.0, 80.0, 1.0, TimeRange::new(0.0, 60.0).unwrap());
        assert!(grains.len() > 10);
        for pair in grains.windows(2) {
            assert!(pair[1].0 >= pair[0].1 - 1e-9);
        }
    }

    #[test]
    fn test_full_coverage_back_to_back() {
        let grains = positions(100.0, 0.0, 2.5, TimeRange::new(0.0, 10.0).unwrap());
        let total: f64 = grains.iter().map(|g| g.1 - g.0).sum();
        approx::assert_abs_diff_eq!(total, 10.0, epsilon = 1e-9);
    }
}
