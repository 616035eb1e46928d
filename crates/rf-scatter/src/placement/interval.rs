//! Absolute / Relative interval placement
//!
//! Grains follow each other with a fixed gap after the previous grain's end.
//! A negative gap overlaps grains; items shorter than the overlap are skipped.

use rf_core::TimeRange;

use super::context::GenerationContext;
use super::emitter::GrainEmitter;
use super::{Placer, Step};
use crate::NEGATIVE_INTERVAL_NUDGE;
use crate::config::{DriftDirection, PlacementSettings};
use crate::oracle::{uniform, variation};
use crate::warning::ScatterWarning;

/// Fixed-interval placer
#[derive(Debug, Clone)]
pub struct IntervalPlacer {
    range: TimeRange,
    /// Gap in seconds (negative = overlap)
    interval: f64,
    drift_percent: f64,
    direction: DriftDirection,
    fixed_track: Option<usize>,
    /// End of the last placed grain
    cursor: f64,
    placed_first: bool,
    skipped: usize,
    min_required_length: f64,
}

impl IntervalPlacer {
    pub fn new(
        range: TimeRange,
        interval: f64,
        settings: &PlacementSettings,
        fixed_track: Option<usize>,
    ) -> Self {
        Self {
            range,
            interval,
            drift_percent: settings.trigger_drift,
            direction: settings.drift_direction,
            fixed_track,
            cursor: range.start(),
            placed_first: false,
            skipped: 0,
            min_required_length: 0.0,
        }
    }

    /// Items skipped for being shorter than the overlap, and the length they needed
    pub fn skipped(&self) -> (usize, f64) {
        (self.skipped, self.min_required_length)
    }
}

impl Placer for IntervalPlacer {
    fn name(&self) -> &'static str {
        "interval"
    }

    fn step(&mut self, ctx: &mut GenerationContext, emitter: &mut GrainEmitter<'_>) -> Step {
        let end = self.range.end();
        if self.cursor >= end {
            return Step::Done;
        }
        let Some(choice) = emitter.choose_item(ctx) else {
            return Step::Done;
        };

        let candidate = if !self.placed_first {
            self.range.start() + uniform(0.0, self.interval.max(0.0), &mut ctx.rng)
        } else {
            if self.interval < 0.0 {
                let overlap = self.interval.abs();
                if emitter.playable_length(choice) < overlap {
                    self.skipped += 1;
                    self.min_required_length = self.min_required_length.max(overlap);
                    self.cursor += NEGATIVE_INTERVAL_NUDGE;
                    return Step::Continue;
                }
            }
            let drift = variation(
                self.interval.abs(),
                self.drift_percent,
                self.direction,
                &mut ctx.rng,
            );
            self.cursor + self.interval + drift
        };
        let position = candidate.max(self.range.start());

        if position >= end {
            return Step::Done;
        }
        self.placed_first = true;

        match emitter.emit(ctx, choice, position, end, self.fixed_track) {
            Some(grain_end) if grain_end > self.cursor => self.cursor = grain_end,
            Some(_) => self.cursor += NEGATIVE_INTERVAL_NUDGE,
            None => self.cursor = self.cursor.max(position) + NEGATIVE_INTERVAL_NUDGE,
        }
        Step::Continue
    }

    fn finish(&mut self, ctx: &mut GenerationContext) {
        if self.skipped > 0 {
            ctx.warn(ScatterWarning::ItemsTooShort {
                skipped: self.skipped,
                min_length: self.min_required_length,
            });
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ItemsAnalysis, OutputFormat, resolve};
    use crate::config::{ChannelSettings, EffectiveConfig, IntervalMode};
    use crate::placement::{ContainerState, drive};
    use crate::source::SourceItem;

    fn run(interval: f64, items: Vec<SourceItem>, range: TimeRange) -> (Vec<(f64, f64)>, GenerationContext) {
        let config = EffectiveConfig {
            placement: PlacementSettings::default().with_interval(IntervalMode::Absolute, interval),
            channels: ChannelSettings::new(OutputFormat::Stereo),
        };
        let structure = resolve(&config.channels, &ItemsAnalysis::analyze(&items));
        let mut emitter = GrainEmitter::new(&config, &structure, &items);
        let mut ctx = GenerationContext::new(3, &ContainerState::default());
        let mut placer = IntervalPlacer::new(range, interval, &config.placement, None);
        drive(&mut placer, &mut ctx, &mut emitter);
        let grains = emitter.grains().iter().map(|g| (g.position, g.end())).collect();
        (grains, ctx)
    }

    #[test]
    fn test_positive_interval_gaps() {
        let range = TimeRange::new(0.0, 20.0).unwrap();
        let (grains, _) = run(1.0, vec![SourceItem::new("a.wav", 2, 2.0)], range);
        assert!(grains.len() >= 6);
        for pair in grains.windows(2) {
            approx::assert_abs_diff_eq!(pair[1].0, pair[0].1 + 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_negative_interval_overlaps() {
        let range = TimeRange::new(0.0, 10.0).unwrap();
        let (grains, ctx) = run(-0.5, vec![SourceItem::new("a.wav", 2, 2.0)], range);
        assert!(grains.len() > 5);
        assert_eq!(grains[0].0, 0.0);
        for pair in grains.windows(2) {
            assert!(pair[1].0 < pair[0].1);
        }
        assert!(ctx.warnings.is_empty());
    }

    #[test]
    fn test_short_items_skipped_with_warning() {
        let range = TimeRange::new(0.0, 10.0).unwrap();
        let (grains, ctx) = run(-3.0, vec![SourceItem::new("a.wav", 2, 2.0)], range);
        // First grain is always placed, every later candidate is too short
        assert_eq!(grains.len(), 1);
        match &ctx.warnings[..] {
            [ScatterWarning::ItemsTooShort { skipped, min_length }] => {
                assert!(*skipped > 0);
                assert_eq!(*min_length, 3.0);
            }
            other => panic!("unexpected warnings {:?}", other),
        }
    }
}
