//! Chunk placement
//!
//! Alternates active windows (filled by an interval placer) and silent
//! windows. Window lengths vary independently by their own percentages.

use rf_core::TimeRange;

use super::context::GenerationContext;
use super::emitter::GrainEmitter;
use super::interval::IntervalPlacer;
use super::{Placer, Step};
use crate::config::{ChunkSettings, DriftDirection, PlacementSettings};
use crate::oracle::variation;
use crate::warning::ScatterWarning;
use crate::{MAX_CHUNK_INNER_ITERATIONS, MAX_CHUNK_WINDOWS};

#[derive(Debug, Clone)]
pub struct ChunkPlacer {
    range: TimeRange,
    chunk: ChunkSettings,
    settings: PlacementSettings,
    /// Start of the next window
    cursor: f64,
    windows: usize,
    inner: Option<IntervalPlacer>,
    inner_steps: usize,
    skipped: usize,
    min_required_length: f64,
}

impl ChunkPlacer {
    pub fn new(range: TimeRange, settings: &PlacementSettings) -> Self {
        Self {
            range,
            chunk: settings.chunk,
            settings: settings.clone(),
            cursor: range.start(),
            windows: 0,
            inner: None,
            inner_steps: 0,
            skipped: 0,
            min_required_length: 0.0,
        }
    }

    /// Windows opened so far
    pub fn windows(&self) -> usize {
        self.windows
    }

    fn close_window(&mut self) {
        if let Some(inner) = self.inner.take() {
            let (skipped, min_length) = inner.skipped();
            self.skipped += skipped;
            self.min_required_length = self.min_required_length.max(min_length);
        }
        self.inner_steps = 0;
    }

    /// Open the next active window, skipping windows too short to hold time
    fn open_window(&mut self, ctx: &mut GenerationContext) {
        let active = self.chunk.duration
            + variation(
                self.chunk.duration,
                self.chunk.duration_variation,
                DriftDirection::Bidirectional,
                &mut ctx.rng,
            );
        let silence = (self.chunk.silence
            + variation(
                self.chunk.silence,
                self.chunk.silence_variation,
                DriftDirection::Bidirectional,
                &mut ctx.rng,
            ))
        .max(0.0);

        let window_end = (self.cursor + active.max(0.0)).min(self.range.end());
        if let Ok(window) = TimeRange::new(self.cursor, window_end) {
            log::debug!(
                "Chunk window {}: {:.3}s → {:.3}s",
                self.windows,
                window.start(),
                window.end()
            );
            self.inner = Some(IntervalPlacer::new(
                window,
                self.settings.trigger_rate,
                &self.settings,
                None,
            ));
        }
        self.windows += 1;
        self.cursor = window_end + silence;
    }
}

impl Placer for ChunkPlacer {
    fn name(&self) -> &'static str {
        "chunk"
    }

    fn step(&mut self, ctx: &mut GenerationContext, emitter: &mut GrainEmitter<'_>) -> Step {
        if let Some(inner) = self.inner.as_mut() {
            if self.inner_steps >= MAX_CHUNK_INNER_ITERATIONS {
                ctx.warn(ScatterWarning::IterationCap {
                    context: "chunk window".to_string(),
                    cap: MAX_CHUNK_INNER_ITERATIONS,
                });
                self.close_window();
            } else {
                self.inner_steps += 1;
                if inner.step(ctx, emitter) == Step::Done {
                    self.close_window();
                }
            }
            return Step::Continue;
        }

        if self.cursor >= self.range.end() || self.chunk.duration <= 0.0 {
            return Step::Done;
        }
        if self.windows >= MAX_CHUNK_WINDOWS {
            ctx.warn(ScatterWarning::IterationCap {
                context: "chunk windows".to_string(),
                cap: MAX_CHUNK_WINDOWS,
            });
            return Step::Done;
        }

        self.open_window(ctx);
        Step::Continue
    }

    fn finish(&mut self, ctx: &mut GenerationContext) {
        self.close_window();
        if self.skipped > 0 {
            ctx.warn(ScatterWarning::ItemsTooShort {
                skipped: self.skipped,
                min_length: self.min_required_length,
            });
        }
    }

    fn iteration_cap(&self) -> usize {
        MAX_CHUNK_WINDOWS * (MAX_CHUNK_INNER_ITERATIONS + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ItemsAnalysis, OutputFormat, resolve};
    use crate::config::{ChannelSettings, EffectiveConfig, IntervalMode};
    use crate::placement::{ContainerState, drive};
    use crate::source::SourceItem;

    #[test]
    fn test_grains_only_in_active_windows() {
        let mut placement = PlacementSettings::default().with_interval(IntervalMode::Chunk, 0.5);
        placement.chunk = ChunkSettings {
            duration: 4.0,
            duration_variation: 0.0,
            silence: 6.0,
            silence_variation: 0.0,
        };
        let config = EffectiveConfig {
            placement,
            channels: ChannelSettings::new(OutputFormat::Stereo),
        };
        let items = vec![SourceItem::new("a.wav", 2, 1.0)];
        let structure = resolve(&config.channels, &ItemsAnalysis::analyze(&items));
        let mut emitter = GrainEmitter::new(&config, &structure, &items);
        let mut ctx = GenerationContext::new(9, &ContainerState::default());
        let range = TimeRange::new(0.0, 30.0).unwrap();

        let mut placer = ChunkPlacer::new(range, &config.placement);
        drive(&mut placer, &mut ctx, &mut emitter);

        // Windows [0,4) [10,14) [20,24)
        assert_eq!(placer.windows(), 3);
        assert!(!emitter.grains().is_empty());
        for grain in emitter.grains() {
            let window_start = (grain.position / 10.0).floor() * 10.0;
            assert!(grain.position >= window_start);
            assert!(grain.end() <= window_start + 4.0 + 1e-9);
        }
    }

    #[test]
    fn test_window_step_cap_closes_window() {
        // Every step after the first skips and nudges by 0.01s, so a 20s window outlasts the cap
        let mut placement = PlacementSettings::default().with_interval(IntervalMode::Chunk, -1.0);
        placement.chunk = ChunkSettings {
            duration: 20.0,
            duration_variation: 0.0,
            silence: 6.0,
            silence_variation: 0.0,
        };
        let config = EffectiveConfig {
            placement,
            channels: ChannelSettings::new(OutputFormat::Stereo),
        };
        let items = vec![SourceItem::new("a.wav", 2, 0.5)];
        let structure = resolve(&config.channels, &ItemsAnalysis::analyze(&items));
        let mut emitter = GrainEmitter::new(&config, &structure, &items);
        let mut ctx = GenerationContext::new(9, &ContainerState::default());
        let range = TimeRange::new(0.0, 20.0).unwrap();

        let mut placer = ChunkPlacer::new(range, &config.placement);
        drive(&mut placer, &mut ctx, &mut emitter);

        assert_eq!(placer.windows(), 1);
        assert_eq!(emitter.grains().len(), 1);
        assert!(ctx.warnings.contains(&ScatterWarning::IterationCap {
            context: "chunk window".to_string(),
            cap: MAX_CHUNK_INNER_ITERATIONS,
        }));
        assert!(ctx.warnings.contains(&ScatterWarning::ItemsTooShort {
            skipped: MAX_CHUNK_INNER_ITERATIONS - 1,
            min_length: 1.0,
        }));
    }

    #[test]
    fn test_zero_duration_places_nothing() {
        let mut placement = PlacementSettings::default().with_interval(IntervalMode::Chunk, 0.5);
        placement.chunk.duration = 0.0;
        let config = EffectiveConfig {
            placement,
            channels: ChannelSettings::new(OutputFormat::Stereo),
        };
        let items = vec![SourceItem::new("a.wav", 2, 1.0)];
        let structure = resolve(&config.channels, &ItemsAnalysis::analyze(&items));
        let mut emitter = GrainEmitter::new(&config, &structure, &items);
        let mut ctx = GenerationContext::new(9, &ContainerState::default());
        let range = TimeRange::new(0.0, 30.0).unwrap();

        let steps = drive(&mut ChunkPlacer::new(range, &config.placement), &mut ctx, &mut emitter);
        assert_eq!(steps, 1);
        assert!(emitter.grains().is_empty());
    }
}
