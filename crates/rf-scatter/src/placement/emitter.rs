//! Grain emission shared by every placement mode
//!
//! Picks items, resolves target tracks, trims to the range, randomizes
//! pitch/volume/pan, clamps fades and marks crossfades.

use rand::Rng;
use rf_core::{TIME_EPSILON, db_to_linear};

use super::context::GenerationContext;
use super::distribution::{GrainTarget, Targets, extraction_for, select_targets};
use super::{GrainFade, PlannedGrain};
use crate::channel::{ExtractionOptions, TrackStructure};
use crate::config::EffectiveConfig;
use crate::source::SourceItem;

/// Item (and optional sub-area) picked for a grain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemChoice {
    pub index: usize,
    pub sub_area: Option<usize>,
}

/// Collects planned grains for one container
pub struct GrainEmitter<'a> {
    config: &'a EffectiveConfig,
    structure: &'a TrackStructure,
    items: &'a [SourceItem],
    options: ExtractionOptions,
    grains: Vec<PlannedGrain>,
    /// Index of the last grain per track
    last_on_track: Vec<Option<usize>>,
}

impl<'a> GrainEmitter<'a> {
    pub fn new(
        config: &'a EffectiveConfig,
        structure: &'a TrackStructure,
        items: &'a [SourceItem],
    ) -> Self {
        Self {
            config,
            structure,
            items,
            options: ExtractionOptions::from(&config.channels),
            grains: Vec::new(),
            last_on_track: vec![None; structure.num_tracks.max(1)],
        }
    }

    pub fn items(&self) -> &'a [SourceItem] {
        self.items
    }

    pub fn grains(&self) -> &[PlannedGrain] {
        &self.grains
    }

    pub fn into_grains(self) -> Vec<PlannedGrain> {
        self.grains
    }

    /// Pick a random item and sub-area
    pub fn choose_item(&self, ctx: &mut GenerationContext) -> Option<ItemChoice> {
        if self.items.is_empty() {
            return None;
        }
        let index = ctx.rng.random_range(0..self.items.len());
        let areas = self.items[index].sub_areas.len();
        let sub_area = (areas > 0).then(|| ctx.rng.random_range(0..areas));
        Some(ItemChoice { index, sub_area })
    }

    /// Untrimmed length of a choice
    pub fn playable_length(&self, choice: ItemChoice) -> f64 {
        self.items
            .get(choice.index)
            .map_or(0.0, |item| item.playable_length(choice.sub_area))
    }

    /// Place a grain at `position`. Returns the grain end, or `None` when the
    /// trimmed grain would be empty.
    pub fn emit(
        &mut self,
        ctx: &mut GenerationContext,
        choice: ItemChoice,
        position: f64,
        range_end: f64,
        fixed_track: Option<usize>,
    ) -> Option<f64> {
        let item = self.items.get(choice.index)?;
        let length = item.playable_length(choice.sub_area).min(range_end - position);
        if length <= TIME_EPSILON {
            return None;
        }

        let targets = match fixed_track {
            Some(track) => {
                let extraction =
                    extraction_for(ctx, self.structure, &self.options, item.num_channels, track);
                let mut targets = Targets::new();
                targets.push(GrainTarget {
                    track_index: track,
                    extraction,
                });
                targets
            }
            None => select_targets(
                ctx,
                self.structure,
                &self.config.channels,
                &self.options,
                choice.index,
                item.num_channels,
            ),
        };

        let placement = &self.config.placement;
        let pitch = item.original_pitch + placement.pitch.sample(&mut ctx.rng);
        let volume =
            item.original_volume * db_to_linear(item.gain_db + placement.volume.sample(&mut ctx.rng));
        let pan = (item.original_pan + placement.pan.sample(&mut ctx.rng)).clamp(-1.0, 1.0);

        let fades = &placement.fades;
        let fade_in = fades.fade_in.clamped(length).map(|length| GrainFade {
            length,
            shape: fades.fade_in.shape,
        });
        let fade_out = fades.fade_out.clamped(length).map(|length| GrainFade {
            length,
            shape: fades.fade_out.shape,
        });

        for (k, target) in targets.into_iter().enumerate() {
            if target.track_index >= self.last_on_track.len() {
                self.last_on_track.resize(target.track_index + 1, None);
            }
            let previous = self.last_on_track[target.track_index];

            // Crossfades only link grains on the primary track
            let crossfade_with = previous.filter(|&prev| {
                let prev = &self.grains[prev];
                k == 0 && fades.crossfade.enabled && position < prev.end() - TIME_EPSILON
            });

            self.last_on_track[target.track_index] = Some(self.grains.len());
            self.grains.push(PlannedGrain {
                track_index: target.track_index,
                position,
                length,
                source_index: choice.index,
                sub_area: choice.sub_area,
                source_offset: item.playable_offset(choice.sub_area),
                pitch,
                volume,
                pan,
                fade_in,
                fade_out,
                extraction: target.extraction,
                crossfade_with,
            });
        }

        Some(position + length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ItemsAnalysis, OutputFormat, resolve};
    use crate::config::{ChannelSettings, CrossfadeSpec, FadeShape, FadeSpec, PlacementSettings};
    use crate::placement::ContainerState;

    fn config(placement: PlacementSettings) -> EffectiveConfig {
        EffectiveConfig {
            placement,
            channels: ChannelSettings::new(OutputFormat::Stereo),
        }
    }

    #[test]
    fn test_emit_trims_to_range_end() {
        let config = config(PlacementSettings::default());
        let items = vec![SourceItem::new("a.wav", 2, 3.0)];
        let structure = resolve(&config.channels, &ItemsAnalysis::analyze(&items));
        let mut emitter = GrainEmitter::new(&config, &structure, &items);
        let mut ctx = GenerationContext::new(1, &ContainerState::default());

        let choice = ItemChoice {
            index: 0,
            sub_area: None,
        };
        let end = emitter.emit(&mut ctx, choice, 8.0, 10.0, None);
        assert_eq!(end, Some(10.0));
        assert_eq!(emitter.grains()[0].length, 2.0);

        // Nothing fits at the boundary
        assert_eq!(emitter.emit(&mut ctx, choice, 10.0, 10.0, None), None);
    }

    #[test]
    fn test_emit_marks_crossfade_and_clamps_fades() {
        let mut placement = PlacementSettings::default();
        placement.fades.fade_in = FadeSpec::new(5.0, FadeShape::EqualPower);
        placement.fades.crossfade = CrossfadeSpec {
            enabled: true,
            shape: FadeShape::SCurve,
        };
        let config = config(placement);
        let items = vec![SourceItem::new("a.wav", 2, 2.0)];
        let structure = resolve(&config.channels, &ItemsAnalysis::analyze(&items));
        let mut emitter = GrainEmitter::new(&config, &structure, &items);
        let mut ctx = GenerationContext::new(1, &ContainerState::default());
        let choice = ItemChoice {
            index: 0,
            sub_area: None,
        };

        emitter.emit(&mut ctx, choice, 0.0, 10.0, None);
        emitter.emit(&mut ctx, choice, 1.5, 10.0, None);
        emitter.emit(&mut ctx, choice, 4.0, 10.0, None);

        let grains = emitter.grains();
        assert_eq!(grains[0].fade_in.map(|f| f.length), Some(1.0));
        assert_eq!(grains[1].crossfade_with, Some(0));
        assert_eq!(grains[2].crossfade_with, None);
    }

    #[test]
    fn test_emit_uses_sub_area() {
        let config = config(PlacementSettings::default());
        let items = vec![SourceItem::new("a.wav", 2, 10.0).with_sub_area(4.0, 0.5, "hit")];
        let structure = resolve(&config.channels, &ItemsAnalysis::analyze(&items));
        let mut emitter = GrainEmitter::new(&config, &structure, &items);
        let mut ctx = GenerationContext::new(1, &ContainerState::default());

        let choice = emitter.choose_item(&mut ctx).unwrap();
        assert_eq!(choice.sub_area, Some(0));
        emitter.emit(&mut ctx, choice, 0.0, 10.0, None);
        assert_eq!(emitter.grains()[0].length, 0.5);
        assert_eq!(emitter.grains()[0].source_offset, 4.0);
    }
}
