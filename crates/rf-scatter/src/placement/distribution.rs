//! Grain → output track distribution
//!
//! Priority: custom routing matrix, smart routing, single track, then the
//! container's distribution mode (round-robin, random, all tracks).

use rand::Rng;
use smallvec::SmallVec;

use super::context::GenerationContext;
use crate::channel::{ExtractionOptions, ExtractionPlan, TrackStructure, extract};
use crate::config::{ChannelSettings, DistributionMode};
use crate::warning::ScatterWarning;

/// One output track a grain is placed on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrainTarget {
    pub track_index: usize,
    pub extraction: ExtractionPlan,
}

pub type Targets = SmallVec<[GrainTarget; 8]>;

/// Extraction for an item placed on `track`
pub fn extraction_for(
    ctx: &mut GenerationContext,
    structure: &TrackStructure,
    options: &ExtractionOptions,
    item_channels: u32,
    track: usize,
) -> ExtractionPlan {
    if !structure.needs_channel_selection {
        return ExtractionPlan::None;
    }
    extract(
        item_channels,
        track,
        structure.channel_selection_mode,
        options,
        Some(&mut ctx.rng),
    )
}

/// Resolve every track a grain of item `item_index` goes to
pub fn select_targets(
    ctx: &mut GenerationContext,
    structure: &TrackStructure,
    channels: &ChannelSettings,
    options: &ExtractionOptions,
    item_index: usize,
    item_channels: u32,
) -> Targets {
    let num_tracks = structure.num_tracks.max(1);

    if let Some(routes) = channels.routing_matrix.get(&item_index) {
        let targets = custom_targets(ctx, routes, num_tracks, item_index, item_channels);
        if !targets.is_empty() {
            return targets;
        }
    }

    let single = |ctx: &mut GenerationContext, track: usize| -> Targets {
        let extraction = extraction_for(ctx, structure, options, item_channels, track);
        SmallVec::from_elem(
            GrainTarget {
                track_index: track,
                extraction,
            },
            1,
        )
    };

    if structure.use_smart_routing {
        return all_tracks(ctx, structure, options, item_channels, num_tracks);
    }
    if num_tracks == 1 || !structure.use_distribution {
        return single(ctx, 0);
    }

    match channels.distribution_mode {
        DistributionMode::RoundRobin => {
            let track = ctx.round_robin % num_tracks;
            ctx.round_robin = ctx.round_robin.wrapping_add(1);
            single(ctx, track)
        }
        DistributionMode::Random => {
            let track = ctx.rng.random_range(0..num_tracks);
            single(ctx, track)
        }
        DistributionMode::AllTracks => {
            all_tracks(ctx, structure, options, item_channels, num_tracks)
        }
    }
}

fn all_tracks(
    ctx: &mut GenerationContext,
    structure: &TrackStructure,
    options: &ExtractionOptions,
    item_channels: u32,
    num_tracks: usize,
) -> Targets {
    (0..num_tracks)
        .map(|track| GrainTarget {
            track_index: track,
            extraction: extraction_for(ctx, structure, options, item_channels, track),
        })
        .collect()
}

/// Routing matrix entries: deduplicated destinations, out-of-range dropped
fn custom_targets(
    ctx: &mut GenerationContext,
    routes: &[crate::config::RoutingEntry],
    num_tracks: usize,
    item_index: usize,
    item_channels: u32,
) -> Targets {
    let mut targets = Targets::new();
    for route in routes {
        if route.destination_track >= num_tracks {
            ctx.warn(ScatterWarning::RoutingOutOfRange {
                item: item_index,
                track: route.destination_track,
            });
            continue;
        }
        if targets
            .iter()
            .any(|t: &GrainTarget| t.track_index == route.destination_track)
        {
            continue;
        }
        let extraction = if item_channels > 1 {
            ExtractionPlan::Mono {
                channel: route.source_channel.min(item_channels - 1),
            }
        } else {
            ExtractionPlan::None
        };
        targets.push(GrainTarget {
            track_index: route.destination_track,
            extraction,
        });
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelSelectionMode, ItemsAnalysis, OutputFormat, resolve};
    use crate::config::RoutingEntry;
    use crate::placement::ContainerState;

    fn ctx() -> GenerationContext {
        GenerationContext::new(11, &ContainerState::default())
    }

    fn quad_mono() -> (ChannelSettings, TrackStructure) {
        let settings = ChannelSettings::new(OutputFormat::Quad);
        let structure = resolve(&settings, &ItemsAnalysis::from_channel_counts([1]));
        (settings, structure)
    }

    #[test]
    fn test_round_robin_cycles() {
        let (settings, structure) = quad_mono();
        let mut ctx = ctx();
        let opts = ExtractionOptions::from(&settings);
        let tracks: Vec<usize> = (0..6)
            .map(|_| select_targets(&mut ctx, &structure, &settings, &opts, 0, 1)[0].track_index)
            .collect();
        assert_eq!(tracks, vec![0, 1, 2, 3, 0, 1]);
        assert_eq!(ctx.round_robin, 6);
    }

    #[test]
    fn test_all_tracks_broadcast() {
        let (settings, structure) = quad_mono();
        let settings = settings.with_distribution(DistributionMode::AllTracks);
        let opts = ExtractionOptions::from(&settings);
        let targets = select_targets(&mut ctx(), &structure, &settings, &opts, 0, 1);
        assert_eq!(targets.len(), 4);
    }

    #[test]
    fn test_random_within_tracks() {
        let (settings, structure) = quad_mono();
        let settings = settings.with_distribution(DistributionMode::Random);
        let opts = ExtractionOptions::from(&settings);
        let mut ctx = ctx();
        for _ in 0..50 {
            let targets = select_targets(&mut ctx, &structure, &settings, &opts, 0, 1);
            assert_eq!(targets.len(), 1);
            assert!(targets[0].track_index < 4);
        }
    }

    #[test]
    fn test_custom_routing_wins() {
        let (mut settings, structure) = quad_mono();
        settings.routing_matrix.insert(
            0,
            vec![
                RoutingEntry {
                    source_channel: 1,
                    destination_track: 2,
                },
                RoutingEntry {
                    source_channel: 0,
                    destination_track: 2,
                },
                RoutingEntry {
                    source_channel: 0,
                    destination_track: 9,
                },
            ],
        );
        let opts = ExtractionOptions::from(&settings);
        let mut ctx = ctx();
        let targets = select_targets(&mut ctx, &structure, &settings, &opts, 0, 2);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].track_index, 2);
        assert_eq!(targets[0].extraction, ExtractionPlan::Mono { channel: 1 });
        assert_eq!(
            ctx.warnings,
            vec![ScatterWarning::RoutingOutOfRange { item: 0, track: 9 }]
        );
        // Round-robin counter untouched
        assert_eq!(ctx.round_robin, 0);
    }

    #[test]
    fn test_smart_routing_extracts_per_track() {
        let settings = ChannelSettings::new(OutputFormat::Surround50);
        let structure = resolve(&settings, &ItemsAnalysis::from_channel_counts([4]));
        assert!(structure.use_smart_routing);
        let opts = ExtractionOptions::from(&settings);
        let targets = select_targets(&mut ctx(), &structure, &settings, &opts, 0, 4);
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].extraction, ExtractionPlan::Stereo { pair: 0 });
        assert_eq!(targets[1].extraction, ExtractionPlan::Stereo { pair: 1 });
    }

    #[test]
    fn test_single_track_structure() {
        let settings = ChannelSettings::new(OutputFormat::Stereo).with_selection(ChannelSelectionMode::None);
        let structure = resolve(&settings, &ItemsAnalysis::from_channel_counts([2]));
        let opts = ExtractionOptions::from(&settings);
        let targets = select_targets(&mut ctx(), &structure, &settings, &opts, 0, 2);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].extraction, ExtractionPlan::None);
    }
}
