//! Channel topology resolver
//!
//! Decides how many output tracks a container needs, how wide they are, how
//! they route into the container's output format and which extraction mode
//! feeds them. Evaluated as an ordered rule list, first match wins:
//!
//! 1. Mixed channel counts → mono per output channel
//! 2. Empty pool → passthrough
//! 3. Native match → passthrough
//! 4. Mono items → mono distribution
//! 5. Explicit stereo
//! 6. Explicit mono / split-stereo
//! 7. Auto-optimization (own sub-cascade)
//!
//! Pure: no host access, no randomness.

use serde::{Deserialize, Serialize};
use smallvec::smallvec;

use super::ChannelSelectionMode;
use super::analysis::ItemsAnalysis;
use super::format::{ChannelList, OutputFormat, is_surround};
use crate::config::ChannelSettings;
use crate::warning::ScatterWarning;

// ═══════════════════════════════════════════════════════════════════════════════
// TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Which rule produced a structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyStrategy {
    MixedChannels,
    EmptyPassthrough,
    NativePassthrough,
    MonoDistribution,
    StereoFallbackMono,
    StereoPairSelection,
    StereoPairMapping,
    StereoPairExtraction,
    MonoSelection,
    SplitStereo,
    StereoInSurround,
    QuadInSurround,
    SurroundSmartRouting,
    FrontDownmix,
    UnknownVariantDownmix,
    ChannelOneDownmix,
    MonoAutoDistribution,
}

impl TopologyStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            TopologyStrategy::MixedChannels => "mixed_channels",
            TopologyStrategy::EmptyPassthrough => "empty_passthrough",
            TopologyStrategy::NativePassthrough => "native_passthrough",
            TopologyStrategy::MonoDistribution => "mono_distribution",
            TopologyStrategy::StereoFallbackMono => "stereo_fallback_mono",
            TopologyStrategy::StereoPairSelection => "stereo_pair_selection",
            TopologyStrategy::StereoPairMapping => "stereo_pair_mapping",
            TopologyStrategy::StereoPairExtraction => "stereo_pair_extraction",
            TopologyStrategy::MonoSelection => "mono_selection",
            TopologyStrategy::SplitStereo => "split_stereo",
            TopologyStrategy::StereoInSurround => "stereo_in_surround",
            TopologyStrategy::QuadInSurround => "quad_in_surround",
            TopologyStrategy::SurroundSmartRouting => "surround_smart_routing",
            TopologyStrategy::FrontDownmix => "front_downmix",
            TopologyStrategy::UnknownVariantDownmix => "unknown_variant_downmix",
            TopologyStrategy::ChannelOneDownmix => "channel_one_downmix",
            TopologyStrategy::MonoAutoDistribution => "mono_auto_distribution",
        }
    }
}

/// Width class of an output track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackType {
    Mono,
    Stereo,
    Multi,
}

impl TrackType {
    fn for_width(channels: u32) -> Self {
        match channels {
            0 | 1 => TrackType::Mono,
            2 => TrackType::Stereo,
            _ => TrackType::Multi,
        }
    }
}

/// Output channels one track feeds, indexed by the track's own channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRoute {
    pub destinations: ChannelList,
}

impl ChannelRoute {
    /// Track channel `k` → output channel `k`
    pub fn contiguous(width: u32) -> Self {
        Self {
            destinations: (0..width).collect(),
        }
    }

    pub fn mono(channel: u32) -> Self {
        Self {
            destinations: smallvec![channel],
        }
    }

    pub fn pair(pair: [u32; 2]) -> Self {
        Self {
            destinations: smallvec![pair[0], pair[1]],
        }
    }

    /// Highest output channel fed, if any
    pub fn max_channel(&self) -> Option<u32> {
        self.destinations.iter().copied().max()
    }
}

/// Identity of a resolved layout, persisted between passes to detect downgrades
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopologyTag {
    pub strategy: TopologyStrategy,
    pub num_tracks: usize,
    pub track_channels: u32,
}

/// Resolved output layout of a container
#[derive(Debug, Clone, PartialEq)]
pub struct TrackStructure {
    pub strategy: TopologyStrategy,
    pub num_tracks: usize,
    pub track_type: TrackType,
    /// Width of every output track
    pub track_channels: u32,
    /// Some track gets an extraction other than `None`
    pub needs_channel_selection: bool,
    pub channel_selection_mode: ChannelSelectionMode,
    /// Each grain goes to one track chosen by the distribution mode
    pub use_distribution: bool,
    /// Each grain goes to every track with its own extraction
    pub use_smart_routing: bool,
    /// More tracks than distinct source channels/pairs
    pub upsampling: bool,
    pub track_labels: Vec<String>,
    pub routes: Vec<ChannelRoute>,
    pub warning: Option<ScatterWarning>,
}

impl TrackStructure {
    fn new(strategy: TopologyStrategy, track_channels: u32) -> Self {
        Self {
            strategy,
            num_tracks: 0,
            track_type: TrackType::for_width(track_channels),
            track_channels,
            needs_channel_selection: false,
            channel_selection_mode: ChannelSelectionMode::None,
            use_distribution: false,
            use_smart_routing: false,
            upsampling: false,
            track_labels: Vec::new(),
            routes: Vec::new(),
            warning: None,
        }
    }

    fn push_track(&mut self, label: &str, route: ChannelRoute) {
        self.track_labels.push(label.to_string());
        self.routes.push(route);
        self.num_tracks = self.routes.len();
        self.use_distribution = self.num_tracks > 1 && !self.use_smart_routing;
    }

    fn with_selection(mut self, mode: ChannelSelectionMode) -> Self {
        self.channel_selection_mode = mode;
        self.needs_channel_selection = mode != ChannelSelectionMode::None;
        self
    }

    fn with_smart_routing(mut self) -> Self {
        self.use_smart_routing = true;
        self.use_distribution = false;
        self
    }

    fn with_warning(mut self, warning: ScatterWarning) -> Self {
        self.warning = Some(warning);
        self
    }

    /// Output channels the theoretical layout needs
    pub fn required_channels(&self) -> u32 {
        self.required_channels_for(self.num_tracks)
    }

    /// Output channels needed when `track_count` tracks actually exist.
    /// Tracks beyond the resolved routes stack above the highest routed channel.
    pub fn required_channels_for(&self, track_count: usize) -> u32 {
        let mut highest = 0;
        for index in 0..track_count.max(1) {
            highest = match self.routes.get(index).and_then(ChannelRoute::max_channel) {
                Some(channel) => highest.max(channel + 1),
                None => highest + self.track_channels.max(1),
            };
        }
        highest.max(1)
    }

    pub fn tag(&self) -> TopologyTag {
        TopologyTag {
            strategy: self.strategy,
            num_tracks: self.num_tracks,
            track_channels: self.track_channels,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RULES
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything a rule looks at
struct TopologyInput<'a> {
    settings: &'a ChannelSettings,
    analysis: &'a ItemsAnalysis,
    /// Output channel count (`C`)
    output: u32,
    /// Dominant item channel count (`N`)
    items: u32,
}

impl TopologyInput<'_> {
    fn format(&self) -> OutputFormat {
        self.settings.output_format
    }

    fn mode(&self) -> ChannelSelectionMode {
        self.settings.selection_mode
    }
}

struct TopologyRule {
    name: &'static str,
    applies: fn(&TopologyInput) -> bool,
    build: fn(&TopologyInput) -> TrackStructure,
}

const RULES: &[TopologyRule] = &[
    TopologyRule {
        name: "mixed_channels",
        applies: |i| !i.analysis.is_homogeneous,
        build: mixed_channels,
    },
    TopologyRule {
        name: "empty_passthrough",
        applies: |i| i.analysis.is_empty,
        build: |i| passthrough(TopologyStrategy::EmptyPassthrough, i),
    },
    TopologyRule {
        name: "native_passthrough",
        applies: |i| i.items == i.output && i.mode() == ChannelSelectionMode::None,
        build: |i| passthrough(TopologyStrategy::NativePassthrough, i),
    },
    TopologyRule {
        name: "mono_distribution",
        applies: |i| i.items == 1,
        build: |i| full_mono_layout(TopologyStrategy::MonoDistribution, i),
    },
    TopologyRule {
        name: "explicit_stereo",
        applies: |i| i.mode() == ChannelSelectionMode::Stereo,
        build: explicit_stereo,
    },
    TopologyRule {
        name: "explicit_mono",
        applies: |i| {
            matches!(
                i.mode(),
                ChannelSelectionMode::Mono | ChannelSelectionMode::SplitStereo
            )
        },
        build: explicit_mono,
    },
    TopologyRule {
        name: "auto",
        applies: |_| true,
        build: auto_optimize,
    },
];

const AUTO_RULES: &[TopologyRule] = &[
    TopologyRule {
        name: "stereo_in_surround",
        applies: |i| i.items == 2 && i.output >= 4,
        build: |i| {
            pair_layout(
                TopologyStrategy::StereoInSurround,
                i,
                2,
                ChannelSelectionMode::None,
            )
        },
    },
    TopologyRule {
        name: "quad_in_surround",
        applies: |i| i.items == 4 && is_surround(i.output),
        build: |i| {
            pair_layout(
                TopologyStrategy::QuadInSurround,
                i,
                2,
                ChannelSelectionMode::Stereo,
            )
            .with_smart_routing()
        },
    },
    TopologyRule {
        name: "surround_smart_routing",
        applies: |i| {
            is_surround(i.items)
                && i.output < i.items
                && i.output >= 2
                && i.settings.source_variant.is_some()
        },
        build: |i| {
            labeled_mono_layout(
                TopologyStrategy::SurroundSmartRouting,
                i,
                ChannelSelectionMode::Mono,
            )
            .with_smart_routing()
        },
    },
    TopologyRule {
        name: "front_downmix",
        applies: |i| i.items >= 4 && i.items % 2 == 0 && i.output <= 2,
        build: front_downmix,
    },
    TopologyRule {
        name: "unknown_variant_downmix",
        applies: |i| is_surround(i.items) && i.output < i.items && i.settings.source_variant.is_none(),
        build: |i| {
            channel_one(TopologyStrategy::UnknownVariantDownmix, i)
                .with_warning(ScatterWarning::UnknownSurroundVariant { channels: i.items })
        },
    },
    TopologyRule {
        name: "channel_one_downmix",
        applies: |i| i.output == 1,
        build: |i| {
            channel_one(TopologyStrategy::ChannelOneDownmix, i).with_warning(
                ScatterWarning::LossyDownmix {
                    from: i.items,
                    to: 1,
                },
            )
        },
    },
    TopologyRule {
        name: "mono_auto_distribution",
        applies: |_| true,
        build: auto_mono_distribution,
    },
];

/// Run a rule list, first match wins
fn cascade(rules: &[TopologyRule], input: &TopologyInput) -> Option<TrackStructure> {
    let rule = rules.iter().find(|rule| (rule.applies)(input))?;
    log::debug!(
        "Topology rule '{}' matched ({} ch items → {} ch output)",
        rule.name,
        input.items,
        input.output
    );
    Some((rule.build)(input))
}

/// Resolve the output layout for a container
pub fn resolve(settings: &ChannelSettings, analysis: &ItemsAnalysis) -> TrackStructure {
    let input = TopologyInput {
        settings,
        analysis,
        output: settings.output_channels(),
        items: analysis.dominant_channel_count,
    };

    // The last rule always applies
    let structure = cascade(RULES, &input).unwrap_or_else(|| auto_mono_distribution(&input));

    if let Some(warning) = &structure.warning {
        log::debug!("Topology '{}': {}", structure.strategy.name(), warning);
    }
    structure
}

// ═══════════════════════════════════════════════════════════════════════════════
// LAYOUT BUILDERS
// ═══════════════════════════════════════════════════════════════════════════════

/// One track as wide as the output format
fn passthrough(strategy: TopologyStrategy, input: &TopologyInput) -> TrackStructure {
    let mut structure = TrackStructure::new(strategy, input.output);
    structure.push_track(input.format().name(), ChannelRoute::contiguous(input.output));
    structure
}

/// One mono track per output channel, center included
fn full_mono_layout(strategy: TopologyStrategy, input: &TopologyInput) -> TrackStructure {
    let mut structure = TrackStructure::new(strategy, 1);
    let labels = input.format().labels(input.settings.output_variant);
    for (channel, label) in labels.iter().enumerate() {
        structure.push_track(label, ChannelRoute::mono(channel as u32));
    }
    structure
}

/// One mono track per labeled output channel, center skipped
fn labeled_mono_layout(
    strategy: TopologyStrategy,
    input: &TopologyInput,
    mode: ChannelSelectionMode,
) -> TrackStructure {
    let variant = input.settings.output_variant;
    let labels = input.format().labels(variant);
    let mut structure = TrackStructure::new(strategy, 1).with_selection(mode);
    for channel in input.format().non_center_channels(variant) {
        structure.push_track(labels[channel as usize], ChannelRoute::mono(channel));
    }
    structure
}

/// Stereo tracks on the first `count` output pairs
fn pair_layout(
    strategy: TopologyStrategy,
    input: &TopologyInput,
    count: usize,
    mode: ChannelSelectionMode,
) -> TrackStructure {
    let mut structure = TrackStructure::new(strategy, 2).with_selection(mode);
    for (label, pair) in input
        .format()
        .pairs(input.settings.output_variant)
        .into_iter()
        .take(count)
    {
        structure.push_track(label, ChannelRoute::pair(pair));
    }
    structure
}

/// Single mono track playing source channel 1
fn channel_one(strategy: TopologyStrategy, input: &TopologyInput) -> TrackStructure {
    let mut structure = TrackStructure::new(strategy, 1).with_selection(ChannelSelectionMode::Mono);
    let label = input.format().labels(input.settings.output_variant)[0];
    structure.push_track(label, ChannelRoute::mono(0));
    structure
}

fn mixed_channels(input: &TopologyInput) -> TrackStructure {
    full_mono_layout(TopologyStrategy::MixedChannels, input)
        .with_selection(ChannelSelectionMode::Mono)
        .with_warning(ScatterWarning::MixedChannelCounts {
            counts: input.analysis.unique_channel_counts.clone(),
        })
}

fn explicit_stereo(input: &TopologyInput) -> TrackStructure {
    if input.items % 2 != 0 {
        return labeled_mono_layout(
            TopologyStrategy::StereoFallbackMono,
            input,
            ChannelSelectionMode::Mono,
        )
        .with_warning(ScatterWarning::OddChannelStereo {
            channels: input.items,
        });
    }

    match input.output {
        1 => labeled_mono_layout(
            TopologyStrategy::StereoFallbackMono,
            input,
            ChannelSelectionMode::Mono,
        )
        .with_warning(ScatterWarning::StereoOnMonoOutput),
        2 => {
            let mut structure = TrackStructure::new(TopologyStrategy::StereoPairSelection, 2);
            structure.push_track("L+R", ChannelRoute::contiguous(2));
            if input.items > 2 {
                structure = structure.with_selection(ChannelSelectionMode::Stereo);
            } else {
                structure.channel_selection_mode = ChannelSelectionMode::Stereo;
            }
            structure
        }
        _ if input.items == 2 => pair_layout(
            TopologyStrategy::StereoPairMapping,
            input,
            2,
            ChannelSelectionMode::None,
        ),
        _ => {
            let target_pairs = input.format().pair_count();
            let mut structure = pair_layout(
                TopologyStrategy::StereoPairExtraction,
                input,
                target_pairs,
                ChannelSelectionMode::Stereo,
            );
            structure.upsampling = ((input.items / 2) as usize) < target_pairs;
            structure
        }
    }
}

fn explicit_mono(input: &TopologyInput) -> TrackStructure {
    if input.mode() == ChannelSelectionMode::SplitStereo && input.items % 2 != 0 {
        return labeled_mono_layout(
            TopologyStrategy::StereoFallbackMono,
            input,
            ChannelSelectionMode::Mono,
        )
        .with_warning(ScatterWarning::OddChannelStereo {
            channels: input.items,
        });
    }

    let strategy = match input.mode() {
        ChannelSelectionMode::SplitStereo => TopologyStrategy::SplitStereo,
        _ => TopologyStrategy::MonoSelection,
    };
    let mut structure = labeled_mono_layout(strategy, input, input.mode());
    structure.upsampling = structure.num_tracks as u32 > input.items;
    structure
}

fn auto_optimize(input: &TopologyInput) -> TrackStructure {
    cascade(AUTO_RULES, input).unwrap_or_else(|| auto_mono_distribution(input))
}

fn front_downmix(input: &TopologyInput) -> TrackStructure {
    let warning = ScatterWarning::LossyDownmix {
        from: input.items,
        to: input.output,
    };
    if input.output == 1 {
        return channel_one(TopologyStrategy::FrontDownmix, input).with_warning(warning);
    }

    let mut structure = TrackStructure::new(TopologyStrategy::FrontDownmix, 2)
        .with_selection(ChannelSelectionMode::Stereo);
    structure.push_track("L+R", ChannelRoute::contiguous(2));
    structure.with_warning(warning)
}

fn auto_mono_distribution(input: &TopologyInput) -> TrackStructure {
    let mut structure = full_mono_layout(TopologyStrategy::MonoAutoDistribution, input);
    if input.items > 1 {
        structure = structure.with_selection(ChannelSelectionMode::Mono);
    }
    structure.upsampling = structure.num_tracks as u32 > input.items;
    structure
}
