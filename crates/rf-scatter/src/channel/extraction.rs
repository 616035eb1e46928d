//! Channel extraction: which source channel or pair an output track plays
//!
//! All channel and pair indices are 0-based.

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use super::ChannelSelectionMode;
use super::format::{SurroundVariant, is_surround};
use crate::config::ChannelSettings;

/// Extraction applied to one grain on one track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionPlan {
    /// Play the item as-is
    #[default]
    None,
    /// Play a single source channel
    Mono { channel: u32 },
    /// Play source channels `2·pair` and `2·pair + 1`
    Stereo { pair: u32 },
}

impl ExtractionPlan {
    /// Channels the grain occupies after extraction
    pub fn output_channels(&self, item_channels: u32) -> u32 {
        match self {
            ExtractionPlan::None => item_channels,
            ExtractionPlan::Mono { .. } => 1,
            ExtractionPlan::Stereo { .. } => 2,
        }
    }
}

/// User choices that steer extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtractionOptions {
    pub source_variant: Option<SurroundVariant>,
    pub forced_channel: Option<u32>,
    pub forced_pair: Option<u32>,
}

impl From<&ChannelSettings> for ExtractionOptions {
    fn from(settings: &ChannelSettings) -> Self {
        Self {
            source_variant: settings.source_variant,
            forced_channel: settings.forced_channel,
            forced_pair: settings.forced_pair,
        }
    }
}

/// Random index below `available`, or `slot % available` without an RNG
fn pick(available: u32, slot: usize, rng: Option<&mut dyn RngCore>) -> u32 {
    if available <= 1 {
        return 0;
    }
    match rng {
        Some(rng) => rng.random_range(0..available),
        None => (slot % available as usize) as u32,
    }
}

/// Resolve the extraction for an item of `item_channels` placed on output
/// track `slot`.
pub fn extract(
    item_channels: u32,
    slot: usize,
    mode: ChannelSelectionMode,
    options: &ExtractionOptions,
    rng: Option<&mut dyn RngCore>,
) -> ExtractionPlan {
    match mode {
        ChannelSelectionMode::None => ExtractionPlan::None,
        ChannelSelectionMode::Mono => extract_mono(item_channels, slot, options, rng),
        ChannelSelectionMode::Stereo => extract_stereo(item_channels, slot, options, rng),
        ChannelSelectionMode::SplitStereo => {
            extract_split_stereo(item_channels, slot, options, rng)
        }
    }
}

fn extract_mono(
    item_channels: u32,
    slot: usize,
    options: &ExtractionOptions,
    rng: Option<&mut dyn RngCore>,
) -> ExtractionPlan {
    if item_channels <= 1 {
        return ExtractionPlan::None;
    }

    if let Some(forced) = options.forced_channel {
        let channel = if forced < item_channels {
            forced
        } else {
            pick(item_channels, slot, rng)
        };
        return ExtractionPlan::Mono { channel };
    }

    let channels = match options.source_variant {
        Some(variant) if is_surround(item_channels) => variant.non_center_channels(item_channels),
        _ => (0..item_channels).collect(),
    };

    let channel = match channels.get(slot) {
        Some(&channel) => channel,
        // More tracks than usable channels: upsample from a random one
        None => channels[pick(channels.len() as u32, slot, rng) as usize],
    };
    ExtractionPlan::Mono { channel }
}

fn extract_stereo(
    item_channels: u32,
    slot: usize,
    options: &ExtractionOptions,
    rng: Option<&mut dyn RngCore>,
) -> ExtractionPlan {
    if item_channels % 2 != 0 {
        return extract_mono(item_channels, slot, options, rng);
    }
    if item_channels == 2 {
        return ExtractionPlan::None;
    }

    let pairs = item_channels / 2;
    let pair = match options.forced_pair {
        Some(forced) if forced < pairs => forced,
        Some(_) => pick(pairs, slot, rng),
        None if (slot as u32) < pairs => slot as u32,
        None => pick(pairs, slot, rng),
    };
    ExtractionPlan::Stereo { pair }
}

fn extract_split_stereo(
    item_channels: u32,
    slot: usize,
    options: &ExtractionOptions,
    rng: Option<&mut dyn RngCore>,
) -> ExtractionPlan {
    if item_channels % 2 != 0 {
        return extract_mono(item_channels, slot, options, rng);
    }

    let pairs = item_channels / 2;
    let wanted = (slot / 2) as u32;
    let pair = match options.forced_pair {
        Some(forced) if forced < pairs => forced,
        Some(_) => pick(pairs, slot, rng),
        None if wanted < pairs => wanted,
        None => pick(pairs, slot, rng),
    };
    ExtractionPlan::Mono {
        channel: 2 * pair + (slot % 2) as u32,
    }
}
