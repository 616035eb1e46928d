//! Output formats and surround channel orders
//!
//! ITU order: `L R C LS RS [LB RB]` (center index 2).
//! SMPTE order: `L C R LS RS [LB RB]` (center index 1).

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Channel indices of one format (fits 7.0 without allocation)
pub type ChannelList = SmallVec<[u32; 8]>;

/// Surround channel ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurroundVariant {
    #[default]
    Itu,
    Smpte,
}

impl SurroundVariant {
    /// Center channel index in 5.x/7.x layouts
    pub fn center_index(&self) -> u32 {
        match self {
            SurroundVariant::Itu => 2,
            SurroundVariant::Smpte => 1,
        }
    }

    /// Channels of a `channels`-wide source that are not the center, in order.
    /// Only 5- and 7-channel layouts carry a center.
    pub fn non_center_channels(&self, channels: u32) -> ChannelList {
        let center = is_surround(channels).then(|| self.center_index());
        (0..channels).filter(|&ch| Some(ch) != center).collect()
    }

    pub fn name(&self) -> &'static str {
        match self {
            SurroundVariant::Itu => "ITU",
            SurroundVariant::Smpte => "SMPTE",
        }
    }
}

/// True for channel counts with a center channel (5.0 and 7.0)
#[inline]
pub fn is_surround(channels: u32) -> bool {
    channels == 5 || channels == 7
}

/// Output format of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Mono,
    #[default]
    Stereo,
    Quad,
    #[serde(rename = "5.0")]
    Surround50,
    #[serde(rename = "7.0")]
    Surround70,
}

const LABELS_MONO: &[&str] = &["M"];
const LABELS_STEREO: &[&str] = &["L", "R"];
const LABELS_QUAD: &[&str] = &["L", "R", "LS", "RS"];
const LABELS_50_ITU: &[&str] = &["L", "R", "C", "LS", "RS"];
const LABELS_50_SMPTE: &[&str] = &["L", "C", "R", "LS", "RS"];
const LABELS_70_ITU: &[&str] = &["L", "R", "C", "LS", "RS", "LB", "RB"];
const LABELS_70_SMPTE: &[&str] = &["L", "C", "R", "LS", "RS", "LB", "RB"];

const PAIR_LABELS: &[&str] = &["L+R", "LS+RS", "LB+RB"];

impl OutputFormat {
    /// Number of output channels
    pub fn channel_count(&self) -> u32 {
        match self {
            OutputFormat::Mono => 1,
            OutputFormat::Stereo => 2,
            OutputFormat::Quad => 4,
            OutputFormat::Surround50 => 5,
            OutputFormat::Surround70 => 7,
        }
    }

    /// Format for a channel count, if one exists
    pub fn from_channel_count(channels: u32) -> Option<Self> {
        match channels {
            1 => Some(OutputFormat::Mono),
            2 => Some(OutputFormat::Stereo),
            4 => Some(OutputFormat::Quad),
            5 => Some(OutputFormat::Surround50),
            7 => Some(OutputFormat::Surround70),
            _ => None,
        }
    }

    pub fn has_center(&self) -> bool {
        is_surround(self.channel_count())
    }

    /// Channel labels in output order
    pub fn labels(&self, variant: SurroundVariant) -> &'static [&'static str] {
        match (self, variant) {
            (OutputFormat::Mono, _) => LABELS_MONO,
            (OutputFormat::Stereo, _) => LABELS_STEREO,
            (OutputFormat::Quad, _) => LABELS_QUAD,
            (OutputFormat::Surround50, SurroundVariant::Itu) => LABELS_50_ITU,
            (OutputFormat::Surround50, SurroundVariant::Smpte) => LABELS_50_SMPTE,
            (OutputFormat::Surround70, SurroundVariant::Itu) => LABELS_70_ITU,
            (OutputFormat::Surround70, SurroundVariant::Smpte) => LABELS_70_SMPTE,
        }
    }

    /// Output channels excluding the center
    pub fn non_center_channels(&self, variant: SurroundVariant) -> ChannelList {
        variant.non_center_channels(self.channel_count())
    }

    /// Stereo pairs available on this format (center excluded)
    pub fn pair_count(&self) -> usize {
        (self.channel_count() / 2) as usize
    }

    /// Stereo pair destinations `(left, right)` with their labels
    pub fn pairs(&self, variant: SurroundVariant) -> Vec<(&'static str, [u32; 2])> {
        let channels = self.non_center_channels(variant);
        channels
            .chunks_exact(2)
            .zip(PAIR_LABELS.iter())
            .map(|(pair, label)| (*label, [pair[0], pair[1]]))
            .collect()
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::Mono => "Mono",
            OutputFormat::Stereo => "Stereo",
            OutputFormat::Quad => "Quad",
            OutputFormat::Surround50 => "5.0",
            OutputFormat::Surround70 => "7.0",
        }
    }
}
