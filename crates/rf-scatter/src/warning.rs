//! Non-fatal generation warnings
//!
//! Warnings are accumulated per container and never abort generation of
//! sibling containers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Warning raised while resolving, placing or stabilizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScatterWarning {
    /// Item pool mixes channel counts; mono distribution was forced
    MixedChannelCounts { counts: Vec<u32> },
    /// Stereo extraction requested on items with an odd channel count
    OddChannelStereo { channels: u32 },
    /// Stereo extraction requested on a mono output format
    StereoOnMonoOutput,
    /// Auto-optimization folded more source channels into fewer outputs
    LossyDownmix { from: u32, to: u32 },
    /// Surround items without a known channel order were folded to channel 1
    UnknownSurroundVariant { channels: u32 },
    /// Items shorter than a negative interval were skipped
    ItemsTooShort {
        skipped: usize,
        min_length: f64,
    },
    /// A placement loop stopped at its iteration cap
    IterationCap { context: String, cap: usize },
    /// Euclidean layers produced no active step
    EmptyPattern,
    /// Custom routing entry pointed at a track the layout does not have
    RoutingOutOfRange { item: usize, track: usize },
    /// Stabilization stopped without reaching a fixed point
    StabilizationNotConverged { iterations: usize },
}

impl fmt::Display for ScatterWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MixedChannelCounts { counts } => {
                let list: Vec<String> = counts.iter().map(|c| c.to_string()).collect();
                write!(
                    f,
                    "Mixed channel counts ({}), forcing mono distribution",
                    list.join(", ")
                )
            }
            Self::OddChannelStereo { channels } => write!(
                f,
                "Stereo selection needs an even channel count, items have {}; using mono",
                channels
            ),
            Self::StereoOnMonoOutput => {
                write!(f, "Stereo selection on a mono output; using mono")
            }
            Self::LossyDownmix { from, to } => {
                write!(f, "Downmixing {}-channel items to {} channel(s)", from, to)
            }
            Self::UnknownSurroundVariant { channels } => write!(
                f,
                "Unknown channel order for {}-channel items; using channel 1 only",
                channels
            ),
            Self::ItemsTooShort {
                skipped,
                min_length,
            } => write!(
                f,
                "{} item(s) skipped: negative interval needs items of at least {:.3}s",
                skipped, min_length
            ),
            Self::IterationCap { context, cap } => {
                write!(f, "{} stopped after {} iterations", context, cap)
            }
            Self::EmptyPattern => write!(f, "Euclidean pattern has no active steps"),
            Self::RoutingOutOfRange { item, track } => write!(
                f,
                "Routing for item {} targets track {} which does not exist",
                item, track
            ),
            Self::StabilizationNotConverged { iterations } => write!(
                f,
                "Channel stabilization did not converge after {} passes",
                iterations
            ),
        }
    }
}
