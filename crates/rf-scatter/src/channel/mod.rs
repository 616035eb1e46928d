//! Channel handling
//!
//! - [`format`]: output formats, ITU/SMPTE channel orders
//! - [`analysis`]: channel statistics of an item pool
//! - [`topology`]: rule cascade choosing the output track layout
//! - [`extraction`]: per-track source channel/pair selection

pub mod analysis;
pub mod extraction;
pub mod format;
pub mod topology;

pub use analysis::*;
pub use extraction::*;
pub use format::*;
pub use topology::*;

use serde::{Deserialize, Serialize};

/// Requested source channel selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelSelectionMode {
    /// Let the topology resolver decide
    #[default]
    None,
    /// One source channel per track
    Mono,
    /// One source pair per track
    Stereo,
    /// Source pairs split into two mono tracks
    SplitStereo,
}
