//! Track and grain identifiers (REAPER-style folder hierarchy)
//!
//! The scatter engine addresses host tracks through opaque ids. Hierarchy is
//! expressed the REAPER way: a track whose folder depth is `1` opens a folder,
//! following tracks belong to it, and a negative depth closes that many levels.

use serde::{Deserialize, Serialize};

/// Unique track identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct TrackId(pub u64);

impl TrackId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get as u64
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Unique grain (media item) identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GrainId(pub u64);

/// Unique crossfade identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CrossfadeId(pub u64);

/// Maximum channels per track (REAPER's track channel limit)
pub const MAX_TRACK_CHANNELS: u32 = 128;

/// Folder depth opening a folder
pub const FOLDER_OPEN: i32 = 1;

/// Folder depth of a plain track inside a folder
pub const FOLDER_NONE: i32 = 0;

/// Round a channel count up to the even count a host track can carry.
///
/// Host tracks are provisioned in pairs; a mono requirement still needs 2.
#[inline]
pub fn even_channel_count(channels: u32) -> u32 {
    let channels = channels.clamp(2, MAX_TRACK_CHANNELS);
    channels + channels % 2
}

/// Folder depth for the last track of a folder closing `levels` folders
#[inline]
pub fn folder_close(levels: u32) -> i32 {
    -(levels as i32)
}
