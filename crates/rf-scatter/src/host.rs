//! Media host boundary
//!
//! The engine never touches a DAW directly. Everything it does to tracks and
//! grains goes through [`MediaHost`]. [`MemoryHost`] keeps the whole session
//! in memory for tests and dry runs:
//! - Ordered track list with REAPER-style folder depths
//! - Grains with their properties
//! - Crossfades between grain pairs

use std::collections::{HashMap, HashSet};

use rf_core::{CrossfadeId, GrainId, TimeRange, TrackId};
use serde::{Deserialize, Serialize};

use crate::channel::ExtractionPlan;
use crate::config::FadeShape;
use crate::placement::GrainFade;
use crate::source::SourceItem;
use crate::{ScatterError, ScatterResult};

// ═══════════════════════════════════════════════════════════════════════════════
// TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Property written to a grain after creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrainProperty {
    SourceOffset(f64),
    /// Semitones
    Pitch(f64),
    /// Linear gain
    Volume(f64),
    Pan(f64),
    FadeIn(GrainFade),
    FadeOut(GrainFade),
    Extraction(ExtractionPlan),
}

/// Host the engine creates tracks and grains in
pub trait MediaHost {
    /// Master output track
    fn master_track(&self) -> TrackId;

    /// Create a track directly after `after` (at the end when `None`)
    fn create_track(&mut self, name: &str, after: Option<TrackId>) -> ScatterResult<TrackId>;

    /// Delete a track with its grains
    fn delete_track(&mut self, track: TrackId) -> ScatterResult<()>;

    fn set_track_name(&mut self, track: TrackId, name: &str);

    /// Channel count of a track, `0` when unknown
    fn channel_count(&self, track: TrackId) -> u32;

    fn set_channel_count(&mut self, track: TrackId, channels: u32);

    fn folder_depth(&self, track: TrackId) -> i32;

    fn set_folder_depth(&mut self, track: TrackId, depth: i32);

    /// Create a grain playing `source`. Fails with `MissingSource` when the
    /// source file cannot be opened.
    fn create_grain(
        &mut self,
        track: TrackId,
        source: &SourceItem,
        position: f64,
        length: f64,
    ) -> ScatterResult<GrainId>;

    fn set_grain_property(&mut self, grain: GrainId, property: GrainProperty);

    fn create_crossfade(
        &mut self,
        first: GrainId,
        second: GrainId,
        shape: FadeShape,
    ) -> ScatterResult<CrossfadeId>;

    fn delete_grain(&mut self, grain: GrainId);

    fn count_grains(&self, track: TrackId) -> usize;

    /// Grains on `track` starting inside `range`, by position
    fn grains_in_range(&self, track: TrackId, range: TimeRange) -> Vec<GrainId>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// MEMORY HOST
// ═══════════════════════════════════════════════════════════════════════════════

/// Track in the in-memory session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostTrack {
    pub id: TrackId,
    pub name: String,
    pub channels: u32,
    pub folder_depth: i32,
}

impl HostTrack {
    fn new(id: TrackId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            channels: 2,
            folder_depth: 0,
        }
    }
}

/// Grain in the in-memory session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostGrain {
    pub id: GrainId,
    pub track: TrackId,
    pub source: String,
    pub source_channels: u32,
    pub position: f64,
    pub length: f64,
    pub source_offset: f64,
    pub pitch: f64,
    pub volume: f64,
    pub pan: f64,
    pub fade_in: Option<GrainFade>,
    pub fade_out: Option<GrainFade>,
    pub extraction: ExtractionPlan,
}

impl HostGrain {
    pub fn end(&self) -> f64 {
        self.position + self.length
    }
}

/// Crossfade in the in-memory session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostCrossfade {
    pub id: CrossfadeId,
    pub first: GrainId,
    pub second: GrainId,
    pub shape: FadeShape,
}

/// In-memory [`MediaHost`]
#[derive(Debug, Clone)]
pub struct MemoryHost {
    master: HostTrack,
    /// Tracks in session order
    tracks: Vec<HostTrack>,
    grains: HashMap<GrainId, HostGrain>,
    crossfades: Vec<HostCrossfade>,
    missing_sources: HashSet<String>,
    next_id: u64,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        Self {
            master: HostTrack::new(TrackId(0), "MASTER"),
            tracks: Vec::new(),
            grains: HashMap::new(),
            crossfades: Vec::new(),
            missing_sources: HashSet::new(),
            next_id: 1,
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Make `create_grain` fail for this file
    pub fn mark_missing(&mut self, file_path: &str) {
        self.missing_sources.insert(file_path.to_string());
    }

    fn index_of(&self, track: TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == track)
    }

    pub fn track(&self, track: TrackId) -> Option<&HostTrack> {
        if track == self.master.id {
            return Some(&self.master);
        }
        self.tracks.iter().find(|t| t.id == track)
    }

    fn track_mut(&mut self, track: TrackId) -> Option<&mut HostTrack> {
        if track == self.master.id {
            return Some(&mut self.master);
        }
        self.tracks.iter_mut().find(|t| t.id == track)
    }

    /// Tracks in session order (master excluded)
    pub fn tracks(&self) -> &[HostTrack] {
        &self.tracks
    }

    pub fn find_track(&self, name: &str) -> Option<&HostTrack> {
        self.tracks.iter().find(|t| t.name == name)
    }

    pub fn grain(&self, grain: GrainId) -> Option<&HostGrain> {
        self.grains.get(&grain)
    }

    /// Grains on a track, by position
    pub fn grains_on(&self, track: TrackId) -> Vec<&HostGrain> {
        let mut grains: Vec<&HostGrain> = self.grains.values().filter(|g| g.track == track).collect();
        grains.sort_by(|a, b| a.position.total_cmp(&b.position).then(a.id.cmp(&b.id)));
        grains
    }

    pub fn grain_count(&self) -> usize {
        self.grains.len()
    }

    pub fn crossfades(&self) -> &[HostCrossfade] {
        &self.crossfades
    }

    /// Folder parent derived from folder depths (`None` at top level)
    pub fn parent_of(&self, track: TrackId) -> Option<TrackId> {
        let mut open: Vec<TrackId> = Vec::new();
        for t in &self.tracks {
            if t.id == track {
                return open.last().copied();
            }
            if t.folder_depth > 0 {
                open.push(t.id);
            } else {
                for _ in 0..t.folder_depth.unsigned_abs() {
                    open.pop();
                }
            }
        }
        None
    }
}

impl MediaHost for MemoryHost {
    fn master_track(&self) -> TrackId {
        self.master.id
    }

    fn create_track(&mut self, name: &str, after: Option<TrackId>) -> ScatterResult<TrackId> {
        let index = match after {
            Some(after) => self.index_of(after).ok_or(ScatterError::UnknownTrack(after))? + 1,
            None => self.tracks.len(),
        };
        let id = TrackId(self.next_id());
        self.tracks.insert(index, HostTrack::new(id, name));
        log::debug!("Created track '{}' ({:?}) at index {}", name, id, index);
        Ok(id)
    }

    fn delete_track(&mut self, track: TrackId) -> ScatterResult<()> {
        let index = self.index_of(track).ok_or(ScatterError::UnknownTrack(track))?;
        self.tracks.remove(index);

        let removed: HashSet<GrainId> = self
            .grains
            .values()
            .filter(|g| g.track == track)
            .map(|g| g.id)
            .collect();
        self.grains.retain(|id, _| !removed.contains(id));
        self.crossfades
            .retain(|x| !removed.contains(&x.first) && !removed.contains(&x.second));
        Ok(())
    }

    fn set_track_name(&mut self, track: TrackId, name: &str) {
        if let Some(t) = self.track_mut(track) {
            t.name = name.to_string();
        }
    }

    fn channel_count(&self, track: TrackId) -> u32 {
        self.track(track).map_or(0, |t| t.channels)
    }

    fn set_channel_count(&mut self, track: TrackId, channels: u32) {
        if let Some(t) = self.track_mut(track) {
            t.channels = rf_core::even_channel_count(channels);
        }
    }

    fn folder_depth(&self, track: TrackId) -> i32 {
        self.track(track).map_or(0, |t| t.folder_depth)
    }

    fn set_folder_depth(&mut self, track: TrackId, depth: i32) {
        if let Some(t) = self.track_mut(track) {
            t.folder_depth = depth;
        }
    }

    fn create_grain(
        &mut self,
        track: TrackId,
        source: &SourceItem,
        position: f64,
        length: f64,
    ) -> ScatterResult<GrainId> {
        if source.file_path.is_empty() || self.missing_sources.contains(&source.file_path) {
            return Err(ScatterError::MissingSource(source.file_path.clone()));
        }
        if self.index_of(track).is_none() {
            return Err(ScatterError::UnknownTrack(track));
        }

        let id = GrainId(self.next_id());
        self.grains.insert(
            id,
            HostGrain {
                id,
                track,
                source: source.file_path.clone(),
                source_channels: source.num_channels,
                position,
                length,
                source_offset: source.start_offset,
                pitch: source.original_pitch,
                volume: source.original_volume,
                pan: source.original_pan,
                fade_in: None,
                fade_out: None,
                extraction: ExtractionPlan::None,
            },
        );
        Ok(id)
    }

    fn set_grain_property(&mut self, grain: GrainId, property: GrainProperty) {
        let Some(g) = self.grains.get_mut(&grain) else {
            log::warn!("Property {:?} for unknown grain {:?}", property, grain);
            return;
        };
        match property {
            GrainProperty::SourceOffset(offset) => g.source_offset = offset,
            GrainProperty::Pitch(pitch) => g.pitch = pitch,
            GrainProperty::Volume(volume) => g.volume = volume,
            GrainProperty::Pan(pan) => g.pan = pan,
            GrainProperty::FadeIn(fade) => g.fade_in = Some(fade),
            GrainProperty::FadeOut(fade) => g.fade_out = Some(fade),
            GrainProperty::Extraction(plan) => g.extraction = plan,
        }
    }

    fn create_crossfade(
        &mut self,
        first: GrainId,
        second: GrainId,
        shape: FadeShape,
    ) -> ScatterResult<CrossfadeId> {
        for grain in [first, second] {
            if !self.grains.contains_key(&grain) {
                return Err(ScatterError::UnknownGrain(grain));
            }
        }
        let id = CrossfadeId(self.next_id());
        self.crossfades.push(HostCrossfade {
            id,
            first,
            second,
            shape,
        });
        Ok(id)
    }

    fn delete_grain(&mut self, grain: GrainId) {
        if self.grains.remove(&grain).is_some() {
            self.crossfades.retain(|x| x.first != grain && x.second != grain);
        }
    }

    fn count_grains(&self, track: TrackId) -> usize {
        self.grains.values().filter(|g| g.track == track).count()
    }

    fn grains_in_range(&self, track: TrackId, range: TimeRange) -> Vec<GrainId> {
        self.grains_on(track)
            .into_iter()
            .filter(|g| range.contains(g.position))
            .map(|g| g.id)
            .collect()
    }
}
