//! Plan application
//!
//! Turns a [`PlacementPlan`] into host grains, and keeps a container's child
//! tracks in line with its resolved [`TrackStructure`].

use rf_core::{GrainId, TimeRange, TrackId, even_channel_count};
use serde::{Deserialize, Serialize};

use crate::channel::{ExtractionPlan, TrackStructure};
use crate::config::FadeShape;
use crate::host::{GrainProperty, MediaHost};
use crate::placement::PlacementPlan;
use crate::source::SourceItem;
use crate::{ScatterError, ScatterResult};

// ═══════════════════════════════════════════════════════════════════════════════
// CONTAINER TRACKS
// ═══════════════════════════════════════════════════════════════════════════════

/// Host tracks owned by one container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerTracks {
    /// Container track (folder when it has children)
    pub folder: TrackId,
    /// Output tracks, in structure order
    #[serde(default)]
    pub children: Vec<TrackId>,
}

impl ContainerTracks {
    pub fn new(folder: TrackId) -> Self {
        Self {
            folder,
            children: Vec::new(),
        }
    }

    /// Track receiving grains for output `index`. Without children the
    /// container track itself is output 0.
    pub fn output_track(&self, index: usize) -> Option<TrackId> {
        if self.children.is_empty() {
            (index == 0).then_some(self.folder)
        } else {
            self.children.get(index).copied()
        }
    }

    /// Output tracks that actually exist on the host
    pub fn real_track_count(&self) -> usize {
        self.children.len().max(1)
    }
}

/// Create, rename or delete child tracks so the container matches `structure`.
/// Single-track structures render on the container track itself.
pub fn provision_tracks<H: MediaHost + ?Sized>(
    host: &mut H,
    tracks: &mut ContainerTracks,
    structure: &TrackStructure,
    container: &str,
) -> ScatterResult<()> {
    let wanted = if structure.num_tracks > 1 {
        structure.num_tracks
    } else {
        0
    };

    while tracks.children.len() > wanted {
        if let Some(child) = tracks.children.pop() {
            host.delete_track(child)?;
        }
    }

    for index in 0..wanted {
        let label = structure
            .track_labels
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("{}", index + 1));
        let name = format!("{} - {}", container, label);
        match tracks.children.get(index) {
            Some(&child) => host.set_track_name(child, &name),
            None => {
                let after = tracks.children.last().copied().unwrap_or(tracks.folder);
                let child = host.create_track(&name, Some(after))?;
                tracks.children.push(child);
            }
        }
    }

    let width = even_channel_count(structure.track_channels);
    for &child in &tracks.children {
        host.set_channel_count(child, width);
    }

    log::debug!(
        "Provisioned '{}': {} child tracks of {} channels",
        container,
        tracks.children.len(),
        width
    );
    Ok(())
}

/// Delete grains starting inside `range` on the container track and every
/// child. Returns the number deleted.
pub fn clear_range<H: MediaHost + ?Sized>(host: &mut H, tracks: &ContainerTracks, range: TimeRange) -> usize {
    let mut cleared = 0;
    for track in std::iter::once(tracks.folder).chain(tracks.children.iter().copied()) {
        for grain in host.grains_in_range(track, range) {
            host.delete_grain(grain);
            cleared += 1;
        }
    }
    cleared
}

// ═══════════════════════════════════════════════════════════════════════════════
// APPLY
// ═══════════════════════════════════════════════════════════════════════════════

/// Grain created on the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedGrain {
    pub track: TrackId,
    pub grain: GrainId,
    pub position: f64,
    pub length: f64,
    pub source_index: usize,
    pub track_index: usize,
}

/// Create every planned grain. On failure the grains created so far are
/// removed again and the error is returned.
pub fn apply_plan<H: MediaHost + ?Sized>(
    host: &mut H,
    plan: &PlacementPlan,
    tracks: &ContainerTracks,
    items: &[SourceItem],
    container: &str,
    crossfade_shape: FadeShape,
) -> ScatterResult<Vec<PlacedGrain>> {
    let mut placed: Vec<PlacedGrain> = Vec::with_capacity(plan.grains.len());

    let result = apply_grains(host, plan, tracks, items, container, crossfade_shape, &mut placed);
    if let Err(e) = result {
        for grain in &placed {
            host.delete_grain(grain.grain);
        }
        log::warn!(
            "Apply for '{}' failed after {} grains: {}",
            container,
            placed.len(),
            e
        );
        return Err(e);
    }
    Ok(placed)
}

fn apply_grains<H: MediaHost + ?Sized>(
    host: &mut H,
    plan: &PlacementPlan,
    tracks: &ContainerTracks,
    items: &[SourceItem],
    container: &str,
    crossfade_shape: FadeShape,
    placed: &mut Vec<PlacedGrain>,
) -> ScatterResult<()> {
    for planned in &plan.grains {
        let track = tracks
            .output_track(planned.track_index)
            .ok_or_else(|| ScatterError::MissingOutputTrack {
                container: container.to_string(),
                index: planned.track_index,
            })?;
        let source = items
            .get(planned.source_index)
            .ok_or_else(|| ScatterError::MissingSource(format!("item #{}", planned.source_index)))?;

        let grain = host.create_grain(track, source, planned.position, planned.length)?;
        host.set_grain_property(grain, GrainProperty::SourceOffset(planned.source_offset));
        host.set_grain_property(grain, GrainProperty::Pitch(planned.pitch));
        host.set_grain_property(grain, GrainProperty::Volume(planned.volume));
        host.set_grain_property(grain, GrainProperty::Pan(planned.pan));
        if let Some(fade) = planned.fade_in {
            host.set_grain_property(grain, GrainProperty::FadeIn(fade));
        }
        if let Some(fade) = planned.fade_out {
            host.set_grain_property(grain, GrainProperty::FadeOut(fade));
        }
        if planned.extraction != ExtractionPlan::None {
            host.set_grain_property(grain, GrainProperty::Extraction(planned.extraction));
        }

        // crossfade_with indexes the plan, which lines up with `placed`
        if let Some(previous) = planned.crossfade_with.and_then(|i| placed.get(i)) {
            host.create_crossfade(previous.grain, grain, crossfade_shape)?;
        }

        placed.push(PlacedGrain {
            track,
            grain,
            position: planned.position,
            length: planned.length,
            source_index: planned.source_index,
            track_index: planned.track_index,
        });
    }
    Ok(())
}
