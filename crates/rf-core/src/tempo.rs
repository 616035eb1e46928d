//! Tempo Map
//!
//! Beat ↔ seconds conversion for tempo-locked placement:
//! - Tempo changes at arbitrary beat positions
//! - Instant or linear tempo ramps (integrated exactly, no sampling)
//! - Grid values expressed as quarter-note beat fractions
//!
//! ## Time Units
//! - Seconds: project time
//! - Beats: quarter notes counted from project start (fractional)

use serde::{Deserialize, Serialize};

use crate::{RfError, RfResult};

// ═══════════════════════════════════════════════════════════════════════════════
// CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Minimum tempo
pub const MIN_TEMPO: f64 = 20.0;

/// Maximum tempo
pub const MAX_TEMPO: f64 = 400.0;

/// Default project tempo
pub const DEFAULT_TEMPO: f64 = 120.0;

// ═══════════════════════════════════════════════════════════════════════════════
// TEMPO EVENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Tempo ramp type towards the next event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TempoRamp {
    /// Instant tempo change
    #[default]
    Instant,
    /// Linear ramp (in beats) to the next tempo
    Linear,
}

/// Tempo change event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoEvent {
    /// Position in quarter-note beats
    pub beat: f64,
    /// Tempo in BPM
    pub bpm: f64,
    /// Ramp type to next tempo
    #[serde(default)]
    pub ramp: TempoRamp,
}

impl TempoEvent {
    pub fn new(beat: f64, bpm: f64) -> Self {
        Self {
            beat,
            bpm: bpm.clamp(MIN_TEMPO, MAX_TEMPO),
            ramp: TempoRamp::Instant,
        }
    }

    pub fn with_ramp(beat: f64, bpm: f64, ramp: TempoRamp) -> Self {
        Self {
            ramp,
            ..Self::new(beat, bpm)
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEMPO MAP
// ═══════════════════════════════════════════════════════════════════════════════

/// Tempo map (events sorted by beat, first event always at beat 0)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TempoEvent>", into = "Vec<TempoEvent>")]
pub struct TempoMap {
    events: Vec<TempoEvent>,
}

impl TryFrom<Vec<TempoEvent>> for TempoMap {
    type Error = RfError;

    fn try_from(events: Vec<TempoEvent>) -> RfResult<Self> {
        Self::from_events(events)
    }
}

impl From<TempoMap> for Vec<TempoEvent> {
    fn from(map: TempoMap) -> Self {
        map.events
    }
}

impl Default for TempoMap {
    fn default() -> Self {
        Self::constant(DEFAULT_TEMPO)
    }
}

impl TempoMap {
    /// Map with a single tempo for the whole project
    pub fn constant(bpm: f64) -> Self {
        Self {
            events: vec![TempoEvent::new(0.0, bpm)],
        }
    }

    /// Build from a list of events. The list is sorted; a beat-0 event is
    /// inserted with the first event's tempo when missing.
    pub fn from_events(mut events: Vec<TempoEvent>) -> RfResult<Self> {
        if let Some(bad) = events.iter().find(|e| !e.bpm.is_finite() || !e.beat.is_finite()) {
            return Err(RfError::InvalidTempo(bad.bpm));
        }
        let before = events.len();
        events.retain(|e| e.beat >= 0.0);
        if events.len() != before {
            log::debug!("Dropped {} tempo events before beat 0", before - events.len());
        }
        if events.is_empty() {
            return Ok(Self::default());
        }

        events.sort_by(|a, b| a.beat.total_cmp(&b.beat));
        events.dedup_by(|later, earlier| later.beat == earlier.beat);
        if events[0].beat > 0.0 {
            let first = TempoEvent::new(0.0, events[0].bpm);
            events.insert(0, first);
        }

        Ok(Self { events })
    }

    /// Set tempo at beat
    pub fn set_tempo(&mut self, beat: f64, bpm: f64) {
        self.set_tempo_with_ramp(beat, bpm, TempoRamp::Instant);
    }

    /// Set tempo with ramp type
    pub fn set_tempo_with_ramp(&mut self, beat: f64, bpm: f64, ramp: TempoRamp) {
        let beat = beat.max(0.0);
        if let Some(event) = self.events.iter_mut().find(|e| e.beat == beat) {
            *event = TempoEvent::with_ramp(beat, bpm, ramp);
        } else {
            self.events.push(TempoEvent::with_ramp(beat, bpm, ramp));
            self.events.sort_by(|a, b| a.beat.total_cmp(&b.beat));
        }
    }

    /// Get all tempo events
    pub fn events(&self) -> &[TempoEvent] {
        &self.events
    }

    /// Tempo at a beat position (ramps interpolated)
    pub fn tempo_at_beat(&self, beat: f64) -> f64 {
        let idx = self.segment_index(beat);
        let event = &self.events[idx];
        match (event.ramp, self.events.get(idx + 1)) {
            (TempoRamp::Linear, Some(next)) if beat < next.beat => {
                let t = (beat - event.beat) / (next.beat - event.beat);
                event.bpm + (next.bpm - event.bpm) * t
            }
            _ => event.bpm,
        }
    }

    /// Convert a beat position to seconds
    pub fn beats_to_seconds(&self, beats: f64) -> f64 {
        if beats <= 0.0 {
            return beats * 60.0 / self.events[0].bpm;
        }

        let mut seconds = 0.0;
        for (i, event) in self.events.iter().enumerate() {
            let next = self.events.get(i + 1);
            let segment_end = next.map(|n| n.beat.min(beats)).unwrap_or(beats);
            if segment_end <= event.beat {
                break;
            }
            seconds += self.segment_seconds(i, segment_end - event.beat);
            if segment_end >= beats {
                break;
            }
        }
        seconds
    }

    /// Convert seconds to a beat position
    pub fn seconds_to_beats(&self, seconds: f64) -> f64 {
        if seconds <= 0.0 {
            return seconds * self.events[0].bpm / 60.0;
        }

        let mut remaining = seconds;
        for (i, event) in self.events.iter().enumerate() {
            match self.events.get(i + 1) {
                Some(next) => {
                    let span = self.segment_seconds(i, next.beat - event.beat);
                    if remaining <= span {
                        return event.beat + self.segment_beats(i, remaining);
                    }
                    remaining -= span;
                }
                None => return event.beat + remaining * event.bpm / 60.0,
            }
        }

        // Unreachable with a non-empty map; keep the last tempo as fallback
        let last = self.events[self.events.len() - 1];
        last.beat + remaining * last.bpm / 60.0
    }

    /// Index of the segment containing `beat`
    fn segment_index(&self, beat: f64) -> usize {
        self.events
            .iter()
            .rposition(|e| e.beat <= beat)
            .unwrap_or(0)
    }

    /// Slope of a linear ramp segment in BPM per beat (0 for instant segments)
    fn ramp_slope(&self, index: usize) -> f64 {
        let event = &self.events[index];
        match (event.ramp, self.events.get(index + 1)) {
            (TempoRamp::Linear, Some(next)) if next.beat > event.beat => {
                (next.bpm - event.bpm) / (next.beat - event.beat)
            }
            _ => 0.0,
        }
    }

    /// Seconds spent in the first `beats` beats of segment `index`
    fn segment_seconds(&self, index: usize, beats: f64) -> f64 {
        let bpm0 = self.events[index].bpm;
        let k = self.ramp_slope(index);
        if k.abs() < 1e-12 {
            beats * 60.0 / bpm0
        } else {
            // ∫ 60 / (bpm0 + k·b) db
            60.0 / k * ((bpm0 + k * beats) / bpm0).ln()
        }
    }

    /// Beats covered by the first `seconds` seconds of segment `index`
    fn segment_beats(&self, index: usize, seconds: f64) -> f64 {
        let bpm0 = self.events[index].bpm;
        let k = self.ramp_slope(index);
        if k.abs() < 1e-12 {
            seconds * bpm0 / 60.0
        } else {
            bpm0 * ((k * seconds / 60.0).exp() - 1.0) / k
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// GRID VALUE
// ═══════════════════════════════════════════════════════════════════════════════

/// Grid values used as step durations for tempo-locked patterns
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridValue {
    /// Whole note
    Whole,
    /// Half note
    Half,
    /// Quarter note
    Quarter,
    /// Eighth note
    Eighth,
    /// Sixteenth note
    Sixteenth,
    /// Thirty-second note
    ThirtySecond,
    /// Triplet eighth
    TripletEighth,
    /// Triplet sixteenth
    TripletSixteenth,
    /// Dotted eighth
    DottedEighth,
    /// Custom length in quarter-note beats
    Custom(f64),
}

impl Default for GridValue {
    fn default() -> Self {
        Self::Sixteenth
    }
}

impl GridValue {
    /// Length in quarter-note beats
    pub fn to_beats(&self) -> f64 {
        match self {
            GridValue::Whole => 4.0,
            GridValue::Half => 2.0,
            GridValue::Quarter => 1.0,
            GridValue::Eighth => 0.5,
            GridValue::Sixteenth => 0.25,
            GridValue::ThirtySecond => 0.125,
            GridValue::TripletEighth => 1.0 / 3.0,
            GridValue::TripletSixteenth => 1.0 / 6.0,
            GridValue::DottedEighth => 0.75,
            GridValue::Custom(beats) => *beats,
        }
    }

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            GridValue::Whole => "1",
            GridValue::Half => "1/2",
            GridValue::Quarter => "1/4",
            GridValue::Eighth => "1/8",
            GridValue::Sixteenth => "1/16",
            GridValue::ThirtySecond => "1/32",
            GridValue::TripletEighth => "1/8T",
            GridValue::TripletSixteenth => "1/16T",
            GridValue::DottedEighth => "1/8D",
            GridValue::Custom(_) => "Custom",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
