//! Source items (reference audio) and their sub-areas

use serde::{Deserialize, Serialize};

/// Named region inside a source item that can be played on its own
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubArea {
    /// Offset into the source file (seconds)
    pub start_offset: f64,
    /// Region length (seconds)
    pub length: f64,
    #[serde(default)]
    pub name: String,
}

/// Reference audio a container scatters grains from
///
/// Immutable during a generation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceItem {
    pub file_path: String,
    #[serde(default = "default_channels")]
    pub num_channels: u32,
    /// Playable length (seconds)
    pub length: f64,
    /// Offset into the source file (seconds)
    #[serde(default)]
    pub start_offset: f64,
    /// Pitch in semitones
    #[serde(default)]
    pub original_pitch: f64,
    /// Linear volume
    #[serde(default = "default_volume")]
    pub original_volume: f64,
    /// Pan (-1..1)
    #[serde(default)]
    pub original_pan: f64,
    /// Extra item gain (dB)
    #[serde(default)]
    pub gain_db: f64,
    #[serde(default)]
    pub sub_areas: Vec<SubArea>,
}

fn default_channels() -> u32 {
    1
}
fn default_volume() -> f64 {
    1.0
}

impl SourceItem {
    pub fn new(file_path: impl Into<String>, num_channels: u32, length: f64) -> Self {
        Self {
            file_path: file_path.into(),
            num_channels: num_channels.max(1),
            length,
            start_offset: 0.0,
            original_pitch: 0.0,
            original_volume: 1.0,
            original_pan: 0.0,
            gain_db: 0.0,
            sub_areas: Vec::new(),
        }
    }

    /// Builder: add a sub-area
    pub fn with_sub_area(mut self, start_offset: f64, length: f64, name: &str) -> Self {
        self.sub_areas.push(SubArea {
            start_offset,
            length,
            name: name.to_string(),
        });
        self
    }

    /// Playable length of the whole item or one of its sub-areas
    pub fn playable_length(&self, sub_area: Option<usize>) -> f64 {
        sub_area
            .and_then(|i| self.sub_areas.get(i))
            .map_or(self.length, |area| area.length)
            .max(0.0)
    }

    /// Source offset of the whole item or one of its sub-areas
    pub fn playable_offset(&self, sub_area: Option<usize>) -> f64 {
        sub_area
            .and_then(|i| self.sub_areas.get(i))
            .map_or(self.start_offset, |area| area.start_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playable_length_uses_sub_area() {
        let item = SourceItem::new("rain.wav", 2, 10.0).with_sub_area(3.0, 1.5, "drip");
        assert_eq!(item.playable_length(None), 10.0);
        assert_eq!(item.playable_length(Some(0)), 1.5);
        assert_eq!(item.playable_offset(Some(0)), 3.0);
        // Unknown sub-area falls back to the whole item
        assert_eq!(item.playable_length(Some(4)), 10.0);
    }

    #[test]
    fn test_deserialize_defaults() {
        let item: SourceItem =
            serde_json::from_str(r#"{"file_path": "a.wav", "length": 2.0}"#).unwrap();
        assert_eq!(item.num_channels, 1);
        assert_eq!(item.original_volume, 1.0);
        assert!(item.sub_areas.is_empty());
    }
}
