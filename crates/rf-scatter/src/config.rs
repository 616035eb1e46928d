//! Scatter configuration
//!
//! - [`PlacementSettings`]: how grains are spread over time (group or container level)
//! - [`ChannelSettings`]: output format and channel handling (always per container)
//! - [`EffectiveConfig`]: the merged view one container generates with
//! - [`ProjectConfig`]: JSON project document (groups → containers → items)

use std::collections::BTreeMap;

use rand::Rng;
use rf_core::{GridValue, TempoMap, TimeRange};
use serde::{Deserialize, Serialize};

use crate::channel::{ChannelSelectionMode, OutputFormat, SurroundVariant};
use crate::source::SourceItem;
use crate::{ScatterError, ScatterResult};

// ═══════════════════════════════════════════════════════════════════════════════
// PLACEMENT
// ═══════════════════════════════════════════════════════════════════════════════

/// How the gap between grains is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalMode {
    /// Fixed gap in seconds (negative = overlap)
    #[default]
    Absolute,
    /// Gap as a percentage of the range length
    Relative,
    /// Percentage of the range covered by grains
    Coverage,
    /// Alternating active/silence windows
    Chunk,
    /// Times drawn from a procedural noise field
    Noise,
    /// Euclidean rhythm layers
    Euclidean,
}

impl IntervalMode {
    pub fn name(&self) -> &'static str {
        match self {
            IntervalMode::Absolute => "absolute",
            IntervalMode::Relative => "relative",
            IntervalMode::Coverage => "coverage",
            IntervalMode::Chunk => "chunk",
            IntervalMode::Noise => "noise",
            IntervalMode::Euclidean => "euclidean",
        }
    }
}

/// Sign of the random offset applied by drift
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftDirection {
    #[default]
    Bidirectional,
    Forward,
    Backward,
}

/// Random range applied to one grain property
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Randomization {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub min: f64,
    #[serde(default)]
    pub max: f64,
}

impl Default for Randomization {
    fn default() -> Self {
        Self {
            enabled: false,
            min: 0.0,
            max: 0.0,
        }
    }
}

impl Randomization {
    pub fn range(min: f64, max: f64) -> Self {
        Self {
            enabled: true,
            min,
            max,
        }
    }

    /// Draw an offset, `0.0` when disabled
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if !self.enabled {
            return 0.0;
        }
        crate::oracle::uniform(self.min, self.max, rng)
    }
}

/// Fade curve shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeShape {
    #[default]
    Linear,
    FastStart,
    FastEnd,
    SCurve,
    EqualPower,
}

/// Fade in or fade out
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FadeSpec {
    #[serde(default)]
    pub enabled: bool,
    /// Fade length (seconds)
    #[serde(default = "default_fade_duration")]
    pub duration: f64,
    #[serde(default)]
    pub shape: FadeShape,
}

fn default_fade_duration() -> f64 {
    0.01
}

impl Default for FadeSpec {
    fn default() -> Self {
        Self {
            enabled: false,
            duration: default_fade_duration(),
            shape: FadeShape::Linear,
        }
    }
}

impl FadeSpec {
    pub fn new(duration: f64, shape: FadeShape) -> Self {
        Self {
            enabled: true,
            duration,
            shape,
        }
    }

    /// Fade length for a grain, clamped to half the grain. `None` when disabled.
    pub fn clamped(&self, grain_length: f64) -> Option<f64> {
        if !self.enabled || self.duration <= 0.0 {
            return None;
        }
        Some(self.duration.min(grain_length * 0.5))
    }
}

/// Crossfade between overlapping grains on the same track
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CrossfadeSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub shape: FadeShape,
}

/// Fades applied to every grain
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FadeSettings {
    #[serde(default)]
    pub fade_in: FadeSpec,
    #[serde(default)]
    pub fade_out: FadeSpec,
    #[serde(default)]
    pub crossfade: CrossfadeSpec,
}

/// Chunk mode windows
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChunkSettings {
    /// Active window length (seconds)
    #[serde(default = "default_chunk_duration")]
    pub duration: f64,
    /// Active window variation (percent)
    #[serde(default)]
    pub duration_variation: f64,
    /// Silence length between windows (seconds)
    #[serde(default = "default_chunk_silence")]
    pub silence: f64,
    /// Silence variation (percent)
    #[serde(default)]
    pub silence_variation: f64,
}

fn default_chunk_duration() -> f64 {
    10.0
}
fn default_chunk_silence() -> f64 {
    5.0
}

impl Default for ChunkSettings {
    fn default() -> Self {
        Self {
            duration: default_chunk_duration(),
            duration_variation: 0.0,
            silence: default_chunk_silence(),
            silence_variation: 0.0,
        }
    }
}

/// Noise placement algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseAlgorithm {
    /// Sample once per period, accept above threshold
    #[default]
    Threshold,
    /// Integrate probability on a fine grid
    Accumulation,
}

/// Upper bound for noise frequency (Hz)
pub const MAX_NOISE_FREQUENCY: f64 = 100.0;

/// Upper bound for noise octaves
pub const MAX_NOISE_OCTAVES: u32 = 8;

/// Noise mode parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseSettings {
    /// Base frequency (Hz)
    #[serde(default = "default_noise_frequency")]
    pub frequency: f64,
    #[serde(default = "default_noise_octaves")]
    pub octaves: u32,
    /// Amplitude falloff per octave
    #[serde(default = "default_persistence")]
    pub persistence: f64,
    /// Frequency growth per octave
    #[serde(default = "default_lacunarity")]
    pub lacunarity: f64,
    #[serde(default)]
    pub seed: u64,
    /// Base probability (percent)
    #[serde(default = "default_density")]
    pub density: f64,
    /// Noise influence on probability (percent)
    #[serde(default = "default_amplitude")]
    pub amplitude: f64,
    /// Minimum probability for a grain (percent)
    #[serde(default)]
    pub threshold: f64,
    #[serde(default)]
    pub algorithm: NoiseAlgorithm,
}

fn default_noise_frequency() -> f64 {
    1.0
}
fn default_noise_octaves() -> u32 {
    2
}
fn default_persistence() -> f64 {
    0.5
}
fn default_lacunarity() -> f64 {
    2.0
}
fn default_density() -> f64 {
    50.0
}
fn default_amplitude() -> f64 {
    50.0
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            frequency: default_noise_frequency(),
            octaves: default_noise_octaves(),
            persistence: default_persistence(),
            lacunarity: default_lacunarity(),
            seed: 0,
            density: default_density(),
            amplitude: default_amplitude(),
            threshold: 0.0,
            algorithm: NoiseAlgorithm::Threshold,
        }
    }
}

impl NoiseSettings {
    /// Validate before any sampling. Invalid parameters stop the container.
    pub fn validate(&self) -> ScatterResult<()> {
        let invalid = |msg: String| Err(ScatterError::InvalidNoiseParams(msg));

        if !self.frequency.is_finite() || self.frequency <= 0.0 {
            return invalid(format!("frequency must be > 0, got {}", self.frequency));
        }
        if self.frequency > MAX_NOISE_FREQUENCY {
            return invalid(format!(
                "frequency must be <= {} Hz, got {}",
                MAX_NOISE_FREQUENCY, self.frequency
            ));
        }
        if self.octaves == 0 || self.octaves > MAX_NOISE_OCTAVES {
            return invalid(format!(
                "octaves must be in 1..={}, got {}",
                MAX_NOISE_OCTAVES, self.octaves
            ));
        }
        if !self.persistence.is_finite() || self.persistence <= 0.0 || self.persistence > 1.0 {
            return invalid(format!(
                "persistence must be in (0, 1], got {}",
                self.persistence
            ));
        }
        if !self.lacunarity.is_finite() || self.lacunarity < 1.0 {
            return invalid(format!("lacunarity must be >= 1, got {}", self.lacunarity));
        }
        for (name, value) in [
            ("density", self.density),
            ("amplitude", self.amplitude),
            ("threshold", self.threshold),
        ] {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return invalid(format!("{} must be in 0..=100, got {}", name, value));
            }
        }
        Ok(())
    }
}

/// One Euclidean rhythm layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EuclideanLayer {
    pub pulses: u32,
    pub steps: u32,
    #[serde(default)]
    pub rotation: u32,
}

impl EuclideanLayer {
    pub fn new(pulses: u32, steps: u32, rotation: u32) -> Self {
        Self {
            pulses,
            steps,
            rotation,
        }
    }
}

/// How Euclidean steps map onto time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EuclideanTiming {
    /// One step per grid value, following the tempo map; the pattern repeats
    TempoLocked { grid: GridValue },
    /// One repetition stretched over the whole range
    Fit,
}

impl Default for EuclideanTiming {
    fn default() -> Self {
        Self::TempoLocked {
            grid: GridValue::Sixteenth,
        }
    }
}

/// Euclidean mode parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EuclideanSettings {
    #[serde(default = "default_layers")]
    pub layers: Vec<EuclideanLayer>,
    #[serde(default)]
    pub timing: EuclideanTiming,
}

fn default_layers() -> Vec<EuclideanLayer> {
    vec![EuclideanLayer::new(3, 8, 0)]
}

impl Default for EuclideanSettings {
    fn default() -> Self {
        Self {
            layers: default_layers(),
            timing: EuclideanTiming::default(),
        }
    }
}

/// Placement settings shared by a group or overridden by a container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementSettings {
    #[serde(default)]
    pub interval_mode: IntervalMode,
    /// Seconds (Absolute), percent of range (Relative), percent covered
    /// (Coverage), gap inside chunk windows (Chunk)
    #[serde(default = "default_trigger_rate")]
    pub trigger_rate: f64,
    /// Drift as a percentage of the interval
    #[serde(default)]
    pub trigger_drift: f64,
    #[serde(default)]
    pub drift_direction: DriftDirection,
    /// Semitones
    #[serde(default)]
    pub pitch: Randomization,
    /// dB
    #[serde(default)]
    pub volume: Randomization,
    /// -1..1
    #[serde(default)]
    pub pan: Randomization,
    #[serde(default)]
    pub fades: FadeSettings,
    #[serde(default)]
    pub chunk: ChunkSettings,
    #[serde(default)]
    pub noise: NoiseSettings,
    #[serde(default)]
    pub euclidean: EuclideanSettings,
}

fn default_trigger_rate() -> f64 {
    1.0
}

impl Default for PlacementSettings {
    fn default() -> Self {
        Self {
            interval_mode: IntervalMode::Absolute,
            trigger_rate: default_trigger_rate(),
            trigger_drift: 0.0,
            drift_direction: DriftDirection::Bidirectional,
            pitch: Randomization::default(),
            volume: Randomization::default(),
            pan: Randomization::default(),
            fades: FadeSettings::default(),
            chunk: ChunkSettings::default(),
            noise: NoiseSettings::default(),
            euclidean: EuclideanSettings::default(),
        }
    }
}

impl PlacementSettings {
    /// Builder: interval mode and rate
    pub fn with_interval(mut self, mode: IntervalMode, rate: f64) -> Self {
        self.interval_mode = mode;
        self.trigger_rate = rate;
        self
    }

    /// Builder: drift percent and direction
    pub fn with_drift(mut self, percent: f64, direction: DriftDirection) -> Self {
        self.trigger_drift = percent;
        self.drift_direction = direction;
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHANNELS
// ═══════════════════════════════════════════════════════════════════════════════

/// How grains are spread over a multi-track layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionMode {
    #[default]
    RoundRobin,
    Random,
    AllTracks,
}

/// Custom routing entry: item channel → output track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingEntry {
    pub source_channel: u32,
    pub destination_track: usize,
}

/// Channel handling for one container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSettings {
    #[serde(default)]
    pub output_format: OutputFormat,
    /// Channel order of the output format
    #[serde(default)]
    pub output_variant: SurroundVariant,
    /// Channel order of surround items; never inferred
    #[serde(default)]
    pub source_variant: Option<SurroundVariant>,
    #[serde(default)]
    pub selection_mode: ChannelSelectionMode,
    /// Forced source channel (0-based); out of range means random per grain
    #[serde(default)]
    pub forced_channel: Option<u32>,
    /// Forced source pair (0-based); out of range means random per grain
    #[serde(default)]
    pub forced_pair: Option<u32>,
    #[serde(default)]
    pub distribution_mode: DistributionMode,
    /// Item index → routes
    #[serde(default)]
    pub routing_matrix: BTreeMap<usize, Vec<RoutingEntry>>,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Stereo,
            output_variant: SurroundVariant::Itu,
            source_variant: None,
            selection_mode: ChannelSelectionMode::None,
            forced_channel: None,
            forced_pair: None,
            distribution_mode: DistributionMode::RoundRobin,
            routing_matrix: BTreeMap::new(),
        }
    }
}

impl ChannelSettings {
    pub fn new(output_format: OutputFormat) -> Self {
        Self {
            output_format,
            ..Default::default()
        }
    }

    /// Builder: selection mode
    pub fn with_selection(mut self, mode: ChannelSelectionMode) -> Self {
        self.selection_mode = mode;
        self
    }

    /// Builder: source channel order
    pub fn with_source_variant(mut self, variant: SurroundVariant) -> Self {
        self.source_variant = Some(variant);
        self
    }

    /// Builder: distribution mode
    pub fn with_distribution(mut self, mode: DistributionMode) -> Self {
        self.distribution_mode = mode;
        self
    }

    /// Output channel count
    pub fn output_channels(&self) -> u32 {
        self.output_format.channel_count()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HIERARCHY
// ═══════════════════════════════════════════════════════════════════════════════

/// Container: an item pool rendered to one folder of output tracks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerConfig {
    pub name: String,
    /// Use this container's placement settings instead of the group's
    #[serde(default)]
    pub override_parent: bool,
    #[serde(default)]
    pub placement: PlacementSettings,
    #[serde(default)]
    pub channels: ChannelSettings,
    #[serde(default)]
    pub items: Vec<SourceItem>,
}

impl ContainerConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            override_parent: false,
            placement: PlacementSettings::default(),
            channels: ChannelSettings::default(),
            items: Vec::new(),
        }
    }

    /// Builder: add an item
    pub fn with_item(mut self, item: SourceItem) -> Self {
        self.items.push(item);
        self
    }

    /// Builder: channel settings
    pub fn with_channels(mut self, channels: ChannelSettings) -> Self {
        self.channels = channels;
        self
    }

    /// Builder: container-level placement (sets the override flag)
    pub fn with_placement(mut self, placement: PlacementSettings) -> Self {
        self.placement = placement;
        self.override_parent = true;
        self
    }
}

/// Group: folder of containers sharing placement settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    #[serde(default)]
    pub placement: PlacementSettings,
    #[serde(default)]
    pub containers: Vec<ContainerConfig>,
}

impl GroupConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            placement: PlacementSettings::default(),
            containers: Vec::new(),
        }
    }

    /// Builder: group placement
    pub fn with_placement(mut self, placement: PlacementSettings) -> Self {
        self.placement = placement;
        self
    }

    /// Builder: add a container
    pub fn with_container(mut self, container: ContainerConfig) -> Self {
        self.containers.push(container);
        self
    }
}

/// Settings one container generates with
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    pub placement: PlacementSettings,
    pub channels: ChannelSettings,
}

impl EffectiveConfig {
    /// Merge group and container settings. Placement comes from the container
    /// only when it overrides its parent; channels always come from the container.
    pub fn resolve(group: &GroupConfig, container: &ContainerConfig) -> Self {
        let placement = if container.override_parent {
            container.placement.clone()
        } else {
            group.placement.clone()
        };
        Self {
            placement,
            channels: container.channels.clone(),
        }
    }
}

/// Whole-project scatter document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project-level seed; containers derive their own from it
    #[serde(default)]
    pub seed: u64,
    pub range: TimeRange,
    #[serde(default)]
    pub tempo: TempoMap,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

impl ProjectConfig {
    pub fn new(range: TimeRange) -> Self {
        Self {
            seed: 0,
            range,
            tempo: TempoMap::default(),
            groups: Vec::new(),
        }
    }

    /// Load from JSON
    pub fn from_json(json: &str) -> ScatterResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Export to JSON
    pub fn to_json(&self) -> ScatterResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Builder: add a group
    pub fn with_group(mut self, group: GroupConfig) -> Self {
        self.groups.push(group);
        self
    }

    /// Builder: seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_config_inherits_group() {
        let group = GroupConfig::new("Ambience")
            .with_placement(PlacementSettings::default().with_interval(IntervalMode::Coverage, 50.0));
        let container = ContainerConfig::new("Birds")
            .with_channels(ChannelSettings::new(OutputFormat::Quad));

        let effective = EffectiveConfig::resolve(&group, &container);
        assert_eq!(effective.placement.interval_mode, IntervalMode::Coverage);
        assert_eq!(effective.channels.output_format, OutputFormat::Quad);
    }

    #[test]
    fn test_effective_config_override() {
        let group = GroupConfig::new("Ambience")
            .with_placement(PlacementSettings::default().with_interval(IntervalMode::Coverage, 50.0));
        let container = ContainerConfig::new("Birds")
            .with_placement(PlacementSettings::default().with_interval(IntervalMode::Absolute, 2.0));

        let effective = EffectiveConfig::resolve(&group, &container);
        assert_eq!(effective.placement.interval_mode, IntervalMode::Absolute);
        assert_eq!(effective.placement.trigger_rate, 2.0);
    }

    #[test]
    fn test_fade_clamped_to_half_grain() {
        let fade = FadeSpec::new(1.0, FadeShape::SCurve);
        assert_eq!(fade.clamped(0.5), Some(0.25));
        assert_eq!(fade.clamped(4.0), Some(1.0));
        assert_eq!(FadeSpec::default().clamped(4.0), None);
    }

    #[test]
    fn test_noise_validation() {
        assert!(NoiseSettings::default().validate().is_ok());

        let mut bad = NoiseSettings::default();
        bad.frequency = 0.0;
        assert!(matches!(bad.validate(), Err(ScatterError::InvalidNoiseParams(_))));

        let mut bad = NoiseSettings::default();
        bad.octaves = 0;
        assert!(bad.validate().is_err());

        let mut bad = NoiseSettings::default();
        bad.density = 120.0;
        assert!(bad.validate().is_err());

        let mut bad = NoiseSettings::default();
        bad.persistence = f64::NAN;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_project_from_json() {
        let json = r#"{
            "seed": 42,
            "range": {"start": 0.0, "end": 30.0},
            "groups": [{
                "name": "Forest",
                "placement": {"interval_mode": "coverage", "trigger_rate": 60.0},
                "containers": [{
                    "name": "Wind",
                    "channels": {
                        "output_format": "quad",
                        "selection_mode": "stereo",
                        "routing_matrix": {"0": [{"source_channel": 1, "destination_track": 0}]}
                    },
                    "items": [{"file_path": "wind.wav", "num_channels": 2, "length": 4.0}]
                }]
            }]
        }"#;

        let project = ProjectConfig::from_json(json).unwrap();
        assert_eq!(project.seed, 42);
        assert_eq!(project.groups.len(), 1);
        let container = &project.groups[0].containers[0];
        assert_eq!(container.channels.output_format, OutputFormat::Quad);
        assert_eq!(container.channels.selection_mode, ChannelSelectionMode::Stereo);
        assert_eq!(container.channels.routing_matrix[&0][0].source_channel, 1);
        assert_eq!(container.items[0].num_channels, 2);
        assert_eq!(
            project.groups[0].placement.interval_mode,
            IntervalMode::Coverage
        );
    }

    #[test]
    fn test_project_rejects_inverted_range() {
        let json = r#"{"range": {"start": 5.0, "end": 1.0}}"#;
        assert!(matches!(
            ProjectConfig::from_json(json),
            Err(ScatterError::Config(_))
        ));
    }

    #[test]
    fn test_euclidean_timing_json() {
        let settings: EuclideanSettings = serde_json::from_str(
            r#"{"layers": [{"pulses": 3, "steps": 8}], "timing": {"tempo_locked": {"grid": "eighth"}}}"#,
        )
        .unwrap();
        assert_eq!(
            settings.timing,
            EuclideanTiming::TempoLocked {
                grid: GridValue::Eighth
            }
        );
        assert_eq!(settings.layers[0].rotation, 0);

        let fit: EuclideanTiming = serde_json::from_str(r#""fit""#).unwrap();
        assert_eq!(fit, EuclideanTiming::Fit);
    }
}
