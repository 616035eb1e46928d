//! # Grain Scatter Engine
//!
//! Procedurally scatters audio grains across a time range and resolves how
//! many output tracks/channels every grain is rendered to.
//!
//! ## Architecture
//!
//! - **Channel Extraction**: which source channel/pair a track exposes
//! - **Channel Topology**: ordered rule cascade deciding the output track layout
//! - **Placement**: six interval modes (Absolute, Relative, Coverage, Chunk,
//!   Noise, Euclidean) plus the per-grain distribution policy
//! - **Apply**: executes placement plans against a [`MediaHost`]
//! - **Stabilizer**: bottom-up channel requirements (container → group →
//!   master), iterated to a fixed point
//!
//! ```text
//! ProjectConfig ──► EffectiveConfig ──► topology::resolve ──► TrackStructure
//!                                                │                 │
//!                                                ▼                 ▼
//!                                    stabilize (fixed point)   placement::plan
//!                                                │                 │
//!                                                └──► MediaHost ◄──┘ apply
//! ```
//!
//! Decide and apply are kept apart: topology and placement return plans, only
//! [`apply`] and [`stabilize`] talk to the host.

pub mod apply;
pub mod channel;
pub mod config;
pub mod host;
pub mod oracle;
pub mod pipeline;
pub mod placement;
pub mod project;
pub mod source;
pub mod stabilize;
pub mod warning;

pub use apply::*;
pub use channel::*;
pub use config::*;
pub use host::*;
pub use oracle::*;
pub use pipeline::*;
pub use placement::*;
pub use project::*;
pub use source::*;
pub use stabilize::*;
pub use warning::*;

use rf_core::{GrainId, RfError, TrackId};
use thiserror::Error;

/// Scatter engine error types
#[derive(Debug, Error)]
pub enum ScatterError {
    #[error("Invalid noise parameters: {0}")]
    InvalidNoiseParams(String),

    #[error("Missing source file: {0}")]
    MissingSource(String),

    #[error("Unknown track: {0:?}")]
    UnknownTrack(TrackId),

    #[error("Unknown grain: {0:?}")]
    UnknownGrain(GrainId),

    #[error("No output track {index} in container '{container}'")]
    MissingOutputTrack { container: String, index: usize },

    #[error("Core error: {0}")]
    Core(#[from] RfError),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type ScatterResult<T> = Result<T, ScatterError>;

/// Hard cap on placement loop iterations per container (per track in
/// all-tracks mode)
pub const MAX_PLACEMENT_ITERATIONS: usize = 10_000;

/// Hard cap on inner placement iterations inside one chunk window
pub const MAX_CHUNK_INNER_ITERATIONS: usize = 1_000;

/// Hard cap on chunk windows per container
pub const MAX_CHUNK_WINDOWS: usize = 1_000;

/// Hard cap on noise field samples per container
pub const MAX_NOISE_SAMPLES: usize = 500_000;

/// Hard cap on stabilization passes
pub const MAX_STABILIZATION_ITERATIONS: usize = 8;

/// Cursor nudge applied when a candidate is skipped (seconds)
pub const NEGATIVE_INTERVAL_NUDGE: f64 = 0.01;
