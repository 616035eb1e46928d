//! rf-core: Shared types for the ReelForge scatter engine
//!
//! This crate provides the foundational types used across the scatter crates:
//! time ranges, the tempo map, track/grain identifiers and the core error type.

mod error;
mod tempo;
mod time;
mod track;

pub use error::*;
pub use tempo::*;
pub use time::*;
pub use track::*;
