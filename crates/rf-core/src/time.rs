//! Time-related types for timeline placement

use serde::{Deserialize, Serialize};

use crate::{RfError, RfResult};

/// Smallest span treated as a non-empty duration (seconds)
pub const TIME_EPSILON: f64 = 1e-9;

/// Half-open time range `[start, end)` in seconds
///
/// Immutable for the duration of one generation pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTimeRange")]
pub struct TimeRange {
    start: f64,
    end: f64,
}

#[derive(Deserialize)]
struct RawTimeRange {
    start: f64,
    end: f64,
}

impl TryFrom<RawTimeRange> for TimeRange {
    type Error = RfError;

    fn try_from(raw: RawTimeRange) -> RfResult<Self> {
        Self::new(raw.start, raw.end)
    }
}

impl TimeRange {
    /// Create a validated range. Both bounds must be finite and `start < end`.
    pub fn new(start: f64, end: f64) -> RfResult<Self> {
        if !start.is_finite() || !end.is_finite() || end - start <= TIME_EPSILON {
            return Err(RfError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    #[inline]
    pub fn start(&self) -> f64 {
        self.start
    }

    #[inline]
    pub fn end(&self) -> f64 {
        self.end
    }

    /// Length in seconds
    #[inline]
    pub fn length(&self) -> f64 {
        self.end - self.start
    }

    /// Check if a position falls inside `[start, end)`
    #[inline]
    pub fn contains(&self, position: f64) -> bool {
        position >= self.start && position < self.end
    }

    /// Check if `[position, position + length)` overlaps this range
    pub fn overlaps(&self, position: f64, length: f64) -> bool {
        position < self.end && position + length > self.start
    }

    /// Restrict to a sub-range. Returns `None` when the intersection is empty.
    pub fn intersect(&self, start: f64, end: f64) -> Option<Self> {
        let start = start.max(self.start);
        let end = end.min(self.end);
        Self::new(start, end).ok()
    }

    /// Remaining time from `position` to the end of the range (never negative)
    #[inline]
    pub fn remaining(&self, position: f64) -> f64 {
        (self.end - position).max(0.0)
    }
}

/// Convert decibels to linear gain
#[inline]
pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_range_validation() {
        assert!(TimeRange::new(0.0, 10.0).is_ok());
        assert!(TimeRange::new(10.0, 10.0).is_err());
        assert!(TimeRange::new(5.0, 1.0).is_err());
        assert!(TimeRange::new(f64::NAN, 1.0).is_err());
    }

    #[test]
    fn test_range_contains() {
        let range = TimeRange::new(2.0, 4.0).unwrap();
        assert!(range.contains(2.0));
        assert!(range.contains(3.999));
        assert!(!range.contains(4.0));
        assert_relative_eq!(range.length(), 2.0);
        assert_relative_eq!(range.remaining(3.5), 0.5);
        assert_relative_eq!(range.remaining(5.0), 0.0);
    }

    #[test]
    fn test_intersect() {
        let range = TimeRange::new(0.0, 10.0).unwrap();
        let sub = range.intersect(8.0, 12.0).unwrap();
        assert_relative_eq!(sub.start(), 8.0);
        assert_relative_eq!(sub.end(), 10.0);
        assert!(range.intersect(10.0, 12.0).is_none());
    }

    #[test]
    fn test_range_deserialize_validates() {
        let ok: TimeRange = serde_json::from_str(r#"{"start": 1.0, "end": 3.0}"#).unwrap();
        assert_relative_eq!(ok.length(), 2.0);

        let bad = serde_json::from_str::<TimeRange>(r#"{"start": 3.0, "end": 1.0}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_db_to_linear() {
        assert_relative_eq!(db_to_linear(0.0), 1.0);
        assert_relative_eq!(db_to_linear(-6.0), 0.501187, epsilon = 1e-5);
    }
}
