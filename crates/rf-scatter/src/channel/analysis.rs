//! Item pool channel analysis

use std::collections::BTreeMap;

use crate::source::SourceItem;

/// Channel statistics of an item pool
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemsAnalysis {
    pub is_empty: bool,
    /// All items share one channel count
    pub is_homogeneous: bool,
    /// Most frequent channel count (ties go to the larger count)
    pub dominant_channel_count: u32,
    /// Distinct channel counts, ascending
    pub unique_channel_counts: Vec<u32>,
    /// Channel count → number of items
    pub channel_counts: BTreeMap<u32, usize>,
}

impl ItemsAnalysis {
    pub fn analyze(items: &[SourceItem]) -> Self {
        Self::from_channel_counts(items.iter().map(|item| item.num_channels))
    }

    pub fn from_channel_counts(counts: impl IntoIterator<Item = u32>) -> Self {
        let mut channel_counts = BTreeMap::new();
        for count in counts {
            *channel_counts.entry(count.max(1)).or_insert(0usize) += 1;
        }

        if channel_counts.is_empty() {
            return Self {
                is_empty: true,
                is_homogeneous: true,
                ..Default::default()
            };
        }

        // BTreeMap iterates ascending, so `>=` lets larger counts win ties
        let mut dominant = 0;
        let mut best = 0;
        for (&count, &freq) in &channel_counts {
            if freq >= best {
                best = freq;
                dominant = count;
            }
        }

        Self {
            is_empty: false,
            is_homogeneous: channel_counts.len() == 1,
            dominant_channel_count: dominant,
            unique_channel_counts: channel_counts.keys().copied().collect(),
            channel_counts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pool() {
        let analysis = ItemsAnalysis::analyze(&[]);
        assert!(analysis.is_empty);
        assert!(analysis.is_homogeneous);
        assert_eq!(analysis.dominant_channel_count, 0);
    }

    #[test]
    fn test_homogeneous_pool() {
        let analysis = ItemsAnalysis::from_channel_counts([2, 2, 2]);
        assert!(analysis.is_homogeneous);
        assert_eq!(analysis.dominant_channel_count, 2);
        assert_eq!(analysis.channel_counts[&2], 3);
    }

    #[test]
    fn test_dominant_tie_prefers_larger() {
        let analysis = ItemsAnalysis::from_channel_counts([1, 6, 1, 6, 2]);
        assert!(!analysis.is_homogeneous);
        assert_eq!(analysis.dominant_channel_count, 6);
        assert_eq!(analysis.unique_channel_counts, vec![1, 2, 6]);
    }
}
