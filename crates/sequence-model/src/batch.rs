//! Batch partitioning and the file naming that keeps batches in order.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use framestitch_common::error::{StitchError, StitchResult};

/// Extension of every encoded segment and of the concatenated video.
pub const SEGMENT_EXTENSION: &str = "mp4";

/// A contiguous slice `[start, end)` of a frame sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// Zero-based batch number.
    pub index: usize,
    /// First frame (inclusive).
    pub start: usize,
    /// Last frame (exclusive).
    pub end: usize,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Split `len` frames into batches of at most `batch_size`.
///
/// Produces `ceil(len / batch_size)` batches; the last one may be short.
pub fn partition(len: usize, batch_size: usize) -> StitchResult<Vec<Batch>> {
    if batch_size == 0 {
        return Err(StitchError::invalid_config("batch size must be positive"));
    }

    Ok((0..len)
        .step_by(batch_size)
        .enumerate()
        .map(|(index, start)| Batch {
            index,
            start,
            end: (start + batch_size).min(len),
        })
        .collect())
}

/// Zero-padding width for batch numbers, derived from the batch count.
pub fn padding_width(batch_count: usize) -> usize {
    batch_count.max(1).to_string().len()
}

/// Batch number padded to `width` digits.
pub fn padded_index(index: usize, width: usize) -> String {
    format!("{index:0width$}")
}

/// File name of the segment encoded from batch `index`.
pub fn segment_file_name(index: usize, width: usize) -> String {
    format!("{}.{SEGMENT_EXTENSION}", padded_index(index, width))
}

/// Batch-local name of the `position`-th frame of a batch.
pub fn staging_frame_name(position: usize, suffix: &str) -> String {
    format!("frame_{position}.{suffix}")
}

/// Sequential input pattern matching [`staging_frame_name`].
pub fn staging_frame_pattern(suffix: &str) -> String {
    format!("frame_%d.{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_partition_partial_last_batch() {
        let batches = partition(10, 4).unwrap();
        let sizes: Vec<_> = batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(batches[2].range(), 8..10);
    }

    #[test]
    fn test_partition_batch_larger_than_input() {
        let batches = partition(3, 100).unwrap();
        assert_eq!(
            batches,
            vec![Batch {
                index: 0,
                start: 0,
                end: 3
            }]
        );
    }

    #[test]
    fn test_partition_empty_input() {
        assert!(partition(0, 5).unwrap().is_empty());
    }

    #[test]
    fn test_partition_rejects_zero_batch_size() {
        let err = partition(10, 0).unwrap_err();
        assert!(matches!(err, StitchError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_segment_names() {
        assert_eq!(padding_width(0), 1);
        assert_eq!(padding_width(9), 1);
        assert_eq!(padding_width(10), 2);
        assert_eq!(segment_file_name(7, 3), "007.mp4");
        assert_eq!(staging_frame_name(0, "png"), "frame_0.png");
        assert_eq!(staging_frame_pattern("png"), "frame_%d.png");
    }

    proptest! {
        #[test]
        fn prop_partition_exactly_covers(len in 0usize..5_000, batch_size in 1usize..700) {
            let batches = partition(len, batch_size).unwrap();
            prop_assert_eq!(batches.len(), len.div_ceil(batch_size));

            let mut next = 0;
            for (i, batch) in batches.iter().enumerate() {
                prop_assert_eq!(batch.index, i);
                prop_assert_eq!(batch.start, next);
                prop_assert!(!batch.is_empty());
                prop_assert!(batch.len() <= batch_size);
                next = batch.end;
            }
            prop_assert_eq!(next, len);
        }

        #[test]
        fn prop_segment_names_sort_like_indices(count in 1usize..=10_000) {
            let width = padding_width(count);
            let names: Vec<String> = (0..count).map(|i| segment_file_name(i, width)).collect();
            let mut sorted = names.clone();
            sorted.sort();
            prop_assert_eq!(sorted, names);
        }
    }
}
