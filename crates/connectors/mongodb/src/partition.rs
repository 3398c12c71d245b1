use mongordd_common::{Error, Result};
use mongordd_connector::Split;
use serde::{Deserialize, Serialize};

/// One contiguous slice `[lower, upper)` of the partition key interval.
///
/// The slice ending at `i64::MAX` cannot carry an exclusive bound one past
/// the largest key, so it is closed: `[lower, i64::MAX]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MongoPartition {
    index: usize,
    lower: i64,
    upper: i64,
    #[serde(default)]
    inclusive_upper: bool,
}

impl MongoPartition {
    pub fn new(index: usize, lower: i64, upper: i64) -> Self {
        Self { index, lower, upper, inclusive_upper: false }
    }

    /// A partition covering `[lower, upper]`.
    pub fn closed(index: usize, lower: i64, upper: i64) -> Self {
        Self { index, lower, upper, inclusive_upper: true }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Inclusive lower bound.
    pub fn lower(&self) -> i64 {
        self.lower
    }

    /// Upper bound, exclusive unless [`MongoPartition::is_upper_inclusive`].
    pub fn upper(&self) -> i64 {
        self.upper
    }

    pub fn is_upper_inclusive(&self) -> bool {
        self.inclusive_upper
    }

    pub fn contains(&self, key: i64) -> bool {
        self.lower <= key && (key < self.upper || (self.inclusive_upper && key == self.upper))
    }

    /// Number of key values covered by this partition, saturating at `u64::MAX`.
    pub fn len(&self) -> u64 {
        self.upper.abs_diff(self.lower).saturating_add(u64::from(self.inclusive_upper))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Split for MongoPartition {
    fn index(&self) -> usize {
        self.index
    }
}

impl std::fmt::Display for MongoPartition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let close = if self.inclusive_upper { ']' } else { ')' };
        write!(f, "partition {} [{}, {}{}", self.index, self.lower, self.upper, close)
    }
}

/// Split the closed interval `[lower, upper]` into `num_partitions`
/// contiguous half-open ranges.
///
/// Boundaries are `lower + floor(i * length / n)`, so truncation always
/// rounds down and the trailing partitions absorb the remainder. When
/// `num_partitions` exceeds the interval length some partitions are empty.
/// If `upper == i64::MAX` the last partition is closed at `i64::MAX`.
pub fn split_range(lower: i64, upper: i64, num_partitions: usize) -> Result<Vec<MongoPartition>> {
    if num_partitions == 0 {
        return Err(Error::invalid_argument("num_partitions must be at least 1"));
    }
    if lower > upper {
        return Err(Error::invalid_argument(format!(
            "lower bound {} is greater than upper bound {}",
            lower, upper
        )));
    }

    // i128 keeps `i * length` exact over the whole i64 domain.
    let length = upper as i128 - lower as i128 + 1;
    let n = num_partitions as i128;
    let boundary = |i: i128| -> i128 { lower as i128 + i * length / n };

    let partitions: Vec<MongoPartition> = (0..num_partitions)
        .map(|index| {
            let i = index as i128;
            let (start, end) = (boundary(i), boundary(i + 1));
            // Only the final boundary, upper + 1, can leave the i64 range.
            if end > i64::MAX as i128 {
                MongoPartition::closed(index, start as i64, i64::MAX)
            } else {
                MongoPartition::new(index, start as i64, end as i64)
            }
        })
        .collect();

    tracing::debug!(lower, upper, num_partitions, "split key range");
    Ok(partitions)
}
