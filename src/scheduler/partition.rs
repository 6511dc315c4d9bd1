//! Deterministic worker partitioning
//!
//! Workers never talk to each other. Each one applies the same pure split to
//! the same shard candidate set and keeps only its own range, so running all
//! `(worker_ordinal, half)` combinations covers the set exactly once.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use crate::error::Error;

/// Which half of a worker's range to keep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum HalfSelector {
    /// `[0, mid)`
    First,
    /// `[mid, len)`
    Second,
}

impl HalfSelector {
    /// Both halves, in order
    pub fn all() -> [Self; 2] {
        [Self::First, Self::Second]
    }

    /// One-based number used in configuration (1 or 2)
    pub fn number(&self) -> u8 {
        match self {
            Self::First => 1,
            Self::Second => 2,
        }
    }
}

impl TryFrom<u8> for HalfSelector {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::First),
            2 => Ok(Self::Second),
            other => Err(Error::config(format!(
                "half selector must be 1 or 2, got {other}"
            ))),
        }
    }
}

impl From<HalfSelector> for u8 {
    fn from(half: HalfSelector) -> Self {
        half.number()
    }
}

impl FromStr for HalfSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u8 = s
            .trim()
            .parse()
            .map_err(|_| Error::config(format!("half selector must be 1 or 2, got '{s}'")))?;
        Self::try_from(value)
    }
}

impl fmt::Display for HalfSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Index range of worker `worker_ordinal` among `total_workers`
///
/// Boundaries are `floor(i * len / total_workers)`, so ranges differ in size
/// by at most one and tile `0..len` without gaps.
pub fn partition_bounds(len: usize, total_workers: usize, worker_ordinal: usize) -> Range<usize> {
    if total_workers == 0 || worker_ordinal >= total_workers {
        return 0..0;
    }
    let boundary = |i: usize| (i as u128 * len as u128 / total_workers as u128) as usize;
    boundary(worker_ordinal)..boundary(worker_ordinal + 1)
}

/// The contiguous slice of `items` owned by one worker
pub fn partition<T>(items: &[T], total_workers: usize, worker_ordinal: usize) -> &[T] {
    &items[partition_bounds(items.len(), total_workers, worker_ordinal)]
}

/// Split a slice at `len / 2` and keep one side
pub fn halve<T>(items: &[T], half: HalfSelector) -> &[T] {
    let mid = items.len() / 2;
    match half {
        HalfSelector::First => &items[..mid],
        HalfSelector::Second => &items[mid..],
    }
}

/// Static identity of one worker within the fleet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerPartition {
    /// Zero-based worker number
    pub worker_ordinal: usize,
    /// Number of workers sharing a shard
    pub total_workers: usize,
    /// Optional second-stage split
    pub half: Option<HalfSelector>,
}

impl WorkerPartition {
    /// Create a partition, rejecting ordinals outside the fleet
    pub fn new(
        worker_ordinal: usize,
        total_workers: usize,
        half: Option<HalfSelector>,
    ) -> Result<Self, Error> {
        if total_workers == 0 {
            return Err(Error::config("total_workers must be greater than 0"));
        }
        if worker_ordinal >= total_workers {
            return Err(Error::config(format!(
                "worker_ordinal {worker_ordinal} is out of range for {total_workers} workers"
            )));
        }
        Ok(Self {
            worker_ordinal,
            total_workers,
            half,
        })
    }

    /// A single worker that owns the whole shard
    pub fn whole() -> Self {
        Self {
            worker_ordinal: 0,
            total_workers: 1,
            half: None,
        }
    }

    /// Every partition of a fleet, in candidate order
    pub fn fleet(total_workers: usize, halved: bool) -> Vec<Self> {
        let halves: Vec<Option<HalfSelector>> = if halved {
            HalfSelector::all().into_iter().map(Some).collect()
        } else {
            vec![None]
        };

        (0..total_workers)
            .flat_map(|worker_ordinal| {
                halves.iter().map(move |&half| Self {
                    worker_ordinal,
                    total_workers,
                    half,
                })
            })
            .collect()
    }

    /// Index range this worker owns in a list of `len` candidates
    pub fn bounds(&self, len: usize) -> Range<usize> {
        let range = partition_bounds(len, self.total_workers, self.worker_ordinal);
        match self.half {
            None => range,
            Some(half) => {
                let mid = range.start + (range.end - range.start) / 2;
                match half {
                    HalfSelector::First => range.start..mid,
                    HalfSelector::Second => mid..range.end,
                }
            }
        }
    }

    /// Narrow a shard candidate list to this worker's subset
    pub fn apply<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let own = partition(items, self.total_workers, self.worker_ordinal);
        match self.half {
            Some(half) => halve(own, half),
            None => own,
        }
    }
}

impl fmt::Display for WorkerPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.worker_ordinal, self.total_workers)?;
        if let Some(half) = self.half {
            write!(f, "-{half}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("v{i}")).collect()
    }

    #[test]
    fn test_partition_example() {
        let candidates = ids(100);
        let worker = WorkerPartition::new(5, 20, Some(HalfSelector::First)).unwrap();

        let own = worker.apply(&candidates);
        assert_eq!(own, &candidates[25..27]);

        let second = WorkerPartition::new(5, 20, Some(HalfSelector::Second)).unwrap();
        assert_eq!(second.apply(&candidates), &candidates[27..30]);
    }

    #[test]
    fn test_partition_uneven() {
        // 7 items over 3 workers: boundaries 0, 2, 4, 7
        assert_eq!(partition_bounds(7, 3, 0), 0..2);
        assert_eq!(partition_bounds(7, 3, 1), 2..4);
        assert_eq!(partition_bounds(7, 3, 2), 4..7);
    }

    #[test]
    fn test_partition_more_workers_than_items() {
        let candidates = ids(3);
        let total: usize = (0..10).map(|w| partition(&candidates, 10, w).len()).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn test_partition_out_of_range() {
        let candidates = ids(10);
        assert!(partition(&candidates, 0, 0).is_empty());
        assert!(partition(&candidates, 4, 4).is_empty());
        assert!(WorkerPartition::new(4, 4, None).is_err());
        assert!(WorkerPartition::new(0, 0, None).is_err());
    }

    #[test]
    fn test_halve() {
        let candidates = ids(5);
        assert_eq!(halve(&candidates, HalfSelector::First), &candidates[..2]);
        assert_eq!(halve(&candidates, HalfSelector::Second), &candidates[2..]);
    }

    #[test]
    fn test_bounds_match_apply() {
        let candidates = ids(57);
        for worker in WorkerPartition::fleet(6, true) {
            assert_eq!(worker.apply(&candidates), &candidates[worker.bounds(57)]);
        }
    }

    #[test]
    fn test_fleet_covers_everything() {
        let candidates = ids(41);
        let rebuilt: Vec<String> = WorkerPartition::fleet(4, true)
            .iter()
            .flat_map(|w| w.apply(&candidates).to_vec())
            .collect();
        assert_eq!(rebuilt, candidates);
    }

    #[test]
    fn test_half_selector_parsing() {
        assert_eq!("1".parse::<HalfSelector>().unwrap(), HalfSelector::First);
        assert_eq!(" 2 ".parse::<HalfSelector>().unwrap(), HalfSelector::Second);
        assert!("3".parse::<HalfSelector>().is_err());
        assert!("first".parse::<HalfSelector>().is_err());
    }

    #[test]
    fn test_display() {
        let worker = WorkerPartition::new(3, 20, Some(HalfSelector::Second)).unwrap();
        assert_eq!(worker.to_string(), "3/20-2");
        assert_eq!(WorkerPartition::whole().to_string(), "0/1");
    }
}
