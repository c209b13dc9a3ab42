//! Splitting an iteration space across workers.

use std::fmt;
use std::ops::Range;

/// A half-open index range `[start, end)` handed to one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Partition {
    pub start: u64,
    pub end: u64,
}

impl Partition {
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end, "partition start {} past end {}", start, end);
        Self { start, end }
    }

    /// Number of indices in the partition.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> Range<u64> {
        self.start..self.end
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Split `[0, iterations)` into `concurrency` contiguous partitions.
///
/// Every partition gets `iterations / concurrency` indices and the first
/// `iterations % concurrency` partitions get one more, so sizes differ by at
/// most one and the layout is identical across runs. When `concurrency`
/// exceeds `iterations` the trailing partitions are empty.
///
/// Returns an empty vector when `concurrency` is zero.
pub fn partition(iterations: u64, concurrency: usize) -> Vec<Partition> {
    if concurrency == 0 {
        return Vec::new();
    }
    let c = concurrency as u64;
    let base = iterations / c;
    let extra = iterations % c;

    let mut partitions = Vec::with_capacity(concurrency);
    let mut start = 0;
    for i in 0..c {
        let len = base + u64::from(i < extra);
        partitions.push(Partition::new(start, start + len));
        start += len;
    }
    partitions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remainder_goes_to_leading_partitions() {
        let parts = partition(10, 4);
        let lens: Vec<u64> = parts.iter().map(Partition::len).collect();
        assert_eq!(lens, vec![3, 3, 2, 2]);
        assert_eq!(parts[0], Partition::new(0, 3));
        assert_eq!(parts[3], Partition::new(8, 10));
    }

    #[test]
    fn more_workers_than_iterations() {
        let parts = partition(2, 5);
        assert_eq!(parts.len(), 5);
        assert_eq!(parts[0], Partition::new(0, 1));
        assert_eq!(parts[1], Partition::new(1, 2));
        assert!(parts[2..].iter().all(Partition::is_empty));
    }

    #[test]
    fn zero_concurrency_yields_nothing() {
        assert!(partition(100, 0).is_empty());
    }

    #[test]
    fn display_is_half_open() {
        assert_eq!(Partition::new(250, 500).to_string(), "[250, 500)");
    }
}
