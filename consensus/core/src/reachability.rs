//! Interval labels of the reachability tree.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::{Hash, ORIGIN};

/// An inclusive `[start, end]` range. `end == start - 1` encodes an empty interval.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub struct Interval {
    pub start: u64,
    pub end: u64,
}

impl Display for Interval {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

impl Interval {
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start > 0 && end < u64::MAX && end >= start.saturating_sub(1));
        Interval { start, end }
    }

    pub fn empty() -> Self {
        Self::new(1, 0)
    }

    /// The interval of the tree root. Both extremes are reserved so that
    /// `start - 1` and `end + 1` never overflow.
    pub fn maximal() -> Self {
        Self::new(1, u64::MAX - 1)
    }

    pub fn size(&self) -> u64 {
        (self.end + 1) - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn increase_start(&self, offset: u64) -> Self {
        Self::new(self.start + offset, self.end)
    }

    pub fn decrease_end(&self, offset: u64) -> Self {
        Self::new(self.start, self.end - offset)
    }

    /// Splits into a left half of size `ceil(size / 2)` and a right half with the rest
    pub fn split_half(&self) -> (Self, Self) {
        let left_size = (self.size() + 1) / 2;
        (Self::new(self.start, self.start + left_size - 1), Self::new(self.start + left_size, self.end))
    }

    /// Splits into consecutive intervals of exactly `sizes`, which must sum to `self.size()`
    pub fn split_exact(&self, sizes: &[u64]) -> Vec<Self> {
        debug_assert_eq!(sizes.iter().sum::<u64>(), self.size());
        let mut start = self.start;
        sizes
            .iter()
            .map(|size| {
                let interval = Self::new(start, start + size - 1);
                start += size;
                interval
            })
            .collect()
    }

    /// Splits into consecutive intervals where each piece gets at least its
    /// requested size and the remaining slack is spread with weights that
    /// decrease exponentially with the distance from the largest request.
    /// Returns `None` if the requested sizes do not fit.
    pub fn split_exponential(&self, sizes: &[u64]) -> Option<Vec<Self>> {
        let interval_size = self.size();
        let sizes_sum: u64 = sizes.iter().sum();
        if interval_size < sizes_sum {
            return None;
        }
        if sizes.is_empty() {
            return Some(Vec::new());
        }
        if interval_size == sizes_sum {
            return Some(self.split_exact(sizes));
        }

        let mut remaining_bias = interval_size - sizes_sum;
        let total_bias = remaining_bias as f64;
        let fractions = exponential_fractions(sizes);
        let mut biased_sizes = Vec::with_capacity(sizes.len());
        for (i, fraction) in fractions.iter().enumerate() {
            let bias = if i == fractions.len() - 1 {
                remaining_bias
            } else {
                remaining_bias.min((total_bias * fraction).round() as u64)
            };
            biased_sizes.push(sizes[i] + bias);
            remaining_bias -= bias;
        }
        Some(self.split_exact(&biased_sizes))
    }

    pub fn contains(&self, other: Self) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn strictly_contains(&self, other: Self) -> bool {
        self.start <= other.start && other.end < self.end
    }
}

/// Fractions proportional to `2^(size - max_size)`, normalized to sum to one
fn exponential_fractions(sizes: &[u64]) -> Vec<f64> {
    let max_size = sizes.iter().copied().max().unwrap_or_default();
    let mut fractions: Vec<f64> = sizes.iter().map(|s| 1f64 / 2f64.powf((max_size - s) as f64)).collect();
    let fractions_sum: f64 = fractions.iter().sum();
    for fraction in fractions.iter_mut() {
        *fraction /= fractions_sum;
    }
    fractions
}

/// Per-block record of the reachability tree and its future covering set
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReachabilityData {
    pub parent: Hash,
    pub interval: Interval,
    pub children: Vec<Hash>,
    /// Descendants outside the tree subtree, sorted by interval start
    pub future_covering_set: Vec<Hash>,
}

impl ReachabilityData {
    pub fn new(parent: Hash, interval: Interval) -> Self {
        Self { parent, interval, children: Vec::new(), future_covering_set: Vec::new() }
    }

    pub fn new_origin() -> Self {
        Self::new(ORIGIN, Interval::maximal())
    }
}
