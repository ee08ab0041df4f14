//! Past median time calculation
//!
//! The past median time of a block is the median timestamp of its median
//! time window (a blue window of size `2 * timestamp_deviation_tolerance - 1`).
//! A block's timestamp must be strictly greater than it.

use consensus_core::errors::{ConsensusError, ConsensusResult};
use consensus_core::Hash;

use crate::consensus::storage::HeaderStoreReader;

/// Past median time calculator
#[derive(Clone, Copy, Debug)]
pub struct PastMedianTimeManager {
    window_size: usize,
}

impl PastMedianTimeManager {
    pub fn new(window_size: usize) -> Self {
        Self { window_size }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Median timestamp of the blocks in `window`
    pub fn calc_past_median_time<S: HeaderStoreReader + ?Sized>(&self, store: &S, window: &[Hash]) -> ConsensusResult<u64> {
        if window.is_empty() {
            return Err(ConsensusError::Internal("median time of an empty window".into()));
        }
        let mut timestamps = window.iter().map(|block| store.get_timestamp(*block)).collect::<ConsensusResult<Vec<u64>>>()?;
        timestamps.sort_unstable();
        Ok(timestamps[timestamps.len() / 2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::storage::MemoryHeaderStore;
    use consensus_core::header::Header;
    use std::sync::Arc;

    #[test]
    fn test_median_of_unsorted_window() {
        let mut store = MemoryHeaderStore::new();
        let mut window = Vec::new();
        for (i, ts) in [50u64, 10, 40, 20, 30].into_iter().enumerate() {
            let hash = Hash::from_le_u64([i as u64 + 1, 0, 0, 0]);
            let mut header = Header::from_precomputed_hash(hash, vec![]);
            header.timestamp = ts;
            store.insert(Arc::new(header));
            window.push(hash);
        }
        let manager = PastMedianTimeManager::new(5);
        assert_eq!(manager.calc_past_median_time(&store, &window).unwrap(), 30);
        assert_eq!(manager.calc_past_median_time(&store, &window[..2]).unwrap(), 50);
        assert!(manager.calc_past_median_time(&store, &[]).is_err());
    }
}
