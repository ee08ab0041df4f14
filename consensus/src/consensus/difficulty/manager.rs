//! Difficulty manager for consensus
//!
//! DAA score and difficulty bits of new blocks, derived from their blue
//! difficulty window.

use consensus_core::config::Params;
use consensus_core::difficulty::{compact_to_target, target_to_compact};
use consensus_core::errors::ConsensusResult;
use consensus_core::ghostdag::GhostdagData;
use consensus_core::Hash;
use primitive_types::U256;

use crate::consensus::storage::HeaderStoreReader;

/// Difficulty manager for consensus
#[derive(Clone, Debug)]
pub struct DifficultyManager {
    genesis_bits: u32,
    pow_max_bits: u32,
    target_time_per_block: u64,
    window_size: usize,
    disable_adjustment: bool,
}

impl DifficultyManager {
    pub fn new(params: &Params) -> Self {
        Self {
            genesis_bits: params.genesis.bits,
            pow_max_bits: params.pow_max_bits,
            target_time_per_block: params.target_time_per_block,
            window_size: params.difficulty_window_size,
            disable_adjustment: params.disable_difficulty_adjustment,
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// The selected parent's DAA score plus the merge set size
    pub fn calc_daa_score<S: HeaderStoreReader + ?Sized>(&self, store: &S, ghostdag_data: &GhostdagData) -> ConsensusResult<u64> {
        Ok(store.get_daa_score(ghostdag_data.selected_parent)? + ghostdag_data.mergeset_size() as u64)
    }

    /// Bits required of a block whose difficulty window is `window`.
    ///
    /// The new target is the average window target scaled by how far the
    /// window's timespan is from the expected one, capped at the easiest
    /// allowed target.
    pub fn calculate_difficulty_bits<S: HeaderStoreReader + ?Sized>(&self, store: &S, window: &[Hash]) -> ConsensusResult<u32> {
        if self.disable_adjustment || window.len() < 2 {
            return Ok(self.genesis_bits);
        }

        let mut min_timestamp = u64::MAX;
        let mut max_timestamp = 0u64;
        let mut targets_sum = U256::zero();
        for block in window.iter().copied() {
            let header = store.get_header(block)?;
            min_timestamp = min_timestamp.min(header.timestamp);
            max_timestamp = max_timestamp.max(header.timestamp);
            targets_sum = targets_sum.saturating_add(compact_to_target(header.bits));
        }

        let count = window.len() as u64;
        let average_target = targets_sum / U256::from(count);
        let timespan = (max_timestamp - min_timestamp).max(1);
        let expected_timespan = self.target_time_per_block * (count - 1);

        let max_target = compact_to_target(self.pow_max_bits);
        let new_target = match average_target.checked_mul(U256::from(timespan)) {
            Some(scaled) => (scaled / U256::from(expected_timespan.max(1))).min(max_target),
            None => max_target,
        };
        Ok(target_to_compact(new_target.max(U256::one())))
    }
}
