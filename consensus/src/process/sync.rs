//! Selected chain navigation for synchronization
//!
//! Peers find their common history by exchanging block locators: sparse
//! samples of a selected chain taken at exponentially growing blue score
//! distances. The helpers here also serve the finality point, which is a
//! chain block at a fixed blue score depth.

use consensus_core::errors::{ConsensusError, ConsensusResult};
use consensus_core::Hash;

use crate::consensus::dag::reachability;
use crate::consensus::storage::{GhostdagStoreReader, StagedView};

/// The highest block of the committed selected chain whose blue score is at
/// most `max_blue_score`, or the lowest retained chain block if none is
pub fn selected_chain_block_at_blue_score(view: StagedView, max_blue_score: u64) -> ConsensusResult<Hash> {
    let chain = &view.storage().selected_chain;
    let staging = view.staging();
    let (tip_index, tip) = chain.get_tip(staging)?.ok_or_else(|| ConsensusError::MissingData("selected chain tip".to_string()))?;
    search_chain(view, chain.low_index(staging)?, tip_index, tip, max_blue_score)
}

/// Binary search over chain indices `low..=high` (where `high` holds `high_hash`)
fn search_chain(view: StagedView, low: u64, high: u64, high_hash: Hash, max_blue_score: u64) -> ConsensusResult<Hash> {
    let chain = &view.storage().selected_chain;
    let staging = view.staging();
    if view.get_blue_score(high_hash)? <= max_blue_score {
        return Ok(high_hash);
    }
    let lowest = low;
    let (mut low, mut high) = (low, high);
    // Invariant: the block at `high` is above the bound
    while low < high {
        let mid = low + (high - low) / 2;
        if view.get_blue_score(chain.get_by_index(staging, mid)?)? <= max_blue_score {
            low = mid + 1;
        } else {
            high = mid;
        }
    }
    Ok(chain.get_by_index(staging, low.saturating_sub(1).max(lowest))?)
}

/// The highest selected chain ancestor of `high` (possibly `high` itself) whose
/// blue score is at most `max_blue_score`, or the lowest retained one
pub fn chain_ancestor_at_blue_score(view: StagedView, high: Hash, max_blue_score: u64) -> ConsensusResult<Hash> {
    let chain = &view.storage().selected_chain;
    let staging = view.staging();
    let mut current = high;
    loop {
        if view.get_blue_score(current)? <= max_blue_score {
            return Ok(current);
        }
        if let Some(index) = chain.get_index(staging, current)? {
            return search_chain(view, chain.low_index(staging)?, index, current, max_blue_score);
        }
        let selected_parent = view.get_selected_parent(current)?;
        if selected_parent == consensus_core::ORIGIN {
            return Ok(current);
        }
        current = selected_parent;
    }
}

/// Selected chain hashes of `high`, from `high` down to `low`, with steps
/// doubling in blue score. `low` must be a selected chain ancestor of `high`.
pub fn create_block_locator(view: StagedView, low: Hash, high: Hash) -> ConsensusResult<Vec<Hash>> {
    if !reachability::is_chain_ancestor_of(&view, low, high)? {
        return Err(ConsensusError::NotChainAncestor(low, high));
    }
    let low_blue_score = view.get_blue_score(low)?;
    let mut locator = Vec::new();
    let mut current = high;
    let mut step = 1u64;
    loop {
        locator.push(current);
        if current == low {
            break;
        }
        let target = view.get_blue_score(current)?.saturating_sub(step).max(low_blue_score);
        current = if target == low_blue_score { low } else { chain_ancestor_at_blue_score(view, high, target)? };
        step = step.saturating_mul(2);
    }
    Ok(locator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use consensus_core::ghostdag::GhostdagData;
    use consensus_core::{BlueWorkType, ORIGIN};
    use database::{Database, StagingArea};
    use tempfile::TempDir;

    use crate::config::CacheSizes;
    use crate::consensus::storage::ConsensusStorage;

    fn h(n: u64) -> Hash {
        Hash::from_le_u64([n, 0, 0, 0])
    }

    /// A single chain h(1)..=h(len) with blue score n - 1, committed as the selected chain
    fn chain_storage(tmp: &TempDir, len: u64) -> ConsensusStorage {
        let storage = ConsensusStorage::new(Arc::new(Database::open(tmp.path()).unwrap()), &CacheSizes::default());
        let mut staging = StagingArea::new();
        {
            let mut view = storage.view_mut(&mut staging);
            reachability::init(&mut view).unwrap();
        }
        for n in 1..=len {
            let selected_parent = if n == 1 { ORIGIN } else { h(n - 1) };
            let mut data = GhostdagData::new_with_selected_parent(selected_parent, 18);
            data.finalize_score_and_work(n - 1, BlueWorkType::from(n));
            storage.ghostdag.insert(&mut staging, h(n), Arc::new(data)).unwrap();
            {
                let mut view = storage.view_mut(&mut staging);
                reachability::add_block(&mut view, h(n), selected_parent, &[]).unwrap();
            }
            storage.selected_chain.stage_push(&mut staging, h(n)).unwrap();
        }
        storage.commit(staging).unwrap();
        storage
    }

    #[test]
    fn test_chain_block_at_blue_score() {
        let tmp = TempDir::new().unwrap();
        let storage = chain_storage(&tmp, 20);
        let staging = StagingArea::new();
        let view = storage.view(&staging);
        assert_eq!(selected_chain_block_at_blue_score(view, 7).unwrap(), h(8));
        assert_eq!(selected_chain_block_at_blue_score(view, 100).unwrap(), h(20));
        assert_eq!(selected_chain_block_at_blue_score(view, 0).unwrap(), h(1));
        assert_eq!(chain_ancestor_at_blue_score(view, h(15), 3).unwrap(), h(4));
    }

    #[test]
    fn test_block_locator_steps() {
        let tmp = TempDir::new().unwrap();
        let storage = chain_storage(&tmp, 20);
        let staging = StagingArea::new();
        let view = storage.view(&staging);
        // Blue scores 19, 18, 16, 12, 4, then low at 1
        let locator = create_block_locator(view, h(2), h(20)).unwrap();
        assert_eq!(locator, vec![h(20), h(19), h(17), h(13), h(5), h(2)]);

        assert_eq!(create_block_locator(view, h(5), h(5)).unwrap(), vec![h(5)]);
        assert!(matches!(create_block_locator(view, h(9), h(3)), Err(ConsensusError::NotChainAncestor(..))));
    }
}
