//! Blue windows over the DAG
//!
//! A window of size N for a block is the N most recent blues of its past,
//! taken along the selected chain: at every chain block its selected parent
//! first, then its other merge set blues from the highest blue work down.

use std::sync::Arc;

use consensus_core::errors::ConsensusResult;
use consensus_core::ghostdag::GhostdagData;
use consensus_core::{Hash, ORIGIN, VIRTUAL};
use database::cache::Cache;
use tracing::trace;

use crate::consensus::storage::GhostdagStoreReader;

pub type BlockWindow = Arc<Vec<Hash>>;

/// Computes blue windows and caches them per (block, size)
pub struct WindowManager {
    cache: Cache<(Hash, usize), BlockWindow>,
}

impl WindowManager {
    pub fn new(cache_size: usize) -> Self {
        Self { cache: Cache::new(cache_size) }
    }

    /// The window of size `size` of the block `hash` whose GHOSTDAG data is `data`.
    ///
    /// The block itself is never part of its window. Walks stop early at the
    /// root of the retained DAG, so windows near genesis are shorter.
    pub fn blue_window<S: GhostdagStoreReader + ?Sized>(
        &self,
        store: &S,
        hash: Hash,
        data: &GhostdagData,
        size: usize,
    ) -> ConsensusResult<BlockWindow> {
        if hash != VIRTUAL {
            if let Some(window) = self.cache.get(&(hash, size)) {
                return Ok(window);
            }
        }

        let mut window: Vec<Hash> = Vec::with_capacity(size);
        let mut current: Arc<GhostdagData> = Arc::new(data.clone());
        while window.len() < size && current.selected_parent != ORIGIN {
            let selected_parent = current.selected_parent;
            window.push(selected_parent);
            for blue in current.mergeset_blues.iter().skip(1).rev() {
                if window.len() == size {
                    break;
                }
                window.push(*blue);
            }
            if window.len() == size {
                break;
            }
            // The rest of the window is a prefix of the selected parent's window
            if let Some(parent_window) = self.cache.get(&(selected_parent, size)) {
                trace!("window of {} continues from the cached window of {}", hash, selected_parent);
                let missing = size - window.len();
                window.extend(parent_window.iter().take(missing).copied());
                break;
            }
            current = store.get_ghostdag_data(selected_parent)?;
        }

        let window = Arc::new(window);
        if hash != VIRTUAL {
            self.cache.insert((hash, size), window.clone());
        }
        Ok(window)
    }

    /// Forgets all cached windows, used when the DAG is replaced by a pruning proof
    pub fn clear(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::storage::MemoryGhostdagStore;
    use consensus_core::{BlockHashMap, BlueWorkType};

    fn h(n: u64) -> Hash {
        Hash::from_le_u64([n, 0, 0, 0])
    }

    fn data(selected_parent: Hash, blues: &[Hash], score: u64) -> GhostdagData {
        let mut mergeset_blues = vec![selected_parent];
        mergeset_blues.extend_from_slice(blues);
        GhostdagData::new(score, BlueWorkType::from(score), selected_parent, mergeset_blues, vec![], BlockHashMap::new())
    }

    #[test]
    fn test_window_follows_selected_chain_and_blues() {
        let mut store = MemoryGhostdagStore::new();
        store.insert(h(1), Arc::new(GhostdagData::new_trusted_root(0, BlueWorkType::from(1u64))));
        store.insert(h(2), Arc::new(data(h(1), &[], 1)));
        store.insert(h(3), Arc::new(data(h(1), &[], 1)));
        // h(4) merges h(3) into the chain of h(2)
        store.insert(h(4), Arc::new(data(h(2), &[h(3)], 3)));
        store.insert(h(5), Arc::new(data(h(4), &[], 4)));

        let manager = WindowManager::new(16);
        let tip = data(h(5), &[], 5);
        assert_eq!(*manager.blue_window(&store, h(6), &tip, 10).unwrap(), vec![h(5), h(4), h(2), h(3), h(1)]);
        assert_eq!(*manager.blue_window(&store, h(6), &tip, 3).unwrap(), vec![h(5), h(4), h(2)]);

        // Reusing the cached window of the selected parent gives the same answer
        let h5_data = store.get_ghostdag_data(h(5)).unwrap();
        manager.blue_window(&store, h(5), &h5_data, 10).unwrap();
        let next = data(h(5), &[], 5);
        assert_eq!(*manager.blue_window(&store, h(7), &next, 10).unwrap(), vec![h(5), h(4), h(2), h(3), h(1)]);
    }

    #[test]
    fn test_virtual_window_not_cached() {
        let mut store = MemoryGhostdagStore::new();
        store.insert(h(1), Arc::new(GhostdagData::new_trusted_root(0, BlueWorkType::from(1u64))));
        let manager = WindowManager::new(16);
        let first = data(h(1), &[], 1);
        assert_eq!(*manager.blue_window(&store, VIRTUAL, &first, 4).unwrap(), vec![h(1)]);
        store.insert(h(2), Arc::new(data(h(1), &[], 1)));
        let second = data(h(2), &[], 2);
        assert_eq!(*manager.blue_window(&store, VIRTUAL, &second, 4).unwrap(), vec![h(2), h(1)]);
    }
}
