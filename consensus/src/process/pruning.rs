//! Pruning point management
//!
//! The pruning point follows the virtual selected chain at `pruning_depth`
//! blue score behind it and only ever moves forward. When it advances, the
//! UTXO set kept at the pruning point is rolled forward and block bodies,
//! UTXO diffs and acceptance data in its past are deleted.
//!
//! Headers, GHOSTDAG data, relations and statuses are kept for the proof
//! window below the pruning point (`retention_depth` blue score), which
//! covers every window a new block reads. Below it they are deleted too,
//! together with stale tips that fell under the window without being merged.
//! Reachability records stay: retained blocks still ask the interval tree
//! whether a deleted parent is in their selected past.

use std::collections::{HashSet, VecDeque};

use consensus_core::blockstatus::BlockStatus;
use consensus_core::errors::{ConsensusError, ConsensusResult, RuleError};
use consensus_core::ghostdag::GhostdagData;
use consensus_core::{Hash, ORIGIN};
use database::StagingArea;
use tracing::{debug, info};

use crate::consensus::dag::{reachability, relations};
use crate::consensus::storage::{
    ConsensusStorage, GhostdagStoreReader, HeaderStoreReader, RelationsStoreReader, StagedView, UtxoDiffManager,
};
use crate::process::sync;

#[derive(Clone, Copy, Debug)]
pub struct PruningManager {
    pruning_depth: u64,
    retention_depth: u64,
}

impl PruningManager {
    pub fn new(pruning_depth: u64, retention_depth: u64) -> Self {
        Self { pruning_depth, retention_depth }
    }

    pub fn pruning_depth(&self) -> u64 {
        self.pruning_depth
    }

    /// The pruning point a block with `ghostdag_data` must carry in its header:
    /// the highest selected chain ancestor at least pruning depth below it,
    /// searched forward from the selected parent's own pruning point
    pub fn expected_header_pruning_point(&self, view: StagedView, ghostdag_data: &GhostdagData) -> ConsensusResult<Hash> {
        let selected_parent = ghostdag_data.selected_parent;
        let mut current = self.chain_search_start(view, selected_parent)?;
        while current != selected_parent {
            let next = reachability::get_next_chain_ancestor(&view, selected_parent, current)?;
            if view.get_blue_score(next)? + self.pruning_depth > ghostdag_data.blue_score {
                break;
            }
            current = next;
        }
        Ok(current)
    }

    /// The selected parent's header pruning point, or the root of its chain
    /// when that pruning point is beyond the retained history
    fn chain_search_start(&self, view: StagedView, block: Hash) -> ConsensusResult<Hash> {
        let pruning_point = view.get_header(block)?.pruning_point;
        if pruning_point != ORIGIN
            && view.has_ghostdag_data(pruning_point)?
            && reachability::is_chain_ancestor_of(&view, pruning_point, block)?
        {
            return Ok(pruning_point);
        }
        let mut current = block;
        loop {
            let selected_parent = view.get_selected_parent(current)?;
            if selected_parent == ORIGIN || !view.has_ghostdag_data(selected_parent)? {
                return Ok(current);
            }
            current = selected_parent;
        }
    }

    /// The current pruning point must be on the selected chain of every new block
    pub fn check_pruning_violation(&self, view: StagedView, selected_parent: Hash) -> ConsensusResult<()> {
        let pruning_point = view.storage().pruning_point.read(view.staging())?;
        if !reachability::is_chain_ancestor_of(&view, pruning_point, selected_parent)? {
            return Err(RuleError::PruningViolation(selected_parent, pruning_point).into());
        }
        Ok(())
    }

    /// Moves the pruning point to `candidate` if it is a chain descendant of the
    /// current one with a higher blue score. Returns whether it moved.
    pub fn stage_advance(
        &self,
        storage: &ConsensusStorage,
        staging: &mut StagingArea,
        utxo_diff_manager: &UtxoDiffManager,
        candidate: Hash,
    ) -> ConsensusResult<bool> {
        let current = storage.pruning_point.read(staging)?;
        {
            let view = storage.view(staging);
            if candidate == current || view.get_blue_score(candidate)? <= view.get_blue_score(current)? {
                return Ok(false);
            }
            if !reachability::is_chain_ancestor_of(&view, current, candidate)? {
                debug!("Pruning point candidate {} does not descend from {}, keeping the current one", candidate, current);
                return Ok(false);
            }
        }

        utxo_diff_manager.stage_pruning_utxo_set_advance(storage, staging, current, candidate)?;
        let mut history = storage.pruning_point_history.get(staging)?.unwrap_or_else(|| vec![current]);
        history.push(candidate);
        storage.pruning_point_history.stage(staging, &history)?;
        storage.pruning_point.stage(staging, &candidate)?;
        let pruned = self.stage_prune_past(storage, staging, candidate)?;
        let deleted = self.stage_prune_history(storage, staging, candidate)?;
        info!("Pruning point moved from {} to {}, pruned {} block bodies, deleted {} blocks", current, candidate, pruned, deleted);
        Ok(true)
    }

    /// Deletes bodies, UTXO diffs and acceptance data strictly in the past of `pruning_point`
    fn stage_prune_past(&self, storage: &ConsensusStorage, staging: &mut StagingArea, pruning_point: Hash) -> ConsensusResult<usize> {
        let mut to_prune = Vec::new();
        {
            let view = storage.view(staging);
            let committed_and_staged = view.staging();
            let parents = view.get_parents(pruning_point)?;
            relations::traverse_past(&view, parents.iter().copied(), |block| {
                match storage.statuses.get(committed_and_staged, block)? {
                    Some(BlockStatus::StatusHeaderOnly) | None => Ok(false),
                    Some(_) => {
                        to_prune.push(block);
                        Ok(true)
                    }
                }
            })?;
        }
        for block in to_prune.iter().copied() {
            storage.block_transactions.delete(staging, block);
            storage.utxo_diffs.delete(staging, block);
            storage.acceptance_data.delete(staging, block);
            if !matches!(storage.statuses.get(staging, block)?, Some(BlockStatus::StatusInvalid)) {
                storage.statuses.set(staging, block, BlockStatus::StatusHeaderOnly)?;
            }
        }
        Ok(to_prune.len())
    }

    /// Deletes every record but reachability of the blocks under the retained
    /// window of `pruning_point`: the selected chain below it with the rest of
    /// their past, and stale tips with their ancestors no retained block needs
    fn stage_prune_history(&self, storage: &ConsensusStorage, staging: &mut StagingArea, pruning_point: Hash) -> ConsensusResult<usize> {
        let mut doomed = Vec::new();
        let mut chain_low = None;
        let mut stale_tips = HashSet::new();
        {
            let view = storage.view(staging);
            let bound = view.get_blue_score(pruning_point)?.saturating_sub(self.retention_depth);
            if bound == 0 {
                return Ok(0);
            }

            let boundary = sync::selected_chain_block_at_blue_score(view, bound - 1)?;
            if view.get_blue_score(boundary)? < bound {
                let index = storage
                    .selected_chain
                    .get_index(view.staging(), boundary)?
                    .ok_or_else(|| ConsensusError::Internal(format!("pruning boundary {boundary} is not on the selected chain")))?;
                chain_low = Some(index + 1);
                relations::traverse_past(&view, [boundary], |block| {
                    if view.get_blue_score(block)? < bound {
                        doomed.push(block);
                    }
                    Ok(true)
                })?;
            }

            // Tips this deep can no longer be merged. They go with every
            // ancestor outside the pruning point's past left without children.
            let mut queue: VecDeque<Hash> = VecDeque::new();
            for tip in storage.tips.read(view.staging())?.into_iter() {
                if tip != pruning_point && view.get_blue_score(tip)? < bound {
                    stale_tips.insert(tip);
                    queue.push_back(tip);
                }
            }
            let mut dropped = stale_tips.clone();
            while let Some(block) = queue.pop_front() {
                doomed.push(block);
                for parent in view.get_parents(block)?.iter().copied() {
                    if dropped.contains(&parent) || !view.has_relations(parent)? || view.get_blue_score(parent)? >= bound {
                        continue;
                    }
                    if reachability::is_dag_ancestor_of(&view, parent, pruning_point)? {
                        continue;
                    }
                    if view.get_children(parent)?.iter().all(|child| dropped.contains(child)) {
                        dropped.insert(parent);
                        queue.push_back(parent);
                    }
                }
            }
        }

        for block in doomed.iter().copied() {
            storage.headers.delete(staging, block);
            storage.ghostdag.delete(staging, block);
            storage.relations.delete(staging, block)?;
            storage.statuses.delete(staging, block);
            storage.block_transactions.delete(staging, block);
            storage.utxo_diffs.delete(staging, block);
            storage.acceptance_data.delete(staging, block);
        }
        if let Some(low) = chain_low {
            storage.selected_chain.stage_prune_below(staging, low)?;
            let root = storage.selected_chain.get_by_index(staging, low)?;
            storage.history_root.stage(staging, &root)?;
        }
        if !stale_tips.is_empty() {
            let tips: Vec<Hash> = storage.tips.read(staging)?.into_iter().filter(|tip| !stale_tips.contains(tip)).collect();
            storage.tips.stage(staging, &tips)?;
            debug!("Dropped {} stale tips below the retained window", stale_tips.len());
        }
        Ok(doomed.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use consensus_core::header::Header;
    use consensus_core::BlueWorkType;
    use database::Database;
    use tempfile::TempDir;

    use crate::config::CacheSizes;

    fn h(n: u64) -> Hash {
        Hash::from_le_u64([n, 0, 0, 0])
    }

    #[test]
    fn test_expected_pruning_point_follows_chain() {
        let tmp = TempDir::new().unwrap();
        let storage = ConsensusStorage::new(Arc::new(Database::open(tmp.path()).unwrap()), &CacheSizes::default());
        let manager = PruningManager::new(4, 8);

        // Chain 1..=10 with blue score n - 1; every header points at genesis
        let mut staging = StagingArea::new();
        reachability::init(&mut storage.view_mut(&mut staging)).unwrap();
        for n in 1..=10u64 {
            let parent = if n == 1 { ORIGIN } else { h(n - 1) };
            let mut data = GhostdagData::new_with_selected_parent(parent, 18);
            data.finalize_score_and_work(n - 1, BlueWorkType::from(n));
            storage.ghostdag.insert(&mut staging, h(n), Arc::new(data)).unwrap();
            let mut header = Header::from_precomputed_hash(h(n), if n == 1 { vec![] } else { vec![parent] });
            header.pruning_point = if n == 1 { Hash::default() } else { h(1) };
            storage.headers.insert(&mut staging, Arc::new(header)).unwrap();
            reachability::add_block(&mut storage.view_mut(&mut staging), h(n), parent, &[]).unwrap();
        }
        storage.commit(staging).unwrap();

        let staging = StagingArea::new();
        let view = storage.view(&staging);
        let child_of = |parent: Hash, blue_score: u64| {
            let mut data = GhostdagData::new_with_selected_parent(parent, 18);
            data.finalize_score_and_work(blue_score, BlueWorkType::from(blue_score));
            data
        };
        assert_eq!(manager.expected_header_pruning_point(view, &child_of(h(1), 1)).unwrap(), h(1));
        assert_eq!(manager.expected_header_pruning_point(view, &child_of(h(4), 4)).unwrap(), h(1));
        // Blue score 10: highest chain block with blue score at most 6 is h(7)
        assert_eq!(manager.expected_header_pruning_point(view, &child_of(h(10), 10)).unwrap(), h(7));
    }
}
