//! Finality
//!
//! The finality point is the selected chain block `finality_depth` blue
//! score below the virtual selected tip. A valid block claiming more blue
//! work than the virtual while not descending from the finality point along
//! its selected chain would force a reorganization below finality. Such a
//! block is parked as a finality conflict until an operator resolves it.

use consensus_core::errors::ConsensusResult;
use consensus_core::Hash;
use database::StagingArea;
use tracing::warn;

use crate::consensus::dag::reachability;
use crate::consensus::storage::{ConsensusStorage, GhostdagStoreReader, StagedView};
use crate::consensus::types::FinalityConflict;
use crate::process::sync::{chain_ancestor_at_blue_score, selected_chain_block_at_blue_score};

#[derive(Clone, Copy, Debug)]
pub struct FinalityManager {
    finality_depth: u64,
}

impl FinalityManager {
    pub fn new(finality_depth: u64) -> Self {
        Self { finality_depth }
    }

    pub fn finality_depth(&self) -> u64 {
        self.finality_depth
    }

    /// Finality point of the committed virtual chain
    pub fn virtual_finality_point(&self, view: StagedView, selected_tip: Hash) -> ConsensusResult<Hash> {
        let blue_score = view.get_blue_score(selected_tip)?;
        selected_chain_block_at_blue_score(view, blue_score.saturating_sub(self.finality_depth))
    }

    /// Finality point as seen from an arbitrary block
    pub fn finality_point_of(&self, view: StagedView, block: Hash) -> ConsensusResult<Hash> {
        let blue_score = view.get_blue_score(block)?;
        chain_ancestor_at_blue_score(view, block, blue_score.saturating_sub(self.finality_depth))
    }

    /// Whether `block` would reorganize the virtual below `finality_point`
    pub fn is_violating(&self, view: StagedView, block: Hash, selected_tip: Hash, finality_point: Hash) -> ConsensusResult<bool> {
        if view.get_blue_work(block)? <= view.get_blue_work(selected_tip)? {
            return Ok(false);
        }
        Ok(!reachability::is_chain_ancestor_of(&view, finality_point, block)?)
    }

    /// Appends a conflict record, keeping at most one per violating block
    pub fn stage_conflict(&self, storage: &ConsensusStorage, staging: &mut StagingArea, conflict: FinalityConflict) -> ConsensusResult<()> {
        warn!(
            "Block {} violates finality point {} of selected tip {}",
            conflict.violating_block, conflict.finality_point, conflict.selected_tip
        );
        let mut conflicts = storage.finality_conflicts.get(staging)?.unwrap_or_default();
        conflicts.retain(|existing| existing.violating_block != conflict.violating_block);
        conflicts.push(conflict);
        storage.finality_conflicts.stage(staging, &conflicts)?;
        Ok(())
    }
}
