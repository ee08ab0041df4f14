//! Virtual processor for consensus
//!
//! This module resolves the virtual block: the synthetic block whose parents
//! are the best valid DAG tips. Its selected parent defines the selected
//! chain, and its merge set is accepted on top of the UTXO set of that chain
//! to form the state mempool transactions are validated against.

use std::sync::Arc;

use consensus_core::blockstatus::BlockStatus;
use consensus_core::config::Params;
use consensus_core::errors::{ConsensusError, ConsensusResult};
use consensus_core::ghostdag::SortableBlock;
use consensus_core::{BlueWorkType, Hash, VIRTUAL};
use database::StagingArea;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::consensus::dag::reachability;
use crate::consensus::storage::utxo_set::ChainChanges;
use crate::consensus::storage::{ConsensusStorage, GhostdagStoreReader, UtxoDiffManager};
use crate::consensus::types::VirtualState;
use crate::pipeline::header_processor::HeaderProcessor;
use crate::process::FinalityManager;

/// Virtual processor for virtual state calculation
pub struct VirtualProcessor {
    header_processor: Arc<HeaderProcessor>,
    utxo_diff_manager: Arc<UtxoDiffManager>,
    finality_manager: FinalityManager,
    max_block_parents: usize,
    merge_set_size_limit: usize,
    /// Last committed virtual state
    state: RwLock<Option<Arc<VirtualState>>>,
}

impl VirtualProcessor {
    pub fn new(params: &Params, header_processor: Arc<HeaderProcessor>, utxo_diff_manager: Arc<UtxoDiffManager>) -> Self {
        Self {
            header_processor,
            utxo_diff_manager,
            finality_manager: FinalityManager::new(params.finality_depth()),
            max_block_parents: params.max_block_parents,
            merge_set_size_limit: params.merge_set_size_limit as usize,
            state: RwLock::new(None),
        }
    }

    /// The committed virtual state
    pub fn state(&self) -> ConsensusResult<Arc<VirtualState>> {
        self.state.read().clone().ok_or_else(|| ConsensusError::MissingData("virtual state".to_string()))
    }

    /// Publishes a virtual state after its staging area was committed
    pub fn set_state(&self, state: Arc<VirtualState>) {
        *self.state.write() = Some(state);
    }

    /// Reloads the committed virtual state from storage, if there is one
    pub fn load(&self, storage: &ConsensusStorage) -> ConsensusResult<()> {
        *self.state.write() = storage.virtual_state.get(&StagingArea::new())?;
        Ok(())
    }

    pub fn clear(&self) {
        *self.state.write() = None;
    }

    /// Picks the virtual parents among the valid tips, moves the selected chain
    /// and the UTXO set to the new selected tip and stages the virtual state
    pub fn stage_resolve_virtual(
        &self,
        storage: &ConsensusStorage,
        staging: &mut StagingArea,
    ) -> ConsensusResult<(Arc<VirtualState>, ChainChanges)> {
        let mut parents = self.pick_virtual_parents(storage, staging)?;
        let ghostdag_data = {
            let view = storage.view(staging);
            loop {
                let data = self.header_processor.ghostdag(view, &parents, BlueWorkType::ZERO)?;
                if data.mergeset_size() <= self.merge_set_size_limit || parents.len() == 1 {
                    break data;
                }
                // The lowest ranked parent contributes the most distant merge set
                parents.pop();
            }
        };

        let selected_tip = ghostdag_data.selected_parent;
        let chain_tip = storage.selected_chain.get_tip(staging)?.map(|(_, hash)| hash);
        let changes = if chain_tip != Some(selected_tip) {
            let changes = self.utxo_diff_manager.stage_selected_tip_change(storage, staging, selected_tip)?;
            if !changes.removed.is_empty() {
                info!("Selected chain reorganized: {} blocks removed, {} added", changes.removed.len(), changes.added.len());
            }
            changes
        } else {
            ChainChanges::default()
        };

        let state = {
            let view = storage.view(staging);
            let fields = self.header_processor.derive_fields(view, VIRTUAL, &ghostdag_data)?;
            let utxo_state = self.utxo_diff_manager.calculate_mergeset_utxo_state(view, &ghostdag_data, fields.daa_score, None)?;
            Arc::new(VirtualState {
                parents,
                ghostdag_data,
                daa_score: fields.daa_score,
                bits: fields.bits,
                past_median_time: fields.past_median_time,
                utxo_diff: utxo_state.diff,
            })
        };
        storage.virtual_state.stage(staging, &state)?;
        debug!("Virtual resolved with selected tip {} at DAA score {}", selected_tip, state.daa_score);
        Ok((state, changes))
    }

    /// Valid tips by descending blue work. Tips whose past misses the finality
    /// point of the best tip are left out, as is anything beyond the parent limit.
    fn pick_virtual_parents(&self, storage: &ConsensusStorage, staging: &StagingArea) -> ConsensusResult<Vec<Hash>> {
        let view = storage.view(staging);
        let mut candidates = Vec::new();
        for tip in storage.tips.read(staging)?.into_iter() {
            if storage.statuses.get(staging, tip)? == Some(BlockStatus::StatusUtxoValid) {
                candidates.push(SortableBlock::new(tip, view.get_blue_work(tip)?));
            }
        }
        candidates.sort_by(|a, b| b.cmp(a));
        let selected_tip = candidates.first().map(|best| best.hash).ok_or_else(|| ConsensusError::Internal("no valid tips".to_string()))?;

        let finality_point = self.finality_manager.finality_point_of(view, selected_tip)?;
        let mut parents = vec![selected_tip];
        for candidate in candidates.into_iter().skip(1) {
            if parents.len() == self.max_block_parents {
                break;
            }
            if reachability::is_dag_ancestor_of(&view, finality_point, candidate.hash)? {
                parents.push(candidate.hash);
            } else {
                debug!("Tip {} does not descend from finality point {}, not merged", candidate.hash, finality_point);
            }
        }
        Ok(parents)
    }
}
