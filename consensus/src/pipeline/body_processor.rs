//! Body processor for consensus
//!
//! This module validates block bodies and derives the UTXO state of a block:
//! the merge set is accepted on top of the selected parent's state, the
//! block's own transactions are checked against the result, and the UTXO
//! diff and acceptance data are staged.

use std::sync::Arc;

use consensus_core::block::Block;
use consensus_core::errors::ConsensusResult;
use consensus_core::ghostdag::GhostdagData;
use database::StagingArea;
use tracing::trace;

use crate::consensus::storage::{ConsensusStorage, UtxoDiffManager};
use crate::consensus::validation::BlockValidator;

/// Body processor for transaction validation and UTXO diffs
pub struct BodyProcessor {
    block_validator: Arc<BlockValidator>,
    utxo_diff_manager: Arc<UtxoDiffManager>,
}

impl BodyProcessor {
    pub fn new(block_validator: Arc<BlockValidator>, utxo_diff_manager: Arc<UtxoDiffManager>) -> Self {
        Self { block_validator, utxo_diff_manager }
    }

    /// Context-free body checks, run before anything is staged
    pub fn validate_body_in_isolation(&self, block: &Block) -> ConsensusResult<()> {
        Ok(self.block_validator.validate_body_in_isolation(block)?)
    }

    /// Validates the body against the block's UTXO state and stages the body,
    /// its UTXO diff and its acceptance data. Returns the collected fees.
    pub fn validate_and_stage_body(
        &self,
        storage: &ConsensusStorage,
        staging: &mut StagingArea,
        block: &Block,
        ghostdag_data: &GhostdagData,
    ) -> ConsensusResult<u64> {
        let hash = block.hash();
        let state = {
            let view = storage.view(staging);
            self.utxo_diff_manager.calculate_mergeset_utxo_state(view, ghostdag_data, block.header.daa_score, Some(block))?
        };
        trace!(
            "Block {} accepts {} merged transactions",
            hash,
            state.acceptance_data.iter().map(|merged| merged.accepted_transactions.len()).sum::<usize>()
        );

        storage.block_transactions.insert(staging, hash, Arc::new(block.transactions.clone()))?;
        storage.utxo_diffs.insert(staging, hash, Arc::new(state.diff))?;
        storage.acceptance_data.insert(staging, hash, Arc::new(state.acceptance_data))?;
        Ok(state.fees)
    }
}
