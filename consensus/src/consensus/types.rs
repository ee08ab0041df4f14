//! Consensus-specific types
//!
//! State records persisted in the metadata column family and shared between
//! the processors.

use consensus_core::ghostdag::GhostdagData;
use consensus_core::utxo::UtxoDiff;
use consensus_core::Hash;
use serde::{Deserialize, Serialize};

/// The state of the synthetic virtual block, whose parents are the selected DAG tips
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualState {
    /// Virtual parents, highest blue work first
    pub parents: Vec<Hash>,
    pub ghostdag_data: GhostdagData,
    pub daa_score: u64,
    /// Difficulty bits a block mined on top of the virtual would carry
    pub bits: u32,
    pub past_median_time: u64,
    /// The virtual merge set accepted on top of the UTXO state of the selected tip
    pub utxo_diff: UtxoDiff,
}

impl VirtualState {
    /// The virtual selected parent, i.e. the selected tip of the DAG
    pub fn selected_tip(&self) -> Hash {
        self.ghostdag_data.selected_parent
    }
}

/// A block that claims more work than the virtual chain without descending
/// from the finality point, awaiting an operator decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalityConflict {
    pub violating_block: Hash,
    /// The finality point the block failed to descend from
    pub finality_point: Hash,
    /// The virtual selected tip when the conflict was detected
    pub selected_tip: Hash,
}
