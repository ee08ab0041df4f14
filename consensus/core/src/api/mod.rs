use serde::{Deserialize, Serialize};

use crate::{
    block::Block,
    blockstatus::BlockStatus,
    errors::{BlockProcessResult, ConsensusResult},
    pruning::PruningPointProof,
    tx::{ScriptPublicKey, Transaction, TransactionOutpoint, UtxoEntry},
    BlueWorkType, Hash,
};

/// Summary of a block known to consensus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub hash: Hash,
    pub status: BlockStatus,
    pub blue_score: u64,
    pub blue_work: BlueWorkType,
    pub daa_score: u64,
    pub is_in_virtual_chain: bool,
}

/// How a recorded finality conflict should be settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalityConflictResolution {
    /// Keep the current selected chain and disqualify the violating block
    KeepCurrent,
    /// Reorganize onto the violating block's chain
    SwitchToViolating,
}

/// Abstracts the consensus external API
pub trait ConsensusApi: Send + Sync {
    /// Validates and inserts a block, returning its resulting status
    fn add_block(&self, block: Block) -> BlockProcessResult<BlockStatus>;

    fn get_virtual_selected_parent(&self) -> ConsensusResult<Hash>;

    fn get_block_info(&self, hash: Hash) -> ConsensusResult<Option<BlockInfo>>;

    /// The virtual UTXO set, optionally restricted to outputs locked by one of `filter`
    fn get_virtual_utxo_set(&self, filter: Option<&[ScriptPublicKey]>) -> ConsensusResult<Vec<(TransactionOutpoint, UtxoEntry)>>;

    /// Selected chain hashes from `high` down to `low`, with exponentially growing steps
    fn create_block_locator(&self, low: Hash, high: Hash) -> ConsensusResult<Vec<Hash>>;

    fn get_pruning_point_proof(&self) -> ConsensusResult<PruningPointProof>;

    fn validate_and_apply_pruning_point_proof(&self, proof: PruningPointProof) -> ConsensusResult<()>;

    /// Completes a proof import with the pruning point body and its UTXO set
    fn import_pruning_point_utxo_set(&self, block: Block, utxos: Vec<(TransactionOutpoint, UtxoEntry)>) -> ConsensusResult<()>;

    fn is_in_selected_parent_chain(&self, hash: Hash) -> ConsensusResult<bool>;

    fn resolve_finality_conflict(&self, violating: Hash, resolution: FinalityConflictResolution) -> ConsensusResult<()>;

    /// Validates a transaction against the virtual UTXO set and returns its fee
    fn validate_mempool_transaction(&self, tx: &Transaction) -> ConsensusResult<u64>;

    fn get_pruning_point(&self) -> ConsensusResult<Hash>;

    fn get_finality_point(&self) -> ConsensusResult<Hash>;

    fn get_tips(&self) -> ConsensusResult<Vec<Hash>>;
}
