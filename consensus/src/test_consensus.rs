//! Consensus instance over a scratch database, with helpers building valid
//! blocks on arbitrary parents. Used by the integration tests and by
//! simulations that need a DAG shape without mining.

use std::ops::Deref;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use consensus_core::api::ConsensusApi;
use consensus_core::block::Block;
use consensus_core::config::Params;
use consensus_core::constants::{BLOCK_VERSION, TX_VERSION};
use consensus_core::difficulty::calc_work;
use consensus_core::errors::{BlockProcessResult, ConsensusError, ConsensusResult};
use consensus_core::header::Header;
use consensus_core::merkle::calc_hash_merkle_root;
use consensus_core::script::op_true_script;
use consensus_core::subnets::{SUBNETWORK_ID_COINBASE, SUBNETWORK_ID_NATIVE};
use consensus_core::tx::{Transaction, TransactionInput, TransactionOutpoint, TransactionOutput};
use consensus_core::{BlueWorkType, Hash, VIRTUAL};
use database::StagingArea;
use tempfile::TempDir;

use crate::config::ConsensusConfig;
use crate::consensus::storage::HeaderStoreReader;
use crate::consensus::Consensus;

/// Simnet scaled down so that finality, pruning and coinbase maturity all
/// come into play within a few dozen blocks
pub fn small_params() -> Params {
    Params {
        ghostdag_k: 3,
        finality_duration: 6_000,
        difficulty_window_size: 10,
        timestamp_deviation_tolerance: 3,
        merge_set_size_limit: 3,
        pruning_proof_m: 5,
        coinbase_maturity: 5,
        ..Params::simnet()
    }
}

pub struct TestConsensus {
    consensus: Consensus,
    coinbase_nonce: AtomicU64,
    _db_dir: Option<TempDir>,
}

impl TestConsensus {
    /// Opens a consensus instance over a fresh temporary database
    pub fn new(config: ConsensusConfig) -> ConsensusResult<Self> {
        let db_dir = tempfile::tempdir().map_err(|err| ConsensusError::Internal(format!("failed creating a temp dir: {err}")))?;
        let consensus = Consensus::open(db_dir.path(), config)?;
        Ok(Self { consensus, coinbase_nonce: AtomicU64::new(0), _db_dir: Some(db_dir) })
    }

    pub fn with_params(params: Params) -> ConsensusResult<Self> {
        Self::new(ConsensusConfig::new(Arc::new(params)))
    }

    /// Opens a consensus instance over a database the caller owns
    pub fn open<P: AsRef<Path>>(path: P, config: ConsensusConfig) -> ConsensusResult<Self> {
        // Blocks built by a reopened instance must not repeat earlier coinbases
        let nonce = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_nanos() as u64).unwrap_or_default();
        Ok(Self { consensus: Consensus::open(path, config)?, coinbase_nonce: AtomicU64::new(nonce), _db_dir: None })
    }

    pub fn genesis_hash(&self) -> Hash {
        self.consensus.params().genesis.hash()
    }

    /// A coinbase paying the full subsidy to an anyone-can-spend script.
    /// The payload makes every coinbase, and so every block, unique.
    pub fn coinbase(&self) -> Transaction {
        let nonce = self.coinbase_nonce.fetch_add(1, Ordering::Relaxed);
        Transaction::new(
            TX_VERSION,
            Vec::new(),
            vec![TransactionOutput::new(self.consensus.params().block_subsidy, op_true_script())],
            0,
            SUBNETWORK_ID_COINBASE,
            nonce.to_le_bytes().to_vec(),
        )
    }

    /// Builds a valid block with `parents`, carrying only a coinbase
    pub fn build_block_with_parents(&self, parents: Vec<Hash>) -> ConsensusResult<Block> {
        self.build_block_with_parents_and_transactions(parents, Vec::new())
    }

    /// Builds a block with `parents` whose header fields are the ones
    /// consensus derives from its past, carrying a coinbase and `txs`
    pub fn build_block_with_parents_and_transactions(&self, parents: Vec<Hash>, txs: Vec<Transaction>) -> ConsensusResult<Block> {
        let storage = self.consensus.storage();
        let header_processor = &self.consensus.header_processor;
        let staging = StagingArea::new();
        let view = storage.view(&staging);

        let uncolored = header_processor.ghostdag(view, &parents, BlueWorkType::ZERO)?;
        let fields = header_processor.derive_fields(view, VIRTUAL, &uncolored)?;
        let ghostdag_data = header_processor.ghostdag(view, &parents, calc_work(fields.bits))?;
        let utxo_state = self.consensus.utxo_diff_manager.calculate_mergeset_utxo_state(view, &ghostdag_data, fields.daa_score, None)?;

        let mut latest_parent_time = 0;
        for parent in parents.iter().copied() {
            latest_parent_time = latest_parent_time.max(view.get_timestamp(parent)?);
        }
        let timestamp = (fields.past_median_time + 1).max(latest_parent_time + self.consensus.params().target_time_per_block);

        let mut transactions = Vec::with_capacity(txs.len() + 1);
        transactions.push(self.coinbase());
        transactions.extend(txs);
        let header = Header::new_finalized(
            BLOCK_VERSION,
            vec![parents],
            calc_hash_merkle_root(transactions.iter()),
            utxo_state.utxo_commitment,
            timestamp,
            fields.bits,
            0,
            fields.daa_score,
            ghostdag_data.blue_work,
            ghostdag_data.blue_score,
            fields.pruning_point,
        );
        Ok(Block::new(header, transactions))
    }

    /// Builds and adds a block with `parents`, returning its hash
    pub fn add_block_with_parents(&self, parents: Vec<Hash>) -> BlockProcessResult<Hash> {
        let block = self.build_block_with_parents(parents)?;
        let hash = block.hash();
        self.consensus.add_block(block)?;
        Ok(hash)
    }

    /// Extends the chain of `tip` by `len` blocks and returns the new tip
    pub fn add_chain(&self, tip: Hash, len: usize) -> BlockProcessResult<Hash> {
        let mut tip = tip;
        for _ in 0..len {
            tip = self.add_block_with_parents(vec![tip])?;
        }
        Ok(tip)
    }

    /// Outpoint of the coinbase output of a stored block
    pub fn coinbase_outpoint(&self, hash: Hash) -> ConsensusResult<TransactionOutpoint> {
        let block = self.consensus.get_block(hash)?.ok_or(ConsensusError::UnknownBlock(hash))?;
        let coinbase = block.transactions.first().ok_or(ConsensusError::MissingData(format!("coinbase of {hash}")))?;
        Ok(TransactionOutpoint::new(coinbase.id(), 0))
    }
}

/// A transaction spending anyone-can-spend outputs into one output of `value`
pub fn spend_op_true(outpoints: &[TransactionOutpoint], value: u64) -> Transaction {
    Transaction::new(
        TX_VERSION,
        outpoints.iter().map(|outpoint| TransactionInput::new(*outpoint, Vec::new(), 0, 1)).collect(),
        vec![TransactionOutput::new(value, op_true_script())],
        0,
        SUBNETWORK_ID_NATIVE,
        Vec::new(),
    )
}

impl Deref for TestConsensus {
    type Target = Consensus;

    fn deref(&self) -> &Self::Target {
        &self.consensus
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_built_blocks_are_accepted() {
        let tc = TestConsensus::with_params(small_params()).unwrap();
        let genesis = tc.genesis_hash();
        let a = tc.add_block_with_parents(vec![genesis]).unwrap();
        let b = tc.add_block_with_parents(vec![genesis]).unwrap();
        assert_ne!(a, b);
        let c = tc.add_block_with_parents(vec![a, b]).unwrap();
        assert_eq!(tc.get_virtual_selected_parent().unwrap(), c);
        assert_eq!(tc.get_tips().unwrap(), vec![c]);
    }
}
