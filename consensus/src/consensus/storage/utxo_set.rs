//! UTXO diff manager for consensus
//!
//! The materialized UTXO set is kept at the virtual selected tip only. Every
//! chain block stores the diff from its selected parent's state to its own,
//! so the state of any block reachable through the selected chain is the
//! materialized set composed with the reversed diffs down to the split point
//! and the forward diffs up to the block.

use std::collections::HashSet;
use std::sync::Arc;

use consensus_core::acceptance_data::{AcceptanceData, AcceptedTxEntry, MergesetBlockAcceptanceData};
use consensus_core::block::Block;
use consensus_core::errors::{ConsensusError, ConsensusResult, RuleError, TxRuleError};
use consensus_core::ghostdag::GhostdagData;
use consensus_core::tx::{PopulatedTransaction, ScriptPublicKey, Transaction, TransactionOutpoint, UtxoEntry};
use consensus_core::utxo::{ComposedUtxoView, UtxoCollection, UtxoCommitment, UtxoDiff, UtxoView};
use consensus_core::{Hash, ORIGIN};
use database::StagingArea;
use tracing::{debug, trace};

use super::consensus_db::{ConsensusStorage, StagedView};
use super::stores::{GhostdagStoreReader, HeaderStoreReader};
use crate::consensus::types::VirtualState;
use crate::consensus::validation::BlockValidator;

/// Where a block meets the current selected chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainPath {
    /// Highest selected chain block the target descends from through selected parents
    pub split_point: Hash,
    pub split_index: u64,
    /// Blocks above the split point up to and including the target, lowest first
    pub added: Vec<Hash>,
}

/// The UTXO outcome of merging a block's merge set on top of its selected parent
#[derive(Debug, Clone)]
pub struct MergesetUtxoState {
    /// Diff from the selected parent's state to the merging block's state
    pub diff: UtxoDiff,
    pub acceptance_data: AcceptanceData,
    pub utxo_commitment: Hash,
    /// Fees collected by the merging block's own transactions, when validated
    pub fees: u64,
}

/// Selected chain blocks removed and added by a virtual selected tip change
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainChanges {
    /// Highest first
    pub removed: Vec<Hash>,
    /// Lowest first
    pub added: Vec<Hash>,
}

pub struct UtxoDiffManager {
    block_validator: Arc<BlockValidator>,
}

impl UtxoDiffManager {
    pub fn new(block_validator: Arc<BlockValidator>) -> Self {
        Self { block_validator }
    }

    /// Walks selected parents from `target` until reaching the selected chain
    pub fn chain_path(&self, view: StagedView, target: Hash) -> ConsensusResult<ChainPath> {
        let storage = view.storage();
        let mut added = Vec::new();
        let mut current = target;
        loop {
            if let Some(index) = storage.selected_chain.get_index(view.staging(), current)? {
                added.reverse();
                return Ok(ChainPath { split_point: current, split_index: index, added });
            }
            if current == ORIGIN {
                return Err(ConsensusError::Internal(format!("block {target} does not reach the selected chain")));
            }
            added.push(current);
            current = view.get_selected_parent(current)?;
        }
    }

    /// The diff turning the materialized UTXO set into the state of the path's target
    pub fn restore_diff(&self, view: StagedView, path: &ChainPath) -> ConsensusResult<UtxoDiff> {
        let storage = view.storage();
        let staging = view.staging();
        let (tip_index, _) = storage
            .selected_chain
            .get_tip(staging)?
            .ok_or_else(|| ConsensusError::MissingData("selected chain tip".to_string()))?;

        let mut diff = UtxoDiff::default();
        for index in (path.split_index + 1..=tip_index).rev() {
            let chain_block = storage.selected_chain.get_by_index(staging, index)?;
            diff.with_diff_in_place(&storage.utxo_diffs.get(staging, chain_block)?.reversed())?;
        }
        for block in path.added.iter() {
            diff.with_diff_in_place(&*storage.utxo_diffs.get(staging, *block)?)?;
        }
        Ok(diff)
    }

    /// Restricts the state `base ∘ base_diff` to `outpoints`. Reading only what a
    /// computation touches keeps it independent of the UTXO set size.
    fn load_entries<'a>(
        &self,
        view: StagedView,
        base_diff: &UtxoDiff,
        outpoints: impl IntoIterator<Item = &'a TransactionOutpoint>,
    ) -> ConsensusResult<UtxoCollection> {
        let storage = view.storage();
        let mut entries = UtxoCollection::new();
        for outpoint in outpoints {
            if entries.contains(outpoint) {
                continue;
            }
            if let Some(entry) = base_diff.add.get(outpoint) {
                entries.insert(*outpoint, entry.clone());
            } else if !base_diff.remove.contains(outpoint) {
                if let Some(entry) = storage.utxo_set.get(view.staging(), outpoint)? {
                    entries.insert(*outpoint, entry);
                }
            }
        }
        Ok(entries)
    }

    /// Accepts the merge set of `ghostdag_data` in consensus order on top of the
    /// selected parent's state. Merged transactions that conflict with that state
    /// are skipped. When `block` is given its own transactions are validated
    /// against the resulting state and its UTXO commitment is checked.
    pub fn calculate_mergeset_utxo_state(
        &self,
        view: StagedView,
        ghostdag_data: &GhostdagData,
        daa_score: u64,
        block: Option<&Block>,
    ) -> ConsensusResult<MergesetUtxoState> {
        let storage = view.storage();
        let staging = view.staging();
        let selected_parent = ghostdag_data.selected_parent;
        let base_diff = self.restore_diff(view, &self.chain_path(view, selected_parent)?)?;

        let mut merged: Vec<(Hash, Arc<Vec<Transaction>>)> = Vec::with_capacity(ghostdag_data.mergeset_size());
        for hash in ghostdag_data.consensus_ordered_mergeset() {
            if storage.block_transactions.has(staging, hash)? {
                merged.push((hash, storage.block_transactions.get(staging, hash)?));
            } else {
                debug!("Merged block {} has no body, nothing to accept", hash);
                merged.push((hash, Arc::new(Vec::new())));
            }
        }

        let mut touched: Vec<TransactionOutpoint> = Vec::new();
        for (_, txs) in merged.iter() {
            for tx in txs.iter() {
                touched.extend(tx.inputs.iter().map(|input| input.previous_outpoint));
                touched.extend((0..tx.outputs.len() as u32).map(|index| TransactionOutpoint::new(tx.id(), index)));
            }
        }
        if let Some(block) = block {
            for tx in block.transactions.iter() {
                touched.extend(tx.inputs.iter().map(|input| input.previous_outpoint));
            }
        }
        let base = self.load_entries(view, &base_diff, touched.iter())?;

        let mut diff = UtxoDiff::default();
        let mut acceptance_data = AcceptanceData::with_capacity(merged.len());
        for (hash, txs) in merged.iter() {
            let mut accepted_transactions = Vec::new();
            for (index, tx) in txs.iter().enumerate() {
                if self.try_accept_transaction(&base, &mut diff, tx, daa_score) {
                    accepted_transactions.push(AcceptedTxEntry { transaction_id: tx.id(), index_within_block: index as u32 });
                } else {
                    trace!("Merged transaction {} of block {} is not accepted", tx.id(), hash);
                }
            }
            acceptance_data.push(MergesetBlockAcceptanceData { block_hash: *hash, accepted_transactions });
        }

        let mut commitment = UtxoCommitment::from_hash(view.get_header(selected_parent)?.utxo_commitment);
        commitment.apply_diff(&diff);
        let utxo_commitment = commitment.to_hash();

        let mut fees = 0;
        if let Some(block) = block {
            let state = ComposedUtxoView::new(&base, &diff);
            fees = self.block_validator.validate_block_transactions_in_context(block, &state, daa_score)?;
            if block.header.utxo_commitment != utxo_commitment {
                return Err(RuleError::BadUtxoCommitment(utxo_commitment, block.header.utxo_commitment).into());
            }
        }

        Ok(MergesetUtxoState { diff, acceptance_data, utxo_commitment, fees })
    }

    /// Applies `tx` to `diff` if it is valid against `base ∘ diff`
    fn try_accept_transaction(&self, base: &UtxoCollection, diff: &mut UtxoDiff, tx: &Transaction, daa_score: u64) -> bool {
        let state = ComposedUtxoView::new(base, diff);
        let tx_id = tx.id();
        if (0..tx.outputs.len() as u32).any(|index| state.get(&TransactionOutpoint::new(tx_id, index)).is_some()) {
            return false;
        }
        let validator = self.block_validator.transaction_validator();
        let Ok(entries) = validator.populate(tx, &state) else {
            return false;
        };
        let populated = PopulatedTransaction::new(tx, entries);
        if !tx.is_coinbase() && validator.validate_populated_transaction_and_get_fee(&populated, daa_score).is_err() {
            return false;
        }
        let mut candidate = diff.clone();
        if candidate.add_transaction(&populated, daa_score).is_err() {
            return false;
        }
        *diff = candidate;
        true
    }

    /// Moves the materialized UTXO set and the selected chain index to `new_tip`
    pub fn stage_selected_tip_change(
        &self,
        storage: &ConsensusStorage,
        staging: &mut StagingArea,
        new_tip: Hash,
    ) -> ConsensusResult<ChainChanges> {
        let (path, diff) = {
            let view = storage.view(staging);
            let path = self.chain_path(view, new_tip)?;
            let diff = self.restore_diff(view, &path)?;
            (path, diff)
        };
        storage.utxo_set.stage_diff(staging, &diff)?;

        let mut changes = ChainChanges::default();
        while let Some((index, _)) = storage.selected_chain.get_tip(staging)? {
            if index <= path.split_index {
                break;
            }
            changes.removed.push(storage.selected_chain.stage_pop(staging)?);
        }
        for block in path.added.iter() {
            storage.selected_chain.stage_push(staging, *block)?;
        }
        changes.added = path.added;
        Ok(changes)
    }

    /// Advances the pruning point UTXO set along the selected chain from `old` up to `new`
    pub fn stage_pruning_utxo_set_advance(
        &self,
        storage: &ConsensusStorage,
        staging: &mut StagingArea,
        old: Hash,
        new: Hash,
    ) -> ConsensusResult<()> {
        let chain_index = |hash: Hash, staging: &StagingArea| -> ConsensusResult<u64> {
            storage
                .selected_chain
                .get_index(staging, hash)?
                .ok_or_else(|| ConsensusError::Internal(format!("pruning point {hash} is not on the selected chain")))
        };
        let from = chain_index(old, staging)?;
        let to = chain_index(new, staging)?;
        let mut diff = UtxoDiff::default();
        for index in from + 1..=to {
            let chain_block = storage.selected_chain.get_by_index(staging, index)?;
            diff.with_diff_in_place(&*storage.utxo_diffs.get(staging, chain_block)?)?;
        }
        debug!("Advancing the pruning point UTXO set over {} chain blocks", to.saturating_sub(from));
        storage.pruning_utxo_set.stage_diff(staging, &diff)?;
        Ok(())
    }

    /// The committed virtual UTXO set, optionally restricted to outputs locked by one of `filter`
    pub fn virtual_utxo_set(
        &self,
        storage: &ConsensusStorage,
        virtual_state: &VirtualState,
        filter: Option<&[ScriptPublicKey]>,
    ) -> ConsensusResult<Vec<(TransactionOutpoint, UtxoEntry)>> {
        let mut utxos: UtxoCollection = storage.utxo_set.iter_committed()?.into_iter().collect();
        utxos.apply_diff(&virtual_state.utxo_diff)?;
        let wanted: Option<HashSet<&ScriptPublicKey>> = filter.map(|scripts| scripts.iter().collect());
        let mut result: Vec<(TransactionOutpoint, UtxoEntry)> = utxos
            .iter()
            .filter(|(_, entry)| wanted.as_ref().map_or(true, |wanted| wanted.contains(&entry.script_public_key)))
            .map(|(outpoint, entry)| (*outpoint, entry.clone()))
            .collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(result)
    }

    /// Validates `tx` against the committed virtual UTXO state and returns its fee
    pub fn validate_mempool_transaction(
        &self,
        storage: &ConsensusStorage,
        virtual_state: &VirtualState,
        tx: &Transaction,
    ) -> ConsensusResult<u64> {
        let tx_error = |err: TxRuleError| ConsensusError::from(RuleError::Tx(err, tx.id()));
        let validator = self.block_validator.transaction_validator();
        if tx.is_coinbase() {
            return Err(tx_error(TxRuleError::UnexpectedCoinbaseSubnetwork));
        }
        validator.validate_tx_in_isolation(tx).map_err(tx_error)?;

        let staging = StagingArea::new();
        let view = storage.view(&staging);
        let outpoints: Vec<TransactionOutpoint> = tx.inputs.iter().map(|input| input.previous_outpoint).collect();
        let base = self.load_entries(view, &UtxoDiff::default(), outpoints.iter())?;
        let state = ComposedUtxoView::new(&base, &virtual_state.utxo_diff);
        let entries = validator.populate(tx, &state).map_err(tx_error)?;
        let populated = PopulatedTransaction::new(tx, entries);
        validator.validate_populated_transaction_and_get_fee(&populated, virtual_state.daa_score).map_err(tx_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheSizes;
    use crate::consensus::validation::{SigCache, TransactionValidator};
    use consensus_core::config::Params;
    use consensus_core::header::Header;
    use consensus_core::script::op_true_script;
    use consensus_core::subnets::{SUBNETWORK_ID_COINBASE, SUBNETWORK_ID_NATIVE};
    use consensus_core::tx::{TransactionInput, TransactionOutput};
    use consensus_core::BlueWorkType;
    use database::Database;
    use tempfile::TempDir;

    fn h(n: u64) -> Hash {
        Hash::from_le_u64([n, 0, 0, 0])
    }

    fn op(n: u64) -> TransactionOutpoint {
        TransactionOutpoint::new(Hash::from_u64_word(n), 0)
    }

    fn entry(amount: u64) -> UtxoEntry {
        UtxoEntry::new(amount, op_true_script(), 0, false)
    }

    fn manager(params: &Params) -> UtxoDiffManager {
        let tx_validator = Arc::new(TransactionValidator::new(params, Arc::new(SigCache::new(10))));
        UtxoDiffManager::new(Arc::new(BlockValidator::new(params, tx_validator)))
    }

    fn open_storage(tmp: &TempDir) -> ConsensusStorage {
        ConsensusStorage::new(Arc::new(Database::open(tmp.path()).unwrap()), &CacheSizes::default())
    }

    /// Stages a block record with the given selected parent, UTXO diff and resulting commitment
    fn stage_block(storage: &ConsensusStorage, staging: &mut StagingArea, hash: Hash, selected_parent: Hash, diff: UtxoDiff, commitment: Hash) {
        let mut data = GhostdagData::new_with_selected_parent(selected_parent, 18);
        data.finalize_score_and_work(0, BlueWorkType::ZERO);
        storage.ghostdag.insert(staging, hash, Arc::new(data)).unwrap();
        storage.utxo_diffs.insert(staging, hash, Arc::new(diff)).unwrap();
        let mut header = Header::from_precomputed_hash(hash, vec![selected_parent]);
        header.utxo_commitment = commitment;
        storage.headers.insert(staging, Arc::new(header)).unwrap();
    }

    fn diff(add: &[(TransactionOutpoint, UtxoEntry)], remove: &[(TransactionOutpoint, UtxoEntry)]) -> UtxoDiff {
        let mut diff = UtxoDiff::default();
        for (outpoint, entry) in remove {
            diff.remove_entry(*outpoint, entry.clone()).unwrap();
        }
        for (outpoint, entry) in add {
            diff.add_entry(*outpoint, entry.clone()).unwrap();
        }
        diff
    }

    fn committed_set(storage: &ConsensusStorage) -> Vec<TransactionOutpoint> {
        let mut ops: Vec<TransactionOutpoint> = storage.utxo_set.iter_committed().unwrap().into_iter().map(|(op, _)| op).collect();
        ops.sort();
        ops
    }

    #[test]
    fn test_selected_tip_change_round_trip() {
        let tmp = TempDir::new().unwrap();
        let storage = open_storage(&tmp);
        let manager = manager(&Params::simnet());
        let (g, a1, a2, b1, b2) = (h(1), h(2), h(3), h(4), h(5));

        // g -> a1 -> a2 is the selected chain, g -> b1 -> b2 a fork
        let mut staging = StagingArea::new();
        stage_block(&storage, &mut staging, g, ORIGIN, UtxoDiff::default(), Hash::default());
        stage_block(&storage, &mut staging, a1, g, diff(&[(op(1), entry(1))], &[]), Hash::default());
        stage_block(&storage, &mut staging, a2, a1, diff(&[(op(2), entry(2))], &[(op(1), entry(1))]), Hash::default());
        stage_block(&storage, &mut staging, b1, g, diff(&[(op(3), entry(3))], &[]), Hash::default());
        stage_block(&storage, &mut staging, b2, b1, diff(&[(op(4), entry(4))], &[]), Hash::default());
        for block in [g, a1, a2] {
            storage.selected_chain.stage_push(&mut staging, block).unwrap();
        }
        storage.utxo_set.stage_diff(&mut staging, &diff(&[(op(2), entry(2))], &[])).unwrap();
        storage.commit(staging).unwrap();

        let mut staging = StagingArea::new();
        let changes = manager.stage_selected_tip_change(&storage, &mut staging, b2).unwrap();
        assert_eq!(changes, ChainChanges { removed: vec![a2, a1], added: vec![b1, b2] });
        storage.commit(staging).unwrap();
        assert_eq!(committed_set(&storage), vec![op(3), op(4)]);
        assert_eq!(storage.selected_chain.get_tip(&StagingArea::new()).unwrap(), Some((2, b2)));

        let mut staging = StagingArea::new();
        manager.stage_selected_tip_change(&storage, &mut staging, a2).unwrap();
        storage.commit(staging).unwrap();
        assert_eq!(committed_set(&storage), vec![op(2)]);

        // The state of a side block is reachable without moving the chain
        let staging = StagingArea::new();
        let view = storage.view(&staging);
        let path = manager.chain_path(view, b1).unwrap();
        assert_eq!(path, ChainPath { split_point: g, split_index: 0, added: vec![b1] });
        assert_eq!(manager.restore_diff(view, &path).unwrap(), diff(&[(op(3), entry(3))], &[(op(2), entry(2))]));
    }

    #[test]
    fn test_mergeset_acceptance_skips_conflicts() {
        let tmp = TempDir::new().unwrap();
        let storage = open_storage(&tmp);
        let params = Params::simnet();
        let manager = manager(&params);
        let (g, m) = (h(1), h(2));
        let funding = (op(9), entry(100));
        let genesis_state: UtxoCollection = [funding.clone()].into_iter().collect();

        let spend = |value: u64| {
            Transaction::new(
                0,
                vec![TransactionInput::new(funding.0, vec![], 0, 1)],
                vec![TransactionOutput::new(value, op_true_script())],
                0,
                SUBNETWORK_ID_NATIVE,
                vec![],
            )
        };
        let coinbase = Transaction::new(0, vec![], vec![TransactionOutput::new(5, op_true_script())], 0, SUBNETWORK_ID_COINBASE, vec![]);
        let (first, second) = (spend(90), spend(80));

        let mut staging = StagingArea::new();
        stage_block(&storage, &mut staging, g, ORIGIN, UtxoDiff::default(), UtxoCommitment::from_collection(&genesis_state).to_hash());
        storage.block_transactions.insert(&mut staging, g, Arc::new(vec![])).unwrap();
        storage.block_transactions.insert(&mut staging, m, Arc::new(vec![coinbase.clone(), first.clone(), second])).unwrap();
        storage.selected_chain.stage_push(&mut staging, g).unwrap();
        storage.utxo_set.stage_diff(&mut staging, &diff(&[funding.clone()], &[])).unwrap();
        storage.commit(staging).unwrap();

        let mut data = GhostdagData::new_with_selected_parent(g, params.ghostdag_k);
        data.add_blue(m, 0, &Default::default());
        let staging = StagingArea::new();
        let state = manager.calculate_mergeset_utxo_state(storage.view(&staging), &data, 7, None).unwrap();

        assert_eq!(state.acceptance_data.len(), 2);
        assert_eq!(state.acceptance_data[0].block_hash, g);
        let accepted: Vec<u32> = state.acceptance_data[1].accepted_transactions.iter().map(|e| e.index_within_block).collect();
        assert_eq!(accepted, vec![0, 1]);

        let mut expected = genesis_state.clone();
        expected.apply_diff(&state.diff).unwrap();
        assert!(!expected.contains(&funding.0));
        assert_eq!(expected.get(&TransactionOutpoint::new(first.id(), 0)).map(|e| (e.amount, e.block_daa_score)), Some((90, 7)));
        assert!(expected.get(&TransactionOutpoint::new(coinbase.id(), 0)).unwrap().is_coinbase);
        assert_eq!(state.utxo_commitment, UtxoCommitment::from_collection(&expected).to_hash());
    }

    #[test]
    fn test_mempool_validation_against_virtual() {
        let tmp = TempDir::new().unwrap();
        let storage = open_storage(&tmp);
        let params = Params::simnet();
        let manager = manager(&params);

        let mut staging = StagingArea::new();
        storage.utxo_set.stage_diff(&mut staging, &diff(&[(op(1), entry(50))], &[])).unwrap();
        storage.commit(staging).unwrap();

        let mut virtual_diff = UtxoDiff::default();
        virtual_diff.add_entry(op(2), entry(70)).unwrap();
        let virtual_state = VirtualState {
            parents: vec![h(1)],
            ghostdag_data: GhostdagData::new_with_selected_parent(h(1), params.ghostdag_k),
            daa_score: 10,
            bits: params.pow_max_bits,
            past_median_time: 0,
            utxo_diff: virtual_diff,
        };

        let tx = Transaction::new(
            0,
            vec![TransactionInput::new(op(1), vec![], 0, 1), TransactionInput::new(op(2), vec![], 0, 1)],
            vec![TransactionOutput::new(100, op_true_script())],
            0,
            SUBNETWORK_ID_NATIVE,
            vec![],
        );
        assert_eq!(manager.validate_mempool_transaction(&storage, &virtual_state, &tx).unwrap(), 20);

        let missing = Transaction::new(
            0,
            vec![TransactionInput::new(op(3), vec![], 0, 1)],
            vec![TransactionOutput::new(1, op_true_script())],
            0,
            SUBNETWORK_ID_NATIVE,
            vec![],
        );
        assert!(matches!(
            manager.validate_mempool_transaction(&storage, &virtual_state, &missing),
            Err(ConsensusError::Rule(RuleError::Tx(TxRuleError::MissingTxOutpoint(_), _)))
        ));

        let all = manager.virtual_utxo_set(&storage, &virtual_state, None).unwrap();
        assert_eq!(all.len(), 2);
        let none = manager.virtual_utxo_set(&storage, &virtual_state, Some(&[ScriptPublicKey::from_vec(0, vec![0x00])])).unwrap();
        assert!(none.is_empty());
    }
}
