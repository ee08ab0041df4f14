//! Block body validation for consensus
//!
//! This module validates block bodies including:
//! - Coinbase placement and payload
//! - Merkle root, transaction uniqueness and block mass
//! - Transactions against the UTXO state of the block, and the coinbase amount

use std::collections::HashSet;
use std::sync::Arc;

use consensus_core::block::Block;
use consensus_core::config::Params;
use consensus_core::errors::RuleError;
use consensus_core::hashing;
use consensus_core::mass::MassCalculator;
use consensus_core::merkle::calc_hash_merkle_root;
use consensus_core::tx::{PopulatedTransaction, COINBASE_TRANSACTION_INDEX};
use consensus_core::utxo::UtxoView;

use super::transaction_validator::TransactionValidator;

/// Block validator for consensus rules
pub struct BlockValidator {
    transaction_validator: Arc<TransactionValidator>,
    mass_calculator: MassCalculator,
    max_block_mass: u64,
    max_coinbase_payload_len: usize,
    block_subsidy: u64,
}

impl BlockValidator {
    pub fn new(params: &Params, transaction_validator: Arc<TransactionValidator>) -> Self {
        Self {
            transaction_validator,
            mass_calculator: MassCalculator::new_with_consensus_params(params),
            max_block_mass: params.max_block_mass,
            max_coinbase_payload_len: params.max_coinbase_payload_len,
            block_subsidy: params.block_subsidy,
        }
    }

    pub fn transaction_validator(&self) -> &Arc<TransactionValidator> {
        &self.transaction_validator
    }

    /// Context-free body checks
    pub fn validate_body_in_isolation(&self, block: &Block) -> Result<(), RuleError> {
        let txs = &block.transactions;
        let coinbase = txs.first().ok_or(RuleError::NoTransactions)?;
        if !coinbase.is_coinbase() {
            return Err(RuleError::FirstTxNotCoinbase);
        }
        let coinbases = txs.iter().filter(|tx| tx.is_coinbase()).count();
        if coinbases > 1 {
            return Err(RuleError::MultipleCoinbases(coinbases));
        }
        if coinbase.payload.len() > self.max_coinbase_payload_len {
            return Err(RuleError::CoinbasePayloadTooLong(coinbase.payload.len(), self.max_coinbase_payload_len));
        }

        let merkle_root = calc_hash_merkle_root(txs.iter());
        if merkle_root != block.header.hash_merkle_root {
            return Err(RuleError::BadMerkleRoot(merkle_root, block.header.hash_merkle_root));
        }

        let mut ids = HashSet::with_capacity(txs.len());
        for tx in txs.iter() {
            if hashing::tx::id(tx) != tx.id() {
                return Err(RuleError::TransactionIdMismatch(tx.id()));
            }
            if !ids.insert(tx.id()) {
                return Err(RuleError::DuplicateTransactions(tx.id()));
            }
            self.transaction_validator.validate_tx_in_isolation(tx).map_err(|err| RuleError::Tx(err, tx.id()))?;
        }

        let mass = self.mass_calculator.calc_block_mass(txs.iter());
        if mass > self.max_block_mass {
            return Err(RuleError::ExceedsMassLimit(mass, self.max_block_mass));
        }
        Ok(())
    }

    /// Validates the non-coinbase transactions against `view`, the UTXO state
    /// the block builds on, and checks the coinbase does not pay more than the
    /// subsidy plus the collected fees. Transactions may not spend outputs
    /// created in the same block. Returns the total fees.
    pub fn validate_block_transactions_in_context<V: UtxoView + ?Sized>(
        &self,
        block: &Block,
        view: &V,
        pov_daa_score: u64,
    ) -> Result<u64, RuleError> {
        let mut spent = HashSet::new();
        let mut total_fees: u64 = 0;
        for tx in block.transactions.iter().skip(COINBASE_TRANSACTION_INDEX + 1) {
            for input in tx.inputs.iter() {
                if !spent.insert(input.previous_outpoint) {
                    return Err(RuleError::DoubleSpendInSameBlock(input.previous_outpoint));
                }
            }
            let entries = self.transaction_validator.populate(tx, view).map_err(|err| RuleError::Tx(err, tx.id()))?;
            let populated = PopulatedTransaction::new(tx, entries);
            let fee = self
                .transaction_validator
                .validate_populated_transaction_and_get_fee(&populated, pov_daa_score)
                .map_err(|err| RuleError::Tx(err, tx.id()))?;
            total_fees = total_fees.saturating_add(fee);
        }

        let allowed = self.block_subsidy.saturating_add(total_fees);
        if let Some(coinbase) = block.transactions.get(COINBASE_TRANSACTION_INDEX) {
            let pays = coinbase.total_output_value().unwrap_or(u64::MAX);
            if pays > allowed {
                return Err(RuleError::BadCoinbaseAmount(pays, allowed));
            }
        }
        Ok(total_fees)
    }
}
