//! Transaction validation for consensus
//!
//! This module validates transactions including:
//! - Structure (inputs, outputs, payload) in isolation
//! - Input population against a UTXO view
//! - Coinbase maturity, fee and Schnorr signature checks of populated transactions

use std::collections::HashSet;
use std::sync::Arc;

use consensus_core::config::Params;
use consensus_core::constants::{MAX_SOMPI, MAX_TX_IN_OUT, MAX_TX_PAYLOAD_LEN, SIG_HASH_ALL};
use consensus_core::errors::{TxResult, TxRuleError};
use consensus_core::hashing::sighash::calc_schnorr_signature_hash;
use consensus_core::script::{extract_schnorr_pubkey, parse_signature_script, ScriptClass};
use consensus_core::tx::{PopulatedTransaction, Transaction, UtxoEntry};
use consensus_core::utxo::UtxoView;
use rayon::prelude::*;

use super::sig_cache::SigCache;

/// Transaction validator for consensus rules
pub struct TransactionValidator {
    max_tx_inputs: usize,
    max_tx_outputs: usize,
    max_payload_len: usize,
    coinbase_maturity: u64,
    sig_cache: Arc<SigCache>,
}

impl TransactionValidator {
    pub fn new(params: &Params, sig_cache: Arc<SigCache>) -> Self {
        Self {
            max_tx_inputs: MAX_TX_IN_OUT,
            max_tx_outputs: MAX_TX_IN_OUT,
            max_payload_len: MAX_TX_PAYLOAD_LEN,
            coinbase_maturity: params.coinbase_maturity,
            sig_cache,
        }
    }

    /// Context-free checks. Coinbase payload limits are a block rule and checked there.
    pub fn validate_tx_in_isolation(&self, tx: &Transaction) -> TxResult<()> {
        if tx.is_coinbase() {
            if !tx.inputs.is_empty() {
                return Err(TxRuleError::CoinbaseHasInputs(tx.inputs.len()));
            }
        } else {
            if tx.inputs.is_empty() {
                return Err(TxRuleError::NoTxInputs);
            }
            if tx.payload.len() > self.max_payload_len {
                return Err(TxRuleError::PayloadTooLong(tx.payload.len(), self.max_payload_len));
            }
        }
        if tx.inputs.len() > self.max_tx_inputs {
            return Err(TxRuleError::TooManyInputs(tx.inputs.len()));
        }
        if tx.outputs.len() > self.max_tx_outputs {
            return Err(TxRuleError::TooManyOutputs(tx.outputs.len()));
        }

        let mut seen = HashSet::with_capacity(tx.inputs.len());
        for input in tx.inputs.iter() {
            if !seen.insert(input.previous_outpoint) {
                return Err(TxRuleError::DuplicateInputs(input.previous_outpoint));
            }
        }

        match tx.total_output_value() {
            Some(total) if total <= MAX_SOMPI => Ok(()),
            _ => Err(TxRuleError::OutputValueOverflow),
        }
    }

    /// The entries spent by `tx`, in input order
    pub fn populate<V: UtxoView + ?Sized>(&self, tx: &Transaction, view: &V) -> TxResult<Vec<UtxoEntry>> {
        tx.inputs
            .iter()
            .map(|input| view.get(&input.previous_outpoint).ok_or(TxRuleError::MissingTxOutpoint(input.previous_outpoint)))
            .collect()
    }

    /// Checks a populated transaction as seen from DAA score `pov_daa_score` and returns its fee
    pub fn validate_populated_transaction_and_get_fee(&self, tx: &PopulatedTransaction, pov_daa_score: u64) -> TxResult<u64> {
        self.check_coinbase_maturity(tx, pov_daa_score)?;
        let fee = self.check_fee(tx)?;
        self.check_scripts(tx)?;
        Ok(fee)
    }

    fn check_coinbase_maturity(&self, tx: &PopulatedTransaction, pov_daa_score: u64) -> TxResult<()> {
        for (input, entry) in tx.populated_inputs() {
            if entry.is_coinbase && entry.block_daa_score + self.coinbase_maturity > pov_daa_score {
                return Err(TxRuleError::ImmatureCoinbaseSpend(
                    input.previous_outpoint,
                    entry.block_daa_score,
                    pov_daa_score,
                    self.coinbase_maturity,
                ));
            }
        }
        Ok(())
    }

    fn check_fee(&self, tx: &PopulatedTransaction) -> TxResult<u64> {
        let total_in = tx.total_input_value().ok_or(TxRuleError::OutputValueOverflow)?;
        let total_out = tx.tx.total_output_value().ok_or(TxRuleError::OutputValueOverflow)?;
        if total_in < total_out {
            return Err(TxRuleError::SpendTooHigh(total_in, total_out));
        }
        Ok(total_in - total_out)
    }

    /// Verifies every input script in parallel. The first failing input (by index) is reported.
    fn check_scripts(&self, tx: &PopulatedTransaction) -> TxResult<()> {
        let mut failures: Vec<TxRuleError> =
            (0..tx.tx.inputs.len()).into_par_iter().filter_map(|index| self.check_input_script(tx, index).err()).collect();
        failures.sort_by_key(|err| match err {
            TxRuleError::NonStandardScript(i) | TxRuleError::MalformedSignatureScript(i) | TxRuleError::InvalidSignature(i) => *i,
            _ => usize::MAX,
        });
        match failures.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn check_input_script(&self, tx: &PopulatedTransaction, index: usize) -> TxResult<()> {
        let entry = &tx.entries[index];
        match ScriptClass::from_script(&entry.script_public_key) {
            ScriptClass::OpTrue => Ok(()),
            ScriptClass::NonStandard => Err(TxRuleError::NonStandardScript(index)),
            ScriptClass::PubKey => {
                let pubkey = extract_schnorr_pubkey(&entry.script_public_key).ok_or(TxRuleError::NonStandardScript(index))?;
                let (signature, sighash_type) = parse_signature_script(&tx.tx.inputs[index].signature_script)
                    .ok_or(TxRuleError::MalformedSignatureScript(index))?;
                if sighash_type != SIG_HASH_ALL {
                    return Err(TxRuleError::MalformedSignatureScript(index));
                }
                let message = calc_schnorr_signature_hash(tx, index, sighash_type);
                if self.sig_cache.verify(signature, message, pubkey) {
                    Ok(())
                } else {
                    Err(TxRuleError::InvalidSignature(index))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consensus_core::script::op_true_script;
    use consensus_core::sign::{script_for_secret_key, sign_transaction};
    use consensus_core::subnets::{SUBNETWORK_ID_COINBASE, SUBNETWORK_ID_NATIVE};
    use consensus_core::tx::{TransactionInput, TransactionOutpoint, TransactionOutput};
    use consensus_core::utxo::UtxoCollection;
    use consensus_core::Hash;
    use secp256k1::SecretKey;

    fn validator() -> TransactionValidator {
        TransactionValidator::new(&Params::simnet(), Arc::new(SigCache::new(100)))
    }

    fn spend(outpoints: &[TransactionOutpoint], value: u64) -> Transaction {
        Transaction::new(
            0,
            outpoints.iter().map(|op| TransactionInput::new(*op, vec![], 0, 1)).collect(),
            vec![TransactionOutput::new(value, op_true_script())],
            0,
            SUBNETWORK_ID_NATIVE,
            vec![],
        )
    }

    #[test]
    fn test_isolation_rules() {
        let v = validator();
        let op = TransactionOutpoint::new(Hash::from_u64_word(1), 0);
        assert_eq!(v.validate_tx_in_isolation(&spend(&[], 1)), Err(TxRuleError::NoTxInputs));
        assert_eq!(v.validate_tx_in_isolation(&spend(&[op, op], 1)), Err(TxRuleError::DuplicateInputs(op)));
        assert_eq!(v.validate_tx_in_isolation(&spend(&[op], MAX_SOMPI + 1)), Err(TxRuleError::OutputValueOverflow));
        assert_eq!(v.validate_tx_in_isolation(&spend(&[op], 10)), Ok(()));

        let coinbase = Transaction::new(0, vec![TransactionInput::new(op, vec![], 0, 0)], vec![], 0, SUBNETWORK_ID_COINBASE, vec![]);
        assert_eq!(v.validate_tx_in_isolation(&coinbase), Err(TxRuleError::CoinbaseHasInputs(1)));
    }

    #[test]
    fn test_populated_rules() {
        let v = validator();
        let maturity = Params::simnet().coinbase_maturity;
        let coinbase_op = TransactionOutpoint::new(Hash::from_u64_word(1), 0);
        let plain_op = TransactionOutpoint::new(Hash::from_u64_word(2), 0);
        let mut utxos = UtxoCollection::new();
        utxos.insert(coinbase_op, UtxoEntry::new(100, op_true_script(), 10, true));
        utxos.insert(plain_op, UtxoEntry::new(50, op_true_script(), 10, false));

        let missing = spend(&[TransactionOutpoint::new(Hash::from_u64_word(3), 0)], 1);
        assert!(matches!(v.populate(&missing, &utxos), Err(TxRuleError::MissingTxOutpoint(_))));

        let tx = spend(&[coinbase_op], 90);
        let entries = v.populate(&tx, &utxos).unwrap();
        let populated = PopulatedTransaction::new(&tx, entries);
        assert!(matches!(
            v.validate_populated_transaction_and_get_fee(&populated, 10 + maturity - 1),
            Err(TxRuleError::ImmatureCoinbaseSpend(..))
        ));
        assert_eq!(v.validate_populated_transaction_and_get_fee(&populated, 10 + maturity), Ok(10));

        let tx = spend(&[plain_op], 51);
        let populated = PopulatedTransaction::new(&tx, v.populate(&tx, &utxos).unwrap());
        assert_eq!(v.validate_populated_transaction_and_get_fee(&populated, 11), Err(TxRuleError::SpendTooHigh(50, 51)));
    }

    #[test]
    fn test_signatures() {
        let v = validator();
        let secret_key = SecretKey::from_slice(&[5u8; 32]).unwrap();
        let spk = script_for_secret_key(&secret_key);
        let op = TransactionOutpoint::new(Hash::from_u64_word(9), 1);
        let entry = UtxoEntry::new(1_000, spk.clone(), 0, false);

        let mut tx = spend(&[op], 900);
        let unsigned = PopulatedTransaction::new(&tx, vec![entry.clone()]);
        assert_eq!(v.validate_populated_transaction_and_get_fee(&unsigned, 1), Err(TxRuleError::MalformedSignatureScript(0)));

        sign_transaction(&mut tx, vec![entry.clone()], &secret_key).unwrap();
        let signed = PopulatedTransaction::new(&tx, vec![entry.clone()]);
        assert_eq!(v.validate_populated_transaction_and_get_fee(&signed, 1), Ok(100));

        // Tampering with an output invalidates the signature
        let mut tampered = tx.clone();
        tampered.outputs[0].value = 950;
        tampered.finalize();
        let tampered = PopulatedTransaction::new(&tampered, vec![entry]);
        assert_eq!(v.validate_populated_transaction_and_get_fee(&tampered, 1), Err(TxRuleError::InvalidSignature(0)));
    }
}
