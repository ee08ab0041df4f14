//!
//! # Transaction
//!
//! This module implements consensus [`Transaction`] structure and related types.
//!

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt::{self, Display};

use crate::hashing;
use crate::subnets::SubnetworkId;
use crate::Hash;

/// COINBASE_TRANSACTION_INDEX is the index of the coinbase transaction in every block
pub const COINBASE_TRANSACTION_INDEX: usize = 0;

/// A 32-byte transaction identifier.
pub type TransactionId = Hash;

pub type TransactionIndexType = u32;

/// Size of the inline buffer of a script vector. Standard scripts fit without allocating.
pub const SCRIPT_VECTOR_SIZE: usize = 36;

pub type ScriptVec = SmallVec<[u8; SCRIPT_VECTOR_SIZE]>;
pub type ScriptPublicKeyVersion = u16;

/// Locking script of an output together with its script engine version
#[derive(Default, PartialEq, Eq, Clone, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScriptPublicKey {
    version: ScriptPublicKeyVersion,
    script: ScriptVec,
}

impl ScriptPublicKey {
    pub fn new(version: ScriptPublicKeyVersion, script: ScriptVec) -> Self {
        Self { version, script }
    }

    pub fn from_vec(version: ScriptPublicKeyVersion, script: Vec<u8>) -> Self {
        Self { version, script: ScriptVec::from_vec(script) }
    }

    pub fn version(&self) -> ScriptPublicKeyVersion {
        self.version
    }

    pub fn script(&self) -> &[u8] {
        &self.script
    }
}

impl fmt::Debug for ScriptPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScriptPublicKey(v{}, {})", self.version, hex::encode(&self.script))
    }
}

/// Holds details about an individual transaction output in a utxo
/// set such as whether or not it was contained in a coinbase tx, the daa
/// score of the block that accepts the tx, its public key script, and how
/// much it pays.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UtxoEntry {
    pub amount: u64,
    pub script_public_key: ScriptPublicKey,
    pub block_daa_score: u64,
    pub is_coinbase: bool,
}

impl UtxoEntry {
    pub fn new(amount: u64, script_public_key: ScriptPublicKey, block_daa_score: u64, is_coinbase: bool) -> Self {
        Self { amount, script_public_key, block_daa_score, is_coinbase }
    }
}

/// Represents a transaction outpoint
#[derive(Eq, Default, Hash, PartialEq, Debug, Copy, Clone, Serialize, Deserialize, PartialOrd, Ord)]
pub struct TransactionOutpoint {
    pub transaction_id: TransactionId,
    pub index: TransactionIndexType,
}

impl TransactionOutpoint {
    pub fn new(transaction_id: TransactionId, index: u32) -> Self {
        Self { transaction_id, index }
    }
}

impl Display for TransactionOutpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.transaction_id, self.index)
    }
}

/// Represents a transaction input
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TransactionInput {
    pub previous_outpoint: TransactionOutpoint,
    pub signature_script: Vec<u8>,
    pub sequence: u64,
    pub sig_op_count: u8,
}

impl TransactionInput {
    pub fn new(previous_outpoint: TransactionOutpoint, signature_script: Vec<u8>, sequence: u64, sig_op_count: u8) -> Self {
        Self { previous_outpoint, signature_script, sequence, sig_op_count }
    }
}

/// Represents a transaction output
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TransactionOutput {
    pub value: u64,
    pub script_public_key: ScriptPublicKey,
}

impl TransactionOutput {
    pub fn new(value: u64, script_public_key: ScriptPublicKey) -> Self {
        Self { value, script_public_key }
    }
}

/// Represents a transaction.
///
/// The id is computed on construction (and by [`Transaction::finalize`]) and
/// excludes signature scripts, so signing does not change it. It is not part
/// of the encoding and is recomputed when a transaction is decoded.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(from = "TransactionFields")]
pub struct Transaction {
    pub version: u16,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub lock_time: u64,
    pub subnetwork_id: SubnetworkId,
    pub payload: Vec<u8>,

    #[serde(skip)]
    id: TransactionId,
}

/// Decoded form of [`Transaction`], before its id is computed
#[derive(Deserialize)]
struct TransactionFields {
    version: u16,
    inputs: Vec<TransactionInput>,
    outputs: Vec<TransactionOutput>,
    lock_time: u64,
    subnetwork_id: SubnetworkId,
    payload: Vec<u8>,
}

impl From<TransactionFields> for Transaction {
    fn from(fields: TransactionFields) -> Self {
        Self::new(fields.version, fields.inputs, fields.outputs, fields.lock_time, fields.subnetwork_id, fields.payload)
    }
}

impl Transaction {
    pub fn new(
        version: u16,
        inputs: Vec<TransactionInput>,
        outputs: Vec<TransactionOutput>,
        lock_time: u64,
        subnetwork_id: SubnetworkId,
        payload: Vec<u8>,
    ) -> Self {
        let mut tx = Self { version, inputs, outputs, lock_time, subnetwork_id, payload, id: Default::default() };
        tx.finalize();
        tx
    }

    /// Recomputes and caches the transaction id. Call after mutating any field.
    pub fn finalize(&mut self) {
        self.id = hashing::tx::id(self);
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Full hash including signature scripts; this is what the merkle root commits to
    pub fn hash(&self) -> Hash {
        hashing::tx::hash(self)
    }

    pub fn is_coinbase(&self) -> bool {
        self.subnetwork_id.is_coinbase()
    }

    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs.iter().try_fold(0u64, |acc, output| acc.checked_add(output.value))
    }
}

/// A transaction along with the UTXO entries it spends, in input order
#[derive(Debug, Clone)]
pub struct PopulatedTransaction<'a> {
    pub tx: &'a Transaction,
    pub entries: Vec<UtxoEntry>,
}

impl<'a> PopulatedTransaction<'a> {
    pub fn new(tx: &'a Transaction, entries: Vec<UtxoEntry>) -> Self {
        debug_assert_eq!(tx.inputs.len(), entries.len());
        Self { tx, entries }
    }

    pub fn populated_inputs(&self) -> impl ExactSizeIterator<Item = (&TransactionInput, &UtxoEntry)> {
        self.tx.inputs.iter().zip(self.entries.iter())
    }

    pub fn total_input_value(&self) -> Option<u64> {
        self.entries.iter().try_fold(0u64, |acc, entry| acc.checked_add(entry.amount))
    }

    /// Returns `None` on overflow or when outputs exceed inputs
    pub fn fee(&self) -> Option<u64> {
        self.total_input_value()?.checked_sub(self.tx.total_output_value()?)
    }
}
