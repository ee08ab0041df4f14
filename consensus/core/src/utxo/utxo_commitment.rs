//! Incremental, order-independent commitment to a UTXO set.
//!
//! Each (outpoint, entry) element is hashed with its own domain and the
//! commitment is the sum of all element hashes modulo 2^256. Adding or
//! removing an element is a single wrapping addition or subtraction, so a
//! block's commitment follows from its selected parent's commitment and its
//! UTXO diff.

use jio_hashes::{HasherBase, HasherExtensions, UtxoCommitmentElement};
use primitive_types::U256;

use crate::tx::{TransactionOutpoint, UtxoEntry};
use crate::utxo::{UtxoCollection, UtxoDiff};
use crate::Hash;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UtxoCommitment(U256);

impl UtxoCommitment {
    /// Commitment of the empty set
    pub fn empty() -> Self {
        Self(U256::zero())
    }

    pub fn from_hash(hash: Hash) -> Self {
        Self(U256::from_little_endian(hash.as_bytes()))
    }

    pub fn from_collection(collection: &UtxoCollection) -> Self {
        let mut commitment = Self::empty();
        for (outpoint, entry) in collection.iter() {
            commitment.add_element(outpoint, entry);
        }
        commitment
    }

    pub fn to_hash(&self) -> Hash {
        let mut bytes = [0u8; 32];
        self.0.to_little_endian(&mut bytes);
        Hash::from_bytes(bytes)
    }

    pub fn add_element(&mut self, outpoint: &TransactionOutpoint, entry: &UtxoEntry) {
        self.0 = self.0.overflowing_add(element_hash(outpoint, entry)).0;
    }

    pub fn remove_element(&mut self, outpoint: &TransactionOutpoint, entry: &UtxoEntry) {
        self.0 = self.0.overflowing_sub(element_hash(outpoint, entry)).0;
    }

    pub fn apply_diff(&mut self, diff: &UtxoDiff) {
        for (outpoint, entry) in diff.remove.iter() {
            self.remove_element(outpoint, entry);
        }
        for (outpoint, entry) in diff.add.iter() {
            self.add_element(outpoint, entry);
        }
    }
}

fn element_hash(outpoint: &TransactionOutpoint, entry: &UtxoEntry) -> U256 {
    let mut hasher = UtxoCommitmentElement::new();
    hasher
        .update(outpoint.transaction_id)
        .write_u32(outpoint.index)
        .write_u64(entry.amount)
        .write_u16(entry.script_public_key.version())
        .write_var_bytes(entry.script_public_key.script())
        .write_u64(entry.block_daa_score)
        .write_bool(entry.is_coinbase);
    U256::from_little_endian(hasher.finalize().as_bytes())
}
