//! Signature hashes for Schnorr input signatures.
//!
//! Only `SIG_HASH_ALL` is supported: the signed message covers every input
//! outpoint, every output, the spent entry of the signed input, and the
//! sighash type itself.

use crate::tx::PopulatedTransaction;
use crate::Hash;
use jio_hashes::{HasherBase, HasherExtensions, TransactionSigningHash};

use super::tx::{write_outpoint, write_output};

pub fn calc_schnorr_signature_hash(tx: &PopulatedTransaction, input_index: usize, sighash_type: u8) -> Hash {
    let mut hasher = TransactionSigningHash::new();
    hasher.write_u16(tx.tx.version).write_len(tx.tx.inputs.len());
    for input in tx.tx.inputs.iter() {
        write_outpoint(&mut hasher, &input.previous_outpoint);
        hasher.write_u64(input.sequence).write_u8(input.sig_op_count);
    }
    hasher.write_len(tx.tx.outputs.len());
    for output in tx.tx.outputs.iter() {
        write_output(&mut hasher, output);
    }
    hasher.write_u64(tx.tx.lock_time).update(tx.tx.subnetwork_id).write_var_bytes(&tx.tx.payload);

    let input = &tx.tx.inputs[input_index];
    let entry = &tx.entries[input_index];
    write_outpoint(&mut hasher, &input.previous_outpoint);
    hasher
        .write_u64(entry.amount)
        .write_u16(entry.script_public_key.version())
        .write_var_bytes(entry.script_public_key.script())
        .write_u64(entry.block_daa_score)
        .write_bool(entry.is_coinbase)
        .write_u8(sighash_type);
    hasher.finalize()
}
