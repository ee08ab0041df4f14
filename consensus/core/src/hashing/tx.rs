use crate::tx::{Transaction, TransactionOutpoint, TransactionOutput};
use crate::Hash;
use jio_hashes::{HasherBase, HasherExtensions, TransactionHash, TransactionID};

/// Transaction id: commits to everything but the signature scripts
pub fn id(tx: &Transaction) -> Hash {
    let mut hasher = TransactionID::new();
    write_transaction(&mut hasher, tx, false);
    hasher.finalize()
}

/// Transaction hash: commits to the full transaction
pub fn hash(tx: &Transaction) -> Hash {
    let mut hasher = TransactionHash::new();
    write_transaction(&mut hasher, tx, true);
    hasher.finalize()
}

fn write_transaction<T: HasherBase>(hasher: &mut T, tx: &Transaction, include_signatures: bool) {
    hasher.write_u16(tx.version).write_len(tx.inputs.len());
    for input in tx.inputs.iter() {
        write_outpoint(hasher, &input.previous_outpoint);
        if include_signatures {
            hasher.write_var_bytes(&input.signature_script);
        } else {
            hasher.write_var_bytes(&[]);
        }
        hasher.write_u64(input.sequence).write_u8(input.sig_op_count);
    }

    hasher.write_len(tx.outputs.len());
    for output in tx.outputs.iter() {
        write_output(hasher, output);
    }

    hasher.write_u64(tx.lock_time).update(tx.subnetwork_id).write_var_bytes(&tx.payload);
}

pub(crate) fn write_outpoint<T: HasherBase>(hasher: &mut T, outpoint: &TransactionOutpoint) {
    hasher.update(outpoint.transaction_id).write_u32(outpoint.index);
}

pub(crate) fn write_output<T: HasherBase>(hasher: &mut T, output: &TransactionOutput) {
    hasher
        .write_u64(output.value)
        .write_u16(output.script_public_key.version())
        .write_var_bytes(output.script_public_key.script());
}
