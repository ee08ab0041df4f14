use secp256k1::{KeyPair, Message, SecretKey, SECP256K1};

use crate::{
    constants::SIG_HASH_ALL,
    hashing::sighash::calc_schnorr_signature_hash,
    script::{pay_to_pub_key, signature_script},
    tx::{PopulatedTransaction, ScriptPublicKey, Transaction, UtxoEntry},
};

/// Locking script paying to the x-only public key of `secret_key`
pub fn script_for_secret_key(secret_key: &SecretKey) -> ScriptPublicKey {
    let keypair = KeyPair::from_secret_key(SECP256K1, secret_key);
    let (xonly, _) = keypair.x_only_public_key();
    pay_to_pub_key(&xonly.serialize())
}

/// Signs every input of `tx` with `secret_key`. `entries` are the UTXO
/// entries spent by the inputs, in input order. Inputs are expected to
/// declare a single sig op.
pub fn sign_transaction(tx: &mut Transaction, entries: Vec<UtxoEntry>, secret_key: &SecretKey) -> Result<(), secp256k1::Error> {
    let keypair = KeyPair::from_secret_key(SECP256K1, secret_key);
    let scripts = {
        let populated = PopulatedTransaction::new(tx, entries);
        (0..populated.tx.inputs.len())
            .map(|i| {
                let sig_hash = calc_schnorr_signature_hash(&populated, i, SIG_HASH_ALL);
                let msg = Message::from_slice(sig_hash.as_bytes())?;
                let sig = SECP256K1.sign_schnorr_no_aux_rand(&msg, &keypair);
                let sig_bytes: &[u8; 64] = sig.as_ref();
                Ok(signature_script(sig_bytes, SIG_HASH_ALL))
            })
            .collect::<Result<Vec<_>, secp256k1::Error>>()?
    };
    for (input, script) in tx.inputs.iter_mut().zip(scripts) {
        input.signature_script = script;
    }
    tx.finalize();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        script::{extract_schnorr_pubkey, parse_signature_script},
        subnets::SUBNETWORK_ID_NATIVE,
        tx::{TransactionInput, TransactionOutpoint, TransactionOutput},
        Hash,
    };
    use secp256k1::{schnorr, XOnlyPublicKey};

    #[test]
    fn test_signed_inputs_verify() {
        let secret_key = SecretKey::from_slice(&[9u8; 32]).unwrap();
        let spk = script_for_secret_key(&secret_key);
        let entries = vec![UtxoEntry::new(100, spk.clone(), 0, false), UtxoEntry::new(50, spk.clone(), 0, false)];
        let mut tx = Transaction::new(
            0,
            vec![
                TransactionInput::new(TransactionOutpoint::new(Hash::from_u64_word(1), 0), vec![], 0, 1),
                TransactionInput::new(TransactionOutpoint::new(Hash::from_u64_word(2), 3), vec![], 0, 1),
            ],
            vec![TransactionOutput::new(140, spk.clone())],
            0,
            SUBNETWORK_ID_NATIVE,
            vec![],
        );
        let id_before = tx.id();
        sign_transaction(&mut tx, entries.clone(), &secret_key).unwrap();
        assert_eq!(tx.id(), id_before);

        let pubkey = XOnlyPublicKey::from_slice(extract_schnorr_pubkey(&spk).unwrap()).unwrap();
        let populated = PopulatedTransaction::new(&tx, entries);
        for (i, input) in tx.inputs.iter().enumerate() {
            let (sig, sighash_type) = parse_signature_script(&input.signature_script).unwrap();
            let msg = Message::from_slice(calc_schnorr_signature_hash(&populated, i, sighash_type).as_bytes()).unwrap();
            let sig = schnorr::Signature::from_slice(sig).unwrap();
            assert!(SECP256K1.verify_schnorr(&sig, &msg, &pubkey).is_ok());
        }
    }
}
