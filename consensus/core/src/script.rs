//! The small set of standard scripts understood by consensus.
//!
//! Only two locking scripts are recognized: pay-to-pubkey with a Schnorr
//! x-only key and the anyone-can-spend `OP_TRUE`. Anything else is
//! non-standard and cannot be spent.

use crate::tx::{ScriptPublicKey, ScriptVec};

pub const OP_DATA_32: u8 = 0x20;
pub const OP_DATA_65: u8 = 0x41;
pub const OP_TRUE: u8 = 0x51;
pub const OP_CHECKSIG: u8 = 0xac;

pub const SCHNORR_PUBKEY_LEN: usize = 32;
pub const SCHNORR_SIGNATURE_LEN: usize = 64;

/// The only script version currently accepted
pub const MAX_SCRIPT_PUBLIC_KEY_VERSION: u16 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptClass {
    NonStandard,
    PubKey,
    OpTrue,
}

impl ScriptClass {
    pub fn from_script(spk: &ScriptPublicKey) -> Self {
        if spk.version() > MAX_SCRIPT_PUBLIC_KEY_VERSION {
            return ScriptClass::NonStandard;
        }
        let script = spk.script();
        match script.len() {
            1 if script[0] == OP_TRUE => ScriptClass::OpTrue,
            34 if script[0] == OP_DATA_32 && script[33] == OP_CHECKSIG => ScriptClass::PubKey,
            _ => ScriptClass::NonStandard,
        }
    }
}

/// `OP_DATA_32 <x-only pubkey> OP_CHECKSIG`
pub fn pay_to_pub_key(xonly_pubkey: &[u8; SCHNORR_PUBKEY_LEN]) -> ScriptPublicKey {
    let mut script = ScriptVec::new();
    script.push(OP_DATA_32);
    script.extend_from_slice(xonly_pubkey);
    script.push(OP_CHECKSIG);
    ScriptPublicKey::new(0, script)
}

pub fn op_true_script() -> ScriptPublicKey {
    ScriptPublicKey::from_vec(0, vec![OP_TRUE])
}

/// Returns the x-only public key locked by a pay-to-pubkey script
pub fn extract_schnorr_pubkey(spk: &ScriptPublicKey) -> Option<&[u8]> {
    match ScriptClass::from_script(spk) {
        ScriptClass::PubKey => Some(&spk.script()[1..1 + SCHNORR_PUBKEY_LEN]),
        _ => None,
    }
}

/// `OP_DATA_65 <64-byte signature || sighash type>`
pub fn signature_script(signature: &[u8; SCHNORR_SIGNATURE_LEN], sighash_type: u8) -> Vec<u8> {
    let mut script = Vec::with_capacity(SCHNORR_SIGNATURE_LEN + 2);
    script.push(OP_DATA_65);
    script.extend_from_slice(signature);
    script.push(sighash_type);
    script
}

/// Splits a signature script into its signature and sighash type
pub fn parse_signature_script(script: &[u8]) -> Option<(&[u8], u8)> {
    if script.len() != SCHNORR_SIGNATURE_LEN + 2 || script[0] != OP_DATA_65 {
        return None;
    }
    Some((&script[1..1 + SCHNORR_SIGNATURE_LEN], script[SCHNORR_SIGNATURE_LEN + 1]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_classes() {
        let key = [7u8; 32];
        let p2pk = pay_to_pub_key(&key);
        assert_eq!(ScriptClass::from_script(&p2pk), ScriptClass::PubKey);
        assert_eq!(extract_schnorr_pubkey(&p2pk), Some(&key[..]));

        assert_eq!(ScriptClass::from_script(&op_true_script()), ScriptClass::OpTrue);
        assert_eq!(extract_schnorr_pubkey(&op_true_script()), None);

        let odd = ScriptPublicKey::from_vec(0, vec![0x6a, 0x01]);
        assert_eq!(ScriptClass::from_script(&odd), ScriptClass::NonStandard);
        let future_version = ScriptPublicKey::from_vec(1, vec![OP_TRUE]);
        assert_eq!(ScriptClass::from_script(&future_version), ScriptClass::NonStandard);
    }

    #[test]
    fn test_signature_script_layout() {
        let sig = [3u8; 64];
        let script = signature_script(&sig, 0x01);
        assert_eq!(script.len(), 66);
        let (parsed, sighash_type) = parse_signature_script(&script).unwrap();
        assert_eq!(parsed, &sig[..]);
        assert_eq!(sighash_type, 0x01);
        assert!(parse_signature_script(&script[..65]).is_none());
    }
}
