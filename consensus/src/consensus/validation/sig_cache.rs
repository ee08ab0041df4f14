//! Memo of verified Schnorr signatures
//!
//! A transaction is usually verified twice: once by the mempool and once when
//! its block arrives. Valid (signature, message, key) triples are remembered
//! so the second verification is a lookup.

use std::num::NonZeroUsize;

use consensus_core::script::{SCHNORR_PUBKEY_LEN, SCHNORR_SIGNATURE_LEN};
use consensus_core::Hash;
use lru::LruCache;
use parking_lot::Mutex;
use secp256k1::{schnorr, Message, XOnlyPublicKey, SECP256K1};

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct SigCacheKey {
    signature: [u8; SCHNORR_SIGNATURE_LEN],
    message: Hash,
    pubkey: [u8; SCHNORR_PUBKEY_LEN],
}

pub struct SigCache {
    verified: Mutex<LruCache<SigCacheKey, ()>>,
}

impl SigCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self { verified: Mutex::new(LruCache::new(capacity)) }
    }

    /// Verifies `signature` over `message` by the x-only key `pubkey`.
    /// Malformed keys or signatures simply fail verification.
    pub fn verify(&self, signature: &[u8], message: Hash, pubkey: &[u8]) -> bool {
        let (Ok(signature_bytes), Ok(pubkey_bytes)) =
            (<[u8; SCHNORR_SIGNATURE_LEN]>::try_from(signature), <[u8; SCHNORR_PUBKEY_LEN]>::try_from(pubkey))
        else {
            return false;
        };
        let key = SigCacheKey { signature: signature_bytes, message, pubkey: pubkey_bytes };
        if self.verified.lock().get(&key).is_some() {
            return true;
        }

        let (Ok(sig), Ok(pk), Ok(msg)) = (
            schnorr::Signature::from_slice(&signature_bytes),
            XOnlyPublicKey::from_slice(&pubkey_bytes),
            Message::from_slice(message.as_bytes()),
        ) else {
            return false;
        };
        let valid = SECP256K1.verify_schnorr(&sig, &msg, &pk).is_ok();
        if valid {
            self.verified.lock().put(key, ());
        }
        valid
    }

    pub fn len(&self) -> usize {
        self.verified.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secp256k1::{KeyPair, SecretKey};

    #[test]
    fn test_only_valid_signatures_are_remembered() {
        let keypair = KeyPair::from_secret_key(SECP256K1, &SecretKey::from_slice(&[3u8; 32]).unwrap());
        let (xonly, _) = keypair.x_only_public_key();
        let message = Hash::from_u64_word(42);
        let sig = SECP256K1.sign_schnorr_no_aux_rand(&Message::from_slice(message.as_bytes()).unwrap(), &keypair);
        let sig_bytes: &[u8; 64] = sig.as_ref();

        let cache = SigCache::new(2);
        assert!(!cache.verify(sig_bytes, Hash::from_u64_word(43), &xonly.serialize()));
        assert!(cache.is_empty());
        assert!(cache.verify(sig_bytes, message, &xonly.serialize()));
        assert!(cache.verify(sig_bytes, message, &xonly.serialize()));
        assert_eq!(cache.len(), 1);
        assert!(!cache.verify(&sig_bytes[..10], message, &xonly.serialize()));
    }
}
