use serde::{Deserialize, Serialize};

use crate::{hashing, BlueWorkType, Hash};

/// Block header.
///
/// `hash` caches the header hash. It is set by [`Header::new_finalized`] and
/// [`Header::finalize`]; validators recompute it before trusting it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub hash: Hash,
    pub version: u16,
    /// Level 0 holds the direct parents
    pub parents_by_level: Vec<Vec<Hash>>,
    pub hash_merkle_root: Hash,
    /// Commitment to the UTXO state of this block after merging its merge set
    pub utxo_commitment: Hash,
    /// Milliseconds since the unix epoch
    pub timestamp: u64,
    pub bits: u32,
    pub nonce: u64,
    pub daa_score: u64,
    pub blue_work: BlueWorkType,
    pub blue_score: u64,
    pub pruning_point: Hash,
}

impl Header {
    #[allow(clippy::too_many_arguments)]
    pub fn new_finalized(
        version: u16,
        parents_by_level: Vec<Vec<Hash>>,
        hash_merkle_root: Hash,
        utxo_commitment: Hash,
        timestamp: u64,
        bits: u32,
        nonce: u64,
        daa_score: u64,
        blue_work: BlueWorkType,
        blue_score: u64,
        pruning_point: Hash,
    ) -> Self {
        let mut header = Self {
            hash: Default::default(),
            version,
            parents_by_level,
            hash_merkle_root,
            utxo_commitment,
            timestamp,
            bits,
            nonce,
            daa_score,
            blue_work,
            blue_score,
            pruning_point,
        };
        header.finalize();
        header
    }

    /// Recomputes and caches the header hash
    pub fn finalize(&mut self) {
        self.hash = hashing::header::hash(self);
    }

    /// True when the cached hash matches the header content
    pub fn is_hash_consistent(&self) -> bool {
        self.hash == hashing::header::hash(self)
    }

    pub fn direct_parents(&self) -> &[Hash] {
        self.parents_by_level.first().map(|parents| parents.as_slice()).unwrap_or(&[])
    }

    /// Creates a header with a fixed hash and the given direct parents. Used by tests
    /// that exercise DAG algorithms independently of hashing.
    pub fn from_precomputed_hash(hash: Hash, parents: Vec<Hash>) -> Header {
        Header {
            version: crate::constants::BLOCK_VERSION,
            hash,
            parents_by_level: vec![parents],
            hash_merkle_root: Default::default(),
            utxo_commitment: Default::default(),
            timestamp: 0,
            bits: 0,
            nonce: 0,
            daa_score: 0,
            blue_work: Default::default(),
            blue_score: 0,
            pruning_point: Default::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ZERO_HASH;

    #[test]
    fn test_finalize_tracks_content() {
        let mut header =
            Header::new_finalized(1, vec![vec![ZERO_HASH]], ZERO_HASH, ZERO_HASH, 10, 0x207fffff, 0, 1, BlueWorkType::from(2u64), 1, ZERO_HASH);
        assert!(header.is_hash_consistent());
        header.timestamp += 1;
        assert!(!header.is_hash_consistent());
        header.finalize();
        assert!(header.is_hash_consistent());
        assert_eq!(header.direct_parents(), &[ZERO_HASH]);
    }

    #[test]
    fn test_serde_roundtrip() {
        let header = Header::from_precomputed_hash(Hash::from_u64_word(3), vec![Hash::from_u64_word(1)]);
        let bytes = bincode::serialize(&header).unwrap();
        let decoded: Header = bincode::deserialize(&bytes).unwrap();
        assert_eq!(header, decoded);
    }
}
