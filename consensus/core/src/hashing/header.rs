use crate::header::Header;
use crate::Hash;
use jio_hashes::{BlockHash, HasherBase, HasherExtensions};

/// Computes the hash of a block header. Every field except the cached hash is committed.
pub fn hash(header: &Header) -> Hash {
    let mut hasher = BlockHash::new();
    hasher.write_u16(header.version).write_len(header.parents_by_level.len());
    for level in header.parents_by_level.iter() {
        hasher.write_len(level.len());
        for parent in level.iter() {
            hasher.update(parent);
        }
    }
    hasher
        .update(header.hash_merkle_root)
        .update(header.utxo_commitment)
        .write_u64(header.timestamp)
        .write_u32(header.bits)
        .write_u64(header.nonce)
        .write_u64(header.daa_score)
        .write_u64(header.blue_score)
        .update(header.blue_work.to_le_bytes())
        .update(header.pruning_point);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BlueWorkType, ZERO_HASH};

    #[test]
    fn test_header_hash_commits_to_fields() {
        let header = Header::new_finalized(1, vec![vec![ZERO_HASH]], ZERO_HASH, ZERO_HASH, 1, 0x207fffff, 0, 0, BlueWorkType::from(0u64), 0, ZERO_HASH);
        let mut other = header.clone();
        other.nonce = 1;
        assert_ne!(hash(&header), hash(&other));

        let mut other = header.clone();
        other.blue_work = BlueWorkType::from(1u64);
        assert_ne!(hash(&header), hash(&other));

        // Moving a parent to a different level changes the hash
        let mut other = header.clone();
        other.parents_by_level = vec![vec![], vec![ZERO_HASH]];
        assert_ne!(hash(&header), hash(&other));
    }
}
