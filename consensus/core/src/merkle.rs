use jio_hashes::{HasherBase, MerkleBranchHash};

use crate::tx::Transaction;
use crate::{Hash, ZERO_HASH};

/// Merkle tree over transaction hashes. Odd levels are padded with the zero hash.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    /// Nodes at each level of the tree (leaves at level 0)
    levels: Vec<Vec<Hash>>,
}

impl MerkleTree {
    pub fn from_hashes(hashes: Vec<Hash>) -> Self {
        let mut levels = vec![hashes];
        loop {
            let current = &levels[levels.len() - 1];
            if current.len() <= 1 {
                break;
            }
            let next = current
                .chunks(2)
                .map(|pair| Self::hash_pair(&pair[0], pair.get(1).unwrap_or(&ZERO_HASH)))
                .collect();
            levels.push(next);
        }
        Self { levels }
    }

    /// Returns the Merkle root hash (the zero hash for an empty tree)
    pub fn root(&self) -> Hash {
        self.levels.last().and_then(|level| level.first()).copied().unwrap_or(ZERO_HASH)
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    fn hash_pair(left: &Hash, right: &Hash) -> Hash {
        let mut hasher = MerkleBranchHash::new();
        hasher.update(left).update(right);
        hasher.finalize()
    }
}

/// Root committing to the full hashes (signatures included) of the block's transactions
pub fn calc_hash_merkle_root<'a>(txs: impl ExactSizeIterator<Item = &'a Transaction>) -> Hash {
    MerkleTree::from_hashes(txs.map(|tx| tx.hash()).collect()).root()
}
