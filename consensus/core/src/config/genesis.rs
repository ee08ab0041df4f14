use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::constants::{BLOCK_VERSION, TX_VERSION};
use crate::difficulty::calc_work;
use crate::header::Header;
use crate::merkle::calc_hash_merkle_root;
use crate::subnets::SUBNETWORK_ID_COINBASE;
use crate::tx::Transaction;
use crate::utxo::UtxoCommitment;
use crate::{Hash, ZERO_HASH};

/// The values uniquely defining a network's genesis block.
///
/// The genesis coinbase has no outputs, so the genesis UTXO set is empty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisBlock {
    pub version: u16,
    pub timestamp: u64,
    pub bits: u32,
    pub nonce: u64,
    pub coinbase_payload: Vec<u8>,
}

impl GenesisBlock {
    pub fn mainnet() -> Self {
        Self { version: BLOCK_VERSION, timestamp: 1_762_971_421_786, bits: 0x1f00_ffff, nonce: 38922, coinbase_payload: b"jio mainnet genesis".to_vec() }
    }

    pub fn testnet() -> Self {
        Self { coinbase_payload: b"jio testnet genesis".to_vec(), ..Self::mainnet() }
    }

    pub fn simnet() -> Self {
        Self { timestamp: 1_700_000_000_000, bits: 0x207f_ffff, nonce: 0, coinbase_payload: b"jio simnet genesis".to_vec(), ..Self::mainnet() }
    }

    pub fn devnet() -> Self {
        Self { coinbase_payload: b"jio devnet genesis".to_vec(), ..Self::simnet() }
    }

    pub fn build_genesis_transactions(&self) -> Vec<Transaction> {
        vec![Transaction::new(TX_VERSION, Vec::new(), Vec::new(), 0, SUBNETWORK_ID_COINBASE, self.coinbase_payload.clone())]
    }

    pub fn build_header(&self) -> Header {
        let transactions = self.build_genesis_transactions();
        Header::new_finalized(
            self.version,
            Vec::new(),
            calc_hash_merkle_root(transactions.iter()),
            UtxoCommitment::empty().to_hash(),
            self.timestamp,
            self.bits,
            self.nonce,
            0,
            calc_work(self.bits),
            0,
            ZERO_HASH,
        )
    }

    pub fn build_block(&self) -> Block {
        Block::new(self.build_header(), self.build_genesis_transactions())
    }

    pub fn hash(&self) -> Hash {
        self.build_header().hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_is_deterministic_and_distinct() {
        assert_eq!(GenesisBlock::simnet().hash(), GenesisBlock::simnet().hash());
        assert_ne!(GenesisBlock::simnet().hash(), GenesisBlock::devnet().hash());
        let block = GenesisBlock::mainnet().build_block();
        assert!(block.is_genesis());
        assert_eq!(block.transactions.len(), 1);
        assert!(block.transactions[0].is_coinbase());
        assert_eq!(block.header.blue_score, 0);
    }
}
