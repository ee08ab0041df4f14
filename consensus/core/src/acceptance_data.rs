use serde::{Deserialize, Serialize};

use crate::tx::TransactionId;
use crate::Hash;

/// A merged transaction that made it into the UTXO state of the merging chain block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedTxEntry {
    pub transaction_id: TransactionId,
    pub index_within_block: u32,
}

/// Acceptance result of one merge set block, as seen from the chain block that merged it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergesetBlockAcceptanceData {
    pub block_hash: Hash,
    pub accepted_transactions: Vec<AcceptedTxEntry>,
}

/// Per merge set block acceptance, in consensus merge order
pub type AcceptanceData = Vec<MergesetBlockAcceptanceData>;
