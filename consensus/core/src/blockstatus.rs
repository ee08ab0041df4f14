use serde::{Deserialize, Serialize};

/// Processing status of a known block
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockStatus {
    /// Failed validation; children are rejected
    StatusInvalid,
    /// Only the header is held (pruned bodies and proof headers)
    StatusHeaderOnly,
    /// Fully validated including its UTXO state
    StatusUtxoValid,
    /// Valid, but not in the future of the finality point while claiming more work than the virtual chain
    StatusViolatingFinality,
    /// Held by the dependency gate until its parents are committed
    StatusPending,
}

impl BlockStatus {
    pub fn is_invalid(self) -> bool {
        matches!(self, BlockStatus::StatusInvalid)
    }

    /// Whether the block has data usable as a parent
    pub fn is_valid(self) -> bool {
        !matches!(self, BlockStatus::StatusInvalid | BlockStatus::StatusPending)
    }

    pub fn has_block_body(self) -> bool {
        matches!(self, BlockStatus::StatusUtxoValid | BlockStatus::StatusViolatingFinality)
    }
}
