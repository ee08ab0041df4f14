use serde::{Deserialize, Serialize};

use crate::{header::Header, tx::Transaction, Hash};

/// Complete block structure including header and transactions
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    /// The coinbase transaction comes first
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(header: Header, transactions: Vec<Transaction>) -> Self {
        Self { header, transactions }
    }

    /// A block without transactions, for header-only tests
    pub fn from_header(header: Header) -> Self {
        Self { header, transactions: Vec::new() }
    }

    pub fn hash(&self) -> Hash {
        self.header.hash
    }

    pub fn is_genesis(&self) -> bool {
        self.header.direct_parents().is_empty()
    }
}
