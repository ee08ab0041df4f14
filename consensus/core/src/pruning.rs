use serde::{Deserialize, Serialize};

use crate::{header::Header, Hash};

/// Proof that a pruning point is backed by sufficient accumulated work.
///
/// `headers` covers the pruning point's recent past in topological order
/// and ends with the pruning point header itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruningPointProof {
    pub pruning_point: Hash,
    pub headers: Vec<Header>,
}

impl PruningPointProof {
    pub fn new(pruning_point: Hash, headers: Vec<Header>) -> Self {
        Self { pruning_point, headers }
    }

    pub fn pruning_point_header(&self) -> Option<&Header> {
        self.headers.last()
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}
