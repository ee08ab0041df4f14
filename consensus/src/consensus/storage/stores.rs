//! Capability traits over the consensus stores.
//!
//! The DAG algorithms (reachability, GHOSTDAG, windows) are written against
//! these traits so they run unchanged over the staged rocksdb stores of a
//! block transition and over the in-memory stores used by tests and by
//! pruning proof verification.

use std::sync::Arc;

use consensus_core::errors::ConsensusResult;
use consensus_core::ghostdag::GhostdagData;
use consensus_core::header::Header;
use consensus_core::reachability::{Interval, ReachabilityData};
use consensus_core::{BlueWorkType, Hash};

pub trait GhostdagStoreReader {
    fn get_ghostdag_data(&self, hash: Hash) -> ConsensusResult<Arc<GhostdagData>>;

    fn has_ghostdag_data(&self, hash: Hash) -> ConsensusResult<bool>;

    fn get_blue_work(&self, hash: Hash) -> ConsensusResult<BlueWorkType> {
        Ok(self.get_ghostdag_data(hash)?.blue_work)
    }

    fn get_blue_score(&self, hash: Hash) -> ConsensusResult<u64> {
        Ok(self.get_ghostdag_data(hash)?.blue_score)
    }

    fn get_selected_parent(&self, hash: Hash) -> ConsensusResult<Hash> {
        Ok(self.get_ghostdag_data(hash)?.selected_parent)
    }
}

pub trait RelationsStoreReader {
    fn get_parents(&self, hash: Hash) -> ConsensusResult<Arc<Vec<Hash>>>;

    fn get_children(&self, hash: Hash) -> ConsensusResult<Arc<Vec<Hash>>>;

    fn has_relations(&self, hash: Hash) -> ConsensusResult<bool>;
}

pub trait HeaderStoreReader {
    fn get_header(&self, hash: Hash) -> ConsensusResult<Arc<Header>>;

    fn has_header(&self, hash: Hash) -> ConsensusResult<bool>;

    fn get_timestamp(&self, hash: Hash) -> ConsensusResult<u64> {
        Ok(self.get_header(hash)?.timestamp)
    }

    fn get_bits(&self, hash: Hash) -> ConsensusResult<u32> {
        Ok(self.get_header(hash)?.bits)
    }

    fn get_daa_score(&self, hash: Hash) -> ConsensusResult<u64> {
        Ok(self.get_header(hash)?.daa_score)
    }
}

pub trait ReachabilityStoreReader {
    fn get_reachability(&self, hash: Hash) -> ConsensusResult<ReachabilityData>;

    fn has_reachability(&self, hash: Hash) -> ConsensusResult<bool>;

    fn get_interval(&self, hash: Hash) -> ConsensusResult<Interval> {
        Ok(self.get_reachability(hash)?.interval)
    }
}

/// Reachability records are the only DAG data rewritten after insertion (by reindexing)
pub trait ReachabilityStore: ReachabilityStoreReader {
    fn set_reachability(&mut self, hash: Hash, data: ReachabilityData) -> ConsensusResult<()>;
}

/// Everything GHOSTDAG and the window walks read
pub trait DagStoreReader: GhostdagStoreReader + RelationsStoreReader + ReachabilityStoreReader + HeaderStoreReader {}

impl<T> DagStoreReader for T where T: GhostdagStoreReader + RelationsStoreReader + ReachabilityStoreReader + HeaderStoreReader {}
