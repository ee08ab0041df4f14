//! In-memory implementations of the store traits.
//!
//! Used as scratch space while verifying a pruning proof and as mock stores
//! in tests of the DAG algorithms.

use std::sync::Arc;

use consensus_core::errors::{ConsensusError, ConsensusResult};
use consensus_core::ghostdag::GhostdagData;
use consensus_core::header::Header;
use consensus_core::reachability::ReachabilityData;
use consensus_core::{BlockHashMap, Hash};

use super::stores::{GhostdagStoreReader, HeaderStoreReader, ReachabilityStore, ReachabilityStoreReader, RelationsStoreReader};

fn missing(what: &str, hash: Hash) -> ConsensusError {
    ConsensusError::MissingData(format!("{what} of {hash}"))
}

#[derive(Default, Clone, Debug)]
pub struct MemoryGhostdagStore {
    map: BlockHashMap<Arc<GhostdagData>>,
}

impl MemoryGhostdagStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, hash: Hash, data: Arc<GhostdagData>) {
        self.map.insert(hash, data);
    }
}

impl GhostdagStoreReader for MemoryGhostdagStore {
    fn get_ghostdag_data(&self, hash: Hash) -> ConsensusResult<Arc<GhostdagData>> {
        self.map.get(&hash).cloned().ok_or_else(|| missing("ghostdag data", hash))
    }

    fn has_ghostdag_data(&self, hash: Hash) -> ConsensusResult<bool> {
        Ok(self.map.contains_key(&hash))
    }
}

#[derive(Default, Clone, Debug)]
pub struct MemoryRelationsStore {
    parents: BlockHashMap<Arc<Vec<Hash>>>,
    children: BlockHashMap<Arc<Vec<Hash>>>,
}

impl MemoryRelationsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `hash` with `parents`; parents must already be present
    pub fn insert(&mut self, hash: Hash, parents: Vec<Hash>) {
        for parent in parents.iter() {
            if let Some(children) = self.children.get_mut(parent) {
                Arc::make_mut(children).push(hash);
            }
        }
        self.parents.insert(hash, Arc::new(parents));
        self.children.entry(hash).or_default();
    }
}

impl RelationsStoreReader for MemoryRelationsStore {
    fn get_parents(&self, hash: Hash) -> ConsensusResult<Arc<Vec<Hash>>> {
        self.parents.get(&hash).cloned().ok_or_else(|| missing("parents", hash))
    }

    fn get_children(&self, hash: Hash) -> ConsensusResult<Arc<Vec<Hash>>> {
        self.children.get(&hash).cloned().ok_or_else(|| missing("children", hash))
    }

    fn has_relations(&self, hash: Hash) -> ConsensusResult<bool> {
        Ok(self.parents.contains_key(&hash))
    }
}

#[derive(Default, Clone, Debug)]
pub struct MemoryReachabilityStore {
    map: BlockHashMap<ReachabilityData>,
}

impl MemoryReachabilityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Hash, &ReachabilityData)> {
        self.map.iter()
    }
}

impl ReachabilityStoreReader for MemoryReachabilityStore {
    fn get_reachability(&self, hash: Hash) -> ConsensusResult<ReachabilityData> {
        self.map.get(&hash).cloned().ok_or_else(|| missing("reachability data", hash))
    }

    fn has_reachability(&self, hash: Hash) -> ConsensusResult<bool> {
        Ok(self.map.contains_key(&hash))
    }
}

impl ReachabilityStore for MemoryReachabilityStore {
    fn set_reachability(&mut self, hash: Hash, data: ReachabilityData) -> ConsensusResult<()> {
        self.map.insert(hash, data);
        Ok(())
    }
}

#[derive(Default, Clone, Debug)]
pub struct MemoryHeaderStore {
    map: BlockHashMap<Arc<Header>>,
}

impl MemoryHeaderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, header: Arc<Header>) {
        self.map.insert(header.hash, header);
    }
}

impl HeaderStoreReader for MemoryHeaderStore {
    fn get_header(&self, hash: Hash) -> ConsensusResult<Arc<Header>> {
        self.map.get(&hash).cloned().ok_or_else(|| missing("header", hash))
    }

    fn has_header(&self, hash: Hash) -> ConsensusResult<bool> {
        Ok(self.map.contains_key(&hash))
    }
}

/// The four in-memory stores bundled so they can be handed to algorithms
/// needing several capabilities at once
#[derive(Default, Clone, Debug)]
pub struct MemoryDagStores {
    pub ghostdag: MemoryGhostdagStore,
    pub relations: MemoryRelationsStore,
    pub reachability: MemoryReachabilityStore,
    pub headers: MemoryHeaderStore,
}

impl MemoryDagStores {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GhostdagStoreReader for MemoryDagStores {
    fn get_ghostdag_data(&self, hash: Hash) -> ConsensusResult<Arc<GhostdagData>> {
        self.ghostdag.get_ghostdag_data(hash)
    }

    fn has_ghostdag_data(&self, hash: Hash) -> ConsensusResult<bool> {
        self.ghostdag.has_ghostdag_data(hash)
    }
}

impl RelationsStoreReader for MemoryDagStores {
    fn get_parents(&self, hash: Hash) -> ConsensusResult<Arc<Vec<Hash>>> {
        self.relations.get_parents(hash)
    }

    fn get_children(&self, hash: Hash) -> ConsensusResult<Arc<Vec<Hash>>> {
        self.relations.get_children(hash)
    }

    fn has_relations(&self, hash: Hash) -> ConsensusResult<bool> {
        self.relations.has_relations(hash)
    }
}

impl ReachabilityStoreReader for MemoryDagStores {
    fn get_reachability(&self, hash: Hash) -> ConsensusResult<ReachabilityData> {
        self.reachability.get_reachability(hash)
    }

    fn has_reachability(&self, hash: Hash) -> ConsensusResult<bool> {
        self.reachability.has_reachability(hash)
    }
}

impl ReachabilityStore for MemoryDagStores {
    fn set_reachability(&mut self, hash: Hash, data: ReachabilityData) -> ConsensusResult<()> {
        self.reachability.set_reachability(hash, data)
    }
}

impl HeaderStoreReader for MemoryDagStores {
    fn get_header(&self, hash: Hash) -> ConsensusResult<Arc<Header>> {
        self.headers.get_header(hash)
    }

    fn has_header(&self, hash: Hash) -> ConsensusResult<bool> {
        self.headers.has_header(hash)
    }
}
