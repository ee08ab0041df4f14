use crate::access::CachedDbAccess;
use crate::db::{Database, CF_REACHABILITY};
use crate::errors::DbResult;
use crate::staging::StagingArea;
use consensus_core::reachability::ReachabilityData;
use consensus_core::Hash;
use std::sync::Arc;

/// Reachability records are rewritten in place by reindexing
#[derive(Clone)]
pub struct DbReachabilityStore {
    access: CachedDbAccess<Hash, ReachabilityData>,
}

impl DbReachabilityStore {
    pub fn new(db: Arc<Database>, cache_size: usize) -> Self {
        Self { access: CachedDbAccess::new(db, CF_REACHABILITY, cache_size) }
    }

    pub fn get(&self, staging: &StagingArea, hash: Hash) -> DbResult<ReachabilityData> {
        self.access.read(staging, &hash)
    }

    pub fn has(&self, staging: &StagingArea, hash: Hash) -> DbResult<bool> {
        self.access.has(staging, &hash)
    }

    pub fn stage(&self, staging: &mut StagingArea, hash: Hash, data: &ReachabilityData) -> DbResult<()> {
        self.access.stage(staging, &hash, data)
    }
}
