use crate::access::CachedDbAccess;
use crate::db::{Database, CF_GHOSTDAG};
use crate::errors::DbResult;
use crate::staging::StagingArea;
use consensus_core::ghostdag::GhostdagData;
use consensus_core::Hash;
use std::sync::Arc;

#[derive(Clone)]
pub struct DbGhostdagStore {
    access: CachedDbAccess<Hash, Arc<GhostdagData>>,
}

impl DbGhostdagStore {
    pub fn new(db: Arc<Database>, cache_size: usize) -> Self {
        Self { access: CachedDbAccess::new(db, CF_GHOSTDAG, cache_size) }
    }

    pub fn get_data(&self, staging: &StagingArea, hash: Hash) -> DbResult<Arc<GhostdagData>> {
        self.access.read(staging, &hash)
    }

    pub fn has(&self, staging: &StagingArea, hash: Hash) -> DbResult<bool> {
        self.access.has(staging, &hash)
    }

    pub fn insert(&self, staging: &mut StagingArea, hash: Hash, data: Arc<GhostdagData>) -> DbResult<()> {
        self.access.stage(staging, &hash, &data)
    }

    pub fn delete(&self, staging: &mut StagingArea, hash: Hash) {
        self.access.stage_delete(staging, &hash)
    }
}
