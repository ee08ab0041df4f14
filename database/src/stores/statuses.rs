use crate::access::CachedDbAccess;
use crate::db::{Database, CF_STATUSES};
use crate::errors::DbResult;
use crate::staging::StagingArea;
use consensus_core::blockstatus::BlockStatus;
use consensus_core::Hash;
use std::sync::Arc;

#[derive(Clone)]
pub struct DbStatusesStore {
    access: CachedDbAccess<Hash, BlockStatus>,
}

impl DbStatusesStore {
    pub fn new(db: Arc<Database>, cache_size: usize) -> Self {
        Self { access: CachedDbAccess::new(db, CF_STATUSES, cache_size) }
    }

    pub fn get(&self, staging: &StagingArea, hash: Hash) -> DbResult<Option<BlockStatus>> {
        self.access.get(staging, &hash)
    }

    pub fn set(&self, staging: &mut StagingArea, hash: Hash, status: BlockStatus) -> DbResult<()> {
        self.access.stage(staging, &hash, &status)
    }

    pub fn delete(&self, staging: &mut StagingArea, hash: Hash) {
        self.access.stage_delete(staging, &hash)
    }
}
