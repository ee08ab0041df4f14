use crate::access::CachedDbAccess;
use crate::db::{Database, CF_HEADERS};
use crate::errors::DbResult;
use crate::staging::StagingArea;
use consensus_core::header::Header;
use consensus_core::Hash;
use std::sync::Arc;

/// Block headers. Pruning deletes them below the proof window.
#[derive(Clone)]
pub struct DbHeadersStore {
    access: CachedDbAccess<Hash, Arc<Header>>,
}

impl DbHeadersStore {
    pub fn new(db: Arc<Database>, cache_size: usize) -> Self {
        Self { access: CachedDbAccess::new(db, CF_HEADERS, cache_size) }
    }

    pub fn get_header(&self, staging: &StagingArea, hash: Hash) -> DbResult<Arc<Header>> {
        self.access.read(staging, &hash)
    }

    pub fn try_get_header(&self, staging: &StagingArea, hash: Hash) -> DbResult<Option<Arc<Header>>> {
        self.access.get(staging, &hash)
    }

    pub fn has(&self, staging: &StagingArea, hash: Hash) -> DbResult<bool> {
        self.access.has(staging, &hash)
    }

    pub fn insert(&self, staging: &mut StagingArea, header: Arc<Header>) -> DbResult<()> {
        self.access.stage(staging, &header.hash, &header)
    }

    pub fn delete(&self, staging: &mut StagingArea, hash: Hash) {
        self.access.stage_delete(staging, &hash)
    }
}
