use crate::access::CachedDbAccess;
use crate::db::{Database, CF_ACCEPTANCE_DATA};
use crate::errors::DbResult;
use crate::staging::StagingArea;
use consensus_core::acceptance_data::AcceptanceData;
use consensus_core::Hash;
use std::sync::Arc;

#[derive(Clone)]
pub struct DbAcceptanceDataStore {
    access: CachedDbAccess<Hash, Arc<AcceptanceData>>,
}

impl DbAcceptanceDataStore {
    pub fn new(db: Arc<Database>, cache_size: usize) -> Self {
        Self { access: CachedDbAccess::new(db, CF_ACCEPTANCE_DATA, cache_size) }
    }

    pub fn get(&self, staging: &StagingArea, hash: Hash) -> DbResult<Arc<AcceptanceData>> {
        self.access.read(staging, &hash)
    }

    pub fn insert(&self, staging: &mut StagingArea, hash: Hash, data: Arc<AcceptanceData>) -> DbResult<()> {
        self.access.stage(staging, &hash, &data)
    }

    pub fn delete(&self, staging: &mut StagingArea, hash: Hash) {
        self.access.stage_delete(staging, &hash)
    }
}
