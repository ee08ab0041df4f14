use crate::access::CachedDbAccess;
use crate::db::{Database, CF_UTXO_DIFFS};
use crate::errors::DbResult;
use crate::staging::StagingArea;
use consensus_core::utxo::UtxoDiff;
use consensus_core::Hash;
use std::sync::Arc;

/// UTXO diff of each block relative to its selected parent
#[derive(Clone)]
pub struct DbUtxoDiffsStore {
    access: CachedDbAccess<Hash, Arc<UtxoDiff>>,
}

impl DbUtxoDiffsStore {
    pub fn new(db: Arc<Database>, cache_size: usize) -> Self {
        Self { access: CachedDbAccess::new(db, CF_UTXO_DIFFS, cache_size) }
    }

    pub fn get(&self, staging: &StagingArea, hash: Hash) -> DbResult<Arc<UtxoDiff>> {
        self.access.read(staging, &hash)
    }

    pub fn has(&self, staging: &StagingArea, hash: Hash) -> DbResult<bool> {
        self.access.has(staging, &hash)
    }

    pub fn insert(&self, staging: &mut StagingArea, hash: Hash, diff: Arc<UtxoDiff>) -> DbResult<()> {
        self.access.stage(staging, &hash, &diff)
    }

    pub fn delete(&self, staging: &mut StagingArea, hash: Hash) {
        self.access.stage_delete(staging, &hash)
    }
}
