use crate::access::CachedDbAccess;
use crate::db::{Database, CF_BLOCK_TRANSACTIONS};
use crate::errors::DbResult;
use crate::staging::StagingArea;
use consensus_core::tx::Transaction;
use consensus_core::Hash;
use std::sync::Arc;

/// Block bodies, deleted once the block falls below the pruning point
#[derive(Clone)]
pub struct DbBlockTransactionsStore {
    access: CachedDbAccess<Hash, Arc<Vec<Transaction>>>,
}

impl DbBlockTransactionsStore {
    pub fn new(db: Arc<Database>, cache_size: usize) -> Self {
        Self { access: CachedDbAccess::new(db, CF_BLOCK_TRANSACTIONS, cache_size) }
    }

    pub fn get(&self, staging: &StagingArea, hash: Hash) -> DbResult<Arc<Vec<Transaction>>> {
        self.access.read(staging, &hash)
    }

    pub fn has(&self, staging: &StagingArea, hash: Hash) -> DbResult<bool> {
        self.access.has(staging, &hash)
    }

    pub fn insert(&self, staging: &mut StagingArea, hash: Hash, transactions: Arc<Vec<Transaction>>) -> DbResult<()> {
        self.access.stage(staging, &hash, &transactions)
    }

    pub fn delete(&self, staging: &mut StagingArea, hash: Hash) {
        self.access.stage_delete(staging, &hash)
    }
}
