use crate::access::CachedDbAccess;
use crate::db::Database;
use crate::errors::{DbError, DbResult};
use crate::staging::StagingArea;
use consensus_core::tx::{TransactionOutpoint, UtxoEntry};
use consensus_core::utxo::UtxoDiff;
use std::sync::Arc;

/// A materialized UTXO set. Used both for the set at the virtual selected
/// tip and for the set at the pruning point, each in its own column family.
#[derive(Clone)]
pub struct DbUtxoSetStore {
    access: CachedDbAccess<TransactionOutpoint, UtxoEntry>,
}

impl DbUtxoSetStore {
    pub fn new(db: Arc<Database>, cf: &'static str, cache_size: usize) -> Self {
        Self { access: CachedDbAccess::new(db, cf, cache_size) }
    }

    pub fn get(&self, staging: &StagingArea, outpoint: &TransactionOutpoint) -> DbResult<Option<UtxoEntry>> {
        self.access.get(staging, outpoint)
    }

    /// Stages `diff` on top of the set. Removed outpoints must exist.
    pub fn stage_diff(&self, staging: &mut StagingArea, diff: &UtxoDiff) -> DbResult<()> {
        for (outpoint, _) in diff.remove.iter() {
            if !self.access.has(staging, outpoint)? {
                return Err(DbError::InvalidData(format!("diff removes missing outpoint {}:{}", outpoint.transaction_id, outpoint.index)));
            }
            self.access.stage_delete(staging, outpoint);
        }
        for (outpoint, entry) in diff.add.iter() {
            self.access.stage(staging, outpoint, entry)?;
        }
        Ok(())
    }

    /// Stages a full replacement of the set
    pub fn stage_replace<'a>(
        &self,
        staging: &mut StagingArea,
        utxos: impl IntoIterator<Item = (&'a TransactionOutpoint, &'a UtxoEntry)>,
    ) -> DbResult<()> {
        self.access.stage_clear(staging);
        for (outpoint, entry) in utxos {
            self.access.stage(staging, outpoint, entry)?;
        }
        Ok(())
    }

    pub fn iter_committed(&self) -> DbResult<Vec<(TransactionOutpoint, UtxoEntry)>> {
        self.access.iter_committed()
    }
}
