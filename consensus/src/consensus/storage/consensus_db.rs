//! Consensus database interface
//!
//! [`ConsensusStorage`] bundles every store of one consensus instance over a
//! single rocksdb database. Block transitions read through a staged view so
//! they observe their own uncommitted writes, and commit everything at once.

use std::sync::Arc;

use consensus_core::errors::ConsensusResult;
use consensus_core::ghostdag::GhostdagData;
use consensus_core::header::Header;
use consensus_core::reachability::ReachabilityData;
use consensus_core::Hash;
use database::db::CF_PRUNING_UTXO_SET;
use database::db::CF_UTXO_SET;
use database::stores::{
    DbAcceptanceDataStore, DbBlockTransactionsStore, DbGhostdagStore, DbHeadersStore, DbReachabilityStore, DbRelationsStore,
    DbSelectedChainStore, DbStatusesStore, DbUtxoDiffsStore, DbUtxoSetStore,
};
use database::{CachedDbItem, Database, StagingArea};

use super::stores::{GhostdagStoreReader, HeaderStoreReader, ReachabilityStore, ReachabilityStoreReader, RelationsStoreReader};
use crate::config::CacheSizes;
use crate::consensus::types::{FinalityConflict, VirtualState};

/// Consensus storage coordinator
pub struct ConsensusStorage {
    pub db: Arc<Database>,

    // DAG data, keyed by block hash
    pub headers: DbHeadersStore,
    pub block_transactions: DbBlockTransactionsStore,
    pub ghostdag: DbGhostdagStore,
    pub reachability: DbReachabilityStore,
    pub relations: DbRelationsStore,
    pub statuses: DbStatusesStore,

    // UTXO data
    pub utxo_diffs: DbUtxoDiffsStore,
    pub acceptance_data: DbAcceptanceDataStore,
    /// UTXO set at the virtual selected tip
    pub utxo_set: DbUtxoSetStore,
    /// UTXO set at the pruning point
    pub pruning_utxo_set: DbUtxoSetStore,
    pub selected_chain: DbSelectedChainStore,

    // Singleton state
    pub virtual_state: CachedDbItem<Arc<VirtualState>>,
    /// Valid DAG tips that may be chosen as virtual parents
    pub tips: CachedDbItem<Vec<Hash>>,
    pub pruning_point: CachedDbItem<Hash>,
    pub pruning_point_history: CachedDbItem<Vec<Hash>>,
    /// Lowest block with full history: genesis, or the pruning point a proof was applied for
    pub history_root: CachedDbItem<Hash>,
    pub finality_conflicts: CachedDbItem<Vec<FinalityConflict>>,
    /// Set between applying a pruning proof and importing the pruning point UTXO set
    pub pending_pruning_point: CachedDbItem<Hash>,
    pub genesis: CachedDbItem<Hash>,
}

impl ConsensusStorage {
    /// Create the stores over an opened database
    pub fn new(db: Arc<Database>, cache_sizes: &CacheSizes) -> Self {
        Self {
            headers: DbHeadersStore::new(db.clone(), cache_sizes.headers),
            block_transactions: DbBlockTransactionsStore::new(db.clone(), cache_sizes.block_transactions),
            ghostdag: DbGhostdagStore::new(db.clone(), cache_sizes.ghostdag),
            reachability: DbReachabilityStore::new(db.clone(), cache_sizes.reachability),
            relations: DbRelationsStore::new(db.clone(), cache_sizes.relations),
            statuses: DbStatusesStore::new(db.clone(), cache_sizes.statuses),
            utxo_diffs: DbUtxoDiffsStore::new(db.clone(), cache_sizes.utxo_diffs),
            acceptance_data: DbAcceptanceDataStore::new(db.clone(), cache_sizes.utxo_diffs),
            utxo_set: DbUtxoSetStore::new(db.clone(), CF_UTXO_SET, cache_sizes.utxo_set),
            pruning_utxo_set: DbUtxoSetStore::new(db.clone(), CF_PRUNING_UTXO_SET, cache_sizes.utxo_set),
            selected_chain: DbSelectedChainStore::new(db.clone(), cache_sizes.selected_chain),
            virtual_state: CachedDbItem::new(db.clone(), "virtual-state"),
            tips: CachedDbItem::new(db.clone(), "tips"),
            pruning_point: CachedDbItem::new(db.clone(), "pruning-point"),
            pruning_point_history: CachedDbItem::new(db.clone(), "pruning-point-history"),
            history_root: CachedDbItem::new(db.clone(), "history-root"),
            finality_conflicts: CachedDbItem::new(db.clone(), "finality-conflicts"),
            pending_pruning_point: CachedDbItem::new(db.clone(), "pending-pruning-point"),
            genesis: CachedDbItem::new(db.clone(), "genesis"),
            db,
        }
    }

    /// Read view over committed state plus the writes staged in `staging`
    pub fn view<'a>(&'a self, staging: &'a StagingArea) -> StagedView<'a> {
        StagedView { storage: self, staging }
    }

    /// Like [`Self::view`], additionally allowing reachability writes
    pub fn view_mut<'a>(&'a self, staging: &'a mut StagingArea) -> StagedViewMut<'a> {
        StagedViewMut { storage: self, staging }
    }

    /// Atomically applies `staging`
    pub fn commit(&self, staging: StagingArea) -> ConsensusResult<()> {
        Ok(self.db.commit(staging)?)
    }
}

#[derive(Clone, Copy)]
pub struct StagedView<'a> {
    storage: &'a ConsensusStorage,
    staging: &'a StagingArea,
}

impl<'a> StagedView<'a> {
    pub fn storage(&self) -> &'a ConsensusStorage {
        self.storage
    }

    pub fn staging(&self) -> &'a StagingArea {
        self.staging
    }
}

impl GhostdagStoreReader for StagedView<'_> {
    fn get_ghostdag_data(&self, hash: Hash) -> ConsensusResult<Arc<GhostdagData>> {
        Ok(self.storage.ghostdag.get_data(self.staging, hash)?)
    }

    fn has_ghostdag_data(&self, hash: Hash) -> ConsensusResult<bool> {
        Ok(self.storage.ghostdag.has(self.staging, hash)?)
    }
}

impl RelationsStoreReader for StagedView<'_> {
    fn get_parents(&self, hash: Hash) -> ConsensusResult<Arc<Vec<Hash>>> {
        Ok(self.storage.relations.get_parents(self.staging, hash)?)
    }

    fn get_children(&self, hash: Hash) -> ConsensusResult<Arc<Vec<Hash>>> {
        Ok(self.storage.relations.get_children(self.staging, hash)?)
    }

    fn has_relations(&self, hash: Hash) -> ConsensusResult<bool> {
        Ok(self.storage.relations.has(self.staging, hash)?)
    }
}

impl ReachabilityStoreReader for StagedView<'_> {
    fn get_reachability(&self, hash: Hash) -> ConsensusResult<ReachabilityData> {
        Ok(self.storage.reachability.get(self.staging, hash)?)
    }

    fn has_reachability(&self, hash: Hash) -> ConsensusResult<bool> {
        Ok(self.storage.reachability.has(self.staging, hash)?)
    }
}

impl HeaderStoreReader for StagedView<'_> {
    fn get_header(&self, hash: Hash) -> ConsensusResult<Arc<Header>> {
        Ok(self.storage.headers.get_header(self.staging, hash)?)
    }

    fn has_header(&self, hash: Hash) -> ConsensusResult<bool> {
        Ok(self.storage.headers.has(self.staging, hash)?)
    }
}

pub struct StagedViewMut<'a> {
    storage: &'a ConsensusStorage,
    staging: &'a mut StagingArea,
}

impl StagedViewMut<'_> {
    pub fn as_view(&self) -> StagedView<'_> {
        StagedView { storage: self.storage, staging: &*self.staging }
    }
}

impl GhostdagStoreReader for StagedViewMut<'_> {
    fn get_ghostdag_data(&self, hash: Hash) -> ConsensusResult<Arc<GhostdagData>> {
        self.as_view().get_ghostdag_data(hash)
    }

    fn has_ghostdag_data(&self, hash: Hash) -> ConsensusResult<bool> {
        self.as_view().has_ghostdag_data(hash)
    }
}

impl RelationsStoreReader for StagedViewMut<'_> {
    fn get_parents(&self, hash: Hash) -> ConsensusResult<Arc<Vec<Hash>>> {
        self.as_view().get_parents(hash)
    }

    fn get_children(&self, hash: Hash) -> ConsensusResult<Arc<Vec<Hash>>> {
        self.as_view().get_children(hash)
    }

    fn has_relations(&self, hash: Hash) -> ConsensusResult<bool> {
        self.as_view().has_relations(hash)
    }
}

impl ReachabilityStoreReader for StagedViewMut<'_> {
    fn get_reachability(&self, hash: Hash) -> ConsensusResult<ReachabilityData> {
        self.as_view().get_reachability(hash)
    }

    fn has_reachability(&self, hash: Hash) -> ConsensusResult<bool> {
        self.as_view().has_reachability(hash)
    }
}

impl ReachabilityStore for StagedViewMut<'_> {
    fn set_reachability(&mut self, hash: Hash, data: ReachabilityData) -> ConsensusResult<()> {
        Ok(self.storage.reachability.stage(self.staging, hash, &data)?)
    }
}

impl HeaderStoreReader for StagedViewMut<'_> {
    fn get_header(&self, hash: Hash) -> ConsensusResult<Arc<Header>> {
        self.as_view().get_header(hash)
    }

    fn has_header(&self, hash: Hash) -> ConsensusResult<bool> {
        self.as_view().has_header(hash)
    }
}
