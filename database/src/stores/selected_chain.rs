use crate::access::{CachedDbAccess, CachedDbItem};
use crate::db::{Database, CF_SELECTED_CHAIN_HASH, CF_SELECTED_CHAIN_INDEX};
use crate::errors::{DbError, DbResult};
use crate::staging::StagingArea;
use consensus_core::Hash;
use std::sync::Arc;

/// The selected parent chain of the virtual, indexed from its root (index 0)
/// up to the virtual selected parent. Pruning drops a prefix, after which the
/// lowest retained index is [`DbSelectedChainStore::low_index`].
#[derive(Clone)]
pub struct DbSelectedChainStore {
    hash_by_index: CachedDbAccess<u64, Hash>,
    index_by_hash: CachedDbAccess<Hash, u64>,
    tip_index: CachedDbItem<u64>,
    low_index: CachedDbItem<u64>,
}

impl DbSelectedChainStore {
    pub fn new(db: Arc<Database>, cache_size: usize) -> Self {
        Self {
            hash_by_index: CachedDbAccess::new(db.clone(), CF_SELECTED_CHAIN_HASH, cache_size),
            index_by_hash: CachedDbAccess::new(db.clone(), CF_SELECTED_CHAIN_INDEX, cache_size),
            tip_index: CachedDbItem::new(db.clone(), "selected-chain-tip"),
            low_index: CachedDbItem::new(db, "selected-chain-low"),
        }
    }

    pub fn get_by_index(&self, staging: &StagingArea, index: u64) -> DbResult<Hash> {
        self.hash_by_index.read(staging, &index)
    }

    pub fn get_index(&self, staging: &StagingArea, hash: Hash) -> DbResult<Option<u64>> {
        self.index_by_hash.get(staging, &hash)
    }

    pub fn tip_index(&self, staging: &StagingArea) -> DbResult<Option<u64>> {
        self.tip_index.get(staging)
    }

    pub fn low_index(&self, staging: &StagingArea) -> DbResult<u64> {
        Ok(self.low_index.get(staging)?.unwrap_or(0))
    }

    pub fn get_tip(&self, staging: &StagingArea) -> DbResult<Option<(u64, Hash)>> {
        match self.tip_index(staging)? {
            Some(index) => Ok(Some((index, self.get_by_index(staging, index)?))),
            None => Ok(None),
        }
    }

    /// Appends `hash` above the current tip and returns its index
    pub fn stage_push(&self, staging: &mut StagingArea, hash: Hash) -> DbResult<u64> {
        let index = match self.tip_index(staging)? {
            Some(tip) => tip + 1,
            None => 0,
        };
        self.hash_by_index.stage(staging, &index, &hash)?;
        self.index_by_hash.stage(staging, &hash, &index)?;
        self.tip_index.stage(staging, &index)?;
        Ok(index)
    }

    /// Removes the current tip and returns it
    pub fn stage_pop(&self, staging: &mut StagingArea) -> DbResult<Hash> {
        let (index, hash) = self.get_tip(staging)?.ok_or_else(|| DbError::NotFound("selected chain tip".to_string()))?;
        if index <= self.low_index(staging)? {
            return Err(DbError::InvalidData("cannot pop the root of the selected chain".to_string()));
        }
        self.hash_by_index.stage_delete(staging, &index);
        self.index_by_hash.stage_delete(staging, &hash);
        self.tip_index.stage(staging, &(index - 1))?;
        Ok(hash)
    }

    /// Drops the whole chain and restarts it from `root`
    pub fn stage_reset(&self, staging: &mut StagingArea, root: Hash) -> DbResult<()> {
        self.hash_by_index.stage_clear(staging);
        self.index_by_hash.stage_clear(staging);
        self.tip_index.stage_delete(staging);
        self.low_index.stage_delete(staging);
        self.stage_push(staging, root)?;
        Ok(())
    }

    /// Forgets the chain blocks below `index`, which must not exceed the tip index
    pub fn stage_prune_below(&self, staging: &mut StagingArea, index: u64) -> DbResult<()> {
        let tip = self.tip_index(staging)?.ok_or_else(|| DbError::NotFound("selected chain tip".to_string()))?;
        if index > tip {
            return Err(DbError::InvalidData(format!("cannot prune the selected chain below {index}, above its tip {tip}")));
        }
        for low in self.low_index(staging)?..index {
            let hash = self.get_by_index(staging, low)?;
            self.hash_by_index.stage_delete(staging, &low);
            self.index_by_hash.stage_delete(staging, &hash);
        }
        self.low_index.stage(staging, &index.max(self.low_index(staging)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_push_pop() {
        let tmp = TempDir::new().unwrap();
        let db = Arc::new(Database::open(tmp.path()).unwrap());
        let store = DbSelectedChainStore::new(db.clone(), 16);
        let hashes: Vec<Hash> = (1..=4).map(Hash::from_u64_word).collect();

        let mut staging = StagingArea::new();
        for hash in hashes.iter() {
            store.stage_push(&mut staging, *hash).unwrap();
        }
        db.commit(staging).unwrap();

        let mut staging = StagingArea::new();
        assert_eq!(store.stage_pop(&mut staging).unwrap(), hashes[3]);
        assert_eq!(store.stage_pop(&mut staging).unwrap(), hashes[2]);
        assert_eq!(store.stage_push(&mut staging, Hash::from_u64_word(9)).unwrap(), 2);
        db.commit(staging).unwrap();

        let committed = StagingArea::new();
        assert_eq!(store.get_tip(&committed).unwrap(), Some((2, Hash::from_u64_word(9))));
        assert_eq!(store.get_index(&committed, hashes[3]).unwrap(), None);
        assert_eq!(store.get_index(&committed, hashes[1]).unwrap(), Some(1));

        let mut staging = StagingArea::new();
        store.stage_reset(&mut staging, hashes[0]).unwrap();
        db.commit(staging).unwrap();
        assert_eq!(store.get_tip(&committed).unwrap(), Some((0, hashes[0])));
        assert_eq!(store.get_index(&committed, hashes[1]).unwrap(), None);
    }

    #[test]
    fn test_prune_below() {
        let tmp = TempDir::new().unwrap();
        let db = Arc::new(Database::open(tmp.path()).unwrap());
        let store = DbSelectedChainStore::new(db.clone(), 16);
        let hashes: Vec<Hash> = (1..=5).map(Hash::from_u64_word).collect();

        let mut staging = StagingArea::new();
        for hash in hashes.iter() {
            store.stage_push(&mut staging, *hash).unwrap();
        }
        store.stage_prune_below(&mut staging, 3).unwrap();
        db.commit(staging).unwrap();

        let committed = StagingArea::new();
        assert_eq!(store.low_index(&committed).unwrap(), 3);
        assert_eq!(store.get_index(&committed, hashes[2]).unwrap(), None);
        assert_eq!(store.get_index(&committed, hashes[3]).unwrap(), Some(3));
        assert_eq!(store.get_tip(&committed).unwrap(), Some((4, hashes[4])));

        let mut staging = StagingArea::new();
        assert_eq!(store.stage_pop(&mut staging).unwrap(), hashes[4]);
        assert!(store.stage_pop(&mut staging).is_err());
        assert!(store.stage_prune_below(&mut staging, 9).is_err());
    }
}
