use crate::cache::Cache;
use crate::db::{Database, CF_METADATA};
use crate::errors::{DbError, DbResult};
use crate::staging::{StagedValue, StagingArea};
use consensus_core::tx::TransactionOutpoint;
use consensus_core::Hash;
use rocksdb::IteratorMode;
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;

/// Byte encoding of store keys
pub trait DbKey: Sized {
    fn to_db_key(&self) -> Vec<u8>;
    fn from_db_key(bytes: &[u8]) -> Option<Self>;
}

impl DbKey for Hash {
    fn to_db_key(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn from_db_key(bytes: &[u8]) -> Option<Self> {
        Hash::try_from_slice(bytes).ok()
    }
}

/// Big endian so that rocksdb iteration follows numeric order
impl DbKey for u64 {
    fn to_db_key(&self) -> Vec<u8> {
        self.to_be_bytes().to_vec()
    }

    fn from_db_key(bytes: &[u8]) -> Option<Self> {
        Some(u64::from_be_bytes(bytes.try_into().ok()?))
    }
}

impl DbKey for TransactionOutpoint {
    fn to_db_key(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(36);
        key.extend_from_slice(self.transaction_id.as_bytes());
        key.extend_from_slice(&self.index.to_le_bytes());
        key
    }

    fn from_db_key(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 36 {
            return None;
        }
        let transaction_id = Hash::try_from_slice(&bytes[..32]).ok()?;
        let index = u32::from_le_bytes(bytes[32..].try_into().ok()?);
        Some(TransactionOutpoint::new(transaction_id, index))
    }
}

/// A column family of `K -> V` rows with a staging overlay and an LRU cache
/// of committed rows in front of it.
pub struct CachedDbAccess<K, V> {
    db: Arc<Database>,
    cf: &'static str,
    cache: Arc<Cache<Vec<u8>, V>>,
    _key: PhantomData<K>,
}

impl<K, V> Clone for CachedDbAccess<K, V> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), cf: self.cf, cache: self.cache.clone(), _key: PhantomData }
    }
}

impl<K, V> CachedDbAccess<K, V>
where
    K: DbKey,
    V: Clone + Serialize + DeserializeOwned + Send + 'static,
{
    pub fn new(db: Arc<Database>, cf: &'static str, cache_size: usize) -> Self {
        let cache = Arc::new(Cache::new(cache_size));
        db.register_cache(cf, cache.clone());
        Self { db, cf, cache, _key: PhantomData }
    }

    pub fn cf(&self) -> &'static str {
        self.cf
    }

    pub fn get(&self, staging: &StagingArea, key: &K) -> DbResult<Option<V>> {
        let key = key.to_db_key();
        match staging.get(self.cf, &key) {
            StagedValue::Present(bytes) => return Ok(Some(bincode::deserialize(bytes)?)),
            StagedValue::Deleted => return Ok(None),
            StagedValue::NotStaged => {}
        }
        if let Some(value) = self.cache.get(&key) {
            return Ok(Some(value));
        }
        let _guard = self.db.read_guard();
        match self.db.get(self.cf, &key)? {
            Some(bytes) => {
                let value: V = bincode::deserialize(&bytes)?;
                self.cache.insert(key, value.clone());
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Like [`Self::get`] but a missing row is a [`DbError::NotFound`]
    pub fn read(&self, staging: &StagingArea, key: &K) -> DbResult<V> {
        self.get(staging, key)?.ok_or_else(|| DbError::NotFound(format!("{} row {}", self.cf, hex_key(&key.to_db_key()))))
    }

    pub fn has(&self, staging: &StagingArea, key: &K) -> DbResult<bool> {
        let key = key.to_db_key();
        match staging.get(self.cf, &key) {
            StagedValue::Present(_) => Ok(true),
            StagedValue::Deleted => Ok(false),
            StagedValue::NotStaged => Ok(self.cache.contains_key(&key) || self.db.exists(self.cf, &key)?),
        }
    }

    pub fn stage(&self, staging: &mut StagingArea, key: &K, value: &V) -> DbResult<()> {
        staging.stage(self.cf, key.to_db_key(), bincode::serialize(value)?);
        Ok(())
    }

    pub fn stage_delete(&self, staging: &mut StagingArea, key: &K) {
        staging.stage_delete(self.cf, key.to_db_key());
    }

    pub fn stage_clear(&self, staging: &mut StagingArea) {
        staging.stage_clear(self.cf);
    }

    pub fn is_staged(&self, staging: &StagingArea, key: &K) -> bool {
        staging.is_staged(self.cf, &key.to_db_key())
    }

    /// All committed rows, in key order. Staged rows are not included.
    pub fn iter_committed(&self) -> DbResult<Vec<(K, V)>> {
        let mut rows = Vec::new();
        for item in self.db.iterator(self.cf, IteratorMode::Start)? {
            let (key, value) = item?;
            let key = K::from_db_key(&key).ok_or_else(|| DbError::InvalidData(format!("bad key in {}", self.cf)))?;
            rows.push((key, bincode::deserialize(&value)?));
        }
        Ok(rows)
    }
}

/// A single typed value kept in the metadata column family
pub struct CachedDbItem<V> {
    access: CachedDbAccess<Hash, V>,
    key: Hash,
}

impl<V> Clone for CachedDbItem<V> {
    fn clone(&self) -> Self {
        Self { access: self.access.clone(), key: self.key }
    }
}

impl<V> CachedDbItem<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + 'static,
{
    /// `name` identifies the item inside the metadata column family
    pub fn new(db: Arc<Database>, name: &'static str) -> Self {
        Self { access: CachedDbAccess::new(db, CF_METADATA, 1), key: item_key(name) }
    }

    pub fn get(&self, staging: &StagingArea) -> DbResult<Option<V>> {
        self.access.get(staging, &self.key)
    }

    pub fn read(&self, staging: &StagingArea) -> DbResult<V> {
        self.access.read(staging, &self.key)
    }

    pub fn stage(&self, staging: &mut StagingArea, value: &V) -> DbResult<()> {
        self.access.stage(staging, &self.key, value)
    }

    pub fn stage_delete(&self, staging: &mut StagingArea) {
        self.access.stage_delete(staging, &self.key)
    }
}

// Metadata items are keyed by their name padded into a hash-sized key
fn item_key(name: &str) -> Hash {
    let mut bytes = [0u8; 32];
    let len = name.len().min(32);
    bytes[..len].copy_from_slice(&name.as_bytes()[..len]);
    Hash::from_bytes(bytes)
}

fn hex_key(key: &[u8]) -> String {
    key.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::CF_GHOSTDAG;
    use tempfile::TempDir;

    #[test]
    fn test_staged_reads_fall_back_to_committed() {
        let tmp = TempDir::new().unwrap();
        let db = Arc::new(Database::open(tmp.path()).unwrap());
        let access: CachedDbAccess<Hash, u64> = CachedDbAccess::new(db.clone(), CF_GHOSTDAG, 10);
        let a = Hash::from_u64_word(1);
        let b = Hash::from_u64_word(2);

        let mut staging = StagingArea::new();
        access.stage(&mut staging, &a, &7).unwrap();
        assert_eq!(access.get(&staging, &a).unwrap(), Some(7));
        assert!(access.is_staged(&staging, &a));
        // Invisible to other readers until committed
        assert_eq!(access.get(&StagingArea::new(), &a).unwrap(), None);
        db.commit(staging).unwrap();
        assert_eq!(access.read(&StagingArea::new(), &a).unwrap(), 7);

        let mut staging = StagingArea::new();
        access.stage(&mut staging, &a, &8).unwrap();
        access.stage(&mut staging, &b, &9).unwrap();
        access.stage_delete(&mut staging, &a);
        assert!(!access.has(&staging, &a).unwrap());
        db.commit(staging).unwrap();

        // The cached committed row must not survive the delete
        let empty = StagingArea::new();
        assert!(matches!(access.read(&empty, &a), Err(DbError::NotFound(_))));
        assert_eq!(access.iter_committed().unwrap(), vec![(b, 9)]);
    }

    #[test]
    fn test_cache_invalidated_on_commit() {
        let tmp = TempDir::new().unwrap();
        let db = Arc::new(Database::open(tmp.path()).unwrap());
        let access: CachedDbAccess<u64, String> = CachedDbAccess::new(db.clone(), CF_GHOSTDAG, 10);
        let mut staging = StagingArea::new();
        access.stage(&mut staging, &5, &"old".to_string()).unwrap();
        db.commit(staging).unwrap();
        assert_eq!(access.read(&StagingArea::new(), &5).unwrap(), "old");

        let mut staging = StagingArea::new();
        access.stage(&mut staging, &5, &"new".to_string()).unwrap();
        db.commit(staging).unwrap();
        assert_eq!(access.read(&StagingArea::new(), &5).unwrap(), "new");
    }

    #[test]
    fn test_item() {
        let tmp = TempDir::new().unwrap();
        let db = Arc::new(Database::open(tmp.path()).unwrap());
        let tips: CachedDbItem<Vec<Hash>> = CachedDbItem::new(db.clone(), "tips");
        let other: CachedDbItem<u64> = CachedDbItem::new(db.clone(), "other");
        let mut staging = StagingArea::new();
        assert_eq!(tips.get(&staging).unwrap(), None);
        tips.stage(&mut staging, &vec![Hash::from_u64_word(3)]).unwrap();
        other.stage(&mut staging, &1).unwrap();
        db.commit(staging).unwrap();
        assert_eq!(tips.read(&StagingArea::new()).unwrap(), vec![Hash::from_u64_word(3)]);
        assert_eq!(other.read(&StagingArea::new()).unwrap(), 1);
    }
}
