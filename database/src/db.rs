use crate::cache::CacheEviction;
use crate::errors::{DbError, DbResult};
use crate::staging::StagingArea;
use parking_lot::{RwLock, RwLockReadGuard};
use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

pub const CF_HEADERS: &str = "headers";
pub const CF_BLOCK_TRANSACTIONS: &str = "block_transactions";
pub const CF_GHOSTDAG: &str = "ghostdag";
pub const CF_REACHABILITY: &str = "reachability";
pub const CF_RELATIONS_PARENTS: &str = "relations_parents";
pub const CF_RELATIONS_CHILDREN: &str = "relations_children";
pub const CF_STATUSES: &str = "statuses";
pub const CF_UTXO_DIFFS: &str = "utxo_diffs";
pub const CF_ACCEPTANCE_DATA: &str = "acceptance_data";
pub const CF_UTXO_SET: &str = "utxo_set";
pub const CF_PRUNING_UTXO_SET: &str = "pruning_utxo_set";
pub const CF_SELECTED_CHAIN_HASH: &str = "selected_chain_hash";
pub const CF_SELECTED_CHAIN_INDEX: &str = "selected_chain_index";
pub const CF_METADATA: &str = "metadata";

pub const ALL_COLUMN_FAMILIES: [&str; 14] = [
    CF_HEADERS,
    CF_BLOCK_TRANSACTIONS,
    CF_GHOSTDAG,
    CF_REACHABILITY,
    CF_RELATIONS_PARENTS,
    CF_RELATIONS_CHILDREN,
    CF_STATUSES,
    CF_UTXO_DIFFS,
    CF_ACCEPTANCE_DATA,
    CF_UTXO_SET,
    CF_PRUNING_UTXO_SET,
    CF_SELECTED_CHAIN_HASH,
    CF_SELECTED_CHAIN_INDEX,
    CF_METADATA,
];

// Bounds used to wipe a whole column family. Keys are never longer than 64 bytes.
const RANGE_FIRST_KEY: &[u8] = &[];
const RANGE_LAST_KEY: &[u8] = &[0xff; 64];

type CacheRegistry = HashMap<&'static str, Vec<Arc<dyn CacheEviction>>>;

pub struct Database {
    db: Arc<DB>,
    is_closed: Arc<RwLock<bool>>,
    caches: Arc<RwLock<CacheRegistry>>,
    // Held for reading while a row travels from disk into a cache, and for
    // writing while a commit lands and evicts, so no stale row is re-cached.
    commit_lock: Arc<RwLock<()>>,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(10000);
        opts.set_keep_log_file_num(10);
        opts.set_max_background_jobs(4);
        opts.set_bytes_per_sync(1048576);
        opts.increase_parallelism(4);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts.set_write_buffer_size(64 * 1024 * 1024);
        opts.set_max_write_buffer_number(3);

        let cf_descriptors: Vec<_> =
            ALL_COLUMN_FAMILIES.iter().map(|name| ColumnFamilyDescriptor::new(*name, Options::default())).collect();

        let db = DB::open_cf_descriptors(&opts, path.as_ref(), cf_descriptors)?;
        info!("Opened consensus database at {}", path.as_ref().display());
        Ok(Self {
            db: Arc::new(db),
            is_closed: Arc::new(RwLock::new(false)),
            caches: Default::default(),
            commit_lock: Default::default(),
        })
    }

    fn check_closed(&self) -> DbResult<()> {
        if *self.is_closed.read() {
            return Err(DbError::DatabaseClosed);
        }
        Ok(())
    }

    fn get_cf_handle(&self, cf_name: &str) -> DbResult<&rocksdb::ColumnFamily> {
        self.db.cf_handle(cf_name).ok_or_else(|| DbError::ColumnFamilyNotFound(cf_name.to_string()))
    }

    pub fn get(&self, cf_name: &str, key: &[u8]) -> DbResult<Option<Vec<u8>>> {
        self.check_closed()?;
        let cf = self.get_cf_handle(cf_name)?;
        Ok(self.db.get_cf(cf, key)?)
    }

    pub fn exists(&self, cf_name: &str, key: &[u8]) -> DbResult<bool> {
        self.check_closed()?;
        let cf = self.get_cf_handle(cf_name)?;
        Ok(self.db.get_pinned_cf(cf, key)?.is_some())
    }

    pub fn iterator(&self, cf_name: &str, mode: IteratorMode) -> DbResult<rocksdb::DBIteratorWithThreadMode<'_, DB>> {
        self.check_closed()?;
        let cf = self.get_cf_handle(cf_name)?;
        Ok(self.db.iterator_cf(cf, mode))
    }

    /// Registers a cache whose rows must be invalidated when `cf` changes
    pub fn register_cache(&self, cf: &'static str, cache: Arc<dyn CacheEviction>) {
        self.caches.write().entry(cf).or_default().push(cache);
    }

    pub(crate) fn read_guard(&self) -> RwLockReadGuard<'_, ()> {
        self.commit_lock.read()
    }

    /// Atomically writes every shard of `staging` and invalidates the affected cache rows
    pub fn commit(&self, staging: StagingArea) -> DbResult<()> {
        self.check_closed()?;
        let mut batch = WriteBatch::default();
        for (cf_name, shard) in staging.shards() {
            let cf = self.get_cf_handle(cf_name)?;
            if shard.is_cleared() {
                batch.delete_range_cf(cf, RANGE_FIRST_KEY, RANGE_LAST_KEY);
            }
            for (key, value) in shard.entries() {
                match value {
                    Some(value) => batch.put_cf(cf, key, value),
                    None => batch.delete_cf(cf, key),
                }
            }
        }

        let _guard = self.commit_lock.write();
        self.db.write(batch)?;
        let caches = self.caches.read();
        for (cf_name, shard) in staging.shards() {
            let Some(cf_caches) = caches.get(*cf_name) else { continue };
            for cache in cf_caches {
                if shard.is_cleared() {
                    cache.evict_all();
                } else {
                    shard.entries().for_each(|(key, _)| cache.evict(key));
                }
            }
        }
        debug!("Committed {} staged rows", staging.len());
        Ok(())
    }

    pub fn close(&self) {
        *self.is_closed.write() = true;
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            is_closed: self.is_closed.clone(),
            caches: self.caches.clone(),
            commit_lock: self.commit_lock.clone(),
        }
    }
}
