//! In-memory transactional overlay over the column families.
//!
//! A staging area holds one shard per column family. Reads through a
//! [`crate::CachedDbAccess`] see staged rows first and fall back to the
//! committed database. Nothing reaches disk until [`crate::Database::commit`]
//! writes every shard in a single batch; dropping the staging area discards it.

use std::collections::HashMap;

/// Pending writes of a single column family
#[derive(Default, Debug, Clone)]
pub struct StagingShard {
    /// `None` marks a staged delete
    entries: HashMap<Vec<u8>, Option<Vec<u8>>>,
    /// The whole column family is wiped before `entries` apply
    cleared: bool,
}

impl StagingShard {
    pub fn entries(&self) -> impl Iterator<Item = (&Vec<u8>, &Option<Vec<u8>>)> {
        self.entries.iter()
    }

    pub fn is_cleared(&self) -> bool {
        self.cleared
    }
}

/// Result of looking a key up in the staging area
#[derive(Debug, PartialEq, Eq)]
pub enum StagedValue<'a> {
    Present(&'a [u8]),
    Deleted,
    NotStaged,
}

#[derive(Default, Debug)]
pub struct StagingArea {
    shards: HashMap<&'static str, StagingShard>,
}

impl StagingArea {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&mut self, cf: &'static str, key: Vec<u8>, value: Vec<u8>) {
        self.shards.entry(cf).or_default().entries.insert(key, Some(value));
    }

    pub fn stage_delete(&mut self, cf: &'static str, key: Vec<u8>) {
        self.shards.entry(cf).or_default().entries.insert(key, None);
    }

    /// Stages the removal of every row of `cf`, including rows staged so far
    pub fn stage_clear(&mut self, cf: &'static str) {
        let shard = self.shards.entry(cf).or_default();
        shard.entries.clear();
        shard.cleared = true;
    }

    pub fn get(&self, cf: &'static str, key: &[u8]) -> StagedValue<'_> {
        match self.shards.get(cf) {
            Some(shard) => match shard.entries.get(key) {
                Some(Some(value)) => StagedValue::Present(value),
                Some(None) => StagedValue::Deleted,
                None if shard.cleared => StagedValue::Deleted,
                None => StagedValue::NotStaged,
            },
            None => StagedValue::NotStaged,
        }
    }

    pub fn is_staged(&self, cf: &'static str, key: &[u8]) -> bool {
        !matches!(self.get(cf, key), StagedValue::NotStaged)
    }

    pub fn shards(&self) -> impl Iterator<Item = (&&'static str, &StagingShard)> {
        self.shards.iter()
    }

    pub fn shard(&self, cf: &'static str) -> Option<&StagingShard> {
        self.shards.get(cf)
    }

    pub fn is_empty(&self) -> bool {
        self.shards.values().all(|shard| shard.entries.is_empty() && !shard.cleared)
    }

    /// Number of staged rows over all shards
    pub fn len(&self) -> usize {
        self.shards.values().map(|shard| shard.entries.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staged_lookup() {
        let mut staging = StagingArea::new();
        assert!(staging.is_empty());
        staging.stage("a", b"k1".to_vec(), b"v1".to_vec());
        staging.stage_delete("a", b"k2".to_vec());
        assert_eq!(staging.get("a", b"k1"), StagedValue::Present(b"v1"));
        assert_eq!(staging.get("a", b"k2"), StagedValue::Deleted);
        assert_eq!(staging.get("a", b"k3"), StagedValue::NotStaged);
        assert_eq!(staging.get("b", b"k1"), StagedValue::NotStaged);
        assert!(staging.is_staged("a", b"k2"));
        assert_eq!(staging.len(), 2);

        // Re-staging overrides the previous value
        staging.stage("a", b"k2".to_vec(), b"v2".to_vec());
        assert_eq!(staging.get("a", b"k2"), StagedValue::Present(b"v2"));
    }

    #[test]
    fn test_clear_shard() {
        let mut staging = StagingArea::new();
        staging.stage("a", b"k1".to_vec(), b"v1".to_vec());
        staging.stage_clear("a");
        assert_eq!(staging.get("a", b"k1"), StagedValue::Deleted);
        assert_eq!(staging.get("a", b"other"), StagedValue::Deleted);
        staging.stage("a", b"k1".to_vec(), b"v3".to_vec());
        assert_eq!(staging.get("a", b"k1"), StagedValue::Present(b"v3"));
        assert!(!staging.is_empty());
    }
}
