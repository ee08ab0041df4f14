use std::collections::hash_map::{Entry, Iter};
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::tx::{TransactionOutpoint, UtxoEntry};
use crate::utxo::utxo_error::{UtxoAlgebraError, UtxoResult};
use crate::utxo::UtxoDiff;

/// An in-memory UTXO collection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoCollection {
    utxos: HashMap<TransactionOutpoint, UtxoEntry>,
}

impl UtxoCollection {
    pub fn new() -> Self {
        Self { utxos: HashMap::new() }
    }

    pub fn contains(&self, outpoint: &TransactionOutpoint) -> bool {
        self.utxos.contains_key(outpoint)
    }

    /// True if the outpoint is present with exactly this entry
    pub fn contains_entry(&self, outpoint: &TransactionOutpoint, entry: &UtxoEntry) -> bool {
        self.utxos.get(outpoint) == Some(entry)
    }

    pub fn get(&self, outpoint: &TransactionOutpoint) -> Option<&UtxoEntry> {
        self.utxos.get(outpoint)
    }

    /// Insert a new UTXO entry (overwrites if exists)
    pub fn insert(&mut self, outpoint: TransactionOutpoint, entry: UtxoEntry) {
        self.utxos.insert(outpoint, entry);
    }

    pub fn remove(&mut self, outpoint: &TransactionOutpoint) -> Option<UtxoEntry> {
        self.utxos.remove(outpoint)
    }

    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, TransactionOutpoint, UtxoEntry> {
        self.utxos.iter()
    }

    pub fn entry(&mut self, outpoint: TransactionOutpoint) -> Entry<'_, TransactionOutpoint, UtxoEntry> {
        self.utxos.entry(outpoint)
    }

    /// Returns total supply implied by UTXOs (sum of all utxo amounts)
    pub fn total_supply(&self) -> u128 {
        self.utxos.values().map(|e| e.amount as u128).sum()
    }

    /// Applies `diff` in place. Every removed outpoint must be present and
    /// every added outpoint absent, otherwise nothing is changed.
    pub fn apply_diff(&mut self, diff: &UtxoDiff) -> UtxoResult<()> {
        for outpoint in diff.remove.utxos.keys() {
            if !self.utxos.contains_key(outpoint) {
                return Err(UtxoAlgebraError::MissingOutpoint(*outpoint));
            }
        }
        for outpoint in diff.add.utxos.keys() {
            if self.utxos.contains_key(outpoint) && !diff.remove.contains(outpoint) {
                return Err(UtxoAlgebraError::OutpointAlreadyExists(*outpoint));
            }
        }
        for outpoint in diff.remove.utxos.keys() {
            self.utxos.remove(outpoint);
        }
        for (outpoint, entry) in diff.add.iter() {
            self.utxos.insert(*outpoint, entry.clone());
        }
        Ok(())
    }
}

impl FromIterator<(TransactionOutpoint, UtxoEntry)> for UtxoCollection {
    fn from_iter<T: IntoIterator<Item = (TransactionOutpoint, UtxoEntry)>>(iter: T) -> Self {
        Self { utxos: iter.into_iter().collect() }
    }
}

impl IntoIterator for UtxoCollection {
    type Item = (TransactionOutpoint, UtxoEntry);
    type IntoIter = std::collections::hash_map::IntoIter<TransactionOutpoint, UtxoEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.utxos.into_iter()
    }
}

impl<'a> IntoIterator for &'a UtxoCollection {
    type Item = (&'a TransactionOutpoint, &'a UtxoEntry);
    type IntoIter = Iter<'a, TransactionOutpoint, UtxoEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.utxos.iter()
    }
}
