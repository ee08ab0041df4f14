use crate::tx::{TransactionOutpoint, UtxoEntry};
use crate::utxo::{UtxoCollection, UtxoDiff};

/// Read access to a UTXO state
pub trait UtxoView {
    fn get(&self, outpoint: &TransactionOutpoint) -> Option<UtxoEntry>;
}

impl UtxoView for UtxoCollection {
    fn get(&self, outpoint: &TransactionOutpoint) -> Option<UtxoEntry> {
        UtxoCollection::get(self, outpoint).cloned()
    }
}

/// A base view with a diff applied on top, without materializing the result
pub struct ComposedUtxoView<'a, V: UtxoView + ?Sized> {
    base: &'a V,
    diff: &'a UtxoDiff,
}

impl<'a, V: UtxoView + ?Sized> ComposedUtxoView<'a, V> {
    pub fn new(base: &'a V, diff: &'a UtxoDiff) -> Self {
        Self { base, diff }
    }
}

impl<V: UtxoView + ?Sized> UtxoView for ComposedUtxoView<'_, V> {
    fn get(&self, outpoint: &TransactionOutpoint) -> Option<UtxoEntry> {
        if let Some(entry) = self.diff.add.get(outpoint) {
            return Some(entry.clone());
        }
        if self.diff.remove.contains(outpoint) {
            return None;
        }
        self.base.get(outpoint)
    }
}
