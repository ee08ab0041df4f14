//! Reversible UTXO diffs.
//!
//! A diff is a signed multiset of (outpoint, entry) pairs: `remove` holds the
//! negative elements and `add` the positive ones. Composition cancels opposite
//! elements, which makes it associative and lets `reversed()` undo a diff.

use serde::{Deserialize, Serialize};

use crate::tx::{PopulatedTransaction, TransactionOutpoint, UtxoEntry};
use crate::utxo::utxo_error::{UtxoAlgebraError, UtxoResult};
use crate::utxo::UtxoCollection;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoDiff {
    pub add: UtxoCollection,
    pub remove: UtxoCollection,
}

impl UtxoDiff {
    pub fn new(add: UtxoCollection, remove: UtxoCollection) -> Self {
        Self { add, remove }
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }

    /// The diff that undoes this one
    pub fn reversed(&self) -> UtxoDiff {
        Self { add: self.remove.clone(), remove: self.add.clone() }
    }

    pub fn add_entry(&mut self, outpoint: TransactionOutpoint, entry: UtxoEntry) -> UtxoResult<()> {
        if self.remove.contains_entry(&outpoint, &entry) {
            self.remove.remove(&outpoint);
        } else if self.add.contains(&outpoint) {
            return Err(UtxoAlgebraError::DuplicateAddPoint(outpoint));
        } else {
            self.add.insert(outpoint, entry);
        }
        Ok(())
    }

    pub fn remove_entry(&mut self, outpoint: TransactionOutpoint, entry: UtxoEntry) -> UtxoResult<()> {
        match self.add.get(&outpoint) {
            Some(added) if *added == entry => {
                self.add.remove(&outpoint);
            }
            Some(_) => return Err(UtxoAlgebraError::ConflictingRemove(outpoint)),
            None if self.remove.contains(&outpoint) => return Err(UtxoAlgebraError::DuplicateRemovePoint(outpoint)),
            None => {
                self.remove.insert(outpoint, entry);
            }
        }
        Ok(())
    }

    /// Composes `other` on top of `self`: applying the result equals applying `self` then `other`
    pub fn with_diff_in_place(&mut self, other: &UtxoDiff) -> UtxoResult<()> {
        for (outpoint, entry) in other.remove.iter() {
            self.remove_entry(*outpoint, entry.clone())?;
        }
        for (outpoint, entry) in other.add.iter() {
            self.add_entry(*outpoint, entry.clone())?;
        }
        Ok(())
    }

    pub fn with_diff(&self, other: &UtxoDiff) -> UtxoResult<UtxoDiff> {
        let mut clone = self.clone();
        clone.with_diff_in_place(other)?;
        Ok(clone)
    }

    /// Spends the inputs of `tx` and adds its outputs, created at `block_daa_score`
    pub fn add_transaction(&mut self, tx: &PopulatedTransaction, block_daa_score: u64) -> UtxoResult<()> {
        for (input, entry) in tx.populated_inputs() {
            self.remove_entry(input.previous_outpoint, entry.clone())?;
        }
        let is_coinbase = tx.tx.is_coinbase();
        let tx_id = tx.tx.id();
        for (index, output) in tx.tx.outputs.iter().enumerate() {
            let outpoint = TransactionOutpoint::new(tx_id, index as u32);
            let entry = UtxoEntry::new(output.value, output.script_public_key.clone(), block_daa_score, is_coinbase);
            self.add_entry(outpoint, entry)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::ScriptPublicKey;
    use crate::Hash;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn entry(amount: u64) -> UtxoEntry {
        UtxoEntry::new(amount, ScriptPublicKey::from_vec(0, vec![0x51]), 0, false)
    }

    fn outpoint(id: u64) -> TransactionOutpoint {
        TransactionOutpoint::new(Hash::from_u64_word(id), 0)
    }

    /// A random diff valid on top of `state`: spends some existing outputs and creates fresh ones
    fn random_diff(rng: &mut StdRng, state: &UtxoCollection, next_id: &mut u64) -> UtxoDiff {
        let mut diff = UtxoDiff::default();
        for (op, e) in state.iter() {
            if rng.gen_bool(0.3) {
                diff.remove_entry(*op, e.clone()).unwrap();
            }
        }
        for _ in 0..rng.gen_range(0..6) {
            *next_id += 1;
            diff.add_entry(outpoint(*next_id), entry(rng.gen_range(1..1000))).unwrap();
        }
        diff
    }

    #[test]
    fn test_add_then_remove_cancels() {
        let mut diff = UtxoDiff::default();
        diff.add_entry(outpoint(1), entry(5)).unwrap();
        diff.remove_entry(outpoint(1), entry(5)).unwrap();
        assert!(diff.is_empty());

        diff.remove_entry(outpoint(2), entry(5)).unwrap();
        assert_eq!(diff.remove_entry(outpoint(2), entry(5)), Err(UtxoAlgebraError::DuplicateRemovePoint(outpoint(2))));
        diff.add_entry(outpoint(3), entry(1)).unwrap();
        assert_eq!(diff.add_entry(outpoint(3), entry(1)), Err(UtxoAlgebraError::DuplicateAddPoint(outpoint(3))));
        assert_eq!(diff.remove_entry(outpoint(3), entry(2)), Err(UtxoAlgebraError::ConflictingRemove(outpoint(3))));
    }

    #[test]
    fn test_reversed_restores_state() {
        let base: UtxoCollection = (0..5).map(|i| (outpoint(i), entry(i + 1))).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let mut next_id = 100;
        let diff = random_diff(&mut rng, &base, &mut next_id);
        let mut state = base.clone();
        state.apply_diff(&diff).unwrap();
        state.apply_diff(&diff.reversed()).unwrap();
        assert_eq!(state, base);
        assert!(diff.with_diff(&diff.reversed()).unwrap().is_empty());
    }

    #[test]
    fn test_composition_is_associative() {
        let mut rng = StdRng::seed_from_u64(42);
        for round in 0..50 {
            let base: UtxoCollection = (0..rng.gen_range(0..20u64)).map(|i| (outpoint(i), entry(i + 1))).collect();
            let mut next_id = 1_000 * (round + 1);
            let mut state = base.clone();
            let mut diffs = Vec::new();
            for _ in 0..3 {
                let diff = random_diff(&mut rng, &state, &mut next_id);
                state.apply_diff(&diff).unwrap();
                diffs.push(diff);
            }
            let (a, b, c) = (&diffs[0], &diffs[1], &diffs[2]);

            // Applying sequentially equals applying the precomposed diff
            let mut composed_state = base.clone();
            composed_state.apply_diff(&a.with_diff(b).unwrap().with_diff(c).unwrap()).unwrap();
            assert_eq!(composed_state, state);

            let left = a.with_diff(b).unwrap().with_diff(c).unwrap();
            let right = a.with_diff(&b.with_diff(c).unwrap()).unwrap();
            assert_eq!(left, right);
        }
    }
}
