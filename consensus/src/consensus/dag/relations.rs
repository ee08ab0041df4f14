//! Walks over the parent links of the DAG

use std::collections::{HashSet, VecDeque};

use consensus_core::errors::ConsensusResult;
use consensus_core::Hash;

use crate::consensus::storage::RelationsStoreReader;

/// Breadth-first walk over the past of `start`, `start` included.
///
/// `visit` is called once per reached block and returns whether the walk
/// should continue into that block's parents. Parents without relations
/// (beyond the retained history) are not visited.
pub fn traverse_past<S, F>(store: &S, start: impl IntoIterator<Item = Hash>, mut visit: F) -> ConsensusResult<()>
where
    S: RelationsStoreReader + ?Sized,
    F: FnMut(Hash) -> ConsensusResult<bool>,
{
    let mut queue: VecDeque<Hash> = VecDeque::new();
    let mut visited: HashSet<Hash> = HashSet::new();
    for block in start {
        if visited.insert(block) {
            queue.push_back(block);
        }
    }
    while let Some(block) = queue.pop_front() {
        if !visit(block)? {
            continue;
        }
        for parent in store.get_parents(block)?.iter().copied() {
            if visited.insert(parent) && store.has_relations(parent)? {
                queue.push_back(parent);
            }
        }
    }
    Ok(())
}

/// The tips after adding `new_block`: its parents stop being tips
pub fn tips_with_new_block(tips: &[Hash], new_block: Hash, parents: &[Hash]) -> Vec<Hash> {
    let mut new_tips: Vec<Hash> = tips.iter().copied().filter(|tip| !parents.contains(tip) && *tip != new_block).collect();
    new_tips.push(new_block);
    new_tips
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::storage::MemoryRelationsStore;

    fn h(n: u64) -> Hash {
        Hash::from_le_u64([n, 0, 0, 0])
    }

    #[test]
    fn test_traverse_past_stops_where_asked() {
        let mut relations = MemoryRelationsStore::new();
        relations.insert(h(1), vec![]);
        relations.insert(h(2), vec![h(1)]);
        relations.insert(h(3), vec![h(1)]);
        relations.insert(h(4), vec![h(2), h(3)]);
        relations.insert(h(5), vec![h(4)]);

        let mut seen = Vec::new();
        traverse_past(&relations, [h(5)], |block| {
            seen.push(block);
            Ok(true)
        })
        .unwrap();
        seen.sort();
        assert_eq!(seen, vec![h(1), h(2), h(3), h(4), h(5)]);

        let mut seen = HashSet::new();
        traverse_past(&relations, [h(5)], |block| {
            seen.insert(block);
            Ok(block != h(4))
        })
        .unwrap();
        assert_eq!(seen, HashSet::from([h(5), h(4)]));
    }

    #[test]
    fn test_tips_with_new_block() {
        let tips = vec![h(2), h(3), h(7)];
        assert_eq!(tips_with_new_block(&tips, h(8), &[h(2), h(3)]), vec![h(7), h(8)]);
    }
}
