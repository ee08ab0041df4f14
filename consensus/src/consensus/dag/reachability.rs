//! Reachability index
//!
//! Answers "is A an ancestor of B" without walking the DAG. Every block is a
//! node of a spanning tree rooted at [`ORIGIN`] (its tree parent is its
//! selected parent) and carries an interval nested in its tree parent's
//! interval, so tree ancestry is interval containment. DAG ancestry that does
//! not follow the tree is answered through the future covering set of the
//! ancestor: the blocks that merged it, kept sorted by interval start.
//!
//! A block's children are allocated left to right out of its interval, the
//! last slot being reserved for the block itself. When a parent runs out of
//! space, the subtree of the closest ancestor with enough room is
//! reallocated.

use std::collections::HashMap;

use consensus_core::errors::{ConsensusError, ConsensusResult};
use consensus_core::reachability::{Interval, ReachabilityData};
use consensus_core::{Hash, ORIGIN};
use tracing::debug;

use crate::consensus::storage::{ReachabilityStore, ReachabilityStoreReader};

/// Inserts the tree root if the store is empty
pub fn init<S: ReachabilityStore + ?Sized>(store: &mut S) -> ConsensusResult<()> {
    if !store.has_reachability(ORIGIN)? {
        store.set_reachability(ORIGIN, ReachabilityData::new_origin())?;
    }
    Ok(())
}

/// Adds `new_block` as a tree child of `selected_parent` and records it in the
/// future covering set of every other merge set block
pub fn add_block<S: ReachabilityStore + ?Sized>(
    store: &mut S,
    new_block: Hash,
    selected_parent: Hash,
    mergeset_without_selected_parent: &[Hash],
) -> ConsensusResult<()> {
    add_tree_block(store, new_block, selected_parent)?;
    for merged in mergeset_without_selected_parent.iter().copied() {
        insert_to_future_covering_set(store, merged, new_block)?;
    }
    Ok(())
}

/// True if `ancestor` is `descendant` or one of its selected chain ancestors
pub fn is_chain_ancestor_of<S: ReachabilityStoreReader + ?Sized>(store: &S, ancestor: Hash, descendant: Hash) -> ConsensusResult<bool> {
    Ok(store.get_interval(ancestor)?.contains(store.get_interval(descendant)?))
}

pub fn is_strict_chain_ancestor_of<S: ReachabilityStoreReader + ?Sized>(
    store: &S,
    ancestor: Hash,
    descendant: Hash,
) -> ConsensusResult<bool> {
    Ok(ancestor != descendant && is_chain_ancestor_of(store, ancestor, descendant)?)
}

/// True if `ancestor` is in the past of `descendant` or equal to it
pub fn is_dag_ancestor_of<S: ReachabilityStoreReader + ?Sized>(store: &S, ancestor: Hash, descendant: Hash) -> ConsensusResult<bool> {
    let descendant_interval = store.get_interval(descendant)?;
    let ancestor_data = store.get_reachability(ancestor)?;
    if ancestor_data.interval.contains(descendant_interval) {
        return Ok(true);
    }
    // Future covering set members are pairwise tree-disjoint, so only the
    // last one starting at or before the descendant can contain it
    let position = covering_set_position(store, &ancestor_data.future_covering_set, descendant_interval)?;
    if position == 0 {
        return Ok(false);
    }
    Ok(store.get_interval(ancestor_data.future_covering_set[position - 1])?.contains(descendant_interval))
}

pub fn is_dag_ancestor_of_any<S: ReachabilityStoreReader + ?Sized>(
    store: &S,
    ancestor: Hash,
    descendants: impl IntoIterator<Item = Hash>,
) -> ConsensusResult<bool> {
    for descendant in descendants {
        if is_dag_ancestor_of(store, ancestor, descendant)? {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn is_any_dag_ancestor<S: ReachabilityStoreReader + ?Sized>(
    store: &S,
    ancestors: impl IntoIterator<Item = Hash>,
    descendant: Hash,
) -> ConsensusResult<bool> {
    for ancestor in ancestors {
        if is_dag_ancestor_of(store, ancestor, descendant)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// The tree child of `ancestor` on the selected chain leading to `descendant`
pub fn get_next_chain_ancestor<S: ReachabilityStoreReader + ?Sized>(
    store: &S,
    descendant: Hash,
    ancestor: Hash,
) -> ConsensusResult<Hash> {
    let descendant_interval = store.get_interval(descendant)?;
    let children = store.get_reachability(ancestor)?.children;
    let position = covering_set_position(store, &children, descendant_interval)?;
    if position > 0 {
        let candidate = children[position - 1];
        if store.get_interval(candidate)?.contains(descendant_interval) {
            return Ok(candidate);
        }
    }
    Err(ConsensusError::Reachability(format!("{ancestor} is not a strict chain ancestor of {descendant}")))
}

/// Number of entries of `sorted` (ordered by interval start) starting at or before `interval`
fn covering_set_position<S: ReachabilityStoreReader + ?Sized>(store: &S, sorted: &[Hash], interval: Interval) -> ConsensusResult<usize> {
    let (mut low, mut high) = (0usize, sorted.len());
    while low < high {
        let mid = (low + high) / 2;
        if store.get_interval(sorted[mid])?.start <= interval.start {
            low = mid + 1;
        } else {
            high = mid;
        }
    }
    Ok(low)
}

fn insert_to_future_covering_set<S: ReachabilityStore + ?Sized>(store: &mut S, merged: Hash, new_block: Hash) -> ConsensusResult<()> {
    let new_interval = store.get_interval(new_block)?;
    let mut data = store.get_reachability(merged)?;
    let position = covering_set_position(store, &data.future_covering_set, new_interval)?;
    if position > 0 && store.get_interval(data.future_covering_set[position - 1])?.contains(new_interval) {
        // Already covered by a tree ancestor of the new block
        return Ok(());
    }
    data.future_covering_set.insert(position, new_block);
    store.set_reachability(merged, data)
}

/// Space left for new children: after the last child, excluding the slot of the block itself
fn remaining_interval<S: ReachabilityStoreReader + ?Sized>(store: &S, data: &ReachabilityData) -> ConsensusResult<Interval> {
    let start = match data.children.last() {
        Some(last_child) => store.get_interval(*last_child)?.end + 1,
        None => data.interval.start,
    };
    let end = data.interval.end.saturating_sub(1);
    if end + 1 < start {
        return Ok(Interval::empty());
    }
    Ok(Interval::new(start, end))
}

fn add_tree_block<S: ReachabilityStore + ?Sized>(store: &mut S, new_block: Hash, parent: Hash) -> ConsensusResult<()> {
    let mut parent_data = store.get_reachability(parent)?;
    let mut remaining = remaining_interval(store, &parent_data)?;
    if remaining.is_empty() {
        reindex(store, parent)?;
        parent_data = store.get_reachability(parent)?;
        remaining = remaining_interval(store, &parent_data)?;
        if remaining.is_empty() {
            return Err(ConsensusError::Reachability(format!("no interval space under {parent} after reindexing")));
        }
    }
    let (allocated, _) = remaining.split_half();
    parent_data.children.push(new_block);
    store.set_reachability(parent, parent_data)?;
    store.set_reachability(new_block, ReachabilityData::new(parent, allocated))
}

/// Makes room for one more child of `parent` by reallocating the subtree of
/// the lowest ancestor whose interval is large enough
fn reindex<S: ReachabilityStore + ?Sized>(store: &mut S, parent: Hash) -> ConsensusResult<()> {
    let mut sizes: HashMap<Hash, u64> = HashMap::new();
    let mut path = Vec::new();
    let mut fallback = None;
    let mut current = parent;
    let root = loop {
        // One more slot for the block being inserted under `parent`
        let required = subtree_size(store, current, &mut sizes)? + 1;
        let size = store.get_interval(current)?.size();
        if size >= 2 * required {
            break current;
        }
        if size >= required && fallback.is_none() {
            fallback = Some((current, path.len()));
        }
        if current == ORIGIN {
            match fallback {
                Some((block, path_len)) => {
                    path.truncate(path_len);
                    break block;
                }
                None => return Err(ConsensusError::Reachability("interval space exhausted at the tree root".to_string())),
            }
        }
        path.push(current);
        current = store.get_reachability(current)?.parent;
    };

    // Blocks strictly below the reindex root on the way to `parent` carry the pending insertion
    for block in path.iter() {
        if let Some(size) = sizes.get_mut(block) {
            *size += 1;
        }
    }
    debug!("reachability reindex of {} blocks rooted at {} to make room under {}", sizes.get(&root).copied().unwrap_or_default(), root, parent);
    reallocate_subtree(store, root, parent, &sizes)
}

/// Sizes of the subtrees rooted at `root` and at each of its descendants
fn subtree_size<S: ReachabilityStoreReader + ?Sized>(store: &S, root: Hash, sizes: &mut HashMap<Hash, u64>) -> ConsensusResult<u64> {
    if let Some(size) = sizes.get(&root) {
        return Ok(*size);
    }
    let mut stack = vec![(root, false)];
    while let Some((block, children_done)) = stack.pop() {
        if sizes.contains_key(&block) {
            continue;
        }
        let children = store.get_reachability(block)?.children;
        if children_done {
            let size = 1 + children.iter().map(|child| sizes.get(child).copied().unwrap_or_default()).sum::<u64>();
            sizes.insert(block, size);
        } else {
            stack.push((block, true));
            stack.extend(children.into_iter().filter(|child| !sizes.contains_key(child)).map(|child| (child, false)));
        }
    }
    Ok(sizes.get(&root).copied().unwrap_or_default())
}

/// Reassigns the intervals of every strict descendant of `root`, keeping
/// children order, so each block gets at least its subtree size and
/// `pending_parent` keeps one free slot
fn reallocate_subtree<S: ReachabilityStore + ?Sized>(
    store: &mut S,
    root: Hash,
    pending_parent: Hash,
    sizes: &HashMap<Hash, u64>,
) -> ConsensusResult<()> {
    let mut stack = vec![root];
    while let Some(block) = stack.pop() {
        let data = store.get_reachability(block)?;
        if data.children.is_empty() {
            continue;
        }
        let mut child_sizes: Vec<u64> = data.children.iter().map(|child| sizes.get(child).copied().unwrap_or(1)).collect();
        if block == pending_parent {
            child_sizes.push(1);
        }
        let allocation = data.interval.decrease_end(1);
        let pieces = allocation.split_exponential(&child_sizes).ok_or_else(|| {
            ConsensusError::Reachability(format!("interval {} of {} cannot hold its subtree", data.interval, block))
        })?;
        for (child, interval) in data.children.iter().copied().zip(pieces) {
            let mut child_data = store.get_reachability(child)?;
            child_data.interval = interval;
            store.set_reachability(child, child_data)?;
            stack.push(child);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::storage::MemoryReachabilityStore;

    fn h(n: u64) -> Hash {
        Hash::from_le_u64([n, 0, 0, 0])
    }

    #[test]
    fn test_chain_and_fork() {
        let mut store = MemoryReachabilityStore::new();
        init(&mut store).unwrap();
        add_block(&mut store, h(1), ORIGIN, &[]).unwrap();
        add_block(&mut store, h(2), h(1), &[]).unwrap();
        add_block(&mut store, h(3), h(1), &[]).unwrap();
        // 4 selects 2 and merges 3
        add_block(&mut store, h(4), h(2), &[h(3)]).unwrap();

        assert!(is_chain_ancestor_of(&store, h(1), h(4)).unwrap());
        assert!(!is_chain_ancestor_of(&store, h(3), h(4)).unwrap());
        assert!(is_dag_ancestor_of(&store, h(3), h(4)).unwrap());
        assert!(!is_dag_ancestor_of(&store, h(4), h(3)).unwrap());
        assert!(!is_dag_ancestor_of(&store, h(2), h(3)).unwrap());
        assert!(is_dag_ancestor_of(&store, h(2), h(2)).unwrap());
        assert_eq!(get_next_chain_ancestor(&store, h(4), h(1)).unwrap(), h(2));
        assert!(get_next_chain_ancestor(&store, h(3), h(2)).is_err());
    }

    #[test]
    fn test_long_chain_forces_reindex() {
        let mut store = MemoryReachabilityStore::new();
        init(&mut store).unwrap();
        let mut parent = ORIGIN;
        for i in 1..=500 {
            add_block(&mut store, h(i), parent, &[]).unwrap();
            parent = h(i);
        }
        for i in (1..=500).step_by(37) {
            assert!(is_chain_ancestor_of(&store, h(i), h(500)).unwrap());
            assert!(!is_chain_ancestor_of(&store, h(500), h(i)).unwrap());
        }
        // Intervals stay nested after reindexing
        for i in 2..=500 {
            let parent_interval = store.get_interval(h(i - 1)).unwrap();
            assert!(parent_interval.strictly_contains(store.get_interval(h(i)).unwrap()));
        }
    }

    #[test]
    fn test_covering_set_skips_covered_blocks() {
        let mut store = MemoryReachabilityStore::new();
        init(&mut store).unwrap();
        add_block(&mut store, h(1), ORIGIN, &[]).unwrap();
        add_block(&mut store, h(2), h(1), &[]).unwrap();
        add_block(&mut store, h(3), h(1), &[]).unwrap();
        add_block(&mut store, h(4), h(2), &[h(3)]).unwrap();
        add_block(&mut store, h(5), h(4), &[]).unwrap();
        // 6 is a tree descendant of 4 which already covers 3
        add_block(&mut store, h(6), h(5), &[h(3)]).unwrap();
        assert_eq!(store.get_reachability(h(3)).unwrap().future_covering_set, vec![h(4)]);
        assert!(is_dag_ancestor_of(&store, h(3), h(6)).unwrap());
    }
}
