use std::collections::{HashSet, VecDeque};

use consensus_core::difficulty::calc_work;
use consensus_core::errors::{ConsensusError, ConsensusResult};
use consensus_core::ghostdag::{GhostdagData, SortableBlock};
use consensus_core::{BlockHashMap, BlueWorkType, Hash, KType, ORIGIN};
use tracing::trace;

use crate::consensus::dag::reachability;
use crate::consensus::storage::{DagStoreReader, GhostdagStoreReader};

/// Computes the GHOSTDAG coloring of new blocks.
///
/// The manager is stateless apart from K; every call reads the DAG through the
/// store it is handed, so the same code colors staged blocks, the virtual
/// block and the headers of a pruning proof.
#[derive(Clone, Copy, Debug)]
pub struct GhostdagManager {
    k: KType,
}

impl GhostdagManager {
    pub fn new(k: KType) -> Self {
        Self { k }
    }

    pub fn k(&self) -> KType {
        self.k
    }

    /// Genesis has no merge set; its score is zero and its work is its own work
    pub fn genesis_ghostdag_data(&self, bits: u32) -> GhostdagData {
        GhostdagData::new_trusted_root(0, calc_work(bits))
    }

    /// The parent with the highest blue work, ties broken towards the lower hash
    pub fn find_selected_parent<S: GhostdagStoreReader + ?Sized>(
        &self,
        store: &S,
        parents: impl IntoIterator<Item = Hash>,
    ) -> ConsensusResult<Hash> {
        let mut best: Option<SortableBlock> = None;
        for parent in parents {
            let candidate = SortableBlock::new(parent, store.get_blue_work(parent)?);
            if best.map_or(true, |b| candidate > b) {
                best = Some(candidate);
            }
        }
        best.map(|b| b.hash).ok_or_else(|| ConsensusError::Internal("cannot select a parent out of an empty set".into()))
    }

    /// Sorts blocks by ascending blue work (ties towards the higher hash first)
    pub fn sort_blocks<S: GhostdagStoreReader + ?Sized>(
        &self,
        store: &S,
        blocks: impl IntoIterator<Item = Hash>,
    ) -> ConsensusResult<Vec<Hash>> {
        let mut sortable =
            blocks.into_iter().map(|hash| Ok(SortableBlock::new(hash, store.get_blue_work(hash)?))).collect::<ConsensusResult<Vec<_>>>()?;
        sortable.sort();
        Ok(sortable.into_iter().map(|b| b.hash).collect())
    }

    /// The blocks in the past of `parents` but not in the past of `selected_parent`
    /// (nor the selected parent itself), in ascending [`SortableBlock`] order
    pub fn ordered_mergeset_without_selected_parent<S: DagStoreReader + ?Sized>(
        &self,
        store: &S,
        selected_parent: Hash,
        parents: &[Hash],
    ) -> ConsensusResult<Vec<Hash>> {
        let mut queue: VecDeque<Hash> = VecDeque::new();
        let mut mergeset: HashSet<Hash> = HashSet::new();
        let mut past: HashSet<Hash> = HashSet::new();

        for parent in parents.iter().copied().filter(|p| *p != selected_parent) {
            if mergeset.contains(&parent) || past.contains(&parent) {
                continue;
            }
            if reachability::is_dag_ancestor_of(store, parent, selected_parent)? {
                past.insert(parent);
                continue;
            }
            mergeset.insert(parent);
            queue.push_back(parent);
        }

        while let Some(current) = queue.pop_front() {
            for parent in store.get_parents(current)?.iter().copied() {
                if mergeset.contains(&parent) || past.contains(&parent) {
                    continue;
                }
                if reachability::is_dag_ancestor_of(store, parent, selected_parent)? {
                    past.insert(parent);
                    continue;
                }
                mergeset.insert(parent);
                queue.push_back(parent);
            }
        }

        self.sort_blocks(store, mergeset)
    }

    /// Runs GHOSTDAG over `parents` and returns the data of a new block.
    ///
    /// The merge set is colored in topological order. A candidate becomes blue
    /// if, with it added, no blue block has more than K blues in its anticone:
    ///
    /// 1) |anticone(candidate) ∩ blues| ≤ K
    ///
    /// 2) for every blue b: |anticone(b) ∩ (blues ∪ {candidate})| ≤ K
    ///
    /// `own_work` is the proof-of-work of the new block itself (zero for the
    /// virtual block) and is added to its blue work.
    pub fn ghostdag<S: DagStoreReader + ?Sized>(
        &self,
        store: &S,
        parents: &[Hash],
        own_work: BlueWorkType,
    ) -> ConsensusResult<GhostdagData> {
        if parents.is_empty() {
            return Err(ConsensusError::Internal("genesis must be initialized, not colored".into()));
        }
        let selected_parent = self.find_selected_parent(store, parents.iter().copied())?;
        let mut new_block_data = GhostdagData::new_with_selected_parent(selected_parent, self.k);
        let ordered_mergeset = self.ordered_mergeset_without_selected_parent(store, selected_parent, parents)?;

        for blue_candidate in ordered_mergeset.iter().copied() {
            match self.check_blue_candidate(store, &new_block_data, blue_candidate)? {
                ColoringOutput::Blue(blue_anticone_size, blues_anticone_sizes) => {
                    new_block_data.add_blue(blue_candidate, blue_anticone_size, &blues_anticone_sizes)
                }
                ColoringOutput::Red => new_block_data.add_red(blue_candidate),
            }
        }

        let parent_data = store.get_ghostdag_data(selected_parent)?;
        let blue_score = parent_data.blue_score + new_block_data.mergeset_blues.len() as u64;
        let mut blue_work = parent_data.blue_work;
        for blue in new_block_data.mergeset_blues.iter().skip(1).copied() {
            blue_work += calc_work(store.get_bits(blue)?);
        }
        blue_work += own_work;
        new_block_data.finalize_score_and_work(blue_score, blue_work);
        Ok(new_block_data)
    }

    fn check_blue_candidate_with_chain_block<S: DagStoreReader + ?Sized>(
        &self,
        store: &S,
        new_block_data: &GhostdagData,
        chain_block: &ChainBlock,
        blue_candidate: Hash,
        candidate_blues_anticone_sizes: &mut BlockHashMap<KType>,
        candidate_blue_anticone_size: &mut KType,
    ) -> ConsensusResult<ColoringState> {
        // Once the candidate is in the future of a chain block, all blues still
        // to be visited are in its past and cannot be in its anticone
        if let Some(hash) = chain_block.hash {
            if reachability::is_dag_ancestor_of(store, hash, blue_candidate)? {
                return Ok(ColoringState::Blue);
            }
        }

        for block in chain_block.data.mergeset_blues.iter().copied() {
            if reachability::is_dag_ancestor_of(store, block, blue_candidate)? {
                continue;
            }

            let block_anticone_size = self.blue_anticone_size(store, block, new_block_data)?;
            candidate_blues_anticone_sizes.insert(block, block_anticone_size);

            *candidate_blue_anticone_size += 1;
            if *candidate_blue_anticone_size > self.k {
                trace!("candidate {} is red: its blue anticone exceeds k", blue_candidate);
                return Ok(ColoringState::Red);
            }

            if block_anticone_size == self.k {
                trace!("candidate {} is red: blue {} already has k blues in its anticone", blue_candidate, block);
                return Ok(ColoringState::Red);
            }

            if block_anticone_size > self.k {
                return Err(ConsensusError::Internal(format!("blue block {block} has a blue anticone larger than k")));
            }
        }

        Ok(ColoringState::Pending)
    }

    /// The blue anticone size of `block` from the worldview of `context`.
    /// `block` must be in the blue set of `context`.
    fn blue_anticone_size<S: GhostdagStoreReader + ?Sized>(
        &self,
        store: &S,
        block: Hash,
        context: &GhostdagData,
    ) -> ConsensusResult<KType> {
        if let Some(size) = context.blues_anticone_sizes.get(&block) {
            return Ok(*size);
        }
        let mut current = context.selected_parent;
        loop {
            if current == ORIGIN {
                return Err(ConsensusError::Internal(format!("block {block} is not in the blue set of the given context")));
            }
            let data = store.get_ghostdag_data(current)?;
            if let Some(size) = data.blues_anticone_sizes.get(&block) {
                return Ok(*size);
            }
            current = data.selected_parent;
        }
    }

    pub fn check_blue_candidate<S: DagStoreReader + ?Sized>(
        &self,
        store: &S,
        new_block_data: &GhostdagData,
        blue_candidate: Hash,
    ) -> ConsensusResult<ColoringOutput> {
        // The selected parent is counted in the merge set blues, so K+1 means full
        if new_block_data.mergeset_blues.len() as u64 == self.k as u64 + 1 {
            return Ok(ColoringOutput::Red);
        }

        let mut candidate_blues_anticone_sizes: BlockHashMap<KType> = BlockHashMap::with_capacity(self.k as usize);
        let mut candidate_blue_anticone_size: KType = 0;
        let mut chain_block = ChainBlock { hash: None, data: std::borrow::Cow::Borrowed(new_block_data) };

        loop {
            let state = self.check_blue_candidate_with_chain_block(
                store,
                new_block_data,
                &chain_block,
                blue_candidate,
                &mut candidate_blues_anticone_sizes,
                &mut candidate_blue_anticone_size,
            )?;

            match state {
                ColoringState::Blue => return Ok(ColoringOutput::Blue(candidate_blue_anticone_size, candidate_blues_anticone_sizes)),
                ColoringState::Red => return Ok(ColoringOutput::Red),
                ColoringState::Pending => (),
            }

            let selected_parent = chain_block.data.selected_parent;
            if selected_parent == ORIGIN {
                // Walked past the root of the retained DAG without finding a conflict
                return Ok(ColoringOutput::Blue(candidate_blue_anticone_size, candidate_blues_anticone_sizes));
            }
            let data = store.get_ghostdag_data(selected_parent)?;
            chain_block = ChainBlock { hash: Some(selected_parent), data: std::borrow::Cow::Owned((*data).clone()) };
        }
    }
}

/// A block on the selected chain of the block being colored, with its data.
/// `hash` is `None` for the new block itself.
struct ChainBlock<'a> {
    hash: Option<Hash>,
    data: std::borrow::Cow<'a, GhostdagData>,
}

/// Intermediate coloring state of the current candidate
enum ColoringState {
    Blue,
    Red,
    Pending,
}

/// Final coloring of a candidate: its blue anticone size and the updated
/// anticone sizes of the blues it affects, or red
#[derive(Debug)]
pub enum ColoringOutput {
    Blue(KType, BlockHashMap<KType>),
    Red,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::storage::MemoryDagStores;
    use consensus_core::header::Header;
    use std::sync::Arc;

    const BITS: u32 = 0x207f_ffff;

    fn h(n: u64) -> Hash {
        Hash::from_le_u64([n, 0, 0, 0])
    }

    fn add_genesis(stores: &mut MemoryDagStores, manager: &GhostdagManager, genesis: Hash) {
        reachability::init(stores).unwrap();
        reachability::add_block(stores, genesis, ORIGIN, &[]).unwrap();
        stores.relations.insert(genesis, vec![]);
        let mut header = Header::from_precomputed_hash(genesis, vec![]);
        header.bits = BITS;
        stores.headers.insert(Arc::new(header));
        stores.ghostdag.insert(genesis, Arc::new(manager.genesis_ghostdag_data(BITS)));
    }

    fn add_block(stores: &mut MemoryDagStores, manager: &GhostdagManager, hash: Hash, parents: Vec<Hash>) -> Arc<GhostdagData> {
        add_block_with_work(stores, manager, hash, parents, calc_work(BITS))
    }

    fn add_block_with_work(
        stores: &mut MemoryDagStores,
        manager: &GhostdagManager,
        hash: Hash,
        parents: Vec<Hash>,
        own_work: BlueWorkType,
    ) -> Arc<GhostdagData> {
        let data = Arc::new(manager.ghostdag(stores, &parents, own_work).unwrap());
        let mergeset: Vec<Hash> = data.unordered_mergeset_without_selected_parent().collect();
        reachability::add_block(stores, hash, data.selected_parent, &mergeset).unwrap();
        stores.relations.insert(hash, parents.clone());
        let mut header = Header::from_precomputed_hash(hash, parents);
        header.bits = BITS;
        stores.headers.insert(Arc::new(header));
        stores.ghostdag.insert(hash, data.clone());
        data
    }

    #[test]
    fn test_chain_and_merge() {
        let manager = GhostdagManager::new(18);
        let mut stores = MemoryDagStores::new();
        add_genesis(&mut stores, &manager, h(1));

        let b2 = add_block(&mut stores, &manager, h(2), vec![h(1)]);
        assert_eq!(b2.selected_parent, h(1));
        assert_eq!(b2.blue_score, 1);
        assert_eq!(b2.blue_work, calc_work(BITS) + calc_work(BITS));

        let b3 = add_block(&mut stores, &manager, h(3), vec![h(2)]);
        let b4 = add_block(&mut stores, &manager, h(4), vec![h(1)]);
        assert_eq!(b3.blue_score, 2);
        assert_eq!(b4.blue_score, 1);

        let merge = add_block(&mut stores, &manager, h(5), vec![h(3), h(4)]);
        assert_eq!(merge.selected_parent, h(3));
        assert_eq!(merge.mergeset_blues, vec![h(3), h(4)]);
        assert!(merge.mergeset_reds.is_empty());
        assert_eq!(merge.blue_score, 4);
        assert_eq!(merge.mergeset_size(), 2);
    }

    #[test]
    fn test_heavier_sibling_is_selected() {
        let manager = GhostdagManager::new(1);
        let mut stores = MemoryDagStores::new();
        add_genesis(&mut stores, &manager, h(1));

        let unit = calc_work(BITS);
        let a = add_block_with_work(&mut stores, &manager, h(2), vec![h(1)], unit + unit + unit);
        let b = add_block_with_work(&mut stores, &manager, h(3), vec![h(1)], unit);
        assert_eq!((a.blue_score, b.blue_score), (1, 1));
        assert!(a.blue_work > b.blue_work);

        // B has the lower hash, so only the extra work makes A the selected parent
        let merge = add_block(&mut stores, &manager, h(4), vec![h(3), h(2)]);
        assert_eq!(merge.selected_parent, h(2));
        assert_eq!(merge.mergeset_blues, vec![h(2), h(3)]);
        assert_eq!(merge.blue_score, 3);
        assert_eq!(merge.blue_work, a.blue_work + unit + unit);
    }

    #[test]
    fn test_k_cluster_violation_is_red() {
        // With K = 1, two side branches cannot be blue next to a selected chain of length two
        let manager = GhostdagManager::new(1);
        let mut stores = MemoryDagStores::new();
        add_genesis(&mut stores, &manager, h(1));

        add_block(&mut stores, &manager, h(2), vec![h(1)]);
        add_block(&mut stores, &manager, h(3), vec![h(2)]);
        add_block(&mut stores, &manager, h(4), vec![h(1)]);
        add_block(&mut stores, &manager, h(5), vec![h(4)]);
        add_block(&mut stores, &manager, h(6), vec![h(1)]);

        let merge = add_block(&mut stores, &manager, h(7), vec![h(3), h(5), h(6)]);
        assert_eq!(merge.mergeset_size(), 4);
        assert!(merge.mergeset_blues.len() <= 2);
        assert_eq!(merge.mergeset_blues, vec![h(3)]);
        assert!(!merge.mergeset_reds.is_empty());
        assert_eq!(merge.blue_score, stores.get_blue_score(merge.selected_parent).unwrap() + merge.mergeset_blues.len() as u64);
    }

    #[test]
    fn test_selected_parent_tie_breaks_on_lower_hash() {
        let manager = GhostdagManager::new(18);
        let mut stores = MemoryDagStores::new();
        add_genesis(&mut stores, &manager, h(1));
        add_block(&mut stores, &manager, h(9), vec![h(1)]);
        add_block(&mut stores, &manager, h(8), vec![h(1)]);
        assert_eq!(manager.find_selected_parent(&stores, [h(9), h(8)]).unwrap(), h(8));
    }

    #[test]
    fn test_empty_parents_is_an_error() {
        let manager = GhostdagManager::new(18);
        let stores = MemoryDagStores::new();
        assert!(matches!(manager.ghostdag(&stores, &[], BlueWorkType::ZERO), Err(ConsensusError::Internal(_))));
    }
}
