//! GHOSTDAG data types shared by the storage layer and the consensus engine.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::{BlockHashMap, BlueWorkType, Hash, KType};

/// The GHOSTDAG result of a single block.
///
/// `mergeset_blues` starts with the selected parent and then lists the other
/// blue merge set blocks in topological (ascending blue work) order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GhostdagData {
    pub blue_score: u64,
    pub blue_work: BlueWorkType,
    pub selected_parent: Hash,
    pub mergeset_blues: Vec<Hash>,
    pub mergeset_reds: Vec<Hash>,
    /// Anticone sizes, relative to this block, of blues in the merge set and of
    /// blues whose anticone grew because of it
    pub blues_anticone_sizes: BlockHashMap<KType>,
}

/// The part of [`GhostdagData`] needed for chain selection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactGhostdagData {
    pub blue_score: u64,
    pub blue_work: BlueWorkType,
    pub selected_parent: Hash,
}

impl GhostdagData {
    pub fn new(
        blue_score: u64,
        blue_work: BlueWorkType,
        selected_parent: Hash,
        mergeset_blues: Vec<Hash>,
        mergeset_reds: Vec<Hash>,
        blues_anticone_sizes: BlockHashMap<KType>,
    ) -> Self {
        Self { blue_score, blue_work, selected_parent, mergeset_blues, mergeset_reds, blues_anticone_sizes }
    }

    /// Data of a block with no merge set, whose score and work are taken as given.
    /// Used for genesis and for the trusted roots of a pruning proof.
    pub fn new_trusted_root(blue_score: u64, blue_work: BlueWorkType) -> Self {
        Self::new(blue_score, blue_work, crate::ORIGIN, Vec::new(), Vec::new(), BlockHashMap::new())
    }

    /// Starting point of the GHOSTDAG computation of a block whose selected parent is `selected_parent`
    pub fn new_with_selected_parent(selected_parent: Hash, k: KType) -> Self {
        let mut mergeset_blues: Vec<Hash> = Vec::with_capacity((k + 1) as usize);
        let mut blues_anticone_sizes: BlockHashMap<KType> = BlockHashMap::with_capacity(k as usize);
        mergeset_blues.push(selected_parent);
        blues_anticone_sizes.insert(selected_parent, 0);
        Self::new(Default::default(), Default::default(), selected_parent, mergeset_blues, Vec::new(), blues_anticone_sizes)
    }

    pub fn mergeset_size(&self) -> usize {
        self.mergeset_blues.len() + self.mergeset_reds.len()
    }

    /// Merge set blocks in consensus order: selected parent first, then the other blues, then the reds
    pub fn consensus_ordered_mergeset(&self) -> impl Iterator<Item = Hash> + '_ {
        self.mergeset_blues.iter().chain(self.mergeset_reds.iter()).copied()
    }

    pub fn unordered_mergeset_without_selected_parent(&self) -> impl Iterator<Item = Hash> + '_ {
        self.mergeset_blues.iter().skip(1).chain(self.mergeset_reds.iter()).copied()
    }

    pub fn add_blue(&mut self, block: Hash, blue_anticone_size: KType, block_blues_anticone_sizes: &BlockHashMap<KType>) {
        self.mergeset_blues.push(block);
        self.blues_anticone_sizes.insert(block, blue_anticone_size);
        for (blue, size) in block_blues_anticone_sizes {
            self.blues_anticone_sizes.insert(*blue, size + 1);
        }
    }

    pub fn add_red(&mut self, block: Hash) {
        self.mergeset_reds.push(block);
    }

    pub fn finalize_score_and_work(&mut self, blue_score: u64, blue_work: BlueWorkType) {
        self.blue_score = blue_score;
        self.blue_work = blue_work;
    }

    pub fn to_compact(&self) -> CompactGhostdagData {
        CompactGhostdagData { blue_score: self.blue_score, blue_work: self.blue_work, selected_parent: self.selected_parent }
    }
}

/// A block hash ordered by chain-selection preference.
///
/// Ascending order is ascending blue work; among equal work the block with the
/// *lower* hash ranks higher, so `max()` picks the preferred block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SortableBlock {
    pub hash: Hash,
    pub blue_work: BlueWorkType,
}

impl SortableBlock {
    pub fn new(hash: Hash, blue_work: BlueWorkType) -> Self {
        Self { hash, blue_work }
    }
}

impl PartialOrd for SortableBlock {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortableBlock {
    fn cmp(&self, other: &Self) -> Ordering {
        self.blue_work.cmp(&other.blue_work).then_with(|| other.hash.cmp(&self.hash))
    }
}
