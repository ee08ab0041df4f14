//! Pruning point proofs
//!
//! A proof is the set of headers in the recent past of the pruning point,
//! deep enough to rebuild GHOSTDAG, difficulty and pruning point windows for
//! the blocks that will follow it. A new node verifies the proof by coloring
//! the headers itself in scratch in-memory stores, then adopts the pruning
//! point as trusted and waits for its UTXO set.

use std::collections::HashSet;
use std::sync::Arc;

use consensus_core::block::Block;
use consensus_core::blockstatus::BlockStatus;
use consensus_core::config::Params;
use consensus_core::difficulty::{calc_work, check_proof_of_work, compact_to_target};
use consensus_core::errors::{ConsensusError, ConsensusResult, PruningProofError};
use consensus_core::ghostdag::{GhostdagData, SortableBlock};
use consensus_core::header::Header;
use consensus_core::pruning::PruningPointProof;
use consensus_core::tx::{TransactionOutpoint, UtxoEntry};
use consensus_core::utxo::{UtxoCollection, UtxoCommitment};
use consensus_core::{BlueWorkType, Hash, ORIGIN};
use database::db::ALL_COLUMN_FAMILIES;
use database::StagingArea;
use primitive_types::U256;
use tracing::{debug, info};

use crate::consensus::dag::{reachability, relations};
use crate::consensus::ghostdag::GhostdagManager;
use crate::consensus::storage::{
    ConsensusStorage, GhostdagStoreReader, HeaderStoreReader, MemoryDagStores, RelationsStoreReader, StagedView,
};
use crate::consensus::validation::BlockValidator;

fn ghostdag_failure(err: ConsensusError) -> PruningProofError {
    PruningProofError::Ghostdag(err.to_string())
}

pub struct PruningProofManager {
    ghostdag_manager: GhostdagManager,
    /// Blue score depth below the pruning point covered by a proof
    window_depth: u64,
    /// Headers a proof must carry unless it reaches genesis
    pruning_proof_m: u64,
    /// Easiest target a proof header may have
    max_target: U256,
    skip_proof_of_work: bool,
    genesis_hash: Hash,
}

impl PruningProofManager {
    pub fn new(params: &Params) -> Self {
        Self {
            ghostdag_manager: GhostdagManager::new(params.ghostdag_k),
            window_depth: params.pruning_proof_window_depth(),
            pruning_proof_m: params.pruning_proof_m,
            max_target: compact_to_target(params.pow_max_bits),
            skip_proof_of_work: params.skip_proof_of_work,
            genesis_hash: params.genesis.hash(),
        }
    }

    /// Headers of the past of `pruning_point` within the proof window, in
    /// ascending blue work order, ending with the pruning point itself
    pub fn generate(&self, view: StagedView, pruning_point: Hash) -> ConsensusResult<PruningPointProof> {
        let min_blue_score = view.get_blue_score(pruning_point)?.saturating_sub(self.window_depth);
        let mut blocks = Vec::new();
        relations::traverse_past(&view, [pruning_point], |block| {
            if view.get_blue_score(block)? < min_blue_score {
                return Ok(false);
            }
            blocks.push(SortableBlock::new(block, view.get_blue_work(block)?));
            Ok(true)
        })?;
        blocks.sort();
        let headers = blocks.into_iter().map(|block| Ok((*view.get_header(block.hash)?).clone())).collect::<ConsensusResult<Vec<Header>>>()?;
        debug!("Generated a pruning proof of {} headers for {}", headers.len(), pruning_point);
        Ok(PruningPointProof::new(pruning_point, headers))
    }

    /// Rebuilds the DAG described by `proof` in scratch stores and checks it.
    ///
    /// Headers with a parent outside the proof are roots: their blue score and
    /// work are taken as claimed. Every other header must claim exactly the
    /// values GHOSTDAG computes over the proof. The proof is compared with
    /// `local_blue_work`, the blue work of the local virtual selected tip, by
    /// the work its headers' difficulty actually carries, never by claims.
    pub fn validate(&self, proof: &PruningPointProof, local_blue_work: BlueWorkType) -> ConsensusResult<MemoryDagStores> {
        let pruning_point_header = proof.pruning_point_header().ok_or(PruningProofError::Empty)?;
        if pruning_point_header.hash != proof.pruning_point {
            return Err(PruningProofError::PruningPointMismatch(proof.pruning_point, pruning_point_header.hash).into());
        }

        let in_proof: HashSet<Hash> = proof.headers.iter().map(|header| header.hash).collect();
        let mut stores = MemoryDagStores::new();
        reachability::init(&mut stores)?;
        let mut verified_work = BlueWorkType::ZERO;

        for header in proof.headers.iter() {
            if !header.is_hash_consistent() {
                return Err(PruningProofError::HashMismatch(header.hash).into());
            }
            if stores.has_header(header.hash)? {
                return Err(PruningProofError::DuplicateHeader(header.hash).into());
            }
            let target = compact_to_target(header.bits);
            if target.is_zero() || target > self.max_target {
                return Err(PruningProofError::InvalidBits(header.hash, header.bits).into());
            }
            if !self.skip_proof_of_work && !check_proof_of_work(header) {
                return Err(PruningProofError::InvalidPoW(header.hash).into());
            }

            let mut parents = Vec::with_capacity(header.direct_parents().len());
            let mut is_root = header.direct_parents().is_empty();
            for parent in header.direct_parents().iter().copied() {
                if !in_proof.contains(&parent) {
                    is_root = true;
                    continue;
                }
                if !stores.has_header(parent)? {
                    return Err(PruningProofError::NotTopological(header.hash, parent).into());
                }
                parents.push(parent);
            }

            let (data, merged) = if is_root {
                // In-proof parents of a root stay its ancestors through reachability only
                (GhostdagData::new_trusted_root(header.blue_score, header.blue_work), parents.clone())
            } else {
                let data = self.color_proof_header(&stores, header, &parents)?;
                let merged = data.unordered_mergeset_without_selected_parent().collect();
                (data, merged)
            };
            reachability::add_block(&mut stores, header.hash, data.selected_parent, &merged).map_err(ghostdag_failure)?;
            stores.ghostdag.insert(header.hash, Arc::new(data));
            stores.relations.insert(header.hash, parents);
            stores.headers.insert(Arc::new(header.clone()));
            verified_work += calc_work(header.bits);
        }

        let min_blue_score = pruning_point_header.blue_score.saturating_sub(self.window_depth);
        for header in proof.headers.iter() {
            if header.blue_score < min_blue_score || !reachability::is_dag_ancestor_of(&stores, header.hash, proof.pruning_point)? {
                return Err(PruningProofError::OutsideWindow(header.hash).into());
            }
        }

        if (proof.len() as u64) < self.pruning_proof_m && !in_proof.contains(&self.genesis_hash) {
            return Err(PruningProofError::TooShallow(proof.len(), self.pruning_proof_m).into());
        }
        if verified_work <= local_blue_work {
            return Err(PruningProofError::InsufficientWork(verified_work, local_blue_work).into());
        }
        Ok(stores)
    }

    /// GHOSTDAG over the headers seen so far, which must match the claimed
    /// blue score and blue work exactly
    fn color_proof_header(&self, stores: &MemoryDagStores, header: &Header, parents: &[Hash]) -> ConsensusResult<GhostdagData> {
        let data = self.ghostdag_manager.ghostdag(stores, parents, calc_work(header.bits)).map_err(ghostdag_failure)?;
        if header.blue_score != data.blue_score {
            return Err(PruningProofError::BlueScoreMismatch(header.hash, header.blue_score, data.blue_score).into());
        }
        if header.blue_work != data.blue_work {
            return Err(PruningProofError::BlueWorkMismatch(header.hash, header.blue_work, data.blue_work).into());
        }
        Ok(data)
    }

    /// Replaces the whole local DAG with the verified proof. The pruning point
    /// stays header-only until its UTXO set is imported.
    pub fn stage_apply(
        &self,
        storage: &ConsensusStorage,
        staging: &mut StagingArea,
        proof: &PruningPointProof,
        stores: &MemoryDagStores,
    ) -> ConsensusResult<()> {
        for cf in ALL_COLUMN_FAMILIES {
            staging.stage_clear(cf);
        }

        for header in proof.headers.iter() {
            let hash = header.hash;
            storage.headers.insert(staging, Arc::new(header.clone()))?;
            storage.ghostdag.insert(staging, hash, stores.get_ghostdag_data(hash)?)?;
            storage.relations.insert(staging, hash, stores.get_parents(hash)?)?;
            storage.statuses.set(staging, hash, BlockStatus::StatusHeaderOnly)?;
        }
        for (hash, data) in stores.reachability.iter() {
            storage.reachability.stage(staging, *hash, data)?;
        }

        let mut chain = vec![proof.pruning_point];
        loop {
            let selected_parent = stores.get_selected_parent(chain[chain.len() - 1])?;
            if selected_parent == ORIGIN {
                break;
            }
            chain.push(selected_parent);
        }
        let mut chain = chain.into_iter().rev();
        if let Some(root) = chain.next() {
            storage.selected_chain.stage_reset(staging, root)?;
        }
        for block in chain {
            storage.selected_chain.stage_push(staging, block)?;
        }

        storage.pruning_point.stage(staging, &proof.pruning_point)?;
        storage.pruning_point_history.stage(staging, &vec![proof.pruning_point])?;
        storage.history_root.stage(staging, &proof.pruning_point)?;
        storage.pending_pruning_point.stage(staging, &proof.pruning_point)?;
        storage.finality_conflicts.stage(staging, &Vec::new())?;
        storage.tips.stage(staging, &vec![proof.pruning_point])?;
        storage.genesis.stage(staging, &self.genesis_hash)?;
        info!("Applied a pruning proof of {} headers for pruning point {}", proof.len(), proof.pruning_point);
        Ok(())
    }

    /// Checks the pruning point body and UTXO set against the applied proof and
    /// stages them. The caller recomputes the virtual afterwards.
    pub fn stage_import_utxo_set(
        &self,
        storage: &ConsensusStorage,
        staging: &mut StagingArea,
        block_validator: &BlockValidator,
        block: &Block,
        utxos: Vec<(TransactionOutpoint, UtxoEntry)>,
    ) -> ConsensusResult<()> {
        let pending = storage.pending_pruning_point.get(staging)?.ok_or(PruningProofError::NoPendingProof)?;
        if block.hash() != pending {
            return Err(PruningProofError::UnexpectedPruningPointBlock(block.hash()).into());
        }
        let header = storage.headers.get_header(staging, pending)?;
        if !block.header.is_hash_consistent() {
            return Err(PruningProofError::HashMismatch(block.hash()).into());
        }
        block_validator.validate_body_in_isolation(block)?;

        let mut collection = UtxoCollection::new();
        for (outpoint, entry) in utxos {
            collection.insert(outpoint, entry);
        }
        let commitment = UtxoCommitment::from_collection(&collection).to_hash();
        if commitment != header.utxo_commitment {
            return Err(PruningProofError::UtxoCommitmentMismatch(header.utxo_commitment, commitment).into());
        }

        storage.block_transactions.insert(staging, pending, Arc::new(block.transactions.clone()))?;
        storage.statuses.set(staging, pending, BlockStatus::StatusUtxoValid)?;
        storage.utxo_set.stage_replace(staging, collection.iter())?;
        storage.pruning_utxo_set.stage_replace(staging, collection.iter())?;
        storage.tips.stage(staging, &vec![pending])?;
        storage.pending_pruning_point.stage_delete(staging);
        info!("Imported {} UTXOs at pruning point {}", collection.len(), pending);
        Ok(())
    }

    /// Whether a proof was applied and still waits for its UTXO set
    pub fn is_awaiting_utxo_set(&self, view: StagedView) -> ConsensusResult<bool> {
        Ok(view.storage().pending_pruning_point.get(view.staging())?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use consensus_core::constants::BLOCK_VERSION;
    use consensus_core::ZERO_HASH;

    const BITS: u32 = 0x207f_ffff;

    fn params() -> Params {
        let mut params = Params::simnet();
        params.ghostdag_k = 2;
        params.pruning_proof_m = 5;
        params
    }

    fn work(blocks: u64) -> BlueWorkType {
        std::iter::repeat(calc_work(BITS)).take(blocks as usize).sum()
    }

    fn header(parents: Vec<Hash>, blue_score: u64, blue_work: BlueWorkType, nonce: u64) -> Header {
        Header::new_finalized(BLOCK_VERSION, vec![parents], ZERO_HASH, ZERO_HASH, 1000 + nonce, BITS, nonce, blue_score, blue_work, blue_score, ZERO_HASH)
    }

    /// A chain root <- h1 <- h2 <- h3 <- h4 rooted at a block claiming blue
    /// score 100, plus a side block on h3 merged by the pruning point
    fn honest_proof() -> PruningPointProof {
        let out_of_window = Hash::from_u64_word(999);
        let mut headers = vec![header(vec![out_of_window], 100, work(100), 1)];
        for n in 1..=4u64 {
            let parent = headers[headers.len() - 1].hash;
            headers.push(header(vec![parent], 100 + n, work(100 + n), 1 + n));
        }
        let side = header(vec![headers[3].hash], 104, work(104), 50);
        let pruning_point = header(vec![headers[4].hash, side.hash], 106, work(106), 60);
        let hash = pruning_point.hash;
        headers.push(side);
        headers.push(pruning_point);
        headers.sort_by_key(|header| SortableBlock::new(header.hash, header.blue_work));
        PruningPointProof::new(hash, headers)
    }

    #[test]
    fn test_validates_honest_proof() {
        let manager = PruningProofManager::new(&params());
        let proof = honest_proof();
        let stores = manager.validate(&proof, work(1)).unwrap();
        let data = stores.get_ghostdag_data(proof.pruning_point).unwrap();
        assert_eq!(data.blue_score, 106);
        assert_eq!(data.mergeset_blues.len(), 2);
        assert!(reachability::is_dag_ancestor_of(&stores, proof.headers[0].hash, proof.pruning_point).unwrap());
        assert_eq!(stores.get_selected_parent(proof.headers[0].hash).unwrap(), ORIGIN);
    }

    #[test]
    fn test_rejects_malformed_proofs() {
        let manager = PruningProofManager::new(&params());

        let empty = PruningPointProof::new(ZERO_HASH, vec![]);
        assert_eq!(manager.validate(&empty, work(1)).unwrap_err(), PruningProofError::Empty.into());

        let mut wrong_tip = honest_proof();
        wrong_tip.pruning_point = wrong_tip.headers[0].hash;
        assert!(matches!(
            manager.validate(&wrong_tip, work(1)),
            Err(ConsensusError::PruningProof(PruningProofError::PruningPointMismatch(..)))
        ));

        let mut reordered = honest_proof();
        reordered.headers.swap(1, 2);
        assert!(matches!(
            manager.validate(&reordered, work(1)),
            Err(ConsensusError::PruningProof(PruningProofError::NotTopological(..)))
        ));

        let mut duplicated = honest_proof();
        let first = duplicated.headers[0].clone();
        duplicated.headers.insert(1, first);
        assert!(matches!(
            manager.validate(&duplicated, work(1)),
            Err(ConsensusError::PruningProof(PruningProofError::DuplicateHeader(..)))
        ));

        let mut tampered = honest_proof();
        tampered.headers[1].nonce += 1;
        assert!(matches!(manager.validate(&tampered, work(1)), Err(ConsensusError::PruningProof(PruningProofError::HashMismatch(..)))));
    }

    #[test]
    fn test_rejects_understated_blue_score() {
        let manager = PruningProofManager::new(&params());
        let root = header(vec![Hash::from_u64_word(999)], 100, work(100), 1);
        // Its parent alone gives it a blue score of 101
        let understated = header(vec![root.hash], 50, work(101), 2);
        let proof = PruningPointProof::new(understated.hash, vec![root, understated]);
        assert!(matches!(
            manager.validate(&proof, work(1)),
            Err(ConsensusError::PruningProof(PruningProofError::BlueScoreMismatch(_, 50, 101)))
        ));
    }

    #[test]
    fn test_rejects_overstated_claims() {
        let manager = PruningProofManager::new(&params());
        let root = header(vec![Hash::from_u64_word(999)], 100, work(100), 1);
        let overstated_score = header(vec![root.hash], 150, work(101), 2);
        let proof = PruningPointProof::new(overstated_score.hash, vec![root.clone(), overstated_score]);
        assert!(matches!(
            manager.validate(&proof, work(1)),
            Err(ConsensusError::PruningProof(PruningProofError::BlueScoreMismatch(_, 150, 101)))
        ));

        let overstated_work = header(vec![root.hash], 101, work(500), 3);
        let hash = overstated_work.hash;
        let proof = PruningPointProof::new(hash, vec![root, overstated_work]);
        assert_eq!(
            manager.validate(&proof, work(1)).unwrap_err(),
            PruningProofError::BlueWorkMismatch(hash, work(500), work(101)).into()
        );
    }

    #[test]
    fn test_rejects_insufficient_work() {
        let manager = PruningProofManager::new(&params());
        let proof = honest_proof();
        // Seven headers at the simnet difficulty, whatever the pruning point claims
        assert_eq!(manager.validate(&proof, work(7)).unwrap_err(), PruningProofError::InsufficientWork(work(7), work(7)).into());
        assert!(manager.validate(&proof, work(6)).is_ok());
    }

    #[test]
    fn test_claimed_root_work_does_not_count() {
        let manager = PruningProofManager::new(&params());
        let mut headers = vec![header(vec![Hash::from_u64_word(999)], 100, BlueWorkType::MAX, 1)];
        for n in 1..=5u64 {
            let parent = headers[headers.len() - 1].hash;
            headers.push(header(vec![parent], 100 + n, BlueWorkType::MAX, 1 + n));
        }
        let proof = PruningPointProof::new(headers[5].hash, headers);
        assert_eq!(manager.validate(&proof, work(10)).unwrap_err(), PruningProofError::InsufficientWork(work(6), work(10)).into());
    }

    #[test]
    fn test_rejects_bits_above_network_maximum() {
        let mut params = params();
        params.pow_max_bits = 0x1f00_ffff;
        let manager = PruningProofManager::new(&params);
        let proof = honest_proof();
        let first = proof.headers[0].hash;
        assert_eq!(manager.validate(&proof, work(1)).unwrap_err(), PruningProofError::InvalidBits(first, BITS).into());
    }

    #[test]
    fn test_rejects_unbounded_exponent() {
        let manager = PruningProofManager::new(&params());
        // An exponent above 32 expands to the largest target, which any hash meets
        let easy = Header::new_finalized(BLOCK_VERSION, vec![vec![]], ZERO_HASH, ZERO_HASH, 1000, 0x2200_ffff, 0, 0, work(1), 0, ZERO_HASH);
        let hash = easy.hash;
        let proof = PruningPointProof::new(hash, vec![easy]);
        assert_eq!(manager.validate(&proof, work(1)).unwrap_err(), PruningProofError::InvalidBits(hash, 0x2200_ffff).into());
    }

    #[test]
    fn test_rejects_shallow_proof() {
        let mut params = params();
        params.pruning_proof_m = 10;
        let manager = PruningProofManager::new(&params);
        assert_eq!(manager.validate(&honest_proof(), work(1)).unwrap_err(), PruningProofError::TooShallow(7, 10).into());

        // Fewer headers are enough when the proof starts at genesis
        let genesis = params.genesis.build_header();
        let first = header(vec![genesis.hash], 1, genesis.blue_work + work(1), 1);
        let second = header(vec![first.hash], 2, genesis.blue_work + work(2), 2);
        let hash = second.hash;
        let proof = PruningPointProof::new(hash, vec![genesis, first, second]);
        let stores = manager.validate(&proof, work(1)).unwrap();
        assert_eq!(stores.get_ghostdag_data(hash).unwrap().blue_score, 2);
    }

    #[test]
    fn test_rejects_headers_outside_window() {
        let manager = PruningProofManager::new(&params());
        let mut proof = honest_proof();
        // A header the pruning point does not descend from
        let stray = header(vec![], 1, work(1), 77);
        proof.headers.insert(0, stray.clone());
        assert_eq!(manager.validate(&proof, work(1)).unwrap_err(), PruningProofError::OutsideWindow(stray.hash).into());
    }
}
