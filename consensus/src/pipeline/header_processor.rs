//! Header processor for consensus
//!
//! This module places a header in the DAG: it colors the block with GHOSTDAG,
//! derives the fields the header must carry from the block's past, validates
//! them and stages the header, its GHOSTDAG data, relations and reachability.

use std::sync::Arc;

use consensus_core::config::Params;
use consensus_core::difficulty::calc_work;
use consensus_core::errors::ConsensusResult;
use consensus_core::ghostdag::GhostdagData;
use consensus_core::header::Header;
use consensus_core::{BlueWorkType, Hash};
use database::StagingArea;
use tracing::trace;

use crate::consensus::dag::reachability;
use crate::consensus::difficulty::{DifficultyManager, WindowManager};
use crate::consensus::ghostdag::GhostdagManager;
use crate::consensus::storage::{ConsensusStorage, StagedView};
use crate::consensus::validation::{ExpectedHeaderFields, HeaderValidator};
use crate::process::{PastMedianTimeManager, PruningManager};

/// Header fields determined by a block's past
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedHeaderFields {
    pub daa_score: u64,
    pub bits: u32,
    pub past_median_time: u64,
    pub pruning_point: Hash,
}

/// Header processor for DAG insertion
pub struct HeaderProcessor {
    header_validator: HeaderValidator,
    ghostdag_manager: GhostdagManager,
    window_manager: Arc<WindowManager>,
    difficulty_manager: DifficultyManager,
    past_median_time_manager: PastMedianTimeManager,
    pruning_manager: PruningManager,
}

impl HeaderProcessor {
    pub fn new(params: &Params, window_manager: Arc<WindowManager>) -> Self {
        Self {
            header_validator: HeaderValidator::new(params),
            ghostdag_manager: GhostdagManager::new(params.ghostdag_k),
            window_manager,
            difficulty_manager: DifficultyManager::new(params),
            past_median_time_manager: PastMedianTimeManager::new(params.past_median_time_window_size()),
            pruning_manager: PruningManager::new(params.pruning_depth(), params.pruning_proof_window_depth()),
        }
    }

    pub fn header_validator(&self) -> &HeaderValidator {
        &self.header_validator
    }

    pub fn ghostdag_manager(&self) -> &GhostdagManager {
        &self.ghostdag_manager
    }

    /// GHOSTDAG data of a block with `parents`; `own_work` is zero for the virtual
    pub fn ghostdag(&self, view: StagedView, parents: &[Hash], own_work: BlueWorkType) -> ConsensusResult<GhostdagData> {
        self.ghostdag_manager.ghostdag(&view, parents, own_work)
    }

    /// DAA score, difficulty, past median time and pruning point of a block
    /// (or of the virtual) identified by `hash` with `ghostdag_data`
    pub fn derive_fields(&self, view: StagedView, hash: Hash, ghostdag_data: &GhostdagData) -> ConsensusResult<DerivedHeaderFields> {
        let daa_score = self.difficulty_manager.calc_daa_score(&view, ghostdag_data)?;
        let difficulty_window = self.window_manager.blue_window(&view, hash, ghostdag_data, self.difficulty_manager.window_size())?;
        let bits = self.difficulty_manager.calculate_difficulty_bits(&view, &difficulty_window)?;
        let median_time_window = self.window_manager.blue_window(&view, hash, ghostdag_data, self.past_median_time_manager.window_size())?;
        let past_median_time = self.past_median_time_manager.calc_past_median_time(&view, &median_time_window)?;
        let pruning_point = self.pruning_manager.expected_header_pruning_point(view, ghostdag_data)?;
        Ok(DerivedHeaderFields { daa_score, bits, past_median_time, pruning_point })
    }

    /// Validates `header` against its past and stages it into the DAG stores.
    /// All parents must be known.
    pub fn validate_and_stage_header(
        &self,
        storage: &ConsensusStorage,
        staging: &mut StagingArea,
        header: &Header,
    ) -> ConsensusResult<Arc<GhostdagData>> {
        let hash = header.hash;
        let parents = header.direct_parents();
        let ghostdag_data = {
            let view = storage.view(staging);
            self.header_validator.check_parents_antichain(&view, parents)?;

            let ghostdag_data = self.ghostdag(view, parents, calc_work(header.bits))?;
            self.header_validator.check_merge_set_size(&ghostdag_data)?;
            self.pruning_manager.check_pruning_violation(view, ghostdag_data.selected_parent)?;

            let fields = self.derive_fields(view, hash, &ghostdag_data)?;
            let expected = ExpectedHeaderFields {
                ghostdag_data: &ghostdag_data,
                daa_score: fields.daa_score,
                bits: fields.bits,
                past_median_time: fields.past_median_time,
                pruning_point: fields.pruning_point,
            };
            self.header_validator.validate_header_in_context(header, &expected)?;
            Arc::new(ghostdag_data)
        };
        trace!("Header {} has blue score {} and selected parent {}", hash, ghostdag_data.blue_score, ghostdag_data.selected_parent);

        storage.headers.insert(staging, Arc::new(header.clone()))?;
        storage.ghostdag.insert(staging, hash, ghostdag_data.clone())?;
        storage.relations.insert(staging, hash, Arc::new(parents.to_vec()))?;
        let mergeset: Vec<Hash> = ghostdag_data.unordered_mergeset_without_selected_parent().collect();
        reachability::add_block(&mut storage.view_mut(staging), hash, ghostdag_data.selected_parent, &mergeset)?;
        Ok(ghostdag_data)
    }
}
