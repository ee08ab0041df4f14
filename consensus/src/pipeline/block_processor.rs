//! Block processor for consensus
//!
//! This module runs one block through the whole transition: context-free
//! checks, header placement, body and UTXO validation, the finality check,
//! virtual resolution and pruning point advancement. All writes go to one
//! staging area which is committed at the end, so a rejected block leaves no
//! trace beyond its `Invalid` status.
//!
//! Transitions are serialized by a single state lock. A fatal error halts the
//! processor: every later transition fails with [`ConsensusError::Halted`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use consensus_core::block::Block;
use consensus_core::blockstatus::BlockStatus;
use consensus_core::config::Params;
use consensus_core::errors::{BlockProcessResult, ConsensusError, ConsensusResult, RuleError};
use consensus_core::Hash;
use database::StagingArea;
use parking_lot::{Mutex, MutexGuard};
use tracing::{error, info};

use crate::consensus::dag::relations;
use crate::consensus::storage::{ConsensusStorage, UtxoDiffManager};
use crate::consensus::types::{FinalityConflict, VirtualState};
use crate::pipeline::body_processor::BodyProcessor;
use crate::pipeline::flow::{ValidationFlow, ValidationStage};
use crate::pipeline::header_processor::HeaderProcessor;
use crate::pipeline::virtual_processor::VirtualProcessor;
use crate::process::{FinalityManager, PruningManager};

/// Milliseconds since the unix epoch
fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or_default()
}

/// Block processor for consensus
pub struct BlockProcessor {
    storage: Arc<ConsensusStorage>,
    header_processor: Arc<HeaderProcessor>,
    body_processor: Arc<BodyProcessor>,
    virtual_processor: Arc<VirtualProcessor>,
    utxo_diff_manager: Arc<UtxoDiffManager>,
    pruning_manager: PruningManager,
    finality_manager: FinalityManager,

    state_lock: Mutex<()>,
    halted: AtomicBool,
}

impl BlockProcessor {
    pub fn new(
        params: &Params,
        storage: Arc<ConsensusStorage>,
        header_processor: Arc<HeaderProcessor>,
        body_processor: Arc<BodyProcessor>,
        virtual_processor: Arc<VirtualProcessor>,
        utxo_diff_manager: Arc<UtxoDiffManager>,
    ) -> Self {
        Self {
            storage,
            header_processor,
            body_processor,
            virtual_processor,
            utxo_diff_manager,
            pruning_manager: PruningManager::new(params.pruning_depth(), params.pruning_proof_window_depth()),
            finality_manager: FinalityManager::new(params.finality_depth()),
            state_lock: Mutex::new(()),
            halted: AtomicBool::new(false),
        }
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    /// Takes the state lock for a transition
    pub fn lock_state(&self) -> ConsensusResult<MutexGuard<'_, ()>> {
        let guard = self.state_lock.lock();
        if self.is_halted() {
            return Err(ConsensusError::Halted);
        }
        Ok(guard)
    }

    /// Takes the state lock for a read spanning several stores. Reads are
    /// allowed on a halted processor.
    pub fn read_lock(&self) -> MutexGuard<'_, ()> {
        self.state_lock.lock()
    }

    /// Halts the processor if `err` is fatal and passes it through
    pub fn check_fatal(&self, err: ConsensusError) -> ConsensusError {
        if err.is_fatal() && !self.halted.swap(true, Ordering::AcqRel) {
            error!("Consensus halted after a fatal error: {}", err);
        }
        err
    }

    /// Whether the block has a status, i.e. it was committed in any form
    pub fn is_known(&self, hash: Hash) -> bool {
        matches!(self.storage.statuses.get(&StagingArea::new(), hash), Ok(Some(_)))
    }

    /// Validates `block` and commits it. All of its parents must be known.
    pub fn process_block(&self, block: &Block) -> BlockProcessResult<BlockStatus> {
        let hash = block.hash();
        let mut flow = ValidationFlow::new(hash);
        let result = self.check_not_known(hash).and_then(|()| self.validate_in_isolation(block));

        let _guard = self.state_lock.lock();
        let result = result.and_then(|()| {
            flow.advance(ValidationStage::StructurallyValidated);
            self.process_locked(block, &mut flow)
        });
        result.map_err(|err| {
            let err = flow.reject(err);
            if Self::disqualifies_block(&err) {
                if let Err(mark_err) = self.mark_invalid(hash) {
                    return self.check_fatal(mark_err);
                }
            }
            self.check_fatal(err)
        })
    }

    fn validate_in_isolation(&self, block: &Block) -> ConsensusResult<()> {
        self.header_processor.header_validator().validate_header_in_isolation(&block.header, unix_now())?;
        self.body_processor.validate_body_in_isolation(block)
    }

    fn check_not_known(&self, hash: Hash) -> ConsensusResult<()> {
        match self.storage.statuses.get(&StagingArea::new(), hash)? {
            Some(BlockStatus::StatusInvalid) => Err(RuleError::KnownInvalid(hash).into()),
            Some(_) => Err(RuleError::DuplicateBlock(hash).into()),
            None => Ok(()),
        }
    }

    fn process_locked(&self, block: &Block, flow: &mut ValidationFlow) -> BlockProcessResult<BlockStatus> {
        if self.is_halted() {
            return Err(ConsensusError::Halted);
        }
        let hash = block.hash();
        let header = &block.header;
        if let Some(pending) = self.storage.pending_pruning_point.get(&StagingArea::new())? {
            return Err(ConsensusError::AwaitingPruningPointUtxoSet(pending));
        }
        self.check_not_known(hash)?;

        let mut missing = Vec::new();
        for parent in header.direct_parents().iter().copied() {
            match self.storage.statuses.get(&StagingArea::new(), parent)? {
                None => missing.push(parent),
                Some(status) if status.is_invalid() => return Err(RuleError::InvalidParent(hash, parent).into()),
                Some(_) => {}
            }
        }
        if !missing.is_empty() {
            return Err(RuleError::MissingParents(hash, missing).into());
        }

        let mut staging = StagingArea::new();
        let ghostdag_data = self.header_processor.validate_and_stage_header(&self.storage, &mut staging, header)?;
        flow.advance(ValidationStage::ContextuallyValidated);
        let fees = self.body_processor.validate_and_stage_body(&self.storage, &mut staging, block, &ghostdag_data)?;
        flow.advance(ValidationStage::UtxoApplied);

        let selected_tip = self.virtual_processor.state()?.selected_tip();
        let violated_finality_point = {
            let view = self.storage.view(&staging);
            let finality_point = self.finality_manager.virtual_finality_point(view, selected_tip)?;
            self.finality_manager.is_violating(view, hash, selected_tip, finality_point)?.then_some(finality_point)
        };
        if let Some(finality_point) = violated_finality_point {
            self.storage.statuses.set(&mut staging, hash, BlockStatus::StatusViolatingFinality)?;
            let conflict = FinalityConflict { violating_block: hash, finality_point, selected_tip };
            self.finality_manager.stage_conflict(&self.storage, &mut staging, conflict)?;
            self.storage.commit(staging)?;
            flow.advance(ValidationStage::Committed);
            return Err(ConsensusError::FinalityViolation(hash, finality_point));
        }

        self.storage.statuses.set(&mut staging, hash, BlockStatus::StatusUtxoValid)?;
        let tips = self.storage.tips.read(&staging)?;
        self.storage.tips.stage(&mut staging, &relations::tips_with_new_block(&tips, hash, header.direct_parents()))?;
        let state = self.stage_virtual_update(&mut staging)?;
        self.storage.commit(staging)?;
        self.virtual_processor.set_state(state);
        flow.advance(ValidationStage::Committed);

        info!(
            "Accepted block {} with blue score {} and {} fees in {:?} ({:?})",
            hash,
            ghostdag_data.blue_score,
            fees,
            flow.elapsed(),
            BlockStatus::StatusUtxoValid
        );
        Ok(BlockStatus::StatusUtxoValid)
    }

    /// Re-resolves the virtual and moves the pruning point along with it.
    /// The caller commits and then publishes the returned state.
    pub fn stage_virtual_update(&self, staging: &mut StagingArea) -> ConsensusResult<Arc<VirtualState>> {
        let (state, changes) = self.virtual_processor.stage_resolve_virtual(&self.storage, staging)?;
        if let Some(new_tip) = changes.added.last() {
            info!("Virtual selected tip moved to {} at blue score {}", new_tip, state.ghostdag_data.blue_score);
        }
        let candidate = {
            let view = self.storage.view(staging);
            self.pruning_manager.expected_header_pruning_point(view, &state.ghostdag_data)?
        };
        self.pruning_manager.stage_advance(&self.storage, staging, &self.utxo_diff_manager, candidate)?;
        Ok(state)
    }

    /// Rule errors that condemn the block itself. Errors raised before the
    /// header hash is verified, or caused by a body not matching its header,
    /// say nothing about the block that really carries that hash. A stale
    /// cached transaction id is not committed to by the header either.
    fn disqualifies_block(err: &ConsensusError) -> bool {
        match err.as_rule_error() {
            Some(
                RuleError::KnownInvalid(_)
                | RuleError::HashMismatch(_)
                | RuleError::BadMerkleRoot(..)
                | RuleError::TransactionIdMismatch(_),
            ) => false,
            Some(rule) => rule.is_penalizable(),
            None => false,
        }
    }

    fn mark_invalid(&self, hash: Hash) -> ConsensusResult<()> {
        let mut staging = StagingArea::new();
        if self.storage.statuses.get(&staging, hash)?.is_none() {
            self.storage.statuses.set(&mut staging, hash, BlockStatus::StatusInvalid)?;
            self.storage.commit(staging)?;
        }
        Ok(())
    }
}
