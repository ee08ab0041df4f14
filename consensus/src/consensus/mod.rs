//! Consensus module for BlockDAG-based blockchain
//!
//! This module implements the core consensus logic using GHOSTDAG algorithm,
//! including DAG management, reachability queries, and protocol rules.
//! [`Consensus`] wires the stores and processors of one instance together
//! and serves the [`ConsensusApi`].

pub mod dag;
pub mod difficulty;
pub mod ghostdag;
pub mod storage;
pub mod types;
pub mod validation;

use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;

use consensus_core::acceptance_data::AcceptanceData;
use consensus_core::api::{BlockInfo, ConsensusApi, FinalityConflictResolution};
use consensus_core::block::Block;
use consensus_core::blockstatus::BlockStatus;
use consensus_core::config::{ConfigError, Params};
use consensus_core::errors::{BlockProcessResult, ConsensusError, ConsensusResult, RuleError};
use consensus_core::ghostdag::SortableBlock;
use consensus_core::header::Header;
use consensus_core::pruning::PruningPointProof;
use consensus_core::tx::{ScriptPublicKey, Transaction, TransactionOutpoint, UtxoEntry};
use consensus_core::utxo::UtxoDiff;
use consensus_core::{BlueWorkType, Hash, ORIGIN};
use database::{Database, StagingArea};
use tracing::{info, warn};

use crate::config::ConsensusConfig;
use crate::pipeline::flow::ProcessQueue;
use crate::pipeline::{BlockProcessor, BodyProcessor, HeaderProcessor, VirtualProcessor};
use crate::process::{sync, FinalityManager, PruningProofManager};
use dag::reachability;
use difficulty::WindowManager;
use storage::{ConsensusStorage, GhostdagStoreReader, RelationsStoreReader, UtxoDiffManager};
use types::{FinalityConflict, VirtualState};
use validation::{BlockValidator, SigCache, TransactionValidator};

/// One consensus instance over one database
pub struct Consensus {
    pub(crate) config: ConsensusConfig,
    pub(crate) storage: Arc<ConsensusStorage>,
    pub(crate) block_validator: Arc<BlockValidator>,
    pub(crate) utxo_diff_manager: Arc<UtxoDiffManager>,
    pub(crate) window_manager: Arc<WindowManager>,
    pub(crate) header_processor: Arc<HeaderProcessor>,
    pub(crate) virtual_processor: Arc<VirtualProcessor>,
    pub(crate) block_processor: Arc<BlockProcessor>,
    finality_manager: FinalityManager,
    pruning_proof_manager: PruningProofManager,
}

impl Consensus {
    /// Builds the instance over `db`, writing genesis into an empty database
    /// or resuming from the persisted state
    pub fn new(db: Arc<Database>, config: ConsensusConfig) -> ConsensusResult<Self> {
        config.params.validate()?;
        let params = config.params.clone();
        let storage = Arc::new(ConsensusStorage::new(db, &config.cache_sizes));

        let sig_cache = Arc::new(SigCache::new(config.cache_sizes.signatures));
        let transaction_validator = Arc::new(TransactionValidator::new(&params, sig_cache));
        let block_validator = Arc::new(BlockValidator::new(&params, transaction_validator));
        let utxo_diff_manager = Arc::new(UtxoDiffManager::new(block_validator.clone()));
        let window_manager = Arc::new(WindowManager::new(config.cache_sizes.windows));

        let header_processor = Arc::new(HeaderProcessor::new(&params, window_manager.clone()));
        let body_processor = Arc::new(BodyProcessor::new(block_validator.clone(), utxo_diff_manager.clone()));
        let virtual_processor = Arc::new(VirtualProcessor::new(&params, header_processor.clone(), utxo_diff_manager.clone()));
        let block_processor = Arc::new(BlockProcessor::new(
            &params,
            storage.clone(),
            header_processor.clone(),
            body_processor,
            virtual_processor.clone(),
            utxo_diff_manager.clone(),
        ));

        let consensus = Self {
            finality_manager: FinalityManager::new(params.finality_depth()),
            pruning_proof_manager: PruningProofManager::new(&params),
            config,
            storage,
            block_validator,
            utxo_diff_manager,
            window_manager,
            header_processor,
            virtual_processor,
            block_processor,
        };
        consensus.init()?;
        Ok(consensus)
    }

    /// Opens (or creates) the database at `path`
    pub fn open<P: AsRef<Path>>(path: P, config: ConsensusConfig) -> ConsensusResult<Self> {
        Self::new(Arc::new(Database::open(path)?), config)
    }

    fn init(&self) -> ConsensusResult<()> {
        let expected = self.params().genesis.hash();
        match self.storage.genesis.get(&StagingArea::new())? {
            Some(genesis) if genesis == expected => {
                self.virtual_processor.load(&self.storage)?;
                let pruning_point = self.storage.pruning_point.read(&StagingArea::new())?;
                match self.virtual_processor.state() {
                    Ok(state) => info!("Resumed consensus at selected tip {} and pruning point {}", state.selected_tip(), pruning_point),
                    Err(_) => info!("Resumed consensus awaiting the UTXO set of pruning point {}", pruning_point),
                }
                Ok(())
            }
            Some(genesis) => Err(ConfigError::InvalidValue(format!(
                "database was created for genesis {genesis}, network {} has genesis {expected}",
                self.params().name
            ))
            .into()),
            None => self.init_genesis(),
        }
    }

    fn init_genesis(&self) -> ConsensusResult<()> {
        let genesis = self.params().genesis.build_block();
        let hash = genesis.hash();
        let storage = &self.storage;
        let mut staging = StagingArea::new();

        reachability::init(&mut storage.view_mut(&mut staging))?;
        let ghostdag_data = self.header_processor.ghostdag_manager().genesis_ghostdag_data(genesis.header.bits);
        storage.headers.insert(&mut staging, Arc::new(genesis.header.clone()))?;
        storage.ghostdag.insert(&mut staging, hash, Arc::new(ghostdag_data))?;
        storage.relations.insert(&mut staging, hash, Arc::new(Vec::new()))?;
        reachability::add_block(&mut storage.view_mut(&mut staging), hash, ORIGIN, &[])?;
        storage.statuses.set(&mut staging, hash, BlockStatus::StatusUtxoValid)?;
        storage.block_transactions.insert(&mut staging, hash, Arc::new(genesis.transactions.clone()))?;
        storage.utxo_diffs.insert(&mut staging, hash, Arc::new(UtxoDiff::default()))?;
        storage.acceptance_data.insert(&mut staging, hash, Arc::new(AcceptanceData::new()))?;

        storage.selected_chain.stage_reset(&mut staging, hash)?;
        storage.tips.stage(&mut staging, &vec![hash])?;
        storage.pruning_point.stage(&mut staging, &hash)?;
        storage.pruning_point_history.stage(&mut staging, &vec![hash])?;
        storage.history_root.stage(&mut staging, &hash)?;
        storage.finality_conflicts.stage(&mut staging, &Vec::new())?;
        storage.genesis.stage(&mut staging, &hash)?;

        let state = self.block_processor.stage_virtual_update(&mut staging)?;
        storage.commit(staging)?;
        self.virtual_processor.set_state(state);
        info!("Initialized consensus for {} with genesis {}", self.params().name, hash);
        Ok(())
    }

    pub fn params(&self) -> &Params {
        &self.config.params
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<ConsensusStorage> {
        &self.storage
    }

    pub fn block_processor(&self) -> Arc<BlockProcessor> {
        self.block_processor.clone()
    }

    pub fn is_halted(&self) -> bool {
        self.block_processor.is_halted()
    }

    /// Starts a worker pool feeding this instance, configured by the pipeline settings
    pub fn start_pipeline(&self) -> ConsensusResult<ProcessQueue> {
        ProcessQueue::start(self.block_processor.clone(), &self.config.pipeline)
    }

    /// The committed virtual state
    pub fn virtual_state(&self) -> ConsensusResult<Arc<VirtualState>> {
        match self.virtual_processor.state() {
            Ok(state) => Ok(state),
            Err(err) => match self.storage.pending_pruning_point.get(&StagingArea::new())? {
                Some(pending) => Err(ConsensusError::AwaitingPruningPointUtxoSet(pending)),
                None => Err(self.block_processor.check_fatal(err)),
            },
        }
    }

    pub fn finality_conflicts(&self) -> ConsensusResult<Vec<FinalityConflict>> {
        Ok(self.storage.finality_conflicts.get(&StagingArea::new())?.unwrap_or_default())
    }

    pub fn pruning_point_history(&self) -> ConsensusResult<Vec<Hash>> {
        Ok(self.storage.pruning_point_history.get(&StagingArea::new())?.unwrap_or_default())
    }

    pub fn get_header(&self, hash: Hash) -> ConsensusResult<Option<Arc<Header>>> {
        Ok(self.storage.headers.try_get_header(&StagingArea::new(), hash)?)
    }

    /// The full block, if its body is still held
    pub fn get_block(&self, hash: Hash) -> ConsensusResult<Option<Block>> {
        let staging = StagingArea::new();
        let Some(header) = self.storage.headers.try_get_header(&staging, hash)? else {
            return Ok(None);
        };
        if !self.storage.block_transactions.has(&staging, hash)? {
            return Ok(None);
        }
        let transactions = self.storage.block_transactions.get(&staging, hash)?;
        Ok(Some(Block::new((*header).clone(), (*transactions).clone())))
    }

    /// The UTXO set at the pruning point, as served to nodes importing a pruning proof
    pub fn get_pruning_point_utxo_set(&self) -> ConsensusResult<Vec<(TransactionOutpoint, UtxoEntry)>> {
        let _guard = self.block_processor.read_lock();
        let mut utxos = self.storage.pruning_utxo_set.iter_committed()?;
        utxos.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(utxos)
    }

    /// Runs a state transition under the state lock, halting on fatal errors
    fn transition<T>(&self, f: impl FnOnce() -> ConsensusResult<T>) -> ConsensusResult<T> {
        let _guard = self.block_processor.lock_state()?;
        f().map_err(|err| self.block_processor.check_fatal(err))
    }

    fn local_blue_work(&self) -> ConsensusResult<BlueWorkType> {
        let staging = StagingArea::new();
        let tip = match self.virtual_processor.state() {
            Ok(state) => state.selected_tip(),
            Err(_) => self.storage.pruning_point.read(&staging)?,
        };
        self.storage.view(&staging).get_blue_work(tip)
    }

    /// `violating` and its future, minus whatever the virtual already merged
    fn conflict_future(&self, staging: &StagingArea, violating: Hash, selected_tip: Hash) -> ConsensusResult<Vec<Hash>> {
        let view = self.storage.view(staging);
        let mut queue = VecDeque::from([violating]);
        let mut visited = HashSet::from([violating]);
        let mut future = Vec::new();
        while let Some(block) = queue.pop_front() {
            if block != selected_tip && !reachability::is_dag_ancestor_of(&view, block, selected_tip)? {
                future.push(block);
            }
            for child in view.get_children(block)?.iter().copied() {
                if visited.insert(child) {
                    queue.push_back(child);
                }
            }
        }
        Ok(future)
    }

    fn keep_current_chain(&self, staging: &mut StagingArea, disqualified: &[Hash]) -> ConsensusResult<()> {
        for block in disqualified.iter().copied() {
            self.storage.statuses.set(staging, block, BlockStatus::StatusInvalid)?;
        }
        let mut tips = self.storage.tips.read(staging)?;
        tips.retain(|tip| !disqualified.contains(tip));
        self.storage.tips.stage(staging, &tips)?;
        Ok(())
    }

    fn switch_to_violating(&self, staging: &mut StagingArea, violating: Hash, future: &[Hash]) -> ConsensusResult<()> {
        let pruning_point = self.storage.pruning_point.read(staging)?;
        let mut switched = Vec::new();
        {
            let view = self.storage.view(staging);
            if !reachability::is_chain_ancestor_of(&view, pruning_point, violating)? {
                return Err(RuleError::PruningViolation(violating, pruning_point).into());
            }
            for block in future.iter().copied() {
                if self.storage.statuses.get(staging, block)? == Some(BlockStatus::StatusViolatingFinality) {
                    switched.push(SortableBlock::new(block, view.get_blue_work(block)?));
                }
            }
        }
        switched.sort();

        let mut tips = self.storage.tips.read(staging)?;
        for block in switched.iter().map(|sortable| sortable.hash) {
            self.storage.statuses.set(staging, block, BlockStatus::StatusUtxoValid)?;
            let parents = self.storage.relations.get_parents(staging, block)?;
            let mut has_valid_child = false;
            for child in self.storage.relations.get_children(staging, block)?.iter().copied() {
                if self.storage.statuses.get(staging, child)?.is_some_and(BlockStatus::has_block_body) {
                    has_valid_child = true;
                }
            }
            tips.retain(|tip| !parents.contains(tip));
            if !has_valid_child && !tips.contains(&block) {
                tips.push(block);
            }
        }
        self.storage.tips.stage(staging, &tips)?;
        Ok(())
    }
}

impl ConsensusApi for Consensus {
    fn add_block(&self, block: Block) -> BlockProcessResult<BlockStatus> {
        self.block_processor.process_block(&block)
    }

    fn get_virtual_selected_parent(&self) -> ConsensusResult<Hash> {
        Ok(self.virtual_state()?.selected_tip())
    }

    fn get_block_info(&self, hash: Hash) -> ConsensusResult<Option<BlockInfo>> {
        let staging = StagingArea::new();
        let Some(status) = self.storage.statuses.get(&staging, hash)? else {
            return Ok(None);
        };
        if status.is_invalid() {
            // Invalid blocks keep no DAG data
            return Ok(Some(BlockInfo {
                hash,
                status,
                blue_score: 0,
                blue_work: BlueWorkType::ZERO,
                daa_score: 0,
                is_in_virtual_chain: false,
            }));
        }
        let ghostdag_data = self.storage.ghostdag.get_data(&staging, hash)?;
        let header = self.storage.headers.get_header(&staging, hash)?;
        Ok(Some(BlockInfo {
            hash,
            status,
            blue_score: ghostdag_data.blue_score,
            blue_work: ghostdag_data.blue_work,
            daa_score: header.daa_score,
            is_in_virtual_chain: self.storage.selected_chain.get_index(&staging, hash)?.is_some(),
        }))
    }

    fn get_virtual_utxo_set(&self, filter: Option<&[ScriptPublicKey]>) -> ConsensusResult<Vec<(TransactionOutpoint, UtxoEntry)>> {
        let _guard = self.block_processor.read_lock();
        let state = self.virtual_state()?;
        self.utxo_diff_manager.virtual_utxo_set(&self.storage, &state, filter)
    }

    fn create_block_locator(&self, low: Hash, high: Hash) -> ConsensusResult<Vec<Hash>> {
        let staging = StagingArea::new();
        let view = self.storage.view(&staging);
        for hash in [low, high] {
            if !view.has_ghostdag_data(hash)? {
                return Err(ConsensusError::UnknownBlock(hash));
            }
        }
        sync::create_block_locator(view, low, high)
    }

    fn get_pruning_point_proof(&self) -> ConsensusResult<PruningPointProof> {
        let _guard = self.block_processor.read_lock();
        let staging = StagingArea::new();
        if let Some(pending) = self.storage.pending_pruning_point.get(&staging)? {
            return Err(ConsensusError::AwaitingPruningPointUtxoSet(pending));
        }
        let pruning_point = self.storage.pruning_point.read(&staging)?;
        self.pruning_proof_manager.generate(self.storage.view(&staging), pruning_point)
    }

    fn validate_and_apply_pruning_point_proof(&self, proof: PruningPointProof) -> ConsensusResult<()> {
        self.transition(|| {
            let stores = self.pruning_proof_manager.validate(&proof, self.local_blue_work()?)?;
            let mut staging = StagingArea::new();
            self.pruning_proof_manager.stage_apply(&self.storage, &mut staging, &proof, &stores)?;
            self.storage.commit(staging)?;
            self.window_manager.clear();
            self.virtual_processor.clear();
            Ok(())
        })
    }

    fn import_pruning_point_utxo_set(&self, block: Block, utxos: Vec<(TransactionOutpoint, UtxoEntry)>) -> ConsensusResult<()> {
        self.transition(|| {
            let mut staging = StagingArea::new();
            self.pruning_proof_manager.stage_import_utxo_set(&self.storage, &mut staging, &self.block_validator, &block, utxos)?;
            let state = self.block_processor.stage_virtual_update(&mut staging)?;
            self.storage.commit(staging)?;
            self.virtual_processor.set_state(state);
            info!("Resumed normal operation at pruning point {}", block.hash());
            Ok(())
        })
    }

    fn is_in_selected_parent_chain(&self, hash: Hash) -> ConsensusResult<bool> {
        Ok(self.storage.selected_chain.get_index(&StagingArea::new(), hash)?.is_some())
    }

    fn resolve_finality_conflict(&self, violating: Hash, resolution: FinalityConflictResolution) -> ConsensusResult<()> {
        self.transition(|| {
            let mut staging = StagingArea::new();
            let mut conflicts = self.storage.finality_conflicts.get(&staging)?.unwrap_or_default();
            if !conflicts.iter().any(|conflict| conflict.violating_block == violating) {
                return Err(ConsensusError::UnknownFinalityConflict(violating));
            }
            let selected_tip = self.virtual_state()?.selected_tip();
            let future = self.conflict_future(&staging, violating, selected_tip)?;
            match resolution {
                FinalityConflictResolution::KeepCurrent => {
                    self.keep_current_chain(&mut staging, &future)?;
                    warn!("Finality conflict of {} resolved by keeping the current chain, {} blocks disqualified", violating, future.len());
                }
                FinalityConflictResolution::SwitchToViolating => {
                    self.switch_to_violating(&mut staging, violating, &future)?;
                    warn!("Finality conflict of {} resolved by switching to its chain", violating);
                }
            }
            conflicts.retain(|conflict| conflict.violating_block != violating && !future.contains(&conflict.violating_block));
            self.storage.finality_conflicts.stage(&mut staging, &conflicts)?;

            let state = self.block_processor.stage_virtual_update(&mut staging)?;
            self.storage.commit(staging)?;
            self.virtual_processor.set_state(state);
            Ok(())
        })
    }

    fn validate_mempool_transaction(&self, tx: &Transaction) -> ConsensusResult<u64> {
        let _guard = self.block_processor.read_lock();
        let state = self.virtual_state()?;
        self.utxo_diff_manager.validate_mempool_transaction(&self.storage, &state, tx)
    }

    fn get_pruning_point(&self) -> ConsensusResult<Hash> {
        Ok(self.storage.pruning_point.read(&StagingArea::new())?)
    }

    fn get_finality_point(&self) -> ConsensusResult<Hash> {
        let state = self.virtual_state()?;
        let staging = StagingArea::new();
        self.finality_manager.virtual_finality_point(self.storage.view(&staging), state.selected_tip())
    }

    fn get_tips(&self) -> ConsensusResult<Vec<Hash>> {
        Ok(self.storage.tips.read(&StagingArea::new())?)
    }
}
