//! Consensus library for BlockDAG-based blockchain
//!
//! This library implements the core consensus logic using GHOSTDAG algorithm,
//! including DAG management, reachability queries, and protocol rules.

pub mod config;
pub mod consensus;
pub mod pipeline;
pub mod process;
pub mod test_consensus;

// Re-export key types for easier access
pub use consensus_core::Hash;
pub use config::{CacheSizes, ConsensusConfig, PipelineConfig};
pub use consensus::dag::reachability;
pub use consensus::difficulty::{DifficultyManager, WindowManager};
pub use consensus::ghostdag::GhostdagManager;
pub use consensus::storage::{ConsensusStorage, UtxoDiffManager};
pub use consensus::types::{FinalityConflict, VirtualState};
pub use consensus::validation::{BlockValidator, HeaderValidator, SigCache, TransactionValidator};
pub use consensus::Consensus;

// Re-export pipeline types
pub use pipeline::flow::{ProcessQueue, ValidationFlow, ValidationStage, WorkerExit};
pub use pipeline::{BlockProcessor, BlockResultReceiver, BodyProcessor, DepsManager, HeaderProcessor, VirtualProcessor};
