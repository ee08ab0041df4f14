//! Storage module for consensus
//!
//! This module provides the store traits the DAG algorithms read through,
//! their rocksdb-backed and in-memory implementations, and the UTXO diff manager.

pub mod consensus_db;
pub mod memory;
pub mod stores;
pub mod utxo_set;

pub use consensus_db::{ConsensusStorage, StagedView, StagedViewMut};
pub use memory::{MemoryDagStores, MemoryGhostdagStore, MemoryHeaderStore, MemoryReachabilityStore, MemoryRelationsStore};
pub use stores::{DagStoreReader, GhostdagStoreReader, HeaderStoreReader, ReachabilityStore, ReachabilityStoreReader, RelationsStoreReader};
pub use utxo_set::UtxoDiffManager;
