//! Consensus state processes
//!
//! This module provides the managers that derive state from the DAG beyond
//! GHOSTDAG itself: finality, past median time, pruning, pruning proofs and
//! selected chain navigation for synchronization.

pub mod finality;
pub mod past_median_time;
pub mod pruning;
pub mod pruning_proof;
pub mod sync;

pub use finality::FinalityManager;
pub use past_median_time::PastMedianTimeManager;
pub use pruning::PruningManager;
pub use pruning_proof::PruningProofManager;
