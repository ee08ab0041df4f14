//! DAG (Directed Acyclic Graph) management for BlockDAG consensus
//!
//! This module provides:
//! - Reachability queries (ancestor checks) in time independent of DAG depth
//! - Walks over the parent links of the DAG

pub mod reachability;
pub mod relations;
