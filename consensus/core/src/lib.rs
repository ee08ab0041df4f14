//! Consensus core types for the jio block DAG.
//!
//! This crate holds the data model shared by the storage layer and the
//! consensus engine: headers, blocks, transactions, UTXO algebra, GHOSTDAG
//! data, network parameters and the error taxonomy.

use std::collections::{HashMap, HashSet};

pub mod acceptance_data;
pub mod api;
pub mod block;
pub mod blockstatus;
pub mod config;
pub mod constants;
pub mod difficulty;
pub mod errors;
pub mod ghostdag;
pub mod hashing;
pub mod header;
pub mod mass;
pub mod merkle;
pub mod pruning;
pub mod reachability;
pub mod script;
pub mod sign;
pub mod subnets;
pub mod tx;
pub mod utxo;

pub use jio_hashes::{Hash, HASH_SIZE};

/// Cumulative proof-of-work of a block's blue past
pub type BlueWorkType = jio_math::Uint192;

/// The type used to represent the GHOSTDAG K parameter and anticone sizes
pub type KType = u16;

pub type BlockHashSet = HashSet<Hash>;
pub type BlockHashMap<T> = HashMap<Hash, T>;

pub const ZERO_HASH: Hash = Hash::from_bytes([0u8; HASH_SIZE]);

/// Virtual root of the reachability tree. Genesis and every trusted root
/// imported from a pruning proof hang below it.
pub const ORIGIN: Hash = Hash::from_bytes([0xfe; HASH_SIZE]);

/// Hash used for the synthetic virtual block
pub const VIRTUAL: Hash = Hash::from_bytes([0xff; HASH_SIZE]);
