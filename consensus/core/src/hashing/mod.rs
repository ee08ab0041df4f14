//! Consensus hashing of headers and transactions.

pub mod header;
pub mod sighash;
pub mod tx;
