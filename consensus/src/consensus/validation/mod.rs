//! Validation module for consensus
//!
//! This module provides validation for headers, block bodies and
//! transactions, in isolation and against the UTXO state, plus the
//! signature cache shared by block and mempool validation.

pub mod block_validator;
pub mod header_validator;
pub mod sig_cache;
pub mod transaction_validator;

pub use block_validator::BlockValidator;
pub use header_validator::{ExpectedHeaderFields, HeaderValidator};
pub use sig_cache::SigCache;
pub use transaction_validator::TransactionValidator;
