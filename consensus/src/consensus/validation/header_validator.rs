//! Header validation for consensus
//!
//! This module validates block headers including:
//! - Version, hash, parent list shape and proof of work, in isolation
//! - Parents forming an antichain and the merge set size limit
//! - Fields that must equal the values derived from the block's past

use std::collections::HashSet;

use consensus_core::config::Params;
use consensus_core::constants::BLOCK_VERSION;
use consensus_core::difficulty::check_proof_of_work;
use consensus_core::errors::{ConsensusResult, RuleError};
use consensus_core::ghostdag::GhostdagData;
use consensus_core::header::Header;
use consensus_core::Hash;
use itertools::Itertools;

use crate::consensus::dag::reachability;
use crate::consensus::storage::ReachabilityStoreReader;

/// Header fields as derived from the block's past
#[derive(Debug, Clone)]
pub struct ExpectedHeaderFields<'a> {
    pub ghostdag_data: &'a GhostdagData,
    pub daa_score: u64,
    pub bits: u32,
    pub past_median_time: u64,
    pub pruning_point: Hash,
}

/// Header validator for consensus rules
#[derive(Clone, Debug)]
pub struct HeaderValidator {
    max_block_parents: usize,
    max_future_time_offset: u64,
    merge_set_size_limit: u64,
    skip_proof_of_work: bool,
}

impl HeaderValidator {
    pub fn new(params: &Params) -> Self {
        Self {
            max_block_parents: params.max_block_parents,
            max_future_time_offset: params.max_future_time_offset(),
            merge_set_size_limit: params.merge_set_size_limit,
            skip_proof_of_work: params.skip_proof_of_work,
        }
    }

    /// Context-free checks. `now` is the local time in milliseconds.
    pub fn validate_header_in_isolation(&self, header: &Header, now: u64) -> Result<(), RuleError> {
        if header.version != BLOCK_VERSION {
            return Err(RuleError::WrongBlockVersion(header.version));
        }
        if !header.is_hash_consistent() {
            return Err(RuleError::HashMismatch(header.hash));
        }
        self.check_parents_shape(header)?;
        self.check_timestamp_not_in_future(header, now)?;
        self.check_pow(header)
    }

    pub fn check_parents_shape(&self, header: &Header) -> Result<(), RuleError> {
        let parents = header.direct_parents();
        if parents.is_empty() {
            return Err(RuleError::NoParents);
        }
        if parents.len() > self.max_block_parents {
            return Err(RuleError::TooManyParents(parents.len(), self.max_block_parents));
        }
        let mut seen = HashSet::with_capacity(parents.len());
        for parent in parents.iter() {
            if !seen.insert(*parent) {
                return Err(RuleError::DuplicateParents(*parent));
            }
        }
        Ok(())
    }

    pub fn check_timestamp_not_in_future(&self, header: &Header, now: u64) -> Result<(), RuleError> {
        let max = now + self.max_future_time_offset;
        if header.timestamp > max {
            return Err(RuleError::TimeTooFarIntoTheFuture(header.timestamp, max));
        }
        Ok(())
    }

    pub fn check_pow(&self, header: &Header) -> Result<(), RuleError> {
        if self.skip_proof_of_work || check_proof_of_work(header) {
            Ok(())
        } else {
            Err(RuleError::InvalidPoW(header.hash))
        }
    }

    /// No parent may be an ancestor of another parent
    pub fn check_parents_antichain<S: ReachabilityStoreReader + ?Sized>(&self, store: &S, parents: &[Hash]) -> ConsensusResult<()> {
        for (&a, &b) in parents.iter().tuple_combinations() {
            if reachability::is_dag_ancestor_of(store, a, b)? {
                return Err(RuleError::InvalidParentsRelation(a, b).into());
            }
            if reachability::is_dag_ancestor_of(store, b, a)? {
                return Err(RuleError::InvalidParentsRelation(b, a).into());
            }
        }
        Ok(())
    }

    pub fn check_merge_set_size(&self, ghostdag_data: &GhostdagData) -> Result<(), RuleError> {
        let size = ghostdag_data.mergeset_size();
        if size as u64 > self.merge_set_size_limit {
            return Err(RuleError::MergeSetTooBig(size, self.merge_set_size_limit as usize));
        }
        Ok(())
    }

    /// Compares the header against the values derived from its past
    pub fn validate_header_in_context(&self, header: &Header, expected: &ExpectedHeaderFields) -> Result<(), RuleError> {
        let data = expected.ghostdag_data;
        if header.blue_score != data.blue_score {
            return Err(RuleError::UnexpectedBlueScore(data.blue_score, header.blue_score));
        }
        if header.blue_work != data.blue_work {
            return Err(RuleError::UnexpectedBlueWork(data.blue_work, header.blue_work));
        }
        if header.daa_score != expected.daa_score {
            return Err(RuleError::UnexpectedDaaScore(expected.daa_score, header.daa_score));
        }
        if header.bits != expected.bits {
            return Err(RuleError::UnexpectedDifficulty(expected.bits, header.bits));
        }
        if header.timestamp <= expected.past_median_time {
            return Err(RuleError::TimeTooOld(header.timestamp, expected.past_median_time));
        }
        if header.pruning_point != expected.pruning_point {
            return Err(RuleError::WrongHeaderPruningPoint(header.pruning_point, header.hash));
        }
        Ok(())
    }
}
