//! Validation flow for block processing
//!
//! Tracks how far a block got through the pipeline so that rejections can be
//! reported with the stage they happened at.

use std::fmt;
use std::time::{Duration, Instant};

use consensus_core::errors::ConsensusError;
use consensus_core::Hash;
use tracing::{debug, error, trace, warn};

/// Pipeline stages, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValidationStage {
    Received,
    /// Header and body passed the context-free checks
    StructurallyValidated,
    /// Header placed in the DAG and its fields match the values derived from the block's past
    ContextuallyValidated,
    /// Transactions validated and the UTXO diff computed
    UtxoApplied,
    Committed,
}

impl fmt::Display for ValidationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValidationStage::Received => "received",
            ValidationStage::StructurallyValidated => "structurally validated",
            ValidationStage::ContextuallyValidated => "contextually validated",
            ValidationStage::UtxoApplied => "utxo applied",
            ValidationStage::Committed => "committed",
        };
        f.write_str(name)
    }
}

/// Validation flow of a single block
#[derive(Debug)]
pub struct ValidationFlow {
    hash: Hash,
    stage: ValidationStage,
    started: Instant,
}

impl ValidationFlow {
    pub fn new(hash: Hash) -> Self {
        Self { hash, stage: ValidationStage::Received, started: Instant::now() }
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn stage(&self) -> ValidationStage {
        self.stage
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Moves to `stage`; stages only move forward
    pub fn advance(&mut self, stage: ValidationStage) {
        if stage <= self.stage {
            return;
        }
        trace!("Block {} {} after {:?}", self.hash, stage, self.elapsed());
        self.stage = stage;
    }

    /// Logs a rejection at the current stage and passes the error through
    pub fn reject(&self, err: ConsensusError) -> ConsensusError {
        match &err {
            err if err.is_fatal() => {
                error!("Block {} failed with a fatal error after being {}: {}", self.hash, self.stage, err)
            }
            ConsensusError::Rule(rule) if rule.is_penalizable() => {
                warn!("Block {} rejected after being {}: {} (penalize: true)", self.hash, self.stage, rule)
            }
            _ => debug!("Block {} not accepted after being {}: {}", self.hash, self.stage, err),
        }
        err
    }
}
