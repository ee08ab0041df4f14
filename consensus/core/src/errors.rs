//! Error taxonomy of the consensus engine.
//!
//! * [`RuleError`]: a block or transaction breaks a protocol rule. The block is
//!   rejected, state is untouched, and [`RuleError::is_penalizable`] tells the
//!   networking layer whether the sender should be punished.
//! * [`ProtocolError`]: availability problems (timeouts, cancellation, overload)
//!   surfaced to the caller for peer-level handling.
//! * Fatal errors ([`ConsensusError::is_fatal`]): storage failures and broken
//!   internal invariants. The engine halts instead of serving an inconsistent view.

use thiserror::Error;

use crate::config::ConfigError;
use crate::tx::{TransactionId, TransactionOutpoint};
use crate::utxo::utxo_error::UtxoAlgebraError;
use crate::{BlueWorkType, Hash};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxRuleError {
    #[error("transaction has no inputs")]
    NoTxInputs,

    #[error("transaction has too many inputs ({0})")]
    TooManyInputs(usize),

    #[error("transaction has too many outputs ({0})")]
    TooManyOutputs(usize),

    #[error("transaction has duplicate input {0}")]
    DuplicateInputs(TransactionOutpoint),

    #[error("coinbase transaction has {0} inputs")]
    CoinbaseHasInputs(usize),

    #[error("non-coinbase transaction uses the coinbase subnetwork")]
    UnexpectedCoinbaseSubnetwork,

    #[error("payload length {0} exceeds the limit of {1}")]
    PayloadTooLong(usize, usize),

    #[error("total output value overflows or exceeds the money supply")]
    OutputValueOverflow,

    #[error("spent output {0} is missing from the UTXO view")]
    MissingTxOutpoint(TransactionOutpoint),

    #[error("coinbase output {0} created at DAA score {1} is not mature at DAA score {2} (maturity {3})")]
    ImmatureCoinbaseSpend(TransactionOutpoint, u64, u64, u64),

    #[error("input value {0} is lower than output value {1}")]
    SpendTooHigh(u64, u64),

    #[error("input {0} uses an unsupported script")]
    NonStandardScript(usize),

    #[error("input {0} has a malformed signature script")]
    MalformedSignatureScript(usize),

    #[error("signature of input {0} is invalid")]
    InvalidSignature(usize),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("block {0} is already known")]
    DuplicateBlock(Hash),

    #[error("block {0} is known to be invalid")]
    KnownInvalid(Hash),

    #[error("block {0} has unknown parents {1:?}")]
    MissingParents(Hash, Vec<Hash>),

    #[error("block {0} has invalid parent {1}")]
    InvalidParent(Hash, Hash),

    #[error("header hash of {0} does not match its content")]
    HashMismatch(Hash),

    #[error("wrong block version {0}")]
    WrongBlockVersion(u16),

    #[error("block has no parents")]
    NoParents,

    #[error("block has {0} parents, the limit is {1}")]
    TooManyParents(usize, usize),

    #[error("parent {0} appears twice")]
    DuplicateParents(Hash),

    #[error("parent {0} is an ancestor of parent {1}")]
    InvalidParentsRelation(Hash, Hash),

    #[error("block {0} does not satisfy its proof of work target")]
    InvalidPoW(Hash),

    #[error("merkle root mismatch: expected {0}, header carries {1}")]
    BadMerkleRoot(Hash, Hash),

    #[error("block has no transactions")]
    NoTransactions,

    #[error("first transaction is not a coinbase")]
    FirstTxNotCoinbase,

    #[error("block has {0} coinbase transactions")]
    MultipleCoinbases(usize),

    #[error("transaction {0} appears twice in the block")]
    DuplicateTransactions(TransactionId),

    #[error("transaction {0} carries an id that does not match its content")]
    TransactionIdMismatch(TransactionId),

    #[error("block mass {0} exceeds the limit of {1}")]
    ExceedsMassLimit(u64, u64),

    #[error("transaction {1} is invalid: {0}")]
    Tx(TxRuleError, TransactionId),

    #[error("merge set of size {0} exceeds the limit of {1}")]
    MergeSetTooBig(usize, usize),

    #[error("expected blue score {0}, header carries {1}")]
    UnexpectedBlueScore(u64, u64),

    #[error("expected blue work {0}, header carries {1}")]
    UnexpectedBlueWork(BlueWorkType, BlueWorkType),

    #[error("expected DAA score {0}, header carries {1}")]
    UnexpectedDaaScore(u64, u64),

    #[error("expected difficulty bits {0:#x}, header carries {1:#x}")]
    UnexpectedDifficulty(u32, u32),

    #[error("timestamp {0} is not after the past median time {1}")]
    TimeTooOld(u64, u64),

    #[error("timestamp {0} is later than the allowed maximum {1}")]
    TimeTooFarIntoTheFuture(u64, u64),

    #[error("selected parent {0} is not in the future of the pruning point {1}")]
    PruningViolation(Hash, Hash),

    #[error("header pruning point {0} is not acceptable for block {1}")]
    WrongHeaderPruningPoint(Hash, Hash),

    #[error("expected UTXO commitment {0}, header carries {1}")]
    BadUtxoCommitment(Hash, Hash),

    #[error("outpoint {0} is spent twice within the block")]
    DoubleSpendInSameBlock(TransactionOutpoint),

    #[error("coinbase pays {0}, more than the allowed {1}")]
    BadCoinbaseAmount(u64, u64),

    #[error("coinbase payload length {0} exceeds the limit of {1}")]
    CoinbasePayloadTooLong(usize, usize),
}

impl RuleError {
    /// Whether the peer that relayed the offending data should be penalized.
    /// Benign races (duplicates, parents still in flight, clock skew) are tolerated.
    pub fn is_penalizable(&self) -> bool {
        !matches!(self, RuleError::DuplicateBlock(_) | RuleError::MissingParents(..) | RuleError::TimeTooFarIntoTheFuture(..))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("timed out after {1} ms waiting for parents of {0}")]
    MissingParentsTimeout(Hash, u64),

    #[error("pending block limit of {0} reached")]
    PendingLimitReached(usize),

    #[error("processing of block {0} was cancelled")]
    Cancelled(Hash),

    #[error("the block pipeline is shutting down")]
    ShuttingDown,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PruningProofError {
    #[error("proof contains no headers")]
    Empty,

    #[error("proof names pruning point {0} but its last header is {1}")]
    PruningPointMismatch(Hash, Hash),

    #[error("header {0} in the proof does not hash to its claimed hash")]
    HashMismatch(Hash),

    #[error("header {0} appears twice in the proof")]
    DuplicateHeader(Hash),

    #[error("header {0} appears before its parent {1}")]
    NotTopological(Hash, Hash),

    #[error("header {0} fails its proof of work")]
    InvalidPoW(Hash),

    #[error("header {0} has bits {1:#010x}, outside the network difficulty range")]
    InvalidBits(Hash, u32),

    #[error("header {0} claims blue score {1} but the proof computes {2}")]
    BlueScoreMismatch(Hash, u64, u64),

    #[error("header {0} claims blue work {1} but the proof computes {2}")]
    BlueWorkMismatch(Hash, BlueWorkType, BlueWorkType),

    #[error("header {0} is outside the proof window")]
    OutsideWindow(Hash),

    #[error("proof has {0} headers and does not reach genesis, at least {1} are required")]
    TooShallow(usize, u64),

    #[error("proof headers carry {0} work, not more than the local {1}")]
    InsufficientWork(BlueWorkType, BlueWorkType),

    #[error("UTXO commitment {1} does not match the pruning point commitment {0}")]
    UtxoCommitmentMismatch(Hash, Hash),

    #[error("pruning point block {0} does not match the applied proof")]
    UnexpectedPruningPointBlock(Hash),

    #[error("no pruning point proof was applied")]
    NoPendingProof,

    #[error("GHOSTDAG over the proof failed: {0}")]
    Ghostdag(String),
}

impl PruningProofError {
    /// A proof with merely less work than ours is not an attack
    pub fn is_penalizable(&self) -> bool {
        !matches!(self, PruningProofError::InsufficientWork(..) | PruningProofError::NoPendingProof)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    #[error("rule error: {0}")]
    Rule(#[from] RuleError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("pruning proof error: {0}")]
    PruningProof(#[from] PruningProofError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("block {0} violates finality point {1}; manual resolution required")]
    FinalityViolation(Hash, Hash),

    #[error("no finality conflict involving {0} is pending")]
    UnknownFinalityConflict(Hash),

    #[error("block {0} is not known")]
    UnknownBlock(Hash),

    #[error("block {0} is not a selected chain ancestor of {1}")]
    NotChainAncestor(Hash, Hash),

    #[error("waiting for the UTXO set of pruning point {0}")]
    AwaitingPruningPointUtxoSet(Hash),

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("missing data: {0}")]
    MissingData(String),

    #[error("reachability invariant violated: {0}")]
    Reachability(String),

    #[error("UTXO algebra error: {0}")]
    UtxoAlgebra(#[from] UtxoAlgebraError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("consensus is halted after a fatal error")]
    Halted,
}

impl ConsensusError {
    /// Errors after which the engine must stop mutating state
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ConsensusError::Storage(_)
                | ConsensusError::MissingData(_)
                | ConsensusError::Reachability(_)
                | ConsensusError::UtxoAlgebra(_)
                | ConsensusError::Internal(_)
        )
    }

    pub fn is_penalizable(&self) -> bool {
        match self {
            ConsensusError::Rule(err) => err.is_penalizable(),
            ConsensusError::PruningProof(err) => err.is_penalizable(),
            _ => false,
        }
    }

    pub fn as_rule_error(&self) -> Option<&RuleError> {
        match self {
            ConsensusError::Rule(err) => Some(err),
            _ => None,
        }
    }
}

pub type ConsensusResult<T> = Result<T, ConsensusError>;
pub type BlockProcessResult<T> = Result<T, ConsensusError>;
pub type TxResult<T> = Result<T, TxRuleError>;
