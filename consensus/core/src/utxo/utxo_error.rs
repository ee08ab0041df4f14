use thiserror::Error;

use crate::tx::TransactionOutpoint;

/// Violations of the UTXO diff algebra. Hitting one of these means an internal
/// state inconsistency, since validated transactions never produce them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UtxoAlgebraError {
    #[error("outpoint {0} is removed twice")]
    DuplicateRemovePoint(TransactionOutpoint),

    #[error("outpoint {0} is added twice")]
    DuplicateAddPoint(TransactionOutpoint),

    #[error("outpoint {0} is removed with an entry different from the one added")]
    ConflictingRemove(TransactionOutpoint),

    #[error("outpoint {0} is not present in the collection")]
    MissingOutpoint(TransactionOutpoint),

    #[error("outpoint {0} is already present in the collection")]
    OutpointAlreadyExists(TransactionOutpoint),
}

pub type UtxoResult<T> = Result<T, UtxoAlgebraError>;
