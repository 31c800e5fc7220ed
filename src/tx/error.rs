use thiserror::Error;

use super::TransactionId;

#[derive(Debug, Error)]
pub enum TxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transaction {0} not found")]
    UnknownTransaction(TransactionId),

    #[error("Transaction {0} is not active")]
    NotActive(TransactionId),

    #[error("Page image must be {expected} bytes, got {actual}")]
    InvalidPageImage { expected: usize, actual: usize },

    #[error("Malformed WAL record at byte {offset}: {reason}")]
    MalformedLog { offset: usize, reason: String },
}

pub type TxResult<T> = Result<T, TxError>;
