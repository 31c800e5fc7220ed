use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Tuple of {size} bytes exceeds the page capacity of {max} bytes")]
    OversizeTuple { size: usize, max: usize },

    #[error("Page is full: {needed} bytes needed, {free} free")]
    PageFull { needed: usize, free: usize },

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

pub type RecordResult<T> = Result<T, RecordError>;
