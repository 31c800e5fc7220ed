use thiserror::Error;

use super::PageId;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid page buffer size: expected {expected}, got {actual}")]
    InvalidPageSize { expected: usize, actual: usize },

    #[error("No evictable frame for page {0}: all frames are pinned")]
    NoEvictableFrame(PageId),
}

pub type FileResult<T> = Result<T, FileError>;
