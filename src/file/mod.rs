mod buffer_pool;
mod error;
mod page_file;

pub use buffer_pool::{BufferPool, PageReadGuard, PageWriteGuard, PoolStats};
pub use error::{FileError, FileResult};
pub use page_file::PageFile;

/// Page size in bytes (4KB, matches the OS page size)
pub const PAGE_SIZE: usize = 4096;

/// Default number of frames in the buffer pool (1000 x 4KB = 4MB of cache)
pub const BUFFER_POOL_SIZE: usize = 1000;

/// Page ID type; id 0 is reserved and means "no page"
pub type PageId = u32;

/// Index of a frame within a buffer pool
pub type FrameId = usize;
