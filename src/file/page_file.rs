use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::error::{FileError, FileResult};
use super::{PAGE_SIZE, PageId};

/// Positioned 4KB-page I/O over a single host file.
///
/// Pages are addressed by id; page `n` occupies bytes
/// `[n * PAGE_SIZE, (n + 1) * PAGE_SIZE)`. Page 0 is reserved by callers,
/// so the first real page of a table is id 1.
pub struct PageFile {
    file: File,
    path: PathBuf,
}

impl PageFile {
    /// Open the file at `path`, creating it (and missing parent
    /// directories) if absent.
    pub fn open<P: AsRef<Path>>(path: P) -> FileResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read one page into `buffer`.
    ///
    /// A range partially or fully past end-of-file reads back as zeros, so
    /// a page that has never been written comes back with an all-zero
    /// header (distinguishable from a real page because page id 0 is
    /// reserved).
    pub fn read_page(&mut self, page_id: PageId, buffer: &mut [u8]) -> FileResult<()> {
        if buffer.len() != PAGE_SIZE {
            return Err(FileError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: buffer.len(),
            });
        }

        let offset = page_id as u64 * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < PAGE_SIZE {
            let n = self.file.read(&mut buffer[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buffer[filled..].fill(0);

        Ok(())
    }

    /// Write one page, zero-extending the file first when the target
    /// offset lies past end-of-file.
    pub fn write_page(&mut self, page_id: PageId, buffer: &[u8]) -> FileResult<()> {
        if buffer.len() != PAGE_SIZE {
            return Err(FileError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: buffer.len(),
            });
        }

        let offset = page_id as u64 * PAGE_SIZE as u64;
        let current_len = self.file.metadata()?.len();
        if current_len < offset {
            self.file.set_len(offset)?;
        }

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buffer)?;

        Ok(())
    }

    /// Number of pages the file currently backs.
    pub fn page_count(&self) -> FileResult<usize> {
        let len = self.file.metadata()?.len();
        Ok(len.div_ceil(PAGE_SIZE as u64) as usize)
    }

    /// Force buffered writes to stable storage.
    pub fn flush(&mut self) -> FileResult<()> {
        self.file.sync_data()?;
        Ok(())
    }
}
