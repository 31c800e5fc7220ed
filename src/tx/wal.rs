//! Write-ahead log: an append-only file of newline-terminated records.
//!
//! Transaction lifecycle records are plain text; the optional `WRITE`
//! record embeds two raw 4096-byte page images (old, then new) between its
//! text prefix and the terminating newline. One mutex is held across every
//! record write including the fsync, so records never interleave and a
//! record is durable once the logging call returns. The log is parsed on
//! startup but not replayed.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::file::{PAGE_SIZE, PageId};

use super::TransactionId;
use super::error::{TxError, TxResult};

/// One parsed log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalRecord {
    Begin(TransactionId),
    Commit(TransactionId),
    Abort(TransactionId),
    Checkpoint,
    PageWrite {
        tid: TransactionId,
        page_id: PageId,
        old_data: Vec<u8>,
        new_data: Vec<u8>,
    },
}

pub struct WalManager {
    file: Mutex<File>,
    path: PathBuf,
}

impl WalManager {
    /// Open the log in append mode, creating it (and missing parent
    /// directories) if absent. The existing content is parsed so a corrupt
    /// log is reported at startup rather than on first use.
    pub fn open<P: AsRef<Path>>(path: P) -> TxResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let wal = Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
        };
        wal.scan()?;
        Ok(wal)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log_begin(&self, tid: TransactionId) -> TxResult<()> {
        self.append(format!("BEGIN {}\n", tid).as_bytes())
    }

    pub fn log_commit(&self, tid: TransactionId) -> TxResult<()> {
        self.append(format!("COMMIT {}\n", tid).as_bytes())
    }

    pub fn log_abort(&self, tid: TransactionId) -> TxResult<()> {
        self.append(format!("ABORT {}\n", tid).as_bytes())
    }

    pub fn log_checkpoint(&self) -> TxResult<()> {
        self.append(b"CHECKPOINT\n")
    }

    /// Log a page modification: the old image (for undo) then the new
    /// image (for redo), both exactly one page.
    pub fn log_page_write(
        &self,
        tid: TransactionId,
        page_id: PageId,
        old_data: &[u8],
        new_data: &[u8],
    ) -> TxResult<()> {
        for image in [old_data, new_data] {
            if image.len() != PAGE_SIZE {
                return Err(TxError::InvalidPageImage {
                    expected: PAGE_SIZE,
                    actual: image.len(),
                });
            }
        }

        let mut buf = Vec::with_capacity(32 + 2 * PAGE_SIZE);
        buf.extend_from_slice(format!("WRITE {} {} ", tid, page_id).as_bytes());
        buf.extend_from_slice(old_data);
        buf.extend_from_slice(new_data);
        buf.push(b'\n');
        self.append(&buf)
    }

    /// Parse every record in the log, in order.
    pub fn scan(&self) -> TxResult<Vec<WalRecord>> {
        let data = std::fs::read(&self.path)?;
        parse_records(&data)
    }

    /// Drop all records. Only ever called on explicit request.
    pub fn truncate(&self) -> TxResult<()> {
        let mut file = self.file.lock().expect("wal lock poisoned");
        File::create(&self.path)?;
        *file = OpenOptions::new().append(true).open(&self.path)?;
        Ok(())
    }

    fn append(&self, bytes: &[u8]) -> TxResult<()> {
        let mut file = self.file.lock().expect("wal lock poisoned");
        file.write_all(bytes)?;
        file.sync_data()?;
        Ok(())
    }
}

fn parse_records(data: &[u8]) -> TxResult<Vec<WalRecord>> {
    let mut records = Vec::new();
    let mut pos = 0usize;

    while pos < data.len() {
        let start = pos;
        let tag = read_token(data, &mut pos, start)?;
        let record = match tag {
            "CHECKPOINT" => {
                expect_byte(data, &mut pos, b'\n', start)?;
                WalRecord::Checkpoint
            }
            "BEGIN" | "COMMIT" | "ABORT" => {
                expect_byte(data, &mut pos, b' ', start)?;
                let tid = read_number(data, &mut pos, start)? as TransactionId;
                expect_byte(data, &mut pos, b'\n', start)?;
                match tag {
                    "BEGIN" => WalRecord::Begin(tid),
                    "COMMIT" => WalRecord::Commit(tid),
                    _ => WalRecord::Abort(tid),
                }
            }
            "WRITE" => {
                expect_byte(data, &mut pos, b' ', start)?;
                let tid = read_number(data, &mut pos, start)? as TransactionId;
                expect_byte(data, &mut pos, b' ', start)?;
                let page_id = read_number(data, &mut pos, start)? as PageId;
                expect_byte(data, &mut pos, b' ', start)?;
                let old_data = read_exact(data, &mut pos, PAGE_SIZE, start)?.to_vec();
                let new_data = read_exact(data, &mut pos, PAGE_SIZE, start)?.to_vec();
                expect_byte(data, &mut pos, b'\n', start)?;
                WalRecord::PageWrite {
                    tid,
                    page_id,
                    old_data,
                    new_data,
                }
            }
            other => {
                return Err(TxError::MalformedLog {
                    offset: start,
                    reason: format!("unknown record tag '{}'", other),
                });
            }
        };
        records.push(record);
    }

    Ok(records)
}

/// Read up to (not including) the next space or newline.
fn read_token<'a>(data: &'a [u8], pos: &mut usize, record_start: usize) -> TxResult<&'a str> {
    let rest = &data[*pos..];
    let len = rest
        .iter()
        .position(|&b| b == b' ' || b == b'\n')
        .ok_or_else(|| TxError::MalformedLog {
            offset: record_start,
            reason: "unterminated record".to_string(),
        })?;
    let token = std::str::from_utf8(&rest[..len]).map_err(|_| TxError::MalformedLog {
        offset: record_start,
        reason: "non-UTF-8 record tag".to_string(),
    })?;
    *pos += len;
    Ok(token)
}

fn read_number(data: &[u8], pos: &mut usize, record_start: usize) -> TxResult<u64> {
    let rest = &data[*pos..];
    let len = rest.iter().take_while(|b| b.is_ascii_digit()).count();
    if len == 0 {
        return Err(TxError::MalformedLog {
            offset: record_start,
            reason: "expected a number".to_string(),
        });
    }
    let digits = std::str::from_utf8(&rest[..len]).expect("digits are ASCII");
    let number = digits.parse().map_err(|_| TxError::MalformedLog {
        offset: record_start,
        reason: format!("number '{}' out of range", digits),
    })?;
    *pos += len;
    Ok(number)
}

fn expect_byte(data: &[u8], pos: &mut usize, expected: u8, record_start: usize) -> TxResult<()> {
    match data.get(*pos) {
        Some(&b) if b == expected => {
            *pos += 1;
            Ok(())
        }
        _ => Err(TxError::MalformedLog {
            offset: record_start,
            reason: format!("expected byte {:?}", expected as char),
        }),
    }
}

fn read_exact<'a>(
    data: &'a [u8],
    pos: &mut usize,
    len: usize,
    record_start: usize,
) -> TxResult<&'a [u8]> {
    let slice = data
        .get(*pos..*pos + len)
        .ok_or_else(|| TxError::MalformedLog {
            offset: record_start,
            reason: format!("truncated record: {} payload bytes missing", len),
        })?;
    *pos += len;
    Ok(slice)
}
