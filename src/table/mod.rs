//! Table storage: an ordered chain of data pages plus in-memory column
//! indexes.
//!
//! Each table owns one page file and one buffer pool. Pages form a singly
//! linked list starting at the head page; tuples are appended into the
//! first page of the chain with room, and a freshly allocated page is
//! spliced in directly after the head, so the second chain link is always
//! the newest page and physical order does not match insertion order.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

use crate::btree::BTree;
use crate::file::{BufferPool, FileError, PageFile, PageId};
use crate::record::{
    HeapPage, MAX_TUPLE_SIZE, PageRef, RecordError, Schema, Tuple, TupleHeader, TupleId, Value,
};
use crate::tx::{TransactionId, TxError, WalManager};

#[derive(Debug, Error)]
pub enum TableError {
    #[error("Column {0} not found")]
    ColumnNotFound(String),

    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    #[error("WAL error: {0}")]
    Wal(#[from] TxError),
}

pub type TableResult<T> = Result<T, TableError>;

enum InsertProbe {
    Inserted,
    Next(PageId),
}

/// One database table: schema, page chain, id counters and indexes.
pub struct Table {
    name: String,
    schema: Schema,
    head_page_id: PageId,
    next_page_id: PageId,
    next_tuple_id: TupleId,
    buffer_pool: BufferPool,
    indexes: HashMap<String, BTree<String, TupleId>>,
}

impl Table {
    /// Open the table's data file at `path` (creating it when new) and
    /// adopt any existing page chain: if page 1 reads back with its own id
    /// and a nonzero tuple count, it becomes the head and the id counters
    /// resume past the highest stored page and tuple ids.
    pub fn open<P: AsRef<Path>>(
        name: impl Into<String>,
        schema: Schema,
        path: P,
        pool_capacity: usize,
    ) -> TableResult<Self> {
        let file = PageFile::open(path)?;
        let buffer_pool = BufferPool::with_capacity(file, pool_capacity);

        let mut table = Self {
            name: name.into(),
            schema,
            head_page_id: 0,
            next_page_id: 1,
            next_tuple_id: 1,
            buffer_pool,
            indexes: HashMap::new(),
        };

        table.load_existing()?;
        if table.head_page_id == 0 {
            table.head_page_id = table.allocate_page()?;
        }

        Ok(table)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn buffer_pool(&self) -> &BufferPool {
        &self.buffer_pool
    }

    /// Insert a row. A tuple with id 0 is assigned the next tuple id.
    /// Returns the id the row was stored under.
    pub fn insert_tuple(&mut self, tuple: Tuple) -> TableResult<TupleId> {
        self.insert_inner(tuple, None)
    }

    /// Insert a row, logging the receiving page's before/after images to
    /// the WAL under `tid`.
    pub fn insert_tuple_logged(
        &mut self,
        tuple: Tuple,
        wal: &WalManager,
        tid: TransactionId,
    ) -> TableResult<TupleId> {
        self.insert_inner(tuple, Some((wal, tid)))
    }

    fn insert_inner(
        &mut self,
        mut tuple: Tuple,
        wal: Option<(&WalManager, TransactionId)>,
    ) -> TableResult<TupleId> {
        self.schema.validate(&tuple.values)?;

        if tuple.id == 0 {
            tuple.id = self.next_tuple_id;
            self.next_tuple_id += 1;
        }

        let encoded = tuple.encode(&self.schema)?;
        if encoded.len() > MAX_TUPLE_SIZE {
            return Err(RecordError::OversizeTuple {
                size: encoded.len(),
                max: MAX_TUPLE_SIZE,
            }
            .into());
        }

        let mut inserted = false;
        let mut current = self.head_page_id;
        while current != 0 {
            match self.try_insert_into_page(current, &encoded, wal)? {
                InsertProbe::Inserted => {
                    inserted = true;
                    break;
                }
                InsertProbe::Next(next) => current = next,
            }
        }

        if !inserted {
            self.insert_into_new_page(&encoded, wal)?;
        }

        for (column, index) in &mut self.indexes {
            if let Some(col_idx) = self.schema.column_index(column) {
                index.insert(tuple.values[col_idx].stringify(), tuple.id);
            }
        }

        Ok(tuple.id)
    }

    /// Append the encoded tuple into `page_id` if it has room; otherwise
    /// report the next page in the chain.
    fn try_insert_into_page(
        &self,
        page_id: PageId,
        encoded: &[u8],
        wal: Option<(&WalManager, TransactionId)>,
    ) -> TableResult<InsertProbe> {
        let mut guard = self.buffer_pool.get_page_mut(page_id)?;
        let old_image = wal.is_some().then(|| guard.to_vec());

        let (fits, next) = {
            let mut page = HeapPage::from_buffer(&mut guard)?;
            if encoded.len() <= page.free_space() as usize {
                page.append_tuple(encoded)?;
                (true, 0)
            } else {
                (false, page.next_page())
            }
        };

        if fits {
            guard.mark_dirty();
            if let (Some((wal, tid)), Some(old)) = (wal, old_image) {
                wal.log_page_write(tid, page_id, &old, &guard)?;
            }
            Ok(InsertProbe::Inserted)
        } else {
            Ok(InsertProbe::Next(next))
        }
    }

    /// Every chained page was full: allocate a fresh page, put the tuple
    /// there and splice the page in directly after the head so the rest of
    /// the chain stays reachable.
    fn insert_into_new_page(
        &mut self,
        encoded: &[u8],
        wal: Option<(&WalManager, TransactionId)>,
    ) -> TableResult<()> {
        let new_page_id = self.next_page_id;
        self.next_page_id += 1;

        let old_next = {
            let guard = self.buffer_pool.get_page(self.head_page_id)?;
            PageRef::new(&guard)?.next_page()
        };

        {
            let mut guard = self.buffer_pool.get_page_mut(new_page_id)?;
            let old_image = wal.is_some().then(|| guard.to_vec());
            {
                let mut page = HeapPage::init(&mut guard, new_page_id)?;
                page.set_next_page(old_next);
                page.append_tuple(encoded)?;
            }
            guard.mark_dirty();
            if let (Some((wal, tid)), Some(old)) = (wal, old_image) {
                wal.log_page_write(tid, new_page_id, &old, &guard)?;
            }
        }

        {
            let mut guard = self.buffer_pool.get_page_mut(self.head_page_id)?;
            {
                let mut page = HeapPage::from_buffer(&mut guard)?;
                page.set_next_page(new_page_id);
            }
            guard.mark_dirty();
        }

        Ok(())
    }

    /// Full scan: every tuple in chain order.
    pub fn select_all(&self) -> TableResult<Vec<Tuple>> {
        let mut tuples = Vec::new();
        let mut current = self.head_page_id;

        while current != 0 {
            let guard = self.buffer_pool.get_page(current)?;
            let page = PageRef::new(&guard)?;
            for slice in page.tuple_slices()? {
                tuples.push(Tuple::decode(slice, &self.schema)?);
            }
            current = page.next_page();
        }

        Ok(tuples)
    }

    /// Filtered scan. With an index on `column` the stringified value is
    /// looked up exactly (duplicate keys collapse to the last-inserted
    /// tuple id); otherwise every tuple's field at the column position is
    /// compared with type-strict equality.
    pub fn select_where(&self, column: &str, value: &Value) -> TableResult<Vec<Tuple>> {
        let col_idx = self
            .schema
            .column_index(column)
            .ok_or_else(|| TableError::ColumnNotFound(column.to_string()))?;

        if let Some(index) = self.indexes.get(column) {
            let Some(&tuple_id) = index.search(&value.stringify()) else {
                return Ok(Vec::new());
            };
            return Ok(self
                .select_all()?
                .into_iter()
                .filter(|t| t.id == tuple_id)
                .collect());
        }

        Ok(self
            .select_all()?
            .into_iter()
            .filter(|t| t.values.get(col_idx) == Some(value))
            .collect())
    }

    /// Build a B-tree index over `column` from the existing rows. A second
    /// call for the same column is a no-op; later inserts keep it live.
    pub fn create_index(&mut self, column: &str) -> TableResult<()> {
        if self.indexes.contains_key(column) {
            return Ok(());
        }

        let col_idx = self
            .schema
            .column_index(column)
            .ok_or_else(|| TableError::ColumnNotFound(column.to_string()))?;

        let mut index = BTree::new();
        for tuple in self.select_all()? {
            index.insert(tuple.values[col_idx].stringify(), tuple.id);
        }
        self.indexes.insert(column.to_string(), index);

        Ok(())
    }

    pub fn has_index(&self, column: &str) -> bool {
        self.indexes.contains_key(column)
    }

    /// Indexed column names, sorted for a stable metadata encoding.
    pub fn indexed_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = self.indexes.keys().cloned().collect();
        columns.sort();
        columns
    }

    /// Row count from the page headers along the chain.
    pub fn tuple_count(&self) -> TableResult<u64> {
        let mut count = 0u64;
        let mut current = self.head_page_id;

        while current != 0 {
            let guard = self.buffer_pool.get_page(current)?;
            let page = PageRef::new(&guard)?;
            count += page.tuple_count() as u64;
            current = page.next_page();
        }

        Ok(count)
    }

    /// Write every dirty page of this table to disk.
    pub fn flush(&self) -> TableResult<()> {
        self.buffer_pool.flush_all()?;
        Ok(())
    }

    /// Probe page 1 for an existing chain and recompute the id counters.
    fn load_existing(&mut self) -> TableResult<()> {
        let adopt = {
            let guard = self.buffer_pool.get_page(1)?;
            let page = PageRef::new(&guard)?;
            page.page_id() == 1 && page.tuple_count() > 0
        };
        if !adopt {
            return Ok(());
        }

        self.head_page_id = 1;
        let mut max_page_id: PageId = 1;
        let mut max_tuple_id: TupleId = 0;

        let mut current = self.head_page_id;
        while current != 0 {
            // The guard's pin drops at the end of each iteration, before
            // the walk advances
            let guard = self.buffer_pool.get_page(current)?;
            let page = PageRef::new(&guard)?;
            max_page_id = max_page_id.max(current);
            for slice in page.tuple_slices()? {
                let header = TupleHeader::deserialize(slice)?;
                max_tuple_id = max_tuple_id.max(header.tuple_id);
            }
            current = page.next_page();
        }

        self.next_page_id = max_page_id + 1;
        self.next_tuple_id = max_tuple_id + 1;
        Ok(())
    }

    /// Initialise a fresh page under the next page id.
    fn allocate_page(&mut self) -> TableResult<PageId> {
        let page_id = self.next_page_id;
        self.next_page_id += 1;

        let mut guard = self.buffer_pool.get_page_mut(page_id)?;
        HeapPage::init(&mut guard, page_id)?;
        guard.mark_dirty();

        Ok(page_id)
    }

    #[cfg(test)]
    fn chain_pages(&self) -> TableResult<Vec<PageId>> {
        let mut pages = Vec::new();
        let mut current = self.head_page_id;
        while current != 0 {
            pages.push(current);
            let guard = self.buffer_pool.get_page(current)?;
            current = PageRef::new(&guard)?.next_page();
        }
        Ok(pages)
    }
}
