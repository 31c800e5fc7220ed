//! Database facade: the table map, the transaction manager and the
//! metadata catalog, driven either through typed methods or through parsed
//! SQL statements.
//!
//! The catalog (`<db>.meta`) is a little-endian binary file written
//! atomically (temp file + rename) on every table create/drop and on
//! shutdown. It records each table's schema and its indexed columns;
//! indexes are rebuilt by a full scan when the database is reopened.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::file::{BUFFER_POOL_SIZE, FileError};
use crate::record::{DataType, RecordError, Schema, Tuple, TupleId, Value};
use crate::sql::Statement;
use crate::table::{Table, TableError};
use crate::tx::{TransactionId, TransactionManager, TxError};

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Table {0} already exists")]
    TableExists(String),

    #[error("Table {0} not found")]
    TableNotFound(String),

    #[error("No transaction in progress")]
    NoActiveTransaction,

    #[error("A transaction is already in progress")]
    TransactionInProgress,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    #[error("Table error: {0}")]
    Table(#[from] TableError),

    #[error("Transaction error: {0}")]
    Tx(#[from] TxError),

    #[error("Corrupt metadata: {0}")]
    CorruptMetadata(String),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Frames per table buffer pool
    pub pool_size: usize,
    /// Log WRITE records with page before/after images for inserts made
    /// inside a transaction
    pub log_page_writes: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            pool_size: BUFFER_POOL_SIZE,
            log_page_writes: false,
        }
    }
}

/// Outcome of one executed statement.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Empty,
    RowsAffected(usize),
    Rows {
        columns: Vec<String>,
        tuples: Vec<Tuple>,
    },
}

/// One open database: a set of tables sharing a path prefix.
///
/// On-disk layout for a database opened at `data/app`:
/// `data/app.<table>` per-table page files, `data/app.meta` the catalog,
/// `data/app.log` the WAL.
pub struct Database {
    path: PathBuf,
    config: DatabaseConfig,
    tables: HashMap<String, Table>,
    tx_manager: TransactionManager,
    current_tx: Option<TransactionId>,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> DatabaseResult<Self> {
        Self::open_with(path, DatabaseConfig::default())
    }

    pub fn open_with<P: AsRef<Path>>(path: P, config: DatabaseConfig) -> DatabaseResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tx_manager = TransactionManager::open(suffixed(&path, "log"))?;

        let mut db = Self {
            path,
            config,
            tables: HashMap::new(),
            tx_manager,
            current_tx: None,
        };
        db.load_metadata()?;
        Ok(db)
    }

    pub fn tx_manager(&self) -> &TransactionManager {
        &self.tx_manager
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Table names, sorted.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn in_transaction(&self) -> bool {
        self.current_tx.is_some()
    }

    /// Create a table and persist the catalog.
    pub fn create_table(&mut self, name: &str, schema: Schema) -> DatabaseResult<()> {
        if self.tables.contains_key(name) {
            return Err(DatabaseError::TableExists(name.to_string()));
        }

        let table = Table::open(
            name,
            schema,
            self.table_file_path(name),
            self.config.pool_size,
        )?;
        self.tables.insert(name.to_string(), table);
        self.save_metadata()?;
        Ok(())
    }

    /// Drop a table, delete its data file and persist the catalog. Without
    /// the file removal a later create of the same name would adopt the
    /// stale page chain during the page-1 probe.
    pub fn drop_table(&mut self, name: &str) -> DatabaseResult<()> {
        if self.tables.remove(name).is_none() {
            return Err(DatabaseError::TableNotFound(name.to_string()));
        }

        match fs::remove_file(self.table_file_path(name)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        self.save_metadata()?;
        Ok(())
    }

    /// Insert a row. Inside a transaction with page-write logging enabled
    /// the receiving page's before/after images go to the WAL.
    pub fn insert(&mut self, table: &str, values: Vec<Value>) -> DatabaseResult<TupleId> {
        let table_ref = self
            .tables
            .get_mut(table)
            .ok_or_else(|| DatabaseError::TableNotFound(table.to_string()))?;

        let tuple = Tuple::new(values);
        let id = match (self.config.log_page_writes, self.current_tx) {
            (true, Some(tid)) => table_ref.insert_tuple_logged(tuple, self.tx_manager.wal(), tid)?,
            _ => table_ref.insert_tuple(tuple)?,
        };
        Ok(id)
    }

    pub fn select_all(&self, table: &str) -> DatabaseResult<Vec<Tuple>> {
        let table_ref = self
            .tables
            .get(table)
            .ok_or_else(|| DatabaseError::TableNotFound(table.to_string()))?;
        Ok(table_ref.select_all()?)
    }

    pub fn select_where(
        &self,
        table: &str,
        column: &str,
        value: &Value,
    ) -> DatabaseResult<Vec<Tuple>> {
        let table_ref = self
            .tables
            .get(table)
            .ok_or_else(|| DatabaseError::TableNotFound(table.to_string()))?;
        Ok(table_ref.select_where(column, value)?)
    }

    /// Create an index and persist the catalog so the index definition
    /// survives a restart.
    pub fn create_index(&mut self, table: &str, column: &str) -> DatabaseResult<()> {
        let table_ref = self
            .tables
            .get_mut(table)
            .ok_or_else(|| DatabaseError::TableNotFound(table.to_string()))?;
        table_ref.create_index(column)?;
        self.save_metadata()?;
        Ok(())
    }

    /// Start a transaction. One transaction at a time at this interface.
    pub fn begin(&mut self) -> DatabaseResult<TransactionId> {
        if self.current_tx.is_some() {
            return Err(DatabaseError::TransactionInProgress);
        }
        let tid = self.tx_manager.begin()?;
        self.current_tx = Some(tid);
        Ok(tid)
    }

    pub fn commit(&mut self) -> DatabaseResult<()> {
        let tid = self.current_tx.take().ok_or(DatabaseError::NoActiveTransaction)?;
        self.tx_manager.commit(tid)?;
        Ok(())
    }

    pub fn rollback(&mut self) -> DatabaseResult<()> {
        let tid = self.current_tx.take().ok_or(DatabaseError::NoActiveTransaction)?;
        self.tx_manager.abort(tid)?;
        Ok(())
    }

    /// Flush every table's dirty pages, then append CHECKPOINT to the WAL.
    pub fn checkpoint(&self) -> DatabaseResult<()> {
        for table in self.tables.values() {
            table.flush()?;
        }
        self.tx_manager.checkpoint()?;
        Ok(())
    }

    /// Roll back a pending transaction, save the catalog and checkpoint.
    /// Called from Drop; safe to call more than once.
    pub fn shutdown(&mut self) -> DatabaseResult<()> {
        if self.current_tx.is_some() {
            self.rollback()?;
        }
        self.save_metadata()?;
        self.checkpoint()?;
        Ok(())
    }

    /// Execute one parsed statement.
    pub fn execute(&mut self, statement: Statement) -> DatabaseResult<QueryResult> {
        match statement {
            Statement::CreateTable { name, columns } => {
                let mut schema = Schema::default();
                for column in columns {
                    schema.add_column(column.name, column.data_type, column.size);
                }
                self.create_table(&name, schema)?;
                Ok(QueryResult::Empty)
            }
            Statement::DropTable(name) => {
                self.drop_table(&name)?;
                Ok(QueryResult::Empty)
            }
            Statement::Insert { table, values } => {
                self.insert(&table, values)?;
                Ok(QueryResult::RowsAffected(1))
            }
            Statement::Select { table, filter } => {
                let table_ref = self
                    .tables
                    .get(&table)
                    .ok_or_else(|| DatabaseError::TableNotFound(table.clone()))?;
                let columns: Vec<String> = table_ref
                    .schema()
                    .columns()
                    .iter()
                    .map(|c| c.name.clone())
                    .collect();
                let tuples = match &filter {
                    None => table_ref.select_all()?,
                    Some((column, value)) => table_ref.select_where(column, value)?,
                };
                Ok(QueryResult::Rows { columns, tuples })
            }
            Statement::CreateIndex { table, column } => {
                self.create_index(&table, &column)?;
                Ok(QueryResult::Empty)
            }
            Statement::Begin => {
                self.begin()?;
                Ok(QueryResult::Empty)
            }
            Statement::Commit => {
                self.commit()?;
                Ok(QueryResult::Empty)
            }
            Statement::Rollback => {
                self.rollback()?;
                Ok(QueryResult::Empty)
            }
            Statement::Checkpoint => {
                self.checkpoint()?;
                Ok(QueryResult::Empty)
            }
        }
    }

    fn table_file_path(&self, name: &str) -> PathBuf {
        suffixed(&self.path, name)
    }

    fn meta_path(&self) -> PathBuf {
        suffixed(&self.path, "meta")
    }

    /// Write the catalog atomically: serialize into a sibling temp file,
    /// then rename over the real one.
    fn save_metadata(&self) -> DatabaseResult<()> {
        let mut buf = Vec::new();

        let names = self.table_names();
        buf.extend_from_slice(&(names.len() as u32).to_le_bytes());

        for name in &names {
            let table = &self.tables[name];
            write_string(&mut buf, name);

            let schema = table.schema();
            buf.extend_from_slice(&(schema.len() as u32).to_le_bytes());
            for column in schema.columns() {
                write_string(&mut buf, &column.name);
                buf.extend_from_slice(&column.data_type.code().to_le_bytes());
                buf.extend_from_slice(&column.size.to_le_bytes());
            }

            let indexed = table.indexed_columns();
            buf.extend_from_slice(&(indexed.len() as u32).to_le_bytes());
            for column in &indexed {
                write_string(&mut buf, column);
            }
        }

        let meta_path = self.meta_path();
        let tmp_path = suffixed(&meta_path, "tmp");
        fs::write(&tmp_path, &buf)?;
        fs::rename(&tmp_path, &meta_path)?;
        Ok(())
    }

    /// Load the catalog if present, reopening each table and rebuilding
    /// its recorded indexes.
    fn load_metadata(&mut self) -> DatabaseResult<()> {
        let data = match fs::read(self.meta_path()) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let mut pos = 0usize;
        let table_count = read_u32(&data, &mut pos)?;

        for _ in 0..table_count {
            let name = read_string(&data, &mut pos)?;

            let column_count = read_u32(&data, &mut pos)?;
            let mut schema = Schema::default();
            for _ in 0..column_count {
                let column_name = read_string(&data, &mut pos)?;
                let type_code = read_u32(&data, &mut pos)?;
                let size = read_u32(&data, &mut pos)?;
                schema.add_column(column_name, DataType::from_code(type_code)?, size);
            }

            let index_count = read_u32(&data, &mut pos)?;
            let mut indexed = Vec::with_capacity(index_count as usize);
            for _ in 0..index_count {
                indexed.push(read_string(&data, &mut pos)?);
            }

            let mut table = Table::open(
                &name,
                schema,
                self.table_file_path(&name),
                self.config.pool_size,
            )?;
            for column in &indexed {
                table.create_index(column)?;
            }
            self.tables.insert(name, table);
        }

        Ok(())
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

/// Append a dotted suffix to a path: `data/app` + `meta` -> `data/app.meta`.
fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{}.{}", path.display(), suffix))
}

fn write_string(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn read_u32(data: &[u8], pos: &mut usize) -> DatabaseResult<u32> {
    let bytes = data
        .get(*pos..*pos + 4)
        .ok_or_else(|| DatabaseError::CorruptMetadata("truncated field".to_string()))?;
    *pos += 4;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_string(data: &[u8], pos: &mut usize) -> DatabaseResult<String> {
    let len = read_u32(data, pos)? as usize;
    let bytes = data
        .get(*pos..*pos + len)
        .ok_or_else(|| DatabaseError::CorruptMetadata("truncated string".to_string()))?;
    *pos += len;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| DatabaseError::CorruptMetadata("non-UTF-8 name".to_string()))
}
