mod error;
mod page;
mod schema;
mod tuple;
mod value;

pub use error::{RecordError, RecordResult};
pub use page::{HeapPage, PAGE_HEADER_SIZE, PageHeader, PageRef};
pub use schema::{Column, Schema};
pub use tuple::{TUPLE_HEADER_SIZE, Tuple, TupleHeader};
pub use value::{DataType, Value};

/// Tuple ID type; id 0 means "not yet assigned"
pub type TupleId = u64;

/// Largest encoded tuple that fits a single page's data region
pub const MAX_TUPLE_SIZE: usize = crate::file::PAGE_SIZE - PAGE_HEADER_SIZE;
