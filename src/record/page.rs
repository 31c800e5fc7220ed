use crate::file::{PAGE_SIZE, PageId};

use super::error::{RecordError, RecordResult};
use super::tuple::{TUPLE_HEADER_SIZE, TupleHeader};

/// Size of the on-disk page header in bytes.
pub const PAGE_HEADER_SIZE: usize = 16;

/// Metadata stored at the beginning of each 4KB page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    /// This page's id; 0 means the page was never written
    pub page_id: PageId,
    /// Bytes left in the tuple region
    pub free_space: u32,
    /// Number of tuples stored on this page
    pub tuple_count: u32,
    /// Next page in the table's chain; 0 terminates the chain
    pub next_page: PageId,
}

impl PageHeader {
    pub fn new(page_id: PageId) -> Self {
        Self {
            page_id,
            free_space: (PAGE_SIZE - PAGE_HEADER_SIZE) as u32,
            tuple_count: 0,
            next_page: 0,
        }
    }

    pub fn serialize(&self) -> [u8; PAGE_HEADER_SIZE] {
        let mut buf = [0u8; PAGE_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.page_id.to_le_bytes());
        buf[4..8].copy_from_slice(&self.free_space.to_le_bytes());
        buf[8..12].copy_from_slice(&self.tuple_count.to_le_bytes());
        buf[12..16].copy_from_slice(&self.next_page.to_le_bytes());
        buf
    }

    pub fn deserialize(data: &[u8]) -> RecordResult<Self> {
        if data.len() < PAGE_HEADER_SIZE {
            return Err(RecordError::Deserialization(format!(
                "Not enough data for page header: {} bytes",
                data.len()
            )));
        }

        Ok(Self {
            page_id: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            free_space: u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
            tuple_count: u32::from_le_bytes([data[8], data[9], data[10], data[11]]),
            next_page: u32::from_le_bytes([data[12], data[13], data[14], data[15]]),
        })
    }
}

/// Read-only view over a page's bytes.
pub struct PageRef<'a> {
    buf: &'a [u8],
    header: PageHeader,
}

impl<'a> PageRef<'a> {
    pub fn new(buf: &'a [u8]) -> RecordResult<Self> {
        if buf.len() != PAGE_SIZE {
            return Err(RecordError::Deserialization(format!(
                "Invalid page size: {} bytes",
                buf.len()
            )));
        }
        let header = PageHeader::deserialize(buf)?;
        Ok(Self { buf, header })
    }

    pub fn header(&self) -> &PageHeader {
        &self.header
    }

    pub fn page_id(&self) -> PageId {
        self.header.page_id
    }

    pub fn tuple_count(&self) -> u32 {
        self.header.tuple_count
    }

    pub fn free_space(&self) -> u32 {
        self.header.free_space
    }

    pub fn next_page(&self) -> PageId {
        self.header.next_page
    }

    /// Walk the densely packed tuple region, returning one encoded slice
    /// per tuple in storage order.
    pub fn tuple_slices(&self) -> RecordResult<Vec<&'a [u8]>> {
        let mut slices = Vec::with_capacity(self.header.tuple_count as usize);
        let mut offset = PAGE_HEADER_SIZE;

        for _ in 0..self.header.tuple_count {
            let header = TupleHeader::deserialize(&self.buf[offset..])?;
            let size = header.tuple_size as usize;
            if size < TUPLE_HEADER_SIZE || offset + size > PAGE_SIZE {
                return Err(RecordError::Deserialization(format!(
                    "Corrupt tuple of size {} at offset {}",
                    size, offset
                )));
            }
            slices.push(&self.buf[offset..offset + size]);
            offset += size;
        }

        Ok(slices)
    }
}

/// Mutable view over a page's bytes, operating directly on buffer-pool
/// memory. Header mutations are written through to the buffer immediately.
pub struct HeapPage<'a> {
    buf: &'a mut [u8],
    header: PageHeader,
}

impl<'a> HeapPage<'a> {
    /// Format `buf` as a fresh empty page owned by `page_id`.
    pub fn init(buf: &'a mut [u8], page_id: PageId) -> RecordResult<Self> {
        if buf.len() != PAGE_SIZE {
            return Err(RecordError::Deserialization(format!(
                "Invalid page size: {} bytes",
                buf.len()
            )));
        }

        buf.fill(0);
        let header = PageHeader::new(page_id);
        buf[..PAGE_HEADER_SIZE].copy_from_slice(&header.serialize());
        Ok(Self { buf, header })
    }

    /// Wrap an existing page buffer.
    pub fn from_buffer(buf: &'a mut [u8]) -> RecordResult<Self> {
        if buf.len() != PAGE_SIZE {
            return Err(RecordError::Deserialization(format!(
                "Invalid page size: {} bytes",
                buf.len()
            )));
        }
        let header = PageHeader::deserialize(buf)?;
        Ok(Self { buf, header })
    }

    pub fn header(&self) -> &PageHeader {
        &self.header
    }

    pub fn page_id(&self) -> PageId {
        self.header.page_id
    }

    pub fn tuple_count(&self) -> u32 {
        self.header.tuple_count
    }

    pub fn free_space(&self) -> u32 {
        self.header.free_space
    }

    pub fn next_page(&self) -> PageId {
        self.header.next_page
    }

    pub fn set_next_page(&mut self, page_id: PageId) {
        self.header.next_page = page_id;
        self.write_header();
    }

    /// Append one encoded tuple after the existing tuples and account for
    /// it in the header.
    pub fn append_tuple(&mut self, encoded: &[u8]) -> RecordResult<()> {
        if encoded.len() > self.header.free_space as usize {
            return Err(RecordError::PageFull {
                needed: encoded.len(),
                free: self.header.free_space as usize,
            });
        }

        let offset = self.end_offset()?;
        self.buf[offset..offset + encoded.len()].copy_from_slice(encoded);

        self.header.tuple_count += 1;
        self.header.free_space -= encoded.len() as u32;
        self.write_header();
        Ok(())
    }

    /// Offset one past the last stored tuple, found by walking the
    /// tuple headers from the start of the tuple region.
    fn end_offset(&self) -> RecordResult<usize> {
        let mut offset = PAGE_HEADER_SIZE;
        for _ in 0..self.header.tuple_count {
            let header = TupleHeader::deserialize(&self.buf[offset..])?;
            let size = header.tuple_size as usize;
            if size < TUPLE_HEADER_SIZE || offset + size > PAGE_SIZE {
                return Err(RecordError::Deserialization(format!(
                    "Corrupt tuple of size {} at offset {}",
                    size, offset
                )));
            }
            offset += size;
        }
        Ok(offset)
    }

    fn write_header(&mut self) {
        self.buf[..PAGE_HEADER_SIZE].copy_from_slice(&self.header.serialize());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::schema::Schema;
    use crate::record::tuple::Tuple;
    use crate::record::value::{DataType, Value};

    fn schema() -> Schema {
        let mut schema = Schema::default();
        schema.add_column("id", DataType::Integer, 0);
        schema.add_column("name", DataType::Varchar, 50);
        schema
    }

    fn encoded(id: u64, name: &str) -> Vec<u8> {
        Tuple::with_id(id, vec![Value::Int(id as i32), Value::Text(name.to_string())])
            .encode(&schema())
            .unwrap()
    }

    #[test]
    fn test_init_header() {
        let mut buf = vec![0xffu8; PAGE_SIZE];
        let page = HeapPage::init(&mut buf, 3).unwrap();
        assert_eq!(page.page_id(), 3);
        assert_eq!(page.tuple_count(), 0);
        assert_eq!(page.next_page(), 0);
        assert_eq!(page.free_space(), (PAGE_SIZE - PAGE_HEADER_SIZE) as u32);
    }

    #[test]
    fn test_header_round_trip() {
        let header = PageHeader {
            page_id: 5,
            free_space: 1000,
            tuple_count: 12,
            next_page: 9,
        };
        assert_eq!(
            PageHeader::deserialize(&header.serialize()).unwrap(),
            header
        );
    }

    #[test]
    fn test_append_and_walk() {
        let mut buf = vec![0u8; PAGE_SIZE];
        let mut page = HeapPage::init(&mut buf, 1).unwrap();

        let first = encoded(1, "Alice");
        let second = encoded(2, "Bob");
        page.append_tuple(&first).unwrap();
        page.append_tuple(&second).unwrap();

        assert_eq!(page.tuple_count(), 2);
        let expected_free = PAGE_SIZE - PAGE_HEADER_SIZE - first.len() - second.len();
        assert_eq!(page.free_space() as usize, expected_free);

        let page = PageRef::new(&buf).unwrap();
        let slices = page.tuple_slices().unwrap();
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0], &first[..]);
        assert_eq!(slices[1], &second[..]);

        let decoded = Tuple::decode(slices[1], &schema()).unwrap();
        assert_eq!(decoded.id, 2);
        assert_eq!(decoded.values[1], Value::Text("Bob".to_string()));
    }

    #[test]
    fn test_append_until_full() {
        let mut buf = vec![0u8; PAGE_SIZE];
        let mut page = HeapPage::init(&mut buf, 1).unwrap();

        // 16-byte header + 4-byte int + 4-byte prefix + 996 bytes = 1020
        let row = Tuple::with_id(1, vec![Value::Int(1), Value::Text("x".repeat(996))])
            .encode(&schema())
            .unwrap();
        assert_eq!(row.len(), 1020);

        for _ in 0..4 {
            page.append_tuple(&row).unwrap();
        }
        assert_eq!(page.free_space(), 0);

        let result = page.append_tuple(&row);
        assert!(matches!(result, Err(RecordError::PageFull { .. })));
        assert_eq!(page.tuple_count(), 4);
    }

    #[test]
    fn test_set_next_page_persists() {
        let mut buf = vec![0u8; PAGE_SIZE];
        {
            let mut page = HeapPage::init(&mut buf, 1).unwrap();
            page.set_next_page(7);
        }
        let page = PageRef::new(&buf).unwrap();
        assert_eq!(page.next_page(), 7);
    }

    #[test]
    fn test_zeroed_buffer_reads_as_unallocated() {
        let buf = vec![0u8; PAGE_SIZE];
        let page = PageRef::new(&buf).unwrap();
        assert_eq!(page.page_id(), 0);
        assert_eq!(page.tuple_count(), 0);
    }

    #[test]
    fn test_wrong_buffer_size_rejected() {
        let mut buf = vec![0u8; PAGE_SIZE - 1];
        assert!(HeapPage::from_buffer(&mut buf).is_err());
        assert!(PageRef::new(&buf).is_err());
    }

    #[test]
    fn test_corrupt_tuple_size_detected() {
        let mut buf = vec![0u8; PAGE_SIZE];
        {
            let mut page = HeapPage::init(&mut buf, 1).unwrap();
            page.append_tuple(&encoded(1, "Alice")).unwrap();
        }
        // Stamp a nonsense tuple size over the first tuple header
        buf[PAGE_HEADER_SIZE..PAGE_HEADER_SIZE + 4].copy_from_slice(&8u32.to_le_bytes());

        let page = PageRef::new(&buf).unwrap();
        assert!(page.tuple_slices().is_err());
    }
}
