use super::TupleId;
use super::error::{RecordError, RecordResult};
use super::schema::Schema;
use super::value::{DataType, Value};

/// Size of the on-disk tuple header in bytes.
pub const TUPLE_HEADER_SIZE: usize = 16;

/// Metadata stored before each row's field data on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TupleHeader {
    /// Total bytes this tuple occupies, header included
    pub tuple_size: u32,
    /// Reserved for chaining; always written as 0
    pub next_tuple_offset: u32,
    /// Unique row identifier within the owning table
    pub tuple_id: TupleId,
}

impl TupleHeader {
    pub fn serialize(&self) -> [u8; TUPLE_HEADER_SIZE] {
        let mut buf = [0u8; TUPLE_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.tuple_size.to_le_bytes());
        buf[4..8].copy_from_slice(&self.next_tuple_offset.to_le_bytes());
        buf[8..16].copy_from_slice(&self.tuple_id.to_le_bytes());
        buf
    }

    pub fn deserialize(data: &[u8]) -> RecordResult<Self> {
        if data.len() < TUPLE_HEADER_SIZE {
            return Err(RecordError::Deserialization(format!(
                "Not enough data for tuple header: {} bytes",
                data.len()
            )));
        }

        Ok(Self {
            tuple_size: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            next_tuple_offset: u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
            tuple_id: u64::from_le_bytes([
                data[8], data[9], data[10], data[11], data[12], data[13], data[14], data[15],
            ]),
        })
    }
}

/// One row: a tuple id plus a schema-ordered sequence of typed values.
/// Id 0 means "unassigned"; the table allocates a nonzero id on insert.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    pub id: TupleId,
    pub values: Vec<Value>,
}

impl Tuple {
    pub fn new(values: Vec<Value>) -> Self {
        Self { id: 0, values }
    }

    pub fn with_id(id: TupleId, values: Vec<Value>) -> Self {
        Self { id, values }
    }

    /// Bytes this tuple occupies on disk, header included.
    pub fn encoded_size(&self) -> usize {
        TUPLE_HEADER_SIZE + self.values.iter().map(Value::encoded_size).sum::<usize>()
    }

    /// Serialize into the on-disk format: tuple header followed by each
    /// field in schema order, all fields little-endian.
    pub fn encode(&self, schema: &Schema) -> RecordResult<Vec<u8>> {
        schema.validate(&self.values)?;

        let mut buf = Vec::with_capacity(self.encoded_size());
        let header = TupleHeader {
            tuple_size: self.encoded_size() as u32,
            next_tuple_offset: 0,
            tuple_id: self.id,
        };
        buf.extend_from_slice(&header.serialize());

        for value in &self.values {
            match value {
                Value::Int(i) => buf.extend_from_slice(&i.to_le_bytes()),
                Value::Double(d) => buf.extend_from_slice(&d.to_le_bytes()),
                Value::Bool(b) => buf.push(*b as u8),
                Value::Text(s) => {
                    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
                    buf.extend_from_slice(s.as_bytes());
                }
            }
        }

        Ok(buf)
    }

    /// Decode one tuple from the start of `data`, reading fields in the
    /// order and types the schema declares.
    pub fn decode(data: &[u8], schema: &Schema) -> RecordResult<Self> {
        let header = TupleHeader::deserialize(data)?;
        let mut offset = TUPLE_HEADER_SIZE;

        let mut values = Vec::with_capacity(schema.len());
        for column in schema.columns() {
            let value = match column.data_type {
                DataType::Integer => {
                    let bytes = field_bytes(data, offset, 4)?;
                    offset += 4;
                    Value::Int(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
                }
                DataType::Double => {
                    let bytes = field_bytes(data, offset, 8)?;
                    offset += 8;
                    Value::Double(f64::from_le_bytes([
                        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6],
                        bytes[7],
                    ]))
                }
                DataType::Boolean => {
                    let bytes = field_bytes(data, offset, 1)?;
                    offset += 1;
                    Value::Bool(bytes[0] != 0)
                }
                DataType::Varchar => {
                    let bytes = field_bytes(data, offset, 4)?;
                    let len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
                    offset += 4;
                    let raw = field_bytes(data, offset, len)?;
                    offset += len;
                    let text = String::from_utf8(raw.to_vec()).map_err(|e| {
                        RecordError::Deserialization(format!("Invalid UTF-8 in VARCHAR: {}", e))
                    })?;
                    Value::Text(text)
                }
            };
            values.push(value);
        }

        if offset != header.tuple_size as usize {
            return Err(RecordError::Deserialization(format!(
                "Tuple size mismatch: header says {}, decoded {}",
                header.tuple_size, offset
            )));
        }

        Ok(Tuple {
            id: header.tuple_id,
            values,
        })
    }
}

fn field_bytes(data: &[u8], offset: usize, len: usize) -> RecordResult<&[u8]> {
    data.get(offset..offset + len).ok_or_else(|| {
        RecordError::Deserialization(format!(
            "Truncated tuple: need {} bytes at offset {}, have {}",
            len,
            offset,
            data.len()
        ))
    })
}
