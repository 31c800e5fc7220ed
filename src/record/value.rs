use super::error::{RecordError, RecordResult};

/// Column data types supported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// 32-bit signed integer
    Integer,
    /// Variable-length UTF-8 text
    Varchar,
    /// True/false
    Boolean,
    /// 64-bit IEEE-754 float
    Double,
}

impl DataType {
    /// Stable on-disk code used by the metadata catalog.
    pub fn code(&self) -> u32 {
        match self {
            DataType::Integer => 0,
            DataType::Varchar => 1,
            DataType::Boolean => 2,
            DataType::Double => 3,
        }
    }

    pub fn from_code(code: u32) -> RecordResult<Self> {
        match code {
            0 => Ok(DataType::Integer),
            1 => Ok(DataType::Varchar),
            2 => Ok(DataType::Boolean),
            3 => Ok(DataType::Double),
            other => Err(RecordError::Deserialization(format!(
                "Unknown data type code {}",
                other
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DataType::Integer => "INTEGER",
            DataType::Varchar => "VARCHAR",
            DataType::Boolean => "BOOLEAN",
            DataType::Double => "DOUBLE",
        }
    }
}

/// A single column value.
///
/// Equality is type-strict: values of different types are never equal,
/// even when their textual forms match.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Double(f64),
    Bool(bool),
    Text(String),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Int(_) => DataType::Integer,
            Value::Double(_) => DataType::Double,
            Value::Bool(_) => DataType::Boolean,
            Value::Text(_) => DataType::Varchar,
        }
    }

    /// Encoded size of this value in bytes. VARCHAR contributes its length
    /// prefix plus the raw bytes; the other types are fixed width.
    pub fn encoded_size(&self) -> usize {
        match self {
            Value::Int(_) => 4,
            Value::Double(_) => 8,
            Value::Bool(_) => 1,
            Value::Text(s) => 4 + s.len(),
        }
    }

    /// String encoding used as the B-tree index key: numbers via decimal
    /// text, booleans as `true`/`false`, text verbatim.
    pub fn stringify(&self) -> String {
        match self {
            Value::Int(i) => i.to_string(),
            Value::Double(d) => d.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Text(s) => s.clone(),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.stringify())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_codes_round_trip() {
        for dt in [
            DataType::Integer,
            DataType::Varchar,
            DataType::Boolean,
            DataType::Double,
        ] {
            assert_eq!(DataType::from_code(dt.code()).unwrap(), dt);
        }
        assert!(DataType::from_code(4).is_err());
    }

    #[test]
    fn test_encoded_size() {
        assert_eq!(Value::Int(7).encoded_size(), 4);
        assert_eq!(Value::Double(1.5).encoded_size(), 8);
        assert_eq!(Value::Bool(true).encoded_size(), 1);
        assert_eq!(Value::Text("hello".to_string()).encoded_size(), 4 + 5);
        assert_eq!(Value::Text(String::new()).encoded_size(), 4);
    }

    #[test]
    fn test_equality_is_type_strict() {
        // "25" and 25 are never equal, whatever their textual forms
        assert_ne!(Value::Int(25), Value::Text("25".to_string()));
        assert_ne!(Value::Int(1), Value::Bool(true));
        assert_ne!(Value::Int(1), Value::Double(1.0));
        assert_eq!(Value::Int(25), Value::Int(25));
        assert_eq!(Value::Text("a".to_string()), Value::Text("a".to_string()));
    }

    #[test]
    fn test_stringify() {
        assert_eq!(Value::Int(-3).stringify(), "-3");
        assert_eq!(Value::Double(2.5).stringify(), "2.5");
        assert_eq!(Value::Bool(true).stringify(), "true");
        assert_eq!(Value::Bool(false).stringify(), "false");
        assert_eq!(Value::Text("Alice".to_string()).stringify(), "Alice");
    }
}
