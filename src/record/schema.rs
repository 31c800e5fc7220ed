use super::error::{RecordError, RecordResult};
use super::value::{DataType, Value};

/// One column declaration. `size` is advisory and only meaningful for
/// VARCHAR (the declared maximum length); stored lengths are per-value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub size: u32,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType, size: u32) -> Self {
        Self {
            name: name.into(),
            data_type,
            size,
        }
    }
}

/// Ordered column declarations of one table. Column order is significant:
/// it fixes the on-disk field order and the positional semantics of INSERT.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn add_column(&mut self, name: impl Into<String>, data_type: DataType, size: u32) {
        self.columns.push(Column::new(name, data_type, size));
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Check a row of values against this schema: arity first, then the
    /// type at every position.
    pub fn validate(&self, values: &[Value]) -> RecordResult<()> {
        if values.len() != self.columns.len() {
            return Err(RecordError::SchemaMismatch(format!(
                "Expected {} values, got {}",
                self.columns.len(),
                values.len()
            )));
        }

        for (value, column) in values.iter().zip(&self.columns) {
            if value.data_type() != column.data_type {
                return Err(RecordError::TypeMismatch {
                    expected: format!("{} for column '{}'", column.data_type.name(), column.name),
                    actual: value.data_type().name().to_string(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users_schema() -> Schema {
        let mut schema = Schema::default();
        schema.add_column("id", DataType::Integer, 0);
        schema.add_column("name", DataType::Varchar, 50);
        schema.add_column("active", DataType::Boolean, 0);
        schema
    }

    #[test]
    fn test_column_index() {
        let schema = users_schema();
        assert_eq!(schema.column_index("id"), Some(0));
        assert_eq!(schema.column_index("name"), Some(1));
        assert_eq!(schema.column_index("active"), Some(2));
        assert_eq!(schema.column_index("missing"), None);
    }

    #[test]
    fn test_validate_ok() {
        let schema = users_schema();
        let values = vec![
            Value::Int(1),
            Value::Text("Alice".to_string()),
            Value::Bool(true),
        ];
        assert!(schema.validate(&values).is_ok());
    }

    #[test]
    fn test_validate_wrong_arity() {
        let schema = users_schema();
        let values = vec![Value::Int(1), Value::Text("Alice".to_string())];
        assert!(matches!(
            schema.validate(&values),
            Err(RecordError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_validate_wrong_type() {
        let schema = users_schema();
        let values = vec![
            Value::Text("1".to_string()),
            Value::Text("Alice".to_string()),
            Value::Bool(true),
        ];
        assert!(matches!(
            schema.validate(&values),
            Err(RecordError::TypeMismatch { .. })
        ));
    }
}
