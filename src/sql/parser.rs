use chumsky::prelude::*;

use crate::record::{DataType, Value};

use super::lexer::{Keyword as K, SqlToken as T};

/// One column declaration in a CREATE TABLE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    /// Declared VARCHAR length; 0 when unspecified or not applicable
    pub size: u32,
}

/// A parsed statement. The engine consumes these with an exhaustive match.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    // CREATE TABLE name (col TYPE, ...)
    CreateTable {
        name: String,
        columns: Vec<ColumnDef>,
    },

    // DROP TABLE name
    DropTable(String),

    // INSERT INTO name VALUES (literal, ...)
    Insert {
        table: String,
        values: Vec<Value>,
    },

    // SELECT * FROM name [WHERE column = literal]
    Select {
        table: String,
        filter: Option<(String, Value)>,
    },

    // CREATE INDEX table.column
    CreateIndex {
        table: String,
        column: String,
    },

    Begin,
    Commit,
    Rollback,
    Checkpoint,
}

pub fn parser<'a>() -> impl Parser<'a, &'a [T<'a>], Vec<Statement>, extra::Err<Rich<'a, T<'a>>>> {
    fn identifier<'a>() -> impl Parser<'a, &'a [T<'a>], String, extra::Err<Rich<'a, T<'a>>>> {
        select! { T::Identifier(name) => name.to_string() }
    }

    fn literal<'a>() -> impl Parser<'a, &'a [T<'a>], Value, extra::Err<Rich<'a, T<'a>>>> {
        select! {
            T::Integer(i) => Value::Int(i as i32),
            T::Float(f) => Value::Double(f),
            T::Str(s) => Value::Text(s.to_string()),
            T::Bool(b) => Value::Bool(b),
        }
    }

    fn data_type<'a>() -> impl Parser<'a, &'a [T<'a>], (DataType, u32), extra::Err<Rich<'a, T<'a>>>>
    {
        choice((
            just(T::Keyword(K::Integer)).to((DataType::Integer, 0u32)),
            just(T::Keyword(K::Boolean)).to((DataType::Boolean, 0u32)),
            just(T::Keyword(K::Double)).to((DataType::Double, 0u32)),
            just(T::Keyword(K::Varchar))
                .ignore_then(
                    select! { T::Integer(n) => n as u32 }
                        .delimited_by(just(T::Symbol('(')), just(T::Symbol(')')))
                        .or_not(),
                )
                .map(|size| (DataType::Varchar, size.unwrap_or(0))),
        ))
    }

    let column_def = identifier()
        .then(data_type())
        .map(|(name, (data_type, size))| ColumnDef {
            name,
            data_type,
            size,
        });

    let create_table = just(T::Keyword(K::Create))
        .ignore_then(just(T::Keyword(K::Table)))
        .ignore_then(identifier())
        .then(
            column_def
                .separated_by(just(T::Symbol(',')))
                .at_least(1)
                .collect()
                .delimited_by(just(T::Symbol('(')), just(T::Symbol(')'))),
        )
        .map(|(name, columns)| Statement::CreateTable { name, columns });

    let create_index = just(T::Keyword(K::Create))
        .ignore_then(just(T::Keyword(K::Index)))
        .ignore_then(identifier())
        .then_ignore(just(T::Symbol('.')))
        .then(identifier())
        .map(|(table, column)| Statement::CreateIndex { table, column });

    let drop_table = just(T::Keyword(K::Drop))
        .ignore_then(just(T::Keyword(K::Table)))
        .ignore_then(identifier())
        .map(Statement::DropTable);

    let insert = just(T::Keyword(K::Insert))
        .ignore_then(just(T::Keyword(K::Into)))
        .ignore_then(identifier())
        .then_ignore(just(T::Keyword(K::Values)))
        .then(
            literal()
                .separated_by(just(T::Symbol(',')))
                .at_least(1)
                .collect()
                .delimited_by(just(T::Symbol('(')), just(T::Symbol(')'))),
        )
        .map(|(table, values)| Statement::Insert { table, values });

    let select = just(T::Keyword(K::Select))
        .ignore_then(just(T::Symbol('*')))
        .ignore_then(just(T::Keyword(K::From)))
        .ignore_then(identifier())
        .then(
            just(T::Keyword(K::Where))
                .ignore_then(identifier())
                .then_ignore(just(T::Symbol('=')))
                .then(literal())
                .or_not(),
        )
        .map(|(table, filter)| Statement::Select { table, filter });

    let bare = choice((
        just(T::Keyword(K::Begin)).to(Statement::Begin),
        just(T::Keyword(K::Commit)).to(Statement::Commit),
        just(T::Keyword(K::Rollback)).to(Statement::Rollback),
        just(T::Keyword(K::Checkpoint)).to(Statement::Checkpoint),
    ));

    choice((create_table, create_index, drop_table, insert, select, bare))
        .then_ignore(just(T::Symbol(';')).or_not())
        .repeated()
        .collect()
}
