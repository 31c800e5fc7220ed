use chumsky::{prelude::*, regex::regex, text::ascii::ident};

/// SQL keywords. Type keywords fold their aliases during lexing
/// (`INT`/`INTEGER`, `BOOL`/`BOOLEAN`, `FLOAT`/`DOUBLE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Create,
    Table,
    Drop,
    Insert,
    Into,
    Values,
    Select,
    From,
    Where,
    Index,
    Begin,
    Commit,
    Rollback,
    Checkpoint,
    Integer,
    Varchar,
    Boolean,
    Double,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SqlToken<'a> {
    Keyword(Keyword),
    Identifier(&'a str),
    Integer(i64),
    Float(f64),
    Str(&'a str),
    Bool(bool),
    Symbol(char),
}

/// Classify a bare word: keyword (case-insensitive), boolean literal, or
/// identifier.
fn classify(word: &str) -> SqlToken<'_> {
    match word.to_ascii_uppercase().as_str() {
        "CREATE" => SqlToken::Keyword(Keyword::Create),
        "TABLE" => SqlToken::Keyword(Keyword::Table),
        "DROP" => SqlToken::Keyword(Keyword::Drop),
        "INSERT" => SqlToken::Keyword(Keyword::Insert),
        "INTO" => SqlToken::Keyword(Keyword::Into),
        "VALUES" => SqlToken::Keyword(Keyword::Values),
        "SELECT" => SqlToken::Keyword(Keyword::Select),
        "FROM" => SqlToken::Keyword(Keyword::From),
        "WHERE" => SqlToken::Keyword(Keyword::Where),
        "INDEX" => SqlToken::Keyword(Keyword::Index),
        "BEGIN" => SqlToken::Keyword(Keyword::Begin),
        "COMMIT" => SqlToken::Keyword(Keyword::Commit),
        "ROLLBACK" => SqlToken::Keyword(Keyword::Rollback),
        "CHECKPOINT" => SqlToken::Keyword(Keyword::Checkpoint),
        "INT" | "INTEGER" => SqlToken::Keyword(Keyword::Integer),
        "VARCHAR" => SqlToken::Keyword(Keyword::Varchar),
        "BOOL" | "BOOLEAN" => SqlToken::Keyword(Keyword::Boolean),
        "DOUBLE" | "FLOAT" => SqlToken::Keyword(Keyword::Double),
        "TRUE" => SqlToken::Bool(true),
        "FALSE" => SqlToken::Bool(false),
        _ => SqlToken::Identifier(word),
    }
}

pub fn lexer<'a>() -> impl Parser<'a, &'a str, Vec<SqlToken<'a>>, extra::Err<Rich<'a, char>>> {
    let float = regex(r"-?\d+\.\d+")
        .map(|s: &str| SqlToken::Float(s.parse().unwrap()))
        .padded();

    let integer = regex(r"-?\d+")
        .map(|s: &str| SqlToken::Integer(s.parse().unwrap()))
        .padded();

    let string = regex(r"'[^']*'")
        .map(|s: &str| SqlToken::Str(&s[1..s.len() - 1]))
        .padded();

    let word = ident().map(classify).padded();

    let symbol = one_of("(),;=*.").map(SqlToken::Symbol).padded();

    choice((float, integer, string, word, symbol))
        .repeated()
        .collect()
}
