mod lexer;
mod parser;

pub use lexer::{Keyword, SqlToken, lexer};
pub use parser::{ColumnDef, Statement, parser};

use chumsky::Parser;

/// Lex and parse a string of SQL, returning the statements in order.
pub fn parse(input: &str) -> Result<Vec<Statement>, String> {
    let tokens = match lexer().parse(input).into_result() {
        Ok(tokens) => tokens,
        Err(errors) => {
            return Err(format!("Lexer errors: {:?}", errors));
        }
    };

    match parser().parse(tokens.as_slice()).into_result() {
        Ok(statements) => Ok(statements),
        Err(errors) => Err(format!("Parser errors: {:?}", errors)),
    }
}
