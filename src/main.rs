use std::io::{self, BufRead, Write};

use minirel::database::{Database, QueryResult};
use minirel::sql;

fn main() {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "./data/minirel".to_string());

    let mut db = match Database::open(&path) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to open database at {}: {}", path, e);
            std::process::exit(1);
        }
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let statements = match sql::parse(line) {
            Ok(statements) => statements,
            Err(e) => {
                eprintln!("Parse error: {}", e);
                continue;
            }
        };

        for statement in statements {
            match db.execute(statement) {
                Ok(result) => print_result(&result),
                Err(e) => eprintln!("Error: {}", e),
            }
            stdout.flush().unwrap();
        }
    }
}

fn print_result(result: &QueryResult) {
    match result {
        QueryResult::Empty => {}
        QueryResult::RowsAffected(count) => {
            println!("{} row(s)", count);
        }
        QueryResult::Rows { columns, tuples } => {
            println!("{}", columns.join(","));
            for tuple in tuples {
                let fields: Vec<String> = tuple.values.iter().map(|v| v.stringify()).collect();
                println!("{}", fields.join(","));
            }
        }
    }
}
