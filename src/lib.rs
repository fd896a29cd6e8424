//! Tokenizer, parser and tree-walking evaluator for tplang, a small
//! imperative scripting language with `write`/`read`/`random` statements,
//! user functions and `#{name}` string interpolation.
//!
//! ```
//! use interpreter::{evaluate::Evaluate, run_source};
//!
//! let mut evaluate = Evaluate::with_seed(Vec::new(), std::io::empty(), 1);
//! run_source("x = 3 + 4 * 2; write(x);", &mut evaluate).unwrap();
//! assert_eq!(evaluate.output(), b"11\n");
//! ```

pub mod environment;
pub mod evaluate;
pub mod function;
pub mod lexer;
pub mod parse;
pub mod run;

use std::io::{BufRead, Write};

use evaluate::{Evaluate, RuntimeError, Value};
use lexer::{LexError, Lexer};
use parse::SyntaxError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("{}", join_lines(.0))]
    Lex(Vec<LexError>),
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

fn join_lines(errors: &[LexError]) -> String {
    errors
        .iter()
        .map(|error| error.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

impl Error {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Lex(_) | Error::Syntax(_) => 65,
            Error::Runtime(_) => 70,
        }
    }
}

/// Tokenizes and parses `source`, then runs it on `evaluate`.
/// Nothing is executed unless the whole source is lexically and
/// syntactically valid.
pub fn run_source<W: Write, R: BufRead>(
    source: &str,
    evaluate: &mut Evaluate<W, R>,
) -> Result<Value, Error> {
    let (tokens, errors) = Lexer::new(source).lex();
    if !errors.is_empty() {
        return Err(Error::Lex(errors));
    }
    let program = parse::parse(tokens)?;
    Ok(evaluate.run(&program)?)
}
