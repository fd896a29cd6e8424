use crate::evaluate::{Evaluate, DEFAULT_MAX_DEPTH};
use crate::lexer::Lexer;
use crate::parse;
use crate::run_source;
use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::io::{self, Write};
use std::thread;
use tracing::debug;

pub const SEED_VAR: &str = "TPLANG_SEED";
pub const MAX_DEPTH_VAR: &str = "TPLANG_MAX_DEPTH";

/// Exit status when the source file cannot be read.
pub const EXIT_NO_INPUT: i32 = 66;
/// Exit status when the evaluation thread cannot be started.
pub const EXIT_OS_ERROR: i32 = 71;

/// Native stack reserved per nested user call on the evaluation thread.
/// One call recurses through several evaluator frames, which are much
/// larger in unoptimized builds.
pub const STACK_PER_CALL: usize = 256 * 1024;
const MIN_EVAL_STACK: usize = 8 * 1024 * 1024;

/// Stack size that lets `max_depth` nested calls hit the depth limit
/// instead of exhausting the native stack.
pub fn eval_stack_size(max_depth: usize) -> usize {
    max_depth
        .saturating_mul(STACK_PER_CALL)
        .max(MIN_EVAL_STACK)
}

/// Runs `f` on a scoped thread whose stack is sized for `max_depth`.
/// A panic inside `f` is resumed on the calling thread.
pub fn with_eval_stack<T, F>(max_depth: usize, f: F) -> io::Result<T>
where
    T: Send,
    F: FnOnce() -> T + Send,
{
    thread::scope(|scope| {
        let handle = thread::Builder::new()
            .name("tplang-eval".to_string())
            .stack_size(eval_stack_size(max_depth))
            .spawn_scoped(scope, f)?;
        match handle.join() {
            Ok(value) => Ok(value),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    })
}

/// Run settings taken from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Seed for `random`; entropy when absent.
    pub seed: Option<u64>,
    pub max_depth: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            seed: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Options {
    pub fn from_env() -> Result<Options> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Options> {
        let mut options = Options::default();
        if let Some(seed) = lookup(SEED_VAR) {
            options.seed = Some(seed.trim().parse().with_context(|| {
                format!("{} must be an unsigned integer, got '{}'", SEED_VAR, seed)
            })?);
        }
        if let Some(depth) = lookup(MAX_DEPTH_VAR) {
            options.max_depth = depth.trim().parse().with_context(|| {
                format!("{} must be an unsigned integer, got '{}'", MAX_DEPTH_VAR, depth)
            })?;
        }
        Ok(options)
    }

    pub fn evaluator<W: Write, R: io::BufRead>(&self, output: W, input: R) -> Evaluate<W, R> {
        let mut evaluate = match self.seed {
            Some(seed) => Evaluate::with_seed(output, input, seed),
            None => Evaluate::new(output, input),
        };
        evaluate.set_max_depth(self.max_depth);
        evaluate
    }
}

fn read_source(filename: &str) -> Result<String> {
    let contents = fs::read_to_string(filename)
        .with_context(|| format!("Failed to read file {}", filename))?;
    debug!(file = filename, bytes = contents.len(), "loaded source");
    Ok(contents)
}

/// `tplang tokenize <file>`: one token per line, errors on stderr.
pub fn run_lexer(filename: &str) -> i32 {
    let file_contents = match read_source(filename) {
        Ok(contents) => contents,
        Err(error) => {
            eprintln!("{:#}", error);
            return EXIT_NO_INPUT;
        }
    };

    let mut had_error = false;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for item in Lexer::new(&file_contents).tokens() {
        match item {
            Ok(token) => {
                if writeln!(out, "{}", token).is_err() {
                    return 74;
                }
            }
            Err(error) => {
                eprintln!("{}", error);
                had_error = true;
            }
        }
    }

    if had_error {
        65
    } else {
        0
    }
}

/// `tplang parse <file>`: prints each parsed statement.
pub fn run_parser(filename: &str) -> i32 {
    let file_contents = match read_source(filename) {
        Ok(contents) => contents,
        Err(error) => {
            eprintln!("{:#}", error);
            return EXIT_NO_INPUT;
        }
    };

    let (tokens, errors) = Lexer::new(&file_contents).lex();
    if !errors.is_empty() {
        for error in errors {
            eprintln!("{}", error);
        }
        return 65;
    }
    debug!(tokens = tokens.len(), "tokenized");

    match parse::parse(tokens) {
        Ok(program) => {
            for stmt in program {
                println!("{}", stmt);
            }
            0
        }
        Err(error) => {
            eprintln!("{}", error);
            65
        }
    }
}

/// `tplang run <file>`: executes the program against stdin/stdout.
pub fn run_program(filename: &str, options: &Options) -> i32 {
    let file_contents = match read_source(filename) {
        Ok(contents) => contents,
        Err(error) => {
            eprintln!("{:#}", error);
            return EXIT_NO_INPUT;
        }
    };

    let outcome = with_eval_stack(options.max_depth, || {
        let stdin = io::stdin();
        let mut evaluate = options.evaluator(io::stdout().lock(), stdin.lock());
        match run_source(&file_contents, &mut evaluate) {
            Ok(_) => {
                debug!(functions = evaluate.functions().len(), "run finished");
                Ok(())
            }
            Err(error) => {
                // Flush what the program wrote before the diagnostic.
                if let Err(flush_error) = evaluate.into_output().flush() {
                    eprintln!("Failed to flush output: {}", flush_error);
                }
                Err(error)
            }
        }
    });

    match outcome {
        Ok(Ok(())) => 0,
        Ok(Err(error)) => {
            eprintln!("{}", error);
            error.exit_code()
        }
        Err(error) => {
            eprintln!("Failed to start evaluation thread: {}", error);
            EXIT_OS_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_without_variables() {
        assert_eq!(Options::from_lookup(lookup(&[])).unwrap(), Options::default());
    }

    #[test]
    fn reads_seed_and_depth() {
        let options =
            Options::from_lookup(lookup(&[(SEED_VAR, "42"), (MAX_DEPTH_VAR, " 64 ")])).unwrap();
        assert_eq!(options.seed, Some(42));
        assert_eq!(options.max_depth, 64);
    }

    #[test]
    fn rejects_bad_seed() {
        let err = Options::from_lookup(lookup(&[(SEED_VAR, "soon")])).unwrap_err();
        assert!(format!("{:#}", err).contains(SEED_VAR));
    }

    #[test]
    fn eval_stack_grows_with_depth() {
        assert_eq!(eval_stack_size(0), MIN_EVAL_STACK);
        assert_eq!(eval_stack_size(1000), 1000 * STACK_PER_CALL);
        assert_eq!(eval_stack_size(usize::MAX), usize::MAX);
    }

    #[test]
    fn eval_stack_returns_the_closure_result() {
        let depth = 3;
        assert_eq!(with_eval_stack(depth, || depth * 2).unwrap(), 6);
    }

    #[test]
    fn missing_file_is_reported() {
        assert_eq!(run_program("/definitely/not/here.tp", &Options::default()), EXIT_NO_INPUT);
    }
}
