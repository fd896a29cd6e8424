use interpreter::run::{self, Options};
use std::env;
use std::io::{self, Write};
use std::process::exit;
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let (command, filename) = match args.as_slice() {
        [_, filename] => ("run", filename),
        [_, command, filename] => (command.as_str(), filename),
        _ => {
            let program = args.first().map_or("tplang", String::as_str);
            writeln!(io::stderr(), "Usage: {} [tokenize|parse|run] <filename>", program).ok();
            exit(64);
        }
    };

    let code = match command {
        "tokenize" => run::run_lexer(filename),
        "parse" => run::run_parser(filename),
        "run" => match Options::from_env() {
            Ok(options) => run::run_program(filename, &options),
            Err(error) => {
                writeln!(io::stderr(), "{:#}", error).ok();
                64
            }
        },
        cmd => {
            writeln!(io::stderr(), "Unknown command: {}", cmd).ok();
            64
        }
    };
    exit(code)
}
