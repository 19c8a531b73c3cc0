use std::io;
use std::process::ExitCode;

use minilisp::{Environment, Parser, evaluate, tokenize};

/// File mode: the whole file is one parenthesized form, typically a
/// `(begin ...)` wrapping the program. The result is discarded; output only
/// happens through the `print` primitive. Failures are printed and the
/// process still exits normally.
fn run_file(filename: &str) {
    let contents = match std::fs::read_to_string(filename) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            println!("File not found: {}", filename);
            return;
        }
        Err(e) => {
            println!("Error: {}", e);
            return;
        }
    };

    let tokens = match tokenize(&contents) {
        Ok(tokens) => tokens,
        Err(e) => {
            println!("Error: {}", e);
            return;
        }
    };
    if tokens.is_empty() {
        return;
    }

    let env = Environment::new_global_populated();
    match Parser::new(tokens).parse() {
        Ok(node) => {
            if let Err(e) = evaluate(&node, env) {
                println!("Error: {}", e);
            }
        }
        Err(e) => println!("Error: {}", e),
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    match args.as_slice() {
        [_, filename] => {
            run_file(filename);
            ExitCode::SUCCESS
        }
        [program, ..] => {
            println!("Usage: {} <file>", program);
            println!("  Executes a minilisp program from a file.");
            println!("  For an interactive session, run the `repl` binary.");
            ExitCode::FAILURE
        }
        [] => ExitCode::FAILURE,
    }
}
