use std::cell::RefCell;
use std::rc::Rc;

use minilisp::TokenKind;
use minilisp::{
    Environment, Value,
    evaluator::evaluate,
    lexer::tokenize,
    parser::parse_str,
};
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Cmd, Completer, Context, Editor, EventHandler, KeyCode, KeyEvent, Modifiers};
use rustyline::{Helper, Highlighter, Hinter, Validator};

struct MinilispCompleter {
    env: Rc<RefCell<Environment>>,
}

impl MinilispCompleter {
    fn new(env: Rc<RefCell<Environment>>) -> Self {
        MinilispCompleter { env }
    }
}

impl rustyline::completion::Completer for MinilispCompleter {
    type Candidate = String;
    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        Ok((
            pos,
            match tokenize(&line[..pos]) {
                Ok(tokens) => {
                    if let Some(TokenKind::Symbol(prefix)) = tokens.last().map(|t| t.kind.clone()) {
                        self.env
                            .borrow()
                            .get_identifiers()
                            .union(&minilisp::special_form_identifiers())
                            .filter_map(|id| {
                                if id.starts_with(&prefix) {
                                    Some(id[prefix.len()..].to_string())
                                } else {
                                    None
                                }
                            })
                            .collect()
                    } else {
                        vec![]
                    }
                }
                Err(_) => vec![],
            },
        ))
    }
}

#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
struct InputValidator {
    #[rustyline(Validator)]
    validator: MinilispValidator,
    #[rustyline(Highlighter)]
    highlighter: MinilispHighlighter,
    #[rustyline(Completer)]
    completer: MinilispCompleter,
}

struct MinilispValidator;

impl Validator for MinilispValidator {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        let input = ctx.input();
        let mut depth: Vec<usize> = Vec::new();
        let mut in_string = false;

        // Strings are single-quote delimited with no escapes; parens inside
        // them do not count.
        for (i, c) in input.chars().enumerate() {
            if in_string {
                if c == '\'' {
                    in_string = false;
                }
                continue;
            }

            match c {
                '\'' => {
                    in_string = true;
                }
                '(' => {
                    depth.push(i);
                }
                ')' => {
                    if depth.pop().is_none() {
                        return Ok(ValidationResult::Invalid(Some(format!(
                            "  - Unmatched ')' at position {}",
                            i
                        ))));
                    }
                }
                _ => {}
            }
        }

        if in_string || !depth.is_empty() {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

struct MinilispHighlighter;

impl Highlighter for MinilispHighlighter {
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> std::borrow::Cow<'l, str> {
        let mut stack: Vec<usize> = Vec::new();
        let mut highlighted = String::new();
        let mut in_string = false;

        for (i, c) in line.chars().enumerate() {
            if in_string {
                if c == '\'' {
                    in_string = false;
                }
                highlighted.push_str(&format!("\x1b[32m{}\x1b[0m", c)); // Green for strings
                continue;
            }

            match c {
                '\'' => {
                    in_string = true;
                    highlighted.push_str(&format!("\x1b[32m{}\x1b[0m", c)); // Green for strings
                }
                '(' => {
                    stack.push(highlighted.len());
                    highlighted.push(c);
                }
                ')' => {
                    if let Some(matching_pos) = stack.pop() {
                        if i == pos.saturating_sub(1) {
                            highlighted.push_str(&format!("\x1b[34m{}\x1b[0m", c)); // Blue for matching brackets
                            highlighted.replace_range(
                                matching_pos..=matching_pos,
                                "\x1b[1;34m(\x1b[0m",
                            );
                        } else {
                            highlighted.push(c);
                        }
                    } else {
                        highlighted.push_str(&format!("\x1b[31m{}\x1b[0m", c)); // Red for unmatched closing brackets
                    }
                }
                _ => {
                    highlighted.push(c);
                }
            }
        }

        std::borrow::Cow::Owned(highlighted)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

fn main() -> rustyline::Result<()> {
    println!("minilisp REPL v0.1.0");
    println!("Type 'exit' or press Ctrl-D to quit.");

    // One session environment layered over the base so `define`s persist
    // across lines but the built-in table stays untouched.
    let base_env = Environment::new_global_populated();
    let session_env = Environment::new_enclosed(base_env);

    let h = InputValidator {
        highlighter: MinilispHighlighter,
        validator: MinilispValidator,
        completer: MinilispCompleter::new(session_env.clone()),
    };
    let config = rustyline::config::Config::builder()
        .edit_mode(rustyline::EditMode::Vi)
        .build();
    let mut rl = Editor::with_config(config)?;
    rl.set_helper(Some(h));
    rl.bind_sequence(
        KeyEvent(KeyCode::Char('s'), Modifiers::CTRL),
        EventHandler::Simple(Cmd::Newline),
    );
    if rl.load_history("minilisp_history.txt").is_err() {
        println!("No previous history.");
    }

    loop {
        let readline = rl.readline("minilisp> ");
        match readline {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let trimmed_input = line.trim();
                if trimmed_input.is_empty() {
                    continue;
                }
                if trimmed_input.eq_ignore_ascii_case("exit") {
                    break;
                }

                match parse_str(trimmed_input) {
                    Ok(node) => match evaluate(&node, session_env.clone()) {
                        // Only non-nil results are echoed
                        Ok(Value::Null) => {}
                        Ok(result) => println!("{}", result),
                        Err(e) => e.pretty_print(trimmed_input),
                    },
                    Err(parse_err) => parse_err.pretty_print(trimmed_input),
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C
                println!("\nGoodbye!");
                break;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl-D
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Readline Error: {:?}", err);
                break;
            }
        }
    }
    rl.save_history("minilisp_history.txt")
}
