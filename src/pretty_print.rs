use crate::environment::EnvError;
use crate::evaluator::EvalError;
use crate::lexer::LexerError;
use crate::parser::ParseError;
use ariadne::{Label, Report, ReportKind, Source};

impl LexerError {
    pub fn pretty_print(&self, input: &str) {
        Report::build(ReportKind::Error, ("REPL", self.span.to_range()))
            .with_message("Lexer Error")
            .with_label(
                Label::new(("REPL", self.span.to_range())).with_message(self.error.to_string()),
            )
            .finish()
            .print(("REPL", Source::from(input)))
            .unwrap();
    }
}

impl ParseError {
    pub fn pretty_print(&self, input: &str) {
        let report = match self {
            ParseError::UnexpectedToken { found, expected } => {
                Report::build(ReportKind::Error, ("REPL", found.span.to_range()))
                    .with_message(format!("Unexpected token: {}", found.kind))
                    .with_label(
                        Label::new(("REPL", found.span.to_range()))
                            .with_message(format!("Expected {expected}")),
                    )
            }
            ParseError::MissingClosingParen(span) => {
                Report::build(ReportKind::Error, ("REPL", span.to_range()))
                    .with_message("Missing closing parenthesis")
                    .with_label(
                        Label::new(("REPL", span.to_range()))
                            .with_message("This parenthesis is never closed"),
                    )
            }
            ParseError::EmptyInput => {
                Report::build(ReportKind::Error, ("REPL", 0..input.len()))
                    .with_message("Empty expression")
                    .with_label(
                        Label::new(("REPL", 0..input.len()))
                            .with_message("Expected a parenthesized expression"),
                    )
            }
            ParseError::LexerError(lex_err) => {
                lex_err.pretty_print(input);
                return;
            }
        };
        report
            .finish()
            .print(("REPL", Source::from(input)))
            .unwrap();
    }
}

impl EvalError {
    pub fn pretty_print(&self, input: &str) {
        let report = match self {
            EvalError::EnvError(env_error) => match env_error {
                EnvError::UnknownSymbol(symbol, span) => {
                    Report::build(ReportKind::Error, ("REPL", span.to_range()))
                        .with_message(format!("Unknown symbol `{}`", symbol))
                        .with_label(
                            Label::new(("REPL", span.to_range()))
                                .with_message("This symbol is not defined in the current scope"),
                        )
                }
            },
            EvalError::NotAProcedure(value, span) => {
                Report::build(ReportKind::Error, ("REPL", span.to_range()))
                    .with_message(format!("Not a procedure: {}", value))
                    .with_label(
                        Label::new(("REPL", span.to_range()))
                            .with_message("This expression cannot be called as a procedure"),
                    )
            }
            EvalError::ArityMismatch {
                expected,
                got,
                span,
            } => Report::build(ReportKind::Error, ("REPL", span.to_range()))
                .with_message("Mismatched number of arguments")
                .with_label(Label::new(("REPL", span.to_range())).with_message(format!(
                    "This call expects {} arguments but got {}",
                    expected, got
                ))),
            EvalError::InvalidArguments(message, span) => {
                Report::build(ReportKind::Error, ("REPL", span.to_range()))
                    .with_message("Invalid arguments")
                    .with_label(Label::new(("REPL", span.to_range())).with_message(message))
            }
            EvalError::InvalidSpecialForm(message, span) => {
                Report::build(ReportKind::Error, ("REPL", span.to_range()))
                    .with_message(format!("Invalid special form: {}", message))
                    .with_label(
                        Label::new(("REPL", span.to_range()))
                            .with_message("This special form is malformed or incomplete"),
                    )
            }
            EvalError::NotASymbol(found, span) => {
                Report::build(ReportKind::Error, ("REPL", span.to_range()))
                    .with_message(format!("Not a symbol: {}", found))
                    .with_label(
                        Label::new(("REPL", span.to_range()))
                            .with_message("define expects a bare name here"),
                    )
            }
        };
        report
            .finish()
            .print(("REPL", Source::from(input)))
            .unwrap();
    }
}
