use crate::environment::{EnvError, Environment};
use crate::source::Span;
use crate::types::{Closure, Expr, Node, Procedure, Value};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use thiserror::Error;

// --- Evaluation Error ---

/// Failures inside evaluation are typed results propagated up to the
/// REPL/file-runner boundary; the core never terminates the process.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error(transparent)]
    EnvError(#[from] EnvError), // Errors from environment lookup
    #[error("Cannot apply non-procedure value: {0}")]
    NotAProcedure(Value, Span), // Tried to call something that isn't callable
    #[error("Mismatched number of arguments: expected {expected}, got {got}")]
    ArityMismatch {
        expected: usize,
        got: usize,
        span: Span,
    },
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String, Span), // Wrong type or count of builtin args
    #[error("Invalid special form: {0}")]
    InvalidSpecialForm(String, Span), // Malformed special form, e.g. (if cond)
    #[error("Expected a symbol, got: {0}")]
    NotASymbol(String, Span), // define target was not a symbol
}

// Result type alias for convenience
pub type EvalResult<T = Value> = Result<T, EvalError>;

/// The closed set of special-form keywords. Recognized before symbol
/// resolution, so a user `define` can never shadow them.
const SPECIAL_FORMS: [&str; 5] = ["lambda", "if", "define", "begin", "quote"];

pub fn special_form_identifiers() -> HashSet<String> {
    SPECIAL_FORMS.iter().map(|s| s.to_string()).collect()
}

// --- Evaluate Function ---

/// Evaluates a parsed expression within the given environment.
///
/// Recursion depth is bounded only by the host call stack; deeply nested or
/// self-recursive programs can overflow it.
pub fn evaluate(node: &Node, env: Rc<RefCell<Environment>>) -> EvalResult {
    match &node.kind {
        // 1. Self-evaluating atoms
        Expr::Integer(n) => Ok(Value::Integer(*n)),
        Expr::Float(n) => Ok(Value::Float(*n)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),

        // 2. Symbols: look up in the environment. An unbound symbol is a
        // hard failure, never a null value.
        Expr::Symbol(name) => Ok(env.borrow().get(name, node.span)?),

        // 3. Lists: special forms or procedure calls
        Expr::List(elements) => {
            if let [first, rest @ ..] = &elements[..] {
                match &first.kind {
                    Expr::Symbol(sym_name) if sym_name == "quote" => {
                        evaluate_quote(rest, node.span)
                    }
                    Expr::Symbol(sym_name) if sym_name == "if" => {
                        evaluate_if(rest, env, node.span)
                    }
                    Expr::Symbol(sym_name) if sym_name == "define" => {
                        evaluate_define(rest, env, node.span)
                    }
                    Expr::Symbol(sym_name) if sym_name == "begin" => evaluate_begin(rest, env),
                    Expr::Symbol(sym_name) if sym_name == "lambda" => {
                        evaluate_lambda(rest, env, node.span)
                    }
                    // Anything else: the head evaluates to a procedure
                    _ => evaluate_procedure(first, rest, env, node.span),
                }
            } else {
                // The empty list evaluates to the empty sequence
                Ok(Value::Sequence(Vec::new()))
            }
        }
    }
}

/// `(quote e)` returns `e` unevaluated, lifted into the value space.
/// Nothing inside is looked up: symbols stay symbol-shaped.
fn evaluate_quote(operands: &[Node], span: Span) -> EvalResult {
    if let [node] = operands {
        Ok(quote_node(node))
    } else {
        Err(EvalError::InvalidSpecialForm(
            "quote expects exactly one argument".to_string(),
            span,
        ))
    }
}

fn quote_node(node: &Node) -> Value {
    match &node.kind {
        Expr::Integer(n) => Value::Integer(*n),
        Expr::Float(n) => Value::Float(*n),
        Expr::Str(s) => Value::Str(s.clone()),
        Expr::Symbol(s) => Value::Symbol(s.clone()),
        Expr::List(elements) => Value::Sequence(elements.iter().map(quote_node).collect()),
    }
}

fn evaluate_if(operands: &[Node], env: Rc<RefCell<Environment>>, span: Span) -> EvalResult {
    if let [condition, consequent, maybe_alternate @ ..] = operands
        && maybe_alternate.len() <= 1
    {
        let condition_result = evaluate(condition, env.clone())?;

        // Only the boolean `false` is falsy. Zero, the empty sequence and
        // `nil` all take the consequent branch.
        if condition_result.is_truthy() {
            evaluate(consequent, env)
        } else if let [alternate] = maybe_alternate {
            evaluate(alternate, env)
        } else {
            Ok(Value::Null)
        }
    } else {
        Err(EvalError::InvalidSpecialForm(
            "if expects condition, consequent, and optional alternate".to_string(),
            span,
        ))
    }
}

/// `(define name value)` evaluates the value, binds the name in the current
/// frame and returns the value. The only durable side effect besides
/// closure creation.
fn evaluate_define(operands: &[Node], env: Rc<RefCell<Environment>>, span: Span) -> EvalResult {
    if let [name_node, value_node] = operands {
        match &name_node.kind {
            Expr::Symbol(name) => {
                let value = evaluate(value_node, env.clone())?;
                env.borrow_mut().define(name.clone(), value.clone());
                Ok(value)
            }
            other => Err(EvalError::NotASymbol(other.to_string(), name_node.span)),
        }
    } else {
        Err(EvalError::InvalidSpecialForm(
            "define expects a name and a value".to_string(),
            span,
        ))
    }
}

/// `(begin e1 ... en)` evaluates left to right, returning the last result
/// or `nil` when empty.
fn evaluate_begin(operands: &[Node], env: Rc<RefCell<Environment>>) -> EvalResult {
    let mut result = Value::Null;
    for node in operands {
        result = evaluate(node, env.clone())?;
    }
    Ok(result)
}

/// `(lambda (params) body)` builds a closure without evaluating anything.
/// The closure captures its defining environment (lexical scoping).
fn evaluate_lambda(operands: &[Node], env: Rc<RefCell<Environment>>, span: Span) -> EvalResult {
    if let [params_node, body, ..] = operands {
        let params = match &params_node.kind {
            Expr::List(elements) => elements.iter().map(param_name).collect(),
            _ => {
                return Err(EvalError::InvalidSpecialForm(
                    "lambda parameters must be a list".to_string(),
                    params_node.span,
                ));
            }
        };
        Ok(Value::Procedure(Procedure::Lambda(Closure {
            params,
            body: body.clone(),
            env,
        })))
    } else {
        Err(EvalError::InvalidSpecialForm(
            "lambda expects a parameter list and a body".to_string(),
            span,
        ))
    }
}

// A parameter is normally a bare symbol; any other shape is tolerated by
// binding under its display form.
fn param_name(node: &Node) -> String {
    match &node.kind {
        Expr::Symbol(s) => s.clone(),
        other => other.to_string(),
    }
}

fn evaluate_procedure(
    operator: &Node,
    operands: &[Node],
    env: Rc<RefCell<Environment>>,
    span: Span,
) -> EvalResult {
    // 1. Evaluate the operator and check it is callable
    let procedure = match evaluate(operator, env.clone())? {
        Value::Procedure(procedure) => procedure,
        other => return Err(EvalError::NotAProcedure(other, operator.span)),
    };

    // 2. Evaluate the operands left to right
    let mut evaluated_args: Vec<Value> = Vec::with_capacity(operands.len());
    for operand_node in operands {
        evaluated_args.push(evaluate(operand_node, env.clone())?);
    }

    // 3. Apply
    apply_procedure(procedure, evaluated_args, span)
}

fn apply_procedure(procedure: Procedure, args: Vec<Value>, span: Span) -> EvalResult {
    match procedure {
        Procedure::Builtin(func, _) => {
            // Call the native primitive with evaluated args and call span
            func(args, span)
        }
        Procedure::Lambda(closure) => {
            if args.len() != closure.params.len() {
                return Err(EvalError::ArityMismatch {
                    expected: closure.params.len(),
                    got: args.len(),
                    span,
                });
            }
            // A fresh frame over the defining environment; bindings made
            // during the call never propagate back to the caller.
            let call_env = Environment::new_enclosed(closure.env.clone());
            {
                let mut frame = call_env.borrow_mut();
                for (param, arg) in closure.params.iter().zip(args) {
                    frame.define(param.clone(), arg);
                }
            }
            evaluate(&closure.body, call_env)
        }
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::Parser;

    // Parse a single expression of any shape (bare atoms allowed) and
    // evaluate it against the given environment.
    fn eval_str(input: &str, env: Rc<RefCell<Environment>>) -> EvalResult {
        let tokens = tokenize(input).unwrap_or_else(|e| panic!("Lexing failed for '{}': {}", input, e));
        let node = Parser::new(tokens)
            .parse_expr()
            .unwrap_or_else(|e| panic!("Parsing failed for '{}': {}", input, e));
        evaluate(&node, env)
    }

    // Helper to evaluate input string against a populated environment and
    // check the result
    fn assert_eval(input: &str, expected: Value, env: Option<Rc<RefCell<Environment>>>) {
        let env = env.unwrap_or_else(Environment::new_global_populated);
        match eval_str(input, env) {
            Ok(result) => assert_eq!(result, expected, "Input: '{}'", input),
            Err(e) => panic!("Evaluation failed for input '{}': {}", input, e),
        }
    }

    // Helper to assert evaluation errors by variant
    fn assert_eval_error(
        input: &str,
        expected_error_variant: &EvalError,
        env: Option<Rc<RefCell<Environment>>>,
    ) {
        let env = env.unwrap_or_else(Environment::new_global_populated);
        match eval_str(input, env) {
            Ok(result) => panic!(
                "Expected evaluation to fail for input '{}', but got: {:?}",
                input, result
            ),
            Err(e) => {
                assert_eq!(
                    std::mem::discriminant(&e),
                    std::mem::discriminant(expected_error_variant),
                    "Input: '{}', Expected error variant like {:?}, got: {:?}",
                    input,
                    expected_error_variant,
                    e
                );
            }
        }
    }

    fn sym_value(s: &str) -> Value {
        Value::Symbol(s.to_string())
    }

    #[test]
    fn test_eval_self_evaluating() {
        assert_eval("123", Value::Integer(123), None);
        assert_eval("-4.5", Value::Float(-4.5), None);
        assert_eval("'hello'", Value::Str("hello".to_string()), None);
        assert_eval("()", Value::Sequence(vec![]), None);
    }

    #[test]
    fn test_eval_symbol_lookup_ok() {
        let env = Environment::new();
        env.borrow_mut()
            .define("x".to_string(), Value::Integer(100));
        assert_eval("x", Value::Integer(100), Some(env));
    }

    #[test]
    fn test_eval_symbol_lookup_unbound() {
        let env = Environment::new(); // Empty env
        let unbound_error =
            EvalError::EnvError(EnvError::UnknownSymbol("".into(), Span::default()));
        assert_eval_error("y", &unbound_error, Some(env));
    }

    #[test]
    fn test_eval_nil_constant() {
        assert_eval("nil", Value::Null, None);
    }

    #[test]
    fn test_eval_quote() {
        assert_eval("(quote 1)", Value::Integer(1), None);
        assert_eval("(quote a)", sym_value("a"), None);
        assert_eval("(quote ())", Value::Sequence(vec![]), None);

        // (quote (a b c)) yields symbol-shaped items, none looked up
        let env = Environment::new(); // No bindings at all
        assert_eval(
            "(quote (a b c))",
            Value::Sequence(vec![sym_value("a"), sym_value("b"), sym_value("c")]),
            Some(env),
        );

        // Nested shapes survive
        assert_eval(
            "(quote (1 (x 'str') 2.5))",
            Value::Sequence(vec![
                Value::Integer(1),
                Value::Sequence(vec![sym_value("x"), Value::Str("str".to_string())]),
                Value::Float(2.5),
            ]),
            None,
        );

        // Wrong number of arguments
        let form_error = EvalError::InvalidSpecialForm("".into(), Span::default());
        assert_eval_error("(quote a b)", &form_error, None);
        assert_eval_error("(quote)", &form_error, None);
    }

    #[test]
    fn test_eval_if_branching() {
        assert_eval("(if (> 3 2) 'yes' 'no')", Value::Str("yes".to_string()), None);
        assert_eval("(if (> 2 3) 'yes' 'no')", Value::Str("no".to_string()), None);
    }

    #[test]
    fn test_eval_if_truthiness() {
        // Only the boolean false is falsy: 0, nil, empty list are all truthy
        assert_eval("(if 0 1 2)", Value::Integer(1), None);
        assert_eval("(if nil 1 2)", Value::Integer(1), None);
        assert_eval("(if () 1 2)", Value::Integer(1), None);
        assert_eval("(if 'x' 1 2)", Value::Integer(1), None);
        assert_eval("(if (quote x) 1 2)", Value::Integer(1), None);
        assert_eval("(if (= 1 2) 1 2)", Value::Integer(2), None);
    }

    #[test]
    fn test_eval_if_missing_alternate() {
        assert_eval("(if (> 3 2) 1)", Value::Integer(1), None);
        assert_eval("(if (> 2 3) 1)", Value::Null, None);
    }

    #[test]
    fn test_eval_if_does_not_evaluate_unused_branch() {
        // An unbound variable in the untaken branch must not error
        assert_eval("(if (> 3 2) 1 unbound-variable)", Value::Integer(1), None);
        assert_eval("(if (> 2 3) unbound-variable 2)", Value::Integer(2), None);
    }

    #[test]
    fn test_eval_if_error_arity() {
        let form_error = &EvalError::InvalidSpecialForm("".into(), Span::default());
        assert_eval_error("(if)", form_error, None);
        assert_eval_error("(if 1)", form_error, None);
        assert_eval_error("(if 1 2 3 4)", form_error, None);
    }

    #[test]
    fn test_eval_define() {
        let env = Environment::new_global_populated();
        // define returns the bound value
        assert_eval("(define x 5)", Value::Integer(5), Some(env.clone()));
        // and the binding is durable in the same environment
        assert_eval("x", Value::Integer(5), Some(env.clone()));
        assert_eval("(+ x 1)", Value::Integer(6), Some(env));
    }

    #[test]
    fn test_eval_define_idempotent() {
        let env = Environment::new_global_populated();
        assert_eval("(define x 1)", Value::Integer(1), Some(env.clone()));
        assert_eval("(define x 1)", Value::Integer(1), Some(env.clone()));
        assert_eval("x", Value::Integer(1), Some(env));
    }

    #[test]
    fn test_eval_define_errors() {
        let form_error = &EvalError::InvalidSpecialForm("".into(), Span::default());
        assert_eval_error("(define x)", form_error, None);
        assert_eval_error("(define x 1 2)", form_error, None);

        let not_symbol = &EvalError::NotASymbol("".into(), Span::default());
        assert_eval_error("(define 3 1)", not_symbol, None);
        assert_eval_error("(define (x) 1)", not_symbol, None);
    }

    #[test]
    fn test_eval_define_cannot_shadow_special_forms() {
        let env = Environment::new_global_populated();
        assert_eval("(define if 99)", Value::Integer(99), Some(env.clone()));
        // `if` still dispatches as a special form
        assert_eval("(if (> 2 3) 1 2)", Value::Integer(2), Some(env));
    }

    #[test]
    fn test_eval_begin() {
        assert_eval("(begin 1 2 3)", Value::Integer(3), None);
        assert_eval("(begin)", Value::Null, None);
        assert_eval("(begin (define x 5) (+ x 1))", Value::Integer(6), None);
    }

    #[test]
    fn test_eval_begin_defines_persist_in_session() {
        // A REPL session: one frame over the base environment
        let session = Environment::new_enclosed(Environment::new_global_populated());
        assert_eval(
            "(begin (define x 5) (+ x 1))",
            Value::Integer(6),
            Some(session.clone()),
        );
        // A later top-level evaluation in the same session sees x = 5
        assert_eval("x", Value::Integer(5), Some(session));
    }

    #[test]
    fn test_eval_lambda_builds_closure() {
        let env = Environment::new_global_populated();
        let result = eval_str("(lambda (a b) (+ a b))", env).unwrap();
        match result {
            Value::Procedure(Procedure::Lambda(closure)) => {
                assert_eq!(closure.params, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("Expected a lambda, got {:?}", other),
        }
    }

    #[test]
    fn test_eval_lambda_errors() {
        let form_error = &EvalError::InvalidSpecialForm("".into(), Span::default());
        assert_eval_error("(lambda)", form_error, None);
        assert_eval_error("(lambda (a))", form_error, None);
        assert_eval_error("(lambda a (+ a 1))", form_error, None);
    }

    #[test]
    fn test_eval_lambda_application() {
        assert_eval("((lambda (a b) (+ a b)) 1 2)", Value::Integer(3), None);
        assert_eval("((lambda () 42))", Value::Integer(42), None);
    }

    #[test]
    fn test_eval_lambda_arity_mismatch() {
        let env = Environment::new_global_populated();
        match eval_str("((lambda (a b) a) 1)", env) {
            Err(EvalError::ArityMismatch { expected, got, .. }) => {
                assert_eq!(expected, 2);
                assert_eq!(got, 1);
            }
            other => panic!("Expected arity mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_eval_lambda_lexical_capture() {
        let env = Environment::new_global_populated();
        assert_eval(
            "(begin \
               (define make-adder (lambda (n) (lambda (x) (+ x n)))) \
               (define add2 (make-adder 2)) \
               (add2 40))",
            Value::Integer(42),
            Some(env),
        );
    }

    #[test]
    fn test_eval_lambda_recursion() {
        assert_eval(
            "(begin \
               (define fact (lambda (n) (if (= n 0) 1 (* n (fact (- n 1)))))) \
               (fact 5))",
            Value::Integer(120),
            None,
        );
    }

    #[test]
    fn test_eval_lambda_bindings_do_not_leak() {
        let env = Environment::new_global_populated();
        assert_eval(
            "(begin \
               (define f (lambda (x) (begin (define y 10) (+ x y)))) \
               (f 1))",
            Value::Integer(11),
            Some(env.clone()),
        );
        // Neither the parameter nor the inner define escape the call
        let unbound_error =
            EvalError::EnvError(EnvError::UnknownSymbol("".into(), Span::default()));
        assert_eval_error("x", &unbound_error, Some(env.clone()));
        assert_eval_error("y", &unbound_error, Some(env));
    }

    #[test]
    fn test_eval_compound_operator_position() {
        // The head may itself be a compound expression evaluating to a
        // procedure
        assert_eval("((if (> 2 1) + -) 10 5)", Value::Integer(15), None);
        assert_eval("((if (> 1 2) + -) 10 5)", Value::Integer(5), None);
    }

    #[test]
    fn test_eval_not_procedure_error() {
        let not_proc = &EvalError::NotAProcedure(Value::Null, Span::default());
        assert_eval_error("(1 2 3)", not_proc, None);
        assert_eval_error("('hello' 1)", not_proc, None);
        assert_eval_error("((list 1 2) 3)", not_proc, None);
    }

    #[test]
    fn test_eval_operands_evaluated_left_to_right() {
        assert_eval(
            "(begin (define x 1) (list (define x 2) x))",
            Value::Sequence(vec![Value::Integer(2), Value::Integer(2)]),
            None,
        );
    }

    #[test]
    fn test_special_form_identifiers() {
        let identifiers = special_form_identifiers();
        for name in ["lambda", "if", "define", "begin", "quote"] {
            assert!(identifiers.contains(name), "missing {}", name);
        }
        assert_eq!(identifiers.len(), 5);
    }
}
