use crate::environment::Environment;
use crate::evaluator::EvalResult;
use crate::source::Span;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A parsed expression together with the source span it covers.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: Expr, // The actual expression data
    pub span: Span, // The source span it covers
}

impl Node {
    pub fn new(kind: Expr, span: Span) -> Self {
        Node { kind, span }
    }

    pub fn new_integer(n: i64, span: Span) -> Self {
        Node::new(Expr::Integer(n), span)
    }

    pub fn new_float(n: f64, span: Span) -> Self {
        Node::new(Expr::Float(n), span)
    }

    pub fn new_string(s: &str, span: Span) -> Self {
        Node::new(Expr::Str(s.to_string()), span)
    }

    pub fn new_symbol(s: &str, span: Span) -> Self {
        Node::new(Expr::Symbol(s.to_string()), span)
    }

    pub fn new_list(elements: Vec<Node>, span: Span) -> Self {
        Node::new(Expr::List(elements), span)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Delegate to Expr's Display implementation
        write!(f, "{}", self.kind)
    }
}

/// The expression tree produced by the parser and consumed by the evaluator.
/// After `quote` these shapes leak into the value space (see [`Value`]).
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Integer(i64),     // Exact integer, classified before float
    Float(f64),       // Binary floating point
    Str(String),      // Single-quote delimited literal, quotes stripped
    Symbol(String),   // Resolved against an environment at evaluation time
    List(Vec<Node>),  // Code (application / special form) or, quoted, data
}

impl Expr {
    pub fn type_name(&self) -> &'static str {
        match self {
            Expr::Integer(_) => "integer",
            Expr::Float(_) => "float",
            Expr::Str(_) => "string",
            Expr::Symbol(_) => "symbol",
            Expr::List(_) => "list",
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Integer(n) => write!(f, "{}", n),
            Expr::Float(n) => write_float(f, *n),
            Expr::Str(s) => write!(f, "'{}'", s),
            Expr::Symbol(s) => write!(f, "{}", s),
            Expr::List(elements) => {
                write!(f, "(")?;
                let mut first = true;
                for expr in elements {
                    if !first {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", expr)?;
                    first = false;
                }
                write!(f, ")")
            }
        }
    }
}

// Keep a trailing ".0" on whole floats so they stay distinguishable from
// integers when printed.
fn write_float(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.is_finite() && n.fract() == 0.0 {
        write!(f, "{:.1}", n)
    } else {
        write!(f, "{}", n)
    }
}

/// A runtime value. Symbols never escape evaluation as values except through
/// `quote`, which lifts unevaluated expression shapes into the value space.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Str(String),
    Boolean(bool),
    Null,                 // The null/unit value, bound to `nil`
    Symbol(String),       // Only produced by `quote`
    Sequence(Vec<Value>), // The Lisp "list" value
    Procedure(Procedure),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Boolean(_) => "boolean",
            Value::Null => "nil",
            Value::Symbol(_) => "symbol",
            Value::Sequence(_) => "list",
            Value::Procedure(_) => "procedure",
        }
    }

    /// Truthiness rule for `if`: only the boolean `false` is falsy. Zero,
    /// the empty sequence and `nil` are all truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Boolean(false))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) => write_float(f, *n),
            Value::Str(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            Value::Null => write!(f, "nil"),
            Value::Symbol(s) => write!(f, "{}", s),
            Value::Sequence(elements) => {
                write!(f, "(")?;
                let mut first = true;
                for value in elements {
                    if !first {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", value)?;
                    first = false;
                }
                write!(f, ")")
            }
            Value::Procedure(procedure) => write!(f, "{}", procedure),
        }
    }
}

pub type BuiltinFn = fn(Vec<Value>, Span) -> EvalResult;

/// A callable: either a native primitive or a user closure.
#[derive(Clone)] // Need Clone for Value::Procedure
pub enum Procedure {
    Builtin(BuiltinFn, String), // The function pointer and its name (for display/debug)
    Lambda(Closure),
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Procedure::Builtin(_, name) => write!(f, "#<primitive:{}>", name),
            Procedure::Lambda(closure) => {
                write!(f, "#<lambda ({})>", closure.params.join(" "))
            }
        }
    }
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Procedure::Builtin(_, name) => write!(f, "Builtin({})", name),
            Procedure::Lambda(closure) => write!(f, "Lambda({:?})", closure.params),
        }
    }
}

// Builtins compare by name; closures by parameters and body. The captured
// environment is deliberately left out of the comparison since environment
// chains can be cyclic through recursive definitions.
impl PartialEq for Procedure {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Procedure::Builtin(_, n1), Procedure::Builtin(_, n2)) => n1 == n2,
            (Procedure::Lambda(c1), Procedure::Lambda(c2)) => {
                c1.params == c2.params && c1.body == c2.body
            }
            _ => false,
        }
    }
}

/// A user-defined function: formal parameter names, one unevaluated body
/// expression, and the environment it was defined in (lexical scoping).
#[derive(Clone)]
pub struct Closure {
    pub params: Vec<String>,
    pub body: Node,
    pub env: Rc<RefCell<Environment>>,
}
