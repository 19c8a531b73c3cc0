use crate::source::Span;
use crate::types::{BuiltinFn, Procedure, Value};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use thiserror::Error;

// --- Environment Error ---

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnvError {
    #[error("Unknown symbol: '{0}'")]
    UnknownSymbol(String, Span), // Symbol name, span where lookup happened
}

// --- Environment Definition ---

/// A frame of name-to-value bindings, chained to an optional outer frame.
///
/// The base environment is one populated global frame; each REPL session
/// layers its own frame on top so top-level `define`s persist across lines
/// without ever touching the shared built-in table. Closure application
/// layers a parameter frame over the closure's defining environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    // Rc<RefCell<...>> allows shared ownership and interior mutability,
    // needed for closures capturing their defining environment.
    outer: Option<Rc<RefCell<Environment>>>,
    bindings: HashMap<String, Value>,
}

impl Environment {
    /// Creates a new, empty top-level environment.
    pub fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Environment {
            outer: None,
            bindings: HashMap::new(),
        }))
    }

    /// Creates the base environment: the built-in table plus the `nil`
    /// binding. Built once per execution context (REPL session, file run).
    pub fn new_global_populated() -> Rc<RefCell<Environment>> {
        let env_ptr = Environment::new(); // Create empty global env
        {
            // Borrow mutably only inside this scope
            let mut env = env_ptr.borrow_mut();

            // Arithmetic
            env.add_builtin("+", crate::primitives::prim_add);
            env.add_builtin("-", crate::primitives::prim_sub);
            env.add_builtin("*", crate::primitives::prim_mul);
            env.add_builtin("/", crate::primitives::prim_div);

            // Comparisons
            env.add_builtin(">", crate::primitives::prim_greater_than);
            env.add_builtin(">=", crate::primitives::prim_greater_than_or_equals);
            env.add_builtin("<", crate::primitives::prim_less_than);
            env.add_builtin("<=", crate::primitives::prim_less_than_or_equals);
            env.add_builtin("=", crate::primitives::prim_equals);
            env.add_builtin("!=", crate::primitives::prim_not_equals);

            // List operations
            env.add_builtin("list", crate::primitives::prim_list);
            env.add_builtin("car", crate::primitives::prim_car);
            env.add_builtin("cdr", crate::primitives::prim_cdr);
            env.add_builtin("cons", crate::primitives::prim_cons);
            env.add_builtin("length", crate::primitives::prim_length);
            env.add_builtin("append", crate::primitives::prim_append);

            // Misc
            env.add_builtin("null?", crate::primitives::prim_is_null);
            env.add_builtin("print", crate::primitives::prim_print);
            env.define("nil".to_string(), Value::Null);
        }
        env_ptr
    }

    /// Creates a new environment enclosed within an outer one.
    pub fn new_enclosed(outer_env: Rc<RefCell<Environment>>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Environment {
            outer: Some(outer_env),
            bindings: HashMap::new(),
        }))
    }

    /// Defines a variable in the *current* environment frame.
    /// Replaces the value if the variable already exists in this frame.
    pub fn define(&mut self, name: String, value: Value) {
        self.bindings.insert(name, value);
    }

    /// Looks up a variable's value.
    /// Checks the current environment first, then walks up the outer chain.
    /// `lookup_span` is the location where the variable was referenced.
    pub fn get(&self, name: &str, lookup_span: Span) -> Result<Value, EnvError> {
        if let Some(value) = self.bindings.get(name) {
            Ok(value.clone())
        } else {
            match &self.outer {
                Some(outer_env_ptr) => outer_env_ptr.borrow().get(name, lookup_span),
                None => Err(EnvError::UnknownSymbol(name.to_string(), lookup_span)),
            }
        }
    }

    /// Helper to add a builtin procedure to the environment.
    fn add_builtin(&mut self, name: &str, func: BuiltinFn) {
        let value = Value::Procedure(Procedure::Builtin(func, name.to_string()));
        self.define(name.to_string(), value);
    }

    fn add_identifiers(&self, mut identifiers: HashSet<String>) -> HashSet<String> {
        for identifier in self.bindings.keys() {
            identifiers.insert(identifier.to_string());
        }
        identifiers
    }

    /// Gets a list of all identifiers visible from the current environment
    pub fn get_identifiers(&self) -> HashSet<String> {
        let identifiers = self.bindings.keys().map(|i| i.to_string()).collect();
        match self.outer {
            Some(ref outer_env_ptr) => outer_env_ptr.borrow().add_identifiers(identifiers),
            None => identifiers,
        }
    }
}
