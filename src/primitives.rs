use crate::evaluator::{EvalError, EvalResult};
use crate::source::Span;
use crate::types::Value;

// Checks the number of arguments
macro_rules! check_arity {
    ($args:expr, $expected:expr, $span:expr, $name:expr) => {
        if $args.len() != $expected {
            return Err(EvalError::InvalidArguments(
                format!(
                    "Primitive '{}' expects exactly {} arguments, got {}",
                    $name,
                    $expected,
                    $args.len()
                ),
                $span,
            ));
        }
    };
    // Variant for minimum number of args
    ($args:expr, min $expected:expr, $span:expr, $name:expr) => {
        if $args.len() < $expected {
            return Err(EvalError::InvalidArguments(
                format!(
                    "Primitive '{}' expects at least {} arguments, got {}",
                    $name,
                    $expected,
                    $args.len()
                ),
                $span,
            ));
        }
    };
}

// Extracts a number from a Value or returns a wrong-type error
macro_rules! expect_number {
    ($value:expr, $span:expr, $name:expr, $arg_pos:expr) => {
        match Number::from_value($value) {
            Some(n) => n,
            None => {
                return Err(EvalError::InvalidArguments(
                    format!(
                        "Primitive '{}' expects a number for argument {}, got {}",
                        $name,
                        $arg_pos,
                        $value.type_name()
                    ),
                    $span, // Use call span for arg type errors
                ));
            }
        }
    };
}

/// Mixed integer/float arithmetic: integers stay integral until a float
/// operand promotes the whole fold.
#[derive(Debug, Copy, Clone)]
enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    fn from_value(value: &Value) -> Option<Number> {
        match value {
            Value::Integer(n) => Some(Number::Integer(*n)),
            Value::Float(n) => Some(Number::Float(*n)),
            _ => None,
        }
    }

    fn to_value(self) -> Value {
        match self {
            Number::Integer(n) => Value::Integer(n),
            Number::Float(n) => Value::Float(n),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Number::Integer(n) => n as f64,
            Number::Float(n) => n,
        }
    }

    // Integer arithmetic is checked so an overflowing fold surfaces as an
    // error value instead of a panic; float arithmetic cannot fail.
    fn combine<I, F>(self, other: Number, int_op: I, float_op: F) -> Option<Number>
    where
        I: Fn(i64, i64) -> Option<i64>,
        F: Fn(f64, f64) -> f64,
    {
        match (self, other) {
            (Number::Integer(a), Number::Integer(b)) => int_op(a, b).map(Number::Integer),
            (a, b) => Some(Number::Float(float_op(a.as_f64(), b.as_f64()))),
        }
    }
}

fn overflow_error(operator: &str, span: Span) -> EvalError {
    EvalError::InvalidArguments(format!("Integer overflow in '{}'", operator), span)
}

fn fold_numbers<I, F>(
    args: Vec<Value>,
    span: Span,
    start: Number,
    int_op: I,
    float_op: F,
    operator: &str,
) -> EvalResult
where
    I: Fn(i64, i64) -> Option<i64>,
    F: Fn(f64, f64) -> f64,
{
    let mut acc = start;
    for (i, value) in args.iter().enumerate() {
        let num = expect_number!(value, span, operator, i + 1);
        acc = acc
            .combine(num, &int_op, &float_op)
            .ok_or_else(|| overflow_error(operator, span))?;
    }
    Ok(acc.to_value())
}

pub fn prim_add(args: Vec<Value>, span: Span) -> EvalResult {
    // (+) -> 0
    // (+ 1 2 3) -> 6
    fold_numbers(args, span, Number::Integer(0), i64::checked_add, |a, b| a + b, "+")
}

pub fn prim_sub(args: Vec<Value>, span: Span) -> EvalResult {
    // (- x) -> -x
    // (- x y z) -> x - y - z
    check_arity!(args, min 1, span, "-");
    let first = expect_number!(&args[0], span, "-", 1);

    if args.len() == 1 {
        match first {
            Number::Integer(n) => match n.checked_neg() {
                Some(negated) => Ok(Value::Integer(negated)),
                None => Err(overflow_error("-", span)),
            },
            Number::Float(n) => Ok(Value::Float(-n)),
        }
    } else {
        let mut acc = first;
        for (i, value) in args.iter().skip(1).enumerate() {
            let num = expect_number!(value, span, "-", i + 2);
            acc = acc
                .combine(num, i64::checked_sub, |a, b| a - b)
                .ok_or_else(|| overflow_error("-", span))?;
        }
        Ok(acc.to_value())
    }
}

pub fn prim_mul(args: Vec<Value>, span: Span) -> EvalResult {
    // (*) -> 1
    // (* 2 3 4) -> 24
    fold_numbers(args, span, Number::Integer(1), i64::checked_mul, |a, b| a * b, "*")
}

pub fn prim_div(args: Vec<Value>, span: Span) -> EvalResult {
    // (/ x) -> 1/x
    // (/ x y z) -> x / y / z
    // Division is always carried out in floats (true division).
    check_arity!(args, min 1, span, "/");
    let first = expect_number!(&args[0], span, "/", 1).as_f64();

    if args.len() == 1 {
        if first == 0.0 {
            return Err(EvalError::InvalidArguments(
                "Division by zero: (/ 0)".to_string(),
                span,
            ));
        }
        Ok(Value::Float(1.0 / first))
    } else {
        let mut result = first;
        for (i, value) in args.iter().skip(1).enumerate() {
            let num = expect_number!(value, span, "/", i + 2).as_f64();
            if num == 0.0 {
                return Err(EvalError::InvalidArguments(
                    "Division by zero".to_string(),
                    span,
                ));
            }
            result /= num;
        }
        Ok(Value::Float(result))
    }
}

fn compare_numbers<F: Fn(f64, f64) -> bool>(
    args: Vec<Value>,
    span: Span,
    compare: F,
    operator: &str,
) -> EvalResult {
    // (< n1 n2 ...) -> boolean, chained pairwise
    check_arity!(args, min 2, span, operator);
    let mut last_val = expect_number!(&args[0], span, operator, 1).as_f64();
    let mut result = true;
    for (index, arg) in args.iter().enumerate().skip(1) {
        let val = expect_number!(arg, span, operator, index + 1).as_f64();
        result = result && compare(last_val, val);
        last_val = val;
    }
    Ok(Value::Boolean(result))
}

pub fn prim_greater_than(args: Vec<Value>, span: Span) -> EvalResult {
    compare_numbers(args, span, |left, right| left > right, ">")
}

pub fn prim_greater_than_or_equals(args: Vec<Value>, span: Span) -> EvalResult {
    compare_numbers(args, span, |left, right| left >= right, ">=")
}

pub fn prim_less_than(args: Vec<Value>, span: Span) -> EvalResult {
    compare_numbers(args, span, |left, right| left < right, "<")
}

pub fn prim_less_than_or_equals(args: Vec<Value>, span: Span) -> EvalResult {
    compare_numbers(args, span, |left, right| left <= right, "<=")
}

// Generic equality; numbers compare numerically across the integer/float
// divide so (= 3 3.0) holds.
fn values_equal(left: &Value, right: &Value) -> bool {
    match (Number::from_value(left), Number::from_value(right)) {
        (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

pub fn prim_equals(args: Vec<Value>, span: Span) -> EvalResult {
    check_arity!(args, 2, span, "=");
    Ok(Value::Boolean(values_equal(&args[0], &args[1])))
}

pub fn prim_not_equals(args: Vec<Value>, span: Span) -> EvalResult {
    check_arity!(args, 2, span, "!=");
    Ok(Value::Boolean(!values_equal(&args[0], &args[1])))
}

// --- List primitives ---

pub fn prim_list(args: Vec<Value>, _span: Span) -> EvalResult {
    // (list item1 item2 ...) -> sequence of the (already evaluated) items
    Ok(Value::Sequence(args))
}

pub fn prim_car(args: Vec<Value>, span: Span) -> EvalResult {
    // (car list) -> first item; (car (list)) -> nil
    check_arity!(args, 1, span, "car");
    match &args[0] {
        Value::Sequence(elements) => Ok(elements.first().cloned().unwrap_or(Value::Null)),
        other => Err(EvalError::InvalidArguments(
            format!("Primitive 'car' expects a list, got {}", other.type_name()),
            span,
        )),
    }
}

pub fn prim_cdr(args: Vec<Value>, span: Span) -> EvalResult {
    // (cdr list) -> all but the first item; empty or single-element input
    // yields the empty sequence
    check_arity!(args, 1, span, "cdr");
    match &args[0] {
        Value::Sequence(elements) => {
            if elements.len() <= 1 {
                Ok(Value::Sequence(Vec::new()))
            } else {
                Ok(Value::Sequence(elements[1..].to_vec()))
            }
        }
        other => Err(EvalError::InvalidArguments(
            format!("Primitive 'cdr' expects a list, got {}", other.type_name()),
            span,
        )),
    }
}

pub fn prim_cons(args: Vec<Value>, span: Span) -> EvalResult {
    // (cons x list) -> [x, ..list]
    // A non-sequence second argument is treated as a one-element sequence.
    check_arity!(args, 2, span, "cons");
    let mut iter = args.into_iter();
    let head = iter.next().unwrap_or(Value::Null);
    let tail = iter.next().unwrap_or(Value::Null);

    let mut elements = vec![head];
    match tail {
        Value::Sequence(rest) => elements.extend(rest),
        other => elements.push(other),
    }
    Ok(Value::Sequence(elements))
}

pub fn prim_length(args: Vec<Value>, span: Span) -> EvalResult {
    // (length list) -> element count; strings count characters
    check_arity!(args, 1, span, "length");
    match &args[0] {
        Value::Sequence(elements) => Ok(Value::Integer(elements.len() as i64)),
        Value::Str(s) => Ok(Value::Integer(s.chars().count() as i64)),
        other => Err(EvalError::InvalidArguments(
            format!(
                "Primitive 'length' expects a list or string, got {}",
                other.type_name()
            ),
            span,
        )),
    }
}

pub fn prim_append(args: Vec<Value>, span: Span) -> EvalResult {
    // (append l1 l2 ...) -> concatenation; (append) -> ()
    let mut elements = Vec::new();
    for (i, arg) in args.into_iter().enumerate() {
        match arg {
            Value::Sequence(rest) => elements.extend(rest),
            other => {
                return Err(EvalError::InvalidArguments(
                    format!(
                        "Primitive 'append' expects a list for argument {}, got {}",
                        i + 1,
                        other.type_name()
                    ),
                    span,
                ));
            }
        }
    }
    Ok(Value::Sequence(elements))
}

// --- Misc primitives ---

pub fn prim_is_null(args: Vec<Value>, span: Span) -> EvalResult {
    // (null? obj) -> boolean
    check_arity!(args, 1, span, "null?");
    Ok(Value::Boolean(matches!(args[0], Value::Null)))
}

pub fn prim_print(args: Vec<Value>, span: Span) -> EvalResult {
    // (print obj) -> nil; writes the display form and a newline to stdout
    check_arity!(args, 1, span, "print");
    println!("{}", args[0]);
    Ok(Value::Null)
}
