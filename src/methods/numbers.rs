//! Number methods, plus `.str` on bool and null
//!
//! `.str` follows the interpolation rules: whole numbers render without a
//! decimal point.

use crate::error::RillError;
use crate::value::{fmt_number, Value};
use rill_macros::method;

fn receiver(method: &str, recv: &Value) -> Result<f64, RillError> {
    match recv {
        Value::Number(n) => Ok(*n),
        other => Err(RillError::receiver_error(method, "number", other.kind())),
    }
}

#[method(receiver = "number", name = "str", category = "Numbers")]
/// Text form of the number; integral values drop the decimal point.
///
/// # Examples
/// ```rill
/// 42.str => "42"
/// 2.5.str => "2.5"
/// ```
pub fn number_str(recv: &Value, _args: &[Value]) -> Result<Value, RillError> {
    let n = receiver("str", recv)?;
    Ok(Value::str(fmt_number(n)))
}

#[method(receiver = "number", name = "abs", category = "Numbers")]
/// Absolute value.
pub fn number_abs(recv: &Value, _args: &[Value]) -> Result<Value, RillError> {
    Ok(Value::Number(receiver("abs", recv)?.abs()))
}

#[method(receiver = "number", name = "floor", category = "Numbers")]
/// Largest integer not above the receiver.
pub fn number_floor(recv: &Value, _args: &[Value]) -> Result<Value, RillError> {
    Ok(Value::Number(receiver("floor", recv)?.floor()))
}

#[method(receiver = "number", name = "ceil", category = "Numbers")]
/// Smallest integer not below the receiver.
pub fn number_ceil(recv: &Value, _args: &[Value]) -> Result<Value, RillError> {
    Ok(Value::Number(receiver("ceil", recv)?.ceil()))
}

#[method(receiver = "number", name = "round", category = "Numbers")]
/// Nearest integer, half away from zero.
pub fn number_round(recv: &Value, _args: &[Value]) -> Result<Value, RillError> {
    Ok(Value::Number(receiver("round", recv)?.round()))
}

#[method(receiver = "bool", name = "str", category = "Numbers")]
/// `"true"` or `"false"`.
pub fn bool_str(recv: &Value, _args: &[Value]) -> Result<Value, RillError> {
    match recv {
        Value::Bool(b) => Ok(Value::str(if *b { "true" } else { "false" })),
        other => Err(RillError::receiver_error("str", "bool", other.kind())),
    }
}

#[method(receiver = "null", name = "str", category = "Numbers")]
/// The text `"null"`.
pub fn null_str(recv: &Value, _args: &[Value]) -> Result<Value, RillError> {
    match recv {
        Value::Null => Ok(Value::str("null")),
        other => Err(RillError::receiver_error("str", "null", other.kind())),
    }
}

#[cfg(test)]
mod tests {
    use crate::context::RuntimeContext;
    use crate::eval::execute;
    use crate::parser::parse;
    use crate::value::Value;

    fn run_ok(source: &str) -> Value {
        let program = parse(source).unwrap();
        let ctx = RuntimeContext::builder().build();
        execute(&program, &ctx)
            .unwrap_or_else(|e| panic!("{}: {}", e.error_id, e.message))
            .value
    }

    #[test]
    fn test_str_forms() {
        assert_eq!(run_ok("42 -> { $.str }"), Value::str("42"));
        assert_eq!(run_ok("2.5 -> { $.str }"), Value::str("2.5"));
        assert_eq!(run_ok("true -> { $.str }"), Value::str("true"));
        assert_eq!(run_ok("null -> { $.str }"), Value::str("null"));
    }

    #[test]
    fn test_rounding_family() {
        assert_eq!(run_ok("(0 - 2.5) -> { $.abs }"), Value::Number(2.5));
        assert_eq!(run_ok("2.7 -> { $.floor }"), Value::Number(2.0));
        assert_eq!(run_ok("2.2 -> { $.ceil }"), Value::Number(3.0));
        assert_eq!(run_ok("2.5 -> { $.round }"), Value::Number(3.0));
    }
}
