//! List methods
//!
//! Membership uses deep equality with strict type equality: `1` never
//! matches `"1"` or `true`.

use super::{list_arg, str_arg};
use crate::error::RillError;
use crate::value::Value;
use rill_macros::method;

fn receiver<'a>(method: &str, recv: &'a Value) -> Result<&'a [Value], RillError> {
    match recv {
        Value::List(items) => Ok(items),
        other => Err(RillError::receiver_error(method, "list", other.kind())),
    }
}

#[method(receiver = "list", name = "str", category = "Lists")]
/// Compact JSON-like text form.
pub fn list_str(recv: &Value, _args: &[Value]) -> Result<Value, RillError> {
    receiver("str", recv)?;
    recv.render().map(Value::str)
}

#[method(receiver = "list", name = "len", category = "Lists")]
/// Number of elements.
pub fn list_len(recv: &Value, _args: &[Value]) -> Result<Value, RillError> {
    Ok(Value::Number(receiver("len", recv)?.len() as f64))
}

#[method(receiver = "list", name = "empty", category = "Lists")]
/// True when the list has no elements.
pub fn list_empty(recv: &Value, _args: &[Value]) -> Result<Value, RillError> {
    Ok(Value::Bool(receiver("empty", recv)?.is_empty()))
}

#[method(receiver = "list", name = "has", arity = 1, category = "Lists")]
/// Deep-equality membership test.
///
/// # Examples
/// ```rill
/// [1, [2, 3]].has([2, 3]) => true
/// [1].has("1") => false
/// ```
pub fn list_has(recv: &Value, args: &[Value]) -> Result<Value, RillError> {
    let items = receiver("has", recv)?;
    Ok(Value::Bool(items.contains(&args[0])))
}

#[method(receiver = "list", name = "has_any", arity = 1, category = "Lists")]
/// True when any needle from the argument list is present. An empty needle
/// list answers false.
pub fn list_has_any(recv: &Value, args: &[Value]) -> Result<Value, RillError> {
    let items = receiver("has_any", recv)?;
    let needles = list_arg("has_any", args, 0)?;
    Ok(Value::Bool(needles.iter().any(|n| items.contains(n))))
}

#[method(receiver = "list", name = "has_all", arity = 1, category = "Lists")]
/// True when every needle from the argument list is present. An empty
/// needle list answers true.
pub fn list_has_all(recv: &Value, args: &[Value]) -> Result<Value, RillError> {
    let items = receiver("has_all", recv)?;
    let needles = list_arg("has_all", args, 0)?;
    Ok(Value::Bool(needles.iter().all(|n| items.contains(n))))
}

#[method(receiver = "list", name = "join", arity = 1, category = "Lists")]
/// Join a list of strings with a separator.
///
/// # Examples
/// ```rill
/// ["a", "b"].join("-") => "a-b"
/// ```
pub fn list_join(recv: &Value, args: &[Value]) -> Result<Value, RillError> {
    let items = receiver("join", recv)?;
    let sep = str_arg("join", args, 0)?;
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Str(s) => parts.push(s.clone()),
            other => {
                return Err(RillError::type_error(format!(
                    "join() requires a list of strings, found {}",
                    other.kind()
                )));
            }
        }
    }
    Ok(Value::str(parts.join(sep)))
}

#[method(receiver = "list", name = "first", category = "Lists")]
/// First element, or null when empty.
pub fn list_first(recv: &Value, _args: &[Value]) -> Result<Value, RillError> {
    Ok(receiver("first", recv)?.first().cloned().unwrap_or(Value::Null))
}

#[method(receiver = "list", name = "last", category = "Lists")]
/// Last element, or null when empty.
pub fn list_last(recv: &Value, _args: &[Value]) -> Result<Value, RillError> {
    Ok(receiver("last", recv)?.last().cloned().unwrap_or(Value::Null))
}

#[method(receiver = "list", name = "reverse", category = "Lists")]
/// Fresh list with elements in reverse order.
pub fn list_reverse(recv: &Value, _args: &[Value]) -> Result<Value, RillError> {
    let mut items = receiver("reverse", recv)?.to_vec();
    items.reverse();
    Ok(Value::list(items))
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
    fn test_has_uses_strict_deep_equality() {
        assert_eq!(run_ok(r#"[1, 2].has(1)"#), Value::Bool(true));
        assert_eq!(run_ok(r#"[1, 2].has("1")"#), Value::Bool(false));
        assert_eq!(run_ok(r#"[1].has(true)"#), Value::Bool(false));
        assert_eq!(run_ok(r#"[[1, 2]].has([1, 2])"#), Value::Bool(true));
        assert_eq!(run_ok(r#"[[a: 1]].has([a: 1])"#), Value::Bool(true));
        assert_eq!(run_ok(r#"[[a: 1]].has([a: 2])"#), Value::Bool(false));
    }

    #[test]
    fn test_membership_boundary_needles() {
        assert_eq!(run_ok(r#"[0, "", false].has(0)"#), Value::Bool(true));
        assert_eq!(run_ok(r#"[0, "", false].has("")"#), Value::Bool(true));
        assert_eq!(run_ok(r#"[0, "", false].has(false)"#), Value::Bool(true));
    }

    #[test]
    fn test_has_any_and_has_all() {
        assert_eq!(run_ok("[1, 2, 3].has_any([9, 2])"), Value::Bool(true));
        assert_eq!(run_ok("[1, 2, 3].has_any([9])"), Value::Bool(false));
        assert_eq!(run_ok("[1, 2, 3].has_any([])"), Value::Bool(false));
        assert_eq!(run_ok("[1, 2, 3].has_all([1, 3])"), Value::Bool(true));
        assert_eq!(run_ok("[1, 2, 3].has_all([1, 9])"), Value::Bool(false));
        assert_eq!(run_ok("[1, 2, 3].has_all([])"), Value::Bool(true));
    }

    #[test]
    fn test_join_first_last_reverse() {
        assert_eq!(run_ok(r#"["a", "b"].join("-")"#), Value::str("a-b"));
        assert_eq!(run_ok("[7, 8].first"), Value::Number(7.0));
        assert_eq!(run_ok("[7, 8].last"), Value::Number(8.0));
        assert_eq!(run_ok("[].first"), Value::Null);
        assert_eq!(
            run_ok("[1, 2].reverse"),
            Value::list(vec![Value::Number(2.0), Value::Number(1.0)])
        );
    }
}
