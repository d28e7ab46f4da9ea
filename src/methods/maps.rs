//! Dict methods
//!
//! `keys`, `values`, and `entries` are reserved: a dict literal may not bind
//! a closure under those names, so these methods always resolve.

use crate::error::RillError;
use crate::value::Value;
use indexmap::IndexMap;
use rill_macros::method;
use std::rc::Rc;

fn receiver<'a>(
    method: &str,
    recv: &'a Value,
) -> Result<&'a Rc<IndexMap<String, Value>>, RillError> {
    match recv {
        Value::Dict(map) => Ok(map),
        other => Err(RillError::receiver_error(method, "dict", other.kind())),
    }
}

#[method(receiver = "dict", name = "str", category = "Dicts")]
/// Compact JSON-like text form, keys in insertion order.
pub fn dict_str(recv: &Value, _args: &[Value]) -> Result<Value, RillError> {
    receiver("str", recv)?;
    recv.render().map(Value::str)
}

#[method(receiver = "dict", name = "len", category = "Dicts")]
/// Number of entries.
pub fn dict_len(recv: &Value, _args: &[Value]) -> Result<Value, RillError> {
    Ok(Value::Number(receiver("len", recv)?.len() as f64))
}

#[method(receiver = "dict", name = "empty", category = "Dicts")]
/// True when the dict has no entries.
pub fn dict_empty(recv: &Value, _args: &[Value]) -> Result<Value, RillError> {
    Ok(Value::Bool(receiver("empty", recv)?.is_empty()))
}

#[method(receiver = "dict", name = "keys", category = "Dicts")]
/// Keys in insertion order.
///
/// # Examples
/// ```rill
/// [b: 1, a: 2].keys => ["b", "a"]
/// ```
pub fn dict_keys(recv: &Value, _args: &[Value]) -> Result<Value, RillError> {
    let map = receiver("keys", recv)?;
    Ok(Value::list(map.keys().map(|k| Value::str(k.clone())).collect()))
}

#[method(receiver = "dict", name = "values", category = "Dicts")]
/// Values in insertion order.
pub fn dict_values(recv: &Value, _args: &[Value]) -> Result<Value, RillError> {
    let map = receiver("values", recv)?;
    Ok(Value::list(map.values().cloned().collect()))
}

#[method(receiver = "dict", name = "entries", category = "Dicts")]
/// `[key, value]` pairs in insertion order.
pub fn dict_entries(recv: &Value, _args: &[Value]) -> Result<Value, RillError> {
    let map = receiver("entries", recv)?;
    Ok(Value::list(
        map.iter()
            .map(|(k, v)| Value::list(vec![Value::str(k.clone()), v.clone()]))
            .collect(),
    ))
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
    fn test_keys_values_entries_preserve_insertion_order() {
        assert_eq!(
            run_ok("[b: 1, a: 2].keys"),
            Value::list(vec![Value::str("b"), Value::str("a")])
        );
        assert_eq!(
            run_ok("[b: 1, a: 2].values"),
            Value::list(vec![Value::Number(1.0), Value::Number(2.0)])
        );
        assert_eq!(
            run_ok("[b: 1].entries"),
            Value::list(vec![Value::list(vec![
                Value::str("b"),
                Value::Number(1.0)
            ])])
        );
    }

    #[test]
    fn test_len_and_empty() {
        assert_eq!(run_ok("[a: 1, b: 2].len"), Value::Number(2.0));
        assert_eq!(run_ok("[:].empty"), Value::Bool(true));
        assert_eq!(run_ok("[:].len"), Value::Number(0.0));
    }

    #[test]
    fn test_reserved_methods_win_over_plain_keys() {
        // A non-closure value may sit under a reserved name, but field
        // access still resolves to the method; dispatch reaches the value.
        assert_eq!(
            run_ok("[keys: 5, a: 1].keys"),
            Value::list(vec![Value::str("keys"), Value::str("a")])
        );
        assert_eq!(run_ok(r#""keys" -> [keys: 5]"#), Value::Number(5.0));
    }

    #[test]
    fn test_str_renders_compact() {
        assert_eq!(run_ok("[a: [1, 2]].str"), Value::str("{\"a\":[1,2]}"));
    }
}
