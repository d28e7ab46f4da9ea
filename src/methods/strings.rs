//! String methods
//!
//! Transformation (`upper`, `lower`, `trim`, `replace`), inspection
//! (`len`, `empty`, `contains`, `starts_with`, `ends_with`), splitting and
//! padding. Lengths and padding operate on characters, not bytes.

use super::str_arg;
use crate::error::RillError;
use crate::value::Value;
use rill_macros::method;

fn receiver<'a>(method: &str, recv: &'a Value) -> Result<&'a str, RillError> {
    match recv {
        Value::Str(s) => Ok(s),
        other => Err(RillError::receiver_error(method, "string", other.kind())),
    }
}

#[method(receiver = "string", name = "str", category = "Strings")]
/// The receiver itself; `.str` is universal across value kinds.
pub fn string_str(recv: &Value, _args: &[Value]) -> Result<Value, RillError> {
    receiver("str", recv).map(Value::str)
}

#[method(receiver = "string", name = "len", category = "Strings")]
/// Number of characters in the string.
///
/// # Examples
/// ```rill
/// "héllo".len => 5
/// ```
pub fn string_len(recv: &Value, _args: &[Value]) -> Result<Value, RillError> {
    let s = receiver("len", recv)?;
    Ok(Value::Number(s.chars().count() as f64))
}

#[method(receiver = "string", name = "empty", category = "Strings")]
/// True when the string has no characters.
pub fn string_empty(recv: &Value, _args: &[Value]) -> Result<Value, RillError> {
    let s = receiver("empty", recv)?;
    Ok(Value::Bool(s.is_empty()))
}

#[method(receiver = "string", name = "upper", category = "Strings")]
/// Uppercase copy of the receiver.
///
/// # Examples
/// ```rill
/// "abc".upper => "ABC"
/// ```
pub fn string_upper(recv: &Value, _args: &[Value]) -> Result<Value, RillError> {
    let s = receiver("upper", recv)?;
    Ok(Value::str(s.to_uppercase()))
}

#[method(receiver = "string", name = "lower", category = "Strings")]
/// Lowercase copy of the receiver.
pub fn string_lower(recv: &Value, _args: &[Value]) -> Result<Value, RillError> {
    let s = receiver("lower", recv)?;
    Ok(Value::str(s.to_lowercase()))
}

#[method(receiver = "string", name = "trim", category = "Strings")]
/// Copy with leading and trailing whitespace removed.
pub fn string_trim(recv: &Value, _args: &[Value]) -> Result<Value, RillError> {
    let s = receiver("trim", recv)?;
    Ok(Value::str(s.trim()))
}

#[method(receiver = "string", name = "replace", arity = 2, category = "Strings")]
/// Replace the first occurrence of a substring.
///
/// # Examples
/// ```rill
/// "a-b-c".replace("-", "+") => "a+b-c"
/// ```
pub fn string_replace(recv: &Value, args: &[Value]) -> Result<Value, RillError> {
    let s = receiver("replace", recv)?;
    let from = str_arg("replace", args, 0)?;
    let to = str_arg("replace", args, 1)?;
    Ok(Value::str(s.replacen(from, to, 1)))
}

#[method(receiver = "string", name = "contains", arity = 1, category = "Strings")]
/// True when the substring occurs in the receiver.
pub fn string_contains(recv: &Value, args: &[Value]) -> Result<Value, RillError> {
    let s = receiver("contains", recv)?;
    let needle = str_arg("contains", args, 0)?;
    Ok(Value::Bool(s.contains(needle)))
}

#[method(receiver = "string", name = "starts_with", arity = 1, category = "Strings")]
/// True when the receiver begins with the prefix.
pub fn string_starts_with(recv: &Value, args: &[Value]) -> Result<Value, RillError> {
    let s = receiver("starts_with", recv)?;
    let prefix = str_arg("starts_with", args, 0)?;
    Ok(Value::Bool(s.starts_with(prefix)))
}

#[method(receiver = "string", name = "ends_with", arity = 1, category = "Strings")]
/// True when the receiver ends with the suffix.
pub fn string_ends_with(recv: &Value, args: &[Value]) -> Result<Value, RillError> {
    let s = receiver("ends_with", recv)?;
    let suffix = str_arg("ends_with", args, 0)?;
    Ok(Value::Bool(s.ends_with(suffix)))
}

#[method(receiver = "string", name = "split", arity = 1, category = "Strings")]
/// Split by a separator into a list of strings. An empty separator splits
/// into characters.
///
/// # Examples
/// ```rill
/// "a,b,c".split(",") => ["a", "b", "c"]
/// ```
pub fn string_split(recv: &Value, args: &[Value]) -> Result<Value, RillError> {
    let s = receiver("split", recv)?;
    let sep = str_arg("split", args, 0)?;
    let parts: Vec<Value> = if sep.is_empty() {
        s.chars().map(|c| Value::str(c.to_string())).collect()
    } else {
        s.split(sep).map(Value::str).collect()
    };
    Ok(Value::list(parts))
}

#[method(receiver = "string", name = "pad_start", arity = 2, category = "Strings")]
/// Pad on the left with a fill string until the target width is reached.
///
/// # Examples
/// ```rill
/// "7".pad_start(3, "0") => "007"
/// ```
pub fn string_pad_start(recv: &Value, args: &[Value]) -> Result<Value, RillError> {
    let s = receiver("pad_start", recv)?;
    let width = super::int_arg("pad_start", args, 0)?;
    let fill = str_arg("pad_start", args, 1)?;
    Ok(Value::str(pad(s, width, fill, true)))
}

#[method(receiver = "string", name = "pad_end", arity = 2, category = "Strings")]
/// Pad on the right with a fill string until the target width is reached.
pub fn string_pad_end(recv: &Value, args: &[Value]) -> Result<Value, RillError> {
    let s = receiver("pad_end", recv)?;
    let width = super::int_arg("pad_end", args, 0)?;
    let fill = str_arg("pad_end", args, 1)?;
    Ok(Value::str(pad(s, width, fill, false)))
}

fn pad(s: &str, width: i64, fill: &str, at_start: bool) -> String {
    let current = s.chars().count() as i64;
    if fill.is_empty() || width <= current {
        return s.to_string();
    }
    let missing = (width - current) as usize;
    let padding: String = fill.chars().cycle().take(missing).collect();
    if at_start {
        format!("{}{}", padding, s)
    } else {
        format!("{}{}", s, padding)
    }
}
