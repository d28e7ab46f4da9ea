// ABOUTME: Runtime value types: the tagged union flowing through rill programs

use crate::ast::{ClosureStyle, Expr, ParamSpec};
use crate::config::MAX_RENDER_DEPTH;
use crate::context::{AppFn, HostFn, HostParam};
use crate::env::Scope;
use crate::error::RillError;
use indexmap::IndexMap;
use std::fmt;
use std::rc::Rc;

/// The value union of the language. Composite values are reference-counted
/// and never mutated in place: literal evaluation and the collection
/// operators always produce fresh containers.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    List(Rc<Vec<Value>>),
    Dict(Rc<IndexMap<String, Value>>),
    Closure(Rc<Closure>),
    Vector(Rc<VectorData>),
}

/// Fixed-width embedding vector emitted by host functions. Opaque to the
/// language apart from `.len` / `.model`.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorData {
    pub data: Vec<f32>,
    pub model: String,
}

/// Script closure: parameters, AST body, and a pointer to the captured scope
/// chain. Capture is by reference, so variable lookups at invocation time
/// observe later re-assignments (late binding).
#[derive(Debug, Clone)]
pub struct ScriptClosure {
    pub params: Vec<ParamSpec>,
    pub body: Rc<Vec<Expr>>,
    pub env: Rc<Scope>,
    pub style: ClosureStyle,
    pub property_style: bool,
}

/// Host-registered function callable from scripts.
#[derive(Clone)]
pub struct RuntimeClosure {
    pub name: String,
    pub params: Vec<HostParam>,
    pub func: HostFn,
}

/// Extension callable that additionally receives the pipe value.
#[derive(Clone)]
pub struct ApplicationClosure {
    pub name: String,
    pub func: AppFn,
}

/// The three callable kinds behind a single `Value::Closure` variant.
/// Callables are immutable once created.
pub enum Closure {
    Script(ScriptClosure),
    Runtime(RuntimeClosure),
    Application(ApplicationClosure),
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Closure::Script(sc) => f
                .debug_struct("Script")
                .field("params", &sc.params.len())
                .field("style", &sc.style)
                .finish(),
            Closure::Runtime(rc) => f.debug_struct("Runtime").field("name", &rc.name).finish(),
            Closure::Application(ac) => {
                f.debug_struct("Application").field("name", &ac.name).finish()
            }
        }
    }
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(items))
    }

    pub fn dict(map: IndexMap<String, Value>) -> Self {
        Value::Dict(Rc::new(map))
    }

    /// Type tag used in error messages and `.?k&type` checks.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Closure(_) => "closure",
            Value::Vector(_) => "vector",
        }
    }

    /// Truthiness: `false`, `null`, `0`, `NaN`, and `""` are falsy, every
    /// other value is truthy (containers are always truthy).
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Integral numbers projected to i64, used for list indexing.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Number(n) if n.fract() == 0.0 && n.is_finite() => Some(*n as i64),
            _ => None,
        }
    }

    /// Text form used by interpolation and `.str`. Strings render bare;
    /// composite values render in their compact JSON-like shape.
    pub fn render(&self) -> Result<String, RillError> {
        match self {
            Value::Str(s) => Ok(s.clone()),
            other => {
                let mut buf = String::new();
                render_into(&mut buf, other, 0)?;
                Ok(buf)
            }
        }
    }
}

/// Whole numbers display without a decimal point; everything else uses the
/// shortest round-trip form.
pub fn fmt_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 9e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn write_json_string(buf: &mut String, s: &str) {
    buf.push('"');
    for c in s.chars() {
        match c {
            '"' => buf.push_str("\\\""),
            '\\' => buf.push_str("\\\\"),
            '\n' => buf.push_str("\\n"),
            '\t' => buf.push_str("\\t"),
            '\r' => buf.push_str("\\r"),
            c if (c as u32) < 0x20 => buf.push_str(&format!("\\u{:04x}", c as u32)),
            c => buf.push(c),
        }
    }
    buf.push('"');
}

/// Compact JSON-like rendering: no whitespace, dict keys in insertion
/// order. The depth cap guards against pathological structures injected by
/// host functions.
fn render_into(buf: &mut String, value: &Value, depth: usize) -> Result<(), RillError> {
    if depth > MAX_RENDER_DEPTH {
        return Err(RillError::type_error("value nesting too deep to render"));
    }
    match value {
        Value::Null => buf.push_str("null"),
        Value::Bool(b) => buf.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => buf.push_str(&fmt_number(*n)),
        Value::Str(s) => write_json_string(buf, s),
        Value::List(items) => {
            buf.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                render_into(buf, item, depth + 1)?;
            }
            buf.push(']');
        }
        Value::Dict(map) => {
            buf.push('{');
            for (i, (key, val)) in map.iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                write_json_string(buf, key);
                buf.push(':');
                render_into(buf, val, depth + 1)?;
            }
            buf.push('}');
        }
        Value::Closure(_) => buf.push_str("\"<closure>\""),
        Value::Vector(v) => {
            buf.push_str(&format!("\"<vector {} dim={}>\"", v.model, v.data.len()));
        }
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::Closure(_) => write!(f, "<closure>"),
            Value::Vector(v) => write!(f, "<vector {} dim={}>", v.model, v.data.len()),
            other => {
                let mut buf = String::new();
                render_into(&mut buf, other, 0).map_err(|_| fmt::Error)?;
                write!(f, "{}", buf)
            }
        }
    }
}

/// Deep equality with strict type equality: `1` never equals `"1"` or
/// `true`. Dicts compare by key set and per-key values, independent of
/// insertion order. Closures compare by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.get(k).map(|w| w == v).unwrap_or(false))
            }
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Vector(a), Value::Vector(b)) => a == b,
            _ => false,
        }
    }
}

impl serde::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::{SerializeMap, SerializeSeq};
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Str(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Dict(map) => {
                let mut ser = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map.iter() {
                    ser.serialize_entry(k, v)?;
                }
                ser.end()
            }
            Value::Closure(_) => serializer.serialize_str("<closure>"),
            Value::Vector(v) => {
                let mut ser = serializer.serialize_map(Some(3))?;
                ser.serialize_entry("__rill_vector", &true)?;
                ser.serialize_entry("data", &v.data)?;
                ser.serialize_entry("model", &v.model)?;
                ser.end()
            }
        }
    }
}

/// Project a value across the host boundary as JSON. Closures do not
/// project.
pub fn to_json(value: &Value) -> Result<serde_json::Value, RillError> {
    Ok(match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Str(s) => serde_json::Value::String(s.clone()),
        Value::List(items) => serde_json::Value::Array(
            items.iter().map(to_json).collect::<Result<Vec<_>, _>>()?,
        ),
        Value::Dict(map) => {
            let mut obj = serde_json::Map::new();
            for (k, v) in map.iter() {
                obj.insert(k.clone(), to_json(v)?);
            }
            serde_json::Value::Object(obj)
        }
        Value::Closure(_) => {
            return Err(RillError::type_error(
                "closure values cannot cross the host boundary",
            ));
        }
        Value::Vector(v) => {
            let mut obj = serde_json::Map::new();
            obj.insert("__rill_vector".into(), serde_json::Value::Bool(true));
            obj.insert(
                "data".into(),
                serde_json::Value::Array(
                    v.data
                        .iter()
                        .map(|f| {
                            serde_json::Number::from_f64(*f as f64)
                                .map(serde_json::Value::Number)
                                .unwrap_or(serde_json::Value::Null)
                        })
                        .collect(),
                ),
            );
            obj.insert("model".into(), serde_json::Value::String(v.model.clone()));
            serde_json::Value::Object(obj)
        }
    })
}

/// Reconstruct a value from host JSON. Objects carrying the
/// `__rill_vector` marker become vectors; other objects become dicts in
/// field order.
pub fn from_json(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::Str(s.clone()),
        serde_json::Value::Array(items) => Value::list(items.iter().map(from_json).collect()),
        serde_json::Value::Object(obj) => {
            if obj.get("__rill_vector").and_then(|v| v.as_bool()) == Some(true) {
                let data = obj
                    .get("data")
                    .and_then(|v| v.as_array())
                    .map(|arr| {
                        arr.iter()
                            .filter_map(|x| x.as_f64())
                            .map(|x| x as f32)
                            .collect()
                    })
                    .unwrap_or_default();
                let model = obj
                    .get("model")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                return Value::Vector(Rc::new(VectorData { data, model }));
            }
            let mut map = IndexMap::new();
            for (k, v) in obj.iter() {
                map.insert(k.clone(), from_json(v));
            }
            Value::dict(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_display() {
        let whole = Value::Number(42.0);
        assert_eq!(format!("{}", whole), "42");

        let decimal = Value::Number(-2.5);
        assert_eq!(format!("{}", decimal), "-2.5");

        let zero = Value::Number(0.0);
        assert_eq!(format!("{}", zero), "0");
    }

    #[test]
    fn test_bool_and_null_display() {
        assert_eq!(format!("{}", Value::Bool(true)), "true");
        assert_eq!(format!("{}", Value::Bool(false)), "false");
        assert_eq!(format!("{}", Value::Null), "null");
    }

    #[test]
    fn test_list_display_is_compact_json() {
        let list = Value::list(vec![
            Value::Number(1.0),
            Value::str("a"),
            Value::list(vec![Value::Bool(true)]),
        ]);
        assert_eq!(format!("{}", list), "[1,\"a\",[true]]");
    }

    #[test]
    fn test_dict_display_preserves_insertion_order() {
        let mut map = IndexMap::new();
        map.insert("z".to_string(), Value::Number(1.0));
        map.insert("a".to_string(), Value::Number(2.0));
        let dict = Value::dict(map);
        assert_eq!(format!("{}", dict), "{\"z\":1,\"a\":2}");
    }

    #[test]
    fn test_render_string_is_bare() {
        assert_eq!(Value::str("hi").render().unwrap(), "hi");
        assert_eq!(Value::Number(3.0).render().unwrap(), "3");
        assert_eq!(
            Value::list(vec![Value::str("hi")]).render().unwrap(),
            "[\"hi\"]"
        );
    }

    #[test]
    fn test_strict_type_equality() {
        assert_ne!(Value::Number(1.0), Value::str("1"));
        assert_ne!(Value::Number(1.0), Value::Bool(true));
        assert_ne!(Value::Number(0.0), Value::Bool(false));
        assert_eq!(Value::Number(1.0), Value::Number(1.0));
    }

    #[test]
    fn test_deep_list_equality() {
        let a = Value::list(vec![Value::Number(1.0), Value::list(vec![Value::str("x")])]);
        let b = Value::list(vec![Value::Number(1.0), Value::list(vec![Value::str("x")])]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_dict_equality_ignores_order() {
        let mut m1 = IndexMap::new();
        m1.insert("a".to_string(), Value::Number(1.0));
        m1.insert("b".to_string(), Value::Number(2.0));
        let mut m2 = IndexMap::new();
        m2.insert("b".to_string(), Value::Number(2.0));
        m2.insert("a".to_string(), Value::Number(1.0));
        assert_eq!(Value::dict(m1), Value::dict(m2));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::str("").is_truthy());
        assert!(Value::str("x").is_truthy());
        assert!(Value::list(vec![]).is_truthy());
        assert!(Value::dict(IndexMap::new()).is_truthy());
    }

    #[test]
    fn test_json_round_trip_preserves_key_order() {
        let mut map = IndexMap::new();
        map.insert("later".to_string(), Value::Number(1.0));
        map.insert("earlier".to_string(), Value::Number(2.0));
        let json = to_json(&Value::dict(map)).unwrap();
        match from_json(&json) {
            Value::Dict(round) => {
                let keys: Vec<_> = round.keys().cloned().collect();
                assert_eq!(keys, vec!["later".to_string(), "earlier".to_string()]);
            }
            other => panic!("expected dict, got {:?}", other),
        }
    }

    #[test]
    fn test_vector_projection() {
        let vec_value = Value::Vector(Rc::new(VectorData {
            data: vec![0.5, -0.5],
            model: "mini".to_string(),
        }));
        let json = to_json(&vec_value).unwrap();
        assert_eq!(json["__rill_vector"], serde_json::Value::Bool(true));
        assert_eq!(json["model"], serde_json::Value::String("mini".into()));
        match from_json(&json) {
            Value::Vector(v) => assert_eq!(v.data, vec![0.5, -0.5]),
            other => panic!("expected vector, got {:?}", other),
        }
    }
}
