//! Vector methods
//!
//! Embedding vectors are opaque: scripts can inspect the width and model
//! name but never the raw components.

use crate::error::RillError;
use crate::value::{Value, VectorData};
use rill_macros::method;

fn receiver<'a>(method: &str, recv: &'a Value) -> Result<&'a VectorData, RillError> {
    match recv {
        Value::Vector(v) => Ok(v),
        other => Err(RillError::receiver_error(method, "vector", other.kind())),
    }
}

#[method(receiver = "vector", name = "str", category = "Vectors")]
/// Marker text with model and dimension.
pub fn vector_str(recv: &Value, _args: &[Value]) -> Result<Value, RillError> {
    let v = receiver("str", recv)?;
    Ok(Value::str(format!(
        "<vector {} dim={}>",
        v.model,
        v.data.len()
    )))
}

#[method(receiver = "vector", name = "len", category = "Vectors")]
/// Number of components.
pub fn vector_len(recv: &Value, _args: &[Value]) -> Result<Value, RillError> {
    Ok(Value::Number(receiver("len", recv)?.data.len() as f64))
}

#[method(receiver = "vector", name = "model", category = "Vectors")]
/// Name of the embedding model that produced the vector.
pub fn vector_model(recv: &Value, _args: &[Value]) -> Result<Value, RillError> {
    Ok(Value::str(receiver("model", recv)?.model.clone()))
}

#[cfg(test)]
mod tests {
    use crate::context::RuntimeContext;
    use crate::eval::execute;
    use crate::parser::parse;
    use crate::value::{Value, VectorData};
    use std::rc::Rc;

    fn vector() -> Value {
        Value::Vector(Rc::new(VectorData {
            data: vec![0.1, 0.2, 0.3],
            model: "mini".to_string(),
        }))
    }

    fn run_with_vector(source: &str) -> Value {
        let program = parse(source).unwrap();
        let ctx = RuntimeContext::builder().variable("v", vector()).build();
        execute(&program, &ctx)
            .unwrap_or_else(|e| panic!("{}: {}", e.error_id, e.message))
            .value
    }

    #[test]
    fn test_vector_introspection() {
        assert_eq!(run_with_vector("$v.len"), Value::Number(3.0));
        assert_eq!(run_with_vector("$v.model"), Value::str("mini"));
        assert_eq!(run_with_vector("$v.str"), Value::str("<vector mini dim=3>"));
    }

    #[test]
    fn test_vector_type_tag() {
        let program = parse("[v: $v].?v&vector").unwrap();
        let ctx = RuntimeContext::builder().variable("v", vector()).build();
        let result = execute(&program, &ctx).unwrap().value;
        assert_eq!(result, Value::Bool(true));
    }
}
