//! # Built-in Methods Module
//!
//! The method library for rill values, organized by receiver kind. Every
//! method is declared with the `#[method]` attribute, which registers a
//! [`MethodSpec`] through `inventory`; the evaluator resolves calls against
//! the static table built from those specs on first use.
//!
//! ## Modules
//!
//! - **[strings]** - upper, lower, trim, replace, split, pad_start, ...
//! - **[numbers]** - str, abs, floor, ceil, round (plus bool / null str)
//! - **[lists]** - has, has_any, has_all, join, first, last, reverse, ...
//! - **[maps]** - keys, values, entries, len, empty, str
//! - **[vectors]** - str, len, model
//!
//! Arity and receiver mismatches use the fixed message shapes
//! `"<method>() expects N argument(s), got M"` and
//! `"<method>() requires <type> receiver, got <actual>"`.

use crate::error::RillError;
use crate::value::Value;
use std::sync::OnceLock;

pub mod lists;
pub mod maps;
pub mod numbers;
pub mod strings;
pub mod vectors;

/// Method implementation: receiver plus already-arity-checked arguments.
pub type MethodFn = fn(&Value, &[Value]) -> Result<Value, RillError>;

/// One entry of the method table, collected via `inventory` from
/// `#[method]` declarations.
pub struct MethodSpec {
    pub receiver: &'static str,
    pub name: &'static str,
    pub arity: usize,
    pub category: &'static str,
    pub summary: &'static str,
    pub examples: &'static [&'static str],
    pub func: MethodFn,
}

inventory::collect!(MethodSpec);

fn table() -> &'static Vec<&'static MethodSpec> {
    static TABLE: OnceLock<Vec<&'static MethodSpec>> = OnceLock::new();
    TABLE.get_or_init(|| inventory::iter::<MethodSpec>.into_iter().collect())
}

/// Look up a method by `(receiver kind, name)`.
pub fn lookup(receiver: &str, name: &str) -> Option<&'static MethodSpec> {
    table()
        .iter()
        .find(|spec| spec.receiver == receiver && spec.name == name)
        .copied()
}

/// Find a method with this name on any receiver kind, preferring the most
/// common kinds. Used to produce receiver-mismatch messages.
pub fn lookup_any(name: &str) -> Option<&'static MethodSpec> {
    const PREFERENCE: [&str; 6] = ["string", "number", "list", "dict", "bool", "vector"];
    for receiver in PREFERENCE {
        if let Some(spec) = lookup(receiver, name) {
            return Some(spec);
        }
    }
    table().iter().find(|spec| spec.name == name).copied()
}

/// All method specs, sorted for help listings.
pub fn all() -> Vec<&'static MethodSpec> {
    let mut specs: Vec<_> = table().to_vec();
    specs.sort_by_key(|spec| (spec.category, spec.receiver, spec.name));
    specs
}

// ----------------------------------------------------------------------
// Shared argument accessors
// ----------------------------------------------------------------------

pub(crate) fn str_arg<'a>(
    method: &str,
    args: &'a [Value],
    index: usize,
) -> Result<&'a str, RillError> {
    match &args[index] {
        Value::Str(s) => Ok(s),
        other => Err(RillError::type_error(format!(
            "{}() argument {} must be a string, got {}",
            method,
            index + 1,
            other.kind()
        ))),
    }
}

pub(crate) fn list_arg<'a>(
    method: &str,
    args: &'a [Value],
    index: usize,
) -> Result<&'a [Value], RillError> {
    match &args[index] {
        Value::List(items) => Ok(items),
        other => Err(RillError::type_error(format!(
            "{}() argument {} must be a list, got {}",
            method,
            index + 1,
            other.kind()
        ))),
    }
}

pub(crate) fn int_arg(method: &str, args: &[Value], index: usize) -> Result<i64, RillError> {
    args[index].as_int().ok_or_else(|| {
        RillError::type_error(format!(
            "{}() argument {} must be an integer, got {}",
            method,
            index + 1,
            args[index].kind()
        ))
    })
}

#[cfg(test)]
mod tests {
    use crate::context::RuntimeContext;
    use crate::error::RillError;
    use crate::eval::execute;
    use crate::parser::parse;
    use crate::value::Value;

    fn run(source: &str) -> Result<Value, RillError> {
        let program = parse(source)?;
        let ctx = RuntimeContext::builder().build();
        execute(&program, &ctx).map(|r| r.value)
    }

    fn run_ok(source: &str) -> Value {
        run(source).unwrap_or_else(|e| panic!("{}: {}", e.error_id, e.message))
    }

    #[test]
    fn test_table_is_populated() {
        assert!(super::lookup("string", "upper").is_some());
        assert!(super::lookup("list", "has").is_some());
        assert!(super::lookup("dict", "keys").is_some());
        assert!(super::lookup("string", "nope").is_none());
    }

    #[test]
    fn test_receiver_mismatch_message() {
        let err = run("5 -> { $.upper }").unwrap_err();
        assert_eq!(err.error_id, "RILL-R002");
        assert_eq!(err.message, "upper() requires string receiver, got number");
    }

    #[test]
    fn test_unknown_method_message() {
        let err = run("5 -> { $.frobnicate }").unwrap_err();
        assert_eq!(err.error_id, "RILL-R002");
        assert!(err.message.contains("unknown method 'frobnicate'"));
    }

    #[test]
    fn test_method_chain_zero_arg_calls() {
        assert_eq!(run_ok(r#""  ab  ".trim.upper.len"#), Value::Number(2.0));
    }

    // Arity mismatches share one message shape; stamp a test per method.
    macro_rules! arity_tests {
        ($($name:ident: $src:expr => $msg:expr;)*) => {
            paste::paste! {
                $(
                    #[test]
                    fn [<test_arity_ $name>]() {
                        let err = run($src).unwrap_err();
                        assert_eq!(err.error_id, "RILL-R002");
                        assert_eq!(err.message, $msg);
                    }
                )*
            }
        };
    }

    arity_tests! {
        upper: r#""a".upper("x")"# => "upper() expects 0 argument(s), got 1";
        replace: r#""a".replace("x")"# => "replace() expects 2 argument(s), got 1";
        contains: r#""a".contains"# => "contains() expects 1 argument(s), got 0";
        pad_start: r#""a".pad_start(3)"# => "pad_start() expects 2 argument(s), got 1";
        has: "[1].has(1, 2)" => "has() expects 1 argument(s), got 2";
        join: "[1].join" => "join() expects 1 argument(s), got 0";
    }
}
