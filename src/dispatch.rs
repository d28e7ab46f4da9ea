// ABOUTME: Unified dispatch: call, dict lookup, list index, hierarchical path navigation

use crate::ast::SourceLocation;
use crate::error::RillError;
use crate::eval::{Flow, Interp, Invocation};
use crate::value::{Closure, Value};
use crate::ast::ClosureStyle;

impl Interp<'_> {
    /// Resolve `v -> r` after both sides are evaluated: invoke callables,
    /// look up string keys in dicts, index lists with numbers, navigate
    /// list paths, and hand every other value through unchanged.
    pub(crate) fn dispatch(
        &self,
        v: &Value,
        target: &Value,
        loc: SourceLocation,
    ) -> Flow<Value> {
        match target {
            Value::Closure(_) => self.call_value(target, Invocation::Piped(v), loc),
            Value::Dict(_) => match v {
                Value::Str(_) => self.scalar_dispatch(v, target, loc),
                Value::List(keys) => self.hierarchical(keys, target, loc),
                other => Err(RillError::type_error(format!(
                    "cannot use {} key with dict value",
                    other.kind()
                ))
                .with_location(loc)
                .into()),
            },
            Value::List(_) => match v {
                Value::Number(_) => self.scalar_dispatch(v, target, loc),
                Value::List(keys) => self.hierarchical(keys, target, loc),
                other => Err(RillError::type_error(format!(
                    "cannot use {} key with list value",
                    other.kind()
                ))
                .with_location(loc)
                .into()),
            },
            other => Ok(other.clone()),
        }
    }

    /// Scalar dispatch of one key against a dict or list. Property-style
    /// closures auto-invoke; block closures are invoked with the key bound
    /// to `$`; every other resolved value is returned as-is.
    fn scalar_dispatch(&self, key: &Value, container: &Value, loc: SourceLocation) -> Flow<Value> {
        let resolved = self.raw_lookup(key, container, loc, &[])?;
        if let Value::Closure(c) = &resolved {
            if let Closure::Script(sc) = &**c {
                if sc.params.is_empty() {
                    if sc.property_style {
                        return self.call_value(&resolved, Invocation::Args(&[]), loc);
                    }
                    if sc.style == ClosureStyle::Block {
                        return self.call_value(&resolved, Invocation::Piped(key), loc);
                    }
                }
            }
        }
        Ok(resolved)
    }

    /// Hierarchical list-path dispatch: consume keys left to right,
    /// auto-invoking zero-parameter closures at intermediate steps. A
    /// single-element path is exactly scalar dispatch.
    pub(crate) fn hierarchical(
        &self,
        keys: &[Value],
        target: &Value,
        loc: SourceLocation,
    ) -> Flow<Value> {
        match keys.len() {
            0 => return Ok(target.clone()),
            1 => return self.scalar_dispatch(&keys[0], target, loc),
            _ => {}
        }

        let mut current = target.clone();
        let mut consumed: Vec<Value> = Vec::new();
        let last = keys.len() - 1;
        for (i, key) in keys.iter().enumerate() {
            let resolved = self.raw_lookup(key, &current, loc, &consumed)?;
            consumed.push(key.clone());

            if i < last {
                current = match &resolved {
                    Value::Closure(c) => match &**c {
                        Closure::Script(sc) if sc.params.is_empty() => {
                            self.call_value(&resolved, Invocation::Args(&[]), loc)?
                        }
                        Closure::Script(_) => {
                            return Err(self
                                .path_error(
                                    "cannot navigate through a parameterized closure",
                                    &consumed,
                                )
                                .with_location(loc)
                                .into());
                        }
                        Closure::Runtime(rc) if rc.params.is_empty() => {
                            self.call_value(&resolved, Invocation::Args(&[]), loc)?
                        }
                        _ => {
                            return Err(self
                                .path_error(
                                    "cannot navigate through a host callable",
                                    &consumed,
                                )
                                .with_location(loc)
                                .into());
                        }
                    },
                    other => other.clone(),
                };
            } else {
                // Terminal step: block closures receive the final key as `$`
                if let Value::Closure(c) = &resolved {
                    match &**c {
                        Closure::Script(sc) if sc.params.is_empty() => {
                            if sc.property_style {
                                return self.call_value(&resolved, Invocation::Args(&[]), loc);
                            }
                            if sc.style == ClosureStyle::Block {
                                return self.call_value(&resolved, Invocation::Piped(key), loc);
                            }
                            return Ok(resolved);
                        }
                        Closure::Script(_) => {
                            return Err(self
                                .path_error(
                                    "parameterized closure cannot terminate a path",
                                    &consumed,
                                )
                                .with_location(loc)
                                .into());
                        }
                        _ => return Ok(resolved),
                    }
                }
                return Ok(resolved);
            }
        }
        unreachable!("path navigation always returns at the terminal step")
    }

    /// One lookup step without any closure handling. Missing keys and
    /// out-of-bounds indexes raise the recoverable lookup errors.
    fn raw_lookup(
        &self,
        key: &Value,
        container: &Value,
        loc: SourceLocation,
        path: &[Value],
    ) -> Flow<Value> {
        match (container, key) {
            (Value::Dict(map), Value::Str(k)) => match map.get(k) {
                Some(value) => Ok(value.clone()),
                None => {
                    let mut err = RillError::property_not_found(k);
                    if !path.is_empty() {
                        err = err.with_context("path", Value::list(path.to_vec()));
                    }
                    Err(err.with_location(loc).into())
                }
            },
            (Value::List(items), Value::Number(_)) => {
                let Some(idx) = key.as_int() else {
                    return Err(RillError::type_error("list index must be an integer")
                        .with_location(loc)
                        .into());
                };
                let len = items.len() as i64;
                let resolved = if idx < 0 { idx + len } else { idx };
                if resolved < 0 || resolved >= len {
                    let mut err = RillError::index_out_of_bounds(idx, items.len());
                    if !path.is_empty() {
                        err = err.with_context("path", Value::list(path.to_vec()));
                    }
                    return Err(err.with_location(loc).into());
                }
                Ok(items[resolved as usize].clone())
            }
            (Value::Dict(_), other) => Err(RillError::type_error(format!(
                "cannot use {} key with dict value",
                other.kind()
            ))
            .with_location(loc)
            .into()),
            (Value::List(_), other) => Err(RillError::type_error(format!(
                "cannot use {} key with list value",
                other.kind()
            ))
            .with_location(loc)
            .into()),
            (other, _) => Err(self
                .path_error(
                    format!("cannot navigate into {} value", other.kind()),
                    path,
                )
                .with_location(loc)
                .into()),
        }
    }

    fn path_error(&self, message: impl Into<String>, path: &[Value]) -> RillError {
        let mut err = RillError::type_error(message);
        if !path.is_empty() {
            err = err.with_context("path", Value::list(path.to_vec()));
        }
        err
    }
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
    fn test_scalar_dict_dispatch() {
        assert_eq!(run_ok(r#""b" -> [a: 1, b: 2]"#), Value::Number(2.0));
    }

    #[test]
    fn test_scalar_dispatch_missing_key() {
        let err = run(r#""c" -> [a: 1]"#).unwrap_err();
        assert_eq!(err.error_id, "RILL-R006");
        // ...but `??` recovers it
        assert_eq!(run_ok(r#"("c" -> [a: 1]) ?? 9"#), Value::Number(9.0));
    }

    #[test]
    fn test_dispatch_equals_field_access() {
        assert_eq!(run_ok(r#"[k: 5] :> $d
"k" -> $d"#), run_ok("[k: 5] :> $d\n$d.k"));
    }

    #[test]
    fn test_list_index_dispatch() {
        assert_eq!(run_ok("1 -> [10, 20, 30]"), Value::Number(20.0));
        assert_eq!(run_ok("-1 -> [10, 20, 30]"), Value::Number(30.0));
        let err = run("9 -> [10]").unwrap_err();
        assert_eq!(err.error_id, "RILL-R007");
    }

    #[test]
    fn test_dispatch_type_mismatches() {
        let err = run(r#""a" -> [1, 2]"#).unwrap_err();
        assert_eq!(err.error_id, "RILL-R002");
        assert_eq!(err.message, "cannot use string key with list value");

        let err = run("1 -> [a: 1]").unwrap_err();
        assert_eq!(err.error_id, "RILL-R002");
        assert_eq!(err.message, "cannot use number key with dict value");

        let err = run("true -> [a: 1]").unwrap_err();
        assert_eq!(err.message, "cannot use bool key with dict value");
    }

    #[test]
    fn test_plain_value_rhs_passes_through() {
        assert_eq!(run_ok("5 -> 10"), Value::Number(10.0));
        assert_eq!(run_ok("5 -> ($ + 1)"), Value::Number(6.0));
    }

    #[test]
    fn test_hierarchical_navigation() {
        let result = run_ok(r#"["users", 0, "name"] -> [users: [[name: "Alice"]]]"#);
        assert_eq!(result, Value::str("Alice"));
    }

    #[test]
    fn test_empty_path_returns_target() {
        let result = run_ok("[] -> [a: 1]");
        match result {
            Value::Dict(map) => assert_eq!(map.len(), 1),
            other => panic!("expected dict, got {:?}", other),
        }
    }

    #[test]
    fn test_single_element_path_is_scalar_dispatch() {
        assert_eq!(run_ok(r#"["a"] -> [a: 7]"#), Value::Number(7.0));
        assert_eq!(run_ok("[1] -> [10, 20]"), Value::Number(20.0));
    }

    #[test]
    fn test_missing_intermediate_key_carries_path() {
        let err = run(r#"["a", "b"] -> [x: [b: 1]]"#).unwrap_err();
        assert_eq!(err.error_id, "RILL-R006");
        let err = run(r#"["a", "missing"] -> [a: [b: 1]]"#).unwrap_err();
        assert_eq!(err.error_id, "RILL-R006");
        let context = err.context.expect("path context");
        assert_eq!(
            context.get("path"),
            Some(&Value::list(vec![Value::str("a")]))
        );
    }

    #[test]
    fn test_intermediate_zero_param_closure_auto_invokes() {
        let result = run_ok(r#"[inner: ||( [x: 42] )] :> $d
["inner", "x"] -> $d"#);
        assert_eq!(result, Value::Number(42.0));
    }

    #[test]
    fn test_intermediate_parameterized_closure_is_error() {
        let err = run(r#"[inner: |a| $a] :> $d
["inner", "x"] -> $d"#)
        .unwrap_err();
        assert_eq!(err.error_id, "RILL-R002");
    }

    #[test]
    fn test_terminal_block_closure_receives_key() {
        let result = run_ok(r#"[section: [label: { $ }]] :> $d
["section", "label"] -> $d"#);
        assert_eq!(result, Value::str("label"));
    }

    #[test]
    fn test_terminal_parameterized_closure_is_error() {
        let err = run(r#"[section: [label: |a, b| $a]] :> $d
["section", "label"] -> $d"#)
        .unwrap_err();
        assert_eq!(err.error_id, "RILL-R002");
    }

    #[test]
    fn test_block_closure_dict_value_sees_key() {
        // Scalar dispatch into a block closure binds the original key to $
        assert_eq!(
            run_ok(r#""name" -> [name: { $ + "!" }]"#),
            Value::str("name!")
        );
    }

    #[test]
    fn test_property_style_value_auto_invokes_on_dispatch() {
        assert_eq!(run_ok(r#""k" -> [k: ||( 3 )]"#), Value::Number(3.0));
    }

    #[test]
    fn test_closure_rhs_is_invoked_with_pipe_value() {
        assert_eq!(run_ok("4 -> |n| $n * $n"), Value::Number(16.0));
        assert_eq!(run_ok("4 -> { $ * 2 } -> |n| $n + 1"), Value::Number(9.0));
    }

    #[test]
    fn test_errors_inside_invoked_closures_propagate() {
        let err = run(r#"[boom: ||{ error "inner" }] :> $d
["boom", "x"] -> $d"#)
        .unwrap_err();
        assert_eq!(err.error_id, "RILL-R016");
        assert!(err.message.contains("inner"));
    }
}
