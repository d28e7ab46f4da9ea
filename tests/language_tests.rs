// ABOUTME: End-to-end language scenarios and cross-cutting invariants

use rill::{execute, parse, RillError, RuntimeContext, Value};

fn run(source: &str) -> Result<Value, RillError> {
    let program = parse(source)?;
    let ctx = RuntimeContext::builder().build();
    execute(&program, &ctx).map(|r| r.value)
}

fn run_ok(source: &str) -> Value {
    run(source).unwrap_or_else(|e| panic!("{}: {}", e.error_id, e.message))
}

fn numbers(values: &[f64]) -> Value {
    Value::list(values.iter().map(|n| Value::Number(*n)).collect())
}

// ========================================================================
// End-to-end scenarios
// ========================================================================

#[test]
fn test_map_then_fold_pipeline() {
    let result = run_ok("[1,2,3] -> map { $ * 2 } -> fold(0) { $@ + $ }");
    assert_eq!(result, Value::Number(12.0));
}

#[test]
fn test_hierarchical_path_into_nested_dict() {
    let result = run_ok(r#"["users", 0, "name"] -> [users: [[name: "Alice"]]]"#);
    assert_eq!(result, Value::str("Alice"));
}

#[test]
fn test_late_bound_closure_capture() {
    let result = run_ok("5 :> $x\n{ $ + $x } :> $add\n20 :> $x\n5 -> $add");
    assert_eq!(result, Value::Number(25.0));
}

#[test]
fn test_script_raised_error() {
    let err = run(r#"error "boom""#).unwrap_err();
    assert_eq!(err.error_id, "RILL-R016");
    assert!(err.message.contains("boom"));
}

#[test]
fn test_each_with_break_returns_partial_results() {
    let result = run_ok("[1, 2, 3] -> each { ($ == 3) ? break \n $ * 2 }");
    assert_eq!(result, numbers(&[2.0, 4.0]));
}

#[test]
fn test_variable_key_dict_and_existence() {
    let result = run_ok("\"done\" :> $k\n[static: 0, $k: 1] :> $d\n$d.?$k");
    assert_eq!(result, Value::Bool(true));
}

// ========================================================================
// Identity invariants
// ========================================================================

#[test]
fn test_identity_pipes_for_all_value_shapes() {
    for literal in [
        "5",
        "2.5",
        "true",
        "null",
        r#""text""#,
        "[1, 2, [3]]",
        "[a: 1, b: [c: 2]]",
    ] {
        let direct = run_ok(literal);
        assert_eq!(run_ok(&format!("{} -> {{ pass }}", literal)), direct);
        assert_eq!(run_ok(&format!("{} -> {{ $ }}", literal)), direct);
        assert_eq!(run_ok(&format!("{} -> ({{ $ }})", literal)), direct);
        assert_eq!(run_ok(&format!("{} -> |x| $x", literal)), direct);
    }
}

#[test]
fn test_map_preserves_length_and_order() {
    let result = run_ok("[3, 1, 2] -> map { $ * 10 }");
    assert_eq!(result, numbers(&[30.0, 10.0, 20.0]));
    assert_eq!(run_ok("[] -> map { $ }"), numbers(&[]));
}

#[test]
fn test_fold_equals_last_element_of_seeded_each() {
    for (list, seed) in [("[1, 2, 3]", "0"), ("[5]", "100"), ("[2, 2]", "1")] {
        let fold = run_ok(&format!("{} -> fold({}) {{ $@ + $ }}", list, seed));
        let each_last = run_ok(&format!("{} -> each({}) {{ $@ + $ }} -> {{ $[-1] }}", list, seed));
        assert_eq!(fold, each_last);
    }
}

#[test]
fn test_dispatch_equals_field_access() {
    for key in ["a", "b", "c"] {
        let dispatch = run_ok(&format!(
            r#"[a: 1, b: "x", c: [2]] :> $d
"{}" -> $d"#,
            key
        ));
        let field = run_ok(&format!("[a: 1, b: \"x\", c: [2]] :> $d\n$d.{}", key));
        assert_eq!(dispatch, field);
    }
}

#[test]
fn test_coalesce_only_recovers_lookups_and_null() {
    assert_eq!(run_ok("[a: 1] -> { $.a ?? 99 }"), Value::Number(1.0));
    assert_eq!(run_ok("[a: 1] -> { $.missing ?? 99 }"), Value::Number(99.0));
    assert_eq!(run_ok("[1] -> { $[9] ?? 99 }"), Value::Number(99.0));
    assert_eq!(run_ok("[n: null] -> { $.n ?? 99 }"), Value::Number(99.0));
    assert_eq!(run_ok("false ?? 99"), Value::Bool(false));
    assert_eq!(run_ok("0 ?? 99"), Value::Number(0.0));
    assert_eq!(run_ok(r#""" ?? 99"#), Value::str(""));

    // Undefined variables and script errors are not lookups
    assert_eq!(run("$nope ?? 1").unwrap_err().error_id, "RILL-R005");
    assert_eq!(
        run(r#"(error "x") ?? 1"#).unwrap_err().error_id,
        "RILL-R016"
    );
}

#[test]
fn test_typed_existence_equivalence() {
    // dict.?k&T == dict.?k && typeOf(dict.k) == T
    let cases = [
        ("[a: 1]", "a", "number", true),
        ("[a: 1]", "a", "string", false),
        ("[a: \"s\"]", "a", "string", true),
        ("[a: [1]]", "a", "list", true),
        ("[a: [b: 1]]", "a", "dict", true),
        ("[a: null]", "a", "null", true),
        ("[a: 1]", "b", "number", false),
    ];
    for (dict, key, tag, expected) in cases {
        let result = run_ok(&format!("{}.?{}&{}", dict, key, tag));
        assert_eq!(result, Value::Bool(expected), "{}.?{}&{}", dict, key, tag);
    }
}

#[test]
fn test_deep_equality_is_strictly_typed() {
    assert_eq!(run_ok(r#"1 == 1"#), Value::Bool(true));
    assert_eq!(run_ok(r#"1 == "1""#), Value::Bool(false));
    assert_eq!(run_ok(r#"1 == true"#), Value::Bool(false));
    assert_eq!(run_ok(r#"[1, [2]] == [1, [2]]"#), Value::Bool(true));
    assert_eq!(run_ok(r#"[a: [b: 1]] == [a: [b: 1]]"#), Value::Bool(true));
    assert_eq!(run_ok(r#"[a: 1] == [a: "1"]"#), Value::Bool(false));
}

#[test]
fn test_repeated_execution_is_deterministic() {
    let source = "[3, 1, 2] -> map { $ * 2 } -> filter { $ > 2 } -> fold(0) { $@ + $ }";
    let program = parse(source).unwrap();
    let first = execute(&program, &RuntimeContext::builder().build())
        .unwrap()
        .value;
    let second = execute(&program, &RuntimeContext::builder().build())
        .unwrap()
        .value;
    assert_eq!(first, second);
}

// ========================================================================
// Boundary cases
// ========================================================================

#[test]
fn test_empty_container_boundaries() {
    assert_eq!(run_ok("[] -> each { $ }"), numbers(&[]));
    assert_eq!(run_ok("[] -> filter { true }"), numbers(&[]));
    assert_eq!(run_ok("[] -> fold(7) { $@ + $ }"), Value::Number(7.0));
    assert_eq!(run_ok("[:] -> each { $ }"), numbers(&[]));
    assert_eq!(run_ok(r#""" -> each { $ }"#), numbers(&[]));
    assert_eq!(run_ok("[].len"), Value::Number(0.0));
    assert_eq!(run_ok("[:].keys"), numbers(&[]));
}

#[test]
fn test_statement_sequence_and_shadowing() {
    let result = run_ok("1 :> $a\n2 :> $a\n$a");
    assert_eq!(result, Value::Number(2.0));
}

#[test]
fn test_triple_quoted_string_program() {
    let result = run_ok("\"\"\"line one\nline two\"\"\" -> { $.len }");
    assert_eq!(result, Value::Number(17.0));
}

#[test]
fn test_interpolation_of_composites() {
    let result = run_ok(r#"[name: "Ada", tags: [1, 2]] :> $u
"user {$u.name} {$u.tags}""#);
    assert_eq!(result, Value::str("user Ada [1,2]"));
}

#[test]
fn test_pipeline_with_methods_and_operators() {
    let result = run_ok(
        r#"" alpha,beta , gamma " -> { $.trim } -> { $.split(",") } -> map .trim -> filter { $.len > 4 } -> { $.join("+") }"#,
    );
    assert_eq!(result, Value::str("alpha+gamma"));
}

#[test]
fn test_loop_and_collection_composition() {
    // Sum powers of two below 100 that a while loop produced
    let result = run_ok("1 -> ($ < 100) @ { $ * 2 } -> { $ }");
    assert_eq!(result, Value::Number(128.0));
}

#[test]
fn test_closures_as_dict_dispatch_table() {
    let source = r#"
[
  double: { $.len * 2 },
  shout: { $.upper }
] :> $handlers
"shout" -> $handlers
"#;
    // Block closure invoked with the key itself bound to $
    assert_eq!(run_ok(source), Value::str("SHOUT"));
}
