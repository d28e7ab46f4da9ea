// ABOUTME: Evaluator core walking the AST against a runtime context

use crate::ast::{
    AssignOp, BinOp, DictKey, ExistsKey, Expr, ExprKind, PipeRhs, Program, SourceLocation, StrPart,
    UnOp,
};
use crate::config::MAX_CALL_DEPTH;
use crate::context::{AppInvocation, HostCall, HostParam, RuntimeContext};
use crate::env::Scope;
use crate::error::RillError;
use crate::value::{Closure, RuntimeClosure, ScriptClosure, Value};
use indexmap::IndexMap;
use std::cell::Cell;
use std::rc::Rc;

/// Result of a successful `execute` call.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub value: Value,
}

/// Internal control channel. `break` and `continue` travel alongside errors
/// and are intercepted by loops and `each`; a signal reaching the top level
/// is a runtime error.
#[derive(Debug)]
pub(crate) enum Interrupt {
    Error(RillError),
    Break,
    Continue,
}

impl From<RillError> for Interrupt {
    fn from(err: RillError) -> Self {
        Interrupt::Error(err)
    }
}

pub(crate) type Flow<T> = Result<T, Interrupt>;

fn stray_signal() -> RillError {
    RillError::generic("'break' or 'continue' escaped its loop")
}

/// Execute a parsed program against a context. Each call builds a fresh
/// root scope seeded with the context's initial variables.
pub fn execute(program: &Program, ctx: &RuntimeContext) -> Result<ExecutionResult, RillError> {
    let root = Scope::new();
    for (name, value) in &ctx.variables {
        root.define(name.clone(), value.clone());
    }
    let value = run_statements(&program.statements, ctx, &root)?;
    Ok(ExecutionResult { value })
}

/// Evaluate statements against an existing scope (used by `execute` and by
/// stateful sessions). The result is the value of the last statement.
pub(crate) fn run_statements(
    statements: &[Expr],
    ctx: &RuntimeContext,
    scope: &Rc<Scope>,
) -> Result<Value, RillError> {
    let interp = Interp::new(ctx);
    let mut last = Value::Null;
    for stmt in statements {
        last = match interp.eval(stmt, scope) {
            Ok(v) => v,
            Err(Interrupt::Error(e)) => return Err(e),
            Err(Interrupt::Break) | Err(Interrupt::Continue) => return Err(stray_signal()),
        };
    }
    Ok(last)
}

/// How a callable is being invoked: through a pipe with `$`-style argument
/// passing, or with an explicit argument list.
pub(crate) enum Invocation<'a> {
    Piped(&'a Value),
    Args(&'a [Value]),
}

pub(crate) struct Interp<'a> {
    pub(crate) ctx: &'a RuntimeContext,
    depth: Cell<usize>,
}

impl<'a> Interp<'a> {
    pub(crate) fn new(ctx: &'a RuntimeContext) -> Self {
        Interp {
            ctx,
            depth: Cell::new(0),
        }
    }

    pub(crate) fn eval(&self, expr: &Expr, scope: &Rc<Scope>) -> Flow<Value> {
        let loc = expr.loc;
        match &expr.kind {
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::Str(parts) => self.eval_interpolation(parts, scope, loc),
            ExprKind::Variable(name) => self.eval_variable(name, scope, loc),
            ExprKind::FunctionRef(name) => self.eval_function_ref(name, loc),
            ExprKind::ListLit(elements) => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    items.push(self.eval(element, scope)?);
                }
                Ok(Value::list(items))
            }
            ExprKind::DictLit(entries) => self.eval_dict_literal(entries, scope, loc),
            ExprKind::Pipe { lhs, rhs } => self.eval_pipe(lhs, rhs, scope, loc),
            ExprKind::Assign { name, value, op } => {
                let v = self.eval(value, scope)?;
                match op {
                    AssignOp::Capture => scope.assign(name, v.clone()),
                    AssignOp::CondCapture => {
                        if v.is_truthy() {
                            scope.assign(name, v.clone());
                        }
                    }
                }
                Ok(v)
            }
            ExprKind::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs, scope, loc),
            ExprKind::Unary { op, expr } => {
                let v = self.eval(expr, scope)?;
                match op {
                    UnOp::Not => Ok(Value::Bool(!v.is_truthy())),
                    UnOp::Neg => match v {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        other => Err(RillError::type_error(format!(
                            "cannot negate {} value",
                            other.kind()
                        ))
                        .with_location(loc)
                        .into()),
                    },
                }
            }
            ExprKind::Ternary {
                cond,
                then_branch,
                else_branch,
            } => {
                let c = self.eval(cond, scope)?;
                if c.is_truthy() {
                    self.eval(then_branch, scope)
                } else if let Some(else_branch) = else_branch {
                    self.eval(else_branch, scope)
                } else {
                    Ok(Value::Null)
                }
            }
            ExprKind::Coalesce { lhs, rhs } => match self.eval(lhs, scope) {
                Ok(Value::Null) => self.eval(rhs, scope),
                Ok(v) => Ok(v),
                Err(Interrupt::Error(e)) if e.is_recoverable() => self.eval(rhs, scope),
                Err(other) => Err(other),
            },
            ExprKind::Member { recv, name, args } => {
                let recv = self.eval(recv, scope)?;
                let args = match args {
                    None => None,
                    Some(arg_exprs) => {
                        let mut values = Vec::with_capacity(arg_exprs.len());
                        for arg in arg_exprs {
                            values.push(self.eval(arg, scope)?);
                        }
                        Some(values)
                    }
                };
                self.eval_member(&recv, name, args, loc)
            }
            ExprKind::ComputedMember { recv, key } => {
                let recv = self.eval(recv, scope)?;
                let key = match self.eval(key, scope)? {
                    Value::Str(s) => s,
                    other => {
                        return Err(RillError::type_error(format!(
                            "computed field key must be a string, got {}",
                            other.kind()
                        ))
                        .with_location(loc)
                        .into());
                    }
                };
                match &recv {
                    Value::Dict(map) => match map.get(&key) {
                        Some(value) => self.field_result(value.clone(), None, &key, loc),
                        None => Err(RillError::property_not_found(&key).with_location(loc).into()),
                    },
                    other => Err(RillError::type_error(format!(
                        "computed field access requires a dict, got {}",
                        other.kind()
                    ))
                    .with_location(loc)
                    .into()),
                }
            }
            ExprKind::Index { recv, index } => {
                let recv = self.eval(recv, scope)?;
                let index = self.eval(index, scope)?;
                self.eval_index(&recv, &index, loc)
            }
            ExprKind::Exists {
                recv,
                key,
                type_tag,
            } => self.eval_exists(recv, key, type_tag.as_deref(), scope, loc),
            ExprKind::Call { callee, args } => {
                let callee = self.eval(callee, scope)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, scope)?);
                }
                self.call_value(&callee, Invocation::Args(&values), loc)
            }
            ExprKind::Closure(c) => Ok(Value::Closure(Rc::new(Closure::Script(ScriptClosure {
                params: c.params.clone(),
                body: c.body.clone(),
                env: scope.clone(),
                style: c.style,
                property_style: c.property_style,
            })))),
            ExprKind::Pass => match scope.get("$") {
                Some(v) => Ok(v),
                None => Err(RillError::undefined_variable("$").with_location(loc).into()),
            },
            ExprKind::Break => Err(Interrupt::Break),
            ExprKind::Continue => Err(Interrupt::Continue),
            ExprKind::Raise(message) => {
                Err(RillError::script_error(message.clone()).with_location(loc).into())
            }
        }
    }

    pub(crate) fn eval_body(&self, statements: &[Expr], scope: &Rc<Scope>) -> Flow<Value> {
        let mut last = Value::Null;
        for stmt in statements {
            last = self.eval(stmt, scope)?;
        }
        Ok(last)
    }

    // ------------------------------------------------------------------
    // Pipes
    // ------------------------------------------------------------------

    fn eval_pipe(
        &self,
        lhs: &Expr,
        rhs: &PipeRhs,
        scope: &Rc<Scope>,
        loc: SourceLocation,
    ) -> Flow<Value> {
        let v = self.eval(lhs, scope)?;
        let child = Scope::with_parent(scope.clone());
        child.define("$", v.clone());
        match rhs {
            PipeRhs::Block(stmts) => self.eval_body(stmts, &child),
            PipeRhs::Collect { op, seed, body } => {
                self.eval_collect(*op, seed.as_deref(), body, &v, &child, loc)
            }
            PipeRhs::Loop { check, cond, body } => self.eval_loop(*check, cond, body, v, scope, loc),
            PipeRhs::ErrorSink => match v {
                Value::Str(message) => {
                    Err(RillError::script_error(message).with_location(loc).into())
                }
                other => Err(RillError::type_error(format!(
                    "error requires a string, got {}",
                    other.kind()
                ))
                .with_location(loc)
                .into()),
            },
            PipeRhs::Expr(rhs_expr) => {
                let r = self.eval(rhs_expr, &child)?;
                self.dispatch(&v, &r, loc)
            }
        }
    }

    // ------------------------------------------------------------------
    // Names
    // ------------------------------------------------------------------

    fn eval_variable(&self, name: &str, scope: &Rc<Scope>, loc: SourceLocation) -> Flow<Value> {
        match scope.get(name) {
            Some(v) => Ok(v),
            None => {
                let display = if name.starts_with('$') {
                    name.to_string()
                } else {
                    format!("${}", name)
                };
                Err(RillError::undefined_variable(&display)
                    .with_location(loc)
                    .into())
            }
        }
    }

    fn eval_function_ref(&self, name: &str, loc: SourceLocation) -> Flow<Value> {
        if let Some(hf) = self.ctx.lookup_function(name) {
            return Ok(Value::Closure(Rc::new(Closure::Runtime(RuntimeClosure {
                name: name.to_string(),
                params: hf.params.clone(),
                func: hf.func.clone(),
            }))));
        }
        if name == "log" {
            let hf = crate::context::log_function();
            return Ok(Value::Closure(Rc::new(Closure::Runtime(RuntimeClosure {
                name: "log".to_string(),
                params: hf.params.clone(),
                func: hf.func,
            }))));
        }
        Err(
            RillError::new(
                crate::error::codes::UNDEFINED_VARIABLE,
                format!("Function '{}' not registered", name),
            )
            .with_location(loc)
            .into(),
        )
    }

    // ------------------------------------------------------------------
    // Literals
    // ------------------------------------------------------------------

    fn eval_interpolation(
        &self,
        parts: &[StrPart],
        scope: &Rc<Scope>,
        loc: SourceLocation,
    ) -> Flow<Value> {
        let mut out = String::new();
        for part in parts {
            match part {
                StrPart::Text(text) => out.push_str(text),
                StrPart::Interp(expr) => {
                    let v = self.eval(expr, scope)?;
                    let text = v.render().map_err(|e| e.with_location(loc))?;
                    out.push_str(&text);
                }
            }
        }
        Ok(Value::Str(out))
    }

    fn eval_dict_literal(
        &self,
        entries: &[(DictKey, Expr)],
        scope: &Rc<Scope>,
        loc: SourceLocation,
    ) -> Flow<Value> {
        const RESERVED_KEYS: [&str; 3] = ["keys", "values", "entries"];
        let mut map = IndexMap::new();
        for (key, value_expr) in entries {
            let key = match key {
                DictKey::Static(name) => name.clone(),
                DictKey::Var(name) => match scope.get(name) {
                    Some(Value::Str(s)) => s,
                    Some(other) => {
                        return Err(RillError::type_error(format!(
                            "dict key variable '${}' must hold a string, got {}",
                            name,
                            other.kind()
                        ))
                        .with_location(loc)
                        .into());
                    }
                    None => {
                        return Err(RillError::undefined_variable(&format!("${}", name))
                            .with_location(loc)
                            .into());
                    }
                },
                DictKey::Computed(expr) => match self.eval(expr, scope)? {
                    Value::Str(s) => s,
                    other => {
                        return Err(RillError::type_error(format!(
                            "computed dict key must be a string, got {}",
                            other.kind()
                        ))
                        .with_location(loc)
                        .into());
                    }
                },
            };
            let value = self.eval(value_expr, scope)?;
            if RESERVED_KEYS.contains(&key.as_str()) && matches!(value, Value::Closure(_)) {
                return Err(RillError::type_error(format!(
                    "'{}' is a reserved method name and cannot hold a closure",
                    key
                ))
                .with_location(loc)
                .into());
            }
            // Duplicate keys are allowed; the later entry wins
            map.insert(key, value);
        }
        Ok(Value::dict(map))
    }

    // ------------------------------------------------------------------
    // Operators
    // ------------------------------------------------------------------

    fn eval_binary(
        &self,
        op: BinOp,
        lhs: &Expr,
        rhs: &Expr,
        scope: &Rc<Scope>,
        loc: SourceLocation,
    ) -> Flow<Value> {
        // Short-circuit forms first
        match op {
            BinOp::And => {
                let l = self.eval(lhs, scope)?;
                if !l.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                let r = self.eval(rhs, scope)?;
                return Ok(Value::Bool(r.is_truthy()));
            }
            BinOp::Or => {
                let l = self.eval(lhs, scope)?;
                if l.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                let r = self.eval(rhs, scope)?;
                return Ok(Value::Bool(r.is_truthy()));
            }
            _ => {}
        }

        let l = self.eval(lhs, scope)?;
        let r = self.eval(rhs, scope)?;
        let result = match op {
            BinOp::Eq => Value::Bool(l == r),
            BinOp::Ne => Value::Bool(l != r),
            BinOp::Add => match (&l, &r) {
                (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
                (Value::Str(a), Value::Str(b)) => Value::Str(format!("{}{}", a, b)),
                (Value::List(a), Value::List(b)) => {
                    let mut items = a.as_ref().clone();
                    items.extend(b.iter().cloned());
                    Value::list(items)
                }
                _ => {
                    return Err(RillError::type_error(format!(
                        "cannot add {} and {}",
                        l.kind(),
                        r.kind()
                    ))
                    .with_location(loc)
                    .into());
                }
            },
            BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => match (&l, &r) {
                (Value::Number(a), Value::Number(b)) => Value::Number(match op {
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div => a / b,
                    _ => a % b,
                }),
                _ => {
                    return Err(RillError::type_error(format!(
                        "arithmetic requires numbers, got {} and {}",
                        l.kind(),
                        r.kind()
                    ))
                    .with_location(loc)
                    .into());
                }
            },
            BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
                let ordering = match (&l, &r) {
                    (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                    (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                    _ => {
                        return Err(RillError::type_error(format!(
                            "cannot compare {} with {}",
                            l.kind(),
                            r.kind()
                        ))
                        .with_location(loc)
                        .into());
                    }
                };
                let Some(ordering) = ordering else {
                    return Ok(Value::Bool(false));
                };
                Value::Bool(match op {
                    BinOp::Lt => ordering.is_lt(),
                    BinOp::Gt => ordering.is_gt(),
                    BinOp::Le => ordering.is_le(),
                    _ => ordering.is_ge(),
                })
            }
            BinOp::And | BinOp::Or => unreachable!(),
        };
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Existence checks
    // ------------------------------------------------------------------

    fn eval_exists(
        &self,
        recv: &Expr,
        key: &ExistsKey,
        type_tag: Option<&str>,
        scope: &Rc<Scope>,
        loc: SourceLocation,
    ) -> Flow<Value> {
        let recv = self.eval(recv, scope)?;
        let key = match key {
            ExistsKey::Static(name) => name.clone(),
            ExistsKey::Var(name) => match scope.get(name) {
                Some(Value::Str(s)) => s,
                Some(other) => {
                    return Err(RillError::type_error(format!(
                        "existence check variable '${}' must hold a string, got {}",
                        name,
                        other.kind()
                    ))
                    .with_location(loc)
                    .into());
                }
                None => {
                    return Err(RillError::undefined_variable(&format!("${}", name))
                        .with_location(loc)
                        .into());
                }
            },
            ExistsKey::Computed(expr) => match self.eval(expr, scope)? {
                Value::Str(s) => s,
                other => {
                    return Err(RillError::type_error(format!(
                        "existence check key must be a string, got {}",
                        other.kind()
                    ))
                    .with_location(loc)
                    .into());
                }
            },
        };

        // Non-dict receivers answer false rather than raising
        let Value::Dict(map) = &recv else {
            return Ok(Value::Bool(false));
        };
        let present = map.get(&key);
        let result = match (present, type_tag) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(value), Some(tag)) => {
                const TAGS: [&str; 8] = [
                    "number", "string", "bool", "list", "dict", "null", "closure", "vector",
                ];
                if !TAGS.contains(&tag) {
                    return Err(RillError::type_error(format!("unknown type tag '{}'", tag))
                        .with_location(loc)
                        .into());
                }
                value.kind() == tag
            }
        };
        Ok(Value::Bool(result))
    }

    // ------------------------------------------------------------------
    // Members: dict fields and built-in methods
    // ------------------------------------------------------------------

    pub(crate) fn eval_member(
        &self,
        recv: &Value,
        name: &str,
        args: Option<Vec<Value>>,
        loc: SourceLocation,
    ) -> Flow<Value> {
        const RESERVED_DICT_METHODS: [&str; 3] = ["keys", "values", "entries"];

        if let Value::Dict(map) = recv {
            if !RESERVED_DICT_METHODS.contains(&name) {
                if let Some(value) = map.get(name) {
                    return self.field_result(value.clone(), args, name, loc);
                }
            }
        }

        match crate::methods::lookup(recv.kind(), name) {
            Some(spec) => {
                let arg_slice: &[Value] = args.as_deref().unwrap_or(&[]);
                if arg_slice.len() != spec.arity {
                    return Err(RillError::arity_error(name, spec.arity, arg_slice.len())
                        .with_location(loc)
                        .into());
                }
                (spec.func)(recv, arg_slice)
                    .map_err(|e| Interrupt::Error(e.with_location(loc)))
            }
            None => {
                if matches!(recv, Value::Dict(_)) {
                    // Missing key on a dict is recoverable by `??`
                    return Err(RillError::property_not_found(name).with_location(loc).into());
                }
                if let Some(other) = crate::methods::lookup_any(name) {
                    return Err(RillError::receiver_error(name, other.receiver, recv.kind())
                        .with_location(loc)
                        .into());
                }
                Err(RillError::type_error(format!(
                    "unknown method '{}' on {}",
                    name,
                    recv.kind()
                ))
                .with_location(loc)
                .into())
            }
        }
    }

    /// Resolve a dict field read: property-style closures auto-invoke on
    /// bare access, explicit argument lists invoke callable fields.
    fn field_result(
        &self,
        value: Value,
        args: Option<Vec<Value>>,
        name: &str,
        loc: SourceLocation,
    ) -> Flow<Value> {
        match args {
            Some(args) => {
                if matches!(value, Value::Closure(_)) {
                    self.call_value(&value, Invocation::Args(&args), loc)
                } else {
                    Err(RillError::type_error(format!("'{}' is not callable", name))
                        .with_location(loc)
                        .into())
                }
            }
            None => {
                if let Value::Closure(c) = &value {
                    if let Closure::Script(sc) = &**c {
                        if sc.property_style && sc.params.is_empty() {
                            return self.call_value(&value, Invocation::Args(&[]), loc);
                        }
                    }
                }
                Ok(value)
            }
        }
    }

    fn eval_index(&self, recv: &Value, index: &Value, loc: SourceLocation) -> Flow<Value> {
        match (recv, index) {
            (Value::List(items), Value::Number(_)) => {
                let Some(idx) = index.as_int() else {
                    return Err(RillError::type_error("list index must be an integer")
                        .with_location(loc)
                        .into());
                };
                let len = items.len() as i64;
                let resolved = if idx < 0 { idx + len } else { idx };
                if resolved < 0 || resolved >= len {
                    return Err(RillError::index_out_of_bounds(idx, items.len())
                        .with_location(loc)
                        .into());
                }
                Ok(items[resolved as usize].clone())
            }
            (Value::Dict(map), Value::Str(key)) => match map.get(key) {
                Some(value) => self.field_result(value.clone(), None, key, loc),
                None => Err(RillError::property_not_found(key).with_location(loc).into()),
            },
            (recv, index) => Err(RillError::type_error(format!(
                "cannot index {} with {}",
                recv.kind(),
                index.kind()
            ))
            .with_location(loc)
            .into()),
        }
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    pub(crate) fn call_value(
        &self,
        callee: &Value,
        invocation: Invocation<'_>,
        loc: SourceLocation,
    ) -> Flow<Value> {
        let Value::Closure(closure) = callee else {
            return Err(RillError::type_error(format!(
                "value of type {} is not callable",
                callee.kind()
            ))
            .with_location(loc)
            .into());
        };
        match &**closure {
            Closure::Script(sc) => self.call_script(sc, invocation, loc),
            Closure::Runtime(rc) => {
                let args: Vec<Value> = match invocation {
                    Invocation::Piped(v) => vec![v.clone()],
                    Invocation::Args(args) => args.to_vec(),
                };
                let args = fill_host_defaults(&rc.name, &rc.params, args)
                    .map_err(|e| Interrupt::Error(e.with_location(loc)))?;
                let mut call = HostCall { ctx: self.ctx };
                (rc.func)(&args, &mut call).map_err(|e| Interrupt::Error(e.with_location(loc)))
            }
            Closure::Application(ac) => {
                let (args, pipe_value): (Vec<Value>, Option<Value>) = match invocation {
                    Invocation::Piped(v) => (vec![v.clone()], Some(v.clone())),
                    Invocation::Args(args) => (args.to_vec(), None),
                };
                let mut call = HostCall { ctx: self.ctx };
                (ac.func)(
                    AppInvocation {
                        args: &args,
                        pipe_value: pipe_value.as_ref(),
                    },
                    &mut call,
                )
                .map_err(|e| Interrupt::Error(e.with_location(loc)))
            }
        }
    }

    fn call_script(
        &self,
        sc: &ScriptClosure,
        invocation: Invocation<'_>,
        loc: SourceLocation,
    ) -> Flow<Value> {
        self.enter_call(loc)?;
        let result = self.call_script_inner(sc, invocation, loc);
        self.depth.set(self.depth.get() - 1);
        result
    }

    fn enter_call(&self, loc: SourceLocation) -> Flow<()> {
        let depth = self.depth.get();
        if depth >= MAX_CALL_DEPTH {
            return Err(Interrupt::Error(
                RillError::validation("maximum call depth exceeded")
                    .with_context("size", Value::Number(depth as f64))
                    .with_context("max", Value::Number(MAX_CALL_DEPTH as f64))
                    .with_location(loc),
            ));
        }
        self.depth.set(depth + 1);
        Ok(())
    }

    fn call_script_inner(
        &self,
        sc: &ScriptClosure,
        invocation: Invocation<'_>,
        loc: SourceLocation,
    ) -> Flow<Value> {
        let frame = Scope::with_parent(sc.env.clone());
        match invocation {
            Invocation::Piped(v) => {
                if sc.params.is_empty() {
                    // Zero-param closures accept the pipe value as `$`
                    frame.define("$", v.clone());
                } else {
                    self.bind_params(sc, &frame, std::slice::from_ref(v), loc)?;
                }
            }
            Invocation::Args(args) => {
                if sc.params.is_empty() {
                    match args.len() {
                        0 => {}
                        1 => frame.define("$", args[0].clone()),
                        n => {
                            return Err(RillError::type_error(format!(
                                "closure expects 0 argument(s), got {}",
                                n
                            ))
                            .with_location(loc)
                            .into());
                        }
                    }
                } else {
                    self.bind_params(sc, &frame, args, loc)?;
                }
            }
        }
        self.eval_body(&sc.body, &frame)
    }

    /// Bind explicit parameters positionally, filling trailing defaults.
    /// Parameterized closures never see `$` from the caller.
    fn bind_params(
        &self,
        sc: &ScriptClosure,
        frame: &Rc<Scope>,
        args: &[Value],
        loc: SourceLocation,
    ) -> Flow<()> {
        if args.len() > sc.params.len() {
            return Err(RillError::type_error(format!(
                "closure expects {} argument(s), got {}",
                sc.params.len(),
                args.len()
            ))
            .with_location(loc)
            .into());
        }
        for (i, param) in sc.params.iter().enumerate() {
            let value = match args.get(i) {
                Some(v) => v.clone(),
                None => match &param.default {
                    Some(default_expr) => self.eval(default_expr, frame)?,
                    None => {
                        return Err(RillError::type_error(format!(
                            "closure expects {} argument(s), got {}",
                            sc.params.len(),
                            args.len()
                        ))
                        .with_location(loc)
                        .into());
                    }
                },
            };
            frame.define(param.name.clone(), value);
        }
        Ok(())
    }
}

/// Fill missing trailing host-function arguments from declared defaults.
/// Host functions with no declared parameters accept any argument list.
fn fill_host_defaults(
    name: &str,
    params: &[HostParam],
    mut args: Vec<Value>,
) -> Result<Vec<Value>, RillError> {
    if params.is_empty() {
        return Ok(args);
    }
    if args.len() > params.len() {
        return Err(RillError::validation(format!(
            "{}() expects at most {} argument(s), got {}",
            name,
            params.len(),
            args.len()
        )));
    }
    for param in params.iter().skip(args.len()) {
        match &param.default {
            Some(default) => args.push(default.clone()),
            None => {
                return Err(RillError::validation(format!(
                    "{}() missing required argument '{}'",
                    name, param.name
                )));
            }
        }
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn run(source: &str) -> Result<Value, RillError> {
        let program = parse(source)?;
        let ctx = RuntimeContext::builder().build();
        execute(&program, &ctx).map(|r| r.value)
    }

    fn run_ok(source: &str) -> Value {
        run(source).unwrap_or_else(|e| panic!("{}: {}", e.error_id, e.message))
    }

    #[test]
    fn test_literals() {
        assert_eq!(run_ok("42"), Value::Number(42.0));
        assert_eq!(run_ok("true"), Value::Bool(true));
        assert_eq!(run_ok("null"), Value::Null);
        assert_eq!(run_ok(r#""hi""#), Value::str("hi"));
    }

    #[test]
    fn test_program_value_is_last_statement() {
        assert_eq!(run_ok("1\n2\n3"), Value::Number(3.0));
    }

    #[test]
    fn test_arithmetic_and_precedence() {
        assert_eq!(run_ok("1 + 2 * 3"), Value::Number(7.0));
        assert_eq!(run_ok("10 % 3"), Value::Number(1.0));
        assert_eq!(run_ok("-(2 + 3)"), Value::Number(-5.0));
        assert_eq!(run_ok(r#""a" + "b""#), Value::str("ab"));
        assert_eq!(
            run_ok("[1] + [2]"),
            Value::list(vec![Value::Number(1.0), Value::Number(2.0)])
        );
    }

    #[test]
    fn test_arithmetic_type_error() {
        let err = run(r#"1 + "a""#).unwrap_err();
        assert_eq!(err.error_id, "RILL-R002");
    }

    #[test]
    fn test_pipe_binds_dollar() {
        assert_eq!(run_ok("5 -> { $ + 1 }"), Value::Number(6.0));
        assert_eq!(run_ok("5 -> { $ } -> { $ * 2 }"), Value::Number(10.0));
    }

    #[test]
    fn test_identity_pipes() {
        assert_eq!(run_ok("7 -> { pass }"), Value::Number(7.0));
        assert_eq!(run_ok("7 -> { $ }"), Value::Number(7.0));
        assert_eq!(run_ok("7 -> ({ $ })"), Value::Number(7.0));
        assert_eq!(run_ok("7 -> |x| $x"), Value::Number(7.0));
    }

    #[test]
    fn test_assignment_returns_value_and_binds() {
        assert_eq!(run_ok("5 :> $x\n$x + 1"), Value::Number(6.0));
        assert_eq!(run_ok("5 => $x\n$x"), Value::Number(5.0));
    }

    #[test]
    fn test_conditional_capture() {
        // Falsy value: no binding happens, the value still flows through
        let err = run("0 ?> $x\n$x").unwrap_err();
        assert_eq!(err.error_id, "RILL-R005");
        assert_eq!(run_ok("0 ?> $x"), Value::Number(0.0));
        assert_eq!(run_ok("3 ?> $x\n$x"), Value::Number(3.0));
    }

    #[test]
    fn test_undefined_variable_message() {
        let err = run("$missing").unwrap_err();
        assert_eq!(err.error_id, "RILL-R005");
        assert_eq!(err.message, "Variable '$missing' not defined");
    }

    #[test]
    fn test_ternary_evaluates_one_branch() {
        assert_eq!(run_ok(r#"true ? 1 ! 2"#), Value::Number(1.0));
        assert_eq!(run_ok(r#"false ? 1 ! 2"#), Value::Number(2.0));
        assert_eq!(run_ok(r#"false ? 1"#), Value::Null);
        // The untaken branch must not run: it would raise otherwise
        assert_eq!(run_ok(r#"true ? 1 ! error "never""#), Value::Number(1.0));
    }

    #[test]
    fn test_logic_ops() {
        assert_eq!(run_ok("true && false"), Value::Bool(false));
        assert_eq!(run_ok("true || false"), Value::Bool(true));
        assert_eq!(run_ok("!0"), Value::Bool(true));
        // Short-circuit: rhs would raise
        assert_eq!(run_ok(r#"false && (error "never")"#), Value::Bool(false));
    }

    #[test]
    fn test_interpolation() {
        assert_eq!(run_ok(r#"5 :> $x
"x is {$x}""#), Value::str("x is 5"));
        assert_eq!(run_ok(r#""{1 + 1} and {"a".upper}""#), Value::str("2 and A"));
        assert_eq!(
            run_ok(r#""{[1, 2]} {[a: 1]} {true} {null}""#),
            Value::str("[1,2] {\"a\":1} true null")
        );
    }

    #[test]
    fn test_number_interpolation_is_integral_when_whole() {
        assert_eq!(run_ok(r#""{2.0}""#), Value::str("2"));
        assert_eq!(run_ok(r#""{2.5}""#), Value::str("2.5"));
    }

    #[test]
    fn test_coalesce() {
        assert_eq!(run_ok("[a: 1] -> { $.b ?? 9 }"), Value::Number(9.0));
        assert_eq!(run_ok("[a: 1] -> { $.a ?? 9 }"), Value::Number(1.0));
        assert_eq!(run_ok("[1] -> { $[5] ?? 9 }"), Value::Number(9.0));
        assert_eq!(run_ok("null ?? 3"), Value::Number(3.0));
        // Non-lookup errors still propagate
        let err = run(r#"(error "boom") ?? 1"#).unwrap_err();
        assert_eq!(err.error_id, "RILL-R016");
    }

    #[test]
    fn test_dict_literal_and_field_access() {
        assert_eq!(run_ok("[a: 1, b: 2].b"), Value::Number(2.0));
        assert_eq!(run_ok("[a: 1, a: 2].a"), Value::Number(2.0));
        assert_eq!(run_ok(r#""k" :> $n
[$n: 7].k"#), Value::Number(7.0));
        assert_eq!(run_ok(r#"[("a" + "b"): 7].ab"#), Value::Number(7.0));
    }

    #[test]
    fn test_reserved_dict_key_with_closure_is_rejected() {
        let err = run("[keys: { $ }]").unwrap_err();
        assert_eq!(err.error_id, "RILL-R002");
        // Non-closure values under reserved names are fine
        assert!(run("[keys: 1]").is_ok());
    }

    #[test]
    fn test_index_access() {
        assert_eq!(run_ok("[10, 20, 30][1]"), Value::Number(20.0));
        assert_eq!(run_ok("[10, 20, 30][-1]"), Value::Number(30.0));
        let err = run("[10][3]").unwrap_err();
        assert_eq!(err.error_id, "RILL-R007");
    }

    #[test]
    fn test_computed_member() {
        assert_eq!(run_ok(r#"[ab: 5].("a" + "b")"#), Value::Number(5.0));
        let err = run(r#"[ab: 5].(1)"#).unwrap_err();
        assert_eq!(err.error_id, "RILL-R002");
    }

    #[test]
    fn test_existence_checks() {
        assert_eq!(run_ok("[a: 1].?a"), Value::Bool(true));
        assert_eq!(run_ok("[a: 1].?b"), Value::Bool(false));
        assert_eq!(run_ok("5 -> { $.?a }"), Value::Bool(false));
        assert_eq!(run_ok("[a: 1].?a&number"), Value::Bool(true));
        assert_eq!(run_ok("[a: 1].?a&string"), Value::Bool(false));
        assert_eq!(run_ok(r#"[n: null].?n&null"#), Value::Bool(true));
        let err = run("[a: 1].?a&float").unwrap_err();
        assert_eq!(err.error_id, "RILL-R002");
    }

    #[test]
    fn test_existence_variable_key() {
        assert_eq!(run_ok(r#""a" :> $k
[a: 1].?$k"#), Value::Bool(true));
        let err = run("[a: 1].?$nope").unwrap_err();
        assert_eq!(err.error_id, "RILL-R005");
        let err = run("5 :> $k\n[a: 1].?$k").unwrap_err();
        assert_eq!(err.error_id, "RILL-R002");
    }

    #[test]
    fn test_late_bound_capture() {
        let result = run_ok("5 :> $x\n{ $ + $x } :> $add\n20 :> $x\n5 -> $add");
        assert_eq!(result, Value::Number(25.0));
    }

    #[test]
    fn test_explicit_params_do_not_inherit_dollar() {
        let err = run("|x| $ :> $f\n1 -> $f").unwrap_err();
        assert_eq!(err.error_id, "RILL-R005");
        assert_eq!(err.message, "Variable '$' not defined");
    }

    #[test]
    fn test_closure_defaults() {
        assert_eq!(run_ok("|a, b=10| $a + $b :> $f\n$f(1)"), Value::Number(11.0));
        assert_eq!(run_ok("|a, b=10| $a + $b :> $f\n$f(1, 2)"), Value::Number(3.0));
        let err = run("|a, b| $a :> $f\n$f(1)").unwrap_err();
        assert_eq!(err.error_id, "RILL-R002");
        assert!(err.message.contains("expects 2 argument(s), got 1"));
    }

    #[test]
    fn test_zero_arg_closure_call() {
        assert_eq!(run_ok("||( 41 + 1 ) :> $f\n$f()"), Value::Number(42.0));
    }

    #[test]
    fn test_error_statement() {
        let err = run(r#"error "boom""#).unwrap_err();
        assert_eq!(err.error_id, "RILL-R016");
        assert!(err.message.contains("boom"));
    }

    #[test]
    fn test_pipe_to_error() {
        let err = run(r#""bad state" -> error"#).unwrap_err();
        assert_eq!(err.error_id, "RILL-R016");
        assert_eq!(err.message, "bad state");

        let err = run("42 -> error").unwrap_err();
        assert_eq!(err.error_id, "RILL-R002");
    }

    #[test]
    fn test_error_location_attached() {
        let err = run("1\n$boom").unwrap_err();
        let loc = err.location.expect("location");
        assert_eq!(loc.line, 2);
        assert_eq!(loc.column, 1);
    }

    #[test]
    fn test_call_depth_guard() {
        // A self-referential closure recursing forever trips the guard
        let err = run("{ $ -> $f } :> $f\n1 -> $f").unwrap_err();
        assert_eq!(err.error_id, "RILL-R004");
        let context = err.context.expect("depth context");
        assert!(context.contains_key("max"));
    }

    #[test]
    fn test_property_style_auto_invocation() {
        assert_eq!(run_ok("[greet: ||( 42 )].greet"), Value::Number(42.0));
        // Plain block closures do not auto-invoke on field read
        match run_ok("[greet: { 42 }].greet") {
            Value::Closure(_) => {}
            other => panic!("expected closure, got {:?}", other),
        }
    }

    #[test]
    fn test_dict_string_indexing() {
        assert_eq!(run_ok(r#"[a: 1]["a"]"#), Value::Number(1.0));
        let err = run(r#"[a: 1]["b"]"#).unwrap_err();
        assert_eq!(err.error_id, "RILL-R006");
    }

    #[test]
    fn test_unregistered_function() {
        let err = run("1 -> nosuch").unwrap_err();
        assert_eq!(err.error_id, "RILL-R005");
        assert!(err.message.contains("nosuch"));
    }
}
