// ABOUTME: Collection operators (each/map/filter/fold) and value loops

use crate::ast::{CollectOp, Expr, LoopCheck, SourceLocation};
use crate::env::Scope;
use crate::error::RillError;
use crate::eval::{Flow, Interp, Interrupt, Invocation};
use crate::value::Value;
use std::rc::Rc;

impl Interp<'_> {
    pub(crate) fn eval_collect(
        &self,
        op: CollectOp,
        seed: Option<&Expr>,
        body: &Expr,
        input: &Value,
        scope: &Rc<Scope>,
        loc: SourceLocation,
    ) -> Flow<Value> {
        let items = collect_items(input, op, loc)?;
        match op {
            CollectOp::Each => {
                let mut acc = match seed {
                    Some(seed_expr) => Some(self.eval(seed_expr, scope)?),
                    None => None,
                };
                let mut results = Vec::new();
                for item in items {
                    match self.apply_body(body, &item, acc.as_ref(), scope, loc) {
                        Ok(v) => {
                            if acc.is_some() {
                                acc = Some(v.clone());
                            }
                            results.push(v);
                        }
                        // On break, results collected so far are the answer
                        Err(Interrupt::Break) => break,
                        Err(Interrupt::Continue) => continue,
                        Err(e) => return Err(e),
                    }
                }
                Ok(Value::list(results))
            }
            CollectOp::Map => {
                let mut results = Vec::with_capacity(items.len());
                for item in items {
                    let v = forbid_signals(self.apply_body(body, &item, None, scope, loc), loc)?;
                    results.push(v);
                }
                Ok(Value::list(results))
            }
            CollectOp::Filter => {
                let mut results = Vec::new();
                for item in items {
                    let keep =
                        forbid_signals(self.apply_body(body, &item, None, scope, loc), loc)?;
                    if keep.is_truthy() {
                        results.push(item);
                    }
                }
                Ok(Value::list(results))
            }
            CollectOp::Fold => {
                let Some(seed_expr) = seed else {
                    return Err(RillError::validation("fold requires a seed")
                        .with_location(loc)
                        .into());
                };
                let mut acc = self.eval(seed_expr, scope)?;
                for item in items {
                    acc = forbid_signals(
                        self.apply_body(body, &item, Some(&acc), scope, loc),
                        loc,
                    )?;
                }
                Ok(acc)
            }
        }
    }

    /// Run the operator body for one element: `$` is the element, `$@` the
    /// accumulator when one is active. A body evaluating to a callable is
    /// invoked with the element.
    fn apply_body(
        &self,
        body: &Expr,
        item: &Value,
        acc: Option<&Value>,
        scope: &Rc<Scope>,
        loc: SourceLocation,
    ) -> Flow<Value> {
        let frame = Scope::with_parent(scope.clone());
        frame.define("$", item.clone());
        if let Some(acc) = acc {
            frame.define("$@", acc.clone());
        }
        let result = self.eval(body, &frame)?;
        if matches!(result, Value::Closure(_)) {
            self.call_value(&result, Invocation::Piped(item), loc)
        } else {
            Ok(result)
        }
    }

    pub(crate) fn eval_loop(
        &self,
        check: LoopCheck,
        cond: &Expr,
        body: &[Expr],
        init: Value,
        scope: &Rc<Scope>,
        _loc: SourceLocation,
    ) -> Flow<Value> {
        let mut current = init;
        loop {
            if check == LoopCheck::Pre && !self.loop_cond(cond, &current, scope)? {
                return Ok(current);
            }
            match self.run_loop_body(body, &current, scope) {
                Ok(next) => current = next,
                Err(Interrupt::Break) => return Ok(current),
                Err(Interrupt::Continue) => {}
                Err(e) => return Err(e),
            }
            if check == LoopCheck::Post && !self.loop_cond(cond, &current, scope)? {
                return Ok(current);
            }
        }
    }

    fn loop_cond(&self, cond: &Expr, current: &Value, scope: &Rc<Scope>) -> Flow<bool> {
        let frame = Scope::with_parent(scope.clone());
        frame.define("$", current.clone());
        Ok(self.eval(cond, &frame)?.is_truthy())
    }

    /// One loop iteration: `$` is the evolving value, the last statement's
    /// value becomes the next `$`.
    fn run_loop_body(&self, body: &[Expr], current: &Value, scope: &Rc<Scope>) -> Flow<Value> {
        let frame = Scope::with_parent(scope.clone());
        frame.define("$", current.clone());
        self.eval_body(body, &frame)
    }
}

/// Elements an operator iterates: list items, dict `[key, value]` pairs in
/// insertion order, or per-character strings.
fn collect_items(input: &Value, op: CollectOp, loc: SourceLocation) -> Flow<Vec<Value>> {
    match input {
        Value::List(items) => Ok(items.as_ref().clone()),
        Value::Dict(map) => Ok(map
            .iter()
            .map(|(k, v)| Value::list(vec![Value::str(k.clone()), v.clone()]))
            .collect()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::str(c.to_string())).collect()),
        other => Err(RillError::type_error(format!(
            "{} requires a list, dict, or string, got {}",
            op.name(),
            other.kind()
        ))
        .with_location(loc)
        .into()),
    }
}

/// `break`/`continue` are not allowed to escape map/filter/fold bodies.
fn forbid_signals(flow: Flow<Value>, loc: SourceLocation) -> Flow<Value> {
    match flow {
        Err(Interrupt::Break) | Err(Interrupt::Continue) => Err(RillError::generic(
            "'break' or 'continue' is not allowed here",
        )
        .with_location(loc)
        .into()),
        other => other,
    }
}
