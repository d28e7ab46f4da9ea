// ABOUTME: Host interface: runtime context, host function registration, extension events

use crate::env::Scope;
use crate::error::RillError;
use crate::value::{ApplicationClosure, Closure, RuntimeClosure, Value};
use chrono::{SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use std::rc::Rc;

/// Host function body: receives evaluated arguments and a per-call handle
/// into the runtime context.
pub type HostFn = Rc<dyn Fn(&[Value], &mut HostCall) -> Result<Value, RillError>>;

/// Application-kind callable body: like [`HostFn`] but with access to the
/// pipe value that triggered the call.
pub type AppFn = Rc<dyn Fn(AppInvocation<'_>, &mut HostCall) -> Result<Value, RillError>>;

/// Calling convention for application-kind callables.
pub struct AppInvocation<'a> {
    pub args: &'a [Value],
    pub pipe_value: Option<&'a Value>,
}

/// Declared host function parameter. Type tags are informational; defaults
/// fill missing trailing arguments.
#[derive(Debug, Clone)]
pub struct HostParam {
    pub name: String,
    pub type_tag: String,
    pub default: Option<Value>,
}

/// A registered host function: parameter declarations, an informational
/// return type tag, a human description, and the body itself.
#[derive(Clone)]
pub struct HostFunction {
    pub params: Vec<HostParam>,
    pub return_type: String,
    pub description: String,
    pub func: HostFn,
}

impl HostFunction {
    pub fn new(
        func: impl Fn(&[Value], &mut HostCall) -> Result<Value, RillError> + 'static,
    ) -> Self {
        HostFunction {
            params: Vec::new(),
            return_type: "any".to_string(),
            description: String::new(),
            func: Rc::new(func),
        }
    }

    pub fn param(mut self, name: &str, type_tag: &str) -> Self {
        self.params.push(HostParam {
            name: name.to_string(),
            type_tag: type_tag.to_string(),
            default: None,
        });
        self
    }

    pub fn param_with_default(mut self, name: &str, type_tag: &str, default: Value) -> Self {
        self.params.push(HostParam {
            name: name.to_string(),
            type_tag: type_tag.to_string(),
            default: Some(default),
        });
        self
    }

    pub fn returns(mut self, type_tag: &str) -> Self {
        self.return_type = type_tag.to_string();
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

/// Result of registering an extension: a namespaced function map plus an
/// optional dispose hook. The runtime never calls `dispose`; the host does,
/// after evaluation has returned.
#[derive(Clone, Default)]
pub struct Extension {
    pub functions: HashMap<String, HostFunction>,
    pub dispose: Option<Rc<dyn Fn()>>,
}

impl Extension {
    pub fn new(functions: HashMap<String, HostFunction>) -> Self {
        Extension {
            functions,
            dispose: None,
        }
    }

    pub fn with_dispose(mut self, dispose: impl Fn() + 'static) -> Self {
        self.dispose = Some(Rc::new(dispose));
        self
    }
}

/// Rename every function of an extension to `"<prefix>::<name>"`,
/// preserving the dispose slot.
pub fn prefix_functions(prefix: &str, extension: Extension) -> Extension {
    let functions = extension
        .functions
        .into_iter()
        .map(|(name, func)| (format!("{}::{}", prefix, name), func))
        .collect();
    Extension {
        functions,
        dispose: extension.dispose,
    }
}

/// Event emitted by a host function through the context's `on_log_event`
/// callback. `event` is `"<extension>:<kind>"`; the timestamp is stamped at
/// emission.
#[derive(Debug, Clone, Serialize)]
pub struct ExtensionEvent {
    pub event: String,
    pub subsystem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(rename = "duration", skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    #[serde(flatten)]
    pub fields: IndexMap<String, Value>,
}

impl ExtensionEvent {
    /// Build an event; the subsystem is derived from the namespace part of
    /// the event name (`"llm:request"` → `"extension:llm"`).
    pub fn new(event: &str) -> Self {
        let namespace = event.split(':').next().unwrap_or(event);
        ExtensionEvent {
            event: event.to_string(),
            subsystem: format!("extension:{}", namespace),
            timestamp: None,
            duration_ms: None,
            fields: IndexMap::new(),
        }
    }

    pub fn field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    pub fn duration(mut self, ms: f64) -> Self {
        self.duration_ms = Some(ms);
        self
    }
}

#[derive(Clone, Default)]
pub struct Callbacks {
    pub on_log: Option<Rc<dyn Fn(&Value)>>,
    pub on_log_event: Option<Rc<dyn Fn(&ExtensionEvent)>>,
}

/// Per-execution record holding registered host functions, initial variable
/// bindings, and host callbacks. Treated as read-only during `execute`; two
/// executions against separate contexts share nothing.
pub struct RuntimeContext {
    pub(crate) functions: HashMap<String, HostFunction>,
    pub(crate) variables: HashMap<String, Value>,
    pub(crate) callbacks: Callbacks,
}

impl RuntimeContext {
    pub fn builder() -> RuntimeContextBuilder {
        RuntimeContextBuilder::default()
    }

    pub(crate) fn lookup_function(&self, name: &str) -> Option<&HostFunction> {
        self.functions.get(name)
    }
}

#[derive(Default)]
pub struct RuntimeContextBuilder {
    functions: HashMap<String, HostFunction>,
    variables: HashMap<String, Value>,
    callbacks: Callbacks,
}

impl RuntimeContextBuilder {
    pub fn function(mut self, name: &str, func: HostFunction) -> Self {
        self.functions.insert(name.to_string(), func);
        self
    }

    pub fn functions(mut self, map: HashMap<String, HostFunction>) -> Self {
        self.functions.extend(map);
        self
    }

    /// Merge an extension's function map. The dispose hook stays with the
    /// host-held extension value.
    pub fn extension(mut self, extension: &Extension) -> Self {
        for (name, func) in &extension.functions {
            self.functions.insert(name.clone(), func.clone());
        }
        self
    }

    pub fn variable(mut self, name: &str, value: Value) -> Self {
        self.variables.insert(name.to_string(), value);
        self
    }

    pub fn on_log(mut self, callback: impl Fn(&Value) + 'static) -> Self {
        self.callbacks.on_log = Some(Rc::new(callback));
        self
    }

    pub fn on_log_event(mut self, callback: impl Fn(&ExtensionEvent) + 'static) -> Self {
        self.callbacks.on_log_event = Some(Rc::new(callback));
        self
    }

    pub fn build(self) -> RuntimeContext {
        RuntimeContext {
            functions: self.functions,
            variables: self.variables,
            callbacks: self.callbacks,
        }
    }
}

/// Per-call handle passed to host functions.
pub struct HostCall<'a> {
    pub(crate) ctx: &'a RuntimeContext,
}

impl HostCall<'_> {
    /// Forward a value to the context's `on_log` callback.
    pub fn log(&self, value: &Value) {
        if let Some(cb) = &self.ctx.callbacks.on_log {
            cb(value);
        }
    }

    pub fn emit_event(&self, event: ExtensionEvent) {
        emit_extension_event(self, event);
    }
}

/// Stamp an ISO-8601 UTC timestamp onto the event and deliver it
/// synchronously to the context's `on_log_event` callback.
pub fn emit_extension_event(call: &HostCall, mut event: ExtensionEvent) {
    event.timestamp = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
    if let Some(cb) = &call.ctx.callbacks.on_log_event {
        cb(&event);
    }
}

/// Wrap a host function as a runtime closure value so it can be seeded into
/// a context as a variable and invoked from scripts.
pub fn callable(
    name: &str,
    func: impl Fn(&[Value], &mut HostCall) -> Result<Value, RillError> + 'static,
) -> Value {
    Value::Closure(Rc::new(Closure::Runtime(RuntimeClosure {
        name: name.to_string(),
        params: Vec::new(),
        func: Rc::new(func),
    })))
}

/// Wrap an application-kind callable: like [`callable`] but the body also
/// receives the pipe value that triggered the call.
pub fn application(
    name: &str,
    func: impl Fn(AppInvocation<'_>, &mut HostCall) -> Result<Value, RillError> + 'static,
) -> Value {
    Value::Closure(Rc::new(Closure::Application(ApplicationClosure {
        name: name.to_string(),
        func: Rc::new(func),
    })))
}

/// The `log` tap available in every context unless the host overrides it:
/// forwards its input to `on_log` and returns it unchanged.
pub(crate) fn log_function() -> HostFunction {
    HostFunction::new(|args, call| {
        let value = args.first().cloned().unwrap_or(Value::Null);
        call.log(&value);
        Ok(value)
    })
    .param("value", "any")
    .returns("any")
    .describe("Forward a value to the host log callback and pass it through")
}

/// Stateful evaluation session: a context plus a persistent root scope, so
/// REPL inputs share bindings.
pub struct Session {
    ctx: RuntimeContext,
    root: Rc<Scope>,
}

impl Session {
    pub fn new(ctx: RuntimeContext) -> Self {
        let root = Scope::new();
        for (name, value) in &ctx.variables {
            root.define(name.clone(), value.clone());
        }
        Session { ctx, root }
    }

    /// Parse and evaluate one input against the persistent scope.
    pub fn eval(&self, source: &str) -> Result<Value, RillError> {
        let program = crate::parser::parse(source)?;
        crate::eval::run_statements(&program.statements, &self.ctx, &self.root)
    }

    pub fn context(&self) -> &RuntimeContext {
        &self.ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_prefix_functions_renames_and_keeps_dispose() {
        let mut functions = HashMap::new();
        functions.insert(
            "complete".to_string(),
            HostFunction::new(|_, _| Ok(Value::Null)),
        );
        let disposed = Rc::new(RefCell::new(false));
        let flag = disposed.clone();
        let ext = Extension::new(functions).with_dispose(move || *flag.borrow_mut() = true);

        let prefixed = prefix_functions("llm", ext);
        assert!(prefixed.functions.contains_key("llm::complete"));
        assert!(!prefixed.functions.contains_key("complete"));

        let dispose = prefixed.dispose.expect("dispose preserved");
        dispose();
        assert!(*disposed.borrow());
    }

    #[test]
    fn test_event_subsystem_derivation() {
        let event = ExtensionEvent::new("llm:request");
        assert_eq!(event.subsystem, "extension:llm");
        assert_eq!(event.event, "llm:request");
        assert!(event.timestamp.is_none());
    }

    #[test]
    fn test_emit_stamps_timestamp_and_delivers() {
        let seen: Rc<RefCell<Vec<ExtensionEvent>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let ctx = RuntimeContext::builder()
            .on_log_event(move |event| sink.borrow_mut().push(event.clone()))
            .build();
        let call = HostCall { ctx: &ctx };

        emit_extension_event(
            &call,
            ExtensionEvent::new("vec:upsert")
                .field("count", Value::Number(3.0))
                .duration(12.5),
        );

        let events = seen.borrow();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.event, "vec:upsert");
        assert_eq!(event.duration_ms, Some(12.5));
        let stamp = event.timestamp.as_ref().expect("timestamp stamped");
        assert!(stamp.ends_with('Z'), "expected UTC instant, got {}", stamp);
        assert_eq!(event.fields.get("count"), Some(&Value::Number(3.0)));
    }

    #[test]
    fn test_event_serializes_with_flattened_fields() {
        let event = ExtensionEvent::new("llm:response")
            .field("model", Value::str("mini"))
            .duration(3.0);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "llm:response");
        assert_eq!(json["subsystem"], "extension:llm");
        assert_eq!(json["model"], "mini");
        assert_eq!(json["duration"], 3.0);
    }
}
