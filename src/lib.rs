// ABOUTME: Library crate exposing the rill language runtime

pub mod ast;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod error;
pub mod eval;
pub mod help;
pub mod highlighter;
pub mod lexer;
pub mod methods;
pub mod ops;
pub mod parser;
pub mod value;

pub use ast::{Program, SourceLocation};
pub use context::{
    application, callable, emit_extension_event, prefix_functions, AppInvocation, Extension,
    ExtensionEvent, HostCall, HostFn, HostFunction, HostParam, RuntimeContext,
    RuntimeContextBuilder, Session,
};
pub use error::RillError;
pub use eval::{execute, ExecutionResult};
pub use parser::parse;
pub use value::{Closure, Value, VectorData};
