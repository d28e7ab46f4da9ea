// ABOUTME: Structured error type with stable error ids and source locations

use crate::ast::SourceLocation;
use crate::value::Value;
use indexmap::IndexMap;
use thiserror::Error;

/// Stable error ids. The `RILL-P###` family belongs to the parser, the
/// `RILL-R###` family to the runtime. Ids `RILL-R017` and above are reserved
/// for host extensions and never produced here.
pub mod codes {
    pub const UNEXPECTED_TOKEN: &str = "RILL-P001";
    pub const UNEXPECTED_EOF: &str = "RILL-P002";
    pub const RESERVED_WORD: &str = "RILL-P003";
    pub const WRONG_LITERAL: &str = "RILL-P004";
    pub const BAD_ASSIGN_TARGET: &str = "RILL-P005";
    pub const STRAY_LOOP_CONTROL: &str = "RILL-P006";
    pub const UNTERMINATED_STRING: &str = "RILL-P007";
    pub const BAD_INTERPOLATION: &str = "RILL-P008";

    pub const GENERIC: &str = "RILL-R001";
    pub const TYPE_ERROR: &str = "RILL-R002";
    pub const VALIDATION: &str = "RILL-R004";
    pub const UNDEFINED_VARIABLE: &str = "RILL-R005";
    pub const PROPERTY_NOT_FOUND: &str = "RILL-R006";
    pub const INDEX_OUT_OF_BOUNDS: &str = "RILL-R007";
    pub const SCRIPT_ERROR: &str = "RILL-R016";
}

/// Every failure surfaced by the parser or the evaluator: a stable id, a
/// human message, the source location of the offending expression, and an
/// optional free-form context dict.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct RillError {
    pub error_id: &'static str,
    pub message: String,
    pub location: Option<SourceLocation>,
    pub context: Option<IndexMap<String, Value>>,
}

impl RillError {
    pub fn new(error_id: &'static str, message: impl Into<String>) -> Self {
        RillError {
            error_id,
            message: message.into(),
            location: None,
            context: None,
        }
    }

    /// Parse-family error pinned to the offending token.
    pub fn parse(
        error_id: &'static str,
        message: impl Into<String>,
        location: SourceLocation,
    ) -> Self {
        RillError {
            error_id,
            message: message.into(),
            location: Some(location),
            context: None,
        }
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(codes::GENERIC, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(codes::TYPE_ERROR, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(codes::VALIDATION, message)
    }

    pub fn undefined_variable(name: &str) -> Self {
        Self::new(
            codes::UNDEFINED_VARIABLE,
            format!("Variable '{}' not defined", name),
        )
    }

    pub fn property_not_found(key: &str) -> Self {
        Self::new(
            codes::PROPERTY_NOT_FOUND,
            format!("property '{}' not found", key),
        )
    }

    pub fn index_out_of_bounds(index: i64, len: usize) -> Self {
        Self::new(
            codes::INDEX_OUT_OF_BOUNDS,
            format!("index {} out of bounds for list of length {}", index, len),
        )
        .with_context("size", Value::Number(len as f64))
    }

    /// Error raised by the script itself via `error "..."`.
    pub fn script_error(message: impl Into<String>) -> Self {
        Self::new(codes::SCRIPT_ERROR, message)
    }

    /// Method arity mismatch, message shape fixed by the external contract.
    pub fn arity_error(method: &str, expected: usize, got: usize) -> Self {
        Self::type_error(format!(
            "{}() expects {} argument(s), got {}",
            method, expected, got
        ))
    }

    /// Method receiver mismatch, message shape fixed by the external contract.
    pub fn receiver_error(method: &str, expected: &str, actual: &str) -> Self {
        Self::type_error(format!(
            "{}() requires {} receiver, got {}",
            method, expected, actual
        ))
    }

    /// Attach a location unless one is already present. Errors keep the
    /// innermost location they were raised with.
    pub fn with_location(mut self, location: SourceLocation) -> Self {
        if self.location.is_none() {
            self.location = Some(location);
        }
        self
    }

    pub fn with_context(mut self, key: &str, value: Value) -> Self {
        self.context
            .get_or_insert_with(IndexMap::new)
            .insert(key.to_string(), value);
        self
    }

    /// Whether `??` may swallow this error: only missing-key and
    /// out-of-bounds lookups are recoverable.
    pub fn is_recoverable(&self) -> bool {
        self.error_id == codes::PROPERTY_NOT_FOUND || self.error_id == codes::INDEX_OUT_OF_BOUNDS
    }

    pub fn is_parse_error(&self) -> bool {
        self.error_id.starts_with("RILL-P")
    }
}
