// ABOUTME: Configuration and constants for the rill runtime
// Version info, REPL banner strings, and evaluator limits

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const WELCOME_MESSAGE: &str = "rill";
pub const WELCOME_SUBTITLE: &str = "A pipeline-oriented scripting language";

/// Script closure invocations deeper than this raise a validation error
/// instead of overflowing the native stack.
pub const MAX_CALL_DEPTH: usize = 512;

/// Depth cap when rendering nested values to text. Values are trees in
/// normal usage; the cap guards against pathological host-injected graphs.
pub const MAX_RENDER_DEPTH: usize = 64;

pub const REPL_HELP: &str = r#"
Available commands:
  :help          - Show the built-in method reference
  :quit          - Exit the REPL

Type any rill expression to evaluate it. Bindings persist across inputs.
Use Ctrl-D or :quit to exit.
"#;
