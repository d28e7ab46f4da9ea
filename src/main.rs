// ABOUTME: rill CLI: run scripts, evaluate one-liners, or start the REPL

use clap::Parser;
use rill::config;
use rill::highlighter::RillHelper;
use rill::{execute, parse, RillError, RuntimeContext, Session, Value};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use std::path::PathBuf;
use std::process::ExitCode;

/// Pipeline-oriented scripting language runner
#[derive(Parser, Debug)]
#[command(name = "rill")]
#[command(version = config::VERSION)]
#[command(about = "A pipeline-oriented scripting language")]
struct CliArgs {
    /// Script file to execute (starts a REPL when omitted)
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,

    /// Evaluate an expression instead of a file
    #[arg(short = 'e', long = "eval", value_name = "EXPR")]
    eval: Option<String>,

    /// Seed an initial string variable (NAME=VALUE, repeatable)
    #[arg(long = "var", value_name = "NAME=VALUE", action = clap::ArgAction::Append)]
    vars: Vec<String>,

    /// Print the result as JSON
    #[arg(long = "json")]
    json: bool,

    /// Print the parsed AST instead of executing
    #[arg(long = "ast")]
    ast: bool,

    /// Show full error details on failure
    #[arg(long = "trace")]
    trace: bool,
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let source = if let Some(expr) = &args.eval {
        expr.clone()
    } else if let Some(path) = &args.script {
        match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                eprintln!("Error: cannot read {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        return repl(&args);
    };

    match run_source(&source, &args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err.message);
            if args.trace {
                eprintln!("{:#?}", err);
            }
            ExitCode::FAILURE
        }
    }
}

fn build_context(args: &CliArgs) -> Result<RuntimeContext, RillError> {
    let mut builder = RuntimeContext::builder()
        .on_log(|value| match value.render() {
            Ok(text) => eprintln!("{}", text),
            Err(_) => eprintln!("{}", value),
        });
    for var in &args.vars {
        let Some((name, value)) = var.split_once('=') else {
            return Err(RillError::validation(format!(
                "--var expects NAME=VALUE, got '{}'",
                var
            )));
        };
        builder = builder.variable(name, Value::str(value));
    }
    Ok(builder.build())
}

fn run_source(source: &str, args: &CliArgs) -> Result<(), RillError> {
    let program = parse(source)?;
    if args.ast {
        println!("{:#?}", program);
        return Ok(());
    }
    let ctx = build_context(args)?;
    let result = execute(&program, &ctx)?;
    if args.json {
        let json = rill::value::to_json(&result.value)?;
        println!("{}", json);
    } else {
        println!("{}", result.value.render()?);
    }
    Ok(())
}

fn repl(args: &CliArgs) -> ExitCode {
    println!("{} v{}", config::WELCOME_MESSAGE, config::VERSION);
    println!("{}", config::WELCOME_SUBTITLE);
    println!("Type :help for the method reference, :quit to exit.");

    let mut rl: Editor<RillHelper, DefaultHistory> = match Editor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("Error: cannot start line editor: {}", e);
            return ExitCode::FAILURE;
        }
    };
    rl.set_helper(Some(RillHelper));

    let ctx = match build_context(args) {
        Ok(ctx) => ctx,
        Err(err) => {
            eprintln!("Error: {}", err.message);
            return ExitCode::FAILURE;
        }
    };
    let session = Session::new(ctx);
    let skin = termimad::MadSkin::default();

    loop {
        match rl.readline("rill> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(trimmed);
                match trimmed {
                    ":quit" | ":exit" => break,
                    ":help" => {
                        skin.print_text(&rill::help::reference_markdown());
                        println!("{}", config::REPL_HELP);
                        continue;
                    }
                    _ => {}
                }
                match session.eval(trimmed) {
                    Ok(value) => println!("{}", value),
                    Err(err) => {
                        eprintln!("Error: {}", err.message);
                        if args.trace {
                            eprintln!("{:#?}", err);
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}
