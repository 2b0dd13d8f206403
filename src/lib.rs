//! Stepscript: a small dynamically typed language with a direct
//! tree-walking evaluator and a steppable evaluator that records every
//! intermediate step for visualizers.

pub mod ast;
pub mod ast_printer;
pub mod builtins;
pub mod config;
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod object;
pub mod output;
pub mod parser;
pub mod scanner;
pub mod stepper;
pub mod token;

mod ops;

pub use config::InterpreterConfig;
pub use environment::Environment;
pub use evaluator::{evaluate, Evaluator};
pub use parser::parse_program;
pub use scanner::tokenize;
pub use stepper::{ExecutionState, StepEvaluator};

use std::fs::File;
use std::path::Path;

use log::info;
use memmap2::Mmap;

use crate::error::{LangError, Result};
use crate::object::Object;
use crate::output::OutputSink;

/// Parse and evaluate `source` in a fresh global environment.
///
/// Syntax errors and a runtime `Error` result are both turned into a
/// [`LangError`]; any other final value is returned with `return` unwrapped.
pub fn run_source(
    source: &str,
    sink: &mut dyn OutputSink,
    config: InterpreterConfig,
) -> Result<Object> {
    let parsed = parse_program(source);

    if !parsed.is_ok() {
        return Err(LangError::Parse(parsed.errors));
    }

    let env = Environment::global();
    let value = Evaluator::with_config(sink, config).evaluate(&parsed.program, &env)?;

    info!("Program finished with {}", value.object_type());

    match value {
        Object::Error(message) => Err(LangError::Runtime(message)),
        value => Ok(value),
    }
}

/// Map a source file and check that it is valid UTF-8.
pub fn read_source(path: &Path) -> Result<String> {
    info!("Reading file: {:?}", path);
    let file = File::open(path)?;

    // SAFETY: the mapping is read-only and dropped before this function returns.
    let map = unsafe { Mmap::map(&file) }?;
    let source = std::str::from_utf8(&map)?.to_owned();

    info!("Read {} bytes from {:?}", source.len(), path);

    Ok(source)
}
