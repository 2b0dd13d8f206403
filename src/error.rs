//! Centralised error hierarchy for **Stepscript**.
//!
//! The language keeps three channels apart:
//!
//! * syntax problems, collected as [`ParseError`]s (with [`ParserException`]
//!   aborting a single construct that cannot continue),
//! * runtime errors, which are ordinary `Object::Error` values and never
//!   appear here,
//! * fatal resource exhaustion, reported as [`EvalError`].
//!
//! [`LangError`] is the umbrella used by the CLI and the convenience entry
//! points in `lib.rs`. The module **does not** print diagnostics itself.

use std::fmt;
use std::io;

use log::info;
use serde::Serialize;
use thiserror::Error;

use crate::token::Token;

/// A syntax error with the position of the offending token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub token: Token,
}

impl ParseError {
    pub fn new<S: Into<String>>(message: S, token: &Token) -> Self {
        let message: String = message.into();

        info!(
            "Creating Parse error: at={}, msg={}",
            token.position, message
        );

        Self {
            message,
            line: token.line(),
            column: token.column(),
            token: token.clone(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[line {}, column {}] Error: {}",
            self.line, self.column, self.message
        )
    }
}

impl std::error::Error for ParseError {}

/// Unrecoverable grammar violation: aborts the construct being parsed.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ParserException {
    pub message: String,
    pub token: Token,
}

impl ParserException {
    pub fn new<S: Into<String>>(message: S, token: &Token) -> Self {
        Self {
            message: message.into(),
            token: token.clone(),
        }
    }
}

impl From<ParserException> for ParseError {
    fn from(e: ParserException) -> Self {
        ParseError::new(e.message, &e.token)
    }
}

/// Fatal evaluation failure. Terminates the run instead of becoming a value.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[non_exhaustive]
pub enum EvalError {
    #[error("stack overflow: maximum call depth of {limit} exceeded")]
    StackOverflow { limit: usize },
}

/// Canonical error type used at the crate boundary.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LangError {
    /// One or more syntax errors; each is listed with its position.
    #[error("{}", render_parse_errors(.0))]
    Parse(Vec<ParseError>),

    /// A program finished with a runtime `Error` value.
    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error(transparent)]
    Fatal(#[from] EvalError),

    /// Wrapper around `std::io::Error` (transparent). Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// UTF‑8 decoding failure when ingesting external text.
    #[error(transparent)]
    Utf8(#[from] std::str::Utf8Error),
}

fn render_parse_errors(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, LangError>;
