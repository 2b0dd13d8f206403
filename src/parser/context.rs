use log::debug;

use crate::error::{ParseError, ParserException};
use crate::token::Token;

/// Collects recoverable syntax errors; parsing continues after each report.
#[derive(Debug, Default)]
pub struct ErrorReporter {
    errors: Vec<ParseError>,
}

impl ErrorReporter {
    pub fn report<S: Into<String>>(&mut self, message: S, token: &Token) {
        let error = ParseError::new(message, token);
        debug!("Recorded parse error: {}", error);
        self.errors.push(error);
    }

    /// Record an exception caught at a statement boundary.
    pub fn report_exception(&mut self, exception: ParserException) {
        self.errors.push(exception.into());
    }

    pub fn extend(&mut self, errors: Vec<ParseError>) {
        self.errors.extend(errors);
    }

    pub fn into_errors(self) -> Vec<ParseError> {
        self.errors
    }
}

/// Parse state shared by the statement and expression parsers.
#[derive(Debug, Default)]
pub struct ParsingContext {
    loop_depth: usize,
}

impl ParsingContext {
    pub fn enter_loop(&mut self) {
        self.loop_depth += 1;
    }

    pub fn exit_loop(&mut self) {
        self.loop_depth = self.loop_depth.saturating_sub(1);
    }

    pub fn in_loop(&self) -> bool {
        self.loop_depth > 0
    }

    /// Loops do not extend into function bodies: `break` inside a closure
    /// defined in a loop is still an error. Returns the saved depth.
    pub fn enter_function(&mut self) -> usize {
        std::mem::take(&mut self.loop_depth)
    }

    pub fn exit_function(&mut self, saved: usize) {
        self.loop_depth = saved;
    }
}
