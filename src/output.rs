//! Program output events.
//!
//! Both evaluators report what a program does through an [`OutputSink`]:
//! console output from `print`, bindings, operator applications, branch
//! decisions, function returns and a runtime error reaching the top level.
//! The message helpers at the bottom are the single source of every event
//! text so the two evaluators cannot drift apart.

use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;

use crate::ast::InfixOp;
use crate::object::Object;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Console output produced by `print`.
    Log,
    Binding,
    Operation,
    Branch,
    Return,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputEvent {
    pub kind: OutputKind,
    pub message: String,
}

/// A logged event stamped with the step that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputEntry {
    pub step: usize,
    pub timestamp: DateTime<Utc>,
    pub kind: OutputKind,
    pub message: String,
}

impl OutputEntry {
    pub fn event(&self) -> OutputEvent {
        OutputEvent {
            kind: self.kind,
            message: self.message.clone(),
        }
    }
}

pub trait OutputSink {
    fn emit(&mut self, kind: OutputKind, message: String);
}

impl OutputSink for Vec<OutputEvent> {
    fn emit(&mut self, kind: OutputKind, message: String) {
        self.push(OutputEvent { kind, message });
    }
}

/// Prints console output to stdout; every other event goes to the log.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn emit(&mut self, kind: OutputKind, message: String) {
        match kind {
            OutputKind::Log => println!("{}", message),
            _ => debug!("[{:?}] {}", kind, message),
        }
    }
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn emit(&mut self, _kind: OutputKind, _message: String) {}
}

// ─────────────────────────────────────────────────────────────────────────────
// Event messages
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn declared(name: &str, value: &Object, constant: bool) -> String {
    let keyword = if constant { "const" } else { "let" };
    format!("{} {} = {}", keyword, name, value.inspect())
}

pub(crate) fn assigned(target: &str, value: &Object) -> String {
    format!("{} = {}", target, value.inspect())
}

pub(crate) fn member_assigned(object: &Object, property: &str, value: &Object) -> String {
    format!("{}.{} = {}", object.inspect(), property, value.inspect())
}

pub(crate) fn class_defined(name: &str) -> String {
    format!("class {} defined", name)
}

pub(crate) fn operation(
    left: &Object,
    operator: InfixOp,
    right: &Object,
    result: &Object,
) -> String {
    format!(
        "{} {} {} => {}",
        left.inspect(),
        operator,
        right.inspect(),
        result.inspect()
    )
}

/// `index` is the taken `if`/`elif` arm, `None` for `else`.
pub(crate) fn branch(index: Option<usize>) -> String {
    match index {
        Some(0) => "if branch taken".to_owned(),
        Some(i) => format!("elif branch {} taken", i),
        None => "else branch taken".to_owned(),
    }
}

pub(crate) fn returned(function: &str, value: &Object) -> String {
    format!("{} returned {}", function, value.inspect())
}
