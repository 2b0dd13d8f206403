//! Serializable views of a stepped execution.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Serialize, Serializer};

use crate::ast::{BlockStatement, Expression, Program, Statement};
use crate::environment::EnvironmentSnapshot;
use crate::object::Object;
use crate::output::{OutputEntry, OutputEvent};
use crate::token::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    Before,
    During,
    After,
}

/// Handle on the AST node a step is about.
#[derive(Debug, Clone)]
pub enum NodeRef {
    Program(Rc<Program>),
    Statement(Rc<Statement>),
    Expression(Rc<Expression>),
    Block(Rc<BlockStatement>),
}

impl NodeRef {
    pub fn kind_name(&self) -> &'static str {
        match self {
            NodeRef::Program(_) => "Program",
            NodeRef::Statement(statement) => statement.kind_name(),
            NodeRef::Expression(expression) => expression.kind_name(),
            NodeRef::Block(_) => "BlockStatement",
        }
    }

    pub fn position(&self) -> Position {
        match self {
            NodeRef::Program(program) => program.position(),
            NodeRef::Statement(statement) => statement.position(),
            NodeRef::Expression(expression) => expression.position(),
            NodeRef::Block(block) => block.span.start,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationStep {
    pub number: usize,
    #[serde(skip)]
    pub node: NodeRef,
    pub node_kind: &'static str,
    pub description: String,
    pub environment: EnvironmentSnapshot,
    pub result: Option<Object>,
    pub line: usize,
    pub column: usize,
    pub depth: usize,
    pub node_path: String,
    pub step_type: StepType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallFrame {
    pub function_name: String,
    pub arguments: Vec<String>,
    pub line: usize,
    pub column: usize,
    /// Only the innermost frame is active.
    pub active: bool,
}

/// Everything a visualizer needs to render the selected step.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionState {
    pub current_step: Option<EvaluationStep>,
    pub call_stack: Vec<CallFrame>,
    pub output: OutputView,
    pub is_complete: bool,
    pub current_step_number: usize,
}

/// One entry of the append-only history.
#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub step: EvaluationStep,
    pub call_stack: CallChain,
    /// Output entries visible at this step.
    pub output_len: usize,
    pub complete: bool,
}

/// Call stack as a persistent list. Pushing and popping are O(1) and every
/// recorded step shares the frames beneath its innermost call.
#[derive(Debug, Clone, Default)]
pub(crate) struct CallChain {
    top: Option<Rc<Link>>,
    len: usize,
}

#[derive(Debug)]
struct Link {
    frame: CallFrame,
    below: Option<Rc<Link>>,
}

impl CallChain {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn push(&mut self, frame: CallFrame) {
        let below = self.top.take();
        self.top = Some(Rc::new(Link { frame, below }));
        self.len += 1;
    }

    pub fn pop(&mut self) {
        if let Some(top) = self.top.take() {
            self.top = top.below.clone();
            self.len -= 1;
        }
    }

    /// Outermost frame first; only the innermost frame is active.
    pub fn frames(&self) -> Vec<CallFrame> {
        let mut frames = Vec::with_capacity(self.len);
        let mut link = self.top.as_deref();

        while let Some(current) = link {
            frames.push(CallFrame {
                active: frames.is_empty(),
                ..current.frame.clone()
            });
            link = current.below.as_deref();
        }

        frames.reverse();
        frames
    }
}

impl Drop for CallChain {
    // Unlink iteratively so dropping a deep chain does not recurse.
    fn drop(&mut self) {
        let mut link = self.top.take();

        while let Some(current) = link {
            match Rc::try_unwrap(current) {
                Ok(mut unique) => link = unique.below.take(),
                Err(_) => break,
            }
        }
    }
}

/// Append-only output log. The evaluator appends to it and every
/// [`OutputView`] taken from it reads a prefix of the same storage.
#[derive(Debug, Clone, Default)]
pub(crate) struct OutputLog {
    entries: Rc<RefCell<Vec<OutputEntry>>>,
}

impl OutputLog {
    pub fn push(&self, entry: OutputEntry) {
        self.entries.borrow_mut().push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn events(&self) -> Vec<OutputEvent> {
        self.entries.borrow().iter().map(OutputEntry::event).collect()
    }

    /// The first `len` entries.
    pub fn view(&self, len: usize) -> OutputView {
        OutputView {
            entries: Rc::clone(&self.entries),
            len,
        }
    }
}

/// Output entries visible at one step. Cloning a view never copies entries.
#[derive(Clone, Default)]
pub struct OutputView {
    entries: Rc<RefCell<Vec<OutputEntry>>>,
    len: usize,
}

impl OutputView {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy of the visible entries.
    pub fn entries(&self) -> Vec<OutputEntry> {
        self.entries.borrow()[..self.len].to_vec()
    }

    pub fn last(&self) -> Option<OutputEntry> {
        let index = self.len.checked_sub(1)?;
        self.entries.borrow().get(index).cloned()
    }
}

impl fmt::Debug for OutputView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.borrow()[..self.len].iter())
            .finish()
    }
}

impl Serialize for OutputView {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries.borrow()[..self.len].iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(name: &str) -> CallFrame {
        CallFrame {
            function_name: name.to_owned(),
            arguments: Vec::new(),
            line: 1,
            column: 1,
            active: true,
        }
    }

    #[test]
    fn only_innermost_frame_is_active() {
        let mut chain = CallChain::default();
        chain.push(frame("outer"));
        chain.push(frame("inner"));

        let frames = chain.frames();
        let names: Vec<&str> = frames.iter().map(|f| f.function_name.as_str()).collect();
        assert_eq!(names, vec!["outer", "inner"]);
        assert!(!frames[0].active);
        assert!(frames[1].active);

        chain.pop();
        assert_eq!(chain.len(), 1);
        assert!(chain.frames()[0].active);
    }

    #[test]
    fn clones_share_frames_below_the_top() {
        let mut chain = CallChain::default();
        chain.push(frame("a"));
        let saved = chain.clone();

        chain.push(frame("b"));
        chain.pop();
        chain.pop();

        assert_eq!(chain.len(), 0);
        assert_eq!(saved.frames(), vec![frame("a")]);
    }

    #[test]
    fn deep_chain_drops_without_recursing() {
        let mut chain = CallChain::default();
        for _ in 0..200_000 {
            chain.push(frame("f"));
        }
        assert_eq!(chain.len(), 200_000);
        drop(chain);
    }
}
