//! Work-list units of the stepwise evaluator.
//!
//! Each [`Task`] is a continuation: running it may push more work, push or
//! pop operands on the value stack and record at most one step.

use std::rc::Rc;

use crate::ast::{
    BlockStatement, ClassStatement, Expression, FStringPart, Identifier, InfixOp, PrefixOp,
    Program, Statement,
};
use crate::environment::Env;
use crate::object::Object;

use super::state::NodeRef;

/// A task together with the scope it runs in and where it sits in the tree.
pub(crate) struct Work {
    pub task: Task,
    pub env: Env,
    pub path: String,
    pub depth: usize,
}

/// Statement list run by [`Task::Sequence`].
#[derive(Clone)]
pub(crate) enum Source {
    Program(Rc<Program>),
    Block(Rc<BlockStatement>),
}

impl Source {
    pub fn statements(&self) -> &[Rc<Statement>] {
        match self {
            Source::Program(program) => &program.statements,
            Source::Block(block) => &block.statements,
        }
    }
}

/// What a [`Task::Gather`] does with its collected operands.
pub(crate) enum Then {
    Array,
    Hash,
    FString(Vec<FStringPart>),
    Index,
    MemberAssign(Identifier),
    Call(Rc<Expression>),
    New(Rc<Expression>),
}

pub(crate) enum Task {
    /// Record `before`, then schedule the node's own tasks and its `Exit`.
    Enter(NodeRef),
    /// Record `after` with the value on top of the stack.
    Exit(NodeRef),

    /// Run `source` from `index`, stopping at the first control object.
    Sequence {
        source: Source,
        index: usize,
    },
    /// Open a block scope and run the block in it.
    OpenScope(Rc<BlockStatement>),

    BindName {
        name: Identifier,
        constant: bool,
        has_value: bool,
    },
    WrapReturn {
        has_value: bool,
    },

    LoopCheck(Rc<Statement>),
    LoopDecide(Rc<Statement>),
    LoopAfterBody(Rc<Statement>),

    OpenLoopScope(Rc<Statement>),
    ForAfterInit(Rc<Statement>),
    ForCheck(Rc<Statement>),
    ForDecide(Rc<Statement>),
    ForAfterBody(Rc<Statement>),
    ForAfterUpdate(Rc<Statement>),

    ApplyPrefix {
        node: Rc<Expression>,
        operator: PrefixOp,
    },
    InfixRight {
        node: Rc<Expression>,
        operator: InfixOp,
        right: Rc<Expression>,
    },
    ApplyInfix {
        node: Rc<Expression>,
        operator: InfixOp,
        left: Object,
    },

    AssignName(String),
    GetMember(String),

    /// Evaluate `exprs` left to right, then hand the values to `then`.
    Gather {
        exprs: Vec<(Rc<Expression>, String)>,
        index: usize,
        collected: Vec<Object>,
        then: Then,
    },

    IfDecide {
        node: Rc<Expression>,
        index: usize,
    },

    DefineClass {
        class: Rc<ClassStatement>,
        has_superclass: bool,
    },
    FinishConstruct(Object),

    /// Unwind a user call: unwrap the return value and pop the frame.
    FinishCall(String),

    FinishProgram(Rc<Program>),
}
