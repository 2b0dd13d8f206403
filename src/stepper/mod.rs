/*!
Stepwise evaluator.

The evaluator is an explicit work-list machine: a stack of [`Work`] units
(task, scope, node path, depth) plus an operand stack. Each call to
[`StepEvaluator::next_step`] runs tasks until exactly one new
[`EvaluationStep`] is recorded. Every node produces a `before` step on
entry and an `after` step carrying its result; `during` steps mark block
scope entry, branch selection, loop conditions, call entry and operator
application.

History is append-only. A cursor selects the step being shown:
[`previous_step`](StepEvaluator::previous_step) only moves the cursor, and
[`next_step`](StepEvaluator::next_step) replays recorded steps until the
cursor is back at the frontier. Replaying never re-runs a task, so side
effects and output entries are produced once.

Program semantics are shared with the direct evaluator through `ops` and
`builtins`, and both emit the same output events in the same order.
*/

mod machine;
mod state;
mod task;

pub use state::{CallFrame, EvaluationStep, ExecutionState, NodeRef, OutputView, StepType};

use std::rc::Rc;

use log::{debug, info};

use crate::ast::Program;
use crate::config::InterpreterConfig;
use crate::environment::{Env, Environment};
use crate::error::EvalError;
use crate::object::Object;
use crate::output::OutputEvent;

use state::{CallChain, OutputLog, Recorded};
use task::{Source, Task, Work};

pub struct StepEvaluator {
    config: InterpreterConfig,
    work: Vec<Work>,
    values: Vec<Object>,
    call_stack: CallChain,
    output: OutputLog,
    history: Vec<Recorded>,
    cursor: usize,
    finished: bool,
    result: Option<Object>,
    fatal: Option<EvalError>,
}

impl Default for StepEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl StepEvaluator {
    pub fn new() -> Self {
        Self::with_config(InterpreterConfig::default())
    }

    pub fn with_config(config: InterpreterConfig) -> Self {
        info!(
            "Step evaluator created (max call depth {})",
            config.max_call_depth
        );

        Self {
            config,
            work: Vec::new(),
            values: Vec::new(),
            call_stack: CallChain::default(),
            output: OutputLog::default(),
            history: Vec::new(),
            cursor: 0,
            finished: false,
            result: None,
            fatal: None,
        }
    }

    /// Reset all state and seed the "program started" step in a fresh
    /// global environment.
    pub fn prepare(&mut self, program: &Program) {
        self.prepare_in(program, Environment::global());
    }

    /// Like [`prepare`](Self::prepare) but evaluates in `env`.
    pub fn prepare_in(&mut self, program: &Program, env: Env) {
        info!(
            "Preparing stepped run of {} statements",
            program.statements.len()
        );

        self.work.clear();
        self.values.clear();
        // Views handed out for the previous run keep the old log.
        self.call_stack = CallChain::default();
        self.output = OutputLog::default();
        self.history.clear();
        self.cursor = 0;
        self.finished = false;
        self.result = None;
        self.fatal = None;

        let program = Rc::new(program.clone());
        let root = NodeRef::Program(Rc::clone(&program));
        let path = "program".to_owned();

        self.work.push(Work {
            task: Task::FinishProgram(Rc::clone(&program)),
            env: Rc::clone(&env),
            path: path.clone(),
            depth: 0,
        });
        self.work.push(Work {
            task: Task::Sequence {
                source: Source::Program(program),
                index: 0,
            },
            env: Rc::clone(&env),
            path: path.clone(),
            depth: 0,
        });

        self.record(
            &root,
            StepType::Before,
            "Program started".to_owned(),
            &env,
            None,
            &path,
            0,
        );
    }

    /// Advance one step: replay from history when the cursor is behind the
    /// frontier, otherwise execute until a new step is recorded.
    pub fn next_step(&mut self) -> Result<ExecutionState, EvalError> {
        if self.history.is_empty() {
            return Ok(self.state());
        }

        if self.cursor + 1 < self.history.len() {
            self.cursor += 1;
            debug!("Replaying step {}", self.cursor + 1);
            return Ok(self.state());
        }

        if self.finished {
            return Ok(self.state());
        }

        let before = self.history.len();
        self.execute_while(|stepper| stepper.history.len() == before)?;

        Ok(self.state())
    }

    /// Move the cursor back one step; `None` at the first step.
    pub fn previous_step(&mut self) -> Option<ExecutionState> {
        if self.cursor == 0 {
            return None;
        }

        self.cursor -= 1;
        debug!("Rewound to step {}", self.cursor + 1);
        Some(self.state())
    }

    /// Run until the program completes and select the final step. Only the
    /// final state is built.
    pub fn run_to_end(&mut self) -> Result<ExecutionState, EvalError> {
        if !self.history.is_empty() {
            self.execute_while(|stepper| !stepper.finished)?;
        }

        Ok(self.state())
    }

    /// Run tasks while `more` holds, then move the cursor to the frontier.
    fn execute_while(&mut self, more: impl Fn(&Self) -> bool) -> Result<(), EvalError> {
        while more(&*self) {
            let Some(work) = self.work.pop() else {
                break;
            };

            if let Err(e) = self.run(work) {
                self.cursor = self.history.len() - 1;
                return Err(e);
            }
        }

        self.cursor = self.history.len() - 1;
        Ok(())
    }

    /// The state at the cursor.
    pub fn state(&self) -> ExecutionState {
        match self.history.get(self.cursor) {
            None => ExecutionState::default(),

            Some(recorded) => ExecutionState {
                current_step: Some(recorded.step.clone()),
                call_stack: recorded.call_stack.frames(),
                output: self.output.view(recorded.output_len),
                is_complete: recorded.complete,
                current_step_number: recorded.step.number,
            },
        }
    }

    /// Final program value once execution has finished.
    pub fn result(&self) -> Option<&Object> {
        self.result.as_ref()
    }

    /// The fatal error that ended execution, if any.
    pub fn fatal_error(&self) -> Option<&EvalError> {
        self.fatal.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Steps recorded so far.
    pub fn step_count(&self) -> usize {
        self.history.len()
    }

    /// Every output event produced so far, regardless of the cursor.
    pub fn events(&self) -> Vec<OutputEvent> {
        self.output.events()
    }
}
