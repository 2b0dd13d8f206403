//! Direct tree-walking evaluator.
//!
//! Runtime errors are ordinary [`Object::Error`] values that unwind like a
//! `return`; only exceeding the call-depth ceiling aborts with an
//! [`EvalError`]. Recursion grows the native stack on demand, so the
//! configured ceiling is what limits programs, not the host thread.

use std::rc::Rc;

use log::{debug, info};

use crate::ast::{
    BlockStatement, ClassStatement, ExprKind, Expression, FStringPart, Identifier, Literal,
    Program, Statement, StmtKind,
};
use crate::config::InterpreterConfig;
use crate::environment::{Env, Environment, ScopeKind};
use crate::error::EvalError;
use crate::object::{Function, Object};
use crate::ops::{self, CallPlan};
use crate::output::{self, ConsoleSink, OutputKind, OutputSink};

/// Minimum stack space to keep available before descending.
const STACK_RED_ZONE: usize = 128 * 1024;

/// Stack space to allocate when growing.
const STACK_GROWTH: usize = 2 * 1024 * 1024;

type EvalResult = Result<Object, EvalError>;

/// Evaluate `$e`; return early if it produced a control object.
macro_rules! value {
    ($e:expr) => {{
        let value = $e?;
        if value.is_control() {
            return Ok(value);
        }
        value
    }};
}

/// Evaluate `program` in `env`, printing console output to stdout.
pub fn evaluate(program: &Program, env: &Env) -> EvalResult {
    let mut sink = ConsoleSink;
    Evaluator::new(&mut sink).evaluate(program, env)
}

pub struct Evaluator<'s> {
    sink: &'s mut dyn OutputSink,
    config: InterpreterConfig,
    depth: usize,
}

impl<'s> Evaluator<'s> {
    pub fn new(sink: &'s mut dyn OutputSink) -> Self {
        Self::with_config(sink, InterpreterConfig::default())
    }

    pub fn with_config(sink: &'s mut dyn OutputSink, config: InterpreterConfig) -> Self {
        info!(
            "Evaluator created (max call depth {})",
            config.max_call_depth
        );

        Self {
            sink,
            config,
            depth: 0,
        }
    }

    /// Run a whole program. The result is the last statement's value with
    /// any `return` unwrapped.
    pub fn evaluate(&mut self, program: &Program, env: &Env) -> EvalResult {
        info!(
            "Evaluating program with {} statements",
            program.statements.len()
        );

        self.depth = 0;
        let result = self.eval_sequence(&program.statements, env)?.unwrap_return();

        if let Object::Error(message) = &result {
            self.sink.emit(OutputKind::Error, message.clone());
        }

        info!("Program evaluated to {}", result.inspect());
        Ok(result)
    }

    /// Statements in order; stops at the first control object.
    fn eval_sequence(&mut self, statements: &[Rc<Statement>], env: &Env) -> EvalResult {
        let mut result = Object::Null;

        for statement in statements {
            result = self.eval_statement(statement, env)?;

            if result.is_control() {
                break;
            }
        }

        Ok(result)
    }

    fn eval_block(&mut self, block: &BlockStatement, env: &Env) -> EvalResult {
        let scope = Environment::with_enclosing(env, ScopeKind::Block);
        self.eval_sequence(&block.statements, &scope)
    }

    fn eval_statement(&mut self, statement: &Statement, env: &Env) -> EvalResult {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || {
            debug!(
                "Evaluating {} at {}",
                statement.kind_name(),
                statement.position()
            );

            match &statement.kind {
                StmtKind::Let { name, value } => {
                    let value = match value {
                        Some(expression) => value!(self.eval_expression(expression, env)),
                        None => Object::Null,
                    };
                    Ok(self.declare(env, name, value, false))
                }

                StmtKind::Const { name, value } => {
                    let value = value!(self.eval_expression(value, env));
                    Ok(self.declare(env, name, value, true))
                }

                StmtKind::Return { value } => {
                    let value = match value {
                        Some(expression) => value!(self.eval_expression(expression, env)),
                        None => Object::Null,
                    };
                    Ok(Object::ReturnValue(Box::new(value)))
                }

                StmtKind::Expression { expression } => self.eval_expression(expression, env),

                StmtKind::Block(block) => self.eval_block(block, env),

                StmtKind::While { condition, body } => self.eval_while(condition, body, env),

                StmtKind::For {
                    init,
                    condition,
                    update,
                    body,
                } => self.eval_for(
                    init.as_deref(),
                    condition.as_deref(),
                    update.as_deref(),
                    body,
                    env,
                ),

                StmtKind::Break => Ok(Object::Break),

                StmtKind::Continue => Ok(Object::Continue),

                StmtKind::Class(class) => self.eval_class(class, env),
            }
        })
    }

    fn declare(&mut self, env: &Env, name: &Identifier, value: Object, constant: bool) -> Object {
        let message = output::declared(&name.name, &value, constant);

        match env.borrow_mut().declare(&name.name, value, constant) {
            Ok(()) => {
                self.sink.emit(OutputKind::Binding, message);
                Object::Null
            }
            Err(e) => Object::error(e.to_string()),
        }
    }

    fn eval_while(
        &mut self,
        condition: &Expression,
        body: &BlockStatement,
        env: &Env,
    ) -> EvalResult {
        loop {
            let test = value!(self.eval_expression(condition, env));

            if !test.is_truthy() {
                break;
            }

            match self.eval_block(body, env)? {
                Object::Break => break,
                signal @ (Object::ReturnValue(_) | Object::Error(_)) => return Ok(signal),
                _ => {}
            }
        }

        Ok(Object::Null)
    }

    /// The header lives in its own scope; each iteration's body gets a fresh
    /// block scope inside it.
    fn eval_for(
        &mut self,
        init: Option<&Statement>,
        condition: Option<&Expression>,
        update: Option<&Expression>,
        body: &BlockStatement,
        env: &Env,
    ) -> EvalResult {
        let scope = Environment::with_enclosing(env, ScopeKind::Block);

        if let Some(init) = init {
            value!(self.eval_statement(init, &scope));
        }

        loop {
            if let Some(condition) = condition {
                let test = value!(self.eval_expression(condition, &scope));

                if !test.is_truthy() {
                    break;
                }
            }

            match self.eval_block(body, &scope)? {
                Object::Break => break,
                signal @ (Object::ReturnValue(_) | Object::Error(_)) => return Ok(signal),
                _ => {}
            }

            if let Some(update) = update {
                value!(self.eval_expression(update, &scope));
            }
        }

        Ok(Object::Null)
    }

    fn eval_class(&mut self, class: &ClassStatement, env: &Env) -> EvalResult {
        let superclass = match &class.superclass {
            Some(expression) => Some(value!(self.eval_expression(expression, env))),
            None => None,
        };

        let defined = match ops::define_class(class, superclass, env) {
            Ok(defined) => defined,
            Err(error) => return Ok(error),
        };

        let declared = env
            .borrow_mut()
            .declare(&class.name.name, Object::Class(defined), false);

        match declared {
            Ok(()) => {
                self.sink
                    .emit(OutputKind::Binding, output::class_defined(&class.name.name));
                Ok(Object::Null)
            }
            Err(e) => Ok(Object::error(e.to_string())),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────

    fn eval_expression(&mut self, expression: &Expression, env: &Env) -> EvalResult {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || {
            match &expression.kind {
                ExprKind::Identifier(name) => Ok(ops::resolve_identifier(env, name)),

                ExprKind::Prefix { operator, right } => {
                    let right = value!(self.eval_expression(right, env));
                    Ok(ops::apply_prefix(*operator, &right))
                }

                ExprKind::Infix {
                    left,
                    operator,
                    right,
                } => {
                    let left = value!(self.eval_expression(left, env));

                    if let Some(result) = ops::short_circuit(*operator, &left) {
                        return Ok(result);
                    }

                    let right = value!(self.eval_expression(right, env));
                    let result = ops::apply_infix(*operator, &left, &right);

                    if !result.is_error() {
                        self.sink.emit(
                            OutputKind::Operation,
                            output::operation(&left, *operator, &right, &result),
                        );
                    }

                    Ok(result)
                }

                ExprKind::Assign { target, value } => self.eval_assign(target, value, env),

                ExprKind::Call {
                    function,
                    arguments,
                } => {
                    let callee = value!(self.eval_expression(function, env));
                    let arguments = match self.eval_expressions(arguments, env)? {
                        Ok(arguments) => arguments,
                        Err(signal) => return Ok(signal),
                    };

                    match ops::plan_call(&callee, arguments) {
                        Ok(plan) => self.call(plan),
                        Err(error) => Ok(error),
                    }
                }

                ExprKind::If {
                    conditions,
                    consequences,
                    alternative,
                } => {
                    for (i, (condition, consequence)) in
                        conditions.iter().zip(consequences).enumerate()
                    {
                        let test = value!(self.eval_expression(condition, env));

                        if test.is_truthy() {
                            self.sink.emit(OutputKind::Branch, output::branch(Some(i)));
                            return self.eval_block(consequence, env);
                        }
                    }

                    match alternative {
                        Some(alternative) => {
                            self.sink.emit(OutputKind::Branch, output::branch(None));
                            self.eval_block(alternative, env)
                        }
                        None => Ok(Object::Null),
                    }
                }

                ExprKind::Index { left, index } => {
                    let left = value!(self.eval_expression(left, env));
                    let index = value!(self.eval_expression(index, env));
                    Ok(ops::index(&left, &index))
                }

                ExprKind::Member { object, property } => {
                    let object = value!(self.eval_expression(object, env));
                    Ok(ops::get_member(&object, &property.name))
                }

                ExprKind::New { class, arguments } => {
                    let class = value!(self.eval_expression(class, env));
                    let arguments = match self.eval_expressions(arguments, env)? {
                        Ok(arguments) => arguments,
                        Err(signal) => return Ok(signal),
                    };

                    let construction = match ops::construct(&class, arguments) {
                        Ok(construction) => construction,
                        Err(error) => return Ok(error),
                    };

                    if let Some(init) = construction.init {
                        value!(self.call(init));
                    }

                    Ok(construction.instance)
                }

                ExprKind::Super { method } => Ok(ops::resolve_super(
                    env,
                    method.as_ref().map(|m| m.name.as_str()),
                )),

                ExprKind::Literal(literal) => self.eval_literal(literal, env),
            }
        })
    }

    /// Left to right; the inner `Err` carries the first control object.
    fn eval_expressions(
        &mut self,
        expressions: &[Rc<Expression>],
        env: &Env,
    ) -> Result<Result<Vec<Object>, Object>, EvalError> {
        let mut values = Vec::with_capacity(expressions.len());

        for expression in expressions {
            let value = self.eval_expression(expression, env)?;

            if value.is_control() {
                return Ok(Err(value));
            }

            values.push(value);
        }

        Ok(Ok(values))
    }

    fn eval_assign(&mut self, target: &Expression, value: &Expression, env: &Env) -> EvalResult {
        match &target.kind {
            ExprKind::Identifier(name) => {
                let value = value!(self.eval_expression(value, env));

                if let Err(e) = env.borrow_mut().assign(name, value.clone()) {
                    return Ok(Object::error(e.to_string()));
                }

                self.sink
                    .emit(OutputKind::Binding, output::assigned(name, &value));
                Ok(value)
            }

            ExprKind::Member { object, property } => {
                let object = value!(self.eval_expression(object, env));
                let value = value!(self.eval_expression(value, env));
                let result = ops::set_member(&object, &property.name, value);

                if !result.is_error() {
                    self.sink.emit(
                        OutputKind::Binding,
                        output::member_assigned(&object, &property.name, &result),
                    );
                }

                Ok(result)
            }

            _ => Ok(Object::error("invalid assignment target")),
        }
    }

    fn eval_literal(&mut self, literal: &Literal, env: &Env) -> EvalResult {
        Ok(match literal {
            Literal::Integer(n) => Object::Integer(*n),
            Literal::Float(n) => Object::Float(*n),
            Literal::Str(s) => Object::Str(s.clone()),
            Literal::Boolean(b) => Object::Boolean(*b),
            Literal::Null => Object::Null,

            Literal::FString(parts) => {
                let mut text = String::new();

                for part in parts {
                    match part {
                        FStringPart::Text(s) => text.push_str(s),
                        FStringPart::Expr(expression) => {
                            let value = value!(self.eval_expression(expression, env));
                            text.push_str(&value.inspect());
                        }
                    }
                }

                Object::Str(text)
            }

            Literal::Array(elements) => match self.eval_expressions(elements, env)? {
                Ok(elements) => Object::Array(Rc::new(elements)),
                Err(signal) => signal,
            },

            Literal::Hash(pairs) => {
                let flat: Vec<Rc<Expression>> = pairs
                    .iter()
                    .flat_map(|(k, v)| [Rc::clone(k), Rc::clone(v)])
                    .collect();

                match self.eval_expressions(&flat, env)? {
                    Ok(values) => ops::build_hash(pair_up(values)),
                    Err(signal) => signal,
                }
            }

            Literal::Function(literal) => {
                Object::Function(Rc::new(Function::new(Rc::clone(literal), Rc::clone(env))))
            }
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Calls
    // ─────────────────────────────────────────────────────────────────────

    fn call(&mut self, plan: CallPlan) -> EvalResult {
        match plan {
            CallPlan::Builtin(builtin, arguments) => Ok(builtin.call(&arguments, &mut *self.sink)),

            CallPlan::User(call) => {
                if self.depth >= self.config.max_call_depth {
                    let error = EvalError::StackOverflow {
                        limit: self.config.max_call_depth,
                    };
                    self.sink.emit(OutputKind::Error, error.to_string());
                    return Err(error);
                }

                debug!("Calling {}({})", call.name, call.arguments.join(", "));

                self.depth += 1;
                let result = self.eval_sequence(&call.body.statements, &call.env);
                self.depth -= 1;

                let result = result?.unwrap_return();

                if !result.is_error() {
                    self.sink
                        .emit(OutputKind::Return, output::returned(&call.name, &result));
                }

                Ok(result)
            }
        }
    }
}

/// `[k1, v1, k2, v2, ..]` into `[(k1, v1), (k2, v2), ..]`.
pub(crate) fn pair_up(values: Vec<Object>) -> Vec<(Object, Object)> {
    let mut pairs = Vec::with_capacity(values.len() / 2);
    let mut values = values.into_iter();

    while let (Some(key), Some(value)) = (values.next(), values.next()) {
        pairs.push((key, value));
    }

    pairs
}
