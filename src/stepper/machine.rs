//! Task execution for the stepwise evaluator.

use std::rc::Rc;

use chrono::Utc;
use log::{debug, info};

use crate::ast::{BlockStatement, ExprKind, Expression, FStringPart, Literal, Statement, StmtKind};
use crate::environment::{Env, Environment, ScopeKind};
use crate::error::EvalError;
use crate::evaluator::pair_up;
use crate::object::{Function, Object};
use crate::ops::{self, CallPlan};
use crate::output::{self, OutputEntry, OutputEvent, OutputKind};

use super::state::{CallFrame, EvaluationStep, NodeRef, Recorded, StepType};
use super::task::{Source, Task, Then, Work};
use super::StepEvaluator;

impl StepEvaluator {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn record(
        &mut self,
        node: &NodeRef,
        step_type: StepType,
        description: String,
        env: &Env,
        result: Option<Object>,
        path: &str,
        depth: usize,
    ) {
        let number = self.history.len() + 1;
        let position = node.position();

        debug!(
            "Step {} [{:?}] {} at {}: {}",
            number,
            step_type,
            node.kind_name(),
            path,
            description
        );

        let step = EvaluationStep {
            number,
            node: node.clone(),
            node_kind: node.kind_name(),
            description,
            environment: env.borrow().snapshot(),
            result,
            line: position.line,
            column: position.column,
            depth,
            node_path: path.to_owned(),
            step_type,
        };

        self.history.push(Recorded {
            step,
            call_stack: self.call_stack.clone(),
            output_len: self.output.len(),
            complete: self.finished,
        });
    }

    /// Entries are stamped with the step that first shows them.
    fn emit(&mut self, kind: OutputKind, message: String) {
        self.output.push(OutputEntry {
            step: self.history.len() + 1,
            timestamp: Utc::now(),
            kind,
            message,
        });
    }

    fn pop_value(&mut self) -> Object {
        let value = self.values.pop();
        debug_assert!(value.is_some(), "value stack underflow");
        value.unwrap_or(Object::Null)
    }

    /// Pop an operand; a control object is pushed back and `None` returned
    /// so the enclosing construct unwinds.
    fn operand(&mut self) -> Option<Object> {
        let value = self.pop_value();

        if value.is_control() {
            self.values.push(value);
            None
        } else {
            Some(value)
        }
    }

    fn schedule(&mut self, task: Task, env: &Env, path: String, depth: usize) {
        self.work.push(Work {
            task,
            env: Rc::clone(env),
            path,
            depth,
        });
    }

    fn enter_child(&mut self, node: NodeRef, env: &Env, path: &str, suffix: &str, depth: usize) {
        self.schedule(
            Task::Enter(node),
            env,
            format!("{}/{}", path, suffix),
            depth + 1,
        );
    }

    pub(super) fn run(&mut self, work: Work) -> Result<(), EvalError> {
        let Work {
            task,
            env,
            path,
            depth,
        } = work;

        match task {
            Task::Enter(node) => self.enter(node, &env, path, depth),

            Task::Exit(node) => {
                let result = self.values.last().cloned();
                let description = match &result {
                    Some(value) => format!("{} evaluated to {}", node.kind_name(), value.inspect()),
                    None => format!("{} finished", node.kind_name()),
                };
                self.record(&node, StepType::After, description, &env, result, &path, depth);
            }

            Task::Sequence { source, index } => self.sequence(source, index, &env, path, depth),

            Task::OpenScope(block) => {
                let scope = Environment::with_enclosing(&env, ScopeKind::Block);
                self.record(
                    &NodeRef::Block(Rc::clone(&block)),
                    StepType::During,
                    "Enter block scope".to_owned(),
                    &scope,
                    None,
                    &path,
                    depth,
                );
                self.schedule(
                    Task::Sequence {
                        source: Source::Block(block),
                        index: 0,
                    },
                    &scope,
                    path,
                    depth,
                );
            }

            Task::BindName {
                name,
                constant,
                has_value,
            } => {
                let value = if has_value {
                    match self.operand() {
                        Some(value) => value,
                        None => return Ok(()),
                    }
                } else {
                    Object::Null
                };

                let message = output::declared(&name.name, &value, constant);
                let declared = env.borrow_mut().declare(&name.name, value, constant);

                match declared {
                    Ok(()) => {
                        self.emit(OutputKind::Binding, message);
                        self.values.push(Object::Null);
                    }
                    Err(e) => self.values.push(Object::error(e.to_string())),
                }
            }

            Task::WrapReturn { has_value } => {
                let value = if has_value {
                    match self.operand() {
                        Some(value) => value,
                        None => return Ok(()),
                    }
                } else {
                    Object::Null
                };

                self.values.push(Object::ReturnValue(Box::new(value)));
            }

            Task::LoopCheck(statement) => {
                if let StmtKind::While { condition, .. } = &statement.kind {
                    let condition = NodeRef::Expression(Rc::clone(condition));
                    self.schedule(
                        Task::LoopDecide(Rc::clone(&statement)),
                        &env,
                        path.clone(),
                        depth,
                    );
                    self.enter_child(condition, &env, &path, "condition", depth);
                }
            }

            Task::LoopDecide(statement) => {
                let body = match &statement.kind {
                    StmtKind::While { body, .. } => Rc::clone(body),
                    _ => return Ok(()),
                };
                self.decide_loop(statement, body, Task::LoopAfterBody, &env, path, depth);
            }

            Task::LoopAfterBody(statement) => match self.pop_value() {
                Object::Break => self.values.push(Object::Null),
                signal @ (Object::ReturnValue(_) | Object::Error(_)) => self.values.push(signal),
                _ => self.schedule(Task::LoopCheck(statement), &env, path, depth),
            },

            Task::OpenLoopScope(statement) => self.open_loop_scope(statement, &env, path, depth),

            Task::ForAfterInit(statement) | Task::ForAfterUpdate(statement) => {
                if self.operand().is_some() {
                    self.schedule(Task::ForCheck(statement), &env, path, depth);
                }
            }

            Task::ForCheck(statement) => {
                if let StmtKind::For { condition, .. } = &statement.kind {
                    let condition = condition.clone();
                    self.schedule(
                        Task::ForDecide(Rc::clone(&statement)),
                        &env,
                        path.clone(),
                        depth,
                    );

                    match condition {
                        Some(condition) => self.enter_child(
                            NodeRef::Expression(condition),
                            &env,
                            &path,
                            "condition",
                            depth,
                        ),
                        None => self.values.push(Object::Boolean(true)),
                    }
                }
            }

            Task::ForDecide(statement) => {
                let body = match &statement.kind {
                    StmtKind::For { body, .. } => Rc::clone(body),
                    _ => return Ok(()),
                };
                self.decide_loop(statement, body, Task::ForAfterBody, &env, path, depth);
            }

            Task::ForAfterBody(statement) => match self.pop_value() {
                Object::Break => self.values.push(Object::Null),
                signal @ (Object::ReturnValue(_) | Object::Error(_)) => self.values.push(signal),
                _ => {
                    let update = match &statement.kind {
                        StmtKind::For { update, .. } => update.clone(),
                        _ => None,
                    };

                    match update {
                        Some(update) => {
                            self.schedule(
                                Task::ForAfterUpdate(Rc::clone(&statement)),
                                &env,
                                path.clone(),
                                depth,
                            );
                            self.enter_child(
                                NodeRef::Expression(update),
                                &env,
                                &path,
                                "update",
                                depth,
                            );
                        }
                        None => self.schedule(Task::ForCheck(statement), &env, path, depth),
                    }
                }
            },

            Task::ApplyPrefix { node, operator } => {
                if let Some(right) = self.operand() {
                    let result = ops::apply_prefix(operator, &right);
                    self.record(
                        &NodeRef::Expression(node),
                        StepType::During,
                        format!("Apply {}{}", operator, right.inspect()),
                        &env,
                        Some(result.clone()),
                        &path,
                        depth,
                    );
                    self.values.push(result);
                }
            }

            Task::InfixRight {
                node,
                operator,
                right,
            } => {
                let Some(left) = self.operand() else {
                    return Ok(());
                };

                if let Some(result) = ops::short_circuit(operator, &left) {
                    self.values.push(result);
                    return Ok(());
                }

                self.schedule(
                    Task::ApplyInfix {
                        node,
                        operator,
                        left,
                    },
                    &env,
                    path.clone(),
                    depth,
                );
                self.enter_child(NodeRef::Expression(right), &env, &path, "right", depth);
            }

            Task::ApplyInfix {
                node,
                operator,
                left,
            } => {
                let Some(right) = self.operand() else {
                    return Ok(());
                };

                let result = ops::apply_infix(operator, &left, &right);

                if !result.is_error() {
                    self.emit(
                        OutputKind::Operation,
                        output::operation(&left, operator, &right, &result),
                    );
                }

                self.record(
                    &NodeRef::Expression(node),
                    StepType::During,
                    format!(
                        "Apply {} {} {}",
                        left.inspect(),
                        operator,
                        right.inspect()
                    ),
                    &env,
                    Some(result.clone()),
                    &path,
                    depth,
                );
                self.values.push(result);
            }

            Task::AssignName(name) => {
                let Some(value) = self.operand() else {
                    return Ok(());
                };

                let assigned = env.borrow_mut().assign(&name, value.clone());

                match assigned {
                    Ok(()) => {
                        self.emit(OutputKind::Binding, output::assigned(&name, &value));
                        self.values.push(value);
                    }
                    Err(e) => self.values.push(Object::error(e.to_string())),
                }
            }

            Task::GetMember(name) => {
                if let Some(object) = self.operand() {
                    self.values.push(ops::get_member(&object, &name));
                }
            }

            Task::Gather {
                exprs,
                index,
                mut collected,
                then,
            } => {
                if index > 0 {
                    match self.operand() {
                        Some(value) => collected.push(value),
                        None => return Ok(()),
                    }
                }

                if index == exprs.len() {
                    return self.finish_gather(then, collected, &env, &path, depth);
                }

                let (expression, suffix) = exprs[index].clone();

                self.schedule(
                    Task::Gather {
                        exprs,
                        index: index + 1,
                        collected,
                        then,
                    },
                    &env,
                    path.clone(),
                    depth,
                );
                self.enter_child(NodeRef::Expression(expression), &env, &path, &suffix, depth);
            }

            Task::IfDecide { node, index } => self.decide_if(node, index, &env, path, depth),

            Task::DefineClass {
                class,
                has_superclass,
            } => {
                let superclass = if has_superclass {
                    match self.operand() {
                        Some(value) => Some(value),
                        None => return Ok(()),
                    }
                } else {
                    None
                };

                let defined = match ops::define_class(&class, superclass, &env) {
                    Ok(defined) => defined,
                    Err(error) => {
                        self.values.push(error);
                        return Ok(());
                    }
                };

                let declared =
                    env.borrow_mut()
                        .declare(&class.name.name, Object::Class(defined), false);

                match declared {
                    Ok(()) => {
                        self.emit(OutputKind::Binding, output::class_defined(&class.name.name));
                        self.values.push(Object::Null);
                    }
                    Err(e) => self.values.push(Object::error(e.to_string())),
                }
            }

            Task::FinishConstruct(instance) => {
                if self.operand().is_some() {
                    self.values.push(instance);
                }
            }

            Task::FinishCall(name) => {
                let result = self.pop_value().unwrap_return();

                self.call_stack.pop();

                if !result.is_error() {
                    self.emit(OutputKind::Return, output::returned(&name, &result));
                }

                self.values.push(result);
            }

            Task::FinishProgram(program) => {
                let result = self.pop_value().unwrap_return();

                if let Object::Error(message) = &result {
                    self.emit(OutputKind::Error, message.clone());
                }

                self.finished = true;
                self.record(
                    &NodeRef::Program(program),
                    StepType::After,
                    "Program finished".to_owned(),
                    &env,
                    Some(result.clone()),
                    &path,
                    depth,
                );

                info!("Stepped program finished with {}", result.inspect());
                self.result = Some(result);
            }
        }

        Ok(())
    }

    /// Record `before`, schedule `Exit`, then the node's own work.
    fn enter(&mut self, node: NodeRef, env: &Env, path: String, depth: usize) {
        self.record(
            &node,
            StepType::Before,
            describe_entry(&node),
            env,
            None,
            &path,
            depth,
        );
        self.schedule(Task::Exit(node.clone()), env, path.clone(), depth);

        match node {
            NodeRef::Statement(statement) => self.enter_statement(statement, env, &path, depth),
            NodeRef::Expression(expression) => {
                self.enter_expression(expression, env, &path, depth)
            }
            NodeRef::Block(block) => self.schedule(Task::OpenScope(block), env, path, depth),
            NodeRef::Program(_) => {}
        }
    }

    fn enter_statement(&mut self, statement: Rc<Statement>, env: &Env, path: &str, depth: usize) {
        match &statement.kind {
            StmtKind::Let { name, value } => {
                self.schedule(
                    Task::BindName {
                        name: name.clone(),
                        constant: false,
                        has_value: value.is_some(),
                    },
                    env,
                    path.to_owned(),
                    depth,
                );

                if let Some(value) = value {
                    let value = NodeRef::Expression(Rc::clone(value));
                    self.enter_child(value, env, path, "value", depth);
                }
            }

            StmtKind::Const { name, value } => {
                self.schedule(
                    Task::BindName {
                        name: name.clone(),
                        constant: true,
                        has_value: true,
                    },
                    env,
                    path.to_owned(),
                    depth,
                );
                let value = NodeRef::Expression(Rc::clone(value));
                self.enter_child(value, env, path, "value", depth);
            }

            StmtKind::Return { value } => {
                self.schedule(
                    Task::WrapReturn {
                        has_value: value.is_some(),
                    },
                    env,
                    path.to_owned(),
                    depth,
                );

                if let Some(value) = value {
                    let value = NodeRef::Expression(Rc::clone(value));
                    self.enter_child(value, env, path, "value", depth);
                }
            }

            StmtKind::Expression { expression } => {
                let expression = NodeRef::Expression(Rc::clone(expression));
                self.enter_child(expression, env, path, "expression", depth);
            }

            StmtKind::Block(block) => {
                self.schedule(Task::OpenScope(Rc::clone(block)), env, path.to_owned(), depth);
            }

            StmtKind::While { .. } => {
                self.schedule(
                    Task::LoopCheck(Rc::clone(&statement)),
                    env,
                    path.to_owned(),
                    depth,
                );
            }

            StmtKind::For { .. } => {
                self.schedule(
                    Task::OpenLoopScope(Rc::clone(&statement)),
                    env,
                    path.to_owned(),
                    depth,
                );
            }

            StmtKind::Break => self.values.push(Object::Break),

            StmtKind::Continue => self.values.push(Object::Continue),

            StmtKind::Class(class) => {
                self.schedule(
                    Task::DefineClass {
                        class: Rc::clone(class),
                        has_superclass: class.superclass.is_some(),
                    },
                    env,
                    path.to_owned(),
                    depth,
                );

                if let Some(superclass) = &class.superclass {
                    let superclass = NodeRef::Expression(Rc::clone(superclass));
                    self.enter_child(superclass, env, path, "superclass", depth);
                }
            }
        }
    }

    fn enter_expression(&mut self, node: Rc<Expression>, env: &Env, path: &str, depth: usize) {
        match &node.kind {
            ExprKind::Identifier(name) => {
                self.values.push(ops::resolve_identifier(env, name));
            }

            ExprKind::Prefix { operator, right } => {
                let right = NodeRef::Expression(Rc::clone(right));
                self.schedule(
                    Task::ApplyPrefix {
                        node: Rc::clone(&node),
                        operator: *operator,
                    },
                    env,
                    path.to_owned(),
                    depth,
                );
                self.enter_child(right, env, path, "right", depth);
            }

            ExprKind::Infix {
                left,
                operator,
                right,
            } => {
                let left = NodeRef::Expression(Rc::clone(left));
                self.schedule(
                    Task::InfixRight {
                        node: Rc::clone(&node),
                        operator: *operator,
                        right: Rc::clone(right),
                    },
                    env,
                    path.to_owned(),
                    depth,
                );
                self.enter_child(left, env, path, "left", depth);
            }

            ExprKind::Assign { target, value } => match &target.kind {
                ExprKind::Identifier(name) => {
                    let value = NodeRef::Expression(Rc::clone(value));
                    self.schedule(Task::AssignName(name.clone()), env, path.to_owned(), depth);
                    self.enter_child(value, env, path, "value", depth);
                }

                ExprKind::Member { object, property } => {
                    let exprs = vec![
                        (Rc::clone(object), "target/object".to_owned()),
                        (Rc::clone(value), "value".to_owned()),
                    ];
                    self.gather(exprs, Then::MemberAssign(property.clone()), env, path, depth);
                }

                _ => self
                    .values
                    .push(Object::error("invalid assignment target")),
            },

            ExprKind::Call {
                function,
                arguments,
            } => {
                let mut exprs = vec![(Rc::clone(function), "function".to_owned())];
                exprs.extend(indexed(arguments, "arguments"));
                self.gather(exprs, Then::Call(Rc::clone(&node)), env, path, depth);
            }

            ExprKind::If { conditions, .. } => match conditions.first() {
                Some(first) => {
                    let first = NodeRef::Expression(Rc::clone(first));
                    self.schedule(
                        Task::IfDecide {
                            node: Rc::clone(&node),
                            index: 0,
                        },
                        env,
                        path.to_owned(),
                        depth,
                    );
                    self.enter_child(first, env, path, "conditions[0]", depth);
                }
                None => self.values.push(Object::Null),
            },

            ExprKind::Index { left, index } => {
                let exprs = vec![
                    (Rc::clone(left), "left".to_owned()),
                    (Rc::clone(index), "index".to_owned()),
                ];
                self.gather(exprs, Then::Index, env, path, depth);
            }

            ExprKind::Member { object, property } => {
                let object = NodeRef::Expression(Rc::clone(object));
                self.schedule(
                    Task::GetMember(property.name.clone()),
                    env,
                    path.to_owned(),
                    depth,
                );
                self.enter_child(object, env, path, "object", depth);
            }

            ExprKind::New { class, arguments } => {
                let mut exprs = vec![(Rc::clone(class), "class".to_owned())];
                exprs.extend(indexed(arguments, "arguments"));
                self.gather(exprs, Then::New(Rc::clone(&node)), env, path, depth);
            }

            ExprKind::Super { method } => {
                let method = method.as_ref().map(|m| m.name.as_str());
                self.values.push(ops::resolve_super(env, method));
            }

            ExprKind::Literal(literal) => match literal {
                Literal::Integer(n) => self.values.push(Object::Integer(*n)),
                Literal::Float(n) => self.values.push(Object::Float(*n)),
                Literal::Str(s) => self.values.push(Object::Str(s.clone())),
                Literal::Boolean(b) => self.values.push(Object::Boolean(*b)),
                Literal::Null => self.values.push(Object::Null),

                Literal::FString(parts) => {
                    let exprs = parts
                        .iter()
                        .enumerate()
                        .filter_map(|(i, part)| match part {
                            FStringPart::Expr(expression) => {
                                Some((Rc::clone(expression), format!("parts[{}]", i)))
                            }
                            FStringPart::Text(_) => None,
                        })
                        .collect();
                    self.gather(exprs, Then::FString(parts.clone()), env, path, depth);
                }

                Literal::Array(elements) => {
                    let exprs = indexed(elements, "elements").collect();
                    self.gather(exprs, Then::Array, env, path, depth);
                }

                Literal::Hash(pairs) => {
                    let exprs = pairs
                        .iter()
                        .enumerate()
                        .flat_map(|(i, (key, value))| {
                            [
                                (Rc::clone(key), format!("pairs[{}]/key", i)),
                                (Rc::clone(value), format!("pairs[{}]/value", i)),
                            ]
                        })
                        .collect();
                    self.gather(exprs, Then::Hash, env, path, depth);
                }

                Literal::Function(literal) => {
                    let function = Function::new(Rc::clone(literal), Rc::clone(env));
                    self.values.push(Object::Function(Rc::new(function)));
                }
            },
        }
    }

    fn gather(
        &mut self,
        exprs: Vec<(Rc<Expression>, String)>,
        then: Then,
        env: &Env,
        path: &str,
        depth: usize,
    ) {
        self.schedule(
            Task::Gather {
                exprs,
                index: 0,
                collected: Vec::new(),
                then,
            },
            env,
            path.to_owned(),
            depth,
        );
    }

    fn finish_gather(
        &mut self,
        then: Then,
        values: Vec<Object>,
        env: &Env,
        path: &str,
        depth: usize,
    ) -> Result<(), EvalError> {
        match then {
            Then::Array => self.values.push(Object::Array(Rc::new(values))),

            Then::Hash => self.values.push(ops::build_hash(pair_up(values))),

            Then::FString(parts) => {
                let mut values = values.into_iter();
                let mut text = String::new();

                for part in &parts {
                    match part {
                        FStringPart::Text(s) => text.push_str(s),
                        FStringPart::Expr(_) => {
                            if let Some(value) = values.next() {
                                text.push_str(&value.inspect());
                            }
                        }
                    }
                }

                self.values.push(Object::Str(text));
            }

            Then::Index => {
                debug_assert_eq!(values.len(), 2, "index gathers two operands");

                if let [left, index] = values.as_slice() {
                    self.values.push(ops::index(left, index));
                }
            }

            Then::MemberAssign(property) => {
                debug_assert_eq!(values.len(), 2, "member assignment gathers two operands");

                let mut values = values.into_iter();
                let (Some(object), Some(value)) = (values.next(), values.next()) else {
                    return Ok(());
                };

                let result = ops::set_member(&object, &property.name, value);

                if !result.is_error() {
                    self.emit(
                        OutputKind::Binding,
                        output::member_assigned(&object, &property.name, &result),
                    );
                }

                self.values.push(result);
            }

            Then::Call(node) => {
                let mut values = values.into_iter();
                let callee = values.next().unwrap_or(Object::Null);

                match ops::plan_call(&callee, values.collect()) {
                    Ok(plan) => return self.invoke(plan, &node, env, path, depth),
                    Err(error) => self.values.push(error),
                }
            }

            Then::New(node) => {
                let mut values = values.into_iter();
                let class = values.next().unwrap_or(Object::Null);

                match ops::construct(&class, values.collect()) {
                    Ok(construction) => match construction.init {
                        Some(init) => {
                            self.schedule(
                                Task::FinishConstruct(construction.instance),
                                env,
                                path.to_owned(),
                                depth,
                            );
                            return self.invoke(init, &node, env, path, depth);
                        }
                        None => self.values.push(construction.instance),
                    },
                    Err(error) => self.values.push(error),
                }
            }
        }

        Ok(())
    }

    /// Call entry. Builtins run immediately; user functions push a frame
    /// and schedule their body.
    fn invoke(
        &mut self,
        plan: CallPlan,
        node: &Rc<Expression>,
        env: &Env,
        path: &str,
        depth: usize,
    ) -> Result<(), EvalError> {
        let site = NodeRef::Expression(Rc::clone(node));

        match plan {
            CallPlan::Builtin(builtin, arguments) => {
                let description = format!(
                    "Call builtin {}({})",
                    builtin.name(),
                    arguments
                        .iter()
                        .map(Object::inspect)
                        .collect::<Vec<_>>()
                        .join(", ")
                );

                let mut events: Vec<OutputEvent> = Vec::new();
                let result = builtin.call(&arguments, &mut events);

                for event in events {
                    self.emit(event.kind, event.message);
                }

                self.record(
                    &site,
                    StepType::During,
                    description,
                    env,
                    Some(result.clone()),
                    path,
                    depth,
                );
                self.values.push(result);
            }

            CallPlan::User(call) => {
                if self.call_stack.len() >= self.config.max_call_depth {
                    return Err(self.overflow(&site, env, path, depth));
                }

                let position = site.position();

                self.call_stack.push(CallFrame {
                    function_name: call.name.clone(),
                    arguments: call.arguments.clone(),
                    line: position.line,
                    column: position.column,
                    active: true,
                });

                self.record(
                    &site,
                    StepType::During,
                    format!("Call {}({})", call.name, call.arguments.join(", ")),
                    &call.env,
                    None,
                    path,
                    depth,
                );

                let body_path = format!("{}/{}/body", path, call.name);

                self.schedule(Task::FinishCall(call.name), env, path.to_owned(), depth);
                self.schedule(
                    Task::Sequence {
                        source: Source::Block(call.body),
                        index: 0,
                    },
                    &call.env,
                    body_path,
                    depth + 1,
                );
            }
        }

        Ok(())
    }

    /// Record the final step of a run that exceeded the call depth.
    fn overflow(&mut self, site: &NodeRef, env: &Env, path: &str, depth: usize) -> EvalError {
        let error = EvalError::StackOverflow {
            limit: self.config.max_call_depth,
        };
        let message = error.to_string();

        info!("Stepped program aborted: {}", message);

        self.emit(OutputKind::Error, message.clone());
        self.finished = true;
        self.work.clear();
        self.values.clear();
        self.record(
            site,
            StepType::During,
            message.clone(),
            env,
            Some(Object::Error(message)),
            path,
            depth,
        );
        self.fatal = Some(error.clone());

        error
    }

    fn sequence(&mut self, source: Source, index: usize, env: &Env, path: String, depth: usize) {
        let len = source.statements().len();

        if index > 0 {
            let previous = self.pop_value();

            if previous.is_control() || index == len {
                self.values.push(previous);
                return;
            }
        } else if len == 0 {
            self.values.push(Object::Null);
            return;
        }

        let statement = NodeRef::Statement(Rc::clone(&source.statements()[index]));
        let child = format!("statements[{}]", index);

        self.schedule(
            Task::Sequence {
                source,
                index: index + 1,
            },
            env,
            path.clone(),
            depth,
        );
        self.enter_child(statement, env, &path, &child, depth);
    }

    /// Shared by `while` and `for`: consume the condition, record the
    /// decision and run the body in a fresh block scope.
    fn decide_loop(
        &mut self,
        statement: Rc<Statement>,
        body: Rc<BlockStatement>,
        after_body: fn(Rc<Statement>) -> Task,
        env: &Env,
        path: String,
        depth: usize,
    ) {
        let Some(test) = self.operand() else {
            return;
        };

        let node = NodeRef::Statement(Rc::clone(&statement));

        if test.is_truthy() {
            self.record(
                &node,
                StepType::During,
                "Loop condition is true, running body".to_owned(),
                env,
                Some(test),
                &path,
                depth,
            );
            self.schedule(after_body(statement), env, path.clone(), depth);
            self.schedule(
                Task::OpenScope(body),
                env,
                format!("{}/body", path),
                depth + 1,
            );
        } else {
            self.record(
                &node,
                StepType::During,
                "Loop condition is false, leaving loop".to_owned(),
                env,
                Some(test),
                &path,
                depth,
            );
            self.values.push(Object::Null);
        }
    }

    fn open_loop_scope(&mut self, statement: Rc<Statement>, env: &Env, path: String, depth: usize) {
        let StmtKind::For { init, .. } = &statement.kind else {
            return;
        };
        let init = init.clone();

        let scope = Environment::with_enclosing(env, ScopeKind::Block);
        self.record(
            &NodeRef::Statement(Rc::clone(&statement)),
            StepType::During,
            "Enter loop scope".to_owned(),
            &scope,
            None,
            &path,
            depth,
        );

        match init {
            Some(init) => {
                self.schedule(Task::ForAfterInit(statement), &scope, path.clone(), depth);
                self.enter_child(NodeRef::Statement(init), &scope, &path, "init", depth);
            }
            None => self.schedule(Task::ForCheck(statement), &scope, path, depth),
        }
    }

    fn decide_if(
        &mut self,
        node: Rc<Expression>,
        index: usize,
        env: &Env,
        path: String,
        depth: usize,
    ) {
        let ExprKind::If {
            conditions,
            consequences,
            alternative,
        } = &node.kind
        else {
            return;
        };

        let Some(test) = self.operand() else {
            return;
        };

        let site = NodeRef::Expression(Rc::clone(&node));

        if test.is_truthy() {
            let Some(consequence) = consequences.get(index).cloned() else {
                self.values.push(Object::Null);
                return;
            };

            self.emit(OutputKind::Branch, output::branch(Some(index)));
            self.record(
                &site,
                StepType::During,
                format!("Condition {} is true, taking its branch", index + 1),
                env,
                Some(test),
                &path,
                depth,
            );
            self.schedule(
                Task::OpenScope(consequence),
                env,
                format!("{}/consequences[{}]", path, index),
                depth + 1,
            );
        } else if let Some(next) = conditions.get(index + 1).cloned() {
            self.schedule(
                Task::IfDecide {
                    node: Rc::clone(&node),
                    index: index + 1,
                },
                env,
                path.clone(),
                depth,
            );
            self.enter_child(
                NodeRef::Expression(next),
                env,
                &path,
                &format!("conditions[{}]", index + 1),
                depth,
            );
        } else if let Some(alternative) = alternative.clone() {
            self.emit(OutputKind::Branch, output::branch(None));
            self.record(
                &site,
                StepType::During,
                "All conditions are false, taking the else branch".to_owned(),
                env,
                Some(test),
                &path,
                depth,
            );
            self.schedule(
                Task::OpenScope(alternative),
                env,
                format!("{}/alternative", path),
                depth + 1,
            );
        } else {
            self.values.push(Object::Null);
        }
    }
}

fn indexed<'e>(
    expressions: &'e [Rc<Expression>],
    field: &'e str,
) -> impl Iterator<Item = (Rc<Expression>, String)> + 'e {
    expressions
        .iter()
        .enumerate()
        .map(move |(i, e)| (Rc::clone(e), format!("{}[{}]", field, i)))
}

fn describe_entry(node: &NodeRef) -> String {
    match node {
        NodeRef::Program(_) => "Program started".to_owned(),

        NodeRef::Block(_) => "Enter block".to_owned(),

        NodeRef::Statement(statement) => match &statement.kind {
            StmtKind::Let { name, .. } => format!("Declare variable '{}'", name),
            StmtKind::Const { name, .. } => format!("Declare constant '{}'", name),
            StmtKind::Return { .. } => "Return from function".to_owned(),
            StmtKind::While { .. } => "Start while loop".to_owned(),
            StmtKind::For { .. } => "Start for loop".to_owned(),
            StmtKind::Break => "Break out of loop".to_owned(),
            StmtKind::Continue => "Continue with next iteration".to_owned(),
            StmtKind::Class(class) => format!("Define class '{}'", class.name),
            _ => format!("Evaluate {}", statement.kind_name()),
        },

        NodeRef::Expression(expression) => match &expression.kind {
            ExprKind::Identifier(name) => format!("Look up '{}'", name),
            ExprKind::Infix { operator, .. } => format!("Evaluate '{}' expression", operator),
            ExprKind::Prefix { operator, .. } => format!("Evaluate '{}' expression", operator),
            ExprKind::Member { property, .. } => format!("Read property '{}'", property),
            _ => format!("Evaluate {}", expression.kind_name()),
        },
    }
}
