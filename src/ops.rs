//! Evaluation semantics shared by the direct and stepwise evaluators.
//!
//! Everything here is a pure function of already-evaluated operands (plus
//! the environment for call setup), so the two evaluators can only differ in
//! *when* they evaluate sub-expressions, never in what an operation yields.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::ast::{BlockStatement, ClassStatement, InfixOp, PrefixOp};
use crate::builtins::{self, Builtin};
use crate::environment::{Env, Environment, ScopeKind};
use crate::object::{
    BoundMethod, Class, Function, HashKey, HashObject, HashPair, Instance, Object,
};

fn integer_overflow() -> Object {
    Object::error("integer overflow")
}

fn division_by_zero() -> Object {
    Object::error("division by zero")
}

fn unknown_infix(left: &Object, operator: InfixOp, right: &Object) -> Object {
    Object::error(format!(
        "unknown operator: {} {} {}",
        left.object_type(),
        operator,
        right.object_type()
    ))
}

// ─────────────────────────────────────────────────────────────────────────────
// Operators
// ─────────────────────────────────────────────────────────────────────────────

pub fn apply_prefix(operator: PrefixOp, right: &Object) -> Object {
    match (operator, right) {
        (PrefixOp::Not, value) => Object::Boolean(!value.is_truthy()),
        (PrefixOp::Negate, Object::Integer(n)) => {
            n.checked_neg().map_or_else(integer_overflow, Object::Integer)
        }
        (PrefixOp::Negate, Object::Float(n)) => Object::Float(-n),
        (PrefixOp::Negate, other) => {
            Object::error(format!("unknown operator: -{}", other.object_type()))
        }
    }
}

/// Apply a binary operator to two evaluated operands. `&&`/`||` arrive here
/// only when the left operand did not short-circuit.
pub fn apply_infix(operator: InfixOp, left: &Object, right: &Object) -> Object {
    if operator.is_logical() {
        return Object::Boolean(match operator {
            InfixOp::And => left.is_truthy() && right.is_truthy(),
            _ => left.is_truthy() || right.is_truthy(),
        });
    }

    match (left, right) {
        (Object::Integer(l), Object::Integer(r)) => integer_infix(operator, *l, *r),

        (Object::Integer(_) | Object::Float(_), Object::Integer(_) | Object::Float(_)) => {
            float_infix(operator, as_float(left), as_float(right))
        }

        (Object::Str(l), Object::Str(r)) => string_infix(operator, l, r),

        _ => match operator {
            InfixOp::Eq => Object::Boolean(values_equal(left, right)),
            InfixOp::NotEq => Object::Boolean(!values_equal(left, right)),
            _ if left.object_type() != right.object_type() => Object::error(format!(
                "type mismatch: {} {} {}",
                left.object_type(),
                operator,
                right.object_type()
            )),
            _ => unknown_infix(left, operator, right),
        },
    }
}

/// Short-circuit outcome of `&&`/`||` given only the left operand.
pub fn short_circuit(operator: InfixOp, left: &Object) -> Option<Object> {
    match operator {
        InfixOp::And if !left.is_truthy() => Some(Object::Boolean(false)),
        InfixOp::Or if left.is_truthy() => Some(Object::Boolean(true)),
        _ => None,
    }
}

fn as_float(value: &Object) -> f64 {
    match value {
        Object::Integer(n) => *n as f64,
        Object::Float(n) => *n,
        _ => f64::NAN,
    }
}

fn integer_infix(operator: InfixOp, l: i64, r: i64) -> Object {
    let checked = |value: Option<i64>| value.map_or_else(integer_overflow, Object::Integer);

    match operator {
        InfixOp::Add => checked(l.checked_add(r)),
        InfixOp::Sub => checked(l.checked_sub(r)),
        InfixOp::Mul => checked(l.checked_mul(r)),
        InfixOp::Div if r == 0 => division_by_zero(),
        InfixOp::Div => checked(l.checked_div(r)),
        InfixOp::Mod if r == 0 => division_by_zero(),
        InfixOp::Mod => checked(l.checked_rem(r)),
        InfixOp::Lt => Object::Boolean(l < r),
        InfixOp::Gt => Object::Boolean(l > r),
        InfixOp::LtEq => Object::Boolean(l <= r),
        InfixOp::GtEq => Object::Boolean(l >= r),
        InfixOp::Eq => Object::Boolean(l == r),
        InfixOp::NotEq => Object::Boolean(l != r),
        InfixOp::And | InfixOp::Or => {
            unknown_infix(&Object::Integer(l), operator, &Object::Integer(r))
        }
    }
}

fn float_infix(operator: InfixOp, l: f64, r: f64) -> Object {
    match operator {
        InfixOp::Add => Object::Float(l + r),
        InfixOp::Sub => Object::Float(l - r),
        InfixOp::Mul => Object::Float(l * r),
        InfixOp::Div | InfixOp::Mod if r == 0.0 => division_by_zero(),
        InfixOp::Div => Object::Float(l / r),
        InfixOp::Mod => Object::Float(l % r),
        InfixOp::Lt => Object::Boolean(l < r),
        InfixOp::Gt => Object::Boolean(l > r),
        InfixOp::LtEq => Object::Boolean(l <= r),
        InfixOp::GtEq => Object::Boolean(l >= r),
        InfixOp::Eq => Object::Boolean(l == r),
        InfixOp::NotEq => Object::Boolean(l != r),
        InfixOp::And | InfixOp::Or => {
            unknown_infix(&Object::Float(l), operator, &Object::Float(r))
        }
    }
}

fn string_infix(operator: InfixOp, l: &str, r: &str) -> Object {
    let ordering = l.cmp(r);

    match operator {
        InfixOp::Add => {
            let mut joined = String::with_capacity(l.len() + r.len());
            joined.push_str(l);
            joined.push_str(r);
            Object::Str(joined)
        }
        InfixOp::Eq => Object::Boolean(ordering == Ordering::Equal),
        InfixOp::NotEq => Object::Boolean(ordering != Ordering::Equal),
        InfixOp::Lt => Object::Boolean(ordering == Ordering::Less),
        InfixOp::Gt => Object::Boolean(ordering == Ordering::Greater),
        InfixOp::LtEq => Object::Boolean(ordering != Ordering::Greater),
        InfixOp::GtEq => Object::Boolean(ordering != Ordering::Less),
        _ => unknown_infix(
            &Object::Str(l.to_owned()),
            operator,
            &Object::Str(r.to_owned()),
        ),
    }
}

/// Structural for arrays and hashes, identity for functions, classes and
/// instances, numeric across integer and float.
pub fn values_equal(left: &Object, right: &Object) -> bool {
    match (left, right) {
        (Object::Integer(l), Object::Integer(r)) => l == r,
        (Object::Integer(_) | Object::Float(_), Object::Integer(_) | Object::Float(_)) => {
            as_float(left) == as_float(right)
        }
        (Object::Str(l), Object::Str(r)) => l == r,
        (Object::Boolean(l), Object::Boolean(r)) => l == r,
        (Object::Null, Object::Null) => true,
        (Object::Array(l), Object::Array(r)) => {
            Rc::ptr_eq(l, r)
                || (l.len() == r.len() && l.iter().zip(r.iter()).all(|(a, b)| values_equal(a, b)))
        }
        (Object::Hash(l), Object::Hash(r)) => {
            Rc::ptr_eq(l, r)
                || (l.pairs.len() == r.pairs.len()
                    && l.pairs.iter().all(|(key, pair)| {
                        r.pairs
                            .get(key)
                            .is_some_and(|other| values_equal(&pair.value, &other.value))
                    }))
        }
        (Object::Function(l), Object::Function(r)) => Rc::ptr_eq(l, r),
        (Object::Builtin(l), Object::Builtin(r)) => l == r,
        (Object::Class(l), Object::Class(r)) => Rc::ptr_eq(l, r),
        (Object::Instance(l), Object::Instance(r)) => Rc::ptr_eq(l, r),
        (Object::BoundMethod(l), Object::BoundMethod(r)) => {
            Rc::ptr_eq(&l.receiver, &r.receiver) && Rc::ptr_eq(&l.method, &r.method)
        }
        (Object::Error(l), Object::Error(r)) => l == r,
        _ => false,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Collections and members
// ─────────────────────────────────────────────────────────────────────────────

/// Build a hash from evaluated pairs; the first unusable key wins.
pub fn build_hash(pairs: Vec<(Object, Object)>) -> Object {
    let mut map = BTreeMap::new();

    for (key, value) in pairs {
        let Some(hash_key) = key.hash_key() else {
            return Object::error(format!("unusable as hash key: {}", key.object_type()));
        };

        map.insert(hash_key, HashPair { key, value });
    }

    Object::Hash(Rc::new(HashObject { pairs: map }))
}

pub fn index(left: &Object, index: &Object) -> Object {
    match (left, index) {
        (Object::Array(elements), Object::Integer(i)) => usize::try_from(*i)
            .ok()
            .and_then(|i| elements.get(i))
            .cloned()
            .unwrap_or_else(|| Object::error(format!("index out of range: {}", i))),

        (Object::Str(s), Object::Integer(i)) => usize::try_from(*i)
            .ok()
            .and_then(|i| s.chars().nth(i))
            .map(|c| Object::Str(c.to_string()))
            .unwrap_or_else(|| Object::error(format!("index out of range: {}", i))),

        (Object::Hash(hash), key) => match key.hash_key() {
            Some(hash_key) => hash
                .pairs
                .get(&hash_key)
                .map(|pair| pair.value.clone())
                .unwrap_or(Object::Null),
            None => Object::error(format!("unusable as hash key: {}", key.object_type())),
        },

        _ => Object::error(format!(
            "index operator not supported: {}[{}]",
            left.object_type(),
            index.object_type()
        )),
    }
}

/// `object.name`: instance fields shadow methods; hashes read string keys.
pub fn get_member(object: &Object, name: &str) -> Object {
    match object {
        Object::Instance(instance) => {
            if let Some(value) = instance.borrow().fields.get(name) {
                return value.clone();
            }

            let class = Rc::clone(&instance.borrow().class);

            match Class::find_method(&class, name) {
                Some((method, owner)) => Object::BoundMethod(Rc::new(BoundMethod {
                    receiver: Rc::clone(instance),
                    method,
                    owner,
                })),
                None => Object::error(format!(
                    "undefined property '{}' on {} instance",
                    name, class.name
                )),
            }
        }

        Object::Hash(hash) => hash
            .pairs
            .get(&HashKey::Str(name.to_owned()))
            .map(|pair| pair.value.clone())
            .unwrap_or(Object::Null),

        other => Object::error(format!(
            "cannot read property '{}' of {}",
            name,
            other.object_type()
        )),
    }
}

/// `object.name = value`; only instances carry writable fields.
pub fn set_member(object: &Object, name: &str, value: Object) -> Object {
    match object {
        Object::Instance(instance) => {
            instance
                .borrow_mut()
                .fields
                .insert(name.to_owned(), value.clone());
            value
        }

        other => Object::error(format!(
            "cannot set property '{}' on {}",
            name,
            other.object_type()
        )),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Identifiers, classes and calls
// ─────────────────────────────────────────────────────────────────────────────

/// Environment chain first, then builtins.
pub fn resolve_identifier(env: &Env, name: &str) -> Object {
    if let Some(value) = env.borrow().get(name) {
        return value;
    }

    builtins::lookup(name)
        .map(Object::Builtin)
        .unwrap_or_else(|| Object::error(format!("identifier not found: {}", name)))
}

/// `super.method`, or the superclass `init` for a bare `super`, bound to the
/// current `this`.
pub fn resolve_super(env: &Env, method: Option<&str>) -> Object {
    let superclass = env.borrow().get("super");
    let receiver = env.borrow().get("this");

    let (Some(Object::Class(superclass)), Some(Object::Instance(receiver))) = (superclass, receiver)
    else {
        return Object::error("'super' used outside of a subclass method");
    };

    let name = method.unwrap_or("init");

    match Class::find_method(&superclass, name) {
        Some((method, owner)) => Object::BoundMethod(Rc::new(BoundMethod {
            receiver,
            method,
            owner,
        })),
        None => Object::error(format!(
            "undefined method '{}' on superclass {}",
            name, superclass.name
        )),
    }
}

/// Build a class object once its superclass expression has been evaluated.
/// Methods close over `env`, the scope the class is declared in.
pub fn define_class(
    statement: &ClassStatement,
    superclass: Option<Object>,
    env: &Env,
) -> Result<Rc<Class>, Object> {
    let superclass = match superclass {
        None => None,
        Some(Object::Class(class)) => Some(class),
        Some(other) => {
            return Err(Object::error(format!(
                "superclass must be a class, got {}",
                other.object_type()
            )))
        }
    };

    let mut methods = HashMap::new();

    for literal in statement.constructor.iter().chain(statement.methods.iter()) {
        let function = Function::new(Rc::clone(literal), Rc::clone(env));
        methods.insert(function.name().to_owned(), Rc::new(function));
    }

    Ok(Rc::new(Class {
        name: statement.name.name.clone(),
        superclass,
        methods,
    }))
}

/// A user-function invocation ready to run: the body and a fresh call
/// environment with parameters (and `this`/`super` for methods) bound.
pub struct UserCall {
    pub name: String,
    pub body: Rc<BlockStatement>,
    pub env: Env,
    pub arguments: Vec<String>,
}

pub enum CallPlan {
    Builtin(Builtin, Vec<Object>),
    User(UserCall),
}

/// Check the callee and arity and set up the call. A runtime error comes
/// back as `Err` holding the `Error` object.
pub fn plan_call(callee: &Object, arguments: Vec<Object>) -> Result<CallPlan, Object> {
    match callee {
        Object::Builtin(builtin) => Ok(CallPlan::Builtin(*builtin, arguments)),

        Object::Function(function) => {
            let call = bind_arguments(function, function.name().to_owned(), arguments)?;
            Ok(CallPlan::User(call))
        }

        Object::BoundMethod(bound) => {
            let call = bind_arguments(&bound.method, bound.qualified_name(), arguments)?;

            {
                let mut env = call.env.borrow_mut();
                env.define("this", Object::Instance(Rc::clone(&bound.receiver)));

                if let Some(superclass) = &bound.owner.superclass {
                    env.define("super", Object::Class(Rc::clone(superclass)));
                }
            }

            Ok(CallPlan::User(call))
        }

        other => Err(Object::error(format!(
            "not a function: {}",
            other.object_type()
        ))),
    }
}

fn bind_arguments(
    function: &Rc<Function>,
    name: String,
    arguments: Vec<Object>,
) -> Result<UserCall, Object> {
    if arguments.len() != function.arity() {
        return Err(builtins::wrong_arguments(function.arity(), arguments.len()));
    }

    let env = Environment::with_enclosing(&function.env, ScopeKind::Function);
    let rendered = arguments.iter().map(Object::inspect).collect();

    {
        let mut scope = env.borrow_mut();
        for (parameter, value) in function.literal.parameters.iter().zip(arguments) {
            scope.define(&parameter.name, value);
        }
    }

    Ok(UserCall {
        name,
        body: Rc::clone(&function.literal.body),
        env,
        arguments: rendered,
    })
}

/// A fresh instance plus the `init` call to run on it, if the class chain
/// defines one.
pub struct Construction {
    pub instance: Object,
    pub init: Option<CallPlan>,
}

pub fn construct(class: &Object, arguments: Vec<Object>) -> Result<Construction, Object> {
    let Object::Class(class) = class else {
        return Err(Object::error(format!(
            "not a class: {}",
            class.object_type()
        )));
    };

    let instance = Rc::new(RefCell::new(Instance {
        class: Rc::clone(class),
        fields: HashMap::new(),
    }));

    let init = match Class::find_method(class, "init") {
        Some((method, owner)) => {
            let bound = Object::BoundMethod(Rc::new(BoundMethod {
                receiver: Rc::clone(&instance),
                method,
                owner,
            }));
            Some(plan_call(&bound, arguments)?)
        }
        None if !arguments.is_empty() => {
            return Err(builtins::wrong_arguments(0, arguments.len()));
        }
        None => None,
    };

    Ok(Construction {
        instance: Object::Instance(instance),
        init,
    })
}
