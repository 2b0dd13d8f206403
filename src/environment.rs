use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;
use serde::Serialize;
use thiserror::Error;

use crate::object::{Object, ObjectType};

/// Shared handle to an environment. Closures keep one alive.
pub type Env = Rc<RefCell<Environment>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScopeKind {
    Global,
    Function,
    Block,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub value: Object,
    pub constant: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvError {
    #[error("cannot redeclare '{0}' in the same scope")]
    Redeclared(String),

    #[error("identifier not found: {0}")]
    NotFound(String),

    #[error("cannot assign to constant '{0}'")]
    Constant(String),
}

/// Name → binding map with an optional enclosing scope.
#[derive(Debug)]
pub struct Environment {
    values: HashMap<String, Binding>,
    enclosing: Option<Env>,
    scope: ScopeKind,
}

impl Environment {
    /// A fresh global environment.
    pub fn global() -> Env {
        Rc::new(RefCell::new(Environment {
            values: HashMap::new(),
            enclosing: None,
            scope: ScopeKind::Global,
        }))
    }

    pub fn with_enclosing(enclosing: &Env, scope: ScopeKind) -> Env {
        Rc::new(RefCell::new(Environment {
            values: HashMap::new(),
            enclosing: Some(Rc::clone(enclosing)),
            scope,
        }))
    }

    /// Create a binding in this environment only.
    pub fn declare(&mut self, name: &str, value: Object, constant: bool) -> Result<(), EnvError> {
        if self.values.contains_key(name) {
            return Err(EnvError::Redeclared(name.to_owned()));
        }

        debug!("Declared {} in {:?} scope", name, self.scope);
        self.values.insert(name.to_owned(), Binding { value, constant });
        Ok(())
    }

    /// Bind without the redeclaration check; used for parameters, `this`
    /// and `super`, which live in a fresh scope anyway.
    pub fn define(&mut self, name: &str, value: Object) {
        self.values.insert(
            name.to_owned(),
            Binding {
                value,
                constant: false,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<Object> {
        if let Some(binding) = self.values.get(name) {
            Some(binding.value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            None
        }
    }

    /// Update the nearest existing binding of `name`.
    pub fn assign(&mut self, name: &str, value: Object) -> Result<(), EnvError> {
        if let Some(binding) = self.values.get_mut(name) {
            if binding.constant {
                return Err(EnvError::Constant(name.to_owned()));
            }

            binding.value = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(EnvError::NotFound(name.to_owned()))
        }
    }

    /// Read-only copy of this scope chain for inspectors. Bindings are
    /// sorted by name so snapshots are deterministic.
    pub fn snapshot(&self) -> EnvironmentSnapshot {
        let mut bindings: Vec<BindingSnapshot> = self
            .values
            .iter()
            .map(|(name, binding)| BindingSnapshot {
                name: name.clone(),
                value: binding.value.inspect(),
                value_type: binding.value.object_type(),
                constant: binding.constant,
            })
            .collect();

        bindings.sort_by(|a, b| a.name.cmp(&b.name));

        EnvironmentSnapshot {
            scope: self.scope,
            bindings,
            outer: self
                .enclosing
                .as_ref()
                .map(|outer| Box::new(outer.borrow().snapshot())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BindingSnapshot {
    pub name: String,
    pub value: String,
    #[serde(rename = "type")]
    pub value_type: ObjectType,
    pub constant: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentSnapshot {
    pub scope: ScopeKind,
    pub bindings: Vec<BindingSnapshot>,
    pub outer: Option<Box<EnvironmentSnapshot>>,
}

impl EnvironmentSnapshot {
    /// Find `name` in this snapshot or its outer chain.
    pub fn lookup(&self, name: &str) -> Option<&BindingSnapshot> {
        self.bindings
            .iter()
            .find(|b| b.name == name)
            .or_else(|| self.outer.as_ref().and_then(|outer| outer.lookup(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redeclaration_in_same_scope_fails() {
        let env = Environment::global();
        env.borrow_mut().declare("x", Object::Integer(1), false).unwrap();

        let err = env.borrow_mut().declare("x", Object::Integer(2), false);
        assert_eq!(err, Err(EnvError::Redeclared("x".into())));
    }

    #[test]
    fn shadowing_in_inner_scope_is_allowed() {
        let global = Environment::global();
        global.borrow_mut().declare("x", Object::Integer(1), false).unwrap();

        let block = Environment::with_enclosing(&global, ScopeKind::Block);
        block.borrow_mut().declare("x", Object::Integer(2), false).unwrap();

        assert_eq!(block.borrow().get("x").map(|v| v.inspect()), Some("2".into()));
        assert_eq!(global.borrow().get("x").map(|v| v.inspect()), Some("1".into()));
    }

    #[test]
    fn assign_walks_outward_and_respects_const() {
        let global = Environment::global();
        global.borrow_mut().declare("x", Object::Integer(1), false).unwrap();
        global.borrow_mut().declare("k", Object::Integer(1), true).unwrap();

        let inner = Environment::with_enclosing(&global, ScopeKind::Function);
        inner.borrow_mut().assign("x", Object::Integer(9)).unwrap();

        assert_eq!(global.borrow().get("x").map(|v| v.inspect()), Some("9".into()));
        assert_eq!(
            inner.borrow_mut().assign("k", Object::Integer(2)),
            Err(EnvError::Constant("k".into()))
        );
        assert_eq!(
            inner.borrow_mut().assign("nope", Object::Null),
            Err(EnvError::NotFound("nope".into()))
        );
    }

    #[test]
    fn snapshot_is_sorted_and_chained() {
        let global = Environment::global();
        global.borrow_mut().declare("b", Object::Integer(2), false).unwrap();
        global.borrow_mut().declare("a", Object::Boolean(true), true).unwrap();

        let block = Environment::with_enclosing(&global, ScopeKind::Block);
        block.borrow_mut().declare("c", Object::Null, false).unwrap();

        let snapshot = block.borrow().snapshot();
        assert_eq!(snapshot.scope, ScopeKind::Block);

        let outer = snapshot.outer.as_ref().unwrap();
        let names: Vec<&str> = outer.bindings.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(snapshot.lookup("a").unwrap().constant);
    }
}
