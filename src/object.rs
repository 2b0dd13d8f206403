use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::ast::FunctionLiteral;
use crate::builtins::Builtin;
use crate::environment::Env;

/// Runtime type tag of an [`Object`].
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ObjectType {
    INTEGER,
    FLOAT,
    STRING,
    BOOLEAN,
    NULL,
    ARRAY,
    HASH,
    FUNCTION,
    BUILTIN,
    CLASS,
    INSTANCE,
    BOUND_METHOD,
    ERROR,
    RETURN_VALUE,
    BREAK,
    CONTINUE,
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A runtime value.
///
/// `ReturnValue`, `Break`, `Continue` and `Error` are control objects: the
/// nearest enclosing statement sequence, loop or call boundary interprets
/// them to unwind evaluation. No literal ever produces one.
#[derive(Clone)]
pub enum Object {
    Integer(i64),
    Float(f64),
    Str(String),
    Boolean(bool),
    Null,
    Array(Rc<Vec<Object>>),
    Hash(Rc<HashObject>),
    Function(Rc<Function>),
    Builtin(Builtin),
    Class(Rc<Class>),
    Instance(Rc<RefCell<Instance>>),
    BoundMethod(Rc<BoundMethod>),
    Error(String),
    ReturnValue(Box<Object>),
    Break,
    Continue,
}

impl Object {
    pub fn error<S: Into<String>>(message: S) -> Self {
        Object::Error(message.into())
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            Object::Integer(_) => ObjectType::INTEGER,
            Object::Float(_) => ObjectType::FLOAT,
            Object::Str(_) => ObjectType::STRING,
            Object::Boolean(_) => ObjectType::BOOLEAN,
            Object::Null => ObjectType::NULL,
            Object::Array(_) => ObjectType::ARRAY,
            Object::Hash(_) => ObjectType::HASH,
            Object::Function(_) => ObjectType::FUNCTION,
            Object::Builtin(_) => ObjectType::BUILTIN,
            Object::Class(_) => ObjectType::CLASS,
            Object::Instance(_) => ObjectType::INSTANCE,
            Object::BoundMethod(_) => ObjectType::BOUND_METHOD,
            Object::Error(_) => ObjectType::ERROR,
            Object::ReturnValue(_) => ObjectType::RETURN_VALUE,
            Object::Break => ObjectType::BREAK,
            Object::Continue => ObjectType::CONTINUE,
        }
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self, Object::Error(_))
    }

    /// Control objects stop a statement sequence.
    #[inline]
    pub fn is_control(&self) -> bool {
        matches!(
            self,
            Object::Error(_) | Object::ReturnValue(_) | Object::Break | Object::Continue
        )
    }

    /// Only `false` and `null` are falsy.
    #[inline]
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Object::Boolean(false) | Object::Null)
    }

    /// Strip a `ReturnValue` wrapper.
    pub fn unwrap_return(self) -> Object {
        match self {
            Object::ReturnValue(inner) => *inner,
            other => other,
        }
    }

    pub fn hash_key(&self) -> Option<HashKey> {
        match self {
            Object::Integer(n) => Some(HashKey::Integer(*n)),
            Object::Boolean(b) => Some(HashKey::Boolean(*b)),
            Object::Str(s) => Some(HashKey::Str(s.clone())),
            _ => None,
        }
    }

    /// Canonical string form surfaced to consoles and visualizers.
    pub fn inspect(&self) -> String {
        match self {
            Object::Integer(n) => {
                let mut buf = itoa::Buffer::new();
                buf.format(*n).to_owned()
            }

            Object::Float(n) => format_float(*n),

            Object::Str(s) => s.clone(),

            Object::Boolean(b) => b.to_string(),

            Object::Null => "null".to_owned(),

            Object::Array(elements) => {
                let items: Vec<String> = elements.iter().map(Object::inspect_nested).collect();
                format!("[{}]", items.join(", "))
            }

            Object::Hash(hash) => {
                let items: Vec<String> = hash
                    .pairs
                    .values()
                    .map(|pair| {
                        format!("{}: {}", pair.key.inspect_nested(), pair.value.inspect_nested())
                    })
                    .collect();
                format!("{{{}}}", items.join(", "))
            }

            Object::Function(function) => {
                format!("<fn {}({})>", function.name(), function.parameter_list())
            }

            Object::Builtin(builtin) => format!("<builtin {}>", builtin.name()),

            Object::Class(class) => format!("<class {}>", class.name),

            Object::Instance(instance) => format!("<{} instance>", instance.borrow().class.name),

            Object::BoundMethod(bound) => format!("<method {}>", bound.qualified_name()),

            Object::Error(message) => format!("ERROR: {}", message),

            Object::ReturnValue(inner) => inner.inspect(),

            Object::Break => "break".to_owned(),

            Object::Continue => "continue".to_owned(),
        }
    }

    /// Like [`inspect`](Self::inspect) but quotes strings, for elements of
    /// arrays and hashes.
    fn inspect_nested(&self) -> String {
        match self {
            Object::Str(s) => format!("{:?}", s),
            other => other.inspect(),
        }
    }
}

/// `3.0` keeps its fractional digit so floats stay distinguishable from
/// integers; everything else uses the shortest round‑trip form.
pub fn format_float(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e16 {
        format!("{:.1}", n)
    } else {
        n.to_string()
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inspect())
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.object_type(), self.inspect())
    }
}

impl Serialize for Object {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Object", 2)?;
        state.serialize_field("type", &self.object_type())?;
        state.serialize_field("value", &self.inspect())?;
        state.end()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Composite values
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum HashKey {
    Integer(i64),
    Boolean(bool),
    Str(String),
}

#[derive(Debug, Clone)]
pub struct HashPair {
    pub key: Object,
    pub value: Object,
}

#[derive(Debug, Clone, Default)]
pub struct HashObject {
    pub pairs: BTreeMap<HashKey, HashPair>,
}

/// A closure: a shared function literal plus the environment captured when
/// the literal was evaluated.
pub struct Function {
    pub name: Option<String>,
    pub literal: Rc<FunctionLiteral>,
    pub env: Env,
}

impl Function {
    pub fn new(literal: Rc<FunctionLiteral>, env: Env) -> Self {
        Self {
            name: literal.name.clone(),
            literal,
            env,
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }

    pub fn arity(&self) -> usize {
        self.literal.parameters.len()
    }

    pub fn parameter_list(&self) -> String {
        self.literal
            .parameters
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub struct Class {
    pub name: String,
    pub superclass: Option<Rc<Class>>,
    /// Methods by name; the constructor is stored as `init`.
    pub methods: HashMap<String, Rc<Function>>,
}

impl Class {
    /// Find `name` on `class` or its ancestors, returning the method and the
    /// class that defines it.
    pub fn find_method(class: &Rc<Class>, name: &str) -> Option<(Rc<Function>, Rc<Class>)> {
        let mut current = Some(Rc::clone(class));

        while let Some(candidate) = current {
            if let Some(method) = candidate.methods.get(name) {
                return Some((Rc::clone(method), candidate));
            }

            current = candidate.superclass.clone();
        }

        None
    }
}

pub struct Instance {
    pub class: Rc<Class>,
    pub fields: HashMap<String, Object>,
}

/// A method looked up on an instance; `owner` is the class defining it and
/// anchors `super` inside the method body.
pub struct BoundMethod {
    pub receiver: Rc<RefCell<Instance>>,
    pub method: Rc<Function>,
    pub owner: Rc<Class>,
}

impl BoundMethod {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.owner.name, self.method.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inspect_forms() {
        assert_eq!(Object::Integer(-42).inspect(), "-42");
        assert_eq!(Object::Float(3.0).inspect(), "3.0");
        assert_eq!(Object::Float(0.25).inspect(), "0.25");
        assert_eq!(Object::Null.inspect(), "null");

        let array = Object::Array(Rc::new(vec![Object::Integer(1), Object::Str("a".into())]));
        assert_eq!(array.inspect(), "[1, \"a\"]");
        assert_eq!(Object::error("boom").inspect(), "ERROR: boom");
    }

    #[test]
    fn truthiness_only_false_and_null_are_falsy() {
        assert!(!Object::Boolean(false).is_truthy());
        assert!(!Object::Null.is_truthy());
        assert!(Object::Integer(0).is_truthy());
        assert!(Object::Str(String::new()).is_truthy());
        assert!(Object::Array(Rc::new(Vec::new())).is_truthy());
    }
}
