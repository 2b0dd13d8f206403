//! Built-in functions, resolved after the environment chain misses.

use std::fmt;
use std::rc::Rc;

use phf::phf_map;

use crate::object::Object;
use crate::output::{OutputKind, OutputSink};

type BuiltinFn = fn(&[Object], &mut dyn OutputSink) -> Object;

#[derive(Clone, Copy)]
pub struct Builtin {
    name: &'static str,
    func: BuiltinFn,
}

impl Builtin {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn call(&self, arguments: &[Object], sink: &mut dyn OutputSink) -> Object {
        (self.func)(arguments, sink)
    }
}

impl PartialEq for Builtin {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<builtin {}>", self.name)
    }
}

static BUILTINS: phf::Map<&'static str, Builtin> = phf_map! {
    "print" => Builtin { name: "print", func: print },
    "len" => Builtin { name: "len", func: len },
    "first" => Builtin { name: "first", func: first },
    "last" => Builtin { name: "last", func: last },
    "rest" => Builtin { name: "rest", func: rest },
    "push" => Builtin { name: "push", func: push },
    "type" => Builtin { name: "type", func: type_of },
    "str" => Builtin { name: "str", func: to_str },
};

pub fn lookup(name: &str) -> Option<Builtin> {
    BUILTINS.get(name).copied()
}

pub(crate) fn wrong_arguments(expected: usize, got: usize) -> Object {
    Object::error(format!(
        "wrong number of arguments: expected {}, got {}",
        expected, got
    ))
}

fn unsupported(builtin: &str, argument: &Object) -> Object {
    Object::error(format!(
        "argument to `{}` not supported, got {}",
        builtin,
        argument.object_type()
    ))
}

/// Arguments separated by spaces; strings print without quotes.
fn print(arguments: &[Object], sink: &mut dyn OutputSink) -> Object {
    let line = arguments
        .iter()
        .map(Object::inspect)
        .collect::<Vec<_>>()
        .join(" ");

    sink.emit(OutputKind::Log, line);
    Object::Null
}

fn len(arguments: &[Object], _: &mut dyn OutputSink) -> Object {
    let [argument] = arguments else {
        return wrong_arguments(1, arguments.len());
    };

    let length = match argument {
        Object::Str(s) => s.chars().count(),
        Object::Array(elements) => elements.len(),
        Object::Hash(hash) => hash.pairs.len(),
        other => return unsupported("len", other),
    };

    i64::try_from(length).map_or_else(|_| Object::error("integer overflow"), Object::Integer)
}

fn first(arguments: &[Object], _: &mut dyn OutputSink) -> Object {
    match arguments {
        [Object::Array(elements)] => elements.first().cloned().unwrap_or(Object::Null),
        [other] => unsupported("first", other),
        _ => wrong_arguments(1, arguments.len()),
    }
}

fn last(arguments: &[Object], _: &mut dyn OutputSink) -> Object {
    match arguments {
        [Object::Array(elements)] => elements.last().cloned().unwrap_or(Object::Null),
        [other] => unsupported("last", other),
        _ => wrong_arguments(1, arguments.len()),
    }
}

/// Everything but the first element; `null` for an empty array.
fn rest(arguments: &[Object], _: &mut dyn OutputSink) -> Object {
    match arguments {
        [Object::Array(elements)] if elements.is_empty() => Object::Null,
        [Object::Array(elements)] => Object::Array(Rc::new(elements[1..].to_vec())),
        [other] => unsupported("rest", other),
        _ => wrong_arguments(1, arguments.len()),
    }
}

/// Returns a new array; the argument is left untouched.
fn push(arguments: &[Object], _: &mut dyn OutputSink) -> Object {
    match arguments {
        [Object::Array(elements), value] => {
            let mut extended = Vec::with_capacity(elements.len() + 1);
            extended.extend(elements.iter().cloned());
            extended.push(value.clone());
            Object::Array(Rc::new(extended))
        }
        [other, _] => unsupported("push", other),
        _ => wrong_arguments(2, arguments.len()),
    }
}

fn type_of(arguments: &[Object], _: &mut dyn OutputSink) -> Object {
    match arguments {
        [argument] => Object::Str(argument.object_type().to_string()),
        _ => wrong_arguments(1, arguments.len()),
    }
}

fn to_str(arguments: &[Object], _: &mut dyn OutputSink) -> Object {
    match arguments {
        [argument] => Object::Str(argument.inspect()),
        _ => wrong_arguments(1, arguments.len()),
    }
}
