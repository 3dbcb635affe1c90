use crate::ast::FunctionDecl;
use crate::builtins::{Builtin, Record};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    /// Neither true nor false until something asks.
    Maybe,
    Null,
    Undefined,
    Array(Rc<RefCell<Vec<Value>>>),
    Function(Rc<FunctionDecl>),
    /// Reactive cell created by `use(initial)`
    Signal(Rc<RefCell<Value>>),
    Instance(Rc<Instance>),
    Builtin(Builtin),
    Record(Record),
}

/// The single live object of a class.
#[derive(Debug)]
pub struct Instance {
    pub class_name: String,
    pub fields: RefCell<BTreeMap<String, Value>>,
}

impl Value {
    pub fn array(elements: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(elements)))
    }

    /// Truthiness, or `None` for `maybe` which has to be decided by a coin.
    pub fn definite_truth(&self) -> Option<bool> {
        match self {
            Value::Int(n) => Some(*n != 0),
            Value::Float(n) => Some(*n != 0.0),
            Value::Str(s) => Some(!s.is_empty()),
            Value::Bool(b) => Some(*b),
            Value::Maybe => None,
            Value::Null | Value::Undefined => Some(false),
            Value::Array(elements) => Some(!elements.borrow().is_empty()),
            Value::Function(_)
            | Value::Signal(_)
            | Value::Instance(_)
            | Value::Builtin(_)
            | Value::Record(_) => Some(true),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bool(_) => "bool",
            Value::Maybe => "maybe",
            Value::Null => "null",
            Value::Undefined => "undefined",
            Value::Array(_) => "array",
            Value::Function(_) => "function",
            Value::Signal(_) => "signal",
            Value::Instance(_) => "instance",
            Value::Builtin(_) => "builtin",
            Value::Record(_) => "record",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => {
                // Whole floats keep one decimal place so they read differently from ints
                if n.is_finite() && n.fract() == 0.0 {
                    write!(f, "{:.1}", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Str(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Maybe => write!(f, "maybe"),
            Value::Null => write!(f, "null"),
            Value::Undefined => write!(f, "undefined"),
            Value::Array(elements) => {
                write!(f, "[")?;
                for (i, item) in elements.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match item {
                        Value::Str(s) => write!(f, "\"{}\"", s)?,
                        other => write!(f, "{}", other)?,
                    }
                }
                write!(f, "]")
            }
            Value::Function(decl) => write!(f, "<function {}>", decl.name),
            Value::Signal(cell) => write!(f, "<signal {}>", cell.borrow()),
            Value::Instance(instance) => write!(f, "<{} instance>", instance.class_name),
            Value::Builtin(builtin) => write!(f, "<builtin {}>", builtin.name()),
            Value::Record(record) => write!(f, "<{}>", record.name()),
        }
    }
}
