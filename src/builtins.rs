//! Names every program starts with.

use crate::environment::{Binding, Environment};
use crate::error::RuntimeFault;
use crate::value::Value;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Print,
    DateNow,
}

/// Builtin objects reached through member access, like `Date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    Date,
}

/// What a builtin may touch while it runs.
pub trait BuiltinContext {
    fn emit(&mut self, line: String);
    fn now(&self) -> SystemTime;
}

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::DateNow => "Date.now",
        }
    }

    pub fn call(self, args: &[Value], context: &mut dyn BuiltinContext) -> Result<Value, RuntimeFault> {
        match self {
            Builtin::Print => {
                let line = args
                    .iter()
                    .map(|arg| arg.to_string())
                    .collect::<Vec<_>>()
                    .join(" ");
                context.emit(line);
                Ok(Value::Undefined)
            }
            Builtin::DateNow => {
                let millis = context
                    .now()
                    .duration_since(UNIX_EPOCH)
                    .map(|elapsed| elapsed.as_secs_f64() * 1000.0)
                    .unwrap_or_default();
                Ok(Value::Float(millis))
            }
        }
    }
}

impl Record {
    pub fn name(self) -> &'static str {
        match self {
            Record::Date => "Date",
        }
    }

    pub fn member(self, property: &str) -> Result<Value, RuntimeFault> {
        match (self, property) {
            (Record::Date, "now") => Ok(Value::Builtin(Builtin::DateNow)),
            _ => Err(RuntimeFault::MissingMember(property.to_string())),
        }
    }
}

pub fn install(environment: &mut Environment) {
    environment.define_global("print", Binding::new(Value::Builtin(Builtin::Print)));
    environment.define_global("Date", Binding::new(Value::Record(Record::Date)));
}
