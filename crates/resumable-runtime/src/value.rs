//! Dynamic values of the reference runtime.

use std::fmt;

use resumable_ast::Constant;

use crate::completion::{Awaitable, Completion};

/// A user-level exception.
///
/// Catch handlers match on `kind`; a handler without a kind catches
/// everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Exception {
    pub kind: String,
    pub message: String,
}

impl Exception {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new("TypeError", message)
    }

    pub fn matches(&self, kind: Option<&str>) -> bool {
        kind.is_none_or(|kind| kind == self.kind)
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Unit,
    Bool(bool),
    Int(i64),
    Str(String),
    Exception(Exception),
    Awaitable(Completion),
}

impl Value {
    pub fn str(value: impl Into<String>) -> Self {
        Self::Str(value.into())
    }

    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Str(_) => "str",
            Self::Exception(_) => "exception",
            Self::Awaitable(_) => "awaitable",
        }
    }

    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Truth value of a branch test: booleans, and integers other than zero.
    pub fn truthy(&self) -> Result<bool, Exception> {
        match self {
            Self::Bool(value) => Ok(*value),
            Self::Int(value) => Ok(*value != 0),
            other => Err(Exception::type_error(format!(
                "a {} cannot be used as a condition",
                other.type_name()
            ))),
        }
    }

    /// The exception raised by `throw value`.
    pub fn into_exception(self) -> Exception {
        match self {
            Self::Exception(exception) => exception,
            Self::Str(message) => Exception::new("Error", message),
            other => Exception::new("Error", other.to_string()),
        }
    }
}

impl From<&Constant> for Value {
    fn from(constant: &Constant) -> Self {
        match constant {
            Constant::Unit => Self::Unit,
            Constant::Bool(value) => Self::Bool(*value),
            Constant::Int(value) => Self::Int(*value),
            Constant::Str(value) => Self::Str(value.clone()),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => f.write_str("()"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Str(value) => f.write_str(value),
            Self::Exception(exception) => write!(f, "{exception}"),
            Self::Awaitable(completion) => {
                let state = if completion.is_completed() {
                    "completed"
                } else {
                    "pending"
                };
                write!(f, "<awaitable {state}>")
            }
        }
    }
}
