//! References to named functions.
//!
//! Derived attributes, filters and reducers are never stored as closures.
//! Tables hold a `FunctionRef` (a registered name plus literal parameters),
//! which the model resolves against its function registry at run time and
//! which persists as plain data.

use crate::value::Value;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// A named function together with its literal parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionRef {
    /// Registered function name.
    pub name: String,
    /// Literal parameters passed on every call.
    pub params: Vec<Value>,
}

impl FunctionRef {
    /// Creates a reference with no parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// Appends a parameter.
    pub fn with_param(mut self, param: impl Into<Value>) -> Self {
        self.params.push(param.into());
        self
    }

    /// Returns the parameter at `position`, or Null.
    pub fn param(&self, position: usize) -> Value {
        self.params.get(position).cloned().unwrap_or(Value::Null)
    }
}

impl fmt::Display for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", p)?;
        }
        f.write_str(")")
    }
}
