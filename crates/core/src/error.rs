//! Error types for reshape.

use alloc::string::String;
use core::fmt;

/// Result type alias for reshape operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for table derivation, class wiring and persistence.
///
/// Errors are `Clone` so that a single in-flight cache build can hand the
/// same failure to every waiter.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// A required construction field or per-type parameter is missing.
    Configuration {
        message: String,
    },
    /// The table or class is still referenced and cannot be deleted.
    InUse {
        what: &'static str,
        id: u64,
    },
    /// A single parent was required but the table has a different count.
    InvalidParent {
        table: u64,
        count: usize,
    },
    /// An unknown connection side was requested.
    InvalidSide {
        side: String,
    },
    /// Table not found in the registry.
    TableNotFound {
        id: u64,
    },
    /// Class not found in the registry.
    ClassNotFound {
        id: u64,
    },
    /// The class exists but is of another kind.
    ClassKind {
        id: u64,
        expected: &'static str,
    },
    /// No function is registered under this name.
    UnknownFunction {
        kind: &'static str,
        name: String,
    },
    /// A named function failed while running.
    Function {
        name: String,
        message: String,
    },
    /// The operation is not supported by this table type.
    Unsupported {
        message: String,
    },
    /// A reset cancelled the cache build this call was waiting on.
    Cancelled {
        table: u64,
    },
    /// The owning model has been dropped.
    ModelDropped,
    /// The persistence collaborator failed.
    Persistence {
        message: String,
    },
    /// The format collaborator could not produce rows.
    Format {
        message: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Configuration { message } => write!(f, "Configuration error: {}", message),
            Error::InUse { what, id } => write!(f, "Can't delete in-use {} {}", what, id),
            Error::InvalidParent { table, count } => write!(
                f,
                "Table {} has {} parent tables; exactly one is required",
                table, count
            ),
            Error::InvalidSide { side } => write!(f, "Invalid connection side: {}", side),
            Error::TableNotFound { id } => write!(f, "Table not found: {}", id),
            Error::ClassNotFound { id } => write!(f, "Class not found: {}", id),
            Error::ClassKind { id, expected } => {
                write!(f, "Class {} is not a {}", id, expected)
            }
            Error::UnknownFunction { kind, name } => {
                write!(f, "No {} function named {}", kind, name)
            }
            Error::Function { name, message } => {
                write!(f, "Function {} failed: {}", name, message)
            }
            Error::Unsupported { message } => write!(f, "Unsupported operation: {}", message),
            Error::Cancelled { table } => {
                write!(f, "Cache build for table {} was cancelled by a reset", table)
            }
            Error::ModelDropped => f.write_str("The owning model has been dropped"),
            Error::Persistence { message } => write!(f, "Persistence error: {}", message),
            Error::Format { message } => write!(f, "Format error: {}", message),
        }
    }
}

impl Error {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Creates an in-use error.
    pub fn in_use(what: &'static str, id: u64) -> Self {
        Error::InUse { what, id }
    }

    /// Creates an invalid parent count error.
    pub fn invalid_parent(table: u64, count: usize) -> Self {
        Error::InvalidParent { table, count }
    }

    /// Creates an invalid side error.
    pub fn invalid_side(side: impl Into<String>) -> Self {
        Error::InvalidSide { side: side.into() }
    }

    /// Creates a table not found error.
    pub fn table_not_found(id: u64) -> Self {
        Error::TableNotFound { id }
    }

    /// Creates a class not found error.
    pub fn class_not_found(id: u64) -> Self {
        Error::ClassNotFound { id }
    }

    /// Creates an unknown function error.
    pub fn unknown_function(kind: &'static str, name: impl Into<String>) -> Self {
        Error::UnknownFunction {
            kind,
            name: name.into(),
        }
    }

    /// Creates a function failure error.
    pub fn function(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Function {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates an unsupported operation error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Error::Unsupported {
            message: message.into(),
        }
    }

    /// Creates a persistence error.
    pub fn persistence(message: impl Into<String>) -> Self {
        Error::Persistence {
            message: message.into(),
        }
    }

    /// Creates a format error.
    pub fn format(message: impl Into<String>) -> Self {
        Error::Format {
            message: message.into(),
        }
    }

    /// Returns true for the in-use deletion guard.
    pub fn is_in_use(&self) -> bool {
        matches!(self, Error::InUse { .. })
    }
}
