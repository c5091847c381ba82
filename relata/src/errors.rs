use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::common::{atomic, Atomic};

/// Error kinds for repository operations.
///
/// Caller misuse of the relation API (unknown relation, missing identity,
/// unsupported foreign reference) is not an error kind: those paths answer with
/// `false`, `None` or `0`. The kinds below cover failures that must reach the caller.
///
/// # Examples
///
/// ```rust,ignore
/// use relata::errors::{RelataError, ErrorKind, RelataResult};
///
/// fn example() -> RelataResult<()> {
///     Err(RelataError::new("insert rejected", ErrorKind::StorageError))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// The storage mapper failed to execute an operation
    StorageError,
    /// The requested resource was not found
    NotFound,
    /// The operation is not valid in the current context
    InvalidOperation,
    /// A relation definition is missing or inconsistent
    InvalidRelation,
    /// Entity type metadata is missing or inconsistent
    MetadataError,
    /// The entity carries no identity where one is required
    NotIdentifiable,
    /// A lifecycle or relation hook rejected the operation
    HookError,
    /// A table lock could not be acquired or released
    LockError,
    /// The entity manager was configured inconsistently
    ConfigError,
    /// A value has a type the operation cannot work with
    InvalidDataType,
    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::StorageError => write!(f, "Storage error"),
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::InvalidRelation => write!(f, "Invalid relation"),
            ErrorKind::MetadataError => write!(f, "Metadata error"),
            ErrorKind::NotIdentifiable => write!(f, "Not identifiable"),
            ErrorKind::HookError => write!(f, "Hook error"),
            ErrorKind::LockError => write!(f, "Lock error"),
            ErrorKind::ConfigError => write!(f, "Configuration error"),
            ErrorKind::InvalidDataType => write!(f, "Invalid data type"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Error type of the crate.
///
/// `RelataError` carries a message, a kind, an optional cause and the backtrace
/// captured where it was created.
///
/// ```rust,ignore
/// use relata::errors::{RelataError, ErrorKind};
///
/// let cause = RelataError::new("connection reset", ErrorKind::StorageError);
/// let err = RelataError::new_with_cause("save failed", ErrorKind::StorageError, cause);
/// ```
#[derive(Clone)]
pub struct RelataError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<RelataError>>,
    backtrace: Atomic<Backtrace>,
}

impl RelataError {
    /// Creates a new `RelataError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        RelataError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new()),
        }
    }

    /// Creates a new `RelataError` wrapping a cause error.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: RelataError) -> Self {
        RelataError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&RelataError> {
        self.cause.as_deref()
    }
}

impl Display for RelataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for RelataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace.read()),
        }
    }
}

impl Error for RelataError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// `RelataResult<T>` is shorthand for `Result<T, RelataError>`.
pub type RelataResult<T> = Result<T, RelataError>;

impl From<std::fmt::Error> for RelataError {
    fn from(err: std::fmt::Error) -> Self {
        RelataError::new(
            &format!("Formatting error: {}", err),
            ErrorKind::InternalError,
        )
    }
}

impl From<String> for RelataError {
    fn from(msg: String) -> Self {
        RelataError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for RelataError {
    fn from(msg: &str) -> Self {
        RelataError::new(msg, ErrorKind::InternalError)
    }
}
