use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::common::{atomic, Atomic};

/// Error kinds for keyvolve operations
///
/// Each kind describes a specific category of failure, enabling precise
/// error handling at the call site.
///
/// # Examples
///
/// ```rust,ignore
/// use keyvolve::errors::{KeyvolveError, ErrorKind, KeyvolveResult};
///
/// fn example() -> KeyvolveResult<()> {
///     Err(KeyvolveError::new("duplicate version 3", ErrorKind::ValidationError))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // Load/validation errors - raised before any migration executes
    /// A migration set or operation argument failed validation
    ValidationError,
    /// A migration body or commit failed during execution
    MigrationError,
    /// The requested transition is invalid for the current version state
    StateError,

    // Store errors
    /// An optimistic precondition no longer held at commit time
    TransactionConflict,
    /// Error from the key-value store backend
    StoreError,
    /// The operation is not valid in the current context
    InvalidOperation,
    /// A stored value did not have the expected type
    InvalidDataType,
    /// The requested resource was not found
    NotFound,

    // IO and encoding errors - raised while loading migration files
    /// Generic IO error
    IOError,
    /// Error encoding or decoding data
    EncodingError,

    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::ValidationError => write!(f, "Validation error"),
            ErrorKind::MigrationError => write!(f, "Migration error"),
            ErrorKind::StateError => write!(f, "State error"),
            ErrorKind::TransactionConflict => write!(f, "Transaction conflict"),
            ErrorKind::StoreError => write!(f, "Store error"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::InvalidDataType => write!(f, "Invalid data type"),
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::IOError => write!(f, "IO error"),
            ErrorKind::EncodingError => write!(f, "Encoding error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom keyvolve error type.
///
/// `KeyvolveError` encapsulates the error message, kind, and an optional
/// cause. It supports error chaining and backtraces for debugging.
///
/// # Examples
///
/// ```rust,ignore
/// use keyvolve::errors::{KeyvolveError, ErrorKind};
///
/// // Create a simple error
/// let err = KeyvolveError::new("version marker missing", ErrorKind::StateError);
///
/// // Create an error with a cause
/// let cause = KeyvolveError::new("IO failed", ErrorKind::IOError);
/// let err = KeyvolveError::new_with_cause("migration load failed", ErrorKind::MigrationError, cause);
/// ```
#[derive(Clone)]
pub struct KeyvolveError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<KeyvolveError>>,
    backtrace: Atomic<Backtrace>,
}

impl KeyvolveError {
    /// Creates a new `KeyvolveError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        KeyvolveError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new()),
        }
    }

    /// Creates a new `KeyvolveError` with a cause error.
    ///
    /// This creates an error chain where the cause error is preserved for
    /// debugging.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: KeyvolveError) -> Self {
        KeyvolveError {
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

    pub fn cause(&self) -> Option<&Box<KeyvolveError>> {
        self.cause.as_ref()
    }
}

impl Display for KeyvolveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for KeyvolveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // print error message with stack trace followed by cause
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace.read()),
        }
    }
}

impl Error for KeyvolveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for keyvolve operations.
///
/// `KeyvolveResult<T>` is shorthand for `Result<T, KeyvolveError>`.
/// All fallible keyvolve operations return this type.
pub type KeyvolveResult<T> = Result<T, KeyvolveError>;

// From trait implementations for automatic error conversion
impl From<std::io::Error> for KeyvolveError {
    fn from(err: std::io::Error) -> Self {
        KeyvolveError::new(&format!("IO error: {}", err), ErrorKind::IOError)
    }
}

impl From<serde_json::Error> for KeyvolveError {
    fn from(err: serde_json::Error) -> Self {
        KeyvolveError::new(
            &format!("JSON encoding error: {}", err),
            ErrorKind::EncodingError,
        )
    }
}

impl From<String> for KeyvolveError {
    fn from(msg: String) -> Self {
        KeyvolveError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for KeyvolveError {
    fn from(msg: &str) -> Self {
        KeyvolveError::new(msg, ErrorKind::InternalError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyvolve_error_new_creates_error() {
        let error = KeyvolveError::new("An error occurred", ErrorKind::StoreError);
        assert_eq!(error.message, "An error occurred");
        assert_eq!(error.error_kind, ErrorKind::StoreError);
        assert!(error.cause.is_none());
    }

    #[test]
    fn keyvolve_error_new_with_cause_creates_error() {
        let cause = KeyvolveError::new("IO Error", ErrorKind::IOError);
        let error =
            KeyvolveError::new_with_cause("An error occurred", ErrorKind::MigrationError, cause);
        assert_eq!(error.message, "An error occurred");
        assert_eq!(error.error_kind, ErrorKind::MigrationError);
        assert!(error.cause.is_some());
    }

    #[test]
    fn keyvolve_error_kind_returns_kind() {
        let error = KeyvolveError::new("An error occurred", ErrorKind::TransactionConflict);
        assert_eq!(error.kind(), &ErrorKind::TransactionConflict);
    }

    #[test]
    fn keyvolve_error_cause_returns_none_when_no_cause() {
        let error = KeyvolveError::new("An error occurred", ErrorKind::StateError);
        assert!(error.cause().is_none());
    }

    #[test]
    fn keyvolve_error_display_formats_correctly() {
        let error = KeyvolveError::new("An error occurred", ErrorKind::StoreError);
        let formatted = format!("{}", error);
        assert_eq!(formatted, "An error occurred");
    }

    #[test]
    fn keyvolve_error_debug_contains_message() {
        let error = KeyvolveError::new("An error occurred", ErrorKind::StoreError);
        let formatted = format!("{:?}", error);
        assert!(formatted.contains("An error occurred"));
    }

    #[test]
    fn keyvolve_error_from_io_error() {
        let io_err = std::io::Error::other("disk gone");
        let error: KeyvolveError = io_err.into();
        assert_eq!(error.kind(), &ErrorKind::IOError);
        assert!(error.message().contains("disk gone"));
    }

    #[test]
    fn keyvolve_error_from_str() {
        let error: KeyvolveError = "boom".into();
        assert_eq!(error.kind(), &ErrorKind::InternalError);
    }

    #[test]
    fn keyvolve_error_source_chains() {
        let cause = KeyvolveError::new("root cause", ErrorKind::IOError);
        let error = KeyvolveError::new_with_cause("wrapper", ErrorKind::MigrationError, cause);
        let source = Error::source(&error);
        assert!(source.is_some());
        assert_eq!(source.unwrap().to_string(), "root cause");
    }

    #[test]
    fn error_kind_display_is_human_readable() {
        assert_eq!(
            format!("{}", ErrorKind::TransactionConflict),
            "Transaction conflict"
        );
        assert_eq!(format!("{}", ErrorKind::ValidationError), "Validation error");
    }
}
