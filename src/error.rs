//! Error types for codegrade
//!
//! Analyzers never fail: they turn problems into report issues. This error
//! type covers the pieces that can fail internally (lexing, parsing and
//! executing learner scripts, loading configuration) and is converted into
//! result fields at the public boundary.

use std::fmt;
use thiserror::Error;

/// Source location in script text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// Line number (1-indexed)
    pub line: u32,
    /// Column number (1-indexed)
    pub column: u32,
    /// Byte offset in source
    pub offset: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Render the offending line (with one line of context on each side) and a
/// caret under the reported column.
pub fn format_error_context(source: &str, location: &SourceLocation) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let idx = location.line.saturating_sub(1) as usize;
    let Some(current) = lines.get(idx) else {
        return String::new();
    };

    let width = (location.line as usize + 1).to_string().len().max(3);
    let mut out = String::new();
    if idx > 0 {
        out.push_str(&format!("{:>width$} | {}\n", idx, lines[idx - 1]));
    }
    out.push_str(&format!("{:>width$} | {}\n", location.line, current));
    out.push_str(&format!(
        "{:>width$} | {}^\n",
        "",
        " ".repeat(location.column.saturating_sub(1) as usize)
    ));
    if let Some(next) = lines.get(idx + 1) {
        out.push_str(&format!("{:>width$} | {}\n", idx + 2, next));
    }
    out
}

/// Main error type for codegrade
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// Lexer error - invalid token or character
    #[error("SyntaxError: {message} at {location}")]
    LexerError {
        message: String,
        location: SourceLocation,
        source_context: String,
    },

    /// Parser error - invalid or unsupported syntax
    #[error("SyntaxError: {message} at {location}")]
    ParseError {
        message: String,
        location: SourceLocation,
        source_context: String,
    },

    /// An exception escaped learner code
    #[error("{kind}: {message}")]
    RuntimeError { kind: ErrorKind, message: String },

    /// A thrown value that is not an Error object
    #[error("Uncaught {0}")]
    Thrown(String),

    /// Execution exceeded its time budget
    #[error("Execution timed out after {limit_ms}ms")]
    Timeout { limit_ms: u64 },

    /// Invalid configuration
    #[error("ConfigError: {0}")]
    ConfigError(String),

    /// IO error
    #[error("IOError: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },
}

/// JavaScript error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::enum_variant_names)]
pub enum ErrorKind {
    /// TypeError - wrong type for operation
    TypeError,
    /// ReferenceError - undefined variable
    ReferenceError,
    /// RangeError - value out of range
    RangeError,
    /// SyntaxError - raised at runtime (JSON.parse, RegExp)
    SyntaxError,
    /// AssertionError - failed `expect` matcher
    AssertionError,
    /// Generic Error - user-thrown Error objects
    GenericError,
}

impl ErrorKind {
    /// The constructor name learner code sees for this kind
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::TypeError => "TypeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::AssertionError => "AssertionError",
            ErrorKind::GenericError => "Error",
        }
    }

    /// Map an error object's `name` back to a kind; unknown names are generic
    pub fn from_name(name: &str) -> Self {
        match name {
            "TypeError" => ErrorKind::TypeError,
            "ReferenceError" => ErrorKind::ReferenceError,
            "RangeError" => ErrorKind::RangeError,
            "SyntaxError" => ErrorKind::SyntaxError,
            "AssertionError" => ErrorKind::AssertionError,
            _ => ErrorKind::GenericError,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Error {
    /// Create a new lexer error with source context
    pub fn lexer_error_with_context(
        message: impl Into<String>,
        location: SourceLocation,
        source: &str,
    ) -> Self {
        Error::LexerError {
            message: message.into(),
            source_context: format_error_context(source, &location),
            location,
        }
    }

    /// Create a new parse error with source context
    pub fn parse_error_with_context(
        message: impl Into<String>,
        location: SourceLocation,
        source: &str,
    ) -> Self {
        Error::ParseError {
            message: message.into(),
            source_context: format_error_context(source, &location),
            location,
        }
    }

    /// Create a runtime error of the given kind
    pub fn runtime(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error::RuntimeError {
            kind,
            message: message.into(),
        }
    }

    /// Create a TypeError
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::runtime(ErrorKind::TypeError, message)
    }

    /// Create a ReferenceError
    pub fn reference_error(message: impl Into<String>) -> Self {
        Self::runtime(ErrorKind::ReferenceError, message)
    }

    /// Source snippet with caret, if this is a syntax error
    pub fn source_context(&self) -> Option<&str> {
        match self {
            Error::LexerError { source_context, .. } | Error::ParseError { source_context, .. }
                if !source_context.is_empty() =>
            {
                Some(source_context)
            }
            _ => None,
        }
    }

    /// Message without the kind prefix, as a learner's `catch (e)` would see
    /// it through `e.message`
    pub fn message(&self) -> String {
        match self {
            Error::LexerError { message, .. } | Error::ParseError { message, .. } => {
                message.clone()
            }
            Error::RuntimeError { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Result type for codegrade operations
pub type Result<T> = std::result::Result<T, Error>;

/// Canonical runtime messages, worded the way browser engines word them so
/// that hint patterns match learner expectations.
pub mod messages {
    /// `x is not defined`
    pub fn not_defined(name: &str) -> String {
        format!("{} is not defined", name)
    }

    /// `x is not a function`
    pub fn not_a_function(what: &str) -> String {
        format!("{} is not a function", what)
    }

    /// `Cannot read properties of undefined (reading 'foo')`
    pub fn cannot_read(base: &str, key: &str) -> String {
        format!("Cannot read properties of {} (reading '{}')", base, key)
    }

    /// `Cannot set properties of null (setting 'foo')`
    pub fn cannot_set(base: &str, key: &str) -> String {
        format!("Cannot set properties of {} (setting '{}')", base, key)
    }

    pub const CONST_ASSIGNMENT: &str = "Assignment to constant variable.";
    pub const STACK_OVERFLOW: &str = "Maximum call stack size exceeded";

    /// `Cannot access 'x' before initialization`
    pub fn before_init(name: &str) -> String {
        format!("Cannot access '{}' before initialization", name)
    }

    /// `Identifier 'x' has already been declared`
    pub fn already_declared(name: &str) -> String {
        format!("Identifier '{}' has already been declared", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_context_points_at_column() {
        let source = "let a = 1;\nlet b = ;\nlet c = 3;";
        let loc = SourceLocation {
            line: 2,
            column: 9,
            offset: 19,
        };
        let ctx = format_error_context(source, &loc);
        let lines: Vec<&str> = ctx.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].ends_with("let b = ;"));
        assert!(lines[2].ends_with("        ^"));
    }

    #[test]
    fn test_error_context_out_of_range() {
        let loc = SourceLocation {
            line: 9,
            column: 1,
            offset: 0,
        };
        assert!(format_error_context("x", &loc).is_empty());
    }

    #[test]
    fn test_runtime_error_display() {
        let err = Error::reference_error(messages::not_defined("foo"));
        assert_eq!(err.to_string(), "ReferenceError: foo is not defined");
        assert_eq!(err.message(), "foo is not defined");
    }

    #[test]
    fn test_error_kind_names_round_trip() {
        for kind in [
            ErrorKind::TypeError,
            ErrorKind::ReferenceError,
            ErrorKind::RangeError,
            ErrorKind::SyntaxError,
            ErrorKind::AssertionError,
        ] {
            assert_eq!(ErrorKind::from_name(kind.name()), kind);
        }
        assert_eq!(ErrorKind::from_name("CustomError"), ErrorKind::GenericError);
    }
}
