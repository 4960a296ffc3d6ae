use thiserror::Error;

/// Authoring error detected before a program starts running.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("SyntaxError: line {line}, column {column}: {message}")]
pub struct SyntaxError {
    line: u32,
    column: u32,
    message: String,
}

impl SyntaxError {
    /// Creates a syntax error anchored at a one-based line and column.
    #[must_use]
    pub fn new(line: u32, column: u32, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }

    /// One-based line of the offending token.
    #[must_use]
    pub const fn line(&self) -> u32 {
        self.line
    }

    /// One-based column of the offending token.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Description of the problem without the position prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}
