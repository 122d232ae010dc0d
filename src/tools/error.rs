//! Error types for local tools.

use thiserror::Error;

/// Errors raised by local tool execution.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Empty or malformed strftime pattern.
    #[error("invalid format string: {0}")]
    InvalidFormat(String),

    /// Duration unit outside the supported set.
    #[error("Unsupported time unit: {0}")]
    UnsupportedUnit(String),

    /// No tool registered under this name.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Missing or mistyped argument.
    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments {
        /// Tool name.
        tool: String,
        /// What was wrong.
        reason: String,
    },

    /// Input timestamp does not match its format.
    #[error("could not parse '{input}' with format '{format}': {source}")]
    Parse {
        /// Offending input.
        input: String,
        /// Format it was parsed against.
        format: String,
        /// Underlying parser error.
        source: chrono::ParseError,
    },

    /// Arithmetic left the representable calendar range.
    #[error("resulting date is out of range")]
    OutOfRange,
}

/// Convenience result alias for tool operations.
pub type ToolsResult<T> = Result<T, ToolError>;
