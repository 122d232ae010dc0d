//! Error types for conversation state.

use thiserror::Error;

use crate::conversation::turn::Role;

/// Conversation invariant violation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConversationError {
    /// A turn would break strict user/assistant alternation.
    #[error("turn out of order: expected a {expected} turn, got {found}")]
    OutOfOrder {
        /// Role the sequence requires next.
        expected: Role,
        /// Role that was offered.
        found: Role,
    },
}

/// Convenience result alias for conversation operations.
pub type ConversationResult<T> = Result<T, ConversationError>;
