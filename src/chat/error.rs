//! Error types for chat exchanges.

use thiserror::Error;

use crate::conversation::error::ConversationError;
use crate::llm::error::ExternalCallError;

/// Failures of one chat exchange. Every variant leaves the conversation
/// as it was before the exchange began.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The user message was empty or whitespace.
    #[error("message must not be empty")]
    EmptyMessage,

    /// The model kept requesting tools past the iteration bound.
    #[error("tool loop exceeded {max_iterations} completion calls without a final answer")]
    ToolLoopExceeded {
        /// Configured bound.
        max_iterations: usize,
    },

    /// The completion call failed.
    #[error(transparent)]
    ExternalCall(#[from] ExternalCallError),

    /// A turn would have broken alternation.
    #[error(transparent)]
    Conversation(#[from] ConversationError),
}

/// Convenience result alias for chat exchanges.
pub type ChatResult<T> = Result<T, ChatError>;
