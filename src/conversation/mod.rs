//! Conversation state: turns, session keys and the per-session store.

pub mod error;
pub mod session;
pub mod store;
pub mod turn;

pub use error::{ConversationError, ConversationResult};
pub use session::{DEFAULT_SESSION_KEY, SessionKey};
pub use store::{Conversation, ConversationGuard, ConversationStore, Exchange};
pub use turn::{ContentBlock, Role, ToolCall, ToolResult, Turn, TurnContent};
