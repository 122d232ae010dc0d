//! Completion API access.
//!
//! - `completion`: request/response types and the `CompletionClient` seam
//! - `anthropic`: Messages API client with retries
//! - `error`: external call failures

pub mod anthropic;
pub mod completion;
pub mod error;

#[cfg(test)]
pub(crate) mod testing;

pub use anthropic::AnthropicClient;
pub use completion::{
    CompletionClient, CompletionFuture, CompletionRequest, CompletionResponse, StopReason, Usage,
};
pub use error::{ExternalCallError, ExternalCallResult};
