//! Tool-augmented chat driver.
//!
//! One exchange appends the user message, then alternates completion calls
//! and local tool execution until the model answers without requesting
//! tools. The session lock is held for the whole exchange and the appended
//! turns are committed only on success; errors and cancellation roll them
//! back.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::chat::error::{ChatError, ChatResult};
use crate::chat::profile::ChatProfile;
use crate::config::DEFAULT_MODEL;
use crate::conversation::session::SessionKey;
use crate::conversation::store::{ConversationStore, Exchange};
use crate::conversation::turn::{ToolResult, Turn};
use crate::llm::completion::{CompletionClient, CompletionRequest, CompletionResponse};
use crate::llm::error::ExternalCallError;
use crate::tools::registry::{ToolRegistry, ToolSchema};

/// Default bound on completion calls per exchange.
pub const DEFAULT_MAX_ITERATIONS: usize = 10;
/// Default output token budget.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Result of a successful exchange.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatOutcome {
    /// Concatenated text of the final assistant turn.
    pub reply: String,
    /// Full turn sequence after the exchange.
    pub history: Vec<Turn>,
    /// Completion calls made.
    pub rounds: usize,
}

/// Runs chat exchanges against a completion client and a tool registry.
#[derive(Clone)]
pub struct ChatDriver {
    client: Arc<dyn CompletionClient>,
    tools: Arc<ToolRegistry>,
    store: Arc<ConversationStore>,
    model: String,
    max_tokens: u32,
    max_iterations: usize,
    call_timeout: Option<Duration>,
}

impl ChatDriver {
    /// Create a driver with default model and limits.
    #[must_use]
    pub fn new(
        client: Arc<dyn CompletionClient>,
        tools: Arc<ToolRegistry>,
        store: Arc<ConversationStore>,
    ) -> Self {
        Self {
            client,
            tools,
            store,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            call_timeout: None,
        }
    }

    /// Set the model identifier.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the output token budget.
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the completion-call bound; values below one are raised to one.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Deadline for each completion call, retries included.
    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Conversation store the driver appends to.
    #[must_use]
    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    /// Run one exchange on a session.
    ///
    /// # Errors
    /// Returns `EmptyMessage` for blank input, `ToolLoopExceeded` when the
    /// model never stops requesting tools, or the completion call's error.
    /// The session is left unchanged on every error.
    pub async fn send(
        &self,
        session: &SessionKey,
        message: &str,
        profile: &ChatProfile,
    ) -> ChatResult<ChatOutcome> {
        if message.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let mut conversation = self.store.lock(session).await;
        let mut exchange = Exchange::begin(&mut conversation);
        exchange.push(Turn::user_text(message))?;

        let schemas = self.tools.schemas();
        for round in 1..=self.max_iterations {
            let request = self.build_request(exchange.turns(), profile, &schemas);
            let response = self.call(&request).await?;
            let calls = response.tool_calls();

            if response.requests_tools() && !calls.is_empty() {
                debug!(session = %session, round, calls = calls.len(), "model requested tools");
                exchange.push(Turn::assistant(response.content))?;
                let results: Vec<ToolResult> =
                    calls.iter().map(|call| self.tools.execute(call)).collect();
                exchange.push(Turn::tool_results(results))?;
                continue;
            }

            let reply = response.joined_text();
            exchange.push(Turn::assistant(response.content))?;
            let appended = exchange.appended();
            let history = exchange.commit();
            info!(session = %session, rounds = round, appended, "chat exchange completed");
            return Ok(ChatOutcome {
                reply,
                history,
                rounds: round,
            });
        }

        Err(ChatError::ToolLoopExceeded {
            max_iterations: self.max_iterations,
        })
    }

    fn build_request(
        &self,
        turns: &[Turn],
        profile: &ChatProfile,
        schemas: &[ToolSchema],
    ) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: turns.to_vec(),
            temperature: profile.temperature,
            system: profile.system_prompt.clone(),
            stop_sequences: profile.stop_sequences.clone(),
            tools: schemas.to_vec(),
        }
    }

    async fn call(&self, request: &CompletionRequest) -> ChatResult<CompletionResponse> {
        let Some(limit) = self.call_timeout else {
            return Ok(self.client.complete(request).await?);
        };
        let response = tokio::time::timeout(limit, self.client.complete(request))
            .await
            .map_err(|_| ExternalCallError::Timeout(limit))??;
        Ok(response)
    }
}
