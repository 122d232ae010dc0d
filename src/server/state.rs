//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::chat::driver::ChatDriver;
use crate::chat::profile::ChatProfile;
use crate::config::AppConfig;
use crate::conversation::store::ConversationStore;
use crate::llm::anthropic::{AnthropicClient, MAX_RETRY_BACKOFF};
use crate::tools::registry::ToolRegistry;
use crate::users::store::{SqliteUserStore, UserStore};

/// Shared application state.
pub struct AppState {
    /// Chat driver bound to the conversation store.
    pub driver: ChatDriver,
    /// Prompt settings for every chat request.
    pub profile: ChatProfile,
    /// User records.
    pub users: Arc<dyn UserStore>,
}

impl AppState {
    /// Assemble state from its parts.
    pub fn new(driver: ChatDriver, profile: ChatProfile, users: Arc<dyn UserStore>) -> Arc<Self> {
        Arc::new(Self {
            driver,
            profile,
            users,
        })
    }

    /// Build the production state: Anthropic client, date/time tools, and
    /// the `SQLite` user database.
    ///
    /// # Errors
    /// Returns an error if the HTTP client or the database cannot be created.
    pub async fn from_config(
        config: &AppConfig,
    ) -> Result<Arc<Self>, Box<dyn std::error::Error + Send + Sync>> {
        let client = AnthropicClient::new(&config.anthropic)
            .map_err(|e| format!("Failed to create Anthropic client: {e}"))?;

        // Per-call deadline covers every retry attempt plus worst-case backoff.
        let attempts = config.anthropic.max_retries.saturating_add(1);
        let call_timeout = config
            .anthropic
            .request_timeout
            .saturating_mul(attempts)
            .saturating_add(MAX_RETRY_BACKOFF.saturating_mul(config.anthropic.max_retries));

        let driver = ChatDriver::new(
            Arc::new(client),
            Arc::new(ToolRegistry::default()),
            Arc::new(ConversationStore::new()),
        )
        .with_model(config.anthropic.model.clone())
        .with_max_tokens(config.anthropic.max_tokens)
        .with_max_iterations(config.chat.max_tool_iterations)
        .with_call_timeout(call_timeout);

        let users = SqliteUserStore::new(&config.database)
            .await
            .map_err(|e| format!("Failed to open user database: {e}"))?;

        Ok(Self::new(driver, config.chat_profile(), Arc::new(users)))
    }
}
