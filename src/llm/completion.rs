//! Completion call contract shared by real and scripted clients.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::conversation::turn::{ContentBlock, ToolCall, Turn, collect_text, collect_tool_calls};
use crate::llm::error::ExternalCallResult;
use crate::tools::registry::ToolSchema;

/// Boxed future type for completion calls.
pub type CompletionFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Request body of one completion call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model identifier.
    pub model: String,
    /// Output token budget.
    pub max_tokens: u32,
    /// Full turn sequence.
    pub messages: Vec<Turn>,
    /// Sampling temperature.
    pub temperature: f64,
    /// Optional system instruction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Optional stop sequences.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
    /// Callable tools.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSchema>,
}

/// Why the model stopped generating.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of the answer.
    EndTurn,
    /// The model wants tools executed.
    ToolUse,
    /// Output token budget exhausted.
    MaxTokens,
    /// A stop sequence matched.
    StopSequence,
    /// Any reason this crate does not know about.
    #[serde(other)]
    Other,
}

/// Token accounting reported by the API.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens.
    #[serde(default)]
    pub input_tokens: u64,
    /// Generated tokens.
    #[serde(default)]
    pub output_tokens: u64,
}

/// Response of one completion call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Stop reason; absent is treated as a final answer.
    #[serde(default)]
    pub stop_reason: Option<StopReason>,
    /// Ordered content blocks.
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    /// Token usage.
    #[serde(default)]
    pub usage: Usage,
}

impl CompletionResponse {
    /// Final answer built from text blocks.
    #[must_use]
    pub fn text(blocks: Vec<ContentBlock>) -> Self {
        Self {
            stop_reason: Some(StopReason::EndTurn),
            content: blocks,
            usage: Usage::default(),
        }
    }

    /// Tool request built from blocks that include `tool_use` entries.
    #[must_use]
    pub fn tool_use(blocks: Vec<ContentBlock>) -> Self {
        Self {
            stop_reason: Some(StopReason::ToolUse),
            content: blocks,
            usage: Usage::default(),
        }
    }

    /// Whether the model stopped to request tools.
    #[must_use]
    pub fn requests_tools(&self) -> bool {
        self.stop_reason == Some(StopReason::ToolUse)
    }

    /// Concatenated text blocks.
    #[must_use]
    pub fn joined_text(&self) -> String {
        collect_text(&self.content)
    }

    /// Tool-use blocks as calls.
    #[must_use]
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        collect_tool_calls(&self.content)
    }
}

/// Seam over the external completion API.
pub trait CompletionClient: Send + Sync {
    /// Run one completion call.
    ///
    /// # Errors
    /// Returns an error on transport, status, or decoding failures.
    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> CompletionFuture<'a, ExternalCallResult<CompletionResponse>>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_request_omits_empty_optionals() {
        let request = CompletionRequest {
            model: "m".to_string(),
            max_tokens: 1024,
            messages: vec![Turn::user_text("hi")],
            temperature: 0.0,
            system: None,
            stop_sequences: Vec::new(),
            tools: Vec::new(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("system").is_none());
        assert!(value.get("stop_sequences").is_none());
        assert!(value.get("tools").is_none());
        assert_eq!(value["messages"][0]["content"], "hi");
    }

    #[test]
    fn test_response_decodes_api_shape() {
        let body = json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "model": "claude-3-haiku-20240307",
            "stop_reason": "tool_use",
            "stop_sequence": null,
            "content": [
                {"type": "text", "text": "Checking the time."},
                {"type": "tool_use", "id": "toolu_1", "name": "get_current_datetime", "input": {"format": "%H:%M"}}
            ],
            "usage": {"input_tokens": 10, "output_tokens": 20}
        });
        let response: CompletionResponse = serde_json::from_value(body).unwrap();

        assert!(response.requests_tools());
        assert_eq!(response.joined_text(), "Checking the time.");
        assert_eq!(response.tool_calls()[0].call_id, "toolu_1");
        assert_eq!(response.usage.output_tokens, 20);
    }

    #[test]
    fn test_unknown_stop_reason_is_other() {
        let response: CompletionResponse =
            serde_json::from_value(json!({"stop_reason": "pause_turn", "content": []})).unwrap();
        assert_eq!(response.stop_reason, Some(StopReason::Other));
        assert!(!response.requests_tools());
    }
}
