//! Turn model shared by the conversation store, the driver and the wire format.
//!
//! The shapes serialize to the Messages API layout, so a `Vec<Turn>` can be
//! sent upstream as-is and returned to HTTP callers as `messageHistory`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Author of a turn.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// User input, including tool-result turns.
    User,
    /// Model output.
    Assistant,
}

impl Role {
    /// Stable string form used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            _ => Err(value.to_string()),
        }
    }
}

/// One structured block inside a turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text {
        /// Text payload.
        text: String,
    },
    /// Request from the model to run a local tool.
    ToolUse {
        /// Call identifier echoed back in the matching result.
        id: String,
        /// Tool name.
        name: String,
        /// Tool arguments.
        input: Value,
    },
    /// Output of a local tool, sent back in a user turn.
    ToolResult {
        /// Identifier of the originating `ToolUse` block.
        tool_use_id: String,
        /// Tool output or error description.
        content: String,
        /// Set when the tool failed.
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

impl ContentBlock {
    /// Build a text block.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// Turn payload: bare text or an ordered list of blocks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TurnContent {
    /// Raw user text.
    Text(String),
    /// Structured blocks.
    Blocks(Vec<ContentBlock>),
}

/// A single immutable message in a conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Author.
    pub role: Role,
    /// Payload.
    pub content: TurnContent,
}

impl Turn {
    /// User turn carrying raw text.
    #[must_use]
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Text(text.into()),
        }
    }

    /// User turn carrying tool results, in call order.
    #[must_use]
    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Blocks(results.into_iter().map(ContentBlock::from).collect()),
        }
    }

    /// Assistant turn preserving the model's blocks verbatim.
    #[must_use]
    pub const fn assistant(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content: TurnContent::Blocks(blocks),
        }
    }

    /// Concatenation of every text segment in the turn.
    #[must_use]
    pub fn text(&self) -> String {
        match &self.content {
            TurnContent::Text(text) => text.clone(),
            TurnContent::Blocks(blocks) => collect_text(blocks),
        }
    }

    /// Tool calls requested by this turn, in block order.
    #[must_use]
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        match &self.content {
            TurnContent::Text(_) => Vec::new(),
            TurnContent::Blocks(blocks) => collect_tool_calls(blocks),
        }
    }
}

/// Concatenate the text blocks of a block sequence.
#[must_use]
pub fn collect_text(blocks: &[ContentBlock]) -> String {
    let mut out = String::new();
    for block in blocks {
        if let ContentBlock::Text { text } = block {
            out.push_str(text);
        }
    }
    out
}

/// Extract the tool-use blocks of a block sequence.
#[must_use]
pub fn collect_tool_calls(blocks: &[ContentBlock]) -> Vec<ToolCall> {
    blocks
        .iter()
        .filter_map(|block| match block {
            ContentBlock::ToolUse { id, name, input } => Some(ToolCall {
                call_id: id.clone(),
                name: name.clone(),
                arguments: match input {
                    Value::Object(map) => map.clone(),
                    _ => Map::new(),
                },
            }),
            _ => None,
        })
        .collect()
}

/// A tool invocation requested by the model.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolCall {
    /// Tool name.
    pub name: String,
    /// Named arguments; non-object inputs become an empty map.
    pub arguments: Map<String, Value>,
    /// Opaque call identifier.
    pub call_id: String,
}

/// Locally produced output for one tool call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolResult {
    /// Identifier of the call this answers.
    pub call_id: String,
    /// Output text, or an error description when `is_error` is set.
    pub output: String,
    /// Whether the tool failed.
    pub is_error: bool,
}

impl From<ToolResult> for ContentBlock {
    fn from(result: ToolResult) -> Self {
        Self::ToolResult {
            tool_use_id: result.call_id,
            content: result.output,
            is_error: result.is_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_text_serializes_as_plain_string() {
        let turn = Turn::user_text("hello");
        let value = serde_json::to_value(&turn).unwrap();
        assert_eq!(value, json!({"role": "user", "content": "hello"}));
    }

    #[test]
    fn test_assistant_blocks_keep_tool_use_layout() {
        let turn = Turn::assistant(vec![
            ContentBlock::text("Let me check."),
            ContentBlock::ToolUse {
                id: "toolu_1".to_string(),
                name: "get_current_datetime".to_string(),
                input: json!({"format": "%Y"}),
            },
        ]);
        let value = serde_json::to_value(&turn).unwrap();
        assert_eq!(value["role"], "assistant");
        assert_eq!(value["content"][1]["type"], "tool_use");
        assert_eq!(value["content"][1]["id"], "toolu_1");

        let restored: Turn = serde_json::from_value(value).unwrap();
        assert_eq!(restored, turn);
    }

    #[test]
    fn test_tool_result_omits_is_error_when_false() {
        let turn = Turn::tool_results(vec![ToolResult {
            call_id: "toolu_1".to_string(),
            output: "2024".to_string(),
            is_error: false,
        }]);
        let value = serde_json::to_value(&turn).unwrap();
        assert_eq!(
            value["content"][0],
            json!({"type": "tool_result", "tool_use_id": "toolu_1", "content": "2024"})
        );
    }

    #[test]
    fn test_text_and_tool_call_extraction() {
        let turn = Turn::assistant(vec![
            ContentBlock::text("It is "),
            ContentBlock::ToolUse {
                id: "a".to_string(),
                name: "x".to_string(),
                input: json!("not an object"),
            },
            ContentBlock::text("now."),
        ]);
        assert_eq!(turn.text(), "It is now.");

        let calls = turn.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].call_id, "a");
        assert!(calls[0].arguments.is_empty());
    }

    #[test]
    fn test_role_round_trip() {
        assert_eq!("assistant".parse::<Role>(), Ok(Role::Assistant));
        assert_eq!(Role::User.to_string(), "user");
        assert!("tool".parse::<Role>().is_err());
    }
}
