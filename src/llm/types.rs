//! Common types for model chat completions (OpenAI-compatible wire format).

use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

use super::error::LlmError;

// ============================================================================
// Chat Types
// ============================================================================

/// A chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
}

impl ChatRequest {
    #[must_use]
    pub fn new(model: impl Into<String>, messages: Vec<Message>, temperature: Option<f32>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature,
            tools: None,
        }
    }

    /// Create a chat request exposing a tool catalog to the model.
    #[must_use]
    pub fn with_tools(
        model: impl Into<String>,
        messages: Vec<Message>,
        temperature: Option<f32>,
        tools: Vec<ToolDefinition>,
    ) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature,
            tools: if tools.is_empty() { None } else { Some(tools) },
        }
    }
}

/// A message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    /// Message content. Nullable only for assistant messages that carry
    /// tool calls instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool calls requested by the assistant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Back-reference to the originating call (tool role only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool name (tool role only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    /// Create a plain text message.
    pub fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    /// Create a tool result message referencing the originating call.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
        }
    }

    /// Create an assistant message carrying tool calls.
    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_calls: Some(tool_calls),
            tool_call_id: None,
            name: None,
        }
    }
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

// ============================================================================
// Tool Types
// ============================================================================

/// Tool definition sent to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

/// Function definition within a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

/// A complete tool call from a model response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned identifier, unique within a turn.
    pub id: String,
    #[serde(rename = "type", default = "default_tool_type")]
    pub tool_type: String,
    pub function: FunctionCall,
}

fn default_tool_type() -> String {
    "function".to_string()
}

impl ToolCall {
    pub fn function(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            tool_type: default_tool_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// Function call details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments string, possibly malformed.
    pub arguments: String,
}

// ============================================================================
// Response Types
// ============================================================================

/// A non-streaming chat completion response.
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
}

impl ChatResponse {
    /// Tool calls from the first choice, if any.
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.choices
            .first()
            .and_then(|c| c.message.tool_calls.as_deref())
            .unwrap_or_default()
    }

    /// Content of the first choice.
    pub fn content(&self) -> &str {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .unwrap_or_default()
    }
}

/// A single completion choice.
#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: Message,
    pub finish_reason: Option<String>,
}

// ============================================================================
// Streaming Types
// ============================================================================

/// Typed events decoded from the streaming chat completion.
///
/// Argument fragments are forwarded verbatim but never assembled here:
/// fragments may arrive partial or not at all, so argument recovery happens
/// in the reconciliation pass instead.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Incremental assistant content.
    Content(String),
    /// A tool-call delta: first sight usually carries id and name only.
    ToolCallDelta {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        argument_fragment: Option<String>,
    },
    /// Terminal signal.
    Done,
}

/// A boxed stream of decoded model events.
pub type ModelStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_skips_absent_fields() {
        let request = ChatRequest::new("gpt-4o", vec![Message::text(Role::User, "Hi")], None);
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("temperature"));
        assert!(!json.contains("tools"));
    }

    #[test]
    fn with_tools_omits_empty_catalog() {
        let request = ChatRequest::with_tools("gpt-4o", vec![], None, vec![]);
        assert!(request.tools.is_none());
    }

    #[test]
    fn tool_result_message_shape() {
        let msg = Message::tool_result("call_1", "search", "output");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(msg.name.as_deref(), Some("search"));
        assert_eq!(msg.content.as_deref(), Some("output"));
    }

    #[test]
    fn assistant_tool_calls_has_null_content() {
        let msg = Message::assistant_tool_calls(vec![ToolCall {
            id: "call_1".into(),
            tool_type: "function".into(),
            function: FunctionCall {
                name: "search".into(),
                arguments: "{}".into(),
            },
        }]);
        assert!(msg.content.is_none());
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("\"content\""));
        assert!(json.contains("\"tool_calls\""));
    }

    #[test]
    fn response_accessors_tolerate_empty_choices() {
        let response: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(response.tool_calls().is_empty());
        assert_eq!(response.content(), "");
    }

    #[test]
    fn tool_call_deserializes_without_type() {
        let tc: ToolCall = serde_json::from_str(
            r#"{"id":"abc","function":{"name":"search_x","arguments":"{\"q\":\"test\"}"}}"#,
        )
        .unwrap();
        assert_eq!(tc.tool_type, "function");
        assert_eq!(tc.function.name, "search_x");
    }
}
