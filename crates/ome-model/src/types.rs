use serde::{Deserialize, Serialize};

/// The role a [`Message`] plays in the transcript handed to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single function-call request the model wants dispatched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object.
    pub arguments: String,
}

/// The content of one [`Message`].
///
/// `Text` covers system, user, and plain assistant turns. `ToolCall` and
/// `ToolResult` represent the two halves of one tool dispatch as they are
/// threaded back into the transcript for the next `generate` call (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
#[allow(clippy::large_enum_variant)]
pub enum MessageContent {
    Text(String),
    ToolCall {
        tool_call_id: String,
        function: FunctionCall,
    },
    ToolResult {
        tool_call_id: String,
        content: String,
        is_error: bool,
    },
}

/// One entry in the transcript fed to [`crate::ModelProvider::complete`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self { role: Role::System, content: MessageContent::Text(text.into()) }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: MessageContent::Text(text.into()) }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: MessageContent::Text(text.into()) }
    }

    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::ToolCall {
                tool_call_id: id.into(),
                function: FunctionCall { name: name.into(), arguments: arguments.into() },
            },
        }
    }

    pub fn tool_result(id: impl Into<String>, content: impl Into<String>, is_error: bool) -> Self {
        Self {
            role: Role::Tool,
            content: MessageContent::ToolResult {
                tool_call_id: id.into(),
                content: content.into(),
                is_error,
            },
        }
    }

    /// The plain text of this message, if it carries any.
    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(t) => Some(t),
            _ => None,
        }
    }
}

/// A tool schema offered to the model for the duration of one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema of the parameters object.
    pub parameters: serde_json::Value,
}

/// Request sent to a model provider (§6: the LLM provider interface).
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSchema>,
}

/// A single streamed event from the model. The agent runtime accumulates a
/// full stream into one [`crate::AgentReply`] before applying the tool-use
/// loop (§6 AMBIENT).
#[derive(Debug, Clone)]
pub enum ResponseEvent {
    /// A text delta streamed from the model.
    TextDelta(String),
    /// The model wants to call a tool. `index` disambiguates multiple
    /// concurrently-streamed tool calls within one reply; argument text may
    /// arrive across several deltas for the same `index`.
    ToolCall { index: u32, id: String, name: String, arguments: String },
    /// Final usage statistics for this request.
    Usage { input_tokens: u32, output_tokens: u32 },
    /// The stream finished normally.
    Done,
    /// A recoverable warning surfaced mid-stream; not fatal on its own.
    Error(String),
}

// ─── Unit tests ───────────────────────────────────────────────────────────────
