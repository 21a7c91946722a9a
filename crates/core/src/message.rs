//! Message and Conversation domain types.
//!
//! A [`Message`] is the canonical shape every provider wire format is
//! normalized into and out of. Ordering is significant: a `tool` message
//! must immediately follow the assistant message whose `tool_calls`
//! requested it, and the history window must never cut between the two.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Placeholder text for assistant messages that arrive with no content and
/// no tool calls. Several providers reject empty-string assistant content
/// on the next request, so it never enters history.
pub const EMPTY_RESPONSE_PLACEHOLDER: &str = "(no response)";

/// Unique identifier for a conversation (one CLI session or one WebSocket
/// client).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// The end user
    User,
    /// The model
    Assistant,
    /// Tool execution result
    Tool,
}

/// A tool call embedded in an assistant message.
///
/// `id` is unique within its message and echoed back on the paired tool
/// result so providers can correlate the two. `arguments` holds the raw
/// JSON text; after the repair pass it always parses to an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: format!("call_{}", Uuid::new_v4().simple()),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Parse `arguments` as a JSON object, coercing anything malformed or
    /// non-object to `{}` rather than propagating the parse failure.
    pub fn arguments_value(&self) -> serde_json::Value {
        match serde_json::from_str::<serde_json::Value>(&self.arguments) {
            Ok(v) if v.is_object() => v,
            _ => serde_json::json!({}),
        }
    }
}

/// A single message in a conversation. Immutable once appended to history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolInvocation>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Tool name, set on tool-result messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn base(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::base(Role::System, content)
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::base(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::base(Role::Assistant, content)
    }

    /// Create an assistant message carrying tool calls. Empty content with
    /// no calls is replaced by the placeholder.
    pub fn assistant_with_calls(
        content: impl Into<String>,
        tool_calls: Vec<ToolInvocation>,
    ) -> Self {
        let mut content = content.into();
        if content.is_empty() && tool_calls.is_empty() {
            content = EMPTY_RESPONSE_PLACEHOLDER.to_string();
        }
        let mut msg = Self::base(Role::Assistant, content);
        msg.tool_calls = tool_calls;
        msg
    }

    /// Create a tool result message paired to `tool_call_id`.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let mut msg = Self::base(Role::Tool, content);
        msg.tool_call_id = Some(tool_call_id.into());
        msg.name = Some(tool_name.into());
        msg
    }

    /// Whether this assistant message ends the turn (no tool calls).
    pub fn is_final(&self) -> bool {
        self.role == Role::Assistant && self.tool_calls.is_empty()
    }
}

/// An ordered sequence of messages with shared context.
///
/// Permanent history only ever contains *complete* turns; the in-progress
/// turn lives in the controller's buffer until it finishes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            id: ConversationId::new(),
            messages: Vec::new(),
        }
    }

    /// Append a message.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append a whole completed turn at once.
    pub fn extend(&mut self, turn: impl IntoIterator<Item = Message>) {
        self.messages.extend(turn);
    }

    /// Drop all messages.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// The most recent `max` messages, as a window for outbound requests.
    ///
    /// The window slides over complete turns. When its start would fall
    /// mid-turn it is extended *backward* (never forward) to the user
    /// message that opened the turn, so a tool-call/result pair is never
    /// split and the window never opens on an assistant or tool message —
    /// some providers reject histories that do not start with a user turn.
    pub fn windowed(&self, max: usize) -> &[Message] {
        if self.messages.len() <= max {
            return &self.messages;
        }
        let mut start = self.messages.len() - max;
        while start > 0 && self.messages[start].role != Role::User {
            start -= 1;
        }
        &self.messages[start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello!");
        assert!(msg.tool_calls.is_empty());
    }

    #[test]
    fn empty_assistant_content_gets_placeholder() {
        let msg = Message::assistant_with_calls("", vec![]);
        assert_eq!(msg.content, EMPTY_RESPONSE_PLACEHOLDER);
    }

    #[test]
    fn assistant_with_calls_keeps_empty_content() {
        // Content may stay empty when tool calls are present; providers
        // accept that combination.
        let call = ToolInvocation::new("list_files", r#"{"directory":"."}"#);
        let msg = Message::assistant_with_calls("", vec![call]);
        assert_eq!(msg.content, "");
        assert_eq!(msg.tool_calls.len(), 1);
    }

    #[test]
    fn malformed_arguments_coerce_to_empty_object() {
        let call = ToolInvocation::new("read_file", "not json at all");
        assert_eq!(call.arguments_value(), serde_json::json!({}));

        let call = ToolInvocation::new("read_file", r#"["an","array"]"#);
        assert_eq!(call.arguments_value(), serde_json::json!({}));

        let call = ToolInvocation::new("read_file", r#"{"path":"/tmp/x"}"#);
        assert_eq!(call.arguments_value()["path"], "/tmp/x");
    }

    #[test]
    fn tool_result_carries_pairing_id() {
        let msg = Message::tool_result("call_1", "list_files", "Contents of .:");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(msg.name.as_deref(), Some("list_files"));
    }

    #[test]
    fn window_smaller_history_passes_through() {
        let mut conv = Conversation::new();
        conv.push(Message::user("one"));
        conv.push(Message::assistant("two"));
        assert_eq!(conv.windowed(10).len(), 2);
    }

    #[test]
    fn window_never_splits_tool_pair() {
        let mut conv = Conversation::new();
        conv.push(Message::user("q1"));
        conv.push(Message::assistant("a1"));
        conv.push(Message::user("list files"));
        let call = ToolInvocation::new("list_files", "{}");
        let call_id = call.id.clone();
        conv.push(Message::assistant_with_calls("", vec![call]));
        conv.push(Message::tool_result(&call_id, "list_files", "Contents of .:"));
        conv.push(Message::assistant("done"));

        // A window of 2 would start on the tool result; it must extend
        // backward past the assistant message carrying the call to the
        // user message that opened the turn.
        let window = conv.windowed(2);
        assert_eq!(window.len(), 4);
        assert_eq!(window[0].role, Role::User);
        assert_eq!(window[0].content, "list files");
        assert_eq!(window[1].tool_calls.len(), 1);
        assert_eq!(window[2].role, Role::Tool);
    }

    #[test]
    fn window_starting_mid_turn_extends_to_turn_opener() {
        let mut conv = Conversation::new();
        conv.push(Message::user("q1"));
        conv.push(Message::assistant("a1"));
        conv.push(Message::user("read the hosts file"));
        let call = ToolInvocation::new("read_file", r#"{"path":"/etc/hosts"}"#);
        let call_id = call.id.clone();
        conv.push(Message::assistant_with_calls("", vec![call]));
        conv.push(Message::tool_result(&call_id, "read_file", "127.0.0.1 localhost"));
        conv.push(Message::assistant("done"));

        // A window of 3 lands on the assistant tool-call message, not on a
        // tool result. It must still be extended to the turn's user
        // message rather than opening on an assistant message.
        let window = conv.windowed(3);
        assert_eq!(window.len(), 4);
        assert_eq!(window[0].role, Role::User);
        assert_eq!(window[0].content, "read the hosts file");
    }

    #[test]
    fn window_extends_over_multiple_tool_results() {
        let mut conv = Conversation::new();
        conv.push(Message::user("go"));
        let c1 = ToolInvocation::new("read_file", "{}");
        let c2 = ToolInvocation::new("list_files", "{}");
        let (id1, id2) = (c1.id.clone(), c2.id.clone());
        conv.push(Message::assistant_with_calls("", vec![c1, c2]));
        conv.push(Message::tool_result(&id1, "read_file", "data"));
        conv.push(Message::tool_result(&id2, "list_files", "Contents of .:"));
        conv.push(Message::assistant("done"));

        let window = conv.windowed(2);
        assert_eq!(window.len(), 5);
        assert_eq!(window[0].role, Role::User);
        assert_eq!(window[1].tool_calls.len(), 2);
    }

    #[test]
    fn message_serialization_roundtrip() {
        let msg = Message::user("Test message");
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.content, "Test message");
        assert_eq!(back.role, Role::User);
    }
}
