//! Message and Memory domain types.
//!
//! These are the core value objects that flow through the runtime:
//! the agent appends a message for every turn of the observe → decide → act
//! loop, and the stuck-loop detector scans the same log afterwards. A
//! `Message` is immutable once appended; `Memory` is append-only during a
//! run, which is what makes the detector's duplicate scan well-defined.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender in the transcript.
///
/// This is a closed set: each role has its own pure constructor on
/// [`Message`], so an invalid role is a compile-time impossibility rather
/// than a runtime check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions (identity, corrective nudges)
    System,
    /// The end user or host request
    User,
    /// The language model
    Assistant,
    /// A tool execution result
    Tool,
}

/// A single message in the agent's transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who produced this message
    pub role: Role,

    /// The text content (may be empty for degenerate model responses)
    pub content: String,

    /// Optional base64-encoded image attached to this message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64_image: Option<String>,

    /// For tool messages, the name of the tool that produced the result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// For tool messages, which tool call this responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            base64_image: None,
            tool_name: None,
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a tool result message.
    pub fn tool_result(
        tool_name: impl Into<String>,
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let mut msg = Self::new(Role::Tool, content);
        msg.tool_name = Some(tool_name.into());
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }

    /// Attach a base64-encoded image to this message.
    pub fn with_image(mut self, base64_image: impl Into<String>) -> Self {
        self.base64_image = Some(base64_image.into());
        self
    }
}

/// The agent's conversational log.
///
/// Insertion order is semantically meaningful: it is both the chronology
/// sent to the completion provider and the scan order for duplicate
/// detection. No operation removes or reorders an individual prior entry;
/// `clear` resets the whole sequence between independent tasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Memory {
    messages: Vec<Message>,
}

impl Memory {
    /// Create an empty memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message. The only way entries enter memory.
    pub fn add(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Reset the log between independent tasks on the same agent.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// The full ordered sequence.
    pub fn all(&self) -> &[Message] {
        &self.messages
    }

    /// The most recently appended message, if any.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Analyze this site");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Analyze this site");
        assert!(msg.base64_image.is_none());
    }

    #[test]
    fn tool_result_carries_identity() {
        let msg = Message::tool_result("browser_use", "browser_use_3", "page loaded");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_name.as_deref(), Some("browser_use"));
        assert_eq!(msg.tool_call_id.as_deref(), Some("browser_use_3"));
    }

    #[test]
    fn with_image_attaches_once() {
        let msg = Message::tool_result("screenshot", "screenshot_0", "captured")
            .with_image("aGVsbG8=");
        assert_eq!(msg.base64_image.as_deref(), Some("aGVsbG8="));
    }

    #[test]
    fn memory_preserves_insertion_order() {
        let mut memory = Memory::new();
        memory.add(Message::user("first"));
        memory.add(Message::assistant("second"));
        memory.add(Message::user("third"));

        let contents: Vec<&str> = memory.all().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[test]
    fn memory_clear_resets() {
        let mut memory = Memory::new();
        memory.add(Message::user("task one"));
        memory.clear();
        assert!(memory.is_empty());
        assert!(memory.last().is_none());
    }

    #[test]
    fn message_serialization_roundtrip() {
        let msg = Message::assistant("hello");
        let json = serde_json::to_string(&msg).unwrap();
        let deserialized: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.content, "hello");
        assert_eq!(deserialized.role, Role::Assistant);
    }
}
