//! Tool trait — the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world. The
//! runtime talks to every tool through the same contract: string
//! parameters in, a [`ToolResult`] out. Tools must not raise for expected
//! failure modes; only truly exceptional conditions propagate as
//! [`ToolError`], and even those are absorbed by the dispatcher before
//! they can abort the agent loop.

use crate::error::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An insertion-ordered string map of tool-call parameters.
///
/// The protocol parser emits parameters in the order they appeared in the
/// model's output, and that order is preserved all the way to the tool.
/// Inserting an existing key overwrites the value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameters(Vec<(String, String)>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a parameter, preserving first-seen position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Parameters {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut params = Parameters::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// A request to execute a tool, as recovered from model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to execute
    pub name: String,

    /// Parameters in the order they appeared
    pub parameters: Parameters,

    /// True when the call's closing tag had not yet appeared in the text
    /// being parsed (truncation or streaming). Partial calls are never
    /// dispatched.
    pub partial: bool,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            name: name.into(),
            parameters,
            partial: false,
        }
    }

    pub fn partial(name: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            name: name.into(),
            parameters,
            partial: true,
        }
    }
}

/// The result of a tool execution.
///
/// Exactly one of `output`/`error` is meaningful per call; both empty
/// means the tool ran but produced nothing to report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolResult {
    /// Output content on success
    #[serde(default)]
    pub output: String,

    /// Error description on failure
    #[serde(default)]
    pub error: String,

    /// Optional base64-encoded image produced by the tool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64_image: Option<String>,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Self::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            ..Self::default()
        }
    }

    /// Attach a base64-encoded image to this result.
    pub fn with_image(mut self, base64_image: impl Into<String>) -> Self {
        self.base64_image = Some(base64_image.into());
        self
    }

    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }

    /// The text that goes into the transcript: output first, then error,
    /// then a placeholder so the model always sees something.
    pub fn as_transcript_text(&self) -> &str {
        if !self.output.is_empty() {
            &self.output
        } else if !self.error.is_empty() {
            &self.error
        } else {
            "No result"
        }
    }
}

/// The core Tool trait.
///
/// Each capability (browser action, search, termination) implements this
/// trait and is registered in the [`ToolRegistry`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "browser_use", "terminate").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given parameters.
    async fn execute(&self, parameters: &Parameters)
    -> std::result::Result<ToolResult, ToolError>;

    /// Release any resources held by this tool. Must be idempotent: the
    /// runtime guarantees it is called at least once per run, on every
    /// exit path.
    async fn cleanup(&self) {}
}

/// A registry of available tools, keyed by unique name.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Execute a tool by name.
    ///
    /// Fails with [`ToolError::NotFound`] for unknown names; otherwise
    /// defers to the tool. Converting failures into non-fatal
    /// [`ToolResult`]s is the dispatcher's job, not the registry's.
    pub async fn execute(
        &self,
        name: &str,
        parameters: &Parameters,
    ) -> std::result::Result<ToolResult, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.execute(parameters).await
    }

    /// Run every registered tool's teardown. Tool cleanup is idempotent,
    /// so calling this more than once is harmless.
    pub async fn cleanup_all(&self) {
        for (name, tool) in &self.tools {
            tracing::debug!(tool = %name, "Cleaning up tool");
            tool.cleanup().await;
        }
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
