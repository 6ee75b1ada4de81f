//! Chat completion tool — lets the model deliver a final textual answer
//! through the same tool protocol it uses for actions, instead of leaving
//! it in free prose where the host might miss it.

use async_trait::async_trait;
use taskloom_core::error::ToolError;
use taskloom_core::tool::{Parameters, Tool, ToolResult};

pub struct ChatCompletionTool;

#[async_trait]
impl Tool for ChatCompletionTool {
    fn name(&self) -> &str {
        "create_chat_completion"
    }

    fn description(&self) -> &str {
        "Deliver a formatted text response to the user."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "response": {
                    "type": "string",
                    "description": "The response text to deliver to the user"
                }
            },
            "required": ["response"]
        })
    }

    async fn execute(&self, parameters: &Parameters) -> Result<ToolResult, ToolError> {
        match parameters.get("response") {
            Some(response) => Ok(ToolResult::success(response)),
            None => Ok(ToolResult::failure(
                "Error: missing required parameter 'response'",
            )),
        }
    }
}
