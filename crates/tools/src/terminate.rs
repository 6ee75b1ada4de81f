//! Terminate tool — the model's way of ending a run.
//!
//! Registered as a special tool; the dispatcher's finish predicate decides
//! whether a given invocation actually finishes the run (for strict agents,
//! only `status=success` does).

use async_trait::async_trait;
use taskloom_core::error::ToolError;
use taskloom_core::tool::{Parameters, Tool, ToolResult};
use tracing::info;

pub struct TerminateTool;

#[async_trait]
impl Tool for TerminateTool {
    fn name(&self) -> &str {
        "terminate"
    }

    fn description(&self) -> &str {
        "End the current task. Call with status 'success' when the request is fully handled, \
         or 'failure' when it cannot be completed."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": "string",
                    "description": "The finish status of the task",
                    "enum": ["success", "failure"]
                }
            },
            "required": ["status"]
        })
    }

    async fn execute(&self, parameters: &Parameters) -> Result<ToolResult, ToolError> {
        let status = parameters.get("status").unwrap_or("success");
        info!(status, "Terminate requested");
        Ok(ToolResult::success(format!(
            "The interaction has been completed with status: {status}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_the_given_status() {
        let params: Parameters = [("status", "failure")].into_iter().collect();
        let result = TerminateTool.execute(&params).await.unwrap();
        assert!(!result.is_error());
        assert!(result.output.contains("status: failure"));
    }

    #[tokio::test]
    async fn status_defaults_to_success() {
        let result = TerminateTool.execute(&Parameters::new()).await.unwrap();
        assert!(result.output.contains("status: success"));
    }
}
