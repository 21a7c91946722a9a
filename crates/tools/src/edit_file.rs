//! Exact-match file edit tool.

use async_trait::async_trait;
use kaio_core::error::ToolError;
use kaio_core::tool::Tool;

pub struct EditFileTool;

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Replace text in a file. old_text must appear exactly once."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file to edit"
                },
                "old_text": {
                    "type": "string",
                    "description": "Exact text to replace; must occur exactly once"
                },
                "new_text": {
                    "type": "string",
                    "description": "Replacement text"
                }
            },
            "required": ["path", "old_text", "new_text"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::invalid_args("edit_file", "missing 'path'"))?;
        let old_text = arguments["old_text"]
            .as_str()
            .ok_or_else(|| ToolError::invalid_args("edit_file", "missing 'old_text'"))?;
        let new_text = arguments["new_text"]
            .as_str()
            .ok_or_else(|| ToolError::invalid_args("edit_file", "missing 'new_text'"))?;

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ToolError::execution("edit_file", format!("cannot read '{path}': {e}")))?;

        let occurrences = content.matches(old_text).count();
        if occurrences == 0 {
            return Err(ToolError::execution(
                "edit_file",
                format!("old_text not found in {path}"),
            ));
        }
        if occurrences > 1 {
            return Err(ToolError::execution(
                "edit_file",
                format!("old_text occurs {occurrences} times in {path}; it must be unique"),
            ));
        }

        let updated = content.replacen(old_text, new_text, 1);
        tokio::fs::write(path, updated)
            .await
            .map_err(|e| ToolError::execution("edit_file", format!("cannot write '{path}': {e}")))?;

        Ok(format!("Edited {path}"))
    }
}
