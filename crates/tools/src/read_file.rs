//! File read tool with output truncation.

use async_trait::async_trait;
use kaio_core::error::ToolError;
use kaio_core::tool::Tool;

/// Characters of file content returned before truncation.
const MAX_CONTENT_CHARS: usize = 2000;
const TRUNCATION_MARKER: &str = "\n[TRUNCATED]";

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a text file. Long files are truncated."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to read"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::invalid_args("read_file", "missing 'path'"))?;

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ToolError::execution("read_file", format!("cannot read '{path}': {e}")))?;

        if content.chars().count() > MAX_CONTENT_CHARS {
            let truncated: String = content.chars().take(MAX_CONTENT_CHARS).collect();
            Ok(format!("{truncated}{TRUNCATION_MARKER}"))
        } else {
            Ok(content)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_short_file_whole() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.txt");
        std::fs::write(&path, "hello").unwrap();

        let tool = ReadFileTool;
        let out = tool
            .execute(serde_json::json!({ "path": path.to_string_lossy() }))
            .await
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn truncates_long_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.txt");
        std::fs::write(&path, "x".repeat(5000)).unwrap();

        let tool = ReadFileTool;
        let out = tool
            .execute(serde_json::json!({ "path": path.to_string_lossy() }))
            .await
            .unwrap();
        assert!(out.ends_with("[TRUNCATED]"));
        assert_eq!(out.chars().count(), 2000 + TRUNCATION_MARKER.chars().count());
    }

    #[tokio::test]
    async fn missing_path_argument_rejected() {
        let tool = ReadFileTool;
        let err = tool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }
}
