//! Recursive text search over a source tree.

use async_trait::async_trait;
use kaio_core::error::ToolError;
use kaio_core::tool::Tool;
use std::path::{Path, PathBuf};

/// Directories never descended into.
const SKIP_DIRS: &[&str] = &[".git", "target", "node_modules", ".venv", "__pycache__"];
const MAX_MATCHES: usize = 50;

pub struct SearchCodeTool;

fn search_dir(
    root: &Path,
    query: &str,
    matches: &mut Vec<String>,
) -> std::io::Result<()> {
    let mut stack: Vec<PathBuf> = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        if matches.len() >= MAX_MATCHES {
            break;
        }
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();

            if path.is_dir() {
                if !SKIP_DIRS.contains(&name.as_str()) {
                    stack.push(path);
                }
                continue;
            }

            // Binary files fail the UTF-8 read and are skipped.
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            for (line_no, line) in content.lines().enumerate() {
                if line.contains(query) {
                    matches.push(format!(
                        "{}:{}: {}",
                        path.display(),
                        line_no + 1,
                        line.trim()
                    ));
                    if matches.len() >= MAX_MATCHES {
                        return Ok(());
                    }
                }
            }
        }
    }

    Ok(())
}

#[async_trait]
impl Tool for SearchCodeTool {
    fn name(&self) -> &str {
        "search_code"
    }

    fn description(&self) -> &str {
        "Search files under a directory for lines containing a query string."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "directory": {
                    "type": "string",
                    "description": "Root directory to search (defaults to the current directory)"
                },
                "query": {
                    "type": "string",
                    "description": "Literal text to look for"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let directory = arguments["directory"].as_str().unwrap_or(".").to_string();
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::invalid_args("search_code", "missing 'query'"))?
            .to_string();

        // Directory walking is blocking; keep it off the async executor.
        let matches = tokio::task::spawn_blocking(move || {
            let mut matches = Vec::new();
            search_dir(Path::new(&directory), &query, &mut matches).map(|_| matches)
        })
        .await
        .map_err(|e| ToolError::execution("search_code", e.to_string()))?
        .map_err(|e| ToolError::execution("search_code", e.to_string()))?;

        if matches.is_empty() {
            return Ok("No matches found.".to_string());
        }

        let mut output = format!("{} match(es):", matches.len());
        for m in matches {
            output.push('\n');
            output.push_str(&m);
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finds_matches_with_line_numbers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn main() {\n    needle();\n}").unwrap();
        std::fs::write(dir.path().join("b.rs"), "nothing here").unwrap();

        let tool = SearchCodeTool;
        let out = tool
            .execute(serde_json::json!({
                "directory": dir.path().to_string_lossy(),
                "query": "needle"
            }))
            .await
            .unwrap();

        assert!(out.starts_with("1 match(es):"));
        assert!(out.contains("a.rs:2:"));
    }

    #[tokio::test]
    async fn skips_ignored_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("target")).unwrap();
        std::fs::write(dir.path().join("target/hit.rs"), "needle").unwrap();

        let tool = SearchCodeTool;
        let out = tool
            .execute(serde_json::json!({
                "directory": dir.path().to_string_lossy(),
                "query": "needle"
            }))
            .await
            .unwrap();
        assert_eq!(out, "No matches found.");
    }
}
