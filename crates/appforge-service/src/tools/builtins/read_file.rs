//! Read file tool.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tools::builtins::require_str;
use crate::tools::{ToolContext, ToolError, WorkspaceTool};
use appforge::chat::{FunctionTool, Tool};

pub struct ReadFileTool;

impl Default for ReadFileTool {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadFileTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl WorkspaceTool for ReadFileTool {
    fn name(&self) -> &str {
        "readFile"
    }

    fn definition(&self) -> Tool {
        Tool {
            tool_type: "function".to_string(),
            function: FunctionTool {
                name: self.name().to_string(),
                description: "Read a file from the app workspace.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "Workspace-relative file path to read."
                        }
                    },
                    "required": ["path"]
                }),
            },
        }
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let path = require_str(&args, "path")?;
        let content = ctx.store.read(path).await?;
        Ok(json!({
            "success": true,
            "path": path,
            "content": content,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::WorkspaceStore;
    use tempfile::TempDir;

    #[tokio::test]
    async fn reads_existing_file() {
        let tmp = TempDir::new().unwrap();
        let ctx = ToolContext {
            app_id: 3,
            store: WorkspaceStore::open(tmp.path(), 1, 3).unwrap(),
        };
        ctx.store.write("index.html", "<html></html>").await.unwrap();

        let result = ReadFileTool::new()
            .call(json!({ "path": "index.html" }), &ctx)
            .await
            .unwrap();
        assert_eq!(result["content"], "<html></html>");
    }

    #[tokio::test]
    async fn missing_file_is_a_store_error() {
        let tmp = TempDir::new().unwrap();
        let ctx = ToolContext {
            app_id: 3,
            store: WorkspaceStore::open(tmp.path(), 1, 3).unwrap(),
        };

        let err = ReadFileTool::new()
            .call(json!({ "path": "missing.txt" }), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Store(_)));
    }
}
