//! Delete file tool.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tools::builtins::require_str;
use crate::tools::{ToolContext, ToolError, WorkspaceTool};
use appforge::chat::{FunctionTool, Tool};

pub struct DeleteFileTool;

impl Default for DeleteFileTool {
    fn default() -> Self {
        Self::new()
    }
}

impl DeleteFileTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl WorkspaceTool for DeleteFileTool {
    fn name(&self) -> &str {
        "deleteFile"
    }

    fn definition(&self) -> Tool {
        Tool {
            tool_type: "function".to_string(),
            function: FunctionTool {
                name: self.name().to_string(),
                description: "Delete a file from the app workspace.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "Workspace-relative file path to delete."
                        }
                    },
                    "required": ["path"]
                }),
            },
        }
    }

    fn mutates_files(&self) -> bool {
        true
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let path = require_str(&args, "path")?;
        ctx.store.delete(path).await?;
        Ok(json!({
            "success": true,
            "path": path,
            "message": "File deleted",
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::WorkspaceStore;
    use tempfile::TempDir;

    #[tokio::test]
    async fn deletes_existing_file() {
        let tmp = TempDir::new().unwrap();
        let ctx = ToolContext {
            app_id: 3,
            store: WorkspaceStore::open(tmp.path(), 1, 3).unwrap(),
        };
        ctx.store.write("old.txt", "x").await.unwrap();

        let result = DeleteFileTool::new()
            .call(json!({ "path": "old.txt" }), &ctx)
            .await
            .unwrap();
        assert_eq!(result["success"], true);
        assert!(!ctx.store.exists("old.txt").await.unwrap());
    }

    #[tokio::test]
    async fn deleting_missing_file_is_a_store_error() {
        let tmp = TempDir::new().unwrap();
        let ctx = ToolContext {
            app_id: 3,
            store: WorkspaceStore::open(tmp.path(), 1, 3).unwrap(),
        };

        let err = DeleteFileTool::new()
            .call(json!({ "path": "ghost.txt" }), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Store(_)));
    }
}
