//! List files tool.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tools::{ToolContext, ToolError, WorkspaceTool};
use appforge::chat::{FunctionTool, Tool};

pub struct ListFilesTool;

impl Default for ListFilesTool {
    fn default() -> Self {
        Self::new()
    }
}

impl ListFilesTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl WorkspaceTool for ListFilesTool {
    fn name(&self) -> &str {
        "listFiles"
    }

    fn definition(&self) -> Tool {
        Tool {
            tool_type: "function".to_string(),
            function: FunctionTool {
                name: self.name().to_string(),
                description: "List entries of a directory in the app workspace.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "Workspace-relative directory; defaults to the root."
                        }
                    }
                }),
            },
        }
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let path = args.get("path").and_then(Value::as_str).unwrap_or("");
        let entries = ctx.store.list(path).await?;
        Ok(json!({
            "success": true,
            "files": entries,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::WorkspaceStore;
    use tempfile::TempDir;

    #[tokio::test]
    async fn lists_names_and_kinds() {
        let tmp = TempDir::new().unwrap();
        let ctx = ToolContext {
            app_id: 3,
            store: WorkspaceStore::open(tmp.path(), 1, 3).unwrap(),
        };
        ctx.store.write("src/main.js", "x").await.unwrap();
        ctx.store.write("README.md", "x").await.unwrap();

        let result = ListFilesTool::new().call(json!({}), &ctx).await.unwrap();
        let files = result["files"].as_array().unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0]["name"], "README.md");
        assert_eq!(files[0]["isDirectory"], false);
        assert_eq!(files[1]["name"], "src");
        assert_eq!(files[1]["isDirectory"], true);
    }
}
