//! Write file tool.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tools::builtins::require_str;
use crate::tools::{ToolContext, ToolError, WorkspaceTool};
use appforge::chat::{FunctionTool, Tool};

pub struct WriteFileTool;

impl Default for WriteFileTool {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteFileTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl WorkspaceTool for WriteFileTool {
    fn name(&self) -> &str {
        "writeFile"
    }

    fn definition(&self) -> Tool {
        Tool {
            tool_type: "function".to_string(),
            function: FunctionTool {
                name: self.name().to_string(),
                description:
                    "Write content to a file in the app workspace, creating parent directories if needed."
                        .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "Workspace-relative file path to write."
                        },
                        "content": {
                            "type": "string",
                            "description": "Content to write."
                        }
                    },
                    "required": ["path", "content"]
                }),
            },
        }
    }

    fn mutates_files(&self) -> bool {
        true
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let path = require_str(&args, "path")?;
        let content = require_str(&args, "content")?;

        ctx.store.write(path, content).await?;

        Ok(json!({
            "success": true,
            "path": path,
            "message": format!("Wrote {} bytes", content.len()),
        }))
    }
}
