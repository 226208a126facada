//! Tools the generation loop may invoke, each scoped to one workspace.
//!
//! The set is closed and every tool delegates file access to the workspace
//! store, inheriting its path-safety contract. A failing tool produces a
//! structured `{success: false, error}` result rather than an error: the
//! model observes the failure and adapts.

pub mod builtins;

use crate::workspace::{StoreError, WorkspaceStore};
use appforge::chat::Tool;
use appforge::ToolCall;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Execution context handed to every tool call.
pub struct ToolContext {
    pub app_id: i64,
    pub store: WorkspaceStore,
}

#[async_trait]
pub trait WorkspaceTool: Send + Sync {
    fn name(&self) -> &str;

    /// The model-facing definition (name, description, JSON schema).
    fn definition(&self) -> Tool;

    /// Whether a successful call changes the workspace file tree.
    fn mutates_files(&self) -> bool {
        false
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<Value, ToolError>;
}

/// Outcome of one executed tool call, ready to feed back to the model.
pub struct ToolExecution {
    pub name: String,
    pub result: Value,
    /// Workspace-relative path touched by a successful mutating call.
    pub mutated_path: Option<String>,
}

/// The closed set of tools offered to the model.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn WorkspaceTool>>,
}

impl ToolRegistry {
    pub fn builtin() -> Self {
        Self {
            tools: vec![
                Arc::new(builtins::WriteFileTool::new()),
                Arc::new(builtins::ReadFileTool::new()),
                Arc::new(builtins::ListFilesTool::new()),
                Arc::new(builtins::DeleteFileTool::new()),
            ],
        }
    }

    pub fn definitions(&self) -> Vec<Tool> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    fn get(&self, name: &str) -> Option<&Arc<dyn WorkspaceTool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Run one requested call. Never fails: unknown tools, bad arguments and
    /// store errors all come back as structured failure results.
    pub async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> ToolExecution {
        let name = call.function.name.clone();
        let Some(tool) = self.get(&name) else {
            return ToolExecution {
                name: name.clone(),
                result: json!({ "success": false, "error": format!("unknown tool: {name}") }),
                mutated_path: None,
            };
        };

        let args: Value = if call.function.arguments.trim().is_empty() {
            json!({})
        } else {
            match serde_json::from_str(&call.function.arguments) {
                Ok(v) => v,
                Err(e) => {
                    return ToolExecution {
                        name,
                        result: json!({
                            "success": false,
                            "error": format!("arguments are not valid JSON: {e}"),
                        }),
                        mutated_path: None,
                    };
                }
            }
        };

        match tool.call(args, ctx).await {
            Ok(result) => {
                let mutated_path = (tool.mutates_files()
                    && result["success"].as_bool().unwrap_or(false))
                .then(|| result["path"].as_str().map(str::to_string))
                .flatten();
                ToolExecution {
                    name,
                    result,
                    mutated_path,
                }
            }
            Err(e) => {
                tracing::debug!(tool = %name, app_id = ctx.app_id, error = %e, "tool call failed");
                ToolExecution {
                    name,
                    result: json!({ "success": false, "error": e.to_string() }),
                    mutated_path: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use appforge::FunctionCall;
    use tempfile::TempDir;

    fn context(tmp: &TempDir) -> ToolContext {
        ToolContext {
            app_id: 3,
            store: WorkspaceStore::open(tmp.path(), 1, 3).unwrap(),
        }
    }

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            call_type: "function".into(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    #[tokio::test]
    async fn registry_exposes_the_closed_tool_set() {
        let registry = ToolRegistry::builtin();
        let names: Vec<_> = registry
            .definitions()
            .iter()
            .map(|d| d.function.name.clone())
            .collect();
        assert_eq!(names, ["writeFile", "readFile", "listFiles", "deleteFile"]);
    }

    #[tokio::test]
    async fn unknown_tool_is_a_structured_failure() {
        let tmp = TempDir::new().unwrap();
        let registry = ToolRegistry::builtin();

        let outcome = registry.execute(&call("formatDisk", "{}"), &context(&tmp)).await;
        assert_eq!(outcome.result["success"], false);
        assert!(outcome.mutated_path.is_none());
    }

    #[tokio::test]
    async fn malformed_arguments_are_a_structured_failure() {
        let tmp = TempDir::new().unwrap();
        let registry = ToolRegistry::builtin();

        let outcome = registry
            .execute(&call("writeFile", "{not json"), &context(&tmp))
            .await;
        assert_eq!(outcome.result["success"], false);
    }

    #[tokio::test]
    async fn successful_write_reports_the_mutated_path() {
        let tmp = TempDir::new().unwrap();
        let registry = ToolRegistry::builtin();

        let outcome = registry
            .execute(
                &call("writeFile", r#"{"path":"src/App.jsx","content":"export {}"}"#),
                &context(&tmp),
            )
            .await;
        assert_eq!(outcome.result["success"], true);
        assert_eq!(outcome.mutated_path.as_deref(), Some("src/App.jsx"));
    }

    #[tokio::test]
    async fn escaping_path_fails_without_touching_disk() {
        let tmp = TempDir::new().unwrap();
        let registry = ToolRegistry::builtin();

        let outcome = registry
            .execute(
                &call("writeFile", r#"{"path":"../../etc/passwd","content":"x"}"#),
                &context(&tmp),
            )
            .await;
        assert_eq!(outcome.result["success"], false);
        assert!(outcome.mutated_path.is_none());
        assert!(!tmp.path().join("etc").exists());
    }
}
