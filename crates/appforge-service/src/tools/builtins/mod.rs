//! Builtin workspace tools.

mod delete_file;
mod list_files;
mod read_file;
mod write_file;

pub use delete_file::DeleteFileTool;
pub use list_files::ListFilesTool;
pub use read_file::ReadFileTool;
pub use write_file::WriteFileTool;

use crate::tools::ToolError;
use serde_json::Value;

pub(crate) fn require_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidArguments(format!("{key} is required")))
}
