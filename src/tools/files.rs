//! File viewing tools: whole files and inclusive line ranges.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::AsyncReadExt;

use super::traits::{required_str, required_usize};
use super::workspace::Workspace;
use super::Tool;
use crate::error::ToolError;

/// Largest prefix of a file `view_file` will read.
const MAX_VIEW_BYTES: u64 = 1024 * 1024;

/// Read an entire file.
pub struct ViewFile {
    workspace: Arc<Workspace>,
}

impl ViewFile {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ViewFile {
    fn name(&self) -> &str {
        "view_file"
    }

    fn description(&self) -> &str {
        "Read the full contents of a file in the target source tree. Input is the file path."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file, relative to the target root"
                }
            },
            "required": ["path"]
        })
    }

    fn primary_arg(&self) -> &str {
        "path"
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let raw = required_str(&args, "path")?;
        let path = self.workspace.resolve(raw)?;
        if path.is_dir() {
            return Err(ToolError::InvalidInput(format!(
                "'{}' is a directory, use list_directory instead",
                raw
            )));
        }
        read_capped(&path, MAX_VIEW_BYTES).await
    }
}

/// Read an inclusive, 1-indexed range of lines.
pub struct ViewFileLines {
    workspace: Arc<Workspace>,
}

impl ViewFileLines {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ViewFileLines {
    fn name(&self) -> &str {
        "view_file_lines"
    }

    fn description(&self) -> &str {
        "Read a range of lines from a file. Input is a JSON object with path, start_line and end_line (1-indexed, inclusive)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file, relative to the target root"
                },
                "start_line": {
                    "type": "integer",
                    "description": "First line to return (1-indexed)"
                },
                "end_line": {
                    "type": "integer",
                    "description": "Last line to return (inclusive)"
                }
            },
            "required": ["path", "start_line", "end_line"]
        })
    }

    fn primary_arg(&self) -> &str {
        "path"
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let raw = required_str(&args, "path")?;
        let start = required_usize(&args, "start_line")?;
        let end = required_usize(&args, "end_line")?;

        let path = self.workspace.resolve(raw)?;
        let content = read_lossy(&path).await?;
        select_lines(&content, start, end)
    }
}

/// Read at most `cap` bytes, noting when the file was longer.
async fn read_capped(path: &std::path::Path, cap: u64) -> Result<String, ToolError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| ToolError::io(path, e))?;
    let mut bytes = Vec::new();
    file.take(cap + 1)
        .read_to_end(&mut bytes)
        .await
        .map_err(|e| ToolError::io(path, e))?;

    if bytes.len() as u64 > cap {
        bytes.truncate(cap as usize);
        let mut text = String::from_utf8_lossy(&bytes).into_owned();
        text.push_str(&format!(
            "\n... [file truncated at {} bytes, use view_file_lines for the rest]",
            cap
        ));
        return Ok(text);
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

async fn read_lossy(path: &std::path::Path) -> Result<String, ToolError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ToolError::io(path, e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Number the lines `start..=end`; `end` past EOF is clamped.
pub(crate) fn select_lines(content: &str, start: usize, end: usize) -> Result<String, ToolError> {
    let lines: Vec<&str> = content.lines().collect();
    let total = lines.len();
    if start == 0 || start > end || start > total {
        return Err(ToolError::LineRange { start, end, total });
    }

    let end = end.min(total);
    let width = end.to_string().len();
    Ok(lines[start - 1..end]
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{:>width$} | {}", start + i, line, width = width))
        .collect::<Vec<_>>()
        .join("\n"))
}
