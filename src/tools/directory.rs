//! Directory inspection tools: listings and tree rendering.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use walkdir::WalkDir;

use super::traits::{optional_usize, required_str};
use super::workspace::Workspace;
use super::Tool;
use crate::error::ToolError;

/// List the immediate entries of a directory.
pub struct ListDirectory {
    workspace: Arc<Workspace>,
}

impl ListDirectory {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ListDirectory {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List the files and subdirectories directly inside a directory. Input is the directory path. Directories end with '/'."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory path, relative to the target root"
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
        let dir = resolve_dir(&self.workspace, raw)?;

        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| ToolError::io(&dir, e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ToolError::io(&dir, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            names.push(if is_dir { format!("{}/", name) } else { name });
        }
        names.sort();

        if names.is_empty() {
            Ok(format!("{} is empty", self.workspace.display(&dir)))
        } else {
            Ok(names.join("\n"))
        }
    }
}

/// List every file below a directory.
pub struct ListFiles {
    workspace: Arc<Workspace>,
}

impl ListFiles {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ListFiles {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "Recursively list all files below a directory, as paths relative to the target root. Input is the directory path."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory path, relative to the target root"
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
        let dir = resolve_dir(&self.workspace, raw)?;

        let files = collect_files(&self.workspace, &dir)?;
        if files.is_empty() {
            Ok(format!("No files under {}", self.workspace.display(&dir)))
        } else {
            Ok(files.join("\n"))
        }
    }
}

/// Render a directory as an ASCII tree.
pub struct DirectoryStructure {
    workspace: Arc<Workspace>,
}

impl DirectoryStructure {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for DirectoryStructure {
    fn name(&self) -> &str {
        "directory_structure"
    }

    fn description(&self) -> &str {
        "Show the directory tree below a path. Input is the directory path, or a JSON object with path and an optional max_depth."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory path, relative to the target root"
                },
                "max_depth": {
                    "type": "integer",
                    "description": "Optional depth limit (1 shows only direct children)"
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
        let max_depth = optional_usize(&args, "max_depth")?;
        let dir = resolve_dir(&self.workspace, raw)?;

        let mut out = format!("{}\n", self.workspace.display(&dir));
        render_tree(&self.workspace, &dir, "", 1, max_depth, &mut out)?;
        Ok(out.trim_end().to_string())
    }
}

fn resolve_dir(workspace: &Workspace, raw: &str) -> Result<std::path::PathBuf, ToolError> {
    let dir = workspace.resolve(raw)?;
    if !dir.is_dir() {
        return Err(ToolError::InvalidInput(format!(
            "'{}' is not a directory",
            raw
        )));
    }
    Ok(dir)
}

/// Root-relative paths of all files below `dir`, sorted, ignore list applied.
pub(crate) fn collect_files(workspace: &Workspace, dir: &Path) -> Result<Vec<String>, ToolError> {
    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !workspace.is_ignored(&e.file_name().to_string_lossy()));

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            ToolError::io(path, e.into())
        })?;
        if entry.file_type().is_file() {
            files.push(workspace.display(entry.path()));
        }
    }
    files.sort();
    Ok(files)
}

/// Directories first, then files, each group sorted by name.
fn sorted_children(workspace: &Workspace, dir: &Path) -> Result<Vec<(String, bool)>, ToolError> {
    let mut children = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| ToolError::io(dir, e))? {
        let entry = entry.map_err(|e| ToolError::io(dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if workspace.is_ignored(&name) {
            continue;
        }
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        children.push((name, is_dir));
    }
    children.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Ok(children)
}

fn render_tree(
    workspace: &Workspace,
    dir: &Path,
    prefix: &str,
    depth: usize,
    max_depth: Option<usize>,
    out: &mut String,
) -> Result<(), ToolError> {
    if max_depth.is_some_and(|max| depth > max) {
        return Ok(());
    }

    let children = sorted_children(workspace, dir)?;
    let count = children.len();
    for (i, (name, is_dir)) in children.into_iter().enumerate() {
        let last = i + 1 == count;
        let branch = if last { "└── " } else { "├── " };
        out.push_str(prefix);
        out.push_str(branch);
        out.push_str(&name);
        if is_dir {
            out.push('/');
        }
        out.push('\n');

        if is_dir {
            let child_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });
            render_tree(workspace, &dir.join(&name), &child_prefix, depth + 1, max_depth, out)?;
        }
    }
    Ok(())
}
