//! Task files: Markdown instructions with YAML frontmatter.
//!
//! ```markdown
//! ---
//! name: xss
//! description: Look for reflected XSS
//! input: Analyze ./repo/ for reflected XSS.
//! tools: [list_files, view_file]
//! temperature: 0.3
//! answer_fields:
//!   is_insecure: bool
//!   reason: string
//! ---
//! You are a security analyst ...
//! ```
//!
//! Task files live either directly in the tasks directory (`*.md`) or as
//! `<dir>/TASK.md`.

use super::{TaskError, TaskSpec};
use crate::agent::{AnswerSchema, FieldType};
use crate::tools::ToolKind;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Load every task file in `tasks_dir`. The first file that fails to parse,
/// or names a tool vulnscout does not have, aborts the load.
pub fn load_tasks(tasks_dir: &Path) -> Result<Vec<TaskSpec>, TaskError> {
    if !tasks_dir.exists() {
        debug!("Tasks directory does not exist: {:?}", tasks_dir);
        return Ok(Vec::new());
    }

    let mut tasks = Vec::new();
    let entries = std::fs::read_dir(tasks_dir).map_err(|e| TaskError::Io {
        path: tasks_dir.to_path_buf(),
        source: e,
    })?;

    let mut paths: Vec<_> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
    paths.sort();

    for path in paths {
        let file = if path.is_dir() {
            path.join("TASK.md")
        } else if path.extension().is_some_and(|e| e == "md") {
            path
        } else {
            continue;
        };
        if !file.is_file() {
            continue;
        }

        let task = parse_task_file(&file).map_err(|e| TaskError::InvalidFile {
            path: file.clone(),
            source: Box::new(e),
        })?;
        info!("Loaded task: {} ({} tools)", task.name, task.tools.len());
        tasks.push(task);
    }

    info!("Loaded {} tasks from {:?}", tasks.len(), tasks_dir);
    Ok(tasks)
}

#[derive(Debug, serde::Deserialize)]
struct TaskFrontmatter {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    input: Option<String>,
    #[serde(default)]
    tools: Vec<String>,
    #[serde(default)]
    temperature: Option<f64>,
    #[serde(default)]
    answer_fields: BTreeMap<String, FieldType>,
}

/// Parse one task file.
pub fn parse_task_file(path: &Path) -> Result<TaskSpec, TaskError> {
    let content = std::fs::read_to_string(path).map_err(|e| TaskError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let (frontmatter, instructions) = split_frontmatter(&content);
    if frontmatter.is_empty() {
        return Err(TaskError::Frontmatter("missing YAML frontmatter".into()));
    }
    let fm: TaskFrontmatter = serde_yaml::from_str(frontmatter)
        .map_err(|e| TaskError::Frontmatter(e.to_string()))?;

    let default_name = path
        .file_stem()
        .filter(|s| *s != "TASK")
        .or_else(|| path.parent().and_then(|p| p.file_name()))
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();
    let name = fm.name.unwrap_or(default_name);

    if fm.tools.is_empty() {
        return Err(TaskError::NoTools(name));
    }
    let tools = fm
        .tools
        .iter()
        .map(|t| {
            ToolKind::from_name(t).ok_or_else(|| TaskError::UnknownTool {
                task: name.clone(),
                tool: t.clone(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let answer = if fm.answer_fields.is_empty() {
        None
    } else {
        Some(
            fm.answer_fields
                .into_iter()
                .fold(AnswerSchema::new(), |schema, (field, ty)| schema.field(field, ty)),
        )
    };

    Ok(TaskSpec {
        description: fm.description.unwrap_or_default(),
        input: fm.input.unwrap_or_default(),
        instructions: instructions.trim().to_string(),
        tools,
        answer,
        temperature: fm.temperature,
        name,
    })
}

/// Split YAML frontmatter (between `---` markers) from the rest of the content.
fn split_frontmatter(content: &str) -> (&str, &str) {
    let trimmed = content.trim_start();

    let Some(after_first) = trimmed.strip_prefix("---") else {
        return ("", content);
    };

    match after_first.find("\n---") {
        Some(end_idx) => {
            let fm = after_first[..end_idx].trim();
            let body = &after_first[end_idx + 4..];
            (fm, body.trim_start_matches(['\r', '\n']))
        }
        None => ("", content),
    }
}
