//! Task drivers: instruction text, a task string and the tools it may use.

pub mod builtin;
pub mod loader;

pub use builtin::BuiltinContext;
pub use loader::{load_tasks, parse_task_file};

use crate::agent::{AnswerSchema, TaskPrompt};
use crate::tools::ToolKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("unknown task '{0}'")]
    UnknownTask(String),

    #[error("task '{task}' names unknown tool '{tool}'")]
    UnknownTool { task: String, tool: String },

    #[error("task '{0}' names no tools")]
    NoTools(String),

    #[error("invalid task frontmatter: {0}")]
    Frontmatter(String),

    #[error("task file {}: {source}", path.display())]
    InvalidFile {
        path: PathBuf,
        #[source]
        source: Box<TaskError>,
    },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A runnable task.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub name: String,
    pub description: String,
    pub instructions: String,
    /// Default task string; callers may override it.
    pub input: String,
    pub tools: Vec<ToolKind>,
    pub answer: Option<AnswerSchema>,
    pub temperature: Option<f64>,
}

impl TaskSpec {
    /// Borrow the parts the loop needs, with an optional input override.
    pub fn prompt<'a>(&'a self, input: Option<&'a str>) -> TaskPrompt<'a> {
        TaskPrompt {
            instructions: &self.instructions,
            input: input.unwrap_or(&self.input),
            answer: self.answer.as_ref(),
        }
    }
}

/// Built-in tasks followed by task files; a task file may shadow a built-in.
pub fn catalogue(ctx: &BuiltinContext, files: Vec<TaskSpec>) -> Vec<TaskSpec> {
    let mut tasks: Vec<TaskSpec> = builtin::all(ctx)
        .into_iter()
        .filter(|b| !files.iter().any(|f| f.name == b.name))
        .collect();
    tasks.extend(files);
    tasks
}

/// Find a task by name.
pub fn find<'a>(tasks: &'a [TaskSpec], name: &str) -> Result<&'a TaskSpec, TaskError> {
    tasks
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| TaskError::UnknownTask(name.to_string()))
}
