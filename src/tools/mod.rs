pub mod directory;
pub mod files;
pub mod http;
pub mod search;
pub mod traits;
pub mod workspace;

pub use http::HostPolicy;
pub use traits::{Tool, ToolDefinition};
pub use workspace::Workspace;

use crate::config::ScoutConfig;
use crate::llm::Embedder;
use crate::types::ObservationKind;
use anyhow::{anyhow, bail, Result};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

// ---------------------------------------------------------------------------
// Closed tool catalogue
// ---------------------------------------------------------------------------

/// Every tool implementation vulnscout ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    ViewFile,
    ViewFileLines,
    ListDirectory,
    ListFiles,
    DirectoryStructure,
    HttpProbe,
    CodeSearch,
}

impl ToolKind {
    pub const ALL: [ToolKind; 7] = [
        Self::ViewFile,
        Self::ViewFileLines,
        Self::ListDirectory,
        Self::ListFiles,
        Self::DirectoryStructure,
        Self::HttpProbe,
        Self::CodeSearch,
    ];

    /// The file and directory inspection tools.
    pub const INSPECTION: [ToolKind; 5] = [
        Self::ViewFile,
        Self::ViewFileLines,
        Self::ListDirectory,
        Self::ListFiles,
        Self::DirectoryStructure,
    ];

    /// Name presented to the model.
    pub fn name(self) -> &'static str {
        match self {
            Self::ViewFile => "view_file",
            Self::ViewFileLines => "view_file_lines",
            Self::ListDirectory => "list_directory",
            Self::ListFiles => "list_files",
            Self::DirectoryStructure => "directory_structure",
            Self::HttpProbe => "http_tool",
            Self::CodeSearch => "custom_search",
        }
    }

    /// Whether the tool reads the target source tree.
    pub fn needs_workspace(self) -> bool {
        Self::INSPECTION.contains(&self)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name.trim())
    }

    /// Instantiate the tool against the process-wide context.
    pub fn build(self, ctx: &ToolContext) -> Result<Box<dyn Tool>> {
        let workspace = || {
            ctx.workspace.clone().ok_or_else(|| {
                anyhow!(
                    "Tool '{}' needs the target source tree; run `vulnscout prepare` or set target_dir",
                    self.name()
                )
            })
        };

        Ok(match self {
            Self::ViewFile => Box::new(files::ViewFile::new(workspace()?)),
            Self::ViewFileLines => Box::new(files::ViewFileLines::new(workspace()?)),
            Self::ListDirectory => Box::new(directory::ListDirectory::new(workspace()?)),
            Self::ListFiles => Box::new(directory::ListFiles::new(workspace()?)),
            Self::DirectoryStructure => Box::new(directory::DirectoryStructure::new(workspace()?)),
            Self::HttpProbe => Box::new(http::HttpProbe::new(
                ctx.http_timeout_secs,
                ctx.host_policy.clone(),
            )?),
            Self::CodeSearch => {
                let embedder = ctx.embedder.clone().ok_or_else(|| {
                    anyhow!("Tool 'custom_search' needs an embedding model")
                })?;
                Box::new(search::CodeSearch::new(
                    ctx.index_path.clone(),
                    embedder,
                    ctx.search_top_k,
                ))
            }
        })
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Process-wide tool context
// ---------------------------------------------------------------------------

/// Read-only handles shared by every tool, established once at start.
#[derive(Clone)]
pub struct ToolContext {
    pub workspace: Option<Arc<Workspace>>,
    pub embedder: Option<Arc<dyn Embedder>>,
    pub index_path: PathBuf,
    pub search_top_k: usize,
    pub http_timeout_secs: u64,
    pub host_policy: HostPolicy,
}

impl ToolContext {
    /// Context for a task using `kinds`. The target tree is only opened when
    /// one of them inspects it.
    pub fn from_config(
        config: &ScoutConfig,
        kinds: &[ToolKind],
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Self {
        let workspace = if kinds.iter().any(|k| k.needs_workspace()) {
            let root = config.resolved_target_dir();
            match Workspace::open(&root, config.ignore.clone()) {
                Ok(ws) => Some(Arc::new(ws)),
                Err(e) => {
                    warn!("File tools unavailable: {:#}", e);
                    None
                }
            }
        } else {
            None
        };

        Self {
            workspace,
            embedder,
            index_path: config.resolved_index_path(),
            search_top_k: config.search_top_k,
            http_timeout_secs: config.http_timeout_secs,
            host_policy: HostPolicy {
                allow: config.allow_hosts.clone(),
                deny: config.deny_hosts.clone(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tool sets
// ---------------------------------------------------------------------------

/// Result of dispatching one action.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub observation: String,
    pub kind: ObservationKind,
}

/// Ordered tools visible to one task, unique by name.
pub struct ToolSet {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolSet {
    /// Build the tools for `kinds`, in order.
    pub fn build(kinds: &[ToolKind], ctx: &ToolContext) -> Result<Self> {
        let tools = kinds
            .iter()
            .map(|k| k.build(ctx))
            .collect::<Result<Vec<_>>>()?;
        Self::from_tools(tools)
    }

    /// Wrap already-constructed tools, rejecting duplicate names.
    pub fn from_tools(tools: Vec<Box<dyn Tool>>) -> Result<Self> {
        for (i, tool) in tools.iter().enumerate() {
            if tools[..i].iter().any(|t| t.name() == tool.name()) {
                bail!("Duplicate tool name in tool set: {}", tool.name());
            }
        }
        Ok(Self { tools })
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        let name = name.trim();
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Look up and run the named tool. Never fails: every problem becomes
    /// observation text.
    pub async fn invoke(&self, name: &str, raw_input: &str) -> Invocation {
        let Some(tool) = self.get(name) else {
            return Invocation {
                observation: format!(
                    "{} is not a valid tool, try one of [{}].",
                    name.trim(),
                    self.names().join(", ")
                ),
                kind: ObservationKind::UnknownTool,
            };
        };

        let args = decode_input(raw_input, tool.primary_arg());
        match tool.execute(args).await {
            Ok(output) => Invocation {
                observation: output,
                kind: ObservationKind::ToolOutput,
            },
            Err(e) => Invocation {
                observation: format!("Error: {}", e),
                kind: ObservationKind::ToolError,
            },
        }
    }
}

/// Turn an `Action Input` into tool arguments: a JSON object is used as-is,
/// anything else is bound to the tool's primary argument.
pub fn decode_input(raw: &str, primary_arg: &str) -> Value {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        match value {
            Value::Object(_) => return value,
            Value::String(s) => return serde_json::json!({ primary_arg: s }),
            _ => {}
        }
    }
    serde_json::json!({ primary_arg: trimmed })
}
