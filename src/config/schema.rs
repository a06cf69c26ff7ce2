//! Configuration schema for vulnscout.toml.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    /// OpenAI-compatible API base URL.
    pub api_url: String,

    /// API key for the completion and embedding endpoints.
    pub api_key: String,

    /// Chat model driving the reasoning loop.
    pub model: String,

    /// Embedding model used by the index and the search tool.
    pub embedding_model: String,

    /// Sampling temperature passed to the model.
    pub temperature: f64,

    /// Maximum tokens per completion.
    pub max_tokens: u32,

    /// Per-request timeout for the model endpoint (0 disables).
    pub model_timeout_secs: u64,

    /// Retries for a failing completion request before the run fails.
    pub max_model_retries: u32,

    /// Cap on loop iterations per task.
    pub max_iterations: u32,

    /// Optional cap on unparseable completions per task.
    pub max_parse_failures: Option<u32>,

    /// Observations longer than this are truncated before replay.
    pub max_observation_chars: usize,

    /// Surface intermediate steps.
    pub verbose: bool,

    /// Root of the source tree the file tools may read.
    pub target_dir: String,

    /// Repository cloned into `target_dir` by `vulnscout prepare`.
    pub target_repo_url: String,

    /// Directory names skipped by recursive listings and the indexer.
    pub ignore: Vec<String>,

    /// Persisted embedding index.
    pub index_path: String,

    /// File extensions the indexer embeds.
    pub index_extensions: Vec<String>,

    /// Lines per indexed chunk.
    pub chunk_lines: usize,

    /// Lines shared between consecutive chunks.
    pub chunk_overlap: usize,

    /// Files larger than this are not indexed.
    pub max_index_file_bytes: u64,

    /// Chunks returned by the search tool.
    pub search_top_k: usize,

    /// Timeout for the HTTP probe tool (0 disables).
    pub http_timeout_secs: u64,

    /// If non-empty, the HTTP probe only reaches these hosts.
    pub allow_hosts: Vec<String>,

    /// Hosts the HTTP probe never reaches.
    pub deny_hosts: Vec<String>,

    /// Directory holding user task files.
    pub tasks_dir: String,

    /// Body served by the flag endpoint.
    pub flag_body: String,

    /// Address the flag server binds to.
    pub flag_bind: String,

    /// Where the `ctf` task tells the model to find the flag.
    pub flag_url: String,

    /// Log level (debug, info, warn, error).
    pub log_level: String,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com".into(),
            api_key: String::new(),
            model: "gpt-4o-mini".into(),
            embedding_model: "text-embedding-3-small".into(),
            temperature: 0.4,
            max_tokens: 2048,
            model_timeout_secs: 120,
            max_model_retries: 3,
            max_iterations: 15,
            max_parse_failures: None,
            max_observation_chars: 20_000,
            verbose: false,
            target_dir: "./repo".into(),
            target_repo_url: "https://github.com/juice-shop/juice-shop.git".into(),
            ignore: vec![".git".into(), "node_modules".into()],
            index_path: "./vector_databases/target_index.json".into(),
            index_extensions: ["js", "ts", "py", "html", "json", "sql", "yml"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
            chunk_lines: 60,
            chunk_overlap: 10,
            max_index_file_bytes: 256 * 1024,
            search_top_k: 4,
            http_timeout_secs: 30,
            allow_hosts: Vec::new(),
            deny_hosts: Vec::new(),
            tasks_dir: "./tasks".into(),
            flag_body: "Hello, world!".into(),
            flag_bind: "0.0.0.0:8080".into(),
            flag_url: "http://localhost:8080/".into(),
            log_level: "info".into(),
        }
    }
}

impl ScoutConfig {
    /// Resolve a path that may contain `~`.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).into_owned())
    }

    /// Resolved target source root.
    pub fn resolved_target_dir(&self) -> PathBuf {
        self.resolve_path(&self.target_dir)
    }

    /// Resolved embedding index path.
    pub fn resolved_index_path(&self) -> PathBuf {
        self.resolve_path(&self.index_path)
    }

    /// Resolved task file directory.
    pub fn resolved_tasks_dir(&self) -> PathBuf {
        self.resolve_path(&self.tasks_dir)
    }

    /// Apply `VULNSCOUT_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub(crate) fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let fields: [(&str, &mut String); 5] = [
            ("VULNSCOUT_API_URL", &mut self.api_url),
            ("VULNSCOUT_API_KEY", &mut self.api_key),
            ("VULNSCOUT_MODEL", &mut self.model),
            ("VULNSCOUT_EMBEDDING_MODEL", &mut self.embedding_model),
            ("VULNSCOUT_TARGET_DIR", &mut self.target_dir),
        ];
        for (key, field) in fields {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *field = value;
            }
        }
    }
}
