//! Shared fixtures for integration tests.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vulnscout::agent::LoopConfig;
use vulnscout::llm::{CompletionModel, CompletionRequest};
use vulnscout::tools::{HostPolicy, ToolContext, Workspace};

/// A completion model that replays canned responses and records every prompt.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String, String>>>,
    fallback: Option<String>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(responses: &[&str]) -> Self {
        Self {
            responses: Mutex::new(responses.iter().map(|r| Ok(r.to_string())).collect()),
            fallback: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with the same text.
    pub fn repeating(response: &str) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback: Some(response.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Fail every request.
    pub fn failing() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompt(&self, i: usize) -> String {
        self.prompts.lock().unwrap()[i].clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        let next = self.responses.lock().unwrap().pop_front();
        match (next, &self.fallback) {
            (Some(Ok(text)), _) => Ok(text),
            (Some(Err(e)), _) => Err(anyhow!(e)),
            (None, Some(text)) => Ok(text.clone()),
            (None, None) => Err(anyhow!("connection refused")),
        }
    }
}

/// Loop settings with a short retry delay.
pub fn loop_config(max_iterations: u32) -> LoopConfig {
    LoopConfig {
        max_iterations,
        retry_delay: Duration::from_millis(1),
        ..LoopConfig::default()
    }
}

/// Tool context rooted at `root`, with no embedder.
pub fn tool_context(root: &Path) -> ToolContext {
    ToolContext {
        workspace: Some(Arc::new(Workspace::open(root, Vec::new()).unwrap())),
        embedder: None,
        index_path: PathBuf::from("unused-index.json"),
        search_top_k: 4,
        http_timeout_secs: 5,
        host_policy: HostPolicy::default(),
    }
}
