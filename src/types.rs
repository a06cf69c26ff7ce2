//! Shared types used across the vulnscout runtime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Loop state machine
// ---------------------------------------------------------------------------

/// States a single reasoning-loop run transitions through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    /// Waiting on the model for the next completion.
    AwaitingCompletion,
    /// Running the tool named by the last action.
    ExecutingTool,
    /// An accepted final answer was produced.
    Done,
    /// A terminal failure ended the run.
    Failed,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingCompletion => write!(f, "awaiting_completion"),
            Self::ExecutingTool => write!(f, "executing_tool"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl LoopState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

// ---------------------------------------------------------------------------
// Inference types
// ---------------------------------------------------------------------------

/// A chat message sent to the completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// Token usage from an inference call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

// ---------------------------------------------------------------------------
// Scratchpad
// ---------------------------------------------------------------------------

/// A model-chosen tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Tool name exactly as the model wrote it.
    pub tool: String,
    /// Raw `Action Input:` text.
    pub input: String,
    /// The completion text that produced this action, replayed verbatim.
    pub log: String,
}

/// What produced a step's observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationKind {
    ToolOutput,
    ToolError,
    UnknownTool,
    ParseFailure,
    InvalidAnswer,
}

impl fmt::Display for ObservationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ToolOutput => write!(f, "tool_output"),
            Self::ToolError => write!(f, "tool_error"),
            Self::UnknownTool => write!(f, "unknown_tool"),
            Self::ParseFailure => write!(f, "parse_failure"),
            Self::InvalidAnswer => write!(f, "invalid_answer"),
        }
    }
}

/// One iteration of the loop: an action paired with its observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub action: Action,
    pub observation: String,
    pub kind: ObservationKind,
    pub at: DateTime<Utc>,
}

impl Step {
    pub fn new(action: Action, observation: String, kind: ObservationKind) -> Self {
        Self {
            action,
            observation,
            kind,
            at: Utc::now(),
        }
    }

    /// Whether the step consumed a tool call (as opposed to a corrective retry).
    pub fn is_tool_call(&self) -> bool {
        matches!(self.kind, ObservationKind::ToolOutput | ObservationKind::ToolError)
    }
}

// ---------------------------------------------------------------------------
// Run results
// ---------------------------------------------------------------------------

/// Why a run ended without an accepted final answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum FailureKind {
    /// `max_iterations` passed without a final answer.
    IterationLimit,
    /// More unparseable completions than `max_parse_failures` allows.
    ParseRetriesExhausted,
    /// The model endpoint kept failing after all retries.
    ModelUnavailable(String),
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IterationLimit => write!(f, "iteration limit reached"),
            Self::ParseRetriesExhausted => write!(f, "parse retries exhausted"),
            Self::ModelUnavailable(reason) => write!(f, "model unavailable: {}", reason),
        }
    }
}

/// A terminal failure, carrying the partial transcript for diagnosis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunFailure {
    pub kind: FailureKind,
    pub steps: Vec<Step>,
    /// Last raw completion, if the model produced any.
    pub last_output: Option<String>,
}

/// Outcome of one task run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RunOutcome {
    Completed {
        answer: String,
        /// Validated JSON, present when the task declares an answer schema.
        structured: Option<serde_json::Value>,
        steps: Vec<Step>,
    },
    Failed(RunFailure),
}

impl RunOutcome {
    pub fn steps(&self) -> &[Step] {
        match self {
            Self::Completed { steps, .. } => steps,
            Self::Failed(failure) => &failure.steps,
        }
    }

    pub fn final_state(&self) -> LoopState {
        match self {
            Self::Completed { .. } => LoopState::Done,
            Self::Failed(_) => LoopState::Failed,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

// ---------------------------------------------------------------------------
// Embedding index
// ---------------------------------------------------------------------------

/// A chunk of source text with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
    /// Root-relative source path.
    pub source: String,
    pub start_line: usize,
    pub end_line: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// A search hit returned by the index.
#[derive(Debug, Clone)]
pub struct ScoredChunk<'a> {
    pub chunk: &'a IndexedChunk,
    pub score: f32,
}
