//! Core ReAct loop: Think → Act → Observe, bounded.
//!
//! Each iteration:
//! 1. Renders the prompt from the instructions, tools and scratchpad
//! 2. Requests a completion (retrying transient model errors)
//! 3. Parses it into an action or a final answer
//! 4. Runs the tool, or validates the answer
//! 5. Appends the step and repeats
//!
//! Tool failures, unknown tools and malformed completions are absorbed as
//! observations. Only the iteration cap, the optional parse-failure cap and
//! an unreachable model end a run early.

use crate::agent::answer::AnswerSchema;
use crate::agent::parser::{self, Parsed, EXCEPTION_TOOL};
use crate::agent::prompt;
use crate::config::ScoutConfig;
use crate::llm::{CompletionModel, CompletionRequest};
use crate::tools::ToolSet;
use crate::types::*;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Per-run loop settings.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub max_iterations: u32,
    pub temperature: f64,
    pub max_tokens: u32,
    pub verbose: bool,
    pub max_parse_failures: Option<u32>,
    pub max_observation_chars: usize,
    pub max_model_retries: u32,
    /// Base delay between model retries; grows linearly.
    pub retry_delay: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self::from_config(&ScoutConfig::default())
    }
}

impl LoopConfig {
    pub fn from_config(config: &ScoutConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            verbose: config.verbose,
            max_parse_failures: config.max_parse_failures,
            max_observation_chars: config.max_observation_chars,
            max_model_retries: config.max_model_retries,
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// What the loop needs to know about a task.
#[derive(Debug, Clone)]
pub struct TaskPrompt<'a> {
    pub instructions: &'a str,
    pub input: &'a str,
    pub answer: Option<&'a AnswerSchema>,
}

/// Run one task to a terminal outcome.
pub async fn run_task(
    task: TaskPrompt<'_>,
    tools: &ToolSet,
    model: &dyn CompletionModel,
    config: &LoopConfig,
) -> RunOutcome {
    let run_id = ulid::Ulid::new();
    info!(
        "[{}] Starting task with {} tools on {} (max {} iterations)",
        run_id,
        tools.len(),
        model.name(),
        config.max_iterations
    );

    let mut steps: Vec<Step> = Vec::new();
    let mut parse_failures: u32 = 0;
    let mut last_output: Option<String> = None;
    let mut state = LoopState::AwaitingCompletion;

    for iteration in 1..=config.max_iterations {
        debug!("[{}] Iteration {} ({})", run_id, iteration, state);

        let request = CompletionRequest {
            prompt: prompt::build_prompt(task.instructions, task.input, tools, &steps),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            stop: prompt::stop_sequences(),
        };

        let completion = match complete_with_retry(model, &request, config).await {
            Ok(text) => text,
            Err(reason) => {
                transition(&mut state, LoopState::Failed, run_id);
                return RunOutcome::Failed(RunFailure {
                    kind: FailureKind::ModelUnavailable(reason),
                    steps,
                    last_output,
                });
            }
        };
        last_output = Some(completion.clone());

        let step = match parser::parse(&completion) {
            Ok(Parsed::Finish { answer, log }) => match task.answer.map(|s| (s, s.validate(&answer))) {
                None => {
                    transition(&mut state, LoopState::Done, run_id);
                    info!("[{}] Final answer after {} steps", run_id, steps.len());
                    return RunOutcome::Completed {
                        answer,
                        structured: None,
                        steps,
                    };
                }
                Some((_, Ok(value))) => {
                    transition(&mut state, LoopState::Done, run_id);
                    info!("[{}] Validated final answer after {} steps", run_id, steps.len());
                    return RunOutcome::Completed {
                        answer,
                        structured: Some(value),
                        steps,
                    };
                }
                Some((schema, Err(e))) => {
                    warn!("[{}] Rejected final answer: {}", run_id, e);
                    parse_failures += 1;
                    Step::new(
                        Action {
                            tool: EXCEPTION_TOOL.into(),
                            input: answer,
                            log,
                        },
                        format!(
                            "{}. The Final Answer must be a JSON object with these fields:\n{}",
                            e,
                            schema.describe()
                        ),
                        ObservationKind::InvalidAnswer,
                    )
                }
            },
            Ok(Parsed::Action(action)) => {
                transition(&mut state, LoopState::ExecutingTool, run_id);
                info!("[{}] Tool: {}({})", run_id, action.tool, action.input);

                let invocation = tools.invoke(&action.tool, &action.input).await;
                match invocation.kind {
                    ObservationKind::ToolOutput => {
                        info!("[{}] Tool result: {} chars", run_id, invocation.observation.len())
                    }
                    _ => warn!("[{}] {}", run_id, invocation.observation),
                }

                transition(&mut state, LoopState::AwaitingCompletion, run_id);
                Step::new(
                    action,
                    truncate(invocation.observation, config.max_observation_chars),
                    invocation.kind,
                )
            }
            Err(e) => {
                warn!("[{}] Unparseable completion: {}", run_id, e);
                parse_failures += 1;
                Step::new(
                    Action {
                        tool: EXCEPTION_TOOL.into(),
                        input: completion.clone(),
                        log: completion,
                    },
                    e.to_string(),
                    ObservationKind::ParseFailure,
                )
            }
        };

        if config.verbose {
            info!("[{}] {}", run_id, describe_step(steps.len() + 1, &step));
        }
        steps.push(step);

        if let Some(max) = config.max_parse_failures {
            if parse_failures > max {
                transition(&mut state, LoopState::Failed, run_id);
                warn!("[{}] {} parse failures, giving up", run_id, parse_failures);
                return RunOutcome::Failed(RunFailure {
                    kind: FailureKind::ParseRetriesExhausted,
                    steps,
                    last_output,
                });
            }
        }
    }

    transition(&mut state, LoopState::Failed, run_id);
    warn!(
        "[{}] Max iterations ({}) reached without a final answer",
        run_id, config.max_iterations
    );
    RunOutcome::Failed(RunFailure {
        kind: FailureKind::IterationLimit,
        steps,
        last_output,
    })
}

async fn complete_with_retry(
    model: &dyn CompletionModel,
    request: &CompletionRequest,
    config: &LoopConfig,
) -> Result<String, String> {
    let mut attempt: u32 = 0;
    loop {
        match model.complete(request).await {
            Ok(text) => return Ok(text),
            Err(e) => {
                attempt += 1;
                error!(
                    "Inference error ({}/{}): {:#}",
                    attempt,
                    config.max_model_retries + 1,
                    e
                );
                if attempt > config.max_model_retries {
                    return Err(format!("{:#}", e));
                }
                tokio::time::sleep(config.retry_delay * attempt).await;
            }
        }
    }
}

fn transition(state: &mut LoopState, next: LoopState, run_id: ulid::Ulid) {
    debug_assert!(!state.is_terminal(), "transition out of terminal state {}", state);
    debug!("[{}] {} -> {}", run_id, state, next);
    *state = next;
}

/// Verbose rendering of one step: the model's reasoning, then what it did.
fn describe_step(number: usize, step: &Step) -> String {
    format!(
        "Step {}:\n{}\n  Tool: {} - {}\n  Observation: {}",
        number,
        step.action.log.trim(),
        step.action.tool,
        step.action.input,
        step.observation
    )
}

/// Cut an observation at a char boundary, noting how much was dropped.
fn truncate(observation: String, max_chars: usize) -> String {
    if max_chars == 0 || observation.chars().count() <= max_chars {
        return observation;
    }
    let cut: String = observation.chars().take(max_chars).collect();
    let dropped = observation.chars().count() - max_chars;
    format!("{}\n... [truncated {} chars]", cut, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo".into(), 0), "héllo");
        assert_eq!(truncate("héllo".into(), 10), "héllo");
        assert_eq!(truncate("héllo".into(), 2), "hé\n... [truncated 3 chars]");
    }

    #[test]
    fn verbose_step_includes_the_thought_log() {
        let step = Step::new(
            Action {
                tool: "view_file".into(),
                input: "routes/login.ts".into(),
                log: "Thought: the login route builds SQL by hand\nAction: view_file\nAction Input: routes/login.ts\n".into(),
            },
            "const q = `SELECT ...`".into(),
            ObservationKind::ToolOutput,
        );

        let text = describe_step(2, &step);
        assert!(text.starts_with("Step 2:\nThought: the login route builds SQL by hand"));
        assert!(text.contains("Tool: view_file - routes/login.ts"));
        assert!(text.ends_with("Observation: const q = `SELECT ...`"));
    }

    #[test]
    fn loop_config_follows_scout_config() {
        let config = ScoutConfig {
            max_iterations: 3,
            max_parse_failures: Some(1),
            ..ScoutConfig::default()
        };
        let lc = LoopConfig::from_config(&config);
        assert_eq!(lc.max_iterations, 3);
        assert_eq!(lc.max_parse_failures, Some(1));
    }
}
