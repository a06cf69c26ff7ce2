//! Integration tests for the reasoning loop against real file tools.

mod common;

use common::{loop_config, tool_context, ScriptedModel};
use std::fs;
use vulnscout::agent::{run_task, AnswerSchema, FieldType, LoopConfig, TaskPrompt};
use vulnscout::tools::{ToolKind, ToolSet};
use vulnscout::types::*;

const INSTRUCTIONS: &str = "You are a security analyst.";

fn fixture() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("should create temp dir");
    fs::write(dir.path().join("app.js"), "const a = 1;\nconst b = 2;\nconst c = 3;\n").unwrap();
    fs::write(dir.path().join("db.js"), "query(`SELECT * FROM t WHERE id=${id}`);\n").unwrap();
    fs::write(dir.path().join("routes.js"), "app.get('/', h);\n").unwrap();
    dir
}

fn prompt<'a>(input: &'a str, answer: Option<&'a AnswerSchema>) -> TaskPrompt<'a> {
    TaskPrompt {
        instructions: INSTRUCTIONS,
        input,
        answer,
    }
}

#[tokio::test]
async fn test_stops_at_iteration_limit_without_final_answer() {
    let dir = fixture();
    let tools = ToolSet::build(&[ToolKind::ListDirectory], &tool_context(dir.path())).unwrap();
    let model = ScriptedModel::repeating(
        "Thought: Do I need to use a tool? Yes\nAction: list_directory\nAction Input: .",
    );

    let outcome = run_task(prompt("Look around", None), &tools, &model, &loop_config(3)).await;

    match &outcome {
        RunOutcome::Failed(failure) => {
            assert_eq!(failure.kind, FailureKind::IterationLimit);
            assert_eq!(failure.steps.len(), 3);
            assert!(failure.last_output.as_deref().unwrap().contains("list_directory"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(outcome.final_state(), LoopState::Failed);
    assert_eq!(model.calls(), 3);
}

#[tokio::test]
async fn test_lists_three_files_and_finishes_after_one_call() {
    let dir = fixture();
    let tools = ToolSet::build(&ToolKind::INSPECTION, &tool_context(dir.path())).unwrap();
    let model = ScriptedModel::new(&[
        "Thought: Do I need to use a tool? Yes\nAction: list_directory\nAction Input: .",
        "Thought: Do I need to use a tool? No\nFinal Answer: app.js, db.js, routes.js",
    ]);

    let outcome = run_task(prompt("List the files", None), &tools, &model, &loop_config(5)).await;

    match outcome {
        RunOutcome::Completed { answer, steps, structured } => {
            assert_eq!(answer, "app.js, db.js, routes.js");
            assert!(structured.is_none());
            assert_eq!(steps.len(), 1);
            assert_eq!(steps[0].kind, ObservationKind::ToolOutput);
            assert_eq!(steps[0].observation, "app.js\ndb.js\nroutes.js");
        }
        other => panic!("expected completion, got {:?}", other),
    }

    // The second prompt replays the first step.
    let second = model.prompt(1);
    assert!(second.contains("Observation: app.js\ndb.js\nroutes.js\nThought: "));
    assert!(second.contains("New input: List the files"));
}

#[tokio::test]
async fn test_unknown_tool_is_reported_in_next_prompt() {
    let dir = fixture();
    let tools = ToolSet::build(
        &[ToolKind::ListDirectory, ToolKind::ViewFile],
        &tool_context(dir.path()),
    )
    .unwrap();
    let model = ScriptedModel::new(&[
        "Thought: Do I need to use a tool? Yes\nAction: run_shell\nAction Input: ls -la",
        "Thought: Do I need to use a tool? No\nFinal Answer: nothing found",
    ]);

    let outcome = run_task(prompt("Look around", None), &tools, &model, &loop_config(5)).await;

    assert!(outcome.is_completed());
    assert_eq!(outcome.steps()[0].kind, ObservationKind::UnknownTool);
    assert!(model
        .prompt(1)
        .contains("run_shell is not a valid tool, try one of [list_directory, view_file]."));
}

#[tokio::test]
async fn test_invalid_line_ranges_become_observations() {
    let dir = fixture();
    let tools = ToolSet::build(&[ToolKind::ViewFileLines], &tool_context(dir.path())).unwrap();
    let model = ScriptedModel::new(&[
        "Action: view_file_lines\nAction Input: {\"path\": \"app.js\", \"start_line\": 3, \"end_line\": 1}",
        "Action: view_file_lines\nAction Input: {\"path\": \"app.js\", \"start_line\": 9, \"end_line\": 12}",
        "Action: view_file_lines\nAction Input: {\"path\": \"app.js\", \"start_line\": 2, \"end_line\": 2}",
        "Final Answer: done",
    ]);

    let outcome = run_task(prompt("Read app.js", None), &tools, &model, &loop_config(6)).await;

    let steps = outcome.steps();
    assert_eq!(steps.len(), 3);
    assert_eq!(steps[0].kind, ObservationKind::ToolError);
    assert_eq!(
        steps[0].observation,
        "Error: line range 3-1 is invalid for a file with 3 lines"
    );
    assert_eq!(
        steps[1].observation,
        "Error: line range 9-12 is invalid for a file with 3 lines"
    );
    assert_eq!(steps[2].kind, ObservationKind::ToolOutput);
    assert!(steps[2].observation.contains("const b = 2;"));
    assert!(outcome.is_completed());
}

#[tokio::test]
async fn test_traversal_outside_root_is_rejected() {
    let dir = fixture();
    let tools = ToolSet::build(&[ToolKind::ViewFile], &tool_context(dir.path())).unwrap();
    let model = ScriptedModel::new(&[
        "Action: view_file\nAction Input: ../../etc/passwd",
        "Final Answer: blocked",
    ]);

    let outcome = run_task(prompt("Read it", None), &tools, &model, &loop_config(4)).await;

    let step = &outcome.steps()[0];
    assert_eq!(step.kind, ObservationKind::ToolError);
    assert!(step.observation.contains("outside the target root"));
}

#[tokio::test]
async fn test_read_only_tools_are_idempotent() {
    let dir = fixture();
    let tools = ToolSet::build(&ToolKind::INSPECTION, &tool_context(dir.path())).unwrap();

    for (name, input) in [
        ("view_file", "db.js"),
        ("list_files", "."),
        ("directory_structure", "."),
    ] {
        let first = tools.invoke(name, input).await;
        let second = tools.invoke(name, input).await;
        assert_eq!(first.kind, ObservationKind::ToolOutput, "{}", name);
        assert_eq!(first.observation, second.observation, "{}", name);
    }
}

#[tokio::test]
async fn test_invalid_structured_answer_is_corrected() {
    let dir = fixture();
    let tools = ToolSet::build(&[ToolKind::ViewFile], &tool_context(dir.path())).unwrap();
    let schema = AnswerSchema::new()
        .field("is_insecure", FieldType::Bool)
        .field("reason", FieldType::String);
    let model = ScriptedModel::new(&[
        "Thought: Do I need to use a tool? No\nFinal Answer: it is insecure",
        "Thought: Do I need to use a tool? No\nFinal Answer: {\"is_insecure\": \"yes\", \"reason\": \"x\"}",
        "Thought: Do I need to use a tool? No\nFinal Answer: {\"is_insecure\": true, \"reason\": \"string interpolation in SQL\"}",
    ]);

    let outcome = run_task(prompt("Judge db.js", Some(&schema)), &tools, &model, &loop_config(5)).await;

    match outcome {
        RunOutcome::Completed { structured, steps, .. } => {
            let value = structured.expect("validated JSON");
            assert_eq!(value["is_insecure"], true);
            assert_eq!(steps.len(), 2);
            assert!(steps.iter().all(|s| s.kind == ObservationKind::InvalidAnswer));
            assert!(steps[1].observation.contains("`is_insecure` must be a bool"));
        }
        other => panic!("expected completion, got {:?}", other),
    }
    assert!(model.prompt(1).contains("must contain a JSON object"));
}

#[tokio::test]
async fn test_parse_failures_recover_then_exhaust() {
    let dir = fixture();
    let tools = ToolSet::build(&[ToolKind::ListDirectory], &tool_context(dir.path())).unwrap();

    // One malformed completion is fed back and the run still completes.
    let model = ScriptedModel::new(&["I think I should look around.", "Final Answer: ok"]);
    let outcome = run_task(prompt("Look", None), &tools, &model, &loop_config(5)).await;
    assert!(outcome.is_completed());
    assert_eq!(outcome.steps()[0].kind, ObservationKind::ParseFailure);
    assert_eq!(outcome.steps()[0].action.tool, "_Exception");
    assert!(model
        .prompt(1)
        .contains("Observation: Invalid Format: Missing 'Action:' after 'Thought:'"));

    // With a cap of one, the second malformed completion ends the run.
    let model = ScriptedModel::repeating("Action: list_directory");
    let config = LoopConfig {
        max_parse_failures: Some(1),
        ..loop_config(10)
    };
    let outcome = run_task(prompt("Look", None), &tools, &model, &config).await;
    match outcome {
        RunOutcome::Failed(failure) => {
            assert_eq!(failure.kind, FailureKind::ParseRetriesExhausted);
            assert_eq!(failure.steps.len(), 2);
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(model.calls(), 2);
}

#[tokio::test]
async fn test_unreachable_model_fails_after_retries() {
    let dir = fixture();
    let tools = ToolSet::build(&[ToolKind::ListDirectory], &tool_context(dir.path())).unwrap();
    let model = ScriptedModel::failing();
    let config = LoopConfig {
        max_model_retries: 2,
        ..loop_config(5)
    };

    let outcome = run_task(prompt("Look", None), &tools, &model, &config).await;

    match outcome {
        RunOutcome::Failed(RunFailure { kind: FailureKind::ModelUnavailable(reason), steps, .. }) => {
            assert!(reason.contains("connection refused"));
            assert!(steps.is_empty());
        }
        other => panic!("expected model failure, got {:?}", other),
    }
    assert_eq!(model.calls(), 3);
}
