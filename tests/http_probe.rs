//! Integration tests for the HTTP probe against the local flag server.

mod common;

use axum::response::Redirect;
use axum::routing::{get, post};
use axum::Router;
use common::{loop_config, tool_context, ScriptedModel};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use vulnscout::agent::run_task;
use vulnscout::flag_server;
use vulnscout::tasks::{builtin, BuiltinContext};
use vulnscout::tools::{HostPolicy, ToolContext, ToolKind, ToolSet};
use vulnscout::types::*;

async fn start_flag_server(body: &str) -> (String, CancellationToken) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("should bind");
    let url = format!("http://{}/", listener.local_addr().unwrap());
    let cancel = CancellationToken::new();
    tokio::spawn(flag_server::serve(listener, body.to_string(), cancel.clone()));
    (url, cancel)
}

/// An internal service: `/secret`, a redirect to it via `localhost`, and a
/// POST route that echoes the raw request body.
async fn start_internal_service() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("should bind");
    let port = listener.local_addr().unwrap().port();
    let app = Router::new()
        .route("/secret", get(|| async { "INTERNAL-SECRET" }))
        .route(
            "/redir",
            get(move || async move { Redirect::temporary(&format!("http://localhost:{}/secret", port)) }),
        )
        .route("/echo", post(|body: String| async move { body }));
    tokio::spawn(async move { axum::serve(listener, app).await });
    port
}

fn ctf_context(dir: &std::path::Path, policy: HostPolicy) -> ToolContext {
    ToolContext {
        host_policy: policy,
        ..tool_context(dir)
    }
}

#[tokio::test]
async fn test_ctf_task_retrieves_flag() {
    let dir = tempfile::tempdir().unwrap();
    let (url, cancel) = start_flag_server("Hello, world!").await;
    let task = builtin::builtin(
        "ctf",
        &BuiltinContext {
            target: "./repo/".into(),
            flag_url: url.clone(),
        },
    )
    .unwrap();
    let tools = ToolSet::build(&task.tools, &ctf_context(dir.path(), HostPolicy::default())).unwrap();

    let action = format!(
        "Thought: Do I need to use a tool? Yes\nAction: http_tool\nAction Input: {}",
        url
    );
    let model = ScriptedModel::new(&[
        action.as_str(),
        "Thought: Do I need to use a tool? No\nFinal Answer: {\"flag\": \"Hello, world!\", \"status\": 200}",
    ]);

    let outcome = run_task(task.prompt(None), &tools, &model, &loop_config(4)).await;

    match outcome {
        RunOutcome::Completed { structured, steps, .. } => {
            assert_eq!(structured.unwrap()["flag"], "Hello, world!");
            assert_eq!(steps[0].kind, ObservationKind::ToolOutput);
            assert!(steps[0].observation.starts_with("Status: 200"));
            assert!(steps[0].observation.contains("Headers:\n"));
            assert!(steps[0].observation.ends_with("\n\nBody:\nHello, world!"));
        }
        other => panic!("expected completion, got {:?}", other),
    }
    assert!(model.prompt(0).contains(&format!("Retrieve the flag from {}", url)));
    cancel.cancel();
}

#[tokio::test]
async fn test_unreachable_url_is_observed_and_loop_continues() {
    let dir = tempfile::tempdir().unwrap();
    // Bind then drop to get a port nobody listens on.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let tools = ToolSet::build(
        &[ToolKind::HttpProbe],
        &ctf_context(dir.path(), HostPolicy::default()),
    )
    .unwrap();

    let action = format!("Action: http_tool\nAction Input: http://127.0.0.1:{}/", port);
    let model = ScriptedModel::new(&[action.as_str(), "Final Answer: server is down"]);

    let outcome = run_task(
        vulnscout::agent::TaskPrompt {
            instructions: "Probe the service.",
            input: "Is it up?",
            answer: None,
        },
        &tools,
        &model,
        &loop_config(4),
    )
    .await;

    assert!(outcome.is_completed());
    let step = &outcome.steps()[0];
    assert_eq!(step.kind, ObservationKind::ToolError);
    assert!(step.observation.starts_with("Error: HTTP request failed"));
    assert_eq!(model.calls(), 2);
}

#[tokio::test]
async fn test_denied_hosts_are_never_contacted() {
    let dir = tempfile::tempdir().unwrap();
    let (url, cancel) = start_flag_server("secret").await;
    let policy = HostPolicy {
        allow: Vec::new(),
        deny: vec!["127.0.0.1".into()],
    };
    let tools = ToolSet::build(&[ToolKind::HttpProbe], &ctf_context(dir.path(), policy)).unwrap();

    let invocation = tools.invoke("http_tool", &url).await;

    assert_eq!(invocation.kind, ObservationKind::ToolError);
    assert!(invocation.observation.contains("blocked"));
    assert!(!invocation.observation.contains("secret"));
    cancel.cancel();
}

#[tokio::test]
async fn test_redirect_to_denied_host_is_blocked() {
    let dir = tempfile::tempdir().unwrap();
    let port = start_internal_service().await;
    let policy = HostPolicy {
        allow: Vec::new(),
        deny: vec!["localhost".into()],
    };
    let tools = ToolSet::build(&[ToolKind::HttpProbe], &ctf_context(dir.path(), policy)).unwrap();

    let invocation = tools
        .invoke("http_tool", &format!("http://127.0.0.1:{}/redir", port))
        .await;

    assert_eq!(invocation.kind, ObservationKind::ToolError);
    assert_eq!(
        invocation.observation,
        "Error: host 'localhost' is blocked by the HTTP probe policy"
    );
    assert!(!invocation.observation.contains("INTERNAL-SECRET"));

    // Without the deny rule the same redirect is followed.
    let tools = ToolSet::build(
        &[ToolKind::HttpProbe],
        &ctf_context(dir.path(), HostPolicy::default()),
    )
    .unwrap();
    let followed = tools
        .invoke("http_tool", &format!("http://127.0.0.1:{}/redir", port))
        .await;
    assert_eq!(followed.kind, ObservationKind::ToolOutput);
    assert!(followed.observation.ends_with("Body:\nINTERNAL-SECRET"));
}

#[tokio::test]
async fn test_post_sends_form_encoded_data() {
    let dir = tempfile::tempdir().unwrap();
    let port = start_internal_service().await;
    let tools = ToolSet::build(
        &[ToolKind::HttpProbe],
        &ctf_context(dir.path(), HostPolicy::default()),
    )
    .unwrap();

    let input = format!(
        r#"{{"url": "http://127.0.0.1:{}/echo", "method": "post", "data": {{"user": "admin' OR 1=1", "id": 7}}}}"#,
        port
    );
    let invocation = tools.invoke("http_tool", &input).await;

    assert_eq!(invocation.kind, ObservationKind::ToolOutput);
    assert!(invocation.observation.starts_with("Status: 200"));
    let body = invocation.observation.rsplit("Body:\n").next().unwrap();
    let mut fields: Vec<&str> = body.split('&').collect();
    fields.sort();
    assert_eq!(fields, vec!["id=7", "user=admin%27+OR+1%3D1"]);
}
