mod common;

use std::time::Duration;

use mcp_host::error::{ErrorCategory, HostError};
use mcp_host::mcp::{SessionConnector, SseConnector, SseOptions};
use mcp_host::server::presets;
use pretty_assertions::assert_eq;
use serde_json::json;

use common::{dead_endpoint, eventually, spawn_tool_server};

fn connector() -> SseConnector {
    SseConnector::new(SseOptions {
        open_timeout: Duration::from_secs(5),
        request_timeout: Duration::from_secs(5),
    })
    .unwrap()
}

#[tokio::test]
async fn sse_session_lists_and_calls_tools() {
    let server = spawn_tool_server(presets::todoplan()).await;
    let session = connector()
        .connect("todoplan-server", &server.sse_url())
        .await
        .unwrap();

    let mut names: Vec<_> = session
        .list_tools()
        .await
        .unwrap()
        .into_iter()
        .map(|tool| tool.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["get-plan", "get-todo"]);

    let result = session
        .call_tool("get-todo", json!({"category": "family"}))
        .await
        .unwrap();
    assert_eq!(result.into_value_or_text(), json!("trip to disneyland"));

    session.close().await.unwrap();
}

#[tokio::test]
async fn concurrent_calls_on_one_session_are_correlated() {
    let server = spawn_tool_server(presets::todoplan()).await;
    let session = connector()
        .connect("todoplan-server", &server.sse_url())
        .await
        .unwrap();

    let (life, work, plan) = tokio::join!(
        session.call_tool("get-todo", json!({"category": "life"})),
        session.call_tool("get-todo", json!({"category": "work"})),
        session.call_tool("get-plan", json!({})),
    );
    assert_eq!(life.unwrap().into_value_or_text(), json!("go to the gym"));
    assert_eq!(
        work.unwrap().into_value_or_text(),
        json!("finish the project Jupiter report")
    );
    assert_eq!(plan.unwrap().into_value_or_text(), json!("meet my friends"));
}

#[tokio::test]
async fn unknown_tool_is_reported_by_the_server() {
    let server = spawn_tool_server(presets::project()).await;
    let session = connector()
        .connect("project-server", &server.sse_url())
        .await
        .unwrap();

    let err = session.call_tool("get-weather", json!({})).await.unwrap_err();
    assert!(matches!(err, HostError::Protocol { code: -32602, .. }));
    assert_eq!(err.category(), ErrorCategory::ToolExecution);
}

#[tokio::test]
async fn unreachable_server_fails_to_connect() {
    let endpoint = dead_endpoint().await;
    let result = connector().connect("gone", &endpoint).await;
    let err = result.err().unwrap();
    assert!(err.is_retryable(), "unexpected error: {err}");
}

#[tokio::test]
async fn post_without_known_session_is_rejected() {
    let server = spawn_tool_server(presets::todoplan()).await;
    let client = reqwest::Client::new();
    let message = json!({"jsonrpc": "2.0", "id": 1, "method": "ping"});

    let missing = client
        .post(server.messages_url())
        .json(&message)
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 400);
    assert_eq!(missing.text().await.unwrap(), "No transport found for sessionId");

    let bogus = client
        .post(format!("{}?sessionId=not-a-session", server.messages_url()))
        .json(&message)
        .send()
        .await
        .unwrap();
    assert_eq!(bogus.status(), 400);
    assert_eq!(bogus.text().await.unwrap(), "No transport found for sessionId");
}

#[tokio::test]
async fn closing_a_session_releases_the_server_entry() {
    let server = spawn_tool_server(presets::example()).await;
    let session = connector()
        .connect("example-server", &server.sse_url())
        .await
        .unwrap();
    assert_eq!(server.sessions.len(), 1);
    assert!(server.sessions.contains(session.session_id()));

    session.close().await.unwrap();
    drop(session);

    let sessions = server.sessions.clone();
    assert!(eventually(Duration::from_secs(5), || sessions.is_empty()).await);
}

#[tokio::test]
async fn calls_after_close_fail_with_session_closed() {
    let server = spawn_tool_server(presets::example()).await;
    let session = connector()
        .connect("example-server", &server.sse_url())
        .await
        .unwrap();
    session.close().await.unwrap();

    let err = session.call_tool("get-plan", json!({})).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Transport);
}
