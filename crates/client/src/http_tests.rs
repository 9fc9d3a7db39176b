use super::*;
use serde_json::json;

fn client(server: &mockito::ServerGuard) -> HttpTaskServiceClient {
    HttpTaskServiceClient::new(server.url(), Duration::from_secs(2), 3)
}

#[tokio::test]
async fn list_idle_parses_wrapped_tasks() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("POST", "/tools/call")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "tasks": [{"id": "t1", "status": "idle"}] }).to_string())
        .create_async()
        .await;

    let tasks = client(&server).list_idle("agent-a", 10).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].task_id, "t1");
}

#[tokio::test]
async fn get_unassigned_in_queue_parses_bare_array() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("POST", "/tools/call")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!([{"id": "t2"}, {"id": "t3"}]).to_string())
        .create_async()
        .await;

    let tasks = client(&server)
        .get_unassigned_in_queue("default", 10)
        .await
        .unwrap();
    assert_eq!(tasks.len(), 2);
}

#[tokio::test]
async fn get_unassigned_in_queue_respects_limit() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("POST", "/tools/call")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!([{"id": "t1"}, {"id": "t2"}, {"id": "t3"}]).to_string())
        .create_async()
        .await;

    let tasks = client(&server)
        .get_unassigned_in_queue("default", 2)
        .await
        .unwrap();
    assert_eq!(tasks.len(), 2);
}

#[tokio::test]
async fn api_error_response_is_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let m = server
        .mock("POST", "/tools/call")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "error": "task not found" }).to_string())
        .expect(1)
        .create_async()
        .await;

    let err = client(&server).assign("missing", "agent-a").await.unwrap_err();
    assert!(matches!(err, ClientError::Api(_)));
    m.assert_async().await;
}

#[tokio::test]
async fn non_2xx_status_is_surfaced_as_api_error() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("POST", "/tools/call")
        .with_status(500)
        .with_header("content-type", "application/json")
        .with_body(json!({ "error": "internal" }).to_string())
        .create_async()
        .await;

    let err = client(&server).claim("t1", "agent-a").await.unwrap_err();
    assert!(matches!(err, ClientError::Api(_)));
}

#[tokio::test]
async fn get_task_returns_none_for_not_found_error() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("POST", "/tools/call")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "error": "task not found: t9" }).to_string())
        .create_async()
        .await;

    let task = client(&server).get_task("t9").await.unwrap();
    assert!(task.is_none());
}

#[tokio::test]
async fn get_task_unwraps_task_envelope() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("POST", "/tools/call")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "task": {"id": "t1", "status": "working"} }).to_string())
        .create_async()
        .await;

    let task = client(&server).get_task("t1").await.unwrap().unwrap();
    assert_eq!(task.task_id, "t1");
}

#[tokio::test]
async fn complete_picks_status_from_success_flag() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("POST", "/tools/call")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "ok": true }).to_string())
        .create_async()
        .await;

    assert!(client(&server).complete("t1", true).await.unwrap());
}

#[tokio::test]
async fn connection_failure_retries_until_exhausted() {
    // No server listening on this port; every attempt fails with a connection error.
    let unreachable = HttpTaskServiceClient::new(
        "http://127.0.0.1:1",
        Duration::from_millis(200),
        2,
    );
    let err = unreachable.claim("t1", "agent-a").await.unwrap_err();
    assert!(matches!(err, ClientError::Connection(_) | ClientError::Timeout(_)));
}
