//! Common utilities for running the `tickeasy` binary against a stub backend.

use std::io::Write;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;

use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::collections::HashMap;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;

/// Start an in-process stub of the verification API and return its base URL.
pub async fn spawn_stub_backend() -> String {
    async fn stats(Query(query): Query<HashMap<String, String>>) -> Response {
        let total = if query.contains_key("concertId") { 4 } else { 10 };
        Json(json!({
            "status": "success",
            "message": "ok",
            "data": {
                "totalTickets": total,
                "usedTickets": 2,
                "purchasedTickets": total - 3,
                "refundedTickets": 1,
                "verificationRate": "20.00%"
            }
        }))
        .into_response()
    }

    async fn not_found() -> Response {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "status": "error", "message": "Ticket not found" })),
        )
            .into_response()
    }

    let app = Router::new()
        .route("/api/v1/ticket-verification/stats", get(stats))
        .route("/api/v1/ticket-verification/info/{code}", get(not_found));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}/api/v1", addr)
}

/// Config using a pre-issued token against `base_url`.
pub fn token_config(base_url: &str) -> String {
    format!(
        r#"
[backend]
base_url = "{}"
timeout_secs = 5

[auth]
method = "token"
token = "test-token"
operator_id = "gate-test"
"#,
        base_url
    )
}

pub fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// Run `tickeasy` with the given config, arguments and stdin.
pub async fn run_tickeasy(config_path: &Path, args: &[&str], stdin: &str) -> Output {
    let mut child = tokio::process::Command::new(env!("CARGO_BIN_EXE_tickeasy"))
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env("RUST_LOG", "error") // Quiet logs during tests
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn tickeasy");

    let mut input = child.stdin.take().unwrap();
    input.write_all(stdin.as_bytes()).await.unwrap();
    drop(input);

    timeout(Duration::from_secs(20), child.wait_with_output())
        .await
        .expect("tickeasy did not exit in time")
        .unwrap()
}
