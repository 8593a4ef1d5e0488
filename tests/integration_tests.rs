//! Integration tests for taskboard
//!
//! CLI behavior through the built binary, and the HTTP gateway and push
//! channel against an in-process mock backend.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::fs;
use tempfile::TempDir;

use taskboard::board::gateway::{BoardGateway, HttpGateway};
use taskboard::board::session::{Session, SessionEvent};
use taskboard::board::store::BoardStore;
use taskboard::board::ws::{self, ConnectionState};
use taskboard::config::PushConfig;
use taskboard::errors::GatewayError;

const TOKEN: &str = "test-token";

/// Helper to create a taskboard Command isolated from the caller's env
fn taskboard(state_dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("taskboard");
    cmd.current_dir(state_dir.path())
        .env_remove("TASKBOARD_API_URL")
        .env_remove("TASKBOARD_WS_URL")
        .env_remove("TASKBOARD_STATE_DIR")
        .env_remove("TASKBOARD_REQUEST_TIMEOUT_SECS")
        .env_remove("TASKBOARD_TOKEN")
        .env_remove("RUST_LOG")
        .arg("--state-dir")
        .arg(state_dir.path());
    cmd
}

fn board_json() -> Value {
    json!({
        "id": "b1",
        "name": "Launch",
        "team_id": "team-1",
        "created_at": "2024-01-01T00:00:00Z",
        "columns": [
            {"id": "todo", "name": "To Do", "order": 0},
            {"id": "in_progress", "name": "In Progress", "order": 1},
            {"id": "done", "name": "Done", "order": 2}
        ],
        "tasks": [
            {"id": "t1", "title": "Write docs", "status": "todo", "column_id": "todo",
             "position": 0, "board_id": "b1", "priority": "high"},
            {"id": "t2", "title": "Ship it", "status": "done", "column_id": "done",
             "position": 0, "board_id": "b1", "priority": "urgent"}
        ]
    })
}

#[derive(Clone, Default)]
struct Backend {
    auth_headers: Arc<Mutex<Vec<String>>>,
    subscriptions: Arc<Mutex<Vec<Value>>>,
}

async fn get_board(
    State(backend): State<Backend>,
    Path(board_id): Path<String>,
    headers: HeaderMap,
) -> axum::response::Response {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    backend.auth_headers.lock().unwrap().push(auth.clone());

    if auth != format!("Bearer {}", TOKEN) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Invalid token"}))).into_response();
    }
    if board_id != "b1" {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Board not found"}))).into_response();
    }
    Json(board_json()).into_response()
}

async fn push_channel(
    State(backend): State<Backend>,
    Path(token): Path<String>,
    ws: WebSocketUpgrade,
) -> axum::response::Response {
    if token != TOKEN {
        return StatusCode::FORBIDDEN.into_response();
    }
    ws.on_upgrade(move |socket| serve_push(socket, backend))
}

async fn serve_push(mut socket: WebSocket, backend: Backend) {
    if let Some(Ok(Message::Text(text))) = socket.recv().await {
        let value: Value = serde_json::from_str(text.as_str()).unwrap_or(Value::Null);
        backend.subscriptions.lock().unwrap().push(value);
    }
    let deleted = json!({"type": "task_deleted", "data": {"task_id": "t1"}}).to_string();
    if socket.send(Message::Text(deleted.into())).await.is_err() {
        return;
    }
    while let Some(Ok(_)) = socket.recv().await {}
}

/// Start the mock backend on an ephemeral port and return `host:port`.
async fn spawn_backend(backend: Backend) -> String {
    let app = Router::new()
        .route("/api/boards/{board_id}", get(get_board))
        .route("/ws/{token}", get(push_channel))
        .with_state(backend);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr.to_string()
}

fn logged_in_session(dir: &TempDir) -> Session {
    let session = Session::load(dir.path()).unwrap();
    session.set_token(TOKEN).unwrap();
    session
}

// =============================================================================
// CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_taskboard_help() {
        let dir = TempDir::new().unwrap();
        taskboard(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("board"));
    }

    #[test]
    fn test_taskboard_version() {
        let dir = TempDir::new().unwrap();
        taskboard(&dir).arg("--version").assert().success();
    }

    #[test]
    fn test_config_show_defaults() {
        let dir = TempDir::new().unwrap();
        taskboard(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No taskboard.toml found"))
            .stdout(predicate::str::contains("http://localhost:8000"));
    }

    #[test]
    fn test_config_show_applies_flags() {
        let dir = TempDir::new().unwrap();
        taskboard(&dir)
            .args(["--api-url", "https://boards.example.com", "config"])
            .assert()
            .success()
            .stdout(predicate::str::contains("https://boards.example.com"));
    }

    #[test]
    fn test_config_validate_rejects_bad_url() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("taskboard.toml"),
            "[api]\nurl = \"ftp://nope\"\n",
        )
        .unwrap();

        taskboard(&dir)
            .args(["config", "validate"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("api.url"));
    }

    #[test]
    fn test_config_validate_with_config() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("taskboard.toml"),
            "[push]\nurl = \"wss://boards.example.com\"\nmax_attempts = 5\n",
        )
        .unwrap();

        taskboard(&dir)
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("is valid"));
    }

    #[test]
    fn test_whoami_when_logged_out() {
        let dir = TempDir::new().unwrap();
        taskboard(&dir)
            .arg("whoami")
            .assert()
            .success()
            .stdout(predicate::str::contains("Not logged in"));
    }

    #[test]
    fn test_boards_requires_login() {
        let dir = TempDir::new().unwrap();
        taskboard(&dir)
            .arg("boards")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Not logged in"));
    }

    #[test]
    fn test_logout_is_idempotent() {
        let dir = TempDir::new().unwrap();
        taskboard(&dir)
            .arg("logout")
            .assert()
            .success()
            .stdout(predicate::str::contains("Logged out"));
        assert!(!dir.path().join("access_token").exists());
    }
}

mod cli_backend {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_board_show_renders_columns() {
        let addr = spawn_backend(Backend::default()).await;
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("access_token"), TOKEN).unwrap();

        let output = tokio::task::spawn_blocking(move || {
            let out = taskboard(&dir)
                .args(["--api-url", &format!("http://{}", addr), "board", "show", "b1"])
                .output()
                .unwrap();
            drop(dir);
            out
        })
        .await
        .unwrap();

        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("Launch"));
        assert!(stdout.contains("To Do"));
        assert!(stdout.contains("Write docs"));
        assert!(stdout.contains("Ship it"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_board_show_json() {
        let addr = spawn_backend(Backend::default()).await;
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("access_token"), TOKEN).unwrap();

        let output = tokio::task::spawn_blocking(move || {
            let out = taskboard(&dir)
                .args([
                    "--api-url",
                    &format!("http://{}", addr),
                    "board",
                    "show",
                    "b1",
                    "--json",
                ])
                .output()
                .unwrap();
            drop(dir);
            out
        })
        .await
        .unwrap();

        assert!(output.status.success());
        let view: Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(view["board_id"], "b1");
        assert_eq!(view["columns"].as_array().unwrap().len(), 3);
        assert_eq!(view["columns"][0]["tasks"][0]["id"], "t1");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_rejected_token_is_forgotten() {
        let addr = spawn_backend(Backend::default()).await;
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("access_token"), "stale-token").unwrap();
        let token_path = dir.path().join("access_token");

        let output = tokio::task::spawn_blocking(move || {
            let out = taskboard(&dir)
                .args(["--api-url", &format!("http://{}", addr), "board", "show", "b1"])
                .output()
                .unwrap();
            let token_left = token_path.exists();
            drop(dir);
            (out, token_left)
        })
        .await
        .unwrap();

        let (output, token_left) = output;
        assert!(!output.status.success());
        assert!(!token_left);
    }
}

// =============================================================================
// Gateway and push channel
// =============================================================================

mod gateway {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_fetch_board_sends_bearer_credential() {
        let backend = Backend::default();
        let addr = spawn_backend(backend.clone()).await;
        let dir = TempDir::new().unwrap();
        let session = logged_in_session(&dir);

        let gateway = HttpGateway::new(
            &format!("http://{}/", addr),
            Duration::from_secs(5),
            session,
        )
        .unwrap();
        let board = gateway.get_board("b1").await.unwrap();

        assert_eq!(board.board.name, "Launch");
        assert_eq!(board.tasks.len(), 2);
        assert_eq!(
            backend.auth_headers.lock().unwrap().as_slice(),
            [format!("Bearer {}", TOKEN)]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_not_found_carries_backend_detail() {
        let addr = spawn_backend(Backend::default()).await;
        let dir = TempDir::new().unwrap();
        let session = logged_in_session(&dir);
        let gateway =
            HttpGateway::new(&format!("http://{}", addr), Duration::from_secs(5), session).unwrap();

        let err = gateway.get_board("missing").await.unwrap_err();
        match err {
            GatewayError::Status { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Board not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unauthorized_clears_session_and_broadcasts() {
        let addr = spawn_backend(Backend::default()).await;
        let dir = TempDir::new().unwrap();
        let session = Session::load(dir.path()).unwrap();
        session.set_token("stale-token").unwrap();
        let mut events = session.subscribe();

        let gateway = HttpGateway::new(
            &format!("http://{}", addr),
            Duration::from_secs(5),
            session.clone(),
        )
        .unwrap();
        let err = gateway.get_board("b1").await.unwrap_err();

        assert!(matches!(err, GatewayError::Unauthorized));
        assert!(session.token().is_none());
        assert!(!dir.path().join("access_token").exists());
        assert_eq!(events.recv().await.unwrap(), SessionEvent::LoginRequired);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_push_event_reconciles_into_store() {
        let backend = Backend::default();
        let addr = spawn_backend(backend.clone()).await;
        let dir = TempDir::new().unwrap();
        let session = logged_in_session(&dir);
        let gateway =
            HttpGateway::new(&format!("http://{}", addr), Duration::from_secs(5), session).unwrap();
        let store = BoardStore::new(Arc::new(gateway));
        store.fetch_board("b1").await.unwrap();
        assert!(store.task("t1").is_some());

        let config = PushConfig {
            url: format!("ws://{}", addr),
            ..Default::default()
        };
        let handle = ws::open(&config, TOKEN, "b1", store.clone()).unwrap();

        let mut removed = false;
        for _ in 0..100 {
            if store.task("t1").is_none() {
                removed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(removed, "task_deleted was not applied");
        assert!(store.task("t2").is_some());
        assert!(handle.is_connected());

        let subscriptions = backend.subscriptions.lock().unwrap().clone();
        assert_eq!(
            subscriptions,
            vec![json!({"type": "subscribe_board", "board_id": "b1"})]
        );

        let mut state = handle.watch_state();
        handle.close().await;
        assert_eq!(*state.borrow_and_update(), ConnectionState::Closed);
    }
}
