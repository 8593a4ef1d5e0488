use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;

use super::models::{Task, UpdateTaskData};
use super::reconcile;
use super::store::BoardStore;
use crate::config::PushConfig;
use crate::errors::PushError;

/// How often to send WebSocket Ping frames.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long the server may stay silent before the connection counts as dead.
const PONG_TIMEOUT: Duration = Duration::from_secs(60);

// ── Wire types ───────────────────────────────────────────────────────

/// Messages the client sends on the push channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    SubscribeBoard { board_id: String },
}

/// Placement fields carried by a `task_moved` event.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TaskPlacement {
    pub id: String,
    pub column_id: String,
    pub position: i32,
    #[serde(default)]
    pub status: Option<String>,
}

/// Fields carried by a `task_updated` event. Keys missing from the payload
/// decode to `None` and leave the local value untouched.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TaskChanges {
    pub id: String,
    #[serde(flatten)]
    pub changes: UpdateTaskData,
}

/// A server event, decoded from `{"type": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    TaskCreated { task: Option<Box<Task>> },
    TaskUpdated { task: TaskChanges },
    TaskMoved { task: TaskPlacement },
    TaskDeleted { task_id: String },
    BoardUpdated,
    Unknown { kind: String },
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct TaskData<T> {
    task: T,
}

#[derive(Deserialize)]
struct DeletedData {
    task_id: String,
}

impl PushEvent {
    /// Decode a text frame. Unknown event types decode to
    /// [`PushEvent::Unknown`]; a known type with a malformed payload is an
    /// error.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let Envelope { kind, data } = serde_json::from_str(text)?;
        let event = match kind.as_str() {
            "task_created" => Self::TaskCreated {
                task: serde_json::from_value::<Option<TaskData<Box<Task>>>>(data)
                    .ok()
                    .flatten()
                    .map(|d| d.task),
            },
            "task_updated" => Self::TaskUpdated {
                task: serde_json::from_value::<TaskData<TaskChanges>>(data)?.task,
            },
            "task_moved" => Self::TaskMoved {
                task: serde_json::from_value::<TaskData<TaskPlacement>>(data)?.task,
            },
            "task_deleted" => Self::TaskDeleted {
                task_id: serde_json::from_value::<DeletedData>(data)?.task_id,
            },
            "board_updated" => Self::BoardUpdated,
            _ => Self::Unknown { kind },
        };
        Ok(event)
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::TaskCreated { .. } => "task_created",
            Self::TaskUpdated { .. } => "task_updated",
            Self::TaskMoved { .. } => "task_moved",
            Self::TaskDeleted { .. } => "task_deleted",
            Self::BoardUpdated => "board_updated",
            Self::Unknown { kind } => kind,
        }
    }
}

// ── Connection ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Reconnecting { attempt: u32, delay: Duration },
    /// Gave up, or reconnecting is disabled.
    Down { error: String },
    Closed,
}

/// Exponential backoff between reconnect attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    pub fn from_config(config: &PushConfig) -> Self {
        Self {
            enabled: config.reconnect,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            max_attempts: (config.max_attempts > 0).then_some(config.max_attempts),
        }
    }

    /// Delay before attempt `attempt` (1-based), without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    /// Base delay plus up to 50% random jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let spread = u64::try_from(base.as_millis() / 2).unwrap_or(u64::MAX);
        let jitter = rand::rng().random_range(0..=spread);
        base + Duration::from_millis(jitter)
    }

    fn gives_up_after(&self, attempt: u32) -> bool {
        !self.enabled || self.max_attempts.is_some_and(|max| attempt > max)
    }
}

/// Handle to a running push channel. Dropping it stops the channel
/// without waiting; [`PushHandle::close`] also waits for shutdown.
pub struct PushHandle {
    state: watch::Receiver<ConnectionState>,
    outgoing: mpsc::UnboundedSender<ClientMessage>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PushHandle {
    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn is_connected(&self) -> bool {
        matches!(*self.state.borrow(), ConnectionState::Connected)
    }

    /// Queue a message for the server. Fails unless currently connected.
    pub fn send(&self, message: ClientMessage) -> Result<(), PushError> {
        if !self.is_connected() {
            return Err(PushError::NotConnected);
        }
        self.outgoing
            .send(message)
            .map_err(|_| PushError::NotConnected)
    }

    /// Stop the channel and wait for it to shut down.
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            tracing::warn!("Push channel task ended abnormally: {}", e);
        }
    }
}

impl Drop for PushHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Build `{base}/ws/{token}`.
pub fn channel_url(base: &str, token: &str) -> Result<String, PushError> {
    let base = base.trim().trim_end_matches('/');
    if !(base.starts_with("ws://") || base.starts_with("wss://")) {
        return Err(PushError::InvalidUrl {
            url: base.to_string(),
        });
    }
    Ok(format!("{}/ws/{}", base, token))
}

/// Open the push channel for `board_id`. Events are reconciled into
/// `store` until the handle is closed.
pub fn open(
    config: &PushConfig,
    token: &str,
    board_id: &str,
    store: BoardStore,
) -> Result<PushHandle, PushError> {
    let url = channel_url(&config.url, token)?;
    let policy = ReconnectPolicy::from_config(config);
    let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let worker = Worker {
        url,
        board_id: board_id.to_string(),
        store,
        policy,
        state: state_tx,
        outgoing: out_rx,
        cancel: cancel.clone(),
    };
    let task = tokio::spawn(worker.run());

    Ok(PushHandle {
        state: state_rx,
        outgoing: out_tx,
        cancel,
        task: Some(task),
    })
}

/// Open the channel only when both a credential and a board are present.
pub fn open_if_ready(
    config: &PushConfig,
    token: Option<&str>,
    board_id: Option<&str>,
    store: BoardStore,
) -> Result<Option<PushHandle>, PushError> {
    match (token, board_id) {
        (Some(token), Some(board_id)) => open(config, token, board_id, store).map(Some),
        _ => Ok(None),
    }
}

enum SessionEnd {
    Cancelled,
    Lost(String),
}

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

struct Worker {
    url: String,
    board_id: String,
    store: BoardStore,
    policy: ReconnectPolicy,
    state: watch::Sender<ConnectionState>,
    outgoing: mpsc::UnboundedReceiver<ClientMessage>,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(mut self) {
        let mut attempt: u32 = 0;
        let mut ever_connected = false;

        loop {
            let connected = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = connect_async(self.url.as_str()) => result,
            };

            let error = match connected {
                Ok((socket, _)) => {
                    attempt = 0;
                    self.state.send_replace(ConnectionState::Connected);
                    tracing::info!("Push channel connected for board {}", self.board_id);
                    if ever_connected {
                        self.resync().await;
                    }
                    ever_connected = true;
                    match self.session(socket).await {
                        SessionEnd::Cancelled => break,
                        SessionEnd::Lost(reason) => reason,
                    }
                }
                Err(e) => e.to_string(),
            };

            attempt += 1;
            if self.policy.gives_up_after(attempt) {
                tracing::warn!("Push channel down: {}", error);
                self.state.send_replace(ConnectionState::Down { error });
                return;
            }
            let delay = self.policy.delay(attempt);
            tracing::warn!(
                "Push channel lost ({}), reconnecting in {:?} (attempt {})",
                error,
                delay,
                attempt
            );
            self.state
                .send_replace(ConnectionState::Reconnecting { attempt, delay });
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.state.send_replace(ConnectionState::Closed);
        tracing::debug!("Push channel for board {} closed", self.board_id);
    }

    /// Catch up on whatever happened while disconnected.
    async fn resync(&self) {
        if let Err(e) = self.store.fetch_board(&self.board_id).await {
            tracing::warn!("Refetch after reconnect failed: {}", e);
        }
    }

    async fn session(&mut self, socket: Socket) -> SessionEnd {
        let (mut write, mut read) = socket.split();

        let subscribe = ClientMessage::SubscribeBoard {
            board_id: self.board_id.clone(),
        };
        if let Err(e) = send_json(&mut write, &subscribe).await {
            return SessionEnd::Lost(e.to_string());
        }

        let mut ping_interval = tokio::time::interval(PING_INTERVAL);
        ping_interval.tick().await;
        let mut last_seen = Instant::now();

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return SessionEnd::Cancelled;
                }

                _ = ping_interval.tick() => {
                    if last_seen.elapsed() > PONG_TIMEOUT {
                        return SessionEnd::Lost("server stopped responding".to_string());
                    }
                    if let Err(e) = write.send(Message::Ping(Vec::new())).await {
                        return SessionEnd::Lost(e.to_string());
                    }
                }

                Some(message) = self.outgoing.recv() => {
                    if let Err(e) = send_json(&mut write, &message).await {
                        return SessionEnd::Lost(e.to_string());
                    }
                }

                frame = read.next() => {
                    last_seen = Instant::now();
                    match frame {
                        Some(Ok(Message::Text(text))) => self.handle_text(&text).await,
                        Some(Ok(Message::Ping(payload))) => {
                            if let Err(e) = write.send(Message::Pong(payload)).await {
                                return SessionEnd::Lost(e.to_string());
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            return SessionEnd::Lost("closed by server".to_string());
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return SessionEnd::Lost(e.to_string()),
                    }
                }
            }
        }
    }

    async fn handle_text(&self, text: &str) {
        let event = match PushEvent::parse(text) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Ignoring malformed push frame: {}", e);
                return;
            }
        };
        if let Err(e) = reconcile::apply_push_event(&self.store, &self.board_id, event).await {
            tracing::warn!("Failed to apply push event: {}", e);
        }
    }
}

async fn send_json<S>(write: &mut S, message: &ClientMessage) -> Result<(), PushError>
where
    S: Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let json = serde_json::to_string(message)?;
    write.send(Message::Text(json)).await?;
    Ok(())
}
