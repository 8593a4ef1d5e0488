//! Board state store: the single source of truth the view renders from.
//!
//! `BoardStore` is a cheap-to-clone handle around shared state. Two kinds
//! of writers touch it:
//!
//! - the synchronous `apply_optimistic_*` primitives, which change the
//!   open snapshot immediately and never call the backend;
//! - the async operations (`fetch_board`, `create_task`, ...), which call
//!   the gateway and merge the authoritative answer.
//!
//! The lock is a std `Mutex` that is never held across an `.await`, so
//! every mutation is atomic with respect to readers. Each mutation bumps a
//! revision counter that views can watch through [`BoardStore::subscribe`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::gateway::BoardGateway;
use super::models::*;
use super::snapshot::BoardSnapshot;
use crate::errors::BoardError;

/// What an in-flight operation is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PendingKind {
    Create,
    Update,
    Move,
    Delete,
}

impl PendingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Move => "move",
            Self::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingOperation {
    pub task_id: String,
    pub kind: PendingKind,
    pub started_at: DateTime<Utc>,
}

#[derive(Default)]
struct StoreState {
    boards: Vec<Board>,
    current: Option<BoardSnapshot>,
    loading: bool,
    error: Option<String>,
    pending: Vec<(u64, PendingOperation)>,
    next_pending: u64,
}

#[derive(Clone)]
pub struct BoardStore {
    state: Arc<Mutex<StoreState>>,
    gateway: Arc<dyn BoardGateway>,
    revision: Arc<watch::Sender<u64>>,
}

impl BoardStore {
    pub fn new(gateway: Arc<dyn BoardGateway>) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            gateway,
            revision: Arc::new(revision),
        }
    }

    pub fn gateway(&self) -> &Arc<dyn BoardGateway> {
        &self.gateway
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        f(&self.lock())
    }

    /// Run a mutation under the lock and notify watchers.
    fn update<R>(&self, f: impl FnOnce(&mut StoreState) -> R) -> R {
        let result = f(&mut self.lock());
        self.revision.send_modify(|rev| *rev += 1);
        result
    }

    // Reads

    /// Change notifications; the value is a monotonically increasing
    /// revision number.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    pub fn snapshot(&self) -> Option<BoardSnapshot> {
        self.read(|s| s.current.clone())
    }

    pub fn current_board_id(&self) -> Option<String> {
        self.read(|s| s.current.as_ref().map(|c| c.board_id().to_string()))
    }

    pub fn task(&self, task_id: &str) -> Option<Task> {
        self.read(|s| s.current.as_ref().and_then(|c| c.task(task_id).cloned()))
    }

    /// Number of tasks in `column_id` of the open board.
    pub fn column_len(&self, column_id: &str) -> usize {
        self.read(|s| s.current.as_ref().map_or(0, |c| c.column_len(column_id)))
    }

    pub fn boards(&self) -> Vec<Board> {
        self.read(|s| s.boards.clone())
    }

    pub fn is_loading(&self) -> bool {
        self.read(|s| s.loading)
    }

    pub fn error(&self) -> Option<String> {
        self.read(|s| s.error.clone())
    }

    pub fn pending(&self) -> Vec<PendingOperation> {
        self.read(|s| s.pending.iter().map(|(_, op)| op.clone()).collect())
    }

    pub fn has_pending(&self, kind: PendingKind) -> bool {
        self.read(|s| s.pending.iter().any(|(_, op)| op.kind == kind))
    }

    // Local state

    pub fn set_error(&self, error: Option<String>) {
        self.update(|s| s.error = error);
    }

    /// Close the open board.
    pub fn clear_board(&self) {
        self.update(|s| s.current = None);
    }

    /// Register an in-flight operation. It stays listed until the guard
    /// is dropped.
    pub fn begin_pending(&self, task_id: &str, kind: PendingKind) -> PendingGuard {
        let id = self.update(|s| {
            s.next_pending += 1;
            s.pending.push((
                s.next_pending,
                PendingOperation {
                    task_id: task_id.to_string(),
                    kind,
                    started_at: Utc::now(),
                },
            ));
            s.next_pending
        });
        PendingGuard {
            store: self.clone(),
            id,
        }
    }

    // Optimistic primitives. All are no-ops when no board is open.

    /// Insert a provisional task into the open snapshot.
    pub fn apply_optimistic_create(&self, task: Task) -> bool {
        self.update(|s| match s.current.as_mut() {
            Some(current) => {
                current.merge_task(task);
                true
            }
            None => false,
        })
    }

    /// Field-merge `patch` into the matching task.
    pub fn apply_optimistic_update(&self, task_id: &str, patch: &UpdateTaskData) -> bool {
        self.update(|s| {
            s.current
                .as_mut()
                .is_some_and(|current| current.patch_task(task_id, patch))
        })
    }

    /// Re-slot a task into `dest_column` at `dest_index`. The source column
    /// is informational; the task's recorded column is authoritative.
    /// Returns the index the task landed at.
    pub fn apply_optimistic_move(
        &self,
        task_id: &str,
        source_column: &str,
        dest_column: &str,
        dest_index: usize,
    ) -> Option<usize> {
        self.update(|s| {
            let current = s.current.as_mut()?;
            if let Some(task) = current.task(task_id)
                && task.column_id != source_column
            {
                tracing::debug!(
                    "Move of {} named source column {} but task sits in {}",
                    task_id,
                    source_column,
                    task.column_id
                );
            }
            current.move_task(task_id, dest_column, dest_index)
        })
    }

    pub fn apply_optimistic_delete(&self, task_id: &str) -> bool {
        self.update(|s| {
            s.current
                .as_mut()
                .and_then(|current| current.remove_task(task_id))
                .is_some()
        })
    }

    /// Field-merge changes pushed by the backend into an existing task.
    /// Fields the push left out keep their local values; unknown tasks are
    /// ignored.
    pub fn apply_remote_update(&self, task_id: &str, changes: &UpdateTaskData) -> bool {
        let merged = self.update(|s| {
            s.current
                .as_mut()
                .is_some_and(|current| current.patch_task(task_id, changes))
        });
        if !merged {
            tracing::debug!("Ignoring remote update for unknown task {}", task_id);
        }
        merged
    }

    // Remote operations

    /// Load a board and its tasks. On failure the previous snapshot is
    /// kept and the error recorded.
    pub async fn fetch_board(&self, board_id: &str) -> Result<(), BoardError> {
        self.update(|s| {
            s.loading = true;
            s.error = None;
        });
        match self.gateway.get_board(board_id).await {
            Ok(remote) => {
                let snapshot = BoardSnapshot::from_remote(remote);
                tracing::debug!(
                    "Loaded board {} with {} tasks",
                    snapshot.board_id(),
                    snapshot.len()
                );
                self.update(|s| {
                    s.current = Some(snapshot);
                    s.loading = false;
                });
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to fetch board {}: {}", board_id, e);
                self.update(|s| {
                    s.error = Some(e.to_string());
                    s.loading = false;
                });
                Err(BoardError::Fetch(e))
            }
        }
    }

    pub async fn fetch_boards(&self) -> Result<Vec<Board>, BoardError> {
        self.update(|s| s.loading = true);
        match self.gateway.list_boards().await {
            Ok(boards) => {
                self.update(|s| {
                    s.boards = boards.clone();
                    s.loading = false;
                });
                Ok(boards)
            }
            Err(e) => {
                self.update(|s| {
                    s.error = Some(e.to_string());
                    s.loading = false;
                });
                Err(BoardError::Fetch(e))
            }
        }
    }

    pub async fn create_board(&self, data: &CreateBoardData) -> Result<Board, BoardError> {
        let board = self
            .gateway
            .create_board(data)
            .await
            .map_err(|e| self.record_failure("create board", e))?;
        self.update(|s| s.boards.push(board.clone()));
        Ok(board)
    }

    pub async fn update_board(&self, board_id: &str, data: &UpdateBoardData) -> Result<Board, BoardError> {
        let board = self
            .gateway
            .update_board(board_id, data)
            .await
            .map_err(|e| self.record_failure("update board", e))?;
        self.update(|s| {
            if let Some(existing) = s.boards.iter_mut().find(|b| b.id == board.id) {
                *existing = board.clone();
            }
            if let Some(current) = s.current.as_mut()
                && current.board_id() == board.id
            {
                current.set_board(board.clone());
            }
        });
        Ok(board)
    }

    pub async fn delete_board(&self, board_id: &str) -> Result<(), BoardError> {
        self.gateway
            .delete_board(board_id)
            .await
            .map_err(|e| self.record_failure("delete board", e))?;
        self.update(|s| {
            s.boards.retain(|b| b.id != board_id);
            if s.current.as_ref().is_some_and(|c| c.board_id() == board_id) {
                s.current = None;
            }
        });
        Ok(())
    }

    pub async fn create_task(&self, data: &CreateTaskData) -> Result<Task, BoardError> {
        self.create_task_superseding(data, None).await
    }

    /// Create a task and, on success, swap `provisional_id` for the
    /// authoritative record in one step.
    pub(crate) async fn create_task_superseding(
        &self,
        data: &CreateTaskData,
        provisional_id: Option<&str>,
    ) -> Result<Task, BoardError> {
        let task = self
            .gateway
            .create_task(data)
            .await
            .map_err(|e| self.record_failure("create task", e))?;
        self.update(|s| {
            let Some(current) = s.current.as_mut() else {
                return;
            };
            if !belongs_to(current, &task) {
                tracing::debug!("Ignoring created task {} for another board", task.id);
                if let Some(id) = provisional_id {
                    current.remove_task(id);
                }
                return;
            }
            match provisional_id {
                Some(id) => current.supersede(id, task.clone()),
                None => current.merge_task(task.clone()),
            }
        });
        Ok(task)
    }

    pub async fn update_task(&self, task_id: &str, data: &UpdateTaskData) -> Result<Task, BoardError> {
        let task = self
            .gateway
            .update_task(task_id, data)
            .await
            .map_err(|e| self.record_failure("update task", e))?;
        self.merge_authoritative(task.clone());
        Ok(task)
    }

    pub async fn move_task(&self, task_id: &str, data: &MoveTaskData) -> Result<Task, BoardError> {
        let task = self
            .gateway
            .move_task(task_id, data)
            .await
            .map_err(|e| self.record_failure("move task", e))?;
        self.merge_authoritative(task.clone());
        Ok(task)
    }

    pub async fn delete_task(&self, task_id: &str) -> Result<(), BoardError> {
        self.gateway
            .delete_task(task_id)
            .await
            .map_err(|e| self.record_failure("delete task", e))?;
        self.update(|s| {
            if let Some(current) = s.current.as_mut() {
                current.remove_task(task_id);
            }
        });
        Ok(())
    }

    fn record_failure(&self, operation: &'static str, err: crate::errors::GatewayError) -> BoardError {
        tracing::warn!("Failed to {}: {}", operation, err);
        self.update(|s| s.error = Some(err.to_string()));
        BoardError::mutation(operation, err)
    }

    /// Merge a task returned by a write. A response for another board
    /// removes any local copy instead, so a late answer cannot leak tasks
    /// across boards.
    fn merge_authoritative(&self, task: Task) {
        self.update(|s| {
            let Some(current) = s.current.as_mut() else {
                return;
            };
            if belongs_to(current, &task) {
                current.merge_task(task);
            } else {
                tracing::debug!(
                    "Task {} now belongs to board {}, dropping it from {}",
                    task.id,
                    task.board_id,
                    current.board_id()
                );
                current.remove_task(&task.id);
            }
        });
    }

    fn finish_pending(&self, id: u64) {
        self.update(|s| s.pending.retain(|(pending_id, _)| *pending_id != id));
    }
}

fn belongs_to(snapshot: &BoardSnapshot, task: &Task) -> bool {
    task.board_id.is_empty() || task.board_id == snapshot.board_id()
}

/// Keeps a [`PendingOperation`] registered while alive.
pub struct PendingGuard {
    store: BoardStore,
    id: u64,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.store.finish_pending(self.id);
    }
}
