//! Optimistic task lifecycle.
//!
//! Every write follows the same shape: mutate the store immediately, ask
//! the backend, then either merge the authoritative answer or repair the
//! snapshot. Repair differs per operation:
//!
//! | operation | on failure                                   |
//! |-----------|----------------------------------------------|
//! | create    | remove the provisional task                  |
//! | update    | refetch the board the update was applied to  |
//! | move      | refetch the board the move was applied to    |
//! | delete    | refetch the board the delete was applied to  |
//!
//! The caller always gets the original gateway error back, even when the
//! repair refetch fails too.

use super::models::*;
use super::store::{BoardStore, PendingKind};
use super::view::MoveRequest;
use crate::errors::BoardError;

#[derive(Clone)]
pub struct TaskOrchestrator {
    store: BoardStore,
}

impl TaskOrchestrator {
    pub fn new(store: BoardStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &BoardStore {
        &self.store
    }

    pub fn is_creating(&self) -> bool {
        self.store.has_pending(PendingKind::Create)
    }

    pub fn is_updating(&self) -> bool {
        self.store.has_pending(PendingKind::Update) || self.store.has_pending(PendingKind::Move)
    }

    pub fn is_deleting(&self) -> bool {
        self.store.has_pending(PendingKind::Delete)
    }

    pub async fn refresh(&self) -> Result<(), BoardError> {
        let board_id = self.store.current_board_id().ok_or(BoardError::NoBoardOpen)?;
        self.store.fetch_board(&board_id).await
    }

    pub async fn create_task(&self, data: CreateTaskData) -> Result<Task, BoardError> {
        if self.store.current_board_id().is_none() {
            return Err(BoardError::NoBoardOpen);
        }
        let temp_id = format!("{}{}", TEMP_ID_PREFIX, uuid::Uuid::new_v4().simple());
        let provisional = Task::provisional(temp_id.clone(), &data, chrono::Utc::now().to_rfc3339());
        let _pending = self.store.begin_pending(&temp_id, PendingKind::Create);
        self.store.apply_optimistic_create(provisional);

        match self
            .store
            .create_task_superseding(&data, Some(&temp_id))
            .await
        {
            Ok(task) => {
                tracing::info!("Created task {} ({})", task.id, task.title);
                Ok(task)
            }
            Err(e) => {
                self.store.apply_optimistic_delete(&temp_id);
                Err(e)
            }
        }
    }

    pub async fn update_task(&self, task_id: &str, data: UpdateTaskData) -> Result<Task, BoardError> {
        let board_id = self.store.current_board_id();
        let _pending = self.store.begin_pending(task_id, PendingKind::Update);
        self.store.apply_optimistic_update(task_id, &data);

        match self.store.update_task(task_id, &data).await {
            Ok(task) => Ok(task),
            Err(e) => {
                self.resync(board_id.as_deref()).await;
                Err(e)
            }
        }
    }

    /// Move a task to `dest_index` within `dest_column`. The backend is
    /// sent the index the task landed at locally.
    pub async fn move_task(
        &self,
        task_id: &str,
        source_column: &str,
        dest_column: &str,
        dest_index: usize,
    ) -> Result<Task, BoardError> {
        let board_id = self.store.current_board_id();
        let _pending = self.store.begin_pending(task_id, PendingKind::Move);
        let landed = self
            .store
            .apply_optimistic_move(task_id, source_column, dest_column, dest_index)
            .unwrap_or_else(|| dest_index.min(self.store.column_len(dest_column)));

        let data = MoveTaskData {
            column_id: dest_column.to_string(),
            position: i32::try_from(landed).unwrap_or(i32::MAX),
            board_id: None,
        };
        match self.store.move_task(task_id, &data).await {
            Ok(task) => {
                tracing::debug!("Moved task {} to {}@{}", task_id, dest_column, landed);
                Ok(task)
            }
            Err(e) => {
                self.resync(board_id.as_deref()).await;
                Err(e)
            }
        }
    }

    /// Complete a drag gesture.
    pub async fn drop_task(&self, request: MoveRequest) -> Result<Task, BoardError> {
        self.move_task(
            &request.task_id,
            &request.source_column,
            &request.dest_column,
            request.dest_index,
        )
        .await
    }

    pub async fn delete_task(&self, task_id: &str) -> Result<(), BoardError> {
        let board_id = self.store.current_board_id();
        let _pending = self.store.begin_pending(task_id, PendingKind::Delete);
        self.store.apply_optimistic_delete(task_id);

        match self.store.delete_task(task_id).await {
            Ok(()) => {
                tracing::info!("Deleted task {}", task_id);
                Ok(())
            }
            Err(e) => {
                self.resync(board_id.as_deref()).await;
                Err(e)
            }
        }
    }

    /// Refetch the board an operation was applied to. Failures are logged
    /// and swallowed; the caller reports the original error.
    async fn resync(&self, board_id: Option<&str>) {
        let Some(board_id) = board_id else {
            return;
        };
        if self.store.current_board_id().as_deref() != Some(board_id) {
            tracing::debug!("Skipping resync of {}, no longer open", board_id);
            return;
        }
        if let Err(e) = self.store.fetch_board(board_id).await {
            tracing::warn!("Resync of board {} failed: {}", board_id, e);
        }
    }
}
