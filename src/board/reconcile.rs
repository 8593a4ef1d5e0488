//! Apply push events to the board store.
//!
//! Creation and board-level changes trigger a full refetch because the
//! event payload is not trusted to be complete. Updates, moves and
//! deletes are merged in place. Events for tasks the snapshot does not
//! hold are ignored.

use super::models::UpdateTaskData;
use super::store::BoardStore;
use super::ws::PushEvent;
use crate::errors::BoardError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    Refetched,
    Merged,
    Removed,
    Ignored,
}

/// Fold one event for `board_id` into `store`.
pub async fn apply_push_event(
    store: &BoardStore,
    board_id: &str,
    event: PushEvent,
) -> Result<Reconciled, BoardError> {
    tracing::debug!("Push event {} for board {}", event.kind(), board_id);

    let outcome = match event {
        PushEvent::TaskCreated { .. } | PushEvent::BoardUpdated => {
            if store.current_board_id().as_deref() != Some(board_id) {
                return Ok(Reconciled::Ignored);
            }
            store.fetch_board(board_id).await?;
            Reconciled::Refetched
        }
        PushEvent::TaskUpdated { task } => {
            if store.apply_remote_update(&task.id, &task.changes) {
                Reconciled::Merged
            } else {
                Reconciled::Ignored
            }
        }
        PushEvent::TaskMoved { task } => {
            let patch =
                UpdateTaskData::placement_of(&task.column_id, task.position, task.status.as_deref());
            if store.apply_optimistic_update(&task.id, &patch) {
                Reconciled::Merged
            } else {
                Reconciled::Ignored
            }
        }
        PushEvent::TaskDeleted { task_id } => {
            if store.apply_optimistic_delete(&task_id) {
                Reconciled::Removed
            } else {
                Reconciled::Ignored
            }
        }
        PushEvent::Unknown { kind } => {
            tracing::debug!("Unknown push event type: {}", kind);
            Reconciled::Ignored
        }
    };
    Ok(outcome)
}
