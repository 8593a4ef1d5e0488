//! Column-grouped projection of a snapshot plus drag-and-drop helpers.

use serde::Serialize;

use super::models::{BoardColumn, Task};
use super::snapshot::BoardSnapshot;

/// Rendered height of one task card, in pixels.
pub const CARD_HEIGHT_PX: f64 = 120.0;

/// Map a vertical offset inside a column to an insertion index.
///
/// Negative, NaN or zero-height inputs land at index 0; offsets past the
/// last card land at `task_count`.
pub fn drop_index(offset_y: f64, card_height: f64, task_count: usize) -> usize {
    if offset_y.is_nan() || offset_y <= 0.0 || card_height.is_nan() || card_height <= 0.0 {
        return 0;
    }
    let index = (offset_y / card_height).floor();
    if index >= task_count as f64 {
        task_count
    } else {
        index as usize
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ColumnView {
    pub column: BoardColumn,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BoardView {
    pub board_id: String,
    pub name: String,
    pub columns: Vec<ColumnView>,
    /// Tasks whose column is not one of the board's columns.
    pub unplaced: Vec<Task>,
}

impl BoardView {
    pub fn from_snapshot(snapshot: &BoardSnapshot) -> Self {
        let board = snapshot.board();
        let columns = board
            .columns
            .iter()
            .map(|column| ColumnView {
                column: column.clone(),
                tasks: snapshot.column_tasks(&column.id).cloned().collect(),
            })
            .collect();
        let unplaced = snapshot
            .tasks()
            .iter()
            .filter(|t| board.column(&t.column_id).is_none())
            .cloned()
            .collect();
        Self {
            board_id: board.id.clone(),
            name: board.name.clone(),
            columns,
            unplaced,
        }
    }

    pub fn column(&self, column_id: &str) -> Option<&ColumnView> {
        self.columns.iter().find(|c| c.column.id == column_id)
    }

    pub fn task_count(&self) -> usize {
        self.columns.iter().map(|c| c.tasks.len()).sum::<usize>() + self.unplaced.len()
    }
}

/// A completed drag, ready for [`TaskOrchestrator::drop_task`].
///
/// [`TaskOrchestrator::drop_task`]: super::tasks::TaskOrchestrator::drop_task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRequest {
    pub task_id: String,
    pub source_column: String,
    pub dest_column: String,
    pub dest_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DropTarget {
    column_id: String,
    index: usize,
}

/// Tracks one drag gesture from pickup to drop.
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    task_id: String,
    source_column: String,
    target: Option<DropTarget>,
    card_height: f64,
}

impl DragSession {
    pub fn start(task_id: impl Into<String>, source_column: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            source_column: source_column.into(),
            target: None,
            card_height: CARD_HEIGHT_PX,
        }
    }

    pub fn with_card_height(mut self, card_height: f64) -> Self {
        self.card_height = card_height;
        self
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Pointer is over `column_id` at `offset_y`. Returns the index a drop
    /// would land at.
    pub fn hover(&mut self, column_id: &str, offset_y: f64, task_count: usize) -> usize {
        let index = drop_index(offset_y, self.card_height, task_count);
        self.target = Some(DropTarget {
            column_id: column_id.to_string(),
            index,
        });
        index
    }

    /// Pointer left every column.
    pub fn leave(&mut self) {
        self.target = None;
    }

    pub fn hovered_index(&self, column_id: &str) -> Option<usize> {
        self.target
            .as_ref()
            .filter(|t| t.column_id == column_id)
            .map(|t| t.index)
    }

    /// Drop on `column_id`. Without a hover position for that column the
    /// task goes to the end.
    pub fn drop_on(self, column_id: &str, task_count: usize) -> MoveRequest {
        let dest_index = self.hovered_index(column_id).unwrap_or(task_count);
        MoveRequest {
            task_id: self.task_id,
            source_column: self.source_column,
            dest_column: column_id.to_string(),
            dest_index,
        }
    }
}
