//! In-memory copy of one board and its tasks.
//!
//! Tasks are held in a single `Vec` whose relative order within a column is
//! the display order. After every mutation the positions of each touched
//! column are renumbered `0..n`, so `position` always equals the task's
//! index among its column siblings. Mutators never fail; an unknown id is a
//! no-op reported through the return value.

use std::collections::HashSet;

use super::models::{Board, BoardWithTasks, Task, UpdateTaskData};

#[derive(Debug, Clone, PartialEq)]
pub struct BoardSnapshot {
    board: Board,
    tasks: Vec<Task>,
}

impl BoardSnapshot {
    /// Build a snapshot from a full board read. Columns are sorted by
    /// `order`, duplicate task ids keep their last occurrence, and tasks
    /// are slotted by the position the backend reported.
    pub fn from_remote(remote: BoardWithTasks) -> Self {
        let BoardWithTasks { mut board, tasks } = remote;
        board.columns.sort_by_key(|c| c.order);

        let mut seen = HashSet::new();
        let mut unique: Vec<Task> = tasks
            .into_iter()
            .rev()
            .filter(|t| seen.insert(t.id.clone()))
            .collect();
        unique.reverse();

        for task in &mut unique {
            task.normalize();
        }
        let rank = |task: &Task| {
            board
                .columns
                .iter()
                .position(|c| c.id == task.column_id)
                .unwrap_or(usize::MAX)
        };
        unique.sort_by(|a, b| {
            rank(a)
                .cmp(&rank(b))
                .then_with(|| a.column_id.cmp(&b.column_id))
                .then_with(|| a.position.cmp(&b.position))
        });

        let mut snapshot = Self {
            board,
            tasks: unique,
        };
        snapshot.renumber_all();
        snapshot
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn board_id(&self) -> &str {
        &self.board.id
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.index_of(task_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks of one column in display order.
    pub fn column_tasks<'a>(&'a self, column_id: &'a str) -> impl Iterator<Item = &'a Task> + 'a {
        self.tasks.iter().filter(move |t| t.column_id == column_id)
    }

    pub fn column_len(&self, column_id: &str) -> usize {
        self.column_tasks(column_id).count()
    }

    /// Replace the board metadata, keeping the tasks.
    pub fn set_board(&mut self, mut board: Board) {
        board.columns.sort_by_key(|c| c.order);
        self.board = board;
    }

    /// Insert a task, or replace the task with the same id. The task is
    /// slotted at its `position` within its column, clamped to the end.
    pub fn merge_task(&mut self, mut task: Task) {
        task.normalize();
        let mut touched = Vec::with_capacity(2);
        if let Some(idx) = self.index_of(&task.id) {
            touched.push(self.tasks.remove(idx).column_id);
        }
        let index = slot_of(task.position);
        touched.push(task.column_id.clone());
        self.place(task, index);
        self.renumber(&touched);
    }

    /// Swap a provisional record for the authoritative one.
    pub fn supersede(&mut self, provisional_id: &str, task: Task) {
        if let Some(idx) = self.index_of(provisional_id) {
            let removed = self.tasks.remove(idx);
            self.renumber(&[removed.column_id]);
        }
        self.merge_task(task);
    }

    /// Field-merge `patch` into the task. A placement change re-slots it.
    /// Returns false when the task is unknown.
    pub fn patch_task(&mut self, task_id: &str, patch: &UpdateTaskData) -> bool {
        let Some(idx) = self.index_of(task_id) else {
            return false;
        };
        let source_column = self.tasks[idx].column_id.clone();
        if self.tasks[idx].apply_patch(patch) {
            let task = self.tasks.remove(idx);
            let index = slot_of(task.position);
            let dest_column = task.column_id.clone();
            self.place(task, index);
            self.renumber(&[source_column, dest_column]);
        }
        true
    }

    /// Move a task to `dest_index` among the tasks of `dest_column`
    /// (excluding itself), clamped to that column's length. Returns the
    /// index it landed at, or `None` when the task is unknown.
    pub fn move_task(&mut self, task_id: &str, dest_column: &str, dest_index: usize) -> Option<usize> {
        let idx = self.index_of(task_id)?;
        let mut task = self.tasks.remove(idx);
        let source_column = std::mem::replace(&mut task.column_id, dest_column.to_string());
        task.status = dest_column.to_string();
        let landed = self.place(task, dest_index);
        self.renumber(&[source_column, dest_column.to_string()]);
        Some(landed)
    }

    pub fn remove_task(&mut self, task_id: &str) -> Option<Task> {
        let idx = self.index_of(task_id)?;
        let task = self.tasks.remove(idx);
        self.renumber(std::slice::from_ref(&task.column_id));
        Some(task)
    }

    /// Positions are contiguous per column, ids are unique and every
    /// task's status matches its column.
    pub fn is_consistent(&self) -> bool {
        let mut ids = HashSet::new();
        if !self.tasks.iter().all(|t| ids.insert(t.id.as_str())) {
            return false;
        }
        let columns: HashSet<&str> = self.tasks.iter().map(|t| t.column_id.as_str()).collect();
        columns.into_iter().all(|column| {
            self.column_tasks(column)
                .enumerate()
                .all(|(i, t)| t.position == i as i32 && t.status == t.column_id)
        })
    }

    fn index_of(&self, task_id: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == task_id)
    }

    /// Insert before the `index`-th task of the task's column, or after
    /// the column's last task. Returns the clamped index.
    fn place(&mut self, task: Task, index: usize) -> usize {
        let slots: Vec<usize> = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.column_id == task.column_id)
            .map(|(i, _)| i)
            .collect();
        let index = index.min(slots.len());
        let at = match slots.get(index) {
            Some(&i) => i,
            None => slots.last().map(|&i| i + 1).unwrap_or(self.tasks.len()),
        };
        self.tasks.insert(at, task);
        index
    }

    fn renumber(&mut self, columns: &[String]) {
        for column in columns {
            let mut next = 0;
            for task in self.tasks.iter_mut().filter(|t| &t.column_id == column) {
                task.position = next;
                next += 1;
            }
        }
    }

    fn renumber_all(&mut self) {
        let columns: Vec<String> = self
            .tasks
            .iter()
            .map(|t| t.column_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        self.renumber(&columns);
    }
}

fn slot_of(position: i32) -> usize {
    usize::try_from(position).unwrap_or(0)
}
