use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Task priority, ordered `Low < Medium < High < Urgent`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    #[default]
    Task,
    Bug,
    Feature,
    Story,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Bug => "bug",
            Self::Feature => "feature",
            Self::Story => "story",
        }
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task" => Ok(Self::Task),
            "bug" => Ok(Self::Bug),
            "feature" => Ok(Self::Feature),
            "story" => Ok(Self::Story),
            _ => Err(format!("Invalid task type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TeamRole {
    Admin,
    Editor,
    #[default]
    Viewer,
}

impl TeamRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Editor => "editor",
            Self::Viewer => "viewer",
        }
    }
}

impl FromStr for TeamRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "editor" => Ok(Self::Editor),
            "viewer" => Ok(Self::Viewer),
            _ => Err(format!("Invalid team role: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoardColumn {
    pub id: String,
    pub name: String,
    pub order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Board {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub team_id: String,
    #[serde(default)]
    pub columns: Vec<BoardColumn>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Board {
    pub fn column(&self, id: &str) -> Option<&BoardColumn> {
        self.columns.iter().find(|c| c.id == id)
    }
}

/// `GET /api/boards/{id}` payload: the board plus every task on it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoardWithTasks {
    #[serde(flatten)]
    pub board: Board,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskSummary {
    pub id: String,
    pub title: String,
    pub status: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

/// A task as the board shows it, including the embedded details the
/// backend returns with board and task reads.
///
/// `status` and `column_id` are synonyms; [`Task::normalize`] keeps them
/// equal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub task_type: TaskType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_id: Option<String>,
    #[serde(default)]
    pub board_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sprint_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_hours: Option<i32>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub column_id: String,
    #[serde(default)]
    pub position: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<User>,
    #[serde(default)]
    pub subtasks: Vec<TaskSummary>,
    #[serde(default)]
    pub comments_count: u32,
    #[serde(default)]
    pub attachments_count: u32,
}

impl Task {
    /// Build the provisional record shown while a create is in flight.
    pub fn provisional(id: impl Into<String>, data: &CreateTaskData, created_at: String) -> Self {
        let column_id = data
            .column_id
            .clone()
            .unwrap_or_else(|| DEFAULT_COLUMN.to_string());
        Self {
            id: id.into(),
            title: data.title.clone(),
            description: data.description.clone(),
            status: column_id.clone(),
            priority: data.priority.unwrap_or_default(),
            task_type: data.task_type.unwrap_or_default(),
            creator_id: None,
            board_id: data.board_id.clone(),
            assignee_id: data.assignee_id.clone(),
            sprint_id: None,
            due_date: data.due_date.clone(),
            estimated_hours: data.estimated_hours,
            actual_hours: None,
            tags: data.tags.clone().unwrap_or_default(),
            column_id,
            position: i32::MAX,
            parent_task_id: data.parent_task_id.clone(),
            created_at,
            updated_at: None,
            assignee: None,
            creator: None,
            subtasks: Vec::new(),
            comments_count: 0,
            attachments_count: 0,
        }
    }

    /// Make `status` and `column_id` agree. The column reference wins;
    /// a task with no column takes its status as the column.
    pub fn normalize(&mut self) {
        if self.column_id.is_empty() {
            self.column_id = self.status.clone();
        } else if self.status != self.column_id {
            self.status = self.column_id.clone();
        }
    }

    /// Field-merge a patch. Returns true when the column or position
    /// changed, i.e. the task needs re-slotting.
    pub fn apply_patch(&mut self, patch: &UpdateTaskData) -> bool {
        let before = (self.column_id.clone(), self.position);

        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(task_type) = patch.task_type {
            self.task_type = task_type;
        }
        if let Some(assignee_id) = &patch.assignee_id {
            self.assignee_id = Some(assignee_id.clone());
        }
        if let Some(due_date) = &patch.due_date {
            self.due_date = Some(due_date.clone());
        }
        if let Some(hours) = patch.estimated_hours {
            self.estimated_hours = Some(hours);
        }
        if let Some(hours) = patch.actual_hours {
            self.actual_hours = Some(hours);
        }
        if let Some(tags) = &patch.tags {
            self.tags = tags.clone();
        }
        if let Some(sprint_id) = &patch.sprint_id {
            self.sprint_id = Some(sprint_id.clone());
        }
        if let Some(position) = patch.position {
            self.position = position;
        }
        match (&patch.column_id, &patch.status) {
            (Some(column), _) | (None, Some(column)) => {
                self.column_id = column.clone();
                self.status = column.clone();
            }
            (None, None) => {}
        }

        before != (self.column_id.clone(), self.position)
    }

    pub fn is_provisional(&self) -> bool {
        self.id.starts_with(TEMP_ID_PREFIX)
    }
}

/// Column a task lands in when the create request names none.
pub const DEFAULT_COLUMN: &str = "todo";

/// Prefix of client-generated task ids.
pub const TEMP_ID_PREFIX: &str = "temp_";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Team {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamMemberInfo {
    pub id: String,
    pub user: User,
    pub role: TeamRole,
    #[serde(default)]
    pub joined_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamWithMembers {
    #[serde(flatten)]
    pub team: Team,
    #[serde(default)]
    pub members: Vec<TeamMemberInfo>,
    #[serde(default)]
    pub member_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sprint {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_date: String,
    pub end_date: String,
    pub team_id: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i32>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SprintWithTasks {
    #[serde(flatten)]
    pub sprint: Sprint,
    #[serde(default)]
    pub tasks: Vec<TaskSummary>,
    #[serde(default)]
    pub completed_tasks: u32,
    #[serde(default)]
    pub total_tasks: u32,
    #[serde(default)]
    pub completed_hours: u32,
    #[serde(default)]
    pub total_hours: u32,
}

// Request payloads

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CreateBoardData {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub team_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<BoardColumn>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpdateBoardData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<BoardColumn>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskFilters {
    pub board_id: Option<String>,
    pub assignee_id: Option<String>,
    pub status: Option<String>,
    pub sprint_id: Option<String>,
}

impl TaskFilters {
    /// Query pairs for the filters that are set, in a stable order.
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        [
            ("board_id", &self.board_id),
            ("assignee_id", &self.assignee_id),
            ("status", &self.status),
            ("sprint_id", &self.sprint_id),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_deref().map(|v| (key, v)))
        .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CreateTaskData {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_type: Option<TaskType>,
    pub board_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_id: Option<String>,
}

/// Partial task update. Also the patch type for optimistic updates.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpdateTaskData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<TaskType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_hours: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sprint_id: Option<String>,
}

impl UpdateTaskData {
    /// Patch carrying only placement: column, position and status. The
    /// status follows the column unless one is given.
    pub fn placement_of(column_id: &str, position: i32, status: Option<&str>) -> Self {
        Self {
            column_id: Some(column_id.to_string()),
            position: Some(position),
            status: Some(status.unwrap_or(column_id).to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoveTaskData {
    pub column_id: String,
    pub position: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CreateTeamData {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpdateTeamData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AddTeamMemberData {
    pub user_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<TeamRole>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdateTeamMemberData {
    pub role: TeamRole,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CreateSprintData {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_date: String,
    pub end_date: String,
    pub team_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpdateSprintData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_priority_roundtrip_and_order() {
        for s in &["low", "medium", "high", "urgent"] {
            let parsed: Priority = s.parse().unwrap();
            assert_eq!(parsed.as_str(), *s);
        }
        assert!("critical".parse::<Priority>().is_err());
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
        assert!(Priority::High < Priority::Urgent);
    }

    #[test]
    fn test_task_type_and_role_roundtrip() {
        for s in &["task", "bug", "feature", "story"] {
            let parsed: TaskType = s.parse().unwrap();
            assert_eq!(parsed.as_str(), *s);
        }
        for s in &["admin", "editor", "viewer"] {
            let parsed: TeamRole = s.parse().unwrap();
            assert_eq!(parsed.as_str(), *s);
        }
        assert!("owner".parse::<TeamRole>().is_err());
    }

    #[test]
    fn test_board_with_tasks_deserializes_flattened_payload() {
        let json = serde_json::json!({
            "id": "b1",
            "name": "Sprint board",
            "team_id": "t1",
            "columns": [{"id": "todo", "name": "To Do", "order": 0}],
            "created_at": "2024-01-01",
            "tasks": [{
                "id": "t1",
                "title": "Write docs",
                "status": "todo",
                "priority": "urgent",
                "board_id": "b1",
                "column_id": "todo",
                "position": 0,
                "tags": ["docs"],
                "comments_count": 2
            }]
        });
        let board: BoardWithTasks = serde_json::from_value(json).unwrap();
        assert_eq!(board.board.id, "b1");
        assert_eq!(board.board.columns.len(), 1);
        assert_eq!(board.tasks[0].priority, Priority::Urgent);
        assert_eq!(board.tasks[0].comments_count, 2);
        assert_eq!(board.tasks[0].attachments_count, 0);
        assert_eq!(board.tasks[0].task_type, TaskType::Task);
    }

    #[test]
    fn test_update_payload_omits_unset_fields() {
        let patch = UpdateTaskData {
            title: Some("New title".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({"title": "New title"}));
    }

    #[test]
    fn test_apply_patch_keeps_status_and_column_in_sync() {
        let mut t = task("t1", "b1", "todo", 0);
        let moved = t.apply_patch(&UpdateTaskData {
            status: Some("done".into()),
            ..Default::default()
        });
        assert!(moved);
        assert_eq!(t.column_id, "done");
        assert_eq!(t.status, "done");

        let moved = t.apply_patch(&UpdateTaskData {
            column_id: Some("review".into()),
            status: Some("blocked".into()),
            ..Default::default()
        });
        assert!(moved);
        assert_eq!(t.column_id, "review");
        assert_eq!(t.status, "review");
    }

    #[test]
    fn test_apply_patch_without_placement_fields_reports_no_move() {
        let mut t = task("t1", "b1", "todo", 3);
        let moved = t.apply_patch(&UpdateTaskData {
            title: Some("Renamed".into()),
            priority: Some(Priority::High),
            tags: Some(vec!["ui".into()]),
            ..Default::default()
        });
        assert!(!moved);
        assert_eq!(t.title, "Renamed");
        assert_eq!(t.priority, Priority::High);
        assert_eq!(t.tags, vec!["ui".to_string()]);
        assert_eq!(t.position, 3);
    }

    #[test]
    fn test_normalize_prefers_column_reference() {
        let mut t = task("t1", "b1", "todo", 0);
        t.status = "in_progress".into();
        t.normalize();
        assert_eq!(t.status, "todo");

        t.column_id.clear();
        t.status = "done".into();
        t.normalize();
        assert_eq!(t.column_id, "done");
    }

    #[test]
    fn test_provisional_task_defaults() {
        let data = CreateTaskData {
            title: "Draft".into(),
            board_id: "b1".into(),
            ..Default::default()
        };
        let t = Task::provisional("temp_1", &data, "now".into());
        assert!(t.is_provisional());
        assert_eq!(t.column_id, DEFAULT_COLUMN);
        assert_eq!(t.status, DEFAULT_COLUMN);
        assert_eq!(t.priority, Priority::Medium);
        assert_eq!(t.comments_count, 0);
        assert_eq!(t.attachments_count, 0);
    }

    #[test]
    fn test_task_filters_query_pairs() {
        let filters = TaskFilters {
            board_id: Some("b1".into()),
            status: Some("todo".into()),
            ..Default::default()
        };
        assert_eq!(
            filters.query_pairs(),
            vec![("board_id", "b1"), ("status", "todo")]
        );
        assert!(TaskFilters::default().query_pairs().is_empty());
    }

    #[test]
    fn test_team_with_members_flattened() {
        let team = TeamWithMembers {
            team: Team {
                id: "t1".into(),
                name: "Core".into(),
                description: None,
                created_at: "2024-01-01".into(),
                updated_at: None,
            },
            members: vec![TeamMemberInfo {
                id: "m1".into(),
                user: user("u1"),
                role: TeamRole::Editor,
                joined_at: "2024-01-02".into(),
            }],
            member_count: 1,
        };
        let json = serde_json::to_value(&team).unwrap();
        assert_eq!(json["name"], "Core");
        assert_eq!(json["members"][0]["role"], "editor");
    }
}
