//! In-memory `BoardGateway` for unit tests.
//!
//! Behaves like a tiny backend: it owns a board, assigns `srv-N` ids and
//! answers reads from what earlier writes left behind. Individual
//! operations can be told to fail, and every call is recorded by name.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::gateway::BoardGateway;
use super::models::*;
use crate::errors::GatewayError;

type CallHook = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
struct FakeState {
    board: Option<BoardWithTasks>,
    boards: Vec<Board>,
    teams: HashMap<String, TeamWithMembers>,
    sprints: Vec<Sprint>,
    user: Option<User>,
    failures: HashMap<&'static str, u16>,
    calls: Vec<String>,
    next_id: u32,
}

#[derive(Clone, Default)]
pub struct FakeGateway {
    state: Arc<Mutex<FakeState>>,
    hook: Arc<Mutex<Option<CallHook>>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_board(board: BoardWithTasks) -> Self {
        let gw = Self::new();
        gw.set_board(board);
        gw
    }

    pub fn set_board(&self, board: BoardWithTasks) {
        let mut state = self.state.lock().unwrap();
        if !state.boards.iter().any(|b| b.id == board.board.id) {
            state.boards.push(board.board.clone());
        }
        state.board = Some(board);
    }

    pub fn server_board(&self) -> Option<BoardWithTasks> {
        self.state.lock().unwrap().board.clone()
    }

    pub fn set_user(&self, user: User) {
        self.state.lock().unwrap().user = Some(user);
    }

    pub fn add_team(&self, team: TeamWithMembers) {
        self.state
            .lock()
            .unwrap()
            .teams
            .insert(team.team.id.clone(), team);
    }

    /// Make `op` answer with HTTP 500 until healed.
    pub fn fail(&self, op: &'static str) {
        self.fail_with(op, 500);
    }

    pub fn fail_with(&self, op: &'static str, status: u16) {
        self.state.lock().unwrap().failures.insert(op, status);
    }

    pub fn heal(&self, op: &'static str) {
        self.state.lock().unwrap().failures.remove(op);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.as_str() == op)
            .count()
    }

    /// Run `hook` at the start of every call, before any state changes.
    pub fn on_call(&self, hook: impl Fn(&str) + Send + Sync + 'static) {
        *self.hook.lock().unwrap() = Some(Arc::new(hook));
    }

    fn enter(&self, op: &'static str) -> Result<(), GatewayError> {
        let hook = self.hook.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook(op);
        }
        let mut state = self.state.lock().unwrap();
        state.calls.push(op.to_string());
        match state.failures.get(op) {
            Some(401) => Err(GatewayError::Unauthorized),
            Some(&status) => Err(GatewayError::Status {
                status,
                message: format!("{} failed", op),
            }),
            None => Ok(()),
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        format!("{}-{}", prefix, state.next_id)
    }
}

fn not_found(what: &str) -> GatewayError {
    GatewayError::Status {
        status: 404,
        message: format!("{} not found", what),
    }
}

#[async_trait]
impl BoardGateway for FakeGateway {
    async fn login(&self, token: &str) -> Result<User, GatewayError> {
        self.enter("login")?;
        if token != "valid-token" {
            return Err(GatewayError::Unauthorized);
        }
        self.state
            .lock()
            .unwrap()
            .user
            .clone()
            .ok_or(GatewayError::Unauthorized)
    }

    async fn current_user(&self) -> Result<User, GatewayError> {
        self.enter("current_user")?;
        self.state
            .lock()
            .unwrap()
            .user
            .clone()
            .ok_or(GatewayError::Unauthorized)
    }

    async fn list_boards(&self) -> Result<Vec<Board>, GatewayError> {
        self.enter("list_boards")?;
        Ok(self.state.lock().unwrap().boards.clone())
    }

    async fn get_board(&self, board_id: &str) -> Result<BoardWithTasks, GatewayError> {
        self.enter("get_board")?;
        self.state
            .lock()
            .unwrap()
            .board
            .clone()
            .filter(|b| b.board.id == board_id)
            .ok_or_else(|| not_found("Board"))
    }

    async fn create_board(&self, data: &CreateBoardData) -> Result<Board, GatewayError> {
        self.enter("create_board")?;
        let board = Board {
            id: self.next_id("board"),
            name: data.name.clone(),
            description: data.description.clone(),
            team_id: data.team_id.clone(),
            columns: data.columns.clone().unwrap_or_default(),
            created_at: "2024-01-01T00:00:00Z".into(),
            updated_at: None,
        };
        self.state.lock().unwrap().boards.push(board.clone());
        Ok(board)
    }

    async fn update_board(&self, board_id: &str, data: &UpdateBoardData) -> Result<Board, GatewayError> {
        self.enter("update_board")?;
        let mut state = self.state.lock().unwrap();
        let board = state
            .boards
            .iter_mut()
            .find(|b| b.id == board_id)
            .ok_or_else(|| not_found("Board"))?;
        if let Some(name) = &data.name {
            board.name = name.clone();
        }
        if let Some(description) = &data.description {
            board.description = Some(description.clone());
        }
        if let Some(columns) = &data.columns {
            board.columns = columns.clone();
        }
        Ok(board.clone())
    }

    async fn delete_board(&self, board_id: &str) -> Result<(), GatewayError> {
        self.enter("delete_board")?;
        let mut state = self.state.lock().unwrap();
        state.boards.retain(|b| b.id != board_id);
        if state.board.as_ref().is_some_and(|b| b.board.id == board_id) {
            state.board = None;
        }
        Ok(())
    }

    async fn list_tasks(&self, filters: &TaskFilters) -> Result<Vec<Task>, GatewayError> {
        self.enter("list_tasks")?;
        let state = self.state.lock().unwrap();
        Ok(state
            .board
            .iter()
            .flat_map(|b| b.tasks.iter())
            .filter(|t| filters.status.as_ref().is_none_or(|s| &t.status == s))
            .filter(|t| filters.board_id.as_ref().is_none_or(|b| &t.board_id == b))
            .cloned()
            .collect())
    }

    async fn get_task(&self, task_id: &str) -> Result<Task, GatewayError> {
        self.enter("get_task")?;
        let state = self.state.lock().unwrap();
        state
            .board
            .iter()
            .flat_map(|b| b.tasks.iter())
            .find(|t| t.id == task_id)
            .cloned()
            .ok_or_else(|| not_found("Task"))
    }

    async fn create_task(&self, data: &CreateTaskData) -> Result<Task, GatewayError> {
        self.enter("create_task")?;
        let id = self.next_id("srv");
        let mut state = self.state.lock().unwrap();
        let board = state.board.as_mut().ok_or_else(|| not_found("Board"))?;
        let mut task = Task::provisional(id, data, "2024-01-01T00:00:00Z".into());
        task.creator_id = Some("user-1".into());
        task.position = board
            .tasks
            .iter()
            .filter(|t| t.column_id == task.column_id)
            .count() as i32;
        board.tasks.push(task.clone());
        Ok(task)
    }

    async fn update_task(&self, task_id: &str, data: &UpdateTaskData) -> Result<Task, GatewayError> {
        self.enter("update_task")?;
        let mut state = self.state.lock().unwrap();
        let task = state
            .board
            .as_mut()
            .and_then(|b| b.tasks.iter_mut().find(|t| t.id == task_id))
            .ok_or_else(|| not_found("Task"))?;
        task.apply_patch(data);
        Ok(task.clone())
    }

    async fn move_task(&self, task_id: &str, data: &MoveTaskData) -> Result<Task, GatewayError> {
        self.enter("move_task")?;
        let mut state = self.state.lock().unwrap();
        let task = state
            .board
            .as_mut()
            .and_then(|b| b.tasks.iter_mut().find(|t| t.id == task_id))
            .ok_or_else(|| not_found("Task"))?;
        task.apply_patch(&UpdateTaskData::placement_of(&data.column_id, data.position, None));
        if let Some(board_id) = &data.board_id {
            task.board_id = board_id.clone();
        }
        Ok(task.clone())
    }

    async fn delete_task(&self, task_id: &str) -> Result<(), GatewayError> {
        self.enter("delete_task")?;
        let mut state = self.state.lock().unwrap();
        let board = state.board.as_mut().ok_or_else(|| not_found("Board"))?;
        let before = board.tasks.len();
        board.tasks.retain(|t| t.id != task_id);
        if board.tasks.len() == before {
            return Err(not_found("Task"));
        }
        Ok(())
    }

    async fn list_teams(&self) -> Result<Vec<Team>, GatewayError> {
        self.enter("list_teams")?;
        let mut teams: Vec<Team> = self
            .state
            .lock()
            .unwrap()
            .teams
            .values()
            .map(|t| t.team.clone())
            .collect();
        teams.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(teams)
    }

    async fn get_team(&self, team_id: &str) -> Result<TeamWithMembers, GatewayError> {
        self.enter("get_team")?;
        self.state
            .lock()
            .unwrap()
            .teams
            .get(team_id)
            .cloned()
            .ok_or_else(|| not_found("Team"))
    }

    async fn create_team(&self, data: &CreateTeamData) -> Result<Team, GatewayError> {
        self.enter("create_team")?;
        let team = Team {
            id: self.next_id("team"),
            name: data.name.clone(),
            description: data.description.clone(),
            created_at: "2024-01-01T00:00:00Z".into(),
            updated_at: None,
        };
        self.add_team(TeamWithMembers {
            team: team.clone(),
            members: vec![],
            member_count: 0,
        });
        Ok(team)
    }

    async fn update_team(&self, team_id: &str, data: &UpdateTeamData) -> Result<Team, GatewayError> {
        self.enter("update_team")?;
        let mut state = self.state.lock().unwrap();
        let team = state.teams.get_mut(team_id).ok_or_else(|| not_found("Team"))?;
        if let Some(name) = &data.name {
            team.team.name = name.clone();
        }
        if let Some(description) = &data.description {
            team.team.description = Some(description.clone());
        }
        Ok(team.team.clone())
    }

    async fn delete_team(&self, team_id: &str) -> Result<(), GatewayError> {
        self.enter("delete_team")?;
        self.state
            .lock()
            .unwrap()
            .teams
            .remove(team_id)
            .map(|_| ())
            .ok_or_else(|| not_found("Team"))
    }

    async fn add_team_member(&self, team_id: &str, data: &AddTeamMemberData) -> Result<(), GatewayError> {
        self.enter("add_team_member")?;
        let member_id = self.next_id("member");
        let mut state = self.state.lock().unwrap();
        let team = state.teams.get_mut(team_id).ok_or_else(|| not_found("Team"))?;
        let name = data.user_email.split('@').next().unwrap_or_default().to_string();
        team.members.push(TeamMemberInfo {
            id: member_id,
            user: User {
                id: format!("user-{}", name),
                email: data.user_email.clone(),
                name,
                avatar_url: None,
                is_active: true,
                created_at: "2024-01-01T00:00:00Z".into(),
                updated_at: None,
            },
            role: data.role.unwrap_or_default(),
            joined_at: "2024-01-01T00:00:00Z".into(),
        });
        team.member_count = team.members.len() as u32;
        Ok(())
    }

    async fn update_team_member(
        &self,
        team_id: &str,
        user_id: &str,
        data: &UpdateTeamMemberData,
    ) -> Result<(), GatewayError> {
        self.enter("update_team_member")?;
        let mut state = self.state.lock().unwrap();
        let member = state
            .teams
            .get_mut(team_id)
            .and_then(|t| t.members.iter_mut().find(|m| m.user.id == user_id))
            .ok_or_else(|| not_found("Member"))?;
        member.role = data.role;
        Ok(())
    }

    async fn remove_team_member(&self, team_id: &str, user_id: &str) -> Result<(), GatewayError> {
        self.enter("remove_team_member")?;
        let mut state = self.state.lock().unwrap();
        let team = state.teams.get_mut(team_id).ok_or_else(|| not_found("Team"))?;
        team.members.retain(|m| m.user.id != user_id);
        team.member_count = team.members.len() as u32;
        Ok(())
    }

    async fn list_sprints(&self, team_id: Option<&str>) -> Result<Vec<Sprint>, GatewayError> {
        self.enter("list_sprints")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .sprints
            .iter()
            .filter(|s| team_id.is_none_or(|id| s.team_id == id))
            .cloned()
            .collect())
    }

    async fn get_sprint(&self, sprint_id: &str) -> Result<SprintWithTasks, GatewayError> {
        self.enter("get_sprint")?;
        let state = self.state.lock().unwrap();
        let sprint = state
            .sprints
            .iter()
            .find(|s| s.id == sprint_id)
            .cloned()
            .ok_or_else(|| not_found("Sprint"))?;
        Ok(SprintWithTasks {
            sprint,
            tasks: vec![],
            completed_tasks: 0,
            total_tasks: 0,
            completed_hours: 0,
            total_hours: 0,
        })
    }

    async fn create_sprint(&self, data: &CreateSprintData) -> Result<Sprint, GatewayError> {
        self.enter("create_sprint")?;
        let sprint = Sprint {
            id: self.next_id("sprint"),
            name: data.name.clone(),
            description: data.description.clone(),
            start_date: data.start_date.clone(),
            end_date: data.end_date.clone(),
            team_id: data.team_id.clone(),
            is_active: false,
            goal: data.goal.clone(),
            capacity: data.capacity,
            created_at: "2024-01-01T00:00:00Z".into(),
            updated_at: None,
        };
        self.state.lock().unwrap().sprints.push(sprint.clone());
        Ok(sprint)
    }

    async fn update_sprint(&self, sprint_id: &str, data: &UpdateSprintData) -> Result<Sprint, GatewayError> {
        self.enter("update_sprint")?;
        let mut state = self.state.lock().unwrap();
        let sprint = state
            .sprints
            .iter_mut()
            .find(|s| s.id == sprint_id)
            .ok_or_else(|| not_found("Sprint"))?;
        if let Some(name) = &data.name {
            sprint.name = name.clone();
        }
        if let Some(active) = data.is_active {
            sprint.is_active = active;
        }
        Ok(sprint.clone())
    }

    async fn delete_sprint(&self, sprint_id: &str) -> Result<(), GatewayError> {
        self.enter("delete_sprint")?;
        self.state.lock().unwrap().sprints.retain(|s| s.id != sprint_id);
        Ok(())
    }
}
