//! Remote data gateway: every REST endpoint the client talks to.
//!
//! [`BoardGateway`] is the seam the stores depend on; [`HttpGateway`] is the
//! reqwest implementation. Tests substitute an in-memory fake.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::models::*;
use super::session::Session;
use crate::errors::GatewayError;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Every backend call the client makes.
#[async_trait]
pub trait BoardGateway: Send + Sync {
    // Auth
    async fn login(&self, token: &str) -> Result<User, GatewayError>;
    async fn current_user(&self) -> Result<User, GatewayError>;

    // Boards
    async fn list_boards(&self) -> Result<Vec<Board>, GatewayError>;
    async fn get_board(&self, board_id: &str) -> Result<BoardWithTasks, GatewayError>;
    async fn create_board(&self, data: &CreateBoardData) -> Result<Board, GatewayError>;
    async fn update_board(&self, board_id: &str, data: &UpdateBoardData) -> Result<Board, GatewayError>;
    async fn delete_board(&self, board_id: &str) -> Result<(), GatewayError>;

    // Tasks
    async fn list_tasks(&self, filters: &TaskFilters) -> Result<Vec<Task>, GatewayError>;
    async fn get_task(&self, task_id: &str) -> Result<Task, GatewayError>;
    async fn create_task(&self, data: &CreateTaskData) -> Result<Task, GatewayError>;
    async fn update_task(&self, task_id: &str, data: &UpdateTaskData) -> Result<Task, GatewayError>;
    async fn move_task(&self, task_id: &str, data: &MoveTaskData) -> Result<Task, GatewayError>;
    async fn delete_task(&self, task_id: &str) -> Result<(), GatewayError>;

    // Teams
    async fn list_teams(&self) -> Result<Vec<Team>, GatewayError>;
    async fn get_team(&self, team_id: &str) -> Result<TeamWithMembers, GatewayError>;
    async fn create_team(&self, data: &CreateTeamData) -> Result<Team, GatewayError>;
    async fn update_team(&self, team_id: &str, data: &UpdateTeamData) -> Result<Team, GatewayError>;
    async fn delete_team(&self, team_id: &str) -> Result<(), GatewayError>;
    async fn add_team_member(&self, team_id: &str, data: &AddTeamMemberData) -> Result<(), GatewayError>;
    async fn update_team_member(
        &self,
        team_id: &str,
        user_id: &str,
        data: &UpdateTeamMemberData,
    ) -> Result<(), GatewayError>;
    async fn remove_team_member(&self, team_id: &str, user_id: &str) -> Result<(), GatewayError>;

    // Sprints
    async fn list_sprints(&self, team_id: Option<&str>) -> Result<Vec<Sprint>, GatewayError>;
    async fn get_sprint(&self, sprint_id: &str) -> Result<SprintWithTasks, GatewayError>;
    async fn create_sprint(&self, data: &CreateSprintData) -> Result<Sprint, GatewayError>;
    async fn update_sprint(&self, sprint_id: &str, data: &UpdateSprintData) -> Result<Sprint, GatewayError>;
    async fn delete_sprint(&self, sprint_id: &str) -> Result<(), GatewayError>;
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    token: &'a str,
}

/// reqwest-backed gateway. Attaches the session's bearer token to every
/// request and drops the session on 401.
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    session: Session,
}

impl HttpGateway {
    pub fn new(base_url: &str, timeout: Duration, session: Session) -> Result<Self, GatewayError> {
        let base_url = normalize_base_url(base_url)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GatewayError::Transport)?;
        Ok(Self {
            client,
            base_url,
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match self.session.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send and map non-success answers to `GatewayError`.
    async fn execute(&self, builder: RequestBuilder) -> Result<Response, GatewayError> {
        let resp = builder.send().await.map_err(GatewayError::Transport)?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!("Backend rejected credential, login required");
            self.session.require_login();
            return Err(GatewayError::Unauthorized);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(GatewayError::Status {
            status: status.as_u16(),
            message: error_message(status, &body),
        })
    }

    async fn call<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, GatewayError> {
        let resp = self.execute(builder).await?;
        resp.json::<T>().await.map_err(|e| {
            if e.is_decode() {
                GatewayError::Decode(e)
            } else {
                GatewayError::Transport(e)
            }
        })
    }

    /// For endpoints whose response body we ignore.
    async fn call_empty(&self, builder: RequestBuilder) -> Result<(), GatewayError> {
        self.execute(builder).await.map(|_| ())
    }
}

fn normalize_base_url(url: &str) -> Result<String, GatewayError> {
    let trimmed = url.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(GatewayError::InvalidUrl {
            url: url.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

/// Pull a readable message out of an error body. The backend reports
/// failures as `{"detail": ...}`; other shapes fall back to the raw body.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["detail", "error", "message"] {
            match value.get(key) {
                Some(serde_json::Value::String(s)) => return s.clone(),
                Some(serde_json::Value::Null) | None => {}
                Some(other) => return other.to_string(),
            }
        }
    }
    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}

#[async_trait]
impl BoardGateway for HttpGateway {
    async fn login(&self, token: &str) -> Result<User, GatewayError> {
        self.call(
            self.client
                .post(self.url("/api/auth/login"))
                .json(&LoginRequest { token }),
        )
        .await
    }

    async fn current_user(&self) -> Result<User, GatewayError> {
        self.call(self.request(Method::GET, "/api/auth/me")).await
    }

    async fn list_boards(&self) -> Result<Vec<Board>, GatewayError> {
        self.call(self.request(Method::GET, "/api/boards")).await
    }

    async fn get_board(&self, board_id: &str) -> Result<BoardWithTasks, GatewayError> {
        self.call(self.request(Method::GET, &format!("/api/boards/{}", board_id)))
            .await
    }

    async fn create_board(&self, data: &CreateBoardData) -> Result<Board, GatewayError> {
        self.call(self.request(Method::POST, "/api/boards").json(data))
            .await
    }

    async fn update_board(&self, board_id: &str, data: &UpdateBoardData) -> Result<Board, GatewayError> {
        self.call(
            self.request(Method::PUT, &format!("/api/boards/{}", board_id))
                .json(data),
        )
        .await
    }

    async fn delete_board(&self, board_id: &str) -> Result<(), GatewayError> {
        self.call_empty(self.request(Method::DELETE, &format!("/api/boards/{}", board_id)))
            .await
    }

    async fn list_tasks(&self, filters: &TaskFilters) -> Result<Vec<Task>, GatewayError> {
        self.call(
            self.request(Method::GET, "/api/tasks")
                .query(&filters.query_pairs()),
        )
        .await
    }

    async fn get_task(&self, task_id: &str) -> Result<Task, GatewayError> {
        self.call(self.request(Method::GET, &format!("/api/tasks/{}", task_id)))
            .await
    }

    async fn create_task(&self, data: &CreateTaskData) -> Result<Task, GatewayError> {
        self.call(self.request(Method::POST, "/api/tasks").json(data))
            .await
    }

    async fn update_task(&self, task_id: &str, data: &UpdateTaskData) -> Result<Task, GatewayError> {
        self.call(
            self.request(Method::PUT, &format!("/api/tasks/{}", task_id))
                .json(data),
        )
        .await
    }

    async fn move_task(&self, task_id: &str, data: &MoveTaskData) -> Result<Task, GatewayError> {
        self.call(
            self.request(Method::POST, &format!("/api/tasks/{}/move", task_id))
                .json(data),
        )
        .await
    }

    async fn delete_task(&self, task_id: &str) -> Result<(), GatewayError> {
        self.call_empty(self.request(Method::DELETE, &format!("/api/tasks/{}", task_id)))
            .await
    }

    async fn list_teams(&self) -> Result<Vec<Team>, GatewayError> {
        self.call(self.request(Method::GET, "/api/teams")).await
    }

    async fn get_team(&self, team_id: &str) -> Result<TeamWithMembers, GatewayError> {
        self.call(self.request(Method::GET, &format!("/api/teams/{}", team_id)))
            .await
    }

    async fn create_team(&self, data: &CreateTeamData) -> Result<Team, GatewayError> {
        self.call(self.request(Method::POST, "/api/teams").json(data))
            .await
    }

    async fn update_team(&self, team_id: &str, data: &UpdateTeamData) -> Result<Team, GatewayError> {
        self.call(
            self.request(Method::PUT, &format!("/api/teams/{}", team_id))
                .json(data),
        )
        .await
    }

    async fn delete_team(&self, team_id: &str) -> Result<(), GatewayError> {
        self.call_empty(self.request(Method::DELETE, &format!("/api/teams/{}", team_id)))
            .await
    }

    async fn add_team_member(&self, team_id: &str, data: &AddTeamMemberData) -> Result<(), GatewayError> {
        self.call_empty(
            self.request(Method::POST, &format!("/api/teams/{}/members", team_id))
                .json(data),
        )
        .await
    }

    async fn update_team_member(
        &self,
        team_id: &str,
        user_id: &str,
        data: &UpdateTeamMemberData,
    ) -> Result<(), GatewayError> {
        self.call_empty(
            self.request(
                Method::PUT,
                &format!("/api/teams/{}/members/{}", team_id, user_id),
            )
            .json(data),
        )
        .await
    }

    async fn remove_team_member(&self, team_id: &str, user_id: &str) -> Result<(), GatewayError> {
        self.call_empty(self.request(
            Method::DELETE,
            &format!("/api/teams/{}/members/{}", team_id, user_id),
        ))
        .await
    }

    async fn list_sprints(&self, team_id: Option<&str>) -> Result<Vec<Sprint>, GatewayError> {
        let mut builder = self.request(Method::GET, "/api/sprints");
        if let Some(team_id) = team_id {
            builder = builder.query(&[("team_id", team_id)]);
        }
        self.call(builder).await
    }

    async fn get_sprint(&self, sprint_id: &str) -> Result<SprintWithTasks, GatewayError> {
        self.call(self.request(Method::GET, &format!("/api/sprints/{}", sprint_id)))
            .await
    }

    async fn create_sprint(&self, data: &CreateSprintData) -> Result<Sprint, GatewayError> {
        self.call(self.request(Method::POST, "/api/sprints").json(data))
            .await
    }

    async fn update_sprint(&self, sprint_id: &str, data: &UpdateSprintData) -> Result<Sprint, GatewayError> {
        self.call(
            self.request(Method::PUT, &format!("/api/sprints/{}", sprint_id))
                .json(data),
        )
        .await
    }

    async fn delete_sprint(&self, sprint_id: &str) -> Result<(), GatewayError> {
        self.call_empty(self.request(Method::DELETE, &format!("/api/sprints/{}", sprint_id)))
            .await
    }
}
