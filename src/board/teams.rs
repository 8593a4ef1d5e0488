//! Team store: the team list, the open team and its members.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::gateway::BoardGateway;
use super::models::*;
use crate::errors::{GatewayError, TeamError};

#[derive(Debug, Default)]
struct TeamState {
    teams: Vec<Team>,
    current: Option<TeamWithMembers>,
    loading: bool,
    error: Option<String>,
}

#[derive(Clone)]
pub struct TeamStore {
    state: Arc<Mutex<TeamState>>,
    gateway: Arc<dyn BoardGateway>,
}

impl TeamStore {
    pub fn new(gateway: Arc<dyn BoardGateway>) -> Self {
        Self {
            state: Arc::new(Mutex::new(TeamState::default())),
            gateway,
        }
    }

    fn lock(&self) -> MutexGuard<'_, TeamState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn teams(&self) -> Vec<Team> {
        self.lock().teams.clone()
    }

    pub fn current_team(&self) -> Option<TeamWithMembers> {
        self.lock().current.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    pub fn set_error(&self, error: Option<String>) {
        self.lock().error = error;
    }

    pub fn clear_team(&self) {
        self.lock().current = None;
    }

    fn fail(&self, err: GatewayError) -> TeamError {
        tracing::warn!("Team operation failed: {}", err);
        let mut state = self.lock();
        state.loading = false;
        state.error = Some(err.to_string());
        TeamError::from(err)
    }

    pub async fn fetch_teams(&self) -> Result<Vec<Team>, TeamError> {
        self.lock().loading = true;
        let teams = self.gateway.list_teams().await.map_err(|e| self.fail(e))?;
        let mut state = self.lock();
        state.teams = teams.clone();
        state.loading = false;
        Ok(teams)
    }

    pub async fn fetch_team(&self, team_id: &str) -> Result<TeamWithMembers, TeamError> {
        self.lock().loading = true;
        let team = self
            .gateway
            .get_team(team_id)
            .await
            .map_err(|e| self.fail(e))?;
        let mut state = self.lock();
        state.current = Some(team.clone());
        state.loading = false;
        Ok(team)
    }

    pub async fn create_team(&self, data: &CreateTeamData) -> Result<Team, TeamError> {
        let team = self
            .gateway
            .create_team(data)
            .await
            .map_err(|e| self.fail(e))?;
        self.lock().teams.push(team.clone());
        Ok(team)
    }

    pub async fn update_team(&self, team_id: &str, data: &UpdateTeamData) -> Result<Team, TeamError> {
        let team = self
            .gateway
            .update_team(team_id, data)
            .await
            .map_err(|e| self.fail(e))?;
        let mut state = self.lock();
        if let Some(existing) = state.teams.iter_mut().find(|t| t.id == team.id) {
            *existing = team.clone();
        }
        if let Some(current) = state.current.as_mut()
            && current.team.id == team.id
        {
            current.team = team.clone();
        }
        Ok(team)
    }

    pub async fn delete_team(&self, team_id: &str) -> Result<(), TeamError> {
        self.gateway
            .delete_team(team_id)
            .await
            .map_err(|e| self.fail(e))?;
        let mut state = self.lock();
        state.teams.retain(|t| t.id != team_id);
        if state.current.as_ref().is_some_and(|c| c.team.id == team_id) {
            state.current = None;
        }
        Ok(())
    }

    pub async fn add_team_member(&self, team_id: &str, data: &AddTeamMemberData) -> Result<(), TeamError> {
        self.gateway
            .add_team_member(team_id, data)
            .await
            .map_err(|e| self.fail(e))?;
        self.fetch_team(team_id).await.map(|_| ())
    }

    pub async fn update_team_member(
        &self,
        team_id: &str,
        user_id: &str,
        data: &UpdateTeamMemberData,
    ) -> Result<(), TeamError> {
        self.gateway
            .update_team_member(team_id, user_id, data)
            .await
            .map_err(|e| self.fail(e))?;
        self.fetch_team(team_id).await.map(|_| ())
    }

    pub async fn remove_team_member(&self, team_id: &str, user_id: &str) -> Result<(), TeamError> {
        self.gateway
            .remove_team_member(team_id, user_id)
            .await
            .map_err(|e| self.fail(e))?;
        self.fetch_team(team_id).await.map(|_| ())
    }
}
