//! Auth store: current user and login state.
//!
//! Only the user and the authenticated flag are persisted, in
//! `<state_dir>/auth-storage.json`; the credential itself belongs to the
//! [`Session`].

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use super::gateway::BoardGateway;
use super::models::User;
use super::session::{self, Session, SessionEvent};
use crate::errors::AuthError;

const AUTH_STORAGE_FILE: &str = "auth-storage.json";

/// The persisted slice of auth state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PersistedAuth {
    pub user: Option<User>,
    pub is_authenticated: bool,
}

#[derive(Debug, Default)]
struct AuthState {
    user: Option<User>,
    is_authenticated: bool,
    loading: bool,
    error: Option<String>,
}

#[derive(Clone)]
pub struct AuthStore {
    state: Arc<Mutex<AuthState>>,
    gateway: Arc<dyn BoardGateway>,
    session: Session,
}

impl AuthStore {
    /// Create the store, restoring persisted state when the session has a
    /// state directory.
    pub fn new(gateway: Arc<dyn BoardGateway>, session: Session) -> Self {
        let restored = storage_path(&session)
            .map(|path| read_persisted(&path))
            .unwrap_or_default();
        Self {
            state: Arc::new(Mutex::new(AuthState {
                user: restored.user,
                is_authenticated: restored.is_authenticated,
                loading: false,
                error: None,
            })),
            gateway,
            session,
        }
    }

    fn lock(&self) -> MutexGuard<'_, AuthState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn user(&self) -> Option<User> {
        self.lock().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().is_authenticated
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

    pub fn clear_error(&self) {
        self.set_error(None);
    }

    /// Exchange `token` for the current user. A backend rejection is
    /// returned as is; local persistence problems after a rejection are
    /// only logged.
    pub async fn login(&self, token: &str) -> Result<User, AuthError> {
        {
            let mut state = self.lock();
            state.loading = true;
            state.error = None;
        }
        match self.gateway.login(token).await {
            Ok(user) => {
                if let Err(e) = self.session.set_token(token) {
                    self.set_signed_out(Some(e.to_string()));
                    return Err(e);
                }
                self.set_signed_in(user.clone());
                tracing::info!("Logged in as {}", user.email);
                Ok(user)
            }
            Err(e) => {
                let err = AuthError::from(e);
                self.set_signed_out(Some(err.to_string()));
                Err(err)
            }
        }
    }

    pub fn logout(&self) {
        self.set_signed_out(None);
        self.session.require_login();
        tracing::info!("Logged out");
    }

    /// Refresh the current user from the backend. Without a stored
    /// credential this makes no call and reports no user.
    pub async fn fetch_current_user(&self) -> Result<Option<User>, AuthError> {
        if !self.session.is_logged_in() {
            self.set_signed_out(None);
            return Ok(None);
        }
        self.lock().loading = true;
        match self.gateway.current_user().await {
            Ok(user) => {
                self.set_signed_in(user.clone());
                Ok(Some(user))
            }
            Err(e) => {
                let err = AuthError::from(e);
                if let Err(clear) = self.session.clear() {
                    tracing::warn!("Failed to remove stored credential: {}", clear);
                }
                self.set_signed_out(Some(err.to_string()));
                Err(err)
            }
        }
    }

    /// Sign out locally whenever the session reports that a new login is
    /// needed, e.g. after any request came back 401.
    pub fn watch_session(&self) -> JoinHandle<()> {
        let store = self.clone();
        let mut events = self.session.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::LoginRequired) => store.set_signed_out(None),
                    Ok(SessionEvent::LoggedIn) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        tracing::debug!("Session watcher skipped {} events", n);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn set_signed_in(&self, user: User) {
        {
            let mut state = self.lock();
            state.user = Some(user);
            state.is_authenticated = true;
            state.loading = false;
            state.error = None;
        }
        self.persist();
    }

    fn set_signed_out(&self, error: Option<String>) {
        {
            let mut state = self.lock();
            state.user = None;
            state.is_authenticated = false;
            state.loading = false;
            state.error = error;
        }
        self.persist();
    }

    /// Write the persisted slice. In-memory state stays authoritative when
    /// the write fails.
    fn persist(&self) {
        let Some(dir) = self.session.state_dir() else {
            return;
        };
        let persisted = {
            let state = self.lock();
            PersistedAuth {
                user: state.user.clone(),
                is_authenticated: state.is_authenticated,
            }
        };
        let json = serde_json::to_string_pretty(&persisted).unwrap_or_else(|_| "{}".to_string());
        if let Err(e) = session::write_private(dir, AUTH_STORAGE_FILE, &json) {
            tracing::warn!("Failed to persist auth state: {}", e);
        }
    }
}

fn storage_path(session: &Session) -> Option<PathBuf> {
    session.state_dir().map(|dir| dir.join(AUTH_STORAGE_FILE))
}

fn read_persisted(path: &std::path::Path) -> PersistedAuth {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
            tracing::warn!("Ignoring unreadable auth state at {}: {}", path.display(), e);
            PersistedAuth::default()
        }),
        Err(_) => PersistedAuth::default(),
    }
}
