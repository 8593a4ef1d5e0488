//! Credential storage shared by the gateway and the auth store.
//!
//! The access token lives in `<state_dir>/access_token`. Whoever holds a
//! `Session` can read it, replace it, or drop it; dropping it because the
//! backend answered 401 also broadcasts [`SessionEvent::LoginRequired`] so
//! the front end can route back to its login view.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;

use crate::errors::AuthError;

const TOKEN_FILE: &str = "access_token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn,
    LoginRequired,
}

#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    token: RwLock<Option<String>>,
    state_dir: Option<PathBuf>,
    events: broadcast::Sender<SessionEvent>,
}

impl Session {
    /// A session that never touches disk.
    pub fn in_memory() -> Self {
        Self::build(None, None)
    }

    /// Open the session stored under `state_dir`, reading any saved token.
    pub fn load(state_dir: &Path) -> Result<Self, AuthError> {
        let path = state_dir.join(TOKEN_FILE);
        let token = match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let token = contents.trim().to_string();
                (!token.is_empty()).then_some(token)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(source) => return Err(AuthError::Storage { path, source }),
        };
        Ok(Self::build(Some(state_dir.to_path_buf()), token))
    }

    fn build(state_dir: Option<PathBuf>, token: Option<String>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(SessionInner {
                token: RwLock::new(token),
                state_dir,
                events,
            }),
        }
    }

    pub fn state_dir(&self) -> Option<&Path> {
        self.inner.state_dir.as_deref()
    }

    pub fn token(&self) -> Option<String> {
        self.inner
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.token().is_some()
    }

    /// Store a new credential and persist it.
    pub fn set_token(&self, token: &str) -> Result<(), AuthError> {
        if let Some(dir) = self.state_dir() {
            write_private(dir, TOKEN_FILE, token)?;
        }
        *self
            .inner
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        let _ = self.inner.events.send(SessionEvent::LoggedIn);
        Ok(())
    }

    /// Forget the credential, in memory and on disk.
    pub fn clear(&self) -> Result<(), AuthError> {
        *self
            .inner
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
        if let Some(dir) = self.state_dir() {
            let path = dir.join(TOKEN_FILE);
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(AuthError::Storage { path, source }),
            }
        }
        Ok(())
    }

    /// Drop the credential and tell listeners a fresh login is needed.
    pub fn require_login(&self) {
        if let Err(e) = self.clear() {
            tracing::warn!("Failed to remove stored credential: {}", e);
        }
        let _ = self.inner.events.send(SessionEvent::LoginRequired);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }
}

/// Write `contents` to `dir/name`, creating `dir` and restricting the file
/// to the current user where the platform allows.
pub(crate) fn write_private(dir: &Path, name: &str, contents: &str) -> Result<(), AuthError> {
    let path = dir.join(name);
    let storage_err = |source| AuthError::Storage {
        path: path.clone(),
        source,
    };
    std::fs::create_dir_all(dir).map_err(storage_err)?;

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(&path).map_err(storage_err)?;
    std::io::Write::write_all(&mut file, contents.as_bytes()).map_err(storage_err)
}
