//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module    | Commands handled                       |
//! |-----------|----------------------------------------|
//! | `auth`    | `Login`, `Logout`, `Whoami`            |
//! | `board`   | `Boards`, `Board`                      |
//! | `task`    | `Task`                                 |
//! | `team`    | `Team`, `Sprints`                      |
//! | `config`  | `Config`                               |

pub mod auth;
pub mod board;
pub mod config;
pub mod task;
pub mod team;

use std::sync::Arc;

use anyhow::{Result, bail};

use taskboard::board::auth::AuthStore;
use taskboard::board::gateway::{BoardGateway, HttpGateway};
use taskboard::board::session::Session;
use taskboard::board::store::BoardStore;
use taskboard::board::tasks::TaskOrchestrator;
use taskboard::board::teams::TeamStore;
use taskboard::config::ClientConfig;

pub use auth::{cmd_login, cmd_logout, cmd_whoami};
pub use board::{cmd_board, cmd_boards};
pub use config::cmd_config;
pub use task::cmd_task;
pub use team::{cmd_sprints, cmd_team};

/// Everything a command needs: the resolved config, the session and one
/// gateway shared by every store.
pub struct App {
    pub config: ClientConfig,
    pub session: Session,
    pub gateway: Arc<dyn BoardGateway>,
}

impl App {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let session = Session::load(&config.state_dir())?;
        let gateway = HttpGateway::new(
            &config.api.url,
            config.api.request_timeout(),
            session.clone(),
        )?;
        Ok(Self {
            config,
            session,
            gateway: Arc::new(gateway),
        })
    }

    pub fn auth(&self) -> AuthStore {
        AuthStore::new(self.gateway.clone(), self.session.clone())
    }

    pub fn board_store(&self) -> BoardStore {
        BoardStore::new(self.gateway.clone())
    }

    pub fn tasks(&self) -> TaskOrchestrator {
        TaskOrchestrator::new(self.board_store())
    }

    pub fn teams(&self) -> TeamStore {
        TeamStore::new(self.gateway.clone())
    }

    /// Bail early instead of sending a request the backend will reject.
    pub fn require_login(&self) -> Result<String> {
        match self.session.token() {
            Some(token) => Ok(token),
            None => bail!("Not logged in. Run 'taskboard login <token>' first."),
        }
    }
}
