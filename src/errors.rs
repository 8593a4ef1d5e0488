//! Typed error hierarchy for the taskboard client.
//!
//! One enum per subsystem:
//! - `GatewayError`: REST calls against the backend
//! - `BoardError`: board store reads (`Fetch`) and writes (`Mutation`)
//! - `PushError`: the realtime push channel transport
//! - `AuthError`: login, logout and credential persistence
//! - `TeamError`: team store operations
//! - `ConfigError`: configuration loading and validation

use std::path::PathBuf;

use thiserror::Error;

/// Errors from the remote data gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Not authenticated (HTTP 401)")]
    Unauthorized,

    #[error("Backend returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("Invalid URL '{url}'")]
    InvalidUrl { url: String },
}

impl GatewayError {
    /// HTTP status of the failed call, if the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized => Some(401),
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors from the board state store.
#[derive(Debug, Error)]
pub enum BoardError {
    /// A read failed; the snapshot was left untouched.
    #[error("Failed to fetch board: {0}")]
    Fetch(#[source] GatewayError),

    /// A write failed; rollback has been applied by the caller's policy.
    #[error("Failed to {operation}: {source}")]
    Mutation {
        operation: &'static str,
        #[source]
        source: GatewayError,
    },

    #[error("No board is open")]
    NoBoardOpen,
}

impl BoardError {
    pub(crate) fn mutation(operation: &'static str, source: GatewayError) -> Self {
        Self::Mutation { operation, source }
    }

    /// The gateway error underneath, if any.
    pub fn gateway_error(&self) -> Option<&GatewayError> {
        match self {
            Self::Fetch(e) | Self::Mutation { source: e, .. } => Some(e),
            Self::NoBoardOpen => None,
        }
    }
}

/// Errors from the push channel.
#[derive(Debug, Error)]
pub enum PushError {
    #[error("Failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },

    #[error("Push channel transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Failed to serialize push message: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Push channel is not connected")]
    NotConnected,

    #[error("Invalid push URL '{url}'")]
    InvalidUrl { url: String },
}

/// Errors from the auth store.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid or expired credential")]
    Unauthorized,

    #[error(transparent)]
    Gateway(GatewayError),

    #[error("Failed to persist auth state at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<GatewayError> for AuthError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Unauthorized => Self::Unauthorized,
            other => Self::Gateway(other),
        }
    }
}

/// Errors from the team store.
#[derive(Debug, Error)]
pub enum TeamError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
