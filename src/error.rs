// src/error.rs
//! Error types shared by the backend client, the scan stream and the dashboard.

use thiserror::Error;

/// Failure talking to the DevPulse backend.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection refused, reset, timed out, body read failed.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status from an endpoint.
    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: &'static str, status: u16 },

    /// The endpoint needs a signed-in user.
    #[error("sign in required")]
    AuthRequired,

    /// Response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid base url: {0}")]
    InvalidUrl(String),

    /// The caller's cancellation token fired.
    #[error("cancelled")]
    Cancelled,
}

impl ClientError {
    pub fn is_auth_required(&self) -> bool {
        matches!(self, ClientError::AuthRequired)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled)
    }

    /// Map a status code to the error variant the UI distinguishes.
    pub(crate) fn from_status(endpoint: &'static str, status: u16) -> Self {
        if status == 401 {
            ClientError::AuthRequired
        } else {
            ClientError::Status { endpoint, status }
        }
    }
}

/// Why a demo sequence stopped before its natural end.
#[derive(Debug, Error)]
pub enum DemoError {
    #[error("demo target element `{0}` not found")]
    MissingTarget(String),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("demo cancelled")]
    Cancelled,
}

pub type ClientResult<T> = Result<T, ClientError>;
