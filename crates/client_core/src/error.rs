use shared::error::ErrorCode;
use thiserror::Error;

/// Broad failure class, used for logging. Users see one generic notice for all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Auth,
    Transport,
    Application,
    Local,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not authenticated: {0}")]
    Auth(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{message}")]
    Status {
        status: u16,
        code: ErrorCode,
        message: String,
    },
    #[error("invalid response payload: {0}")]
    Decode(String),
    #[error("{0} is not in the local cache")]
    MissingEntity(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ClientError {
    pub fn status(status: u16, message: Option<String>) -> Self {
        let message =
            message.unwrap_or_else(|| format!("request failed with HTTP status {status}"));
        ClientError::Status {
            status,
            code: ErrorCode::from_status(status),
            message,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ClientError::Auth(_) => FailureKind::Auth,
            ClientError::Status {
                code: ErrorCode::Unauthorized,
                ..
            } => FailureKind::Auth,
            ClientError::Transport(_) => FailureKind::Transport,
            ClientError::Status { .. } | ClientError::Decode(_) => FailureKind::Application,
            ClientError::MissingEntity(_) | ClientError::InvalidConfig(_) => FailureKind::Local,
        }
    }
}
