use controller::ChannelError;
use shared::error::{ApiError, ErrorCode};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("{0}")]
    ControllerUnreachable(String),
    #[error("Not connected to any workspace")]
    NotConnected,
    #[error("Unknown workspace: {0}")]
    UnknownWorkspace(String),
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    #[error("No cue ID provided")]
    MissingCueId,
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

impl BridgeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ControllerUnreachable(_) => ErrorCode::Unavailable,
            Self::NotConnected => ErrorCode::NotConnected,
            Self::UnknownWorkspace(_) => ErrorCode::NotFound,
            Self::UnknownCommand(_) | Self::MissingCueId => ErrorCode::Validation,
            Self::Channel(_) => ErrorCode::Internal,
        }
    }
}

impl From<BridgeError> for ApiError {
    fn from(value: BridgeError) -> Self {
        ApiError::new(value.code(), value.to_string())
    }
}
