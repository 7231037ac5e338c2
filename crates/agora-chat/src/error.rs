use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChatError>;

/// Domain error taxonomy. Each variant maps to a stable `{status, code,
/// message}` triple on the HTTP surface; the transport logs and swallows
/// these instead.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Conflict(&'static str),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ChatError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        ChatError::InvalidArgument(msg.into())
    }

    /// Stable machine-readable code, independent of the message text.
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::Unauthenticated => "CHAT_401",
            ChatError::Forbidden(_) => "CHAT_403",
            ChatError::NotFound(_) => "CHAT_404",
            ChatError::InvalidArgument(_) => "CHAT_400",
            ChatError::Conflict(_) => "CHAT_409",
            ChatError::Internal(_) => "CHAT_500",
        }
    }
}
