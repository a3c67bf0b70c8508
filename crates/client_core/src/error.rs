use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Transport,
    Protocol,
    Permission,
    SessionExpired,
    Payment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("input must not be empty")]
    EmptyInput,
    #[error("please select a plan first")]
    NoPlanSelected,
    #[error("chat session is not available on this page")]
    MissingSession,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server responded with status {status}")]
    Server { status: u16, message: Option<String> },
    #[error("unexpected response: {0}")]
    Protocol(String),
    #[error("capture device permission denied: {0}")]
    Permission(String),
    #[error("capture device failure: {0}")]
    Capture(String),
    #[error("card tokenization failed: {0}")]
    Tokenization(String),
    #[error("payment confirmation failed: {0}")]
    PaymentDeclined(String),
    #[error("session expired")]
    Unauthorized,
}

impl ClientError {
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Transport(_) | Self::Server { .. } => ErrorKind::Transport,
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::Permission(_) | Self::Capture(_) => ErrorKind::Permission,
            Self::Tokenization(_) | Self::PaymentDeclined(_) => ErrorKind::Payment,
            Self::Unauthorized => ErrorKind::SessionExpired,
        }
    }

    /// Text shown to the user: the server's own `error` field wins, then
    /// messages produced by external collaborators, then `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Server {
                message: Some(message),
                ..
            } => message.clone(),
            Self::Validation(err) => err.to_string(),
            Self::Permission(_) => "Microphone access denied or not available.".to_string(),
            Self::Tokenization(message) | Self::PaymentDeclined(message) => message.clone(),
            _ => fallback.to_string(),
        }
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
