use serde::Serialize;
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BotErrorKind {
    InvalidParams,
    Denied,
    Connection,
    Transfer,
    NotFound,
    Timeout,
    Internal,
}

/// Failure raised anywhere in the bot. Provisioning failures are rendered to
/// the requester verbatim through [`BotError::user_message`].
#[derive(Debug, Clone, Serialize)]
pub struct BotError {
    pub kind: BotErrorKind,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl BotError {
    pub fn new(kind: BotErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(BotErrorKind::InvalidParams, "INVALID_PARAMS", message)
    }

    pub fn denied(message: impl Into<String>) -> Self {
        Self::new(BotErrorKind::Denied, "DENIED", message)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(BotErrorKind::Connection, "REMOTE_CONNECTION", message)
    }

    pub fn transfer(message: impl Into<String>) -> Self {
        Self::new(BotErrorKind::Transfer, "ARTIFACT_TRANSFER", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(BotErrorKind::NotFound, "ARTIFACT_NOT_FOUND", message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(BotErrorKind::Timeout, "TIMEOUT", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(BotErrorKind::Internal, "INTERNAL", message)
    }

    pub fn user_message(&self) -> String {
        crate::constants::replies::failure(&self.message)
    }
}

impl fmt::Display for BotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for BotError {}

impl From<std::io::Error> for BotError {
    fn from(err: std::io::Error) -> Self {
        BotError::transfer(err.to_string())
    }
}
