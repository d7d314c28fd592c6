use chrono::{DateTime, Utc};

#[derive(Debug)]
pub enum EngineError {
    /// Bad input: missing field, malformed date/time, out-of-window slot.
    Validation(String),
    /// The date or slot is taken/blocked; the reason names the conflict.
    Conflict(String),
    /// Unknown record id or access code.
    NotFound(String),
    /// The gallery behind a valid code is past its expiration date.
    Expired { expires_at: DateTime<Utc> },
    /// Email dispatch failed where the email is the operation itself.
    Email(String),
    /// Backing storage failed; the collection is temporarily unavailable.
    Unavailable(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(msg) => write!(f, "invalid request: {msg}"),
            EngineError::Conflict(msg) => write!(f, "conflict: {msg}"),
            EngineError::NotFound(what) => write!(f, "not found: {what}"),
            EngineError::Expired { expires_at } => {
                write!(f, "gallery expired on {}", expires_at.format("%Y-%m-%d"))
            }
            EngineError::Email(msg) => write!(f, "email dispatch failed: {msg}"),
            EngineError::Unavailable(msg) => write!(f, "temporarily unavailable: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<crate::store::StoreError> for EngineError {
    fn from(e: crate::store::StoreError) -> Self {
        EngineError::Unavailable(e.to_string())
    }
}
