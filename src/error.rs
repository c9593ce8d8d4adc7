//! Errors surfaced by the chat service.
//!
//! Only client mistakes and storage write failures are errors. Unavailable
//! embedding or generation backends degrade instead (see [`crate::chat`]).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The request body was not valid JSON of the expected shape.
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("username already taken")]
    UsernameTaken,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl ChatError {
    /// Whether the caller, not the backend, is at fault.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
