use crate::workflow::{Action, Status};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("validation failed: {message}")]
    Validation { message: String },
    #[error("user '{user}' is not authorized to {action}")]
    Unauthorized { user: String, action: String },
    #[error("cannot apply '{action}' from status '{from}'")]
    InvalidTransition { from: Status, action: Action },
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },
    #[error("e-signature credential rejected")]
    CredentialMismatch,
    #[error("'{action}' requires a confirmed e-signature")]
    SignatureRequired { action: Action },
    #[error("storage failure: {0}")]
    Storage(String),
    #[error("assist collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }
}

impl From<sled::Error> for Error {
    fn from(err: sled::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
