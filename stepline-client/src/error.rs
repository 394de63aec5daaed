//! Errors raised talking to the content store and the compute manager

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The manager could not be reached or the connection dropped
    #[error("Could not reach the compute manager: {0}")]
    Transport(#[from] reqwest::Error),

    /// The manager answered with a non-success status
    #[error("Manager rejected the call (status {status}): {message}")]
    Rejected { status: u16, message: String },

    /// A body or stored document could not be decoded
    #[error("Malformed payload: {0}")]
    Malformed(String),

    /// A payload could not be encoded before upload
    #[error("Could not encode payload: {0}")]
    Encode(String),

    /// The named folder, blob or session does not exist
    #[error("{0} does not exist")]
    NotFound(String),

    /// Refused locally, nothing was sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    /// True for a missing blob, folder or session
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Rejected { status: 404, .. })
    }

    /// True when the folder or directory being created already exists
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Rejected { status: 409, .. })
    }
}
