//! Error types for people-search

use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid backend address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("No backend addresses configured")]
    NoNodes,

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Backend responded with {status}: {body}")]
    Backend { status: StatusCode, body: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn invalid_address(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidAddress {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Status reported by the backend, if the error came from an HTTP answer
    pub fn backend_status(&self) -> Option<StatusCode> {
        match self {
            Error::Backend { status, .. } => Some(*status),
            _ => None,
        }
    }
}
