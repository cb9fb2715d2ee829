//! Error types for the DEX browser agent

use thiserror::Error;

use crate::browser::cdp::CdpError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Could not parse trade decision: {0}")]
    DecisionParse(String),

    #[error("Wallet handshake failed: {0}")]
    Handshake(String),

    #[error("Browser error: {0}")]
    Browser(#[from] CdpError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for every deadline-exceeded failure, including ones raised by the
    /// DevTools transport.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_) | Error::Browser(CdpError::Timeout(_)))
    }

    /// Failures a page reports while its document is being replaced, such as
    /// "Execution context was destroyed". Polling treats them as "not yet".
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Browser(CdpError::JavaScript(_)) | Error::Browser(CdpError::Protocol { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
