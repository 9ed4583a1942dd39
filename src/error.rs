use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The HTTP request sequence a device API call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiStep {
    UploadProtocol,
    CreateRun,
    RunAction,
}

impl fmt::Display for ApiStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApiStep::UploadProtocol => "upload protocol",
            ApiStep::CreateRun => "create run",
            ApiStep::RunAction => "run action",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum FlexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{step} failed with HTTP status {status}: {body}")]
    Status {
        step: ApiStep,
        status: u16,
        body: String,
    },

    #[error("Malformed response to {step}: {reason}")]
    MalformedResponse { step: ApiStep, reason: String },

    #[error("Failed to load private key {}: {reason}", path.display())]
    KeyLoad { path: PathBuf, reason: String },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("SSH authentication failed for user {user}: {reason}")]
    Authentication { user: String, reason: String },

    #[error("Host key verification failed for {host}: {reason}")]
    HostKeyVerification { host: String, reason: String },

    #[error("Transfer error: {0}")]
    Transfer(String),

    #[error("Incomplete transfer: expected {expected} bytes, received {received}")]
    IncompleteTransfer { expected: u64, received: u64 },

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Error = FlexError;
pub type Result<T> = std::result::Result<T, Error>;
