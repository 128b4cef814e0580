use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The server sent a chunk sequence that cannot be assembled into rows.
    #[error("Malformed stream: {0}")]
    MalformedStream(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A caller broke the reassembler's usage contract.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand used throughout the reassembler.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedStream(msg.into())
    }

    /// Returns a stable error code for this error variant.
    pub fn code(&self) -> &'static str {
        match self {
            Error::MalformedStream(_) => "MALFORMED_STREAM",
            Error::InvalidArgument(_) => "INVALID_ARGUMENT",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns true if this error is potentially retryable.
    ///
    /// None of the core errors are: a malformed stream says the server and
    /// client disagree on the protocol, and retrying would replay the same bytes.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::MalformedStream(_) => false,
            Error::InvalidArgument(_) => false,
            Error::Internal(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
