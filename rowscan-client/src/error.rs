/// Error types for the Rowscan client
use std::fmt;
use thiserror::Error;
use tonic::Status;

/// Why a read was cancelled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelReason {
    /// The application called `cancel()`
    UserCancelled,
    /// The row callback acknowledged a row with `false`
    ConsumerDeclined,
    /// The row callback's acknowledgement failed
    AcknowledgementFailed(String),
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::UserCancelled => write!(f, "call cancelled by the application"),
            CancelReason::ConsumerDeclined => {
                write!(f, "row consumer declined to continue the read")
            }
            CancelReason::AcknowledgementFailed(msg) => {
                write!(f, "row acknowledgement failed: {}", msg)
            }
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Server unavailable: {0}")]
    Unavailable(String),

    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Data loss: {0}")]
    DataLoss(String),

    #[error("Aborted: {0}")]
    Aborted(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Cancelled by server: {0}")]
    ServerCancelled(String),

    #[error("Unknown error: {0}")]
    Unknown(String),

    /// The response stream violated the chunk protocol. Never retried.
    #[error("Malformed stream: {0}")]
    MalformedStream(String),

    /// The read was cancelled on the client side.
    #[error("Read cancelled: {0}")]
    Cancelled(CancelReason),

    /// A transient error persisted past the retry budget.
    #[error("Retry policy exhausted after {attempts} attempts: {source}")]
    RetryPolicyExhausted {
        attempts: u32,
        source: Box<ClientError>,
    },

    /// The runtime backing a blocking cursor could not be started.
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl ClientError {
    /// Returns a stable error code for this error variant.
    pub fn code(&self) -> &'static str {
        match self {
            ClientError::NotFound(_) => "NOT_FOUND",
            ClientError::InvalidArgument(_) => "INVALID_ARGUMENT",
            ClientError::FailedPrecondition(_) => "FAILED_PRECONDITION",
            ClientError::ConnectionError(_) => "CONNECTION_ERROR",
            ClientError::Unavailable(_) => "UNAVAILABLE",
            ClientError::Timeout(_) => "DEADLINE_EXCEEDED",
            ClientError::InternalError(_) => "INTERNAL",
            ClientError::DataLoss(_) => "DATA_LOSS",
            ClientError::Aborted(_) => "ABORTED",
            ClientError::AlreadyExists(_) => "ALREADY_EXISTS",
            ClientError::ResourceExhausted(_) => "RESOURCE_EXHAUSTED",
            ClientError::Unimplemented(_) => "UNIMPLEMENTED",
            ClientError::PermissionDenied(_) => "PERMISSION_DENIED",
            ClientError::Unauthenticated(_) => "UNAUTHENTICATED",
            ClientError::ServerCancelled(_) => "SERVER_CANCELLED",
            ClientError::Unknown(_) => "UNKNOWN",
            ClientError::MalformedStream(_) => "MALFORMED_STREAM",
            ClientError::Cancelled(_) => "CANCELLED",
            ClientError::RetryPolicyExhausted { .. } => "RETRY_POLICY_EXHAUSTED",
            ClientError::Runtime(_) => "RUNTIME_ERROR",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled(_))
    }

    pub fn is_malformed_stream(&self) -> bool {
        matches!(self, ClientError::MalformedStream(_))
    }

    /// The underlying error, looking through retry exhaustion.
    pub fn root(&self) -> &ClientError {
        match self {
            ClientError::RetryPolicyExhausted { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Convert gRPC Status to ClientError
impl From<Status> for ClientError {
    fn from(status: Status) -> Self {
        ClientError::from(&status)
    }
}

impl From<&Status> for ClientError {
    fn from(status: &Status) -> Self {
        let msg = status.message().to_string();

        match status.code() {
            tonic::Code::NotFound => ClientError::NotFound(msg),
            tonic::Code::InvalidArgument => ClientError::InvalidArgument(msg),
            tonic::Code::FailedPrecondition => ClientError::FailedPrecondition(msg),
            tonic::Code::Unavailable => ClientError::Unavailable(msg),
            tonic::Code::DeadlineExceeded => ClientError::Timeout(msg),
            tonic::Code::Internal => ClientError::InternalError(msg),
            tonic::Code::DataLoss => ClientError::DataLoss(msg),
            tonic::Code::Aborted => ClientError::Aborted(msg),
            tonic::Code::AlreadyExists => ClientError::AlreadyExists(msg),
            tonic::Code::ResourceExhausted => ClientError::ResourceExhausted(msg),
            tonic::Code::Unimplemented => ClientError::Unimplemented(msg),
            tonic::Code::PermissionDenied => ClientError::PermissionDenied(msg),
            tonic::Code::Unauthenticated => ClientError::Unauthenticated(msg),
            tonic::Code::Cancelled => ClientError::ServerCancelled(msg),
            _ => ClientError::Unknown(msg),
        }
    }
}

impl From<rowscan_core::Error> for ClientError {
    fn from(err: rowscan_core::Error) -> Self {
        match err {
            rowscan_core::Error::MalformedStream(msg) => ClientError::MalformedStream(msg),
            rowscan_core::Error::InvalidArgument(msg) => ClientError::InvalidArgument(msg),
            rowscan_core::Error::Internal(msg) => ClientError::MalformedStream(msg),
        }
    }
}

impl From<tonic::transport::Error> for ClientError {
    fn from(err: tonic::transport::Error) -> Self {
        ClientError::ConnectionError(err.to_string())
    }
}
