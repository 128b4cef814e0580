/// Rowscan Client Library
///
/// Resumable streaming reads over gRPC. A read is driven by a
/// [`RetryDriver`] that reopens the stream with a narrowed request after
/// transient failures, and is consumed either by blocking iteration
/// ([`SyncCursor`]) or by a row callback with acknowledgements
/// ([`AsyncCursor`]).

pub mod error;
pub mod request;
pub mod convert;
pub mod transport;
pub mod retry;
pub mod config;
pub mod cancel;
pub mod driver;
pub mod cursor;
pub mod async_cursor;
pub mod client;

// Re-export key types
pub use async_cursor::{AsyncCursor, ReadOutcome};
pub use cancel::CancelHandle;
pub use client::Client;
pub use config::ReadRowsConfig;
pub use cursor::SyncCursor;
pub use driver::{DriverState, RetryDriver};
pub use error::{CancelReason, ClientError, Result};
pub use request::{ReadParams, ReadRows};
pub use retry::{
    BackoffPolicy, ExponentialBackoffPolicy, LimitedErrorCountRetryPolicy,
    LimitedTimeRetryPolicy, RetryPolicy,
};
pub use rowscan_core::{Cell, Row, RowKey, RowRange, RowSet};
pub use transport::{GrpcTransport, ReadRowsStream, ReadRowsTransport, StreamEvent};
