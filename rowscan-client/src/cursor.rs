/// Blocking pull-style cursor
use crate::cancel::CancelHandle;
use crate::driver::RetryDriver;
use crate::error::{ClientError, Result};
use crate::transport::ReadRowsTransport;
use rowscan_core::Row;
use std::iter::FusedIterator;
use tokio::runtime::{Builder, Handle, Runtime};

/// Iterator over the rows of one read.
///
/// Each item is a row or the terminal error; the iterator ends after the
/// error. Pulling blocks the calling thread. Pulled from inside an async
/// runtime, the cursor yields a single [`ClientError::Runtime`] and ends.
///
/// # Example
/// ```no_run
/// # use rowscan_client::{Client, ReadRows, ReadRowsConfig};
/// # use rowscan_client::transport::ReadRowsTransport;
/// fn print_keys<T: ReadRowsTransport>(client: &Client<T>) -> Result<(), Box<dyn std::error::Error>> {
///     let cursor = client.read_rows_blocking(ReadRows::new("projects/p/instances/i/tables/t"))?;
///     for row in cursor {
///         let row = row?;
///         println!("{}", row.key());
///     }
///     Ok(())
/// }
/// ```
pub struct SyncCursor<T: ReadRowsTransport> {
    driver: RetryDriver<T>,
    // Taken on drop
    runtime: Option<Runtime>,
    done: bool,
}

impl<T: ReadRowsTransport> SyncCursor<T> {
    pub fn new(driver: RetryDriver<T>) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ClientError::Runtime(format!("Failed to start cursor runtime: {}", e)))?;
        Ok(Self {
            driver,
            runtime: Some(runtime),
            done: false,
        })
    }

    /// Cancel the read.
    ///
    /// Rows already received are still returned; the current attempt is
    /// drained and the next item after them is the cancellation error.
    pub fn cancel(&self) {
        self.driver.cancel();
    }

    /// Handle for cancelling from another thread while this one is blocked.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.driver.cancel_handle()
    }

    pub fn driver(&self) -> &RetryDriver<T> {
        &self.driver
    }
}

impl<T: ReadRowsTransport> Iterator for SyncCursor<T> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if Handle::try_current().is_ok() {
            self.done = true;
            self.driver.cancel();
            return Some(Err(ClientError::Runtime(
                "blocking cursor pulled from inside an async runtime".to_string(),
            )));
        }
        let Self {
            driver,
            runtime: Some(runtime),
            ..
        } = self
        else {
            return None;
        };
        runtime.block_on(driver.next())
    }
}

impl<T: ReadRowsTransport> FusedIterator for SyncCursor<T> {}

impl<T: ReadRowsTransport> Drop for SyncCursor<T> {
    fn drop(&mut self) {
        // A runtime dropped inside another runtime's task panics.
        if let Some(runtime) = self.runtime.take() {
            if Handle::try_current().is_ok() {
                runtime.shutdown_background();
            }
        }
    }
}
