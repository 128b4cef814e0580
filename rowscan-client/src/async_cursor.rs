/// Push-style cursor with per-row acknowledgement
///
/// The delivery task hands one row to the application callback and waits for
/// its acknowledgement before pulling anything else from the driver. An
/// acknowledgement that is already resolved when first polled counts as
/// synchronous; after `max_sync_deliveries` of those in a row the task yields
/// to the scheduler, so a long stream of instant acknowledgements never
/// starves other tasks.
use crate::cancel::CancelHandle;
use crate::driver::RetryDriver;
use crate::error::{CancelReason, ClientError, Result};
use crate::transport::ReadRowsTransport;
use futures::FutureExt;
use rowscan_core::Row;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::task::Poll;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Final report of an async read, passed to the completion callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOutcome {
    pub status: Result<()>,
    pub rows_delivered: u64,
    /// Times the delivery task yielded after a run of synchronous acknowledgements
    pub scheduler_yields: u64,
    pub attempts: u32,
}

impl ReadOutcome {
    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }
}

/// Handle to a running async read
pub struct AsyncCursor {
    cancel: CancelHandle,
    task: JoinHandle<ReadOutcome>,
}

impl AsyncCursor {
    /// Start delivering rows on the current tokio runtime.
    ///
    /// `on_row` returns the acknowledgement: `Ok(true)` asks for the next
    /// row, `Ok(false)` stops the read, and an error stops it as well. Either
    /// way the read ends with a cancellation status naming the cause.
    /// A panic while producing the acknowledgement counts as a failed one.
    /// `on_finish` runs exactly once with the outcome.
    pub fn start<T, F, Fut, D>(
        driver: RetryDriver<T>,
        on_row: F,
        on_finish: D,
        max_sync_deliveries: usize,
    ) -> Self
    where
        T: ReadRowsTransport + 'static,
        F: FnMut(Row) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
        D: FnOnce(ReadOutcome) + Send + 'static,
    {
        let cancel = driver.cancel_handle();
        let task = tokio::spawn(async move {
            let outcome = deliver(driver, on_row, max_sync_deliveries.max(1)).await;
            on_finish(outcome.clone());
            outcome
        });
        Self { cancel, task }
    }

    /// Cancel the read; the completion callback reports the cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the read to finish.
    pub async fn join(self) -> Result<ReadOutcome> {
        self.task
            .await
            .map_err(|e| ClientError::Runtime(format!("Delivery task failed: {}", e)))
    }
}

async fn deliver<T, F, Fut>(
    mut driver: RetryDriver<T>,
    mut on_row: F,
    max_sync_deliveries: usize,
) -> ReadOutcome
where
    T: ReadRowsTransport,
    F: FnMut(Row) -> Fut,
    Fut: Future<Output = anyhow::Result<bool>> + Send,
{
    let cancel = driver.cancel_handle();
    let mut rows_delivered = 0u64;
    let mut scheduler_yields = 0u64;
    let mut sync_streak = 0usize;
    // Set once the consumer has asked to stop; remaining rows are dropped.
    let mut stopped = false;

    let status = loop {
        match driver.next().await {
            None if stopped => {
                let reason = cancel.reason().unwrap_or(CancelReason::UserCancelled);
                break Err(ClientError::Cancelled(reason));
            }
            None => break Ok(()),
            Some(Err(err)) => break Err(err),
            Some(Ok(row)) => {
                if stopped {
                    trace!(row_key = %row.key(), "dropping row after the consumer stopped");
                    continue;
                }
                rows_delivered += 1;

                // A panic in the callback or its future fails the acknowledgement.
                let mut ack = match std::panic::catch_unwind(AssertUnwindSafe(|| on_row(row))) {
                    Ok(fut) => AssertUnwindSafe(fut).catch_unwind().boxed(),
                    Err(payload) => futures::future::ready(Err(payload)).boxed(),
                };
                let ack = match futures::poll!(ack.as_mut()) {
                    Poll::Ready(ack) => {
                        sync_streak += 1;
                        ack
                    }
                    Poll::Pending => {
                        sync_streak = 0;
                        ack.await
                    }
                };
                let ack = ack.unwrap_or_else(|payload| {
                    Err(anyhow::anyhow!("row callback panicked: {}", panic_message(&*payload)))
                });

                match ack {
                    Ok(true) => {}
                    Ok(false) => {
                        debug!(rows_delivered, "row consumer declined further rows");
                        cancel.cancel_with(CancelReason::ConsumerDeclined);
                        stopped = true;
                    }
                    Err(e) => {
                        debug!(rows_delivered, error = %e, "row acknowledgement failed");
                        cancel.cancel_with(CancelReason::AcknowledgementFailed(format!("{:#}", e)));
                        stopped = true;
                    }
                }

                if sync_streak >= max_sync_deliveries {
                    trace!(sync_streak, "yielding after synchronous acknowledgements");
                    tokio::task::yield_now().await;
                    scheduler_yields += 1;
                    sync_streak = 0;
                }
            }
        }
    };

    ReadOutcome {
        status,
        rows_delivered,
        scheduler_yields,
        attempts: driver.attempts(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "non-string panic payload"
    }
}
