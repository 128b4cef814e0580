/// Retry driver: the attempt loop behind every cursor
///
/// Opens a streaming attempt, feeds its responses through a
/// [`ChunkReassembler`], and on a transient failure asks the
/// [`ResumePlanner`] for a narrowed request before trying again. The driver
/// is the only owner of the read's [`ReadState`]; a row is recorded there
/// when it is handed to the consumer, not when it is parsed.
///
/// The stream is only read when every reassembled row has been taken, so a
/// consumer that stops pulling stops the transport too.
use crate::cancel::CancelHandle;
use crate::convert;
use crate::error::{ClientError, Result};
use crate::request::ReadParams;
use crate::retry::{BackoffPolicy, RetryPolicy};
use crate::transport::{ReadRowsStream, ReadRowsTransport, StreamEvent};
use futures::Stream;
use rowscan_core::{ChunkReassembler, ReadState, ResumePlan, ResumePlanner, Row, RowKey, RowSet};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tonic::Status;
use tracing::{debug, info, warn};

/// Observable driver state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Attempting,
    Retrying,
    Succeeded,
    Failed,
}

struct Attempt<S> {
    stream: S,
    reassembler: ChunkReassembler,
}

enum Phase<S> {
    Idle,
    Attempting(Attempt<S>),
    /// Waiting out a backoff delay before the next attempt
    Retrying(Duration),
    Succeeded,
    Failed,
}

/// Output of an attempt waiting to be handed to the consumer, in stream order
#[derive(Debug)]
enum Buffered {
    Row(Row),
    ScannedKey(RowKey),
    Failure(ClientError),
}

pub struct RetryDriver<T: ReadRowsTransport> {
    transport: Arc<T>,
    params: ReadParams,
    planner: ResumePlanner,
    state: ReadState,
    retry: Box<dyn RetryPolicy>,
    backoff: Box<dyn BackoffPolicy>,
    phase: Phase<T::Stream>,
    buffer: VecDeque<Buffered>,
    cancel: CancelHandle,
    attempts: u32,
}

impl<T: ReadRowsTransport> RetryDriver<T> {
    /// Create a driver for one read. The policies are owned by this read.
    pub fn new(
        transport: Arc<T>,
        params: ReadParams,
        row_set: RowSet,
        rows_limit: Option<u64>,
        retry: Box<dyn RetryPolicy>,
        backoff: Box<dyn BackoffPolicy>,
    ) -> Self {
        Self {
            transport,
            params,
            planner: ResumePlanner::new(row_set),
            state: ReadState::new(rows_limit),
            retry,
            backoff,
            phase: Phase::Idle,
            buffer: VecDeque::new(),
            cancel: CancelHandle::new(),
            attempts: 0,
        }
    }

    /// Handle that cancels this read from anywhere.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn read_state(&self) -> &ReadState {
        &self.state
    }

    /// Streaming attempts opened so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn rows_delivered(&self) -> u64 {
        self.state.rows_returned()
    }

    pub fn state(&self) -> DriverState {
        match self.phase {
            Phase::Idle => DriverState::Idle,
            Phase::Attempting(_) => DriverState::Attempting,
            Phase::Retrying(_) => DriverState::Retrying,
            Phase::Succeeded => DriverState::Succeeded,
            Phase::Failed => DriverState::Failed,
        }
    }

    /// Next row, or the terminal error, or `None` once the read is over.
    ///
    /// After `None` or an error every further call returns `None`.
    pub async fn next(&mut self) -> Option<Result<Row>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                match item {
                    Buffered::Row(row) => {
                        if self.state.limit_satisfied() {
                            debug!(row_key = %row.key(), "dropping row past the row limit");
                            continue;
                        }
                        self.state.record_row(row.key());
                        return Some(Ok(row));
                    }
                    Buffered::ScannedKey(key) => {
                        self.state.record_scanned(key);
                        continue;
                    }
                    Buffered::Failure(err) => return Some(Err(err)),
                }
            }

            match std::mem::replace(&mut self.phase, Phase::Idle) {
                Phase::Succeeded => {
                    self.phase = Phase::Succeeded;
                    return None;
                }
                Phase::Failed => {
                    self.phase = Phase::Failed;
                    return None;
                }
                Phase::Idle => self.start_attempt().await,
                Phase::Retrying(delay) => self.wait_backoff(delay).await,
                Phase::Attempting(attempt) => self.advance(attempt).await,
            }
        }
    }

    /// Turn the driver into a `Stream` of rows.
    pub fn into_stream(self) -> impl Stream<Item = Result<Row>>
    where
        T: 'static,
    {
        futures::stream::unfold(self, |mut driver| async move {
            let item = driver.next().await?;
            Some((item, driver))
        })
    }

    async fn start_attempt(&mut self) {
        if let Some(reason) = self.cancel.reason() {
            debug!("read cancelled before the next attempt");
            self.fail(ClientError::Cancelled(reason));
            return;
        }

        let (row_set, rows_limit) = match self.planner.plan(&self.state) {
            ResumePlan::Complete(completion) => {
                info!(
                    table = %self.params.table_name,
                    rows = self.state.rows_returned(),
                    attempts = self.attempts,
                    ?completion,
                    "read complete"
                );
                self.phase = Phase::Succeeded;
                return;
            }
            ResumePlan::Resume { row_set, rows_limit } => (row_set, rows_limit),
        };

        self.attempts += 1;
        debug!(
            table = %self.params.table_name,
            attempt = self.attempts,
            keys = row_set.row_keys().count(),
            ranges = row_set.row_ranges().len(),
            rows_limit = ?rows_limit,
            "opening read stream"
        );
        let request = convert::read_rows_request(&self.params, &row_set, rows_limit);
        match self.transport.open(request).await {
            Ok(stream) => {
                let reassembler =
                    ChunkReassembler::resume_after(self.state.last_returned_key().cloned());
                self.phase = Phase::Attempting(Attempt {
                    stream,
                    reassembler,
                });
            }
            Err(status) => self.on_attempt_failure(status),
        }
    }

    async fn wait_backoff(&mut self, delay: Duration) {
        let cancel = self.cancel.clone();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(delay) => {}
        }
        match self.cancel.reason() {
            Some(reason) => {
                debug!("read cancelled during backoff");
                self.fail(ClientError::Cancelled(reason));
            }
            None => self.phase = Phase::Idle,
        }
    }

    async fn advance(&mut self, mut attempt: Attempt<T::Stream>) {
        if let Some(reason) = self.cancel.reason() {
            let discarded = drain(&mut attempt.stream).await;
            debug!(discarded, "attempt drained after cancellation");
            self.fail(ClientError::Cancelled(reason));
            return;
        }
        if self.state.limit_satisfied() {
            let discarded = drain(&mut attempt.stream).await;
            info!(
                rows = self.state.rows_returned(),
                attempts = self.attempts,
                discarded,
                "row limit reached, read complete"
            );
            self.phase = Phase::Succeeded;
            return;
        }

        let cancel = self.cancel.clone();
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            event = attempt.stream.next() => Some(event),
        };

        match event {
            // Picked up at the top of the next round.
            None => self.phase = Phase::Attempting(attempt),
            Some(StreamEvent::Message(response)) => {
                let (chunks, scanned) = convert::proto_response_to_core(response);
                // Chunks after the row that fills the limit are never parsed.
                let wanted = self.state.remaining_limit().unwrap_or(u64::MAX);
                let mut parsed = 0u64;
                for chunk in chunks {
                    if parsed >= wanted {
                        debug!(attempt = self.attempts, "row limit filled, ignoring rest of response");
                        break;
                    }
                    if let Err(err) = attempt.reassembler.handle_chunk(chunk) {
                        warn!(
                            attempt = self.attempts,
                            error = %err,
                            "malformed read stream"
                        );
                        drain(&mut attempt.stream).await;
                        self.fail(err.into());
                        return;
                    }
                    if let Some(row) = attempt.reassembler.next_row() {
                        self.buffer.push_back(Buffered::Row(row));
                        parsed += 1;
                    }
                }
                if parsed >= wanted {
                    self.phase = Phase::Attempting(attempt);
                    return;
                }
                if let Some(key) = scanned {
                    attempt.reassembler.handle_scanned_key(key);
                }
                if let Some(key) = attempt.reassembler.take_last_scanned() {
                    self.buffer.push_back(Buffered::ScannedKey(key));
                }
                self.phase = Phase::Attempting(attempt);
            }
            Some(StreamEvent::End(Ok(()))) => {
                let limit_satisfied = self.state.limit_satisfied();
                match attempt
                    .reassembler
                    .handle_end_of_stream(true, limit_satisfied)
                {
                    Ok(()) => {
                        info!(
                            table = %self.params.table_name,
                            rows = self.state.rows_returned(),
                            attempts = self.attempts,
                            "read stream finished"
                        );
                        self.phase = Phase::Succeeded;
                    }
                    Err(err) => {
                        warn!(attempt = self.attempts, error = %err, "malformed read stream");
                        self.fail(err.into());
                    }
                }
            }
            // The transport error takes precedence over a partial row.
            Some(StreamEvent::End(Err(status))) => self.on_attempt_failure(status),
        }
    }

    fn on_attempt_failure(&mut self, status: Status) {
        if !self.retry.is_transient(&status) {
            warn!(
                attempt = self.attempts,
                code = ?status.code(),
                message = status.message(),
                "permanent read failure"
            );
            self.fail(ClientError::from(status));
            return;
        }

        if let ResumePlan::Complete(completion) = self.planner.plan(&self.state) {
            info!(
                attempt = self.attempts,
                code = ?status.code(),
                ?completion,
                "transient failure after the read was already complete"
            );
            self.phase = Phase::Succeeded;
            return;
        }

        self.retry.on_failure();
        if self.retry.is_exhausted() {
            warn!(
                attempts = self.attempts,
                code = ?status.code(),
                message = status.message(),
                "retry policy exhausted"
            );
            self.fail(ClientError::RetryPolicyExhausted {
                attempts: self.attempts,
                source: Box::new(ClientError::from(status)),
            });
            return;
        }

        let delay = self.backoff.next_delay();
        warn!(
            attempt = self.attempts,
            code = ?status.code(),
            message = status.message(),
            delay_ms = delay.as_millis() as u64,
            "transient read failure, retrying"
        );
        self.phase = Phase::Retrying(delay);
    }

    fn fail(&mut self, err: ClientError) {
        self.buffer.push_back(Buffered::Failure(err));
        self.phase = Phase::Failed;
    }
}

/// Cancel an attempt and read it to its terminal status.
///
/// Returns the number of responses discarded.
async fn drain<S: ReadRowsStream>(stream: &mut S) -> usize {
    stream.cancel();
    let mut discarded = 0;
    loop {
        match stream.next().await {
            StreamEvent::Message(_) => discarded += 1,
            StreamEvent::End(_) => return discarded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CancelReason;
    use crate::retry::{ExponentialBackoffPolicy, LimitedErrorCountRetryPolicy};
    use async_trait::async_trait;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use rowscan_proto as proto;
    use tonic::Code;

    enum Step {
        Respond(proto::ReadRowsResponse),
        Finish(Code),
    }

    #[derive(Default)]
    struct FakeTransport {
        attempts: Mutex<VecDeque<Vec<Step>>>,
        requests: Mutex<Vec<proto::ReadRowsRequest>>,
    }

    struct FakeStream {
        steps: VecDeque<Step>,
        cancelled: bool,
    }

    #[async_trait]
    impl ReadRowsTransport for FakeTransport {
        type Stream = FakeStream;

        async fn open(&self, request: proto::ReadRowsRequest) -> std::result::Result<FakeStream, Status> {
            self.requests.lock().push(request);
            let steps = self.attempts.lock().pop_front().unwrap_or_default();
            Ok(FakeStream {
                steps: steps.into(),
                cancelled: false,
            })
        }
    }

    #[async_trait]
    impl ReadRowsStream for FakeStream {
        async fn next(&mut self) -> StreamEvent {
            if self.cancelled {
                return StreamEvent::End(Err(Status::cancelled("cancelled")));
            }
            match self.steps.pop_front() {
                Some(Step::Respond(response)) => StreamEvent::Message(response),
                Some(Step::Finish(Code::Ok)) | None => StreamEvent::End(Ok(())),
                Some(Step::Finish(code)) => StreamEvent::End(Err(Status::new(code, "scripted"))),
            }
        }

        fn cancel(&mut self) {
            self.cancelled = true;
        }
    }

    fn row(key: &str) -> proto::CellChunk {
        proto::CellChunk {
            row_key: Bytes::from(key.to_string()),
            family_name: Some(proto::StringValue {
                value: "cf".to_string(),
            }),
            qualifier: Some(proto::BytesValue {
                value: Bytes::from_static(b"q"),
            }),
            value: Bytes::from_static(b"v"),
            row_status: Some(proto::cell_chunk::RowStatus::CommitRow(true)),
            ..Default::default()
        }
    }

    fn respond(keys: &[&str]) -> Step {
        Step::Respond(proto::ReadRowsResponse {
            chunks: keys.iter().map(|k| row(k)).collect(),
            last_scanned_row_key: Bytes::new(),
        })
    }

    fn driver(
        attempts: Vec<Vec<Step>>,
        row_set: RowSet,
        limit: Option<u64>,
        retries: u32,
    ) -> (RetryDriver<FakeTransport>, Arc<FakeTransport>) {
        driver_with_backoff(attempts, row_set, limit, retries, Duration::from_millis(1))
    }

    /// Driver whose backoff is a fixed `delay`
    fn driver_with_backoff(
        attempts: Vec<Vec<Step>>,
        row_set: RowSet,
        limit: Option<u64>,
        retries: u32,
        delay: Duration,
    ) -> (RetryDriver<FakeTransport>, Arc<FakeTransport>) {
        let transport = Arc::new(FakeTransport {
            attempts: Mutex::new(attempts.into()),
            requests: Mutex::new(Vec::new()),
        });
        let driver = RetryDriver::new(
            transport.clone(),
            ReadParams::new("t"),
            row_set,
            limit,
            Box::new(LimitedErrorCountRetryPolicy::new(retries)),
            Box::new(ExponentialBackoffPolicy::new(delay, delay, 1.0)),
        );
        (driver, transport)
    }

    async fn collect(driver: &mut RetryDriver<FakeTransport>) -> Vec<Result<Row>> {
        let mut out = Vec::new();
        while let Some(item) = driver.next().await {
            out.push(item);
        }
        out
    }

    #[tokio::test]
    async fn test_single_attempt_success() {
        let (mut driver, _) = driver(
            vec![vec![respond(&["a", "b"]), Step::Finish(Code::Ok)]],
            RowSet::all_rows(),
            None,
            0,
        );
        let rows = collect(&mut driver).await;
        assert_eq!(rows.len(), 2);
        assert_eq!(driver.state(), DriverState::Succeeded);
        assert_eq!(driver.attempts(), 1);
        assert_eq!(driver.rows_delivered(), 2);
        assert!(driver.next().await.is_none());
    }

    #[tokio::test]
    async fn test_resumes_after_last_delivered_row() {
        let (mut driver, transport) = driver(
            vec![
                vec![respond(&["a"]), Step::Finish(Code::Unavailable)],
                vec![respond(&["b"]), Step::Finish(Code::Ok)],
            ],
            RowSet::from_keys(["a", "b"]),
            None,
            3,
        );
        let rows: Vec<_> = collect(&mut driver)
            .await
            .into_iter()
            .map(|r| r.unwrap().key().clone())
            .collect();
        assert_eq!(rows, vec![RowKey::from("a"), RowKey::from("b")]);

        let requests = transport.requests.lock();
        assert_eq!(requests.len(), 2);
        let resumed = convert::proto_row_set_to_core(requests[1].rows.clone());
        assert_eq!(resumed, RowSet::from_keys(["b"]));
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let (mut driver, transport) = driver(
            vec![vec![Step::Finish(Code::PermissionDenied)]],
            RowSet::all_rows(),
            None,
            5,
        );
        let items = collect(&mut driver).await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(ClientError::PermissionDenied(_))));
        assert_eq!(transport.requests.lock().len(), 1);
        assert_eq!(driver.state(), DriverState::Failed);
    }

    #[tokio::test]
    async fn test_exhausted_retries_annotate_last_error() {
        let (mut driver, _) = driver(
            vec![
                vec![Step::Finish(Code::Unavailable)],
                vec![Step::Finish(Code::Unavailable)],
            ],
            RowSet::all_rows(),
            None,
            1,
        );
        let items = collect(&mut driver).await;
        match &items[..] {
            [Err(ClientError::RetryPolicyExhausted { attempts, source })] => {
                assert_eq!(*attempts, 2);
                assert!(matches!(**source, ClientError::Unavailable(_)));
            }
            other => panic!("unexpected items: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let (mut driver, transport) = driver(vec![], RowSet::all_rows(), None, 0);
        driver.cancel();
        let items = collect(&mut driver).await;
        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0].as_ref().unwrap_err(),
            &ClientError::Cancelled(CancelReason::UserCancelled)
        );
        assert!(transport.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_limit_closes_the_attempt_early() {
        let (mut driver, _) = driver(
            vec![vec![respond(&["a"]), respond(&["b"]), Step::Finish(Code::Ok)]],
            RowSet::all_rows(),
            Some(1),
            0,
        );
        let items = collect(&mut driver).await;
        assert_eq!(items.len(), 1);
        assert_eq!(driver.state(), DriverState::Succeeded);
    }

    #[tokio::test]
    async fn test_empty_row_set_opens_nothing() {
        let (mut driver, transport) = driver(vec![], RowSet::none(), None, 0);
        assert!(driver.next().await.is_none());
        assert_eq!(driver.attempts(), 0);
        assert!(transport.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_into_stream() {
        use futures::StreamExt;

        let (driver, _) = driver(
            vec![vec![respond(&["a", "b", "c"]), Step::Finish(Code::Ok)]],
            RowSet::all_rows(),
            None,
            0,
        );
        let keys: Vec<_> = driver
            .into_stream()
            .map(|r| r.unwrap().key().to_string())
            .collect()
            .await;
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_delay_is_waited_between_attempts() {
        let (mut driver, transport) = driver_with_backoff(
            vec![
                vec![Step::Finish(Code::Unavailable)],
                vec![respond(&["a"]), Step::Finish(Code::Ok)],
            ],
            RowSet::all_rows(),
            None,
            3,
            Duration::from_secs(30),
        );
        let started = tokio::time::Instant::now();
        let items = collect(&mut driver).await;

        assert_eq!(items.len(), 1);
        assert!(items[0].is_ok());
        assert_eq!(driver.attempts(), 2);
        assert_eq!(transport.requests.lock().len(), 2);
        assert!(started.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_opens_no_new_attempt() {
        let (mut driver, transport) = driver_with_backoff(
            vec![
                vec![Step::Finish(Code::Unavailable)],
                vec![respond(&["a"]), Step::Finish(Code::Ok)],
            ],
            RowSet::all_rows(),
            None,
            3,
            Duration::from_secs(600),
        );
        let handle = driver.cancel_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            handle.cancel();
        });

        let started = tokio::time::Instant::now();
        let items = collect(&mut driver).await;

        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0].as_ref().unwrap_err(),
            &ClientError::Cancelled(CancelReason::UserCancelled)
        );
        assert_eq!(driver.attempts(), 1);
        assert_eq!(transport.requests.lock().len(), 1);
        assert_eq!(driver.state(), DriverState::Failed);
        assert!(started.elapsed() < Duration::from_secs(600));
    }

    #[tokio::test]
    async fn test_chunks_past_the_limit_are_not_parsed() {
        // The second row is out of order, but the limit is filled first.
        let (mut driver, _) = driver(
            vec![vec![respond(&["r2", "r1"]), Step::Finish(Code::Ok)]],
            RowSet::all_rows(),
            Some(1),
            0,
        );
        let items = collect(&mut driver).await;

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap().key(), &RowKey::from("r2"));
        assert_eq!(driver.state(), DriverState::Succeeded);
    }
}
