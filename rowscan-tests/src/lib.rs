/// Test utilities and helpers for Rowscan testing
///
/// Provides in-memory transports that stand in for the gRPC server, chunk and
/// response builders, and tracing setup.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use rowscan_client::convert;
use rowscan_client::{
    Client, ReadRowsConfig, ReadRowsStream, ReadRowsTransport, StreamEvent,
};
use rowscan_core::{CellChunk, RowKey, RowSet};
use rowscan_proto as proto;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tonic::{Code, Status};

/// Install a test subscriber honoring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Config with instant backoff, for tests that retry
pub fn test_config(max_retries: u32) -> ReadRowsConfig {
    ReadRowsConfig::new()
        .with_max_retries(max_retries)
        .with_backoff(0, 0, 1.0)
}

// ---------------------------------------------------------------------------
// Chunk and response builders
// ---------------------------------------------------------------------------

/// Chunks of a committed row with one cell `cf:col = value`.
pub fn row_chunks(key: &str, value: &str) -> Vec<CellChunk> {
    vec![CellChunk::new()
        .row_key(key.to_string())
        .family("cf")
        .qualifier("col")
        .timestamp(1_000)
        .value(value.to_string())
        .commit()]
}

/// Chunks of a committed row whose single value is split over two chunks.
pub fn split_row_chunks(key: &str, value: &str) -> Vec<CellChunk> {
    let mid = value.len() / 2;
    vec![
        CellChunk::new()
            .row_key(key.to_string())
            .family("cf")
            .qualifier("col")
            .timestamp(1_000)
            .value(value[..mid].to_string())
            .split(value.len() as i32),
        CellChunk::new().value(value[mid..].to_string()).commit(),
    ]
}

pub fn response(chunks: Vec<CellChunk>) -> proto::ReadRowsResponse {
    proto::ReadRowsResponse {
        chunks: chunks.into_iter().map(convert::core_chunk_to_proto).collect(),
        last_scanned_row_key: Bytes::new(),
    }
}

/// One response carrying a committed row for each key.
pub fn rows_response(keys: &[&str]) -> proto::ReadRowsResponse {
    response(keys.iter().flat_map(|k| row_chunks(k, "value")).collect())
}

/// A response with no chunks, only a scanned-key hint.
pub fn scanned_response(key: &str) -> proto::ReadRowsResponse {
    with_scanned(response(Vec::new()), key)
}

pub fn with_scanned(mut response: proto::ReadRowsResponse, key: &str) -> proto::ReadRowsResponse {
    response.last_scanned_row_key = Bytes::from(key.to_string());
    response
}

/// Decode the row set an attempt asked for.
pub fn requested_rows(request: &proto::ReadRowsRequest) -> RowSet {
    convert::proto_row_set_to_core(request.rows.clone())
}

// ---------------------------------------------------------------------------
// Transports
// ---------------------------------------------------------------------------

/// One scripted stream step
#[derive(Debug, Clone)]
pub enum Step {
    Respond(proto::ReadRowsResponse),
    /// Terminal status; `Code::Ok` ends the stream cleanly
    Finish(Code, String),
}

impl Step {
    pub fn respond(response: proto::ReadRowsResponse) -> Self {
        Step::Respond(response)
    }

    pub fn ok() -> Self {
        Step::Finish(Code::Ok, String::new())
    }

    pub fn fail(code: Code) -> Self {
        Step::Finish(code, format!("scripted {:?}", code))
    }
}

/// What one call to `open` does
#[derive(Debug, Clone)]
pub enum Attempt {
    Stream(Vec<Step>),
    Reject(Code),
}

/// Counters shared by a transport and its streams
#[derive(Debug, Default)]
struct Log {
    requests: Vec<proto::ReadRowsRequest>,
    next_calls: usize,
    cancels: usize,
    finished: usize,
}

/// Transport that plays back a fixed script, one entry per attempt.
///
/// Once the script runs out, further attempts get an empty stream that
/// finishes cleanly.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<VecDeque<Attempt>>>,
    log: Arc<Mutex<Log>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Attempt>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            log: Arc::default(),
        }
    }

    /// A client over this transport. The transport stays inspectable.
    pub fn client(&self, config: ReadRowsConfig) -> Client<ScriptedTransport> {
        Client::with_transport(self.clone(), config).expect("valid test config")
    }

    pub fn requests(&self) -> Vec<proto::ReadRowsRequest> {
        self.log.lock().requests.clone()
    }

    pub fn opens(&self) -> usize {
        self.log.lock().requests.len()
    }

    /// Calls to `next` across all streams
    pub fn next_calls(&self) -> usize {
        self.log.lock().next_calls
    }

    pub fn cancels(&self) -> usize {
        self.log.lock().cancels
    }

    /// Streams that reported their terminal status
    pub fn finished_streams(&self) -> usize {
        self.log.lock().finished
    }
}

#[async_trait]
impl ReadRowsTransport for ScriptedTransport {
    type Stream = ScriptedStream;

    async fn open(&self, request: proto::ReadRowsRequest) -> Result<ScriptedStream, Status> {
        self.log.lock().requests.push(request);
        match self.script.lock().pop_front() {
            Some(Attempt::Reject(code)) => Err(Status::new(code, "scripted open failure")),
            Some(Attempt::Stream(steps)) => Ok(ScriptedStream::new(steps, self.log.clone())),
            None => Ok(ScriptedStream::new(Vec::new(), self.log.clone())),
        }
    }
}

pub struct ScriptedStream {
    steps: VecDeque<Step>,
    log: Arc<Mutex<Log>>,
    cancelled: bool,
    done: bool,
}

impl ScriptedStream {
    fn new(steps: Vec<Step>, log: Arc<Mutex<Log>>) -> Self {
        Self {
            steps: steps.into(),
            log,
            cancelled: false,
            done: false,
        }
    }

    fn finish(&mut self, result: Result<(), Status>) -> StreamEvent {
        if !self.done {
            self.done = true;
            self.log.lock().finished += 1;
        }
        StreamEvent::End(result)
    }
}

#[async_trait]
impl ReadRowsStream for ScriptedStream {
    async fn next(&mut self) -> StreamEvent {
        self.log.lock().next_calls += 1;
        if self.done {
            return StreamEvent::End(Ok(()));
        }
        if self.cancelled {
            self.steps.clear();
            return self.finish(Err(Status::cancelled("stream cancelled by client")));
        }
        match self.steps.pop_front() {
            Some(Step::Respond(response)) => StreamEvent::Message(response),
            Some(Step::Finish(Code::Ok, _)) | None => self.finish(Ok(())),
            Some(Step::Finish(code, message)) => self.finish(Err(Status::new(code, message))),
        }
    }

    fn cancel(&mut self) {
        if !self.cancelled && !self.done {
            self.cancelled = true;
            self.log.lock().cancels += 1;
        }
    }
}

/// Transport serving an in-memory table.
///
/// Each attempt honors the requested row set and row limit. An optional
/// failure schedule makes attempt `i` fail with `UNAVAILABLE` after serving
/// `schedule[i]` rows.
#[derive(Clone)]
pub struct TableTransport {
    rows: Arc<BTreeMap<RowKey, String>>,
    failures: Arc<Mutex<VecDeque<usize>>>,
    log: Arc<Mutex<Log>>,
}

impl TableTransport {
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<RowKey>,
    {
        let rows = keys
            .into_iter()
            .map(|k| {
                let key = k.into();
                let value = format!("value-of-{}", key);
                (key, value)
            })
            .collect();
        Self {
            rows: Arc::new(rows),
            failures: Arc::default(),
            log: Arc::default(),
        }
    }

    pub fn with_failures(self, schedule: Vec<usize>) -> Self {
        *self.failures.lock() = schedule.into();
        self
    }

    pub fn client(&self, config: ReadRowsConfig) -> Client<TableTransport> {
        Client::with_transport(self.clone(), config).expect("valid test config")
    }

    pub fn keys(&self) -> impl Iterator<Item = &RowKey> {
        self.rows.keys()
    }

    pub fn requests(&self) -> Vec<proto::ReadRowsRequest> {
        self.log.lock().requests.clone()
    }
}

#[async_trait]
impl ReadRowsTransport for TableTransport {
    type Stream = ScriptedStream;

    async fn open(&self, request: proto::ReadRowsRequest) -> Result<ScriptedStream, Status> {
        let wanted = requested_rows(&request);
        let limit = match request.rows_limit {
            n if n > 0 => n as usize,
            _ => usize::MAX,
        };
        self.log.lock().requests.push(request);

        let matching: Vec<(&RowKey, &String)> = self
            .rows
            .iter()
            .filter(|(key, _)| wanted.contains(key))
            .take(limit)
            .collect();
        let fail_after = self.failures.lock().pop_front();

        let mut steps = Vec::new();
        for (served, (key, value)) in matching.iter().enumerate() {
            if fail_after == Some(served) {
                steps.push(Step::fail(Code::Unavailable));
                return Ok(ScriptedStream::new(steps, self.log.clone()));
            }
            let key = key.to_string();
            steps.push(Step::respond(response(split_row_chunks(&key, value))));
        }
        steps.push(Step::ok());
        Ok(ScriptedStream::new(steps, self.log.clone()))
    }
}
