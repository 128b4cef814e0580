/// Transport seam between the retry driver and the streaming RPC
use async_trait::async_trait;
use rowscan_proto::{self as proto, BigtableClient};
use std::time::Duration;
use tonic::codec::Streaming;
use tonic::transport::Channel;
use tonic::Status;
use tracing::trace;

/// One step of a response stream
#[derive(Debug)]
pub enum StreamEvent {
    Message(proto::ReadRowsResponse),
    /// Terminal status of the attempt; nothing follows it
    End(Result<(), Status>),
}

/// Opens streaming read attempts.
#[async_trait]
pub trait ReadRowsTransport: Send + Sync {
    type Stream: ReadRowsStream + 'static;

    async fn open(&self, request: proto::ReadRowsRequest) -> Result<Self::Stream, Status>;
}

/// A live attempt.
///
/// After [`cancel`](ReadRowsStream::cancel) the stream still has to be read
/// until it reports [`StreamEvent::End`].
#[async_trait]
pub trait ReadRowsStream: Send {
    async fn next(&mut self) -> StreamEvent;

    fn cancel(&mut self);
}

/// Transport over a tonic channel
#[derive(Debug, Clone)]
pub struct GrpcTransport {
    client: BigtableClient<Channel>,
    attempt_timeout: Option<Duration>,
}

impl GrpcTransport {
    pub fn new(channel: Channel) -> Self {
        Self {
            client: BigtableClient::new(channel),
            attempt_timeout: None,
        }
    }

    /// Deadline applied to every attempt
    pub fn with_attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout = timeout;
        self
    }
}

#[async_trait]
impl ReadRowsTransport for GrpcTransport {
    type Stream = GrpcStream;

    async fn open(&self, request: proto::ReadRowsRequest) -> Result<GrpcStream, Status> {
        let mut client = self.client.clone();
        let mut request = tonic::Request::new(request);
        if let Some(timeout) = self.attempt_timeout {
            request.set_timeout(timeout);
        }
        let response = client.read_rows(request).await?;
        Ok(GrpcStream::new(response.into_inner()))
    }
}

/// Response stream of one gRPC attempt
pub struct GrpcStream {
    inner: Option<Streaming<proto::ReadRowsResponse>>,
    cancelled: bool,
}

impl GrpcStream {
    fn new(inner: Streaming<proto::ReadRowsResponse>) -> Self {
        Self {
            inner: Some(inner),
            cancelled: false,
        }
    }
}

#[async_trait]
impl ReadRowsStream for GrpcStream {
    async fn next(&mut self) -> StreamEvent {
        let Some(stream) = self.inner.as_mut() else {
            if self.cancelled {
                return StreamEvent::End(Err(Status::cancelled("read cancelled by the client")));
            }
            return StreamEvent::End(Ok(()));
        };
        match stream.message().await {
            Ok(Some(response)) => StreamEvent::Message(response),
            Ok(None) => {
                self.inner = None;
                StreamEvent::End(Ok(()))
            }
            Err(status) => {
                self.inner = None;
                StreamEvent::End(Err(status))
            }
        }
    }

    fn cancel(&mut self) {
        // Dropping the body resets the HTTP/2 stream.
        if self.inner.take().is_some() {
            trace!("resetting read stream");
            self.cancelled = true;
        }
    }
}
