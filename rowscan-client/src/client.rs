/// Rowscan client: entry point for streaming reads
use crate::async_cursor::{AsyncCursor, ReadOutcome};
use crate::config::ReadRowsConfig;
use crate::cursor::SyncCursor;
use crate::driver::RetryDriver;
use crate::error::{ClientError, Result};
use crate::request::ReadRows;
use crate::retry::{BackoffPolicy, RetryPolicy};
use crate::transport::{GrpcTransport, ReadRowsTransport};
use rowscan_core::{Row, RowKey};
use std::future::Future;
use std::sync::Arc;
use tonic::transport::Channel;
use tracing::debug;

/// Rowscan read client
pub struct Client<T: ReadRowsTransport = GrpcTransport> {
    transport: Arc<T>,
    config: ReadRowsConfig,
    retry: Box<dyn RetryPolicy>,
    backoff: Box<dyn BackoffPolicy>,
}

impl Client<GrpcTransport> {
    /// Connect to a server
    ///
    /// # Arguments
    /// * `addr` - Server address (e.g., "http://127.0.0.1:8086")
    /// * `config` - Retry, backoff and delivery settings
    ///
    /// # Example
    /// ```no_run
    /// # use rowscan_client::{Client, ReadRowsConfig};
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = Client::connect("http://localhost:8086", ReadRowsConfig::default()).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(addr: impl Into<String>, config: ReadRowsConfig) -> Result<Self> {
        let addr = addr.into();
        let channel = Channel::from_shared(addr)
            .map_err(|e| ClientError::ConnectionError(format!("Invalid address: {}", e)))?
            .connect()
            .await
            .map_err(|e| ClientError::ConnectionError(format!("Failed to connect: {}", e)))?;

        let transport = GrpcTransport::new(channel).with_attempt_timeout(config.attempt_timeout());
        Self::with_transport(transport, config)
    }
}

impl<T: ReadRowsTransport> Client<T> {
    /// Build a client over any transport.
    pub fn with_transport(transport: T, config: ReadRowsConfig) -> Result<Self> {
        config.validate().map_err(ClientError::InvalidArgument)?;
        Ok(Self {
            transport: Arc::new(transport),
            retry: config.retry_policy(),
            backoff: config.backoff_policy(),
            config,
        })
    }

    /// Replace the retry policy prototype; each read gets its own clone.
    pub fn with_retry_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.retry = Box::new(policy);
        self
    }

    /// Replace the backoff policy prototype; each read gets its own clone.
    pub fn with_backoff_policy(mut self, policy: impl BackoffPolicy + 'static) -> Self {
        self.backoff = Box::new(policy);
        self
    }

    pub fn config(&self) -> &ReadRowsConfig {
        &self.config
    }

    /// Start a read and return its driver.
    ///
    /// Nothing is sent until the driver is first polled.
    pub fn read_rows(&self, read: ReadRows) -> RetryDriver<T> {
        let (mut params, row_set, rows_limit) = read.into_parts();
        if params.app_profile_id.is_none() {
            params.app_profile_id = self.config.app_profile_id.clone();
        }
        debug!(table = %params.table_name, rows_limit = ?rows_limit, "starting read");
        RetryDriver::new(
            self.transport.clone(),
            params,
            row_set,
            rows_limit,
            self.retry.clone_box(),
            self.backoff.clone_box(),
        )
    }

    /// Start a read consumed by blocking iteration.
    pub fn read_rows_blocking(&self, read: ReadRows) -> Result<SyncCursor<T>> {
        SyncCursor::new(self.read_rows(read))
    }

    /// Start a read that pushes rows into `on_row` on the current runtime.
    ///
    /// # Example
    /// ```no_run
    /// # use rowscan_client::{Client, ReadRows, ReadRowsConfig};
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = Client::connect("http://localhost:8086", ReadRowsConfig::default()).await?;
    /// let cursor = client.read_rows_async(
    ///     ReadRows::new("projects/p/instances/i/tables/t").limit(10),
    ///     |row| async move {
    ///         println!("{}", row.key());
    ///         anyhow::Ok(true)
    ///     },
    ///     |outcome| println!("done: {:?}", outcome.status),
    /// );
    /// cursor.join().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn read_rows_async<F, Fut, D>(&self, read: ReadRows, on_row: F, on_finish: D) -> AsyncCursor
    where
        T: 'static,
        F: FnMut(Row) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
        D: FnOnce(ReadOutcome) + Send + 'static,
    {
        AsyncCursor::start(
            self.read_rows(read),
            on_row,
            on_finish,
            self.config.max_sync_deliveries,
        )
    }

    /// Read a single row, if it exists.
    pub async fn read_row(
        &self,
        table_name: impl Into<String>,
        key: impl Into<RowKey>,
    ) -> Result<Option<Row>> {
        let mut driver = self.read_rows(ReadRows::new(table_name).key(key).limit(1));
        let mut found = None;
        while let Some(row) = driver.next().await {
            let row = row?;
            found.get_or_insert(row);
        }
        Ok(found)
    }
}

impl<T: ReadRowsTransport> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            config: self.config.clone(),
            retry: self.retry.clone_box(),
            backoff: self.backoff.clone_box(),
        }
    }
}
