mod alias_pool;
mod client_core;
mod stream;

pub(crate) use client_core::ClientCore;
pub use stream::Stream;

use crate::conn::web_socket::{TransportHandler, WebSocket};
use crate::conn::{ConnectionConfiguration, IntoConnectParams};
use crate::consumer::{
    Consumer, ConsumerCore, ListConsumer, LoadConsumer, QueryConsumer, SyncConsumer,
};
use crate::protocol::request;
use crate::{DrivelineError, DrivelineResult, QueryOptions, Record, StoreOptions, StreamId};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The connection object that interacts with Driveline.
///
/// A client multiplexes any number of concurrent operations over one
/// WebSocket connection and survives transient disconnects; see the crate
/// docs for the overall model. Clones share the same session.
///
/// Blocking operations take a [`CancellationToken`]; cancelling it makes
/// the operation return [`Cancelled`](DrivelineError::Cancelled) and sends
/// a best-effort cancel to the server.
#[derive(Clone, Debug)]
pub struct Client {
    core: Arc<ClientCore>,
}

impl Client {
    /// Connects to the given endpoint with the default configuration.
    ///
    /// Accepted URL schemes are `ws`, `wss`, `http`, and `https`.
    ///
    /// ```rust,no_run
    /// # tokio_test::block_on(async {
    /// use driveline::Client;
    /// let client = Client::new("ws://localhost:8080").await.unwrap();
    /// # })
    /// ```
    pub async fn new<P: IntoConnectParams>(p: P) -> DrivelineResult<Self> {
        Self::with_configuration(p, &ConnectionConfiguration::default()).await
    }

    /// Connects to the given endpoint with the given configuration.
    pub async fn with_configuration<P: IntoConnectParams>(
        p: P,
        config: &ConnectionConfiguration,
    ) -> DrivelineResult<Self> {
        let params = p.into_connect_params()?;
        let core = ClientCore::new(config);
        let handler: Arc<dyn TransportHandler> = core.clone() as Arc<dyn TransportHandler>;
        let web_socket = WebSocket::open(params, config, handler).await?;
        core.attach_transport(web_socket);
        Ok(Self { core })
    }

    /// Closes the session. Every still-pending operation fails with
    /// [`Closed`](DrivelineError::Closed). Idempotent.
    pub fn close(&self) {
        self.core.close();
    }

    /// Creates a [`Stream`] handle, defining a one-byte alias for the
    /// stream name when one is available.
    pub async fn open_stream(&self, name: &str) -> DrivelineResult<Stream> {
        let stream_id = self.core.allocate_alias(name);
        if let StreamId::Numeric(alias) = stream_id {
            if let Err(e) = self.core.send(request::define(alias, name)).await {
                self.core.release_alias(&stream_id);
                return Err(e);
            }
        }
        Ok(Stream::new(Arc::clone(&self.core), stream_id, name))
    }

    /// Releases a [`Stream`] handle and its alias. Equivalent to dropping
    /// the handle.
    pub fn close_stream(&self, stream: Stream) {
        drop(stream);
    }

    /// Adds a record to a stream. Fire-and-forget at the wire; the record
    /// is buffered by the transport and an error means "cannot send".
    pub async fn append(&self, stream: &str, record: &[u8]) -> DrivelineResult<()> {
        self.core.send(request::append_by_name(stream, record)).await
    }

    /// Writes data to the key-value store.
    pub async fn store(&self, key: &str, record: &[u8]) -> DrivelineResult<()> {
        self.store_with_options(key, record, &StoreOptions::new())
            .await
    }

    /// Writes data to the key-value store, with TTL and/or CAS applied.
    pub async fn store_with_options(
        &self,
        key: &str,
        record: &[u8],
        options: &StoreOptions,
    ) -> DrivelineResult<()> {
        self.core.send(request::store(key, record, options)).await
    }

    /// Reads one record from the key-value store.
    pub async fn load(&self, cancel: &CancellationToken, key: &str) -> DrivelineResult<Record> {
        let consumer = Arc::new(LoadConsumer::new(self.consumer_core(), key));
        self.core
            .run_consumer(cancel, Arc::clone(&consumer) as Arc<dyn Consumer>)
            .await?;
        consumer
            .take_record()
            .ok_or(DrivelineError::InvalidServerMessage)
    }

    /// Deletes a key from the key-value store.
    pub async fn remove(&self, key: &str) -> DrivelineResult<()> {
        self.core.send(request::remove(key)).await
    }

    /// Deletes all keys matching the pattern from the key-value store.
    pub async fn remove_matches(&self, pattern: &str) -> DrivelineResult<()> {
        self.core.send(request::remove_matches(pattern)).await
    }

    /// Runs a one-shot query against a stream or the key-value store.
    /// The handler receives every matching record; the call returns once
    /// the server signals the end of the results.
    pub async fn query<H>(
        &self,
        cancel: &CancellationToken,
        dql: &str,
        handler: H,
    ) -> DrivelineResult<()>
    where
        H: FnMut(Record) + Send + 'static,
    {
        self.query_with_options(cancel, dql, &QueryOptions::new(), handler)
            .await
    }

    /// Runs a one-shot query with explicit [`QueryOptions`].
    pub async fn query_with_options<H>(
        &self,
        cancel: &CancellationToken,
        dql: &str,
        options: &QueryOptions,
        handler: H,
    ) -> DrivelineResult<()>
    where
        H: FnMut(Record) + Send + 'static,
    {
        self.run_query(cancel, dql, false, options, Box::new(handler))
            .await
    }

    /// Runs a streaming query; the handler is invoked for every record
    /// until the token is cancelled or the operation fails.
    pub async fn continuous_query<H>(
        &self,
        cancel: &CancellationToken,
        dql: &str,
        handler: H,
    ) -> DrivelineResult<()>
    where
        H: FnMut(Record) + Send + 'static,
    {
        self.continuous_query_with_options(cancel, dql, &QueryOptions::new(), handler)
            .await
    }

    /// Runs a streaming query with explicit [`QueryOptions`], e.g. the
    /// record to start from.
    pub async fn continuous_query_with_options<H>(
        &self,
        cancel: &CancellationToken,
        dql: &str,
        options: &QueryOptions,
        handler: H,
    ) -> DrivelineResult<()>
    where
        H: FnMut(Record) + Send + 'static,
    {
        self.run_query(cancel, dql, true, options, Box::new(handler))
            .await
    }

    /// Iterates all streams matching the pattern. Returns once the
    /// listing is complete.
    pub async fn list_streams<H>(
        &self,
        cancel: &CancellationToken,
        pattern: &str,
        handler: H,
    ) -> DrivelineResult<()>
    where
        H: FnMut(String) + Send + 'static,
    {
        self.run_list(cancel, true, pattern, Box::new(handler)).await
    }

    /// Iterates all keys matching the pattern. Returns once the listing
    /// is complete.
    pub async fn list_keys<H>(
        &self,
        cancel: &CancellationToken,
        pattern: &str,
        handler: H,
    ) -> DrivelineResult<()>
    where
        H: FnMut(String) + Send + 'static,
    {
        self.run_list(cancel, false, pattern, Box::new(handler)).await
    }

    /// Executes a sync cycle with the server: returns once every command
    /// submitted before it has been processed.
    pub async fn sync(&self, cancel: &CancellationToken) -> DrivelineResult<()> {
        let consumer = Arc::new(SyncConsumer::new(self.consumer_core()));
        self.core.run_consumer(cancel, consumer).await
    }

    /// Removes all records of the named stream.
    pub async fn truncate(&self, stream: &str) -> DrivelineResult<()> {
        self.core.send(request::truncate_by_name(stream)).await
    }

    fn consumer_core(&self) -> ConsumerCore {
        ConsumerCore::new(&self.core, self.core.next_consumer_id())
    }

    async fn run_query(
        &self,
        cancel: &CancellationToken,
        dql: &str,
        continuous: bool,
        options: &QueryOptions,
        handler: crate::consumer::RecordHandler,
    ) -> DrivelineResult<()> {
        let consumer = Arc::new(QueryConsumer::new(
            self.consumer_core(),
            dql,
            continuous,
            options.clone(),
            handler,
        ));
        self.core.run_consumer(cancel, consumer).await
    }

    async fn run_list(
        &self,
        cancel: &CancellationToken,
        streams: bool,
        pattern: &str,
        handler: crate::consumer::EntryHandler,
    ) -> DrivelineResult<()> {
        let consumer = Arc::new(ListConsumer::new(
            self.consumer_core(),
            streams,
            pattern,
            handler,
        ));
        self.core.run_consumer(cancel, consumer).await
    }
}
