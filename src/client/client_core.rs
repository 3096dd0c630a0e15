use crate::client::alias_pool::AliasPool;
use crate::conn::web_socket::{TransportHandler, WebSocket};
use crate::conn::{ConnectionConfiguration, ErrorSink};
use crate::consumer::Consumer;
use crate::protocol::reply::{self, ReplyBody};
use crate::protocol::request;
use crate::{DrivelineError, DrivelineResult, StreamId};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;

/// The state a session owns: the transport, the alias pool, the consumer
/// registry, and the id counter. The registry is the single source of
/// truth for pending operations.
pub(crate) struct ClientCore {
    transport: OnceLock<WebSocket>,
    consumers: Mutex<HashMap<u64, Arc<dyn Consumer>>>,
    aliases: Mutex<AliasPool>,
    next_consumer_id: AtomicU64,
    error_handler: Option<ErrorSink>,
}

impl ClientCore {
    pub(crate) fn new(config: &ConnectionConfiguration) -> Arc<Self> {
        Arc::new(Self {
            transport: OnceLock::new(),
            consumers: Mutex::new(HashMap::new()),
            aliases: Mutex::new(AliasPool::new()),
            next_consumer_id: AtomicU64::new(0),
            error_handler: config.error_handler(),
        })
    }

    // The transport calls back into the core, so it can only be attached
    // after construction.
    pub(crate) fn attach_transport(&self, web_socket: WebSocket) {
        let _ = self.transport.set(web_socket);
    }

    fn transport(&self) -> DrivelineResult<&WebSocket> {
        self.transport.get().ok_or(DrivelineError::Closed)
    }

    pub(crate) async fn send(&self, frame: Vec<u8>) -> DrivelineResult<()> {
        self.transport()?.write(frame).await
    }

    pub(crate) fn next_consumer_id(&self) -> u64 {
        self.next_consumer_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn report(&self, err: &DrivelineError) {
        if let Some(handler) = &self.error_handler {
            handler(err);
        } else {
            warn!("{err}");
        }
    }

    /// Registers the consumer, submits its command, and waits for its
    /// terminal state or for the caller's cancellation signal. The
    /// registry entry is removed when the caller returns; ids are never
    /// reused, so a late reply cannot reach the wrong operation.
    pub(crate) async fn run_consumer(
        &self,
        cancel: &CancellationToken,
        consumer: Arc<dyn Consumer>,
    ) -> DrivelineResult<()> {
        self.register_consumer(Arc::clone(&consumer));
        let result = self.drive_consumer(cancel, consumer.as_ref()).await;
        self.unregister_consumer(consumer.consumer_id());
        result
    }

    async fn drive_consumer(
        &self,
        cancel: &CancellationToken,
        consumer: &dyn Consumer,
    ) -> DrivelineResult<()> {
        consumer.run().await?;
        tokio::select! {
            () = consumer.core().wait_done() => consumer.core().take_result(),
            () = cancel.cancelled() => {
                // best effort; the server is not waited on for an ack
                if let Err(e) = self.send(request::cancel(consumer.consumer_id())).await {
                    self.report(&e);
                }
                Err(DrivelineError::Cancelled)
            }
        }
    }

    fn register_consumer(&self, consumer: Arc<dyn Consumer>) {
        self.consumers
            .lock()
            .insert(consumer.consumer_id(), consumer);
    }

    fn unregister_consumer(&self, consumer_id: u64) {
        self.consumers.lock().remove(&consumer_id);
    }

    fn snapshot_consumers(&self) -> Vec<Arc<dyn Consumer>> {
        self.consumers.lock().values().cloned().collect()
    }

    pub(crate) fn allocate_alias(&self, name: &str) -> StreamId {
        self.aliases.lock().allocate(name)
    }

    pub(crate) fn release_alias(&self, stream_id: &StreamId) {
        self.aliases.lock().release(stream_id);
    }

    /// Fails every registered consumer and stops the transport. Idempotent.
    pub(crate) fn close(&self) {
        for consumer in self.snapshot_consumers() {
            consumer.on_failure(DrivelineError::Closed);
        }
        if let Some(web_socket) = self.transport.get() {
            web_socket.close();
        }
    }
}

// Only terminal transport failures fan out to consumers; everything else
// stays inside the reconnect cycle.
fn terminal_error(err: &DrivelineError) -> DrivelineError {
    match err {
        DrivelineError::MaxReconnect => DrivelineError::MaxReconnect,
        _ => DrivelineError::Closed,
    }
}

#[async_trait]
impl TransportHandler for ClientCore {
    // Fired on every established connection. Re-defines the aliases in
    // insertion order, then lets every registered consumer decide whether
    // to re-submit.
    async fn on_connect(&self) {
        let defines = self.aliases.lock().live();
        for (id, name) in defines {
            if let Err(e) = self.send(request::define(id, &name)).await {
                warn!("cannot re-define alias {id} for stream {name}");
                self.report(&e);
            }
        }
        for consumer in self.snapshot_consumers() {
            consumer.on_reconnect().await;
        }
    }

    async fn on_disconnect(&self) {
        for consumer in self.snapshot_consumers() {
            consumer.on_disconnect();
        }
    }

    async fn on_failure(&self, err: DrivelineError) {
        for consumer in self.snapshot_consumers() {
            consumer.on_failure(terminal_error(&err));
        }
    }

    async fn on_message(&self, frame: Vec<u8>) {
        let decoded = match reply::decode_server_message(&frame) {
            Ok(decoded) => decoded,
            Err(e) => {
                self.report(&e);
                return;
            }
        };
        let consumer = self.consumers.lock().get(&decoded.consumer_id).cloned();
        let Some(consumer) = consumer else {
            self.report(&DrivelineError::UnknownConsumer(decoded.consumer_id));
            return;
        };
        match decoded.body {
            ReplyBody::Error(text) => consumer.on_failure(DrivelineError::ServerError(text)),
            ReplyBody::Records(records) => consumer.on_records(records),
            ReplyBody::Synced => consumer.on_records(Vec::new()),
        }
    }

    fn on_error(&self, err: DrivelineError) {
        self.report(&err);
    }
}

impl std::fmt::Debug for ClientCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCore")
            .field("pending_consumers", &self.consumers.lock().len())
            .field("next_consumer_id", &self.next_consumer_id)
            .finish_non_exhaustive()
    }
}
