//! Registered logical operations and their per-kind state machines.
//!
//! A consumer is created when a request is submitted, registered under a
//! session-unique id, fed zero or more record batches by the dispatch
//! path, and becomes terminal on completion, failure, or cancellation.
//! Reconnect and disconnect events fan out to every registered consumer;
//! how each kind reacts is its own business.

mod list;
mod load;
mod query;
mod sync;

pub(crate) use list::{EntryHandler, ListConsumer};
pub(crate) use load::LoadConsumer;
pub(crate) use query::{QueryConsumer, RecordHandler};
pub(crate) use sync::SyncConsumer;

use crate::client::ClientCore;
use crate::{DrivelineError, DrivelineResult, Record};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::sync::watch;

#[async_trait]
pub(crate) trait Consumer: Send + Sync {
    fn core(&self) -> &ConsumerCore;

    /// Submits the operation's command to the server.
    async fn run(&self) -> DrivelineResult<()>;

    /// Delivers one batch of records; an empty batch means "no data".
    fn on_records(&self, records: Vec<Record>);

    /// The connection has been re-established; long-lived operations
    /// re-submit themselves here.
    async fn on_reconnect(&self) {}

    /// The connection was lost; the default is to wait for the reconnect.
    fn on_disconnect(&self) {}

    /// Fails the operation; the first error wins.
    fn on_failure(&self, err: DrivelineError) {
        self.core().fail(err);
    }

    fn consumer_id(&self) -> u64 {
        self.core().consumer_id
    }
}

/// State shared by all consumer kinds: the id, a weak reference back to
/// the session for re-submission, the done signal, and the terminal error
/// slot. The slot is written only before the done signal fires and read
/// only after, by the single waiter.
pub(crate) struct ConsumerCore {
    pub(crate) consumer_id: u64,
    client: Weak<ClientCore>,
    done: watch::Sender<bool>,
    result: Mutex<Option<DrivelineError>>,
}

impl ConsumerCore {
    pub(crate) fn new(client: &Arc<ClientCore>, consumer_id: u64) -> Self {
        let (done, _) = watch::channel(false);
        Self {
            consumer_id,
            client: Arc::downgrade(client),
            done,
            result: Mutex::new(None),
        }
    }

    pub(crate) fn client(&self) -> DrivelineResult<Arc<ClientCore>> {
        self.client.upgrade().ok_or(DrivelineError::Closed)
    }

    /// Terminal success: release the waiter with an empty error slot.
    pub(crate) fn finish(&self) {
        // send_replace, as there may be no subscribed waiter yet
        self.done.send_replace(true);
    }

    /// Terminal failure: record the error (first one wins), release the
    /// waiter.
    pub(crate) fn fail(&self, err: DrivelineError) {
        {
            let mut slot = self.result.lock();
            if slot.is_none() {
                *slot = Some(err);
            }
        }
        self.finish();
    }

    pub(crate) fn is_done(&self) -> bool {
        *self.done.borrow()
    }

    pub(crate) async fn wait_done(&self) {
        let mut rx = self.done.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    pub(crate) fn take_result(&self) -> DrivelineResult<()> {
        match self.result.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    #[cfg(test)]
    pub(crate) fn detached(consumer_id: u64) -> Self {
        let (done, _) = watch::channel(false);
        Self {
            consumer_id,
            client: Weak::new(),
            done,
            result: Mutex::new(None),
        }
    }
}

impl std::fmt::Debug for ConsumerCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerCore")
            .field("consumer_id", &self.consumer_id)
            .field("done", &self.is_done())
            .finish_non_exhaustive()
    }
}
