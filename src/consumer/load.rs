use crate::consumer::{Consumer, ConsumerCore};
use crate::protocol::request;
use crate::{DrivelineError, DrivelineResult, Record};
use async_trait::async_trait;
use parking_lot::Mutex;

/// Reads one record from the key-value store.
///
/// The reply must carry exactly one record. A load caught in a reconnect
/// re-submits itself, the server-side read is idempotent.
pub(crate) struct LoadConsumer {
    core: ConsumerCore,
    key: String,
    record: Mutex<Option<Record>>,
}

impl LoadConsumer {
    pub(crate) fn new(core: ConsumerCore, key: &str) -> Self {
        Self {
            core,
            key: key.to_owned(),
            record: Mutex::new(None),
        }
    }

    pub(crate) fn take_record(&self) -> Option<Record> {
        self.record.lock().take()
    }
}

#[async_trait]
impl Consumer for LoadConsumer {
    fn core(&self) -> &ConsumerCore {
        &self.core
    }

    async fn run(&self) -> DrivelineResult<()> {
        let frame = request::load(self.core.consumer_id, &self.key);
        self.core.client()?.send(frame).await
    }

    fn on_records(&self, mut records: Vec<Record>) {
        if records.len() != 1 {
            self.core.fail(DrivelineError::InvalidServerMessage);
            return;
        }
        *self.record.lock() = records.pop();
        self.core.finish();
    }

    async fn on_reconnect(&self) {
        let frame = request::load(self.core.consumer_id, &self.key);
        let result = match self.core.client() {
            Ok(client) => client.send(frame).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            self.core.fail(e);
        }
    }
}
