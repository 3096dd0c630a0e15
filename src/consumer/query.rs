use crate::consumer::{Consumer, ConsumerCore};
use crate::protocol::request;
use crate::{DrivelineError, DrivelineResult, QueryOptions, Record};
use async_trait::async_trait;
use parking_lot::Mutex;

pub(crate) type RecordHandler = Box<dyn FnMut(Record) + Send>;

/// Drives a one-shot (`qq`) or continuous (`sq`) query.
///
/// The remembered starting record id advances with every delivered record,
/// so a continuous query re-submitted after a reconnect resumes past the
/// last record the handler has seen.
pub(crate) struct QueryConsumer {
    core: ConsumerCore,
    dql: String,
    continuous: bool,
    options: Mutex<QueryOptions>,
    handler: Mutex<RecordHandler>,
}

impl QueryConsumer {
    pub(crate) fn new(
        core: ConsumerCore,
        dql: &str,
        continuous: bool,
        options: QueryOptions,
        handler: RecordHandler,
    ) -> Self {
        Self {
            core,
            dql: dql.to_owned(),
            continuous,
            options: Mutex::new(options),
            handler: Mutex::new(handler),
        }
    }

    fn encoded(&self) -> Vec<u8> {
        request::query(
            self.continuous,
            self.core.consumer_id,
            &self.dql,
            &self.options.lock(),
        )
    }
}

#[async_trait]
impl Consumer for QueryConsumer {
    fn core(&self) -> &ConsumerCore {
        &self.core
    }

    async fn run(&self) -> DrivelineResult<()> {
        self.core.client()?.send(self.encoded()).await
    }

    fn on_records(&self, records: Vec<Record>) {
        if !self.continuous && records.is_empty() {
            self.core.finish();
            return;
        }
        let mut handler = self.handler.lock();
        for record in records {
            self.options.lock().set_from_record_id(record.id.clone());
            (*handler)(record);
        }
    }

    async fn on_reconnect(&self) {
        if !self.continuous {
            return;
        }
        let frame = self.encoded();
        let result = match self.core.client() {
            Ok(client) => client.send(frame).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            self.core.fail(e);
        }
    }

    // A one-shot query is not re-submitted, so a lost connection is
    // terminal for it. The continuous variant rides out the reconnect.
    fn on_disconnect(&self) {
        if !self.continuous {
            self.core.fail(DrivelineError::Closed);
        }
    }
}
