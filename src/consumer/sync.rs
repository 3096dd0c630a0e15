use crate::consumer::{Consumer, ConsumerCore};
use crate::protocol::request;
use crate::{DrivelineError, DrivelineResult, Record};
use async_trait::async_trait;

/// Executes one sync cycle with the server.
///
/// Completion is signalled by the matching `syn` reply. The server does
/// not remember the cycle across connections, so a lost connection is
/// terminal.
pub(crate) struct SyncConsumer {
    core: ConsumerCore,
}

impl SyncConsumer {
    pub(crate) fn new(core: ConsumerCore) -> Self {
        Self { core }
    }
}

#[async_trait]
impl Consumer for SyncConsumer {
    fn core(&self) -> &ConsumerCore {
        &self.core
    }

    async fn run(&self) -> DrivelineResult<()> {
        let frame = request::sync(self.core.consumer_id);
        self.core.client()?.send(frame).await
    }

    fn on_records(&self, _records: Vec<Record>) {
        self.core.finish();
    }

    fn on_disconnect(&self) {
        self.core.fail(DrivelineError::Closed);
    }
}
