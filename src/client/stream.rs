use crate::client::ClientCore;
use crate::protocol::request;
use crate::{DrivelineResult, StreamId};
use std::sync::Arc;

/// A handle on a stream that saves wire bandwidth when appending many
/// small records: where possible it addresses the stream by a one-byte
/// alias instead of the full name.
///
/// The alias dies with the handle; dropping it returns the alias to the
/// session's pool.
#[derive(Debug)]
pub struct Stream {
    core: Arc<ClientCore>,
    stream_id: StreamId,
    name: String,
}

impl Stream {
    pub(crate) fn new(core: Arc<ClientCore>, stream_id: StreamId, name: &str) -> Self {
        Self {
            core,
            stream_id,
            name: name.to_owned(),
        }
    }

    /// The stream's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a record to the stream. Fire-and-forget at the wire; the
    /// record is buffered by the transport.
    pub async fn append(&self, record: &[u8]) -> DrivelineResult<()> {
        let frame = match &self.stream_id {
            StreamId::Numeric(id) => request::append_by_id(u64::from(*id), record),
            StreamId::Textual(name) => request::append_by_name(name, record),
        };
        self.core.send(frame).await
    }

    /// Removes all records of the stream.
    pub async fn truncate(&self) -> DrivelineResult<()> {
        let frame = match &self.stream_id {
            StreamId::Numeric(id) => request::truncate_by_id(u64::from(*id)),
            StreamId::Textual(name) => request::truncate_by_name(name),
        };
        self.core.send(frame).await
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        self.core.release_alias(&self.stream_id);
    }
}
