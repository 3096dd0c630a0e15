use crate::protocol::cbor;
use crate::RecordId;

const OPT_FROM_RECORD: u16 = 1;

/// Configures the behavior of query operations.
///
/// The builder methods can be chained:
///
/// ```rust,no_run
/// # use driveline::QueryOptions;
/// let options = QueryOptions::new().from_stream_head();
/// ```
#[derive(Clone, Debug, Default)]
pub struct QueryOptions {
    assigned: u16,
    from_record_id: RecordId,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// The query starts as far back as the stream reaches.
    #[must_use]
    pub fn from_stream_head(self) -> Self {
        self.from_record_id(RecordId::head())
    }

    /// The query applies only to records newer than the time of submission.
    #[must_use]
    pub fn from_stream_tail(self) -> Self {
        self.from_record_id(RecordId::tail())
    }

    /// The query starts at the given record id.
    #[must_use]
    pub fn from_record_id(mut self, id: RecordId) -> Self {
        self.set_from_record_id(id);
        self
    }

    pub(crate) fn set_from_record_id(&mut self, id: RecordId) {
        self.assigned |= OPT_FROM_RECORD;
        self.from_record_id = id;
    }

    pub(crate) fn size(&self) -> usize {
        if self.assigned == 0 {
            return 1;
        }
        1 + 1 + cbor::size_of_bytes(self.from_record_id.as_bytes().len())
    }

    pub(crate) fn emit(&self, buf: &mut Vec<u8>) {
        if self.assigned == 0 {
            buf.push(cbor::UNDEFINED);
            return;
        }
        buf.push(cbor::MT_ARRAY | 2);
        buf.push(cbor::ENCODED_READ_ID_TAG);
        cbor::encode_bytes(buf, cbor::MT_BYTES, self.from_record_id.as_bytes());
    }
}
