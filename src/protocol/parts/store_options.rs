use crate::protocol::cbor;
use crate::RecordId;
use std::time::Duration;

const OPT_TTL: u16 = 1;
const OPT_CAS: u16 = 2;

/// Configures the behavior of the store operation: a time-to-live for the
/// record, and compare-and-swap against the currently stored record id.
#[derive(Clone, Debug, Default)]
pub struct StoreOptions {
    assigned: u16,
    ttl_ms: u64,
    cas_record_id: RecordId,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored record expires after the given duration.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.assigned |= OPT_TTL;
        self.ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// The write succeeds only if the currently stored record id equals `id`.
    #[must_use]
    pub fn compare_and_swap(mut self, id: RecordId) -> Self {
        self.assigned |= OPT_CAS;
        self.cas_record_id = id;
        self
    }

    pub(crate) fn size(&self) -> usize {
        if self.assigned == 0 {
            return 1;
        }
        let mut size = 1;
        if self.assigned & OPT_CAS != 0 {
            size += 1 + cbor::size_of_bytes(self.cas_record_id.as_bytes().len());
        }
        if self.assigned & OPT_TTL != 0 {
            size += 1 + cbor::size_of_number(self.ttl_ms);
        }
        size
    }

    // Entries are emitted in a fixed order: CAS first, then TTL.
    pub(crate) fn emit(&self, buf: &mut Vec<u8>) {
        if self.assigned == 0 {
            buf.push(cbor::UNDEFINED);
            return;
        }
        let pairs = self.assigned.count_ones() as u8;
        buf.push(cbor::MT_ARRAY | (pairs * 2));
        if self.assigned & OPT_CAS != 0 {
            buf.push(cbor::ENCODED_STORE_CAS_ID_TAG);
            cbor::encode_bytes(buf, cbor::MT_BYTES, self.cas_record_id.as_bytes());
        }
        if self.assigned & OPT_TTL != 0 {
            buf.push(cbor::ENCODED_STORE_TTL_TAG);
            cbor::encode_number(buf, cbor::MT_UNSIGNED, self.ttl_ms);
        }
    }
}
