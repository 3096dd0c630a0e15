use crate::consumer::{Consumer, ConsumerCore};
use crate::protocol::{cbor, request};
use crate::{DrivelineError, DrivelineResult, Record};
use async_trait::async_trait;
use parking_lot::Mutex;

pub(crate) type EntryHandler = Box<dyn FnMut(String) + Send>;

/// Iterates stream names (`sls`) or keys (`lst`) matching a pattern.
///
/// Each reply carries exactly one record whose payload is an array of text
/// strings; an empty array ends the iteration. The server keeps no state
/// for a list across connections, so a lost connection is terminal.
pub(crate) struct ListConsumer {
    core: ConsumerCore,
    streams: bool,
    pattern: String,
    handler: Mutex<EntryHandler>,
}

impl ListConsumer {
    pub(crate) fn new(
        core: ConsumerCore,
        streams: bool,
        pattern: &str,
        handler: EntryHandler,
    ) -> Self {
        Self {
            core,
            streams,
            pattern: pattern.to_owned(),
            handler: Mutex::new(handler),
        }
    }

    fn deliver_entries(&self, payload: &[u8]) -> DrivelineResult<bool> {
        let code = *payload
            .first()
            .ok_or(DrivelineError::InvalidServerMessage)?;
        if !cbor::is_array(code) {
            return Err(DrivelineError::InvalidServerMessage);
        }
        if cbor::len_code(code) == 0 {
            return Ok(true);
        }
        let (entry_count, mut rest) = cbor::decode_number(payload)?;
        let mut handler = self.handler.lock();
        for _ in 0..entry_count {
            let (entry, remainder) = cbor::decode_text(rest)?;
            (*handler)(entry.to_owned());
            rest = remainder;
        }
        Ok(false)
    }
}

#[async_trait]
impl Consumer for ListConsumer {
    fn core(&self) -> &ConsumerCore {
        &self.core
    }

    async fn run(&self) -> DrivelineResult<()> {
        let frame = request::list(self.streams, self.core.consumer_id, &self.pattern);
        self.core.client()?.send(frame).await
    }

    fn on_records(&self, records: Vec<Record>) {
        if records.len() != 1 {
            self.core.fail(DrivelineError::InvalidServerMessage);
            return;
        }
        match self.deliver_entries(&records[0].payload) {
            Ok(true) => self.core.finish(),
            Ok(false) => {}
            Err(e) => self.core.fail(e),
        }
    }

    fn on_disconnect(&self) {
        self.core.fail(DrivelineError::Closed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::cbor::{MT_ARRAY, MT_BYTES, MT_TEXT, MT_UNSIGNED};
    use std::sync::mpsc;

    fn consumer() -> (ListConsumer, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel();
        let consumer = ListConsumer::new(
            ConsumerCore::detached(3),
            true,
            "*",
            Box::new(move |entry| {
                let _ = tx.send(entry);
            }),
        );
        (consumer, rx)
    }

    fn entry_record(entries: &[&str]) -> Record {
        let mut payload = Vec::new();
        cbor::encode_number(&mut payload, MT_ARRAY, entries.len() as u64);
        for entry in entries {
            cbor::encode_bytes(&mut payload, MT_TEXT, entry.as_bytes());
        }
        Record {
            payload,
            ..Record::default()
        }
    }

    #[test]
    fn forwards_entries() {
        let (consumer, rx) = consumer();
        consumer.on_records(vec![entry_record(&["alpha", "beta"])]);
        assert_eq!(rx.try_recv().unwrap(), "alpha");
        assert_eq!(rx.try_recv().unwrap(), "beta");
        assert!(!consumer.core().is_done());
    }

    #[test]
    fn empty_array_ends_the_iteration() {
        let (consumer, _rx) = consumer();
        consumer.on_records(vec![entry_record(&[])]);
        assert!(consumer.core().is_done());
        assert!(consumer.core().take_result().is_ok());
    }

    #[test]
    fn rejects_more_than_one_record() {
        let (consumer, _rx) = consumer();
        consumer.on_records(vec![entry_record(&["a"]), entry_record(&["b"])]);
        assert!(matches!(
            consumer.core().take_result(),
            Err(DrivelineError::InvalidServerMessage)
        ));
    }

    #[test]
    fn rejects_zero_records() {
        let (consumer, _rx) = consumer();
        consumer.on_records(Vec::new());
        assert!(matches!(
            consumer.core().take_result(),
            Err(DrivelineError::InvalidServerMessage)
        ));
    }

    #[test]
    fn rejects_payload_that_is_not_an_array() {
        let (consumer, _rx) = consumer();
        consumer.on_records(vec![Record {
            payload: vec![MT_BYTES | 1, b'x'],
            ..Record::default()
        }]);
        assert!(matches!(
            consumer.core().take_result(),
            Err(DrivelineError::InvalidServerMessage)
        ));
    }

    #[test]
    fn rejects_bad_array_length_encoding() {
        let (consumer, _rx) = consumer();
        consumer.on_records(vec![Record {
            payload: vec![MT_ARRAY | 28],
            ..Record::default()
        }]);
        assert!(matches!(
            consumer.core().take_result(),
            Err(DrivelineError::InvalidServerMessage)
        ));
    }

    #[test]
    fn rejects_non_text_entries() {
        let (consumer, rx) = consumer();
        consumer.on_records(vec![Record {
            payload: vec![MT_ARRAY | 1, MT_UNSIGNED | 5],
            ..Record::default()
        }]);
        assert!(rx.try_recv().is_err());
        assert!(matches!(
            consumer.core().take_result(),
            Err(DrivelineError::InvalidServerMessage)
        ));
    }

    #[test]
    fn disconnect_is_terminal() {
        let (consumer, _rx) = consumer();
        consumer.on_disconnect();
        assert!(consumer.core().is_done());
        assert!(matches!(
            consumer.core().take_result(),
            Err(DrivelineError::Closed)
        ));
    }
}
