//! Decoder for the server→client reply grammar.
//!
//! Every reply is an array beginning with a short text tag: `data` carries
//! zero or more records for a consumer, `err` fails a consumer, `syn`
//! acknowledges a sync cycle. Anything else is an
//! [`InvalidServerMessage`](crate::DrivelineError::InvalidServerMessage).

use crate::protocol::cbor;
use crate::{DrivelineError, DrivelineResult, Record};

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Reply {
    pub(crate) consumer_id: u64,
    pub(crate) body: ReplyBody,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ReplyBody {
    Records(Vec<Record>),
    Error(String),
    Synced,
}

pub(crate) fn decode_server_message(buf: &[u8]) -> DrivelineResult<Reply> {
    let head = *buf.first().ok_or(DrivelineError::InvalidServerMessage)?;
    if !cbor::is_array(head) {
        return Err(DrivelineError::InvalidServerMessage);
    }
    let (item_count, rest) = cbor::decode_number(buf)?;
    let head = *rest.first().ok_or(DrivelineError::InvalidServerMessage)?;
    if !cbor::is_text_string(head) {
        return Err(DrivelineError::InvalidServerMessage);
    }
    let (tag, rest) = cbor::decode_text(rest)?;
    match tag {
        "data" => {
            let record_count = item_count
                .checked_sub(3)
                .ok_or(DrivelineError::InvalidServerMessage)?;
            decode_data_message(rest, record_count as usize)
        }
        "err" => decode_error_message(rest),
        "syn" => decode_sync_message(rest),
        _ => Err(DrivelineError::InvalidServerMessage),
    }
}

fn decode_consumer_id(buf: &[u8]) -> DrivelineResult<(u64, &[u8])> {
    let head = *buf.first().ok_or(DrivelineError::InvalidServerMessage)?;
    if !cbor::is_unsigned_integer(head) {
        return Err(DrivelineError::InvalidServerMessage);
    }
    cbor::decode_number(buf)
}

fn decode_data_message(buf: &[u8], record_count: usize) -> DrivelineResult<Reply> {
    let (consumer_id, mut buf) = decode_consumer_id(buf)?;
    // every record takes at least one byte, which bounds the count before
    // anything is allocated for it
    if record_count > buf.len() {
        return Err(DrivelineError::InvalidServerMessage);
    }
    let mut records = vec![Record::default(); record_count];

    // Headers: blank, or an array of tag/value pairs. The only recognized
    // tag is message-id, whose value is an array of exactly one record id
    // per record.
    let head = *buf.first().ok_or(DrivelineError::InvalidServerMessage)?;
    if cbor::is_array(head) {
        let (tag_count, rest) = cbor::decode_number(buf)?;
        buf = rest;
        if tag_count % 2 != 0 {
            return Err(DrivelineError::InvalidServerMessage);
        }
        let mut seen = 0;
        while seen < tag_count {
            let tag = *buf.first().ok_or(DrivelineError::InvalidServerMessage)?;
            if tag != cbor::ENCODED_MESSAGE_ID_TAG {
                return Err(DrivelineError::InvalidServerMessage);
            }
            buf = &buf[1..];
            let head = *buf.first().ok_or(DrivelineError::InvalidServerMessage)?;
            if !cbor::is_array(head) {
                return Err(DrivelineError::InvalidServerMessage);
            }
            let (id_count, rest) = cbor::decode_number(buf)?;
            buf = rest;
            if id_count != record_count as u64 {
                return Err(DrivelineError::InvalidServerMessage);
            }
            for record in &mut records {
                let (id, rest) = cbor::decode_bytes(buf)?;
                record.id = id.into();
                buf = rest;
            }
            seen += 2;
        }
    } else if cbor::is_blank(head) {
        buf = &buf[1..];
    } else {
        return Err(DrivelineError::InvalidServerMessage);
    }

    // A single undefined payload stands for "no data": the consumer is
    // alive but the record list is empty.
    if record_count == 1 && buf.first().copied().is_some_and(cbor::is_undefined) {
        return Ok(Reply {
            consumer_id,
            body: ReplyBody::Records(Vec::new()),
        });
    }
    for record in &mut records {
        let (payload, rest) = cbor::decode_bytes(buf)?;
        record.payload = payload.to_vec();
        buf = rest;
    }
    Ok(Reply {
        consumer_id,
        body: ReplyBody::Records(records),
    })
}

fn decode_error_message(buf: &[u8]) -> DrivelineResult<Reply> {
    let (consumer_id, rest) = decode_consumer_id(buf)?;
    let (message, _) = cbor::decode_text(rest)?;
    Ok(Reply {
        consumer_id,
        body: ReplyBody::Error(message.to_owned()),
    })
}

fn decode_sync_message(buf: &[u8]) -> DrivelineResult<Reply> {
    let (consumer_id, _) = decode_consumer_id(buf)?;
    Ok(Reply {
        consumer_id,
        body: ReplyBody::Synced,
    })
}
