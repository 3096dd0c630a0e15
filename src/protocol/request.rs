//! Encoders for the client→server command grammar.
//!
//! Every command is an array whose first element is a short text tag
//! followed by fixed positional arguments. Buffers are sized exactly up
//! front; encoding cannot fail.

use crate::protocol::cbor::{
    encode_bytes, encode_number, size_of_bytes, size_of_number, MT_ARRAY, MT_BYTES, MT_TEXT,
    MT_UNSIGNED, UNDEFINED,
};
use crate::{QueryOptions, StoreOptions};

pub(crate) fn append_by_id(stream_id: u64, record: &[u8]) -> Vec<u8> {
    let mut buf =
        Vec::with_capacity(5 + size_of_number(stream_id) + 1 + size_of_bytes(record.len()));
    buf.push(MT_ARRAY | 4);
    encode_bytes(&mut buf, MT_TEXT, b"app");
    encode_number(&mut buf, MT_UNSIGNED, stream_id);
    buf.push(UNDEFINED);
    encode_bytes(&mut buf, MT_BYTES, record);
    buf
}

pub(crate) fn append_by_name(stream: &str, record: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(
        5 + size_of_bytes(stream.len()) + 1 + size_of_bytes(record.len()),
    );
    buf.push(MT_ARRAY | 4);
    encode_bytes(&mut buf, MT_TEXT, b"app");
    encode_bytes(&mut buf, MT_TEXT, stream.as_bytes());
    buf.push(UNDEFINED);
    encode_bytes(&mut buf, MT_BYTES, record);
    buf
}

pub(crate) fn cancel(consumer_id: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(5 + size_of_number(consumer_id) + 1);
    buf.push(MT_ARRAY | 3);
    encode_bytes(&mut buf, MT_TEXT, b"can");
    encode_number(&mut buf, MT_UNSIGNED, consumer_id);
    buf.push(UNDEFINED);
    buf
}

pub(crate) fn define(alias_id: u8, stream_name: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(
        5 + size_of_number(u64::from(alias_id)) + size_of_bytes(stream_name.len()),
    );
    buf.push(MT_ARRAY | 3);
    encode_bytes(&mut buf, MT_TEXT, b"def");
    encode_number(&mut buf, MT_UNSIGNED, u64::from(alias_id));
    encode_bytes(&mut buf, MT_TEXT, stream_name.as_bytes());
    buf
}

pub(crate) fn list(streams: bool, consumer_id: u64, pattern: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(
        5 + size_of_number(consumer_id) + 1 + size_of_bytes(pattern.len()),
    );
    buf.push(MT_ARRAY | 4);
    encode_bytes(&mut buf, MT_TEXT, if streams { b"sls" } else { b"lst" });
    encode_number(&mut buf, MT_UNSIGNED, consumer_id);
    buf.push(UNDEFINED);
    encode_bytes(&mut buf, MT_TEXT, pattern.as_bytes());
    buf
}

pub(crate) fn load(consumer_id: u64, key: &str) -> Vec<u8> {
    let mut buf =
        Vec::with_capacity(4 + size_of_number(consumer_id) + 1 + size_of_bytes(key.len()));
    buf.push(MT_ARRAY | 4);
    encode_bytes(&mut buf, MT_TEXT, b"ld");
    encode_number(&mut buf, MT_UNSIGNED, consumer_id);
    buf.push(UNDEFINED);
    encode_bytes(&mut buf, MT_TEXT, key.as_bytes());
    buf
}

pub(crate) fn query(
    continuous: bool,
    consumer_id: u64,
    dql: &str,
    options: &QueryOptions,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(
        4 + size_of_number(consumer_id) + options.size() + size_of_bytes(dql.len()),
    );
    buf.push(MT_ARRAY | 4);
    encode_bytes(&mut buf, MT_TEXT, if continuous { b"sq" } else { b"qq" });
    encode_number(&mut buf, MT_UNSIGNED, consumer_id);
    options.emit(&mut buf);
    encode_bytes(&mut buf, MT_TEXT, dql.as_bytes());
    buf
}

pub(crate) fn remove(key: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + 1 + size_of_bytes(key.len()));
    buf.push(MT_ARRAY | 3);
    encode_bytes(&mut buf, MT_TEXT, b"rm");
    buf.push(UNDEFINED);
    encode_bytes(&mut buf, MT_TEXT, key.as_bytes());
    buf
}

pub(crate) fn remove_matches(pattern: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(5 + 1 + size_of_bytes(pattern.len()));
    buf.push(MT_ARRAY | 3);
    encode_bytes(&mut buf, MT_TEXT, b"rmk");
    buf.push(UNDEFINED);
    encode_bytes(&mut buf, MT_TEXT, pattern.as_bytes());
    buf
}

pub(crate) fn store(key: &str, data: &[u8], options: &StoreOptions) -> Vec<u8> {
    let mut buf = Vec::with_capacity(
        4 + size_of_bytes(key.len()) + options.size() + size_of_bytes(data.len()),
    );
    buf.push(MT_ARRAY | 4);
    encode_bytes(&mut buf, MT_TEXT, b"st");
    encode_bytes(&mut buf, MT_TEXT, key.as_bytes());
    options.emit(&mut buf);
    encode_bytes(&mut buf, MT_BYTES, data);
    buf
}

pub(crate) fn sync(consumer_id: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(5 + size_of_number(consumer_id));
    buf.push(MT_ARRAY | 2);
    encode_bytes(&mut buf, MT_TEXT, b"syn");
    encode_number(&mut buf, MT_UNSIGNED, consumer_id);
    buf
}

pub(crate) fn truncate_by_id(stream_id: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(5 + 1 + size_of_number(stream_id));
    buf.push(MT_ARRAY | 3);
    encode_bytes(&mut buf, MT_TEXT, b"trc");
    buf.push(UNDEFINED);
    encode_number(&mut buf, MT_UNSIGNED, stream_id);
    buf
}

pub(crate) fn truncate_by_name(stream: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(5 + 1 + size_of_bytes(stream.len()));
    buf.push(MT_ARRAY | 3);
    encode_bytes(&mut buf, MT_TEXT, b"trc");
    buf.push(UNDEFINED);
    encode_bytes(&mut buf, MT_TEXT, stream.as_bytes());
    buf
}
