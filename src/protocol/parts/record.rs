use std::fmt;

const SENTINEL_LEN: usize = 8;

/// Opaque identifier of a stored record, issued by the server.
///
/// Servers emit eight-byte ids in practice, but the length is treated as
/// variable. An id can be empty when the server did not supply one.
#[derive(Clone, Default, Eq, PartialEq, Hash)]
pub struct RecordId(Vec<u8>);

impl RecordId {
    /// The id addressing the oldest position of a stream.
    pub fn head() -> Self {
        Self(vec![0x00; SENTINEL_LEN])
    }

    /// The id addressing the position just past the newest record of a stream.
    pub fn tail() -> Self {
        Self(vec![0xFF; SENTINEL_LEN])
    }

    /// The raw bytes of the id.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns true if the server did not supply an id.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for RecordId {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for RecordId {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", hex::encode(&self.0))
    }
}

/// The core data exchange structure: a record id and its payload.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Record {
    /// The identifier of the record; empty if the server did not supply one.
    pub id: RecordId,
    /// The payload of the record.
    pub payload: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels() {
        assert_eq!(RecordId::head().as_bytes(), &[0x00; 8]);
        assert_eq!(RecordId::tail().as_bytes(), &[0xFF; 8]);
        assert!(RecordId::default().is_empty());
    }

    #[test]
    fn displays_as_hex() {
        let id = RecordId::from(&[0x01, 0x02, 0xAB][..]);
        assert_eq!(id.to_string(), "0102ab");
        assert_eq!(format!("{id:?}"), "RecordId(0102ab)");
    }
}
