/// Identifies a stream on the current session.
///
/// The numeric form refers to an alias previously defined on this session
/// and is only valid while that alias mapping exists; the textual form is
/// always valid.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum StreamId {
    /// A one-byte alias bound to a stream name on this session.
    Numeric(u8),
    /// A stream addressed by its full name.
    Textual(String),
}

impl StreamId {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Numeric(_))
    }
}
