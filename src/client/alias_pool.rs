use crate::StreamId;

const MAX_ALIASES: usize = 256;

/// Bounded map of one-byte stream aliases.
///
/// Allocation pops the lowest free id; exhaustion is not an error, the
/// caller simply gets the textual form back. Live entries are kept in
/// insertion order so the replay after a reconnect is deterministic.
pub(crate) struct AliasPool {
    free: Vec<u8>,
    live: Vec<(u8, String)>,
}

impl AliasPool {
    pub(crate) fn new() -> Self {
        Self {
            free: (0..MAX_ALIASES as u16).rev().map(|id| id as u8).collect(),
            live: Vec::new(),
        }
    }

    pub(crate) fn allocate(&mut self, name: &str) -> StreamId {
        match self.free.pop() {
            Some(id) => {
                self.live.push((id, name.to_owned()));
                StreamId::Numeric(id)
            }
            None => StreamId::Textual(name.to_owned()),
        }
    }

    pub(crate) fn release(&mut self, stream_id: &StreamId) {
        if let StreamId::Numeric(id) = stream_id {
            if let Some(position) = self.live.iter().position(|(live_id, _)| live_id == id) {
                self.live.remove(position);
                self.free.push(*id);
            }
        }
    }

    /// The live aliases, oldest first.
    pub(crate) fn live(&self) -> Vec<(u8, String)> {
        self.live.clone()
    }
}

impl std::fmt::Debug for AliasPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AliasPool")
            .field("free", &self.free.len())
            .field("live", &self.live.len())
            .finish()
    }
}
