//! Basic type definitions for the relay
//!
//! Provides newtype wrappers for type safety:
//! - `ConnectionId`: monotonically assigned connection identifier

/// Unique connection identifier (newtype pattern)
///
/// Assigned by the accept loop in increasing order, starting at zero.
/// Implements Hash and Eq for use as HashMap keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    /// Display name a connection carries until it sends SetNick
    pub fn default_display_name(self) -> String {
        format!("Client {}", self.0)
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of fresh connection ids
///
/// Owned by the accept loop, so no synchronization is needed.
#[derive(Debug, Default)]
pub struct ConnectionIdGenerator {
    next: u64,
}

impl ConnectionIdGenerator {
    /// Create a generator whose first id is 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next id
    pub fn next_id(&mut self) -> ConnectionId {
        let id = ConnectionId(self.next);
        self.next += 1;
        id
    }
}
