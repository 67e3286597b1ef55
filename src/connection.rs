//! Connection state owned by a handler
//!
//! Holds the identity and display name of one accepted client. Only the
//! handler that owns the connection reads or writes the name, so it needs
//! no locking; the write side of the socket lives in the registry.

use std::borrow::Cow;

use bytes::Bytes;

use crate::message::{truncate_to_field, Message, NICKNAME_FIELD_LEN};
use crate::types::ConnectionId;

/// Per-connection state
#[derive(Debug)]
pub struct Connection {
    /// Identifier assigned at accept time
    pub id: ConnectionId,
    /// Name attached to relayed text, as raw bytes
    display_name: Bytes,
}

impl Connection {
    /// Create a connection named `Client <id>`
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            display_name: Bytes::from(id.default_display_name()),
        }
    }

    /// Current display name bytes
    pub fn display_name(&self) -> &Bytes {
        &self.display_name
    }

    /// Display name for log lines
    pub fn display_name_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.display_name)
    }

    /// Replace the display name, returning the previous one
    ///
    /// The name is clipped to what fits in a nickname field so that the
    /// stored value matches what peers will see.
    pub fn set_display_name(&mut self, name: Bytes) -> Bytes {
        let len = truncate_to_field(&name, NICKNAME_FIELD_LEN).len();
        std::mem::replace(&mut self.display_name, name.slice(..len))
    }

    /// Build the message peers receive for `text` sent on this connection
    ///
    /// Uses the name as it is right now, so a rename only affects text
    /// sent after it.
    pub fn relay_text(&self, text: Bytes) -> Message {
        Message::TextFromServer {
            nickname: self.display_name.clone(),
            text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_creation() {
        let conn = Connection::new(ConnectionId(3));
        assert_eq!(conn.id, ConnectionId(3));
        assert_eq!(conn.display_name(), &Bytes::from_static(b"Client 3"));
        assert_eq!(conn.display_name_lossy(), "Client 3");
    }

    #[test]
    fn test_rename_applies_to_later_text() {
        let mut conn = Connection::new(ConnectionId(0));
        let before = conn.relay_text(Bytes::from_static(b"first"));

        let previous = conn.set_display_name(Bytes::from_static(b"alice"));
        let after = conn.relay_text(Bytes::from_static(b"second"));

        assert_eq!(previous, Bytes::from_static(b"Client 0"));
        assert_eq!(
            before,
            Message::TextFromServer {
                nickname: Bytes::from_static(b"Client 0"),
                text: Bytes::from_static(b"first")
            }
        );
        assert_eq!(
            after,
            Message::TextFromServer {
                nickname: Bytes::from_static(b"alice"),
                text: Bytes::from_static(b"second")
            }
        );
    }

    #[test]
    fn test_long_name_is_clipped() {
        let mut conn = Connection::new(ConnectionId(0));
        conn.set_display_name(Bytes::from(vec![b'z'; 200]));
        assert_eq!(conn.display_name().len(), NICKNAME_FIELD_LEN - 1);
    }

    #[test]
    fn test_non_utf8_name_is_kept_verbatim() {
        let mut conn = Connection::new(ConnectionId(0));
        conn.set_display_name(Bytes::from_static(b"Jos\xe9"));

        assert_eq!(conn.display_name(), &Bytes::from_static(b"Jos\xe9"));
        assert_eq!(conn.display_name_lossy(), "Jos\u{fffd}");
    }
}
