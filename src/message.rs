//! Message protocol definitions
//!
//! Four fixed-layout binary records sharing a common header:
//!
//! | kind | message          | layout                              | size |
//! |------|------------------|-------------------------------------|------|
//! | 1    | `SetNick`        | header + nickname\[64\]             | 72   |
//! | 2    | `TextFromClient` | header + text\[1024\]               | 1032 |
//! | 3    | `TextFromServer` | header + nickname\[64\] + text\[1024\] | 1096 |
//! | 4    | `Exit`           | header                              | 8    |
//!
//! The header is `kind: u32` followed by `length: u32`, both big-endian.
//! `length` always equals the fixed size of the kind. Text fields are
//! NUL-terminated and NUL-padded; longer input is truncated.

use bytes::{BufMut, Bytes, BytesMut};

/// Size of the common header (kind + length)
pub const HEADER_LEN: usize = 8;

/// Capacity of a nickname field, terminator included
pub const NICKNAME_FIELD_LEN: usize = 64;

/// Capacity of a text field, terminator included
pub const TEXT_FIELD_LEN: usize = 1024;

/// Message kind discriminant as carried in the header
///
/// Kind 0 is reserved for the bare header and never valid on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MessageKind {
    SetNick = 1,
    TextFromClient = 2,
    TextFromServer = 3,
    Exit = 4,
}

impl MessageKind {
    /// Look up a kind from its wire value
    pub fn from_wire(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::SetNick),
            2 => Some(Self::TextFromClient),
            3 => Some(Self::TextFromServer),
            4 => Some(Self::Exit),
            _ => None,
        }
    }

    /// Wire value of this kind
    pub fn wire_value(self) -> u32 {
        self as u32
    }

    /// Total frame size, header included
    pub const fn frame_len(self) -> usize {
        match self {
            Self::SetNick => HEADER_LEN + NICKNAME_FIELD_LEN,
            Self::TextFromClient => HEADER_LEN + TEXT_FIELD_LEN,
            Self::TextFromServer => HEADER_LEN + NICKNAME_FIELD_LEN + TEXT_FIELD_LEN,
            Self::Exit => HEADER_LEN,
        }
    }
}

/// A logical relay message
///
/// Nickname and text fields are raw bytes and are relayed unchanged;
/// only the client decodes them for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Client → Server: change display name
    SetNick { nickname: Bytes },
    /// Client → Server: text to relay
    TextFromClient { text: Bytes },
    /// Server → Client: relayed text with the sender's display name
    TextFromServer { nickname: Bytes, text: Bytes },
    /// Client → Server: orderly disconnect
    Exit,
}

impl Message {
    /// Kind of this message
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::SetNick { .. } => MessageKind::SetNick,
            Message::TextFromClient { .. } => MessageKind::TextFromClient,
            Message::TextFromServer { .. } => MessageKind::TextFromServer,
            Message::Exit => MessageKind::Exit,
        }
    }

    /// Append the full frame for this message to `dst`
    pub fn encode(&self, dst: &mut BytesMut) {
        let kind = self.kind();
        dst.reserve(kind.frame_len());
        dst.put_u32(kind.wire_value());
        dst.put_u32(kind.frame_len() as u32);

        match self {
            Message::SetNick { nickname } => {
                put_fixed(dst, nickname, NICKNAME_FIELD_LEN);
            }
            Message::TextFromClient { text } => {
                put_fixed(dst, text, TEXT_FIELD_LEN);
            }
            Message::TextFromServer { nickname, text } => {
                put_fixed(dst, nickname, NICKNAME_FIELD_LEN);
                put_fixed(dst, text, TEXT_FIELD_LEN);
            }
            Message::Exit => {}
        }
    }

    /// Decode a message body (everything after the header)
    ///
    /// `body` must be exactly `kind.frame_len() - HEADER_LEN` bytes long;
    /// the codec guarantees this before calling. Fields share `body`'s
    /// storage.
    pub fn decode_body(kind: MessageKind, body: Bytes) -> Self {
        debug_assert_eq!(body.len(), kind.frame_len() - HEADER_LEN);

        match kind {
            MessageKind::SetNick => Message::SetNick {
                nickname: read_fixed(body),
            },
            MessageKind::TextFromClient => Message::TextFromClient {
                text: read_fixed(body),
            },
            MessageKind::TextFromServer => {
                let text = body.slice(NICKNAME_FIELD_LEN..);
                let nickname = body.slice(..NICKNAME_FIELD_LEN);
                Message::TextFromServer {
                    nickname: read_fixed(nickname),
                    text: read_fixed(text),
                }
            }
            MessageKind::Exit => Message::Exit,
        }
    }
}

/// Clip `value` so it fits a field of `capacity` bytes with its terminator
///
/// Stops at an embedded NUL, then at `capacity - 1` bytes.
pub fn truncate_to_field(value: &[u8], capacity: usize) -> &[u8] {
    let value = value
        .iter()
        .position(|&b| b == 0)
        .map_or(value, |nul| &value[..nul]);
    let max = capacity.saturating_sub(1);
    &value[..value.len().min(max)]
}

fn put_fixed(dst: &mut BytesMut, value: &[u8], capacity: usize) {
    let bytes = truncate_to_field(value, capacity);
    dst.put_slice(bytes);
    dst.put_bytes(0, capacity - bytes.len());
}

fn read_fixed(field: Bytes) -> Bytes {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    field.slice(..end)
}
