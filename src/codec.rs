//! Frame codec for the relay protocol
//!
//! Decoding is a two-step state machine. The header is inspected in place
//! (never consumed on its own) to learn the kind, which alone fixes the
//! frame size; the frame is consumed only once all of it is buffered.
//!
//! ```text
//! AwaitingHeader --8 bytes buffered--> HaveHeader(kind) --frame buffered--> AwaitingHeader
//! ```

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::message::{Message, MessageKind, HEADER_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    AwaitingHeader,
    HaveHeader(MessageKind),
}

/// Tokio codec for relay messages
///
/// Works over any buffered byte stream; wrap a socket half in
/// `FramedRead`/`FramedWrite` or the whole stream in `Framed`.
#[derive(Debug)]
pub struct RelayCodec {
    state: DecodeState,
}

impl RelayCodec {
    pub fn new() -> Self {
        Self {
            state: DecodeState::AwaitingHeader,
        }
    }

    /// Bytes needed to finish whatever the decoder is currently waiting on
    fn expected_len(&self) -> usize {
        match self.state {
            DecodeState::AwaitingHeader => HEADER_LEN,
            DecodeState::HaveHeader(kind) => kind.frame_len(),
        }
    }
}

impl Default for RelayCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Inspect the header at the front of `src` without consuming it
///
/// Returns `Ok(None)` while fewer than `HEADER_LEN` bytes are buffered.
fn peek_header(src: &BytesMut) -> Result<Option<MessageKind>, ProtocolError> {
    if src.len() < HEADER_LEN {
        return Ok(None);
    }

    let raw_kind = u32::from_be_bytes([src[0], src[1], src[2], src[3]]);
    let length = u32::from_be_bytes([src[4], src[5], src[6], src[7]]);

    let kind = MessageKind::from_wire(raw_kind).ok_or(ProtocolError::UnknownKind(raw_kind))?;
    if length as usize != kind.frame_len() {
        return Err(ProtocolError::LengthMismatch {
            kind,
            expected: kind.frame_len(),
            actual: length,
        });
    }

    Ok(Some(kind))
}

impl Decoder for RelayCodec {
    type Item = Message;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, ProtocolError> {
        let kind = match self.state {
            DecodeState::AwaitingHeader => match peek_header(src)? {
                Some(kind) => {
                    self.state = DecodeState::HaveHeader(kind);
                    kind
                }
                None => return Ok(None),
            },
            DecodeState::HaveHeader(kind) => kind,
        };

        let frame_len = kind.frame_len();
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        let frame = src.split_to(frame_len).freeze();
        self.state = DecodeState::AwaitingHeader;
        Ok(Some(Message::decode_body(kind, frame.slice(HEADER_LEN..))))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Message>, ProtocolError> {
        if let Some(msg) = self.decode(src)? {
            return Ok(Some(msg));
        }

        if src.is_empty() {
            Ok(None)
        } else {
            Err(ProtocolError::TruncatedFrame {
                expected: self.expected_len(),
                received: src.len(),
            })
        }
    }
}

impl Encoder<Message> for RelayCodec {
    type Error = ProtocolError;

    fn encode(&mut self, msg: Message, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        msg.encode(dst);
        Ok(())
    }
}
