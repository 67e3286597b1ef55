//! Per-connection handler
//!
//! One task per accepted connection. Reads frames, keeps the display
//! name, triggers broadcasts, and unregisters the connection when it ends.

use std::fmt;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::RelayCodec;
use crate::connection::Connection;
use crate::error::ProtocolError;
use crate::message::Message;
use crate::registry::Registry;

/// Why a handler stopped
#[derive(Debug)]
pub enum CloseReason {
    /// Client closed the stream on a frame boundary
    PeerClosed,
    /// Client sent Exit
    Exit,
    /// Client violated the protocol
    Protocol(ProtocolError),
    /// Socket read failed
    Transport(std::io::Error),
    /// Server asked the connection to close
    Shutdown,
}

impl From<ProtocolError> for CloseReason {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Io(e) => CloseReason::Transport(e),
            other => CloseReason::Protocol(other),
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::PeerClosed => write!(f, "peer closed the connection"),
            CloseReason::Exit => write!(f, "client requested exit"),
            CloseReason::Protocol(e) => write!(f, "protocol violation: {}", e),
            CloseReason::Transport(e) => write!(f, "transport error: {}", e),
            CloseReason::Shutdown => write!(f, "server shutdown"),
        }
    }
}

enum HandlerState {
    Active,
    Closing(CloseReason),
}

/// Drive one connection until it closes
///
/// The caller registers the connection's write side in `registry` before
/// spawning this; the handler removes it and shuts it down on the way out.
pub async fn handle_connection<R>(
    mut conn: Connection,
    reader: R,
    registry: Arc<Registry>,
    shutdown: CancellationToken,
) -> CloseReason
where
    R: AsyncRead + Unpin,
{
    info!("Starting handler for connection {}", conn.id);
    let mut frames = FramedRead::new(reader, RelayCodec::new());

    let reason = loop {
        let state = tokio::select! {
            _ = shutdown.cancelled() => HandlerState::Closing(CloseReason::Shutdown),
            frame = frames.next() => match frame {
                None => HandlerState::Closing(CloseReason::PeerClosed),
                Some(Err(e)) => HandlerState::Closing(e.into()),
                Some(Ok(msg)) => handle_message(&mut conn, msg, &registry).await,
            },
        };

        if let HandlerState::Closing(reason) = state {
            break reason;
        }
    };

    info!("Ending handler for connection {}: {}", conn.id, reason);

    if let Some(mut writer) = registry.remove(conn.id).await {
        if let Err(e) = writer.shutdown().await {
            debug!("Shutdown of connection {} failed: {}", conn.id, e);
        }
    }

    reason
}

async fn handle_message(conn: &mut Connection, msg: Message, registry: &Registry) -> HandlerState {
    match msg {
        Message::SetNick { nickname } => {
            let previous = conn.set_display_name(nickname);
            info!(
                "Client {} changed nickname from {} to {}",
                conn.id,
                String::from_utf8_lossy(&previous),
                conn.display_name_lossy()
            );
            HandlerState::Active
        }
        Message::TextFromClient { text } => {
            info!(
                "[{}] {}",
                conn.display_name_lossy(),
                String::from_utf8_lossy(&text)
            );
            registry.broadcast(conn.id, &conn.relay_text(text)).await;
            HandlerState::Active
        }
        Message::Exit => {
            info!("Client {} requested exit", conn.id);
            HandlerState::Closing(CloseReason::Exit)
        }
        other @ Message::TextFromServer { .. } => {
            warn!("Client {} sent a server-only message", conn.id);
            HandlerState::Closing(CloseReason::Protocol(ProtocolError::UnexpectedMessage(
                other.kind(),
            )))
        }
    }
}
