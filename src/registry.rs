//! Connection registry and broadcast engine
//!
//! The registry is the only shared mutable state in the server. Every
//! access, traversal included, goes through one exclusive lock. The lock
//! is held for the whole broadcast fan-out, which gives all broadcasts a
//! single total order but means one slow peer stalls every other sender
//! as well as insert and remove.

use std::collections::HashMap;

use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::message::Message;
use crate::types::ConnectionId;

/// Write side of a registered connection
pub type PeerWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A registered connection as seen by other handlers
struct Peer {
    writer: PeerWriter,
    shutdown: CancellationToken,
}

/// Outcome of one broadcast pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Peers the frame was fully written to
    pub delivered: usize,
    /// Peers whose write failed
    pub failed: usize,
}

/// Registry of live connections
///
/// A connection is present exactly while its handler runs. Keyed by
/// `ConnectionId`, so removal is a key deletion.
#[derive(Default)]
pub struct Registry {
    peers: Mutex<HashMap<ConnectionId, Peer>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection's write side and its shutdown token
    pub async fn insert<W>(&self, id: ConnectionId, writer: W, shutdown: CancellationToken)
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let mut peers = self.peers.lock().await;
        let peer = Peer {
            writer: Box::new(writer),
            shutdown,
        };
        if peers.insert(id, peer).is_some() {
            warn!("Connection {} was already registered, replaced", id);
        }
        debug!("Registered connection {}, total: {}", id, peers.len());
    }

    /// Unregister a connection, handing its write side back for closing
    pub async fn remove(&self, id: ConnectionId) -> Option<PeerWriter> {
        let mut peers = self.peers.lock().await;
        let peer = peers.remove(&id)?;
        debug!("Unregistered connection {}, total: {}", id, peers.len());
        Some(peer.writer)
    }

    /// Send `msg` to every registered connection except `sender`
    ///
    /// Best effort: a failed write is logged and counted, never retried,
    /// and does not unregister the peer. Its own handler notices the
    /// broken socket and cleans up.
    pub async fn broadcast(&self, sender: ConnectionId, msg: &Message) -> BroadcastReport {
        let mut frame = BytesMut::new();
        msg.encode(&mut frame);

        let mut report = BroadcastReport::default();
        let mut peers = self.peers.lock().await;

        for (&id, peer) in peers.iter_mut() {
            if id == sender {
                continue;
            }

            match write_frame(&mut peer.writer, &frame).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!("Broadcast from {} to {} failed: {}", sender, id, e);
                    report.failed += 1;
                }
            }
        }

        debug!(
            "Broadcast from {}: delivered {}, failed {}",
            sender, report.delivered, report.failed
        );
        report
    }

    /// Ask a connection's handler to close it
    ///
    /// Returns false if the connection is not registered.
    pub async fn disconnect(&self, id: ConnectionId) -> bool {
        let peers = self.peers.lock().await;
        match peers.get(&id) {
            Some(peer) => {
                peer.shutdown.cancel();
                true
            }
            None => false,
        }
    }

    /// Whether a connection is registered
    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.peers.lock().await.contains_key(&id)
    }

    /// Number of registered connections
    pub async fn len(&self) -> usize {
        self.peers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.peers.lock().await.is_empty()
    }
}

async fn write_frame(writer: &mut PeerWriter, frame: &[u8]) -> std::io::Result<()> {
    writer.write_all(frame).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::Bytes;
    use futures_util::StreamExt;
    use tokio::io::{duplex, AsyncReadExt, DuplexStream};
    use tokio_util::codec::FramedRead;

    use crate::codec::RelayCodec;
    use crate::message::MessageKind;

    fn relayed(text: &str) -> Message {
        Message::TextFromServer {
            nickname: Bytes::from_static(b"alice"),
            text: Bytes::copy_from_slice(text.as_bytes()),
        }
    }

    async fn register(registry: &Registry, id: u64) -> DuplexStream {
        let (writer, reader) = duplex(8192);
        registry
            .insert(ConnectionId(id), writer, CancellationToken::new())
            .await;
        reader
    }

    #[tokio::test]
    async fn test_insert_and_remove() {
        let registry = Registry::new();
        let _reader = register(&registry, 1).await;

        assert!(registry.contains(ConnectionId(1)).await);
        assert_eq!(registry.len().await, 1);

        assert!(registry.remove(ConnectionId(1)).await.is_some());
        assert!(registry.remove(ConnectionId(1)).await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_broadcast_skips_sender() {
        let registry = Registry::new();
        let mut sender = register(&registry, 0).await;
        let peers = [register(&registry, 1).await, register(&registry, 2).await];

        let report = registry.broadcast(ConnectionId(0), &relayed("hello")).await;
        assert_eq!(
            report,
            BroadcastReport {
                delivered: 2,
                failed: 0
            }
        );

        for peer in peers {
            let mut frames = FramedRead::new(peer, RelayCodec::new());
            assert_eq!(frames.next().await.unwrap().unwrap(), relayed("hello"));
        }

        // Closing the sender's writer must leave nothing behind for it
        drop(registry.remove(ConnectionId(0)).await);
        let mut leftover = Vec::new();
        sender.read_to_end(&mut leftover).await.unwrap();
        assert!(leftover.is_empty());
    }

    #[tokio::test]
    async fn test_failed_peer_does_not_stop_fan_out() {
        let registry = Registry::new();
        let broken = register(&registry, 1).await;
        let healthy = register(&registry, 2).await;
        drop(broken);

        let report = registry.broadcast(ConnectionId(0), &relayed("hi")).await;
        assert_eq!(
            report,
            BroadcastReport {
                delivered: 1,
                failed: 1
            }
        );

        // Broadcaster never evicts; the owning handler does
        assert!(registry.contains(ConnectionId(1)).await);

        let mut frames = FramedRead::new(healthy, RelayCodec::new());
        assert_eq!(frames.next().await.unwrap().unwrap(), relayed("hi"));
    }

    #[tokio::test]
    async fn test_remove_waits_for_broadcast_in_progress() {
        let registry = Arc::new(Registry::new());
        let (slow_writer, mut slow_reader) = duplex(64);
        registry
            .insert(ConnectionId(1), slow_writer, CancellationToken::new())
            .await;

        let broadcaster = Arc::clone(&registry);
        let broadcast = tokio::spawn(async move {
            broadcaster
                .broadcast(ConnectionId(0), &relayed("blocked"))
                .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let remover = Arc::clone(&registry);
        let remove = tokio::spawn(async move { remover.remove(ConnectionId(1)).await.is_some() });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!remove.is_finished());

        let mut frame = vec![0u8; MessageKind::TextFromServer.frame_len()];
        slow_reader.read_exact(&mut frame).await.unwrap();

        let report = broadcast.await.unwrap();
        assert_eq!(report.delivered, 1);
        assert!(remove.await.unwrap());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_disconnect_cancels_token() {
        let registry = Registry::new();
        let token = CancellationToken::new();
        let (writer, _reader) = duplex(64);
        registry.insert(ConnectionId(5), writer, token.clone()).await;

        assert!(registry.disconnect(ConnectionId(5)).await);
        assert!(token.is_cancelled());
        assert!(!registry.disconnect(ConnectionId(6)).await);
    }
}
