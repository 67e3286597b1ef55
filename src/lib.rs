//! Multi-user Text Relay Library
//!
//! Clients connect over TCP, optionally set a display name, and send text
//! lines that the server relays to every other connected client.
//!
//! # Features
//! - Fixed-layout binary protocol with four message kinds
//! - Display names (`Client <id>` until changed)
//! - Fan-out of text to all other connections
//! - Orderly exit and server-initiated disconnect
//! - Non-blocking client drain loop
//!
//! # Architecture
//! - `Registry` owns the write side of every live connection behind a
//!   single lock; insert, remove, and broadcast are the only ways in
//! - Each accepted connection runs `handle_connection` in its own task
//! - `ClientSession` is the single-task client loop
//!
//! # Example
//! ```ignore
//! use text_relay::RelayServer;
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = RelayServer::bind("127.0.0.1:10000").await.unwrap();
//!     server.run().await;
//! }
//! ```

pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod message;
pub mod registry;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use codec::RelayCodec;
pub use config::{ClientConfig, ServerConfig};
pub use connection::Connection;
pub use error::{AppError, ProtocolError};
pub use handler::{handle_connection, CloseReason};
pub use message::{Message, MessageKind};
pub use registry::{BroadcastReport, Registry};
pub use server::RelayServer;
pub use session::{ClientSession, InputCommand};
pub use types::ConnectionId;
