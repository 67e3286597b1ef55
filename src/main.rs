//! Text Relay Server - Entry Point
//!
//! Binds the listener and runs the accept loop until Ctrl-C.

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use text_relay::{RelayServer, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=text_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("text_relay=info")),
        )
        .init();

    let config = ServerConfig::from_env()?;

    let server = match RelayServer::bind(&config.bind_addr).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to listen on {}: {}", config.bind_addr, e);
            return Err(e.into());
        }
    };

    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                shutdown.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    server.run().await;

    Ok(())
}
