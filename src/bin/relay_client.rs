//! Text Relay Client - Entry Point
//!
//! Connects to the server and runs the interactive session on the console.
//! Logs go to stderr so they do not interleave with relayed text.

use tokio::io::BufReader;
use tokio::net::TcpStream;
use tracing::error;
use tracing_subscriber::EnvFilter;

use text_relay::session::USAGE;
use text_relay::{ClientConfig, ClientSession};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("text_relay=warn")),
        )
        .init();

    let config = ClientConfig::from_env()?;

    println!("Connecting to {}...", config.server_addr);
    let stream = match TcpStream::connect(&config.server_addr).await {
        Ok(stream) => stream,
        Err(e) => {
            println!("Connection failed!");
            error!("Connect to {} failed: {}", config.server_addr, e);
            return Err(e.into());
        }
    };

    println!("Connected to {}...", config.server_addr);
    println!("{}", USAGE);

    let input = BufReader::new(tokio::io::stdin());
    let mut output = tokio::io::stdout();
    let mut session = ClientSession::new(stream);

    if let Err(e) = session.run(input, &mut output).await {
        println!("Disconnected: {}", e);
        return Err(e.into());
    }

    Ok(())
}
