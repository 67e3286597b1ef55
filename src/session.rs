//! Client session loop
//!
//! Single task, no locks. Each iteration reads one console line, sends
//! whatever it maps to, then drains every message the server has already
//! delivered without ever waiting on the network.
//!
//! Console lines are taken as raw bytes and sent unchanged; received
//! names and text are decoded lossily only for display.

use bytes::Bytes;
use futures_util::{FutureExt, SinkExt, StreamExt};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::codec::RelayCodec;
use crate::error::{AppError, ProtocolError};
use crate::message::Message;

/// Help text shown once the client is connected
pub const USAGE: &str = "Type in text to send, or use the following commands:\n\
/nick <nickname>: sets the nickname to use\n\
/exit: close the connection";

const NICK_PREFIX: &[u8] = b"/nick ";
const EXIT_PREFIX: &[u8] = b"/exit";

/// A parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCommand {
    /// `/nick <name>`
    Nick(Bytes),
    /// `/exit`
    Exit,
    /// Anything else that is not blank
    Text(Bytes),
}

impl InputCommand {
    /// Parse one console line; blank lines yield `None`
    ///
    /// Commands match case-insensitively on their prefix. Any other bytes
    /// are taken as text, whatever their encoding.
    pub fn parse(line: &[u8]) -> Option<Self> {
        let end = line
            .iter()
            .rposition(|&b| b != b'\r' && b != b'\n')
            .map_or(0, |last| last + 1);
        let line = &line[..end];

        if starts_with_ignore_case(line, NICK_PREFIX) {
            Some(InputCommand::Nick(Bytes::copy_from_slice(
                &line[NICK_PREFIX.len()..],
            )))
        } else if starts_with_ignore_case(line, EXIT_PREFIX) {
            Some(InputCommand::Exit)
        } else if line.is_empty() {
            None
        } else {
            Some(InputCommand::Text(Bytes::copy_from_slice(line)))
        }
    }

    /// Wire message for this command
    pub fn into_message(self) -> Message {
        match self {
            InputCommand::Nick(nickname) => Message::SetNick { nickname },
            InputCommand::Exit => Message::Exit,
            InputCommand::Text(text) => Message::TextFromClient { text },
        }
    }
}

fn starts_with_ignore_case(line: &[u8], prefix: &[u8]) -> bool {
    line.len() >= prefix.len() && line[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// Format a relayed message for the console
pub fn format_relayed(nickname: &[u8], text: &[u8]) -> String {
    format!(
        "[{}] {}\n",
        String::from_utf8_lossy(nickname),
        String::from_utf8_lossy(text)
    )
}

/// Client side of one relay connection
pub struct ClientSession<S> {
    framed: Framed<S, RelayCodec>,
}

impl<S> ClientSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            framed: Framed::new(stream, RelayCodec::new()),
        }
    }

    /// Run until `/exit`, end of input, or a fatal error
    ///
    /// Any failed send ends the session immediately, even if messages
    /// arrive afterwards. Exit is still sent on a best-effort basis when
    /// the session ends with an error.
    pub async fn run<I, O>(&mut self, input: I, output: &mut O) -> Result<(), AppError>
    where
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin,
    {
        let result = self.run_loop(input, output).await;

        if let Err(e) = &result {
            warn!("Session ended with error: {}", e);
            if let Err(send_err) = self.framed.send(Message::Exit).await {
                debug!("Could not send exit: {}", send_err);
            }
        }

        result
    }

    async fn run_loop<I, O>(&mut self, mut input: I, output: &mut O) -> Result<(), AppError>
    where
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin,
    {
        let mut line = Vec::new();

        loop {
            line.clear();
            let command = match input.read_until(b'\n', &mut line).await? {
                0 => {
                    debug!("Console input closed");
                    Some(InputCommand::Exit)
                }
                _ => InputCommand::parse(&line),
            };

            match command {
                Some(InputCommand::Exit) => {
                    self.framed.send(Message::Exit).await?;
                    info!("Exit sent, closing session");
                    return Ok(());
                }
                Some(command) => self.framed.send(command.into_message()).await?,
                None => {}
            }

            self.drain(output).await?;
        }
    }

    /// Display every message that is already available, without blocking
    ///
    /// Returns how many messages were shown. A single poll of the stream
    /// that comes back pending means no data is waiting; a partial frame
    /// stays buffered for the next call.
    pub async fn drain<O>(&mut self, output: &mut O) -> Result<usize, AppError>
    where
        O: AsyncWrite + Unpin,
    {
        let mut shown = 0;

        loop {
            let next = match self.framed.next().now_or_never() {
                None => return Ok(shown),
                Some(next) => next,
            };

            match next {
                None => return Err(AppError::ConnectionClosed),
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(Message::TextFromServer { nickname, text })) => {
                    output
                        .write_all(format_relayed(&nickname, &text).as_bytes())
                        .await?;
                    output.flush().await?;
                    shown += 1;
                }
                Some(Ok(other)) => {
                    return Err(ProtocolError::UnexpectedMessage(other.kind()).into());
                }
            }
        }
    }
}
