//! The interactive messaging loop.
//!
//! One task waits on three sources at once: the shutdown channel, the socket and
//! user input. Each wait is cancel-safe, so whichever source is not chosen loses
//! nothing. A typed line is sent and its response awaited before waiting resumes;
//! pushes that arrive in between are shown as they come.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::core::body::{Body, GetMessageBody, SendMessageBody};
use crate::core::codec::Frame;
use crate::core::header::FrameType;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::dispatcher::{Dispatcher, Inbound};
use crate::protocol::session::Session;
use crate::service::console::Console;
use crate::utils::time::unix_timestamp;

/// A chat message delivered by the node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub channel_id: u8,
    pub sender_id: u8,
    pub timestamp: u64,
    /// Message bytes, invalid UTF-8 replaced
    pub text: String,
}

impl From<GetMessageBody> for ChatMessage {
    fn from(body: GetMessageBody) -> Self {
        Self {
            channel_id: body.channel_id,
            sender_id: body.sender_id,
            timestamp: body.timestamp,
            text: String::from_utf8_lossy(&body.message).into_owned(),
        }
    }
}

/// Why the messaging loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// Shutdown was requested (ctrl-c)
    Interrupted,
    /// User input reached end of file
    InputClosed,
    /// The chat node closed the connection on a frame boundary
    PeerClosed,
}

enum Event {
    Shutdown,
    Socket(bool),
    Input(Option<String>),
}

/// Run the loop on the session's open connection.
pub async fn run<S, C>(
    session: &mut Session<S>,
    console: &mut C,
    shutdown: &mut mpsc::Receiver<()>,
    max_message_len: usize,
) -> Result<LoopExit>
where
    S: AsyncRead + AsyncWrite + Unpin,
    C: Console,
{
    let channel_id = session
        .roster()
        .selected()
        .ok_or(ProtocolError::NoChannels)?;
    console.print_status(&format!(
        "Chatting in channel {channel_id}. Type a message and press Enter; Ctrl-D or Ctrl-C to leave."
    ));

    loop {
        let event = {
            let transport = session.transport_mut()?;
            tokio::select! {
                Some(()) = shutdown.recv() => Event::Shutdown,
                ready = transport.readable() => Event::Socket(ready?),
                line = console.read_line() => Event::Input(line?),
            }
        };

        match event {
            Event::Shutdown => {
                info!("Shutdown requested");
                return Ok(LoopExit::Interrupted);
            }
            Event::Socket(false) => {
                warn!("{}", constants::ERR_CONNECTION_CLOSED);
                console.print_error(constants::ERR_CONNECTION_CLOSED);
                session.release().await;
                return Ok(LoopExit::PeerClosed);
            }
            Event::Socket(true) => receive(session, console, Dispatcher::idle()).await?,
            Event::Input(None) => {
                debug!("Input closed");
                return Ok(LoopExit::InputClosed);
            }
            Event::Input(Some(line)) => {
                send_line(session, console, channel_id, &line, max_message_len).await?
            }
        }
    }
}

/// Send one typed line and wait for the node to acknowledge it.
///
/// Empty lines are ignored; lines over `max_message_len` bytes are refused locally.
pub async fn send_line<S, C>(
    session: &mut Session<S>,
    console: &mut C,
    channel_id: u8,
    line: &str,
    max_message_len: usize,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    C: Console,
{
    if line.is_empty() {
        return Ok(());
    }
    if line.len() > max_message_len {
        warn!(length = line.len(), max_message_len, "Message too long, not sent");
        console.print_error(&format!(
            "Message too long ({} bytes, limit {max_message_len}); not sent.",
            line.len()
        ));
        return Ok(());
    }

    let frame = Frame::request(
        FrameType::SendMessageRequest,
        Body::SendMessage(SendMessageBody {
            auth: session.credentials().clone(),
            timestamp: unix_timestamp()?,
            channel_id,
            message: Bytes::copy_from_slice(line.as_bytes()),
        }),
    );

    let transport = session.transport_mut()?;
    transport.send_frame(&frame).await?;
    transport.metrics().chat_message_sent();

    let dispatcher = Dispatcher::awaiting(FrameType::SendMessageResponse);
    loop {
        match dispatcher.next(transport).await {
            Ok(Inbound::Response { header, .. }) => {
                if !header.status.is_ok() {
                    return Err(ProtocolError::StatusFailure {
                        operation: "Send message",
                        status: header.status,
                    });
                }
                return Ok(());
            }
            Ok(Inbound::Push(message)) => {
                transport.metrics().chat_message_received();
                console.show_message(&message);
            }
            Err(e) if e.is_recoverable() => {
                transport.metrics().protocol_warning();
                warn!(error = %e, "Skipped frame while awaiting send-message response");
            }
            Err(e) => return Err(e),
        }
    }
}

/// Handle one unsolicited frame while idle.
async fn receive<S, C>(session: &mut Session<S>, console: &mut C, dispatcher: Dispatcher) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    C: Console,
{
    let transport = session.transport_mut()?;
    match dispatcher.next(transport).await {
        Ok(Inbound::Push(message)) => {
            transport.metrics().chat_message_received();
            console.show_message(&message);
            Ok(())
        }
        Ok(Inbound::Response { header, .. }) => {
            // Idle dispatchers await nothing
            Err(ProtocolError::BodyTypeMismatch(header.frame_type))
        }
        Err(e) if e.is_recoverable() => {
            transport.metrics().protocol_warning();
            warn!(error = %e, "Skipped unsolicited frame");
            Ok(())
        }
        Err(e) => Err(e),
    }
}
