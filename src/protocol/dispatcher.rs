//! Inbound frame routing for the messaging phase.
//!
//! While messaging, the chat node may push messages at any time, including between
//! a request and its response. [`Dispatcher::next`] reads exactly one frame and
//! sorts it:
//!
//! - a get-message response is decoded and returned as a [`ChatMessage`] push
//! - the awaited response type (if any) is decoded and returned to the caller
//! - anything else is drained by its declared length and reported as a
//!   recoverable error, leaving the stream on the next header

use tokio::io::{AsyncRead, AsyncWrite};

use crate::core::body::Body;
use crate::core::header::{FrameType, Header, PROTOCOL_VERSION};
use crate::error::{ProtocolError, Result};
use crate::protocol::messaging::ChatMessage;
use crate::transport::Transport;

/// One frame read by the dispatcher
#[derive(Debug)]
pub enum Inbound {
    Push(ChatMessage),
    Response { header: Header, body: Body },
}

/// Routes inbound frames, optionally waiting on one response type.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dispatcher {
    awaiting: Option<FrameType>,
}

impl Dispatcher {
    /// Accept pushes only
    pub fn idle() -> Self {
        Self { awaiting: None }
    }

    /// Accept pushes and responses of `frame_type`
    pub fn awaiting(frame_type: FrameType) -> Self {
        Self {
            awaiting: Some(frame_type),
        }
    }

    /// Read and route one frame.
    ///
    /// [`ProtocolError::UnknownFrameType`] and [`ProtocolError::UnexpectedFrame`] are
    /// returned only after the frame's body has been consumed.
    pub async fn next<S>(&self, transport: &mut Transport<S>) -> Result<Inbound>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let header = match transport.recv_header().await {
            Ok(header) => header,
            Err(ProtocolError::UnknownFrameType {
                type_byte,
                body_length,
            }) => {
                transport.drain(body_length).await?;
                return Err(ProtocolError::UnknownFrameType {
                    type_byte,
                    body_length,
                });
            }
            Err(e) => return Err(e),
        };

        if header.version != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(header.version));
        }

        match header.frame_type {
            FrameType::GetMessageResponse => match transport.recv_body(&header).await? {
                Body::GetMessage(message) => Ok(Inbound::Push(ChatMessage::from(message))),
                _ => Err(ProtocolError::BodyTypeMismatch(header.frame_type)),
            },
            frame_type if Some(frame_type) == self.awaiting => {
                let body = transport.recv_body(&header).await?;
                Ok(Inbound::Response { header, body })
            }
            actual => {
                transport.drain(header.body_length).await?;
                Err(ProtocolError::UnexpectedFrame {
                    expected: self.awaiting.unwrap_or(FrameType::GetMessageResponse),
                    actual,
                })
            }
        }
    }
}
