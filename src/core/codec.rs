//! Frame encoding.
//!
//! [`FrameCodec`] is a `tokio_util` encoder that writes the 8-byte header and the
//! serialized body into one buffer, with `body_length` taken from the body actually
//! written.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::Encoder;

use crate::core::body::{encode_body, Body};
use crate::core::header::{FrameType, Header, StatusCode, HEADER_LEN};
use crate::error::{ProtocolError, Result};

/// One header + body, transmitted as a unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub frame_type: FrameType,
    pub status: StatusCode,
    pub body: Body,
}

impl Frame {
    pub fn new(frame_type: FrameType, status: StatusCode, body: Body) -> Self {
        Self {
            frame_type,
            status,
            body,
        }
    }

    /// Client requests always carry status OK
    pub fn request(frame_type: FrameType, body: Body) -> Self {
        Self::new(frame_type, StatusCode::Ok, body)
    }

    /// Serialize to a standalone buffer
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        FrameCodec.encode(self, &mut buf)?;
        Ok(buf.freeze())
    }
}

/// Encode a frame: header followed by body, `body_length` set to the bytes written.
pub fn encode(frame_type: FrameType, status: StatusCode, body: &Body) -> Result<Bytes> {
    Frame::new(frame_type, status, body.clone()).to_bytes()
}

/// Frame encoder for BIG Chat byte streams.
///
/// The header is written with a zero length, the body is serialized behind it, and
/// the length field is then patched with the number of body bytes actually written.
pub struct FrameCodec;

impl<'a> Encoder<&'a Frame> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: &'a Frame, dst: &mut BytesMut) -> Result<()> {
        let start = dst.len();
        dst.reserve(HEADER_LEN + frame.frame_type.layout().min_len());

        Header::new(frame.frame_type, frame.status, 0).encode_into(dst);

        if let Err(e) = encode_body(frame.frame_type, &frame.body, dst) {
            dst.truncate(start);
            return Err(e);
        }

        let written = dst.len() - start - HEADER_LEN;
        let body_length = match u32::try_from(written) {
            Ok(len) => len,
            Err(_) => {
                dst.truncate(start);
                return Err(ProtocolError::OversizedBody(u32::MAX));
            }
        };
        dst[start + 4..start + HEADER_LEN].copy_from_slice(&body_length.to_be_bytes());

        Ok(())
    }
}
