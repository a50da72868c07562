//! # Wire Codec
//!
//! Frame header, typed bodies and the frame encoder.
//!
//! ## Wire Format
//! ```text
//! [Version(1)] [Type(1)] [Status(1)] [Reserved(1)] [BodyLength(4, BE)] [Body(N)]
//! ```
//!
//! `BodyLength` is always the exact number of body bytes, trailer included. Each type
//! byte is bound to a single [`BodyLayout`](header::BodyLayout); a declared length
//! that the layout cannot accept is rejected before any body byte is read.

pub mod body;
pub mod codec;
pub mod header;

pub use body::{decode_body, Body, Credentials};
pub use codec::{encode, Frame, FrameCodec};
pub use header::{FrameType, Header, StatusCode, HEADER_LEN, PROTOCOL_VERSION};
