//! # Transport Layer
//!
//! Byte-stream plumbing beneath the session engine.
//!
//! ## Components
//! - **Stream**: exact-length reads and writes, frame send/receive, body draining
//! - **TCP**: the [`Connector`] seam and its TCP implementation
//!
//! Every connection is plain TCP to an IPv4 endpoint. Frames are never split or
//! merged by the transport; each call reads or writes exactly what it is asked for.

pub mod stream;
pub mod tcp;

pub use stream::{Transport, DEFAULT_MAX_BODY_SIZE};
pub use tcp::{Connection, Connector, TcpConnector};
