//! Exact-length frame I/O over a single byte stream.
//!
//! Reads go through a [`BufReader`] so that waiting for readability never consumes
//! bytes: [`Transport::readable`] only fills the buffer, and a header read that
//! follows picks up where it left off. This keeps the wait cancel-safe inside
//! `tokio::select!`.

use bytes::BytesMut;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::codec::Encoder;
use tracing::{debug, trace};

use crate::core::body::{decode_body, Body};
use crate::core::codec::{Frame, FrameCodec};
use crate::core::header::{Header, HEADER_LEN};
use crate::error::{ProtocolError, Result};
use crate::utils::metrics::Metrics;

/// Largest body the client will allocate for by default (1 MiB)
pub const DEFAULT_MAX_BODY_SIZE: u32 = 1024 * 1024;

/// A connected stream plus the framing rules used on it.
pub struct Transport<S> {
    reader: BufReader<S>,
    peer: SocketAddrV4,
    local_ip: Ipv4Addr,
    write_buf: BytesMut,
    max_body_size: u32,
    metrics: Arc<Metrics>,
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, peer: SocketAddrV4, local_ip: Ipv4Addr) -> Self {
        Self {
            reader: BufReader::new(stream),
            peer,
            local_ip,
            write_buf: BytesMut::with_capacity(256),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn with_max_body_size(mut self, max_body_size: u32) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn peer(&self) -> SocketAddrV4 {
        self.peer
    }

    /// Local IPv4 address of this connection, as reported in login requests
    pub fn local_ip(&self) -> Ipv4Addr {
        self.local_ip
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Write every byte of `bytes`, then flush.
    pub async fn send_exact(&mut self, bytes: &[u8]) -> Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(bytes).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Read exactly `n` bytes.
    ///
    /// A close before the first byte is [`ProtocolError::ConnectionClosed`]; a close
    /// part way through is [`ProtocolError::ShortRead`].
    pub async fn recv_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        let mut filled = 0;

        while filled < n {
            let read = self.reader.read(&mut buf[filled..]).await?;
            if read == 0 {
                return Err(closed_error(n, filled));
            }
            filled += read;
        }

        self.metrics.bytes_read(n as u64);
        Ok(buf)
    }

    /// Consume and discard exactly `n` bytes without buffering them all.
    pub async fn discard_exact(&mut self, n: usize) -> Result<()> {
        let mut remaining = n;

        while remaining > 0 {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                return Err(closed_error(n, n - remaining));
            }
            let take = available.len().min(remaining);
            self.reader.consume(take);
            remaining -= take;
        }

        self.metrics.bytes_read(n as u64);
        Ok(())
    }

    /// Wait until at least one byte is buffered.
    ///
    /// Returns `false` when the peer has closed the stream. Cancel-safe.
    pub async fn readable(&mut self) -> Result<bool> {
        Ok(!self.reader.fill_buf().await?.is_empty())
    }

    /// Encode and write one frame.
    pub async fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        self.write_buf.clear();
        FrameCodec.encode(frame, &mut self.write_buf)?;
        let bytes = self.write_buf.split();
        self.send_exact(&bytes).await?;

        self.metrics.frame_sent(bytes.len() as u64);
        debug!(
            frame_type = %frame.frame_type,
            body_length = bytes.len() - HEADER_LEN,
            peer = %self.peer,
            "Sent frame"
        );
        Ok(())
    }

    /// Read and decode the next 8-byte header.
    pub async fn recv_header(&mut self) -> Result<Header> {
        let bytes = self.recv_exact(HEADER_LEN).await?;
        let mut raw = [0u8; HEADER_LEN];
        raw.copy_from_slice(&bytes);

        self.metrics.frame_received();
        let header = Header::decode(&raw)?;
        trace!(
            frame_type = %header.frame_type,
            status = %header.status,
            body_length = header.body_length,
            "Received header"
        );
        Ok(header)
    }

    /// Read and decode the body announced by `header`.
    ///
    /// The declared length is checked against the type's layout and the allocation
    /// limit before any body byte is read.
    pub async fn recv_body(&mut self, header: &Header) -> Result<Body> {
        header.check_layout()?;
        if header.body_length > self.max_body_size {
            return Err(ProtocolError::OversizedBody(header.body_length));
        }

        let body = self.recv_exact(header.body_len()).await?;
        decode_body(header.frame_type, &body)
    }

    /// Read one complete frame.
    pub async fn recv_frame(&mut self) -> Result<(Header, Body)> {
        let header = self.recv_header().await?;
        let body = self.recv_body(&header).await?;
        Ok((header, body))
    }

    /// Discard a body of `body_length` bytes, leaving the stream on the next header.
    pub async fn drain(&mut self, body_length: u32) -> Result<()> {
        self.discard_exact(body_length as usize).await?;
        self.metrics.frame_drained();
        Ok(())
    }

    /// Close the write half. Errors are ignored since the stream is being dropped.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.reader.get_mut().shutdown().await {
            trace!(error = %e, peer = %self.peer, "Shutdown after close");
        }
    }
}

fn closed_error(expected: usize, received: usize) -> ProtocolError {
    if received == 0 {
        ProtocolError::ConnectionClosed
    } else {
        ProtocolError::ShortRead { expected, received }
    }
}
