//! Observability and Metrics
//!
//! Counters for frames, bytes and chat traffic over the lifetime of a session.
//!
//! Uses atomic counters so a single collector can be shared by every connection a
//! session opens.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Metrics collector for one client session
#[derive(Debug)]
pub struct Metrics {
    /// Connections opened (discovery, registration, login, logout)
    pub connections_total: AtomicU64,
    /// Frames written to the wire
    pub frames_sent: AtomicU64,
    /// Frame headers read from the wire
    pub frames_received: AtomicU64,
    /// Total bytes sent
    pub bytes_sent: AtomicU64,
    /// Total bytes received, drained bodies included
    pub bytes_received: AtomicU64,
    /// Frames consumed and discarded
    pub frames_drained: AtomicU64,
    /// Chat messages sent by the user
    pub chat_messages_sent: AtomicU64,
    /// Chat messages displayed
    pub chat_messages_received: AtomicU64,
    /// Unknown or out-of-place frames
    pub protocol_warnings: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            frames_sent: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            frames_drained: AtomicU64::new(0),
            chat_messages_sent: AtomicU64::new(0),
            chat_messages_received: AtomicU64::new(0),
            protocol_warnings: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn connection_opened(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a frame written, header included
    pub fn frame_sent(&self, byte_count: u64) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, byte_count: u64) {
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn frame_drained(&self) {
        self.frames_drained.fetch_add(1, Ordering::Relaxed);
    }

    pub fn chat_message_sent(&self) {
        self.chat_messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn chat_message_received(&self) {
        self.chat_messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_warning(&self) {
        self.protocol_warnings.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            frames_drained: self.frames_drained.load(Ordering::Relaxed),
            chat_messages_sent: self.chat_messages_sent.load(Ordering::Relaxed),
            chat_messages_received: self.chat_messages_received.load(Ordering::Relaxed),
            protocol_warnings: self.protocol_warnings.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            connections_total = snapshot.connections_total,
            frames_sent = snapshot.frames_sent,
            frames_received = snapshot.frames_received,
            bytes_sent = snapshot.bytes_sent,
            bytes_received = snapshot.bytes_received,
            frames_drained = snapshot.frames_drained,
            chat_messages_sent = snapshot.chat_messages_sent,
            chat_messages_received = snapshot.chat_messages_received,
            protocol_warnings = snapshot.protocol_warnings,
            uptime_seconds = snapshot.uptime_seconds,
            "Session metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub frames_sent: u64,
    pub frames_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub frames_drained: u64,
    pub chat_messages_sent: u64,
    pub chat_messages_received: u64,
    pub protocol_warnings: u64,
    pub uptime_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = Metrics::new();
        metrics.frame_sent(13);
        metrics.frame_sent(8);
        metrics.bytes_read(41);
        metrics.frame_drained();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.frames_sent, 2);
        assert_eq!(snapshot.bytes_sent, 21);
        assert_eq!(snapshot.bytes_received, 41);
        assert_eq!(snapshot.frames_drained, 1);
        assert_eq!(snapshot.chat_messages_received, 0);
    }
}
