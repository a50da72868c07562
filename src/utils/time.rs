//! Timestamp utilities.

use std::io;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{constants, ProtocolError, Result};

/// Seconds since the Unix epoch, as carried in send-message bodies
pub fn unix_timestamp() -> Result<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| ProtocolError::Io(io::Error::other(constants::ERR_SYSTEM_TIME)))
}

/// Render a wire timestamp as `HH:MM:SS` (UTC)
pub fn clock_time(timestamp: u64) -> String {
    let secs = timestamp % 86_400;
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_timestamp_is_recent() {
        // 2020-01-01
        assert!(unix_timestamp().unwrap() > 1_577_836_800);
    }

    #[test]
    fn test_clock_time() {
        assert_eq!(clock_time(0), "00:00:00");
        assert_eq!(clock_time(86_400 + 3_723), "01:02:03");
    }
}
