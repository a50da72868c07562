//! # Utility Modules
//!
//! Supporting utilities for logging, timing and observability.
//!
//! ## Components
//! - **Logging**: Structured logging setup on stderr
//! - **Metrics**: Frame and message counters
//! - **Time**: Wall-clock timestamps for outbound messages
//! - **Timeout**: Async timeout wrappers

pub mod logging;
pub mod metrics;
pub mod time;
pub mod timeout;

pub use metrics::{Metrics, MetricsSnapshot};
