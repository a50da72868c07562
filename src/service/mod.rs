//! # Service Layer
//!
//! Collaborators around the session engine: the user console and the fatal
//! error sink.

pub mod console;
pub mod fatal;

pub use console::{prompt_line, Console, StdConsole};
pub use fatal::{fatal, FAILURE_STATUS};
