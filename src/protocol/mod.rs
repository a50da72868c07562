//! # Protocol Layer
//!
//! The client session engine.
//!
//! ## Components
//! - **Phase**: the linear session lifecycle
//! - **Session**: session state and the [`SessionMachine`] that drives each phase
//! - **Dispatcher**: routing of inbound frames during messaging
//! - **Messaging**: the interactive send/receive loop
//!
//! ## Lifecycle
//! ```text
//! Disconnected -> Discovering -> ConnectingToServer -> AwaitingUserInfo
//!              -> LoggedIn -> Messaging -> Exiting
//! ```
//! Any fatal error jumps straight to `Exiting` through the fatal sink.

pub mod dispatcher;
pub mod messaging;
pub mod phase;
pub mod session;

pub use dispatcher::{Dispatcher, Inbound};
pub use messaging::{ChatMessage, LoopExit};
pub use phase::Phase;
pub use session::{ChannelRoster, Session, SessionMachine};
