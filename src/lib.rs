//! # BIG Chat Client
//!
//! Client and session engine for the BIG Chat binary protocol over TCP.
//!
//! A client asks a manager for a chat node, creates an account on that node, logs
//! in, picks a channel and then exchanges messages, including messages the node
//! pushes without being asked.
//!
//! ## Wire Format
//! ```text
//! [Version(1)] [Type(1)] [Status(1)] [Reserved(1)] [BodyLength(4, BE)] [Body(N)]
//! ```
//!
//! ## Layout
//! - [`core`]: header, typed bodies and the frame encoder
//! - [`transport`]: exact-length stream I/O and the connector seam
//! - [`protocol`]: phases, session state machine, dispatcher and messaging loop
//! - [`service`]: console and fatal error sink
//! - [`config`], [`error`], [`utils`]: ambient support
//!
//! ## Example
//! ```no_run
//! use big_chat_client::config::ChatConfig;
//! use big_chat_client::protocol::SessionMachine;
//! use big_chat_client::service::StdConsole;
//! use big_chat_client::transport::TcpConnector;
//!
//! # async fn run() -> big_chat_client::error::Result<()> {
//! let config = ChatConfig::default_with_overrides(|c| c.manager.port = 7000);
//! let manager = config.manager.socket_addr()?;
//! let connector = TcpConnector::new(config.client.connect_timeout);
//!
//! let mut machine = SessionMachine::new(manager, config.client, connector, StdConsole::new()?);
//! let (_shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel(1);
//! machine.run(&mut shutdown_rx).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;
