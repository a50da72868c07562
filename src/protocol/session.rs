//! Client session state and the phase-driving engine.
//!
//! A session runs strictly in order: discovery through the manager, account
//! registration on the chat node, login, channel listing and selection, the
//! messaging loop, then logout. Discovery and registration each use a connection
//! that is closed once the exchange completes. The login connection stays open
//! for messaging and carries the logout request.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument};

use crate::config::ClientConfig;
use crate::core::body::{
    AccountBody, Body, ChannelInfoBody, ChannelListBody, Credentials, DiscoveryBody, LoginBody,
};
use crate::core::codec::Frame;
use crate::core::header::{FrameType, PROTOCOL_VERSION};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::messaging::{self, LoopExit};
use crate::protocol::phase::Phase;
use crate::service::console::{prompt_line, prompt_non_empty, Console};
use crate::service::fatal::fatal;
use crate::transport::{Connection, Connector, Transport};
use crate::utils::metrics::Metrics;

/// Channels offered by the chat node and the one the user picked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelRoster {
    ids: Vec<u8>,
    selected: Option<u8>,
}

impl ChannelRoster {
    pub fn new(ids: Vec<u8>) -> Self {
        Self { ids, selected: None }
    }

    pub fn ids(&self) -> &[u8] {
        &self.ids
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: u8) -> bool {
        self.ids.contains(&id)
    }

    pub fn first(&self) -> Option<u8> {
        self.ids.first().copied()
    }

    /// Select `id` if the node offered it
    pub fn select(&mut self, id: u8) -> bool {
        if self.contains(id) {
            self.selected = Some(id);
            true
        } else {
            false
        }
    }

    pub fn selected(&self) -> Option<u8> {
        self.selected
    }
}

/// Everything the client knows about its session.
pub struct Session<S> {
    phase: Phase,
    manager: SocketAddrV4,
    server: Option<SocketAddrV4>,
    node_id: Option<u8>,
    credentials: Credentials,
    account_id: Option<u8>,
    roster: ChannelRoster,
    transport: Option<Transport<S>>,
    metrics: Arc<Metrics>,
}

impl<S> Session<S> {
    pub fn new(manager: SocketAddrV4) -> Self {
        Self {
            phase: Phase::Disconnected,
            manager,
            server: None,
            node_id: None,
            credentials: Credentials::default(),
            account_id: None,
            roster: ChannelRoster::default(),
            transport: None,
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Move to `to`, which must be the phase immediately after the current one.
    pub fn advance(&mut self, to: Phase) -> Result<()> {
        if self.phase.next() != Some(to) {
            return Err(ProtocolError::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        debug!(from = %self.phase, %to, "Phase transition");
        self.phase = to;
        Ok(())
    }

    fn require(&self, expected: Phase) -> Result<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(ProtocolError::WrongPhase {
                expected,
                actual: self.phase,
            })
        }
    }

    pub fn manager(&self) -> SocketAddrV4 {
        self.manager
    }

    /// Chat node address learned from discovery
    pub fn server(&self) -> Option<SocketAddrV4> {
        self.server
    }

    pub fn node_id(&self) -> Option<u8> {
        self.node_id
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn account_id(&self) -> Option<u8> {
        self.account_id
    }

    pub fn roster(&self) -> &ChannelRoster {
        &self.roster
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// The open connection, or [`ProtocolError::ConnectionClosed`] when there is none
    pub fn transport_mut(&mut self) -> Result<&mut Transport<S>> {
        self.transport
            .as_mut()
            .ok_or(ProtocolError::ConnectionClosed)
    }

    /// Drop any open connection and mark the session as exiting.
    pub fn abandon(&mut self) {
        self.transport = None;
        self.phase = Phase::Exiting;
    }
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async fn attach(&mut self, transport: Transport<S>) {
        self.release().await;
        self.transport = Some(transport);
    }

    /// Close the open connection, if any.
    pub async fn release(&mut self) {
        if let Some(transport) = self.transport.take() {
            debug!(peer = %transport.peer(), "Closing connection");
            transport.shutdown().await;
        }
    }
}

/// Drives a [`Session`] through its phases using a connector and a console.
pub struct SessionMachine<C: Connector, U> {
    config: ClientConfig,
    connector: C,
    console: U,
    session: Session<C::Stream>,
    interruptible: Arc<AtomicBool>,
}

impl<C, U> SessionMachine<C, U>
where
    C: Connector,
    U: Console,
{
    pub fn new(manager: SocketAddrV4, config: ClientConfig, connector: C, console: U) -> Self {
        Self {
            config,
            connector,
            console,
            session: Session::new(manager),
            interruptible: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn session(&self) -> &Session<C::Stream> {
        &self.session
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn console(&self) -> &U {
        &self.console
    }

    /// Set only while the messaging loop is listening on its shutdown channel.
    ///
    /// An interrupt handler uses this to decide between signalling the loop and
    /// exiting outright.
    pub fn interruptible(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interruptible)
    }

    /// Run the whole lifecycle. `shutdown` interrupts the messaging loop.
    pub async fn run(&mut self, shutdown: &mut mpsc::Receiver<()>) -> Result<LoopExit> {
        self.discover().await?;
        self.register().await?;
        self.login().await?;
        self.list_channels().await?;
        self.select_channel().await?;
        if self.config.describe_channel {
            self.describe_channel().await?;
        }

        let exit = self.messaging(shutdown).await?;
        if exit == LoopExit::PeerClosed {
            self.session.advance(Phase::Exiting)?;
        } else {
            self.logout().await?;
        }

        self.session.metrics.log_metrics();
        Ok(exit)
    }

    /// Route `err` through the fatal sink and return the exit status.
    pub fn fail(&mut self, err: &ProtocolError) -> u8 {
        fatal(&mut self.session, &mut self.console, err)
    }

    /// Ask the manager which chat node to use.
    #[instrument(skip(self), fields(manager = %self.session.manager))]
    pub async fn discover(&mut self) -> Result<()> {
        self.session.advance(Phase::Discovering)?;
        let manager = self.session.manager;
        self.console
            .print_status(&format!("Discovering chat server via manager at {manager}..."));

        self.open(manager).await?;
        let body = self
            .exchange(
                Frame::request(
                    FrameType::DiscoveryRequest,
                    Body::Discovery(DiscoveryBody::request()),
                ),
                FrameType::DiscoveryResponse,
                "Discovery",
            )
            .await?;
        self.session.release().await;

        let Body::Discovery(found) = body else {
            return Err(ProtocolError::BodyTypeMismatch(FrameType::DiscoveryResponse));
        };

        self.session.advance(Phase::ConnectingToServer)?;
        let port = self.config.node_port.unwrap_or(manager.port());
        let server = SocketAddrV4::new(found.address, port);
        self.session.server = Some(server);
        self.session.node_id = Some(found.node_id);

        info!(%server, node_id = found.node_id, "Chat node discovered");
        self.console.print_status(&format!(
            "Assigned chat node {} at {server}",
            found.node_id
        ));

        self.session.advance(Phase::AwaitingUserInfo)
    }

    /// Prompt for credentials and create an account on the chat node.
    #[instrument(skip(self))]
    pub async fn register(&mut self) -> Result<()> {
        self.session.require(Phase::AwaitingUserInfo)?;
        let server = self.server()?;

        if self.session.credentials.is_empty() {
            let username = prompt_non_empty(
                &mut self.console,
                "Username: ",
                constants::ERR_EMPTY_USERNAME,
            )
            .await?;
            let password = prompt_non_empty(
                &mut self.console,
                "Password: ",
                constants::ERR_EMPTY_PASSWORD,
            )
            .await?;
            self.session.credentials = Credentials::new(&username, &password);
        }

        self.open(server).await?;
        let body = self
            .exchange(
                Frame::request(
                    FrameType::AccountCreateRequest,
                    Body::Account(AccountBody {
                        auth: self.session.credentials.clone(),
                        account_id: 0,
                    }),
                ),
                FrameType::AccountCreateResponse,
                "Registration",
            )
            .await?;
        self.session.release().await;

        let Body::Account(account) = body else {
            return Err(ProtocolError::BodyTypeMismatch(FrameType::AccountCreateResponse));
        };
        self.session.account_id = Some(account.account_id);

        info!(account_id = account.account_id, "Account created");
        self.console.print_status(&format!(
            "Account created for '{}' (id {})",
            self.session.credentials.username(),
            account.account_id
        ));
        Ok(())
    }

    /// Log in on a connection that stays open for the rest of the session.
    #[instrument(skip(self))]
    pub async fn login(&mut self) -> Result<()> {
        self.session.require(Phase::AwaitingUserInfo)?;
        let server = self.server()?;

        self.open(server).await?;
        self.login_exchange(true, "Login").await?;

        self.session.advance(Phase::LoggedIn)?;
        info!(%server, "Logged in");
        self.console.print_status("Login successful.");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_channels(&mut self) -> Result<()> {
        self.session.require(Phase::LoggedIn)?;

        let body = self
            .exchange(
                Frame::request(
                    FrameType::ChannelListRequest,
                    Body::ChannelList(ChannelListBody {
                        auth: self.session.credentials.clone(),
                        channel_ids: Vec::new(),
                    }),
                ),
                FrameType::ChannelListResponse,
                "Channel list",
            )
            .await?;

        let Body::ChannelList(list) = body else {
            return Err(ProtocolError::BodyTypeMismatch(FrameType::ChannelListResponse));
        };

        debug!(count = list.channel_ids.len(), "Channel list received");
        if list.channel_ids.is_empty() {
            self.console.print_status("No channels available.");
        } else {
            self.console.print_status(&format!(
                "Available channels: {}",
                join_ids(&list.channel_ids)
            ));
        }
        self.session.roster = ChannelRoster::new(list.channel_ids);
        Ok(())
    }

    /// Pick a channel from the roster. An empty line picks the first one.
    pub async fn select_channel(&mut self) -> Result<u8> {
        self.session.require(Phase::LoggedIn)?;
        let first = self.session.roster.first().ok_or(ProtocolError::NoChannels)?;

        loop {
            let line = prompt_line(
                &mut self.console,
                &format!("Select channel [{first}]: "),
            )
            .await?;
            let line = line.trim();

            let choice = if line.is_empty() {
                Some(first)
            } else {
                line.parse::<u8>().ok()
            };

            match choice {
                Some(id) if self.session.roster.select(id) => {
                    info!(channel_id = id, "Channel selected");
                    self.console.print_status(&format!("Joined channel {id}."));
                    return Ok(id);
                }
                _ => self.console.print_error(&format!(
                    "Unknown channel '{line}'. Choose one of: {}",
                    join_ids(self.session.roster.ids())
                )),
            }
        }
    }

    /// Fetch and show the selected channel's name and members.
    #[instrument(skip(self))]
    pub async fn describe_channel(&mut self) -> Result<()> {
        self.session.require(Phase::LoggedIn)?;
        let channel_id = self.session.roster.selected().ok_or(ProtocolError::NoChannels)?;

        let body = self
            .exchange(
                Frame::request(
                    FrameType::ChannelInfoRequest,
                    Body::ChannelInfo(ChannelInfoBody {
                        auth: self.session.credentials.clone(),
                        name: String::new(),
                        channel_id,
                        member_ids: Vec::new(),
                    }),
                ),
                FrameType::ChannelInfoResponse,
                "Channel info",
            )
            .await?;

        let Body::ChannelInfo(info) = body else {
            return Err(ProtocolError::BodyTypeMismatch(FrameType::ChannelInfoResponse));
        };

        self.console.print_status(&format!(
            "Channel {} '{}': {} member(s) [{}]",
            info.channel_id,
            info.name,
            info.member_ids.len(),
            join_ids(&info.member_ids)
        ));
        Ok(())
    }

    /// Run the messaging loop until the user leaves, input ends or the node disconnects.
    pub async fn messaging(&mut self, shutdown: &mut mpsc::Receiver<()>) -> Result<LoopExit> {
        self.session.advance(Phase::Messaging)?;

        self.interruptible.store(true, Ordering::SeqCst);
        let outcome = messaging::run(
            &mut self.session,
            &mut self.console,
            shutdown,
            self.config.max_message_len,
        )
        .await;
        self.interruptible.store(false, Ordering::SeqCst);

        let exit = outcome?;
        info!(?exit, "Messaging loop finished");
        Ok(exit)
    }

    /// Log out over the persistent connection, then close it.
    #[instrument(skip(self))]
    pub async fn logout(&mut self) -> Result<()> {
        self.session.require(Phase::Messaging)?;

        self.login_exchange(false, "Logout").await?;
        self.session.release().await;

        self.session.advance(Phase::Exiting)?;
        info!("Logged out");
        self.console.print_status("Logged out.");
        Ok(())
    }

    fn server(&self) -> Result<SocketAddrV4> {
        self.session.server.ok_or(ProtocolError::WrongPhase {
            expected: Phase::AwaitingUserInfo,
            actual: self.session.phase,
        })
    }

    async fn open(&mut self, address: SocketAddrV4) -> Result<()> {
        let Connection { stream, local_ip } = self.connector.connect(address).await?;
        self.session.metrics.connection_opened();

        let transport = Transport::new(stream, address, local_ip)
            .with_max_body_size(self.config.max_body_size)
            .with_metrics(Arc::clone(&self.session.metrics));
        self.session.attach(transport).await;
        Ok(())
    }

    async fn login_exchange(&mut self, login: bool, operation: &'static str) -> Result<()> {
        let client_ip: Ipv4Addr = self.session.transport_mut()?.local_ip();
        self.exchange(
            Frame::request(
                FrameType::LoginLogoutRequest,
                Body::Login(LoginBody {
                    auth: self.session.credentials.clone(),
                    client_ip,
                    login,
                }),
            ),
            FrameType::LoginLogoutResponse,
            operation,
        )
        .await?;
        Ok(())
    }

    /// Send one request and read its response on the open connection.
    ///
    /// The response header is checked in order: version, type, status. Only then is
    /// the declared length validated and the body read.
    async fn exchange(
        &mut self,
        request: Frame,
        expected: FrameType,
        operation: &'static str,
    ) -> Result<Body> {
        let transport = self.session.transport_mut()?;
        transport.send_frame(&request).await?;

        let header = transport.recv_header().await?;
        if header.version != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(header.version));
        }
        if header.frame_type != expected {
            return Err(ProtocolError::UnexpectedFrame {
                expected,
                actual: header.frame_type,
            });
        }
        if !header.status.is_ok() {
            return Err(ProtocolError::StatusFailure {
                operation,
                status: header.status,
            });
        }

        transport.recv_body(&header).await
    }
}

fn join_ids(ids: &[u8]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
