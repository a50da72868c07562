//! Shared test doubles: an in-memory connector, a scripted console and a few
//! server-side frame helpers.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use big_chat_client::config::ClientConfig;
use big_chat_client::core::body::{
    decode_body, AccountBody, Body, ChannelListBody, Credentials, DiscoveryBody, GetMessageBody,
    LoginBody,
};
use big_chat_client::core::codec::encode;
use big_chat_client::core::header::{FrameType, Header, StatusCode, HEADER_LEN};
use big_chat_client::error::{ProtocolError, Result};
use big_chat_client::protocol::{ChatMessage, SessionMachine};
use big_chat_client::service::Console;
use big_chat_client::transport::{Connection, Connector};
use std::collections::VecDeque;
use std::io;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Mutex;
use tokio::io::{duplex, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;

pub const MANAGER_PORT: u16 = 7000;
pub const CLIENT_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 20);
pub const NODE_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 7);

pub type Machine = SessionMachine<ScriptedConnector, RecordingConsole>;

/// Server end of a test connection: an in-memory duplex or a real socket
pub trait Peer: AsyncRead + AsyncWrite + Unpin {}

impl<T: AsyncRead + AsyncWrite + Unpin> Peer for T {}

pub fn manager_addr() -> SocketAddrV4 {
    SocketAddrV4::new(Ipv4Addr::LOCALHOST, MANAGER_PORT)
}

/// Hands out pre-made duplex client halves in order, recording each target address.
pub struct ScriptedConnector {
    streams: Mutex<VecDeque<DuplexStream>>,
    dialed: Mutex<Vec<SocketAddrV4>>,
}

impl ScriptedConnector {
    /// A connector with `count` pending connections and their server halves
    pub fn with_connections(count: usize) -> (Self, Vec<DuplexStream>) {
        let mut clients = VecDeque::new();
        let mut servers = Vec::new();
        for _ in 0..count {
            let (client, server) = duplex(64 * 1024);
            clients.push_back(client);
            servers.push(server);
        }
        let connector = Self {
            streams: Mutex::new(clients),
            dialed: Mutex::new(Vec::new()),
        };
        (connector, servers)
    }

    pub fn dialed(&self) -> Vec<SocketAddrV4> {
        self.dialed.lock().unwrap().clone()
    }
}

impl Connector for ScriptedConnector {
    type Stream = DuplexStream;

    async fn connect(&self, address: SocketAddrV4) -> Result<Connection<DuplexStream>> {
        self.dialed.lock().unwrap().push(address);
        match self.streams.lock().unwrap().pop_front() {
            Some(stream) => Ok(Connection {
                stream,
                local_ip: CLIENT_IP,
            }),
            None => Err(ProtocolError::ConnectFailed {
                address,
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            }),
        }
    }
}

/// Console fed from a channel; everything it prints is kept for inspection.
pub struct RecordingConsole {
    input: mpsc::UnboundedReceiver<String>,
    pub prompts: Vec<String>,
    pub statuses: Vec<String>,
    pub errors: Vec<String>,
    pub messages: Vec<ChatMessage>,
}

impl RecordingConsole {
    pub fn new() -> (Self, mpsc::UnboundedSender<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let console = Self {
            input: rx,
            prompts: Vec::new(),
            statuses: Vec::new(),
            errors: Vec::new(),
            messages: Vec::new(),
        };
        (console, tx)
    }

    /// A console that yields `lines` and then end of input
    pub fn with_lines(lines: &[&str]) -> Self {
        let (console, tx) = Self::new();
        for line in lines {
            tx.send(line.to_string()).unwrap();
        }
        console
    }
}

impl Console for RecordingConsole {
    async fn read_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.input.recv().await)
    }

    fn prompt(&mut self, text: &str) {
        self.prompts.push(text.to_string());
    }

    fn print_status(&mut self, text: &str) {
        self.statuses.push(text.to_string());
    }

    fn print_error(&mut self, text: &str) {
        self.errors.push(text.to_string());
    }

    fn show_message(&mut self, message: &ChatMessage) {
        self.messages.push(message.clone());
    }
}

pub fn machine_with(
    connections: usize,
    config: ClientConfig,
    console: RecordingConsole,
) -> (Machine, Vec<DuplexStream>) {
    let (connector, servers) = ScriptedConnector::with_connections(connections);
    let machine = SessionMachine::new(manager_addr(), config, connector, console);
    (machine, servers)
}

/// Read one whole frame from the server side of a connection.
pub async fn read_frame<S: Peer>(server: &mut S) -> (Header, Vec<u8>) {
    let mut raw = [0u8; HEADER_LEN];
    server.read_exact(&mut raw).await.unwrap();
    let header = Header::decode(&raw).unwrap();
    let mut body = vec![0u8; header.body_len()];
    server.read_exact(&mut body).await.unwrap();
    (header, body)
}

/// Read one frame and decode its body, asserting its type.
pub async fn expect_request<S: Peer>(server: &mut S, frame_type: FrameType) -> Body {
    let (header, body) = read_frame(server).await;
    assert_eq!(header.frame_type, frame_type);
    assert_eq!(header.status, StatusCode::Ok);
    decode_body(frame_type, &body).unwrap()
}

pub async fn write_frame<S: Peer>(
    server: &mut S,
    frame_type: FrameType,
    status: StatusCode,
    body: Body,
) {
    let bytes = encode(frame_type, status, &body).unwrap();
    server.write_all(&bytes).await.unwrap();
}

pub async fn write_raw<S: Peer>(server: &mut S, bytes: &[u8]) {
    server.write_all(bytes).await.unwrap();
}

pub fn push_message(channel_id: u8, sender_id: u8, text: &str) -> Body {
    Body::GetMessage(GetMessageBody {
        auth: Credentials::new("bob", ""),
        timestamp: 1_700_000_000,
        channel_id,
        sender_id,
        message: bytes::Bytes::copy_from_slice(text.as_bytes()),
    })
}

pub async fn serve_discovery<S: Peer>(server: &mut S, node_id: u8) {
    serve_discovery_at(server, NODE_IP, node_id).await;
}

pub async fn serve_discovery_at<S: Peer>(server: &mut S, address: Ipv4Addr, node_id: u8) {
    let request = expect_request(server, FrameType::DiscoveryRequest).await;
    assert_eq!(request, Body::Discovery(DiscoveryBody::request()));
    write_frame(
        server,
        FrameType::DiscoveryResponse,
        StatusCode::Ok,
        Body::Discovery(DiscoveryBody { address, node_id }),
    )
    .await;
}

pub async fn serve_registration<S: Peer>(server: &mut S, account_id: u8) -> Credentials {
    let Body::Account(request) = expect_request(server, FrameType::AccountCreateRequest).await
    else {
        panic!("Expected an account body");
    };
    write_frame(
        server,
        FrameType::AccountCreateResponse,
        StatusCode::Ok,
        Body::Account(AccountBody {
            auth: request.auth.clone(),
            account_id,
        }),
    )
    .await;
    request.auth
}

/// Answer a login or logout request, returning the login flag it carried.
pub async fn serve_login<S: Peer>(server: &mut S) -> bool {
    let request = answer_login(server).await;
    assert_eq!(request.client_ip, CLIENT_IP);
    request.login
}

/// Answer a login or logout request from any client address.
pub async fn answer_login<S: Peer>(server: &mut S) -> LoginBody {
    let Body::Login(request) = expect_request(server, FrameType::LoginLogoutRequest).await else {
        panic!("Expected a login body");
    };
    write_frame(
        server,
        FrameType::LoginLogoutResponse,
        StatusCode::Ok,
        Body::Opaque(bytes::Bytes::new()),
    )
    .await;
    request
}

pub async fn serve_channel_list<S: Peer>(server: &mut S, ids: &[u8]) {
    let Body::ChannelList(request) = expect_request(server, FrameType::ChannelListRequest).await
    else {
        panic!("Expected a channel-list body");
    };
    assert!(request.channel_ids.is_empty());
    write_frame(
        server,
        FrameType::ChannelListResponse,
        StatusCode::Ok,
        Body::ChannelList(ChannelListBody {
            auth: request.auth,
            channel_ids: ids.to_vec(),
        }),
    )
    .await;
}

/// Drive a machine to the logged-in phase with `ids` offered and the first one selected.
///
/// Returns the server half of the persistent login connection and the input sender.
pub async fn logged_in(
    config: ClientConfig,
    ids: &[u8],
) -> (Machine, DuplexStream, mpsc::UnboundedSender<String>) {
    let (console, input) = RecordingConsole::new();
    let (mut machine, servers) = machine_with(3, config, console);
    let mut servers = servers.into_iter();
    let mut manager = servers.next().unwrap();
    let mut registration = servers.next().unwrap();
    let mut node = servers.next().unwrap();

    for line in ["alice", "secret", ""] {
        input.send(line.to_string()).unwrap();
    }

    let ids = ids.to_vec();
    let server = tokio::spawn(async move {
        serve_discovery(&mut manager, 2).await;
        serve_registration(&mut registration, 11).await;
        assert!(serve_login(&mut node).await);
        serve_channel_list(&mut node, &ids).await;
        node
    });

    machine.discover().await.unwrap();
    machine.register().await.unwrap();
    machine.login().await.unwrap();
    machine.list_channels().await.unwrap();
    machine.select_channel().await.unwrap();

    let node = server.await.unwrap();
    (machine, node, input)
}
