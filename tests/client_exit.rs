//! Runs the `big-chat` binary against a local TCP peer with stdin held open and
//! checks that the process ends on its own.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use big_chat_client::core::body::{Body, ChannelInfoBody};
use big_chat_client::core::header::{FrameType, StatusCode};
use bytes::Bytes;
use common::*;
use std::io::Write;
use std::net::Ipv4Addr;
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::time::{sleep, Instant};

const EXIT_DEADLINE: Duration = Duration::from_secs(10);

async fn listen() -> (TcpListener, u16) {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

fn spawn_client(port: u16) -> (Child, ChildStdin) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_big-chat"))
        .args(["-m", "127.0.0.1", "-p", &port.to_string()])
        .env_remove("BIG_CHAT_NODE_PORT")
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    let stdin = child.stdin.take().unwrap();
    (child, stdin)
}

fn type_lines(stdin: &mut ChildStdin, lines: &[&str]) {
    for line in lines {
        writeln!(stdin, "{line}").unwrap();
    }
    stdin.flush().unwrap();
}

#[cfg(unix)]
fn interrupt(child: &Child) {
    let status = Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());
}

async fn wait_for_exit(child: &mut Child) -> ExitStatus {
    let deadline = Instant::now() + EXIT_DEADLINE;
    loop {
        if let Some(status) = child.try_wait().unwrap() {
            return status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            panic!("client still running {EXIT_DEADLINE:?} after the session ended");
        }
        sleep(Duration::from_millis(50)).await;
    }
}

async fn accept(listener: &TcpListener) -> TcpStream {
    listener.accept().await.unwrap().0
}

/// Serve discovery, registration, login, the channel list and channel info.
///
/// Returns the open login connection.
async fn serve_until_messaging(listener: &TcpListener) -> TcpStream {
    let mut manager = accept(listener).await;
    serve_discovery_at(&mut manager, Ipv4Addr::LOCALHOST, 1).await;
    drop(manager);

    let mut registration = accept(listener).await;
    serve_registration(&mut registration, 11).await;
    drop(registration);

    let mut node = accept(listener).await;
    assert!(answer_login(&mut node).await.login);
    serve_channel_list(&mut node, &[5]).await;

    let Body::ChannelInfo(info) = expect_request(&mut node, FrameType::ChannelInfoRequest).await
    else {
        panic!("Expected a channel-info body");
    };
    write_frame(
        &mut node,
        FrameType::ChannelInfoResponse,
        StatusCode::Ok,
        Body::ChannelInfo(ChannelInfoBody {
            auth: info.auth,
            name: "general".into(),
            channel_id: 5,
            member_ids: vec![11],
        }),
    )
    .await;
    node
}

#[tokio::test]
async fn test_exits_after_peer_close_with_stdin_open() {
    let (listener, port) = listen().await;
    let (mut child, mut stdin) = spawn_client(port);
    type_lines(&mut stdin, &["alice", "secret", ""]);

    let server = tokio::spawn(async move {
        let node = serve_until_messaging(&listener).await;
        drop(node);
    });

    let status = wait_for_exit(&mut child).await;
    server.await.unwrap();
    assert!(status.success());
    drop(stdin);
}

#[cfg(unix)]
#[tokio::test]
async fn test_exits_after_interrupt_and_logout_with_stdin_open() {
    let (listener, port) = listen().await;
    let (mut child, mut stdin) = spawn_client(port);
    type_lines(&mut stdin, &["alice", "secret", "", "hi"]);

    let (chatting_tx, chatting_rx) = oneshot::channel();
    let server = tokio::spawn(async move {
        let mut node = serve_until_messaging(&listener).await;

        // A sent line proves the messaging loop is running
        expect_request(&mut node, FrameType::SendMessageRequest).await;
        write_frame(
            &mut node,
            FrameType::SendMessageResponse,
            StatusCode::Ok,
            Body::Opaque(Bytes::new()),
        )
        .await;
        chatting_tx.send(()).unwrap();

        assert!(!answer_login(&mut node).await.login);
        node
    });

    chatting_rx.await.unwrap();
    interrupt(&child);

    let status = wait_for_exit(&mut child).await;
    let _node = server.await.unwrap();
    assert!(status.success());
    drop(stdin);
}

#[cfg(unix)]
#[tokio::test]
async fn test_interrupt_at_prompt_exits_immediately() {
    let (listener, port) = listen().await;
    let (mut child, stdin) = spawn_client(port);

    let mut manager = accept(&listener).await;
    serve_discovery_at(&mut manager, Ipv4Addr::LOCALHOST, 1).await;
    drop(manager);

    // The client is now waiting at the username prompt
    sleep(Duration::from_millis(300)).await;
    interrupt(&child);

    let status = wait_for_exit(&mut child).await;
    assert_eq!(status.code(), Some(130));
    drop(stdin);
}
