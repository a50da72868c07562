//! Wire format tests against hand-built byte sequences

#![allow(clippy::unwrap_used, clippy::expect_used)]

use big_chat_client::core::body::{
    decode_body, AccountBody, Body, ChannelInfoBody, Credentials, DiscoveryBody, GetMessageBody,
    LoginBody, SendMessageBody,
};
use big_chat_client::core::codec::{encode, Frame};
use big_chat_client::core::header::{FrameType, Header, StatusCode, HEADER_LEN};
use big_chat_client::error::{ErrorKind, ProtocolError};
use bytes::Bytes;
use std::net::Ipv4Addr;

#[test]
fn test_discovery_request_is_five_zero_bytes() {
    let bytes = encode(
        FrameType::DiscoveryRequest,
        StatusCode::Ok,
        &Body::Discovery(DiscoveryBody::request()),
    )
    .unwrap();
    assert_eq!(
        &bytes[..],
        &[0x02, 0x0A, 0x00, 0x00, 0x00, 0x00, 0x00, 0x05, 0, 0, 0, 0, 0]
    );
}

#[test]
fn test_account_create_request_bytes() {
    let bytes = encode(
        FrameType::AccountCreateRequest,
        StatusCode::Ok,
        &Body::Account(AccountBody {
            auth: Credentials::new("alice", "pw"),
            account_id: 0,
        }),
    )
    .unwrap();
    assert_eq!(bytes.len(), HEADER_LEN + 33);
    assert_eq!(&bytes[HEADER_LEN..HEADER_LEN + 5], b"alice");
    assert!(bytes[HEADER_LEN + 5..HEADER_LEN + 16].iter().all(|b| *b == 0));
    assert_eq!(&bytes[HEADER_LEN + 16..HEADER_LEN + 18], b"pw");
}

#[test]
fn test_logout_flag_is_zero() {
    let frame = Frame::request(
        FrameType::LoginLogoutRequest,
        Body::Login(LoginBody {
            auth: Credentials::new("alice", "pw"),
            client_ip: Ipv4Addr::new(192, 168, 1, 20),
            login: false,
        }),
    );
    let bytes = frame.to_bytes().unwrap();
    assert_eq!(bytes.len(), HEADER_LEN + 37);
    assert_eq!(&bytes[HEADER_LEN + 32..HEADER_LEN + 36], &[192, 168, 1, 20]);
    assert_eq!(bytes[HEADER_LEN + 36], 0);
}

#[test]
fn test_send_message_body_length_covers_text() {
    let frame = Frame::request(
        FrameType::SendMessageRequest,
        Body::SendMessage(SendMessageBody {
            auth: Credentials::new("alice", "pw"),
            timestamp: 1_700_000_000,
            channel_id: 3,
            message: Bytes::from_static(b"hello"),
        }),
    );
    let bytes = frame.to_bytes().unwrap();
    let header = Header::decode(bytes[..HEADER_LEN].try_into().unwrap()).unwrap();
    assert_eq!(header.body_length, 43 + 5);
    assert_eq!(&bytes[HEADER_LEN + 40..HEADER_LEN + 42], &5u16.to_be_bytes());
    assert_eq!(bytes[HEADER_LEN + 42], 3);
    assert_eq!(&bytes[HEADER_LEN + 43..], b"hello");
}

#[test]
fn test_channel_info_response_decodes() {
    let mut body = vec![0u8; 32];
    body.extend_from_slice(b"general\0\0\0\0\0\0\0\0\0");
    body.extend_from_slice(&[2, 3, 11, 12, 13]);

    match decode_body(FrameType::ChannelInfoResponse, &body).unwrap() {
        Body::ChannelInfo(ChannelInfoBody {
            name,
            channel_id,
            member_ids,
            ..
        }) => {
            assert_eq!(name, "general");
            assert_eq!(channel_id, 2);
            assert_eq!(member_ids, vec![11, 12, 13]);
        }
        other => panic!("Unexpected body: {other:?}"),
    }
}

#[test]
fn test_message_text_may_be_invalid_utf8() {
    let mut body = vec![0u8; 32];
    body.extend_from_slice(&0u64.to_be_bytes());
    body.extend_from_slice(&2u16.to_be_bytes());
    body.extend_from_slice(&[1, 9, 0xFF, 0xFE]);

    let Body::GetMessage(message) = decode_body(FrameType::GetMessageResponse, &body).unwrap()
    else {
        panic!("Expected a get-message body");
    };
    let chat = big_chat_client::protocol::ChatMessage::from(message);
    assert_eq!(chat.sender_id, 9);
    assert_eq!(chat.text, "\u{FFFD}\u{FFFD}");
}

#[test]
fn test_get_message_length_mismatch_is_rejected() {
    let mut body = vec![0u8; 32];
    body.extend_from_slice(&0u64.to_be_bytes());
    body.extend_from_slice(&10u16.to_be_bytes());
    body.extend_from_slice(&[1, 9]);
    body.extend_from_slice(b"short");

    let err = decode_body(FrameType::GetMessageResponse, &body).unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::TrailerMismatch {
            declared: 10,
            actual: 5,
            ..
        }
    ));
    assert_eq!(err.kind(), ErrorKind::Protocol);
}

#[test]
fn test_opaque_acknowledgements_accept_any_length() {
    for len in [0usize, 1, 64] {
        let body = vec![0xAB; len];
        assert_eq!(
            decode_body(FrameType::SendMessageResponse, &body).unwrap(),
            Body::Opaque(Bytes::from(body.clone()))
        );
    }
}

const MESSAGE_LIMIT: usize = u16::MAX as usize;

fn send_message(len: usize) -> Body {
    Body::SendMessage(SendMessageBody {
        auth: Credentials::new("alice", "secret"),
        timestamp: 1_700_000_000,
        channel_id: 4,
        message: Bytes::from(vec![b'x'; len]),
    })
}

fn get_message(len: usize) -> Body {
    Body::GetMessage(GetMessageBody {
        auth: Credentials::new("bob", ""),
        timestamp: 1_700_000_000,
        channel_id: 4,
        sender_id: 9,
        message: Bytes::from(vec![b'y'; len]),
    })
}

#[test]
fn test_largest_messages_encode_and_decode() {
    for (frame_type, body, prefix) in [
        (FrameType::SendMessageRequest, send_message(MESSAGE_LIMIT), 43),
        (FrameType::GetMessageResponse, get_message(MESSAGE_LIMIT), 44),
    ] {
        let bytes = encode(frame_type, StatusCode::Ok, &body).unwrap();
        assert_eq!(bytes.len(), HEADER_LEN + prefix + MESSAGE_LIMIT);

        let raw: [u8; HEADER_LEN] = bytes[..HEADER_LEN].try_into().unwrap();
        let header = Header::decode(&raw).unwrap();
        assert_eq!(header.body_len(), prefix + MESSAGE_LIMIT);
        // Message length field sits just before the channel id
        let length_field = &bytes[HEADER_LEN + 40..HEADER_LEN + 42];
        assert_eq!(length_field, &[0xFF, 0xFF]);

        let decoded = decode_body(frame_type, &bytes[HEADER_LEN..]).unwrap();
        assert_eq!(decoded, body);
    }
}

#[test]
fn test_message_one_past_limit_is_refused() {
    for (frame_type, body) in [
        (FrameType::SendMessageRequest, send_message(MESSAGE_LIMIT + 1)),
        (FrameType::GetMessageResponse, get_message(MESSAGE_LIMIT + 1)),
    ] {
        let err = encode(frame_type, StatusCode::Ok, &body).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::TrailerTooLong {
                length: 65536,
                maximum: 65535,
                ..
            }
        ));
    }
}
