//! Typed frame bodies.
//!
//! Bodies come in two shapes. Fixed bodies are a plain sequence of fields. Variable
//! bodies are a fixed prefix whose count field declares the size of the trailer that
//! follows it. Variable bodies are always decoded prefix first; the trailer length is
//! `body_length - prefix`, checked for underflow, and must agree with the count field.

use bytes::{Buf, BufMut, Bytes};
use std::fmt;
use std::net::Ipv4Addr;

use crate::core::header::{BodyLayout, FrameType, CHANNEL_NAME_LEN, PASSWORD_LEN, USERNAME_LEN};
use crate::error::{ProtocolError, Result};

/// Fixed-width username/password pair carried in most request bodies.
///
/// Values are NUL-padded or truncated to width; the wire never carries a length.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    username: [u8; USERNAME_LEN],
    password: [u8; PASSWORD_LEN],
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        let mut creds = Self::default();
        copy_padded(&mut creds.username, username.as_bytes());
        copy_padded(&mut creds.password, password.as_bytes());
        creds
    }

    /// Username up to the first NUL
    pub fn username(&self) -> String {
        trim_nul(&self.username)
    }

    pub fn is_empty(&self) -> bool {
        self.username[0] == 0 && self.password[0] == 0
    }

    fn put<B: BufMut>(&self, dst: &mut B) {
        dst.put_slice(&self.username);
        dst.put_slice(&self.password);
    }

    fn get(src: &mut &[u8]) -> Self {
        let mut creds = Self::default();
        src.copy_to_slice(&mut creds.username);
        src.copy_to_slice(&mut creds.password);
        creds
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username())
            .field("password", &"<redacted>")
            .finish()
    }
}

fn copy_padded(dst: &mut [u8], src: &[u8]) {
    let n = src.len().min(dst.len());
    dst[..n].copy_from_slice(&src[..n]);
}

fn trim_nul(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Discovery request/response: node address and id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryBody {
    pub address: Ipv4Addr,
    pub node_id: u8,
}

impl DiscoveryBody {
    /// All-zero body sent with a discovery request
    pub fn request() -> Self {
        Self {
            address: Ipv4Addr::UNSPECIFIED,
            node_id: 0,
        }
    }
}

/// Account-create request/response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountBody {
    pub auth: Credentials,
    /// 0 on request; assigned id on response
    pub account_id: u8,
}

/// Login or logout request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginBody {
    pub auth: Credentials,
    pub client_ip: Ipv4Addr,
    /// true = login, false = logout
    pub login: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelListBody {
    pub auth: Credentials,
    pub channel_ids: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfoBody {
    pub auth: Credentials,
    pub name: String,
    pub channel_id: u8,
    pub member_ids: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageBody {
    pub auth: Credentials,
    /// Seconds since the unix epoch
    pub timestamp: u64,
    pub channel_id: u8,
    pub message: Bytes,
}

/// Get-message body, also used for unsolicited pushes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetMessageBody {
    pub auth: Credentials,
    pub timestamp: u64,
    pub channel_id: u8,
    pub sender_id: u8,
    pub message: Bytes,
}

/// A frame body, one variant per layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Discovery(DiscoveryBody),
    Account(AccountBody),
    Login(LoginBody),
    ChannelList(ChannelListBody),
    ChannelInfo(ChannelInfoBody),
    SendMessage(SendMessageBody),
    GetMessage(GetMessageBody),
    /// Uninterpreted bytes
    Opaque(Bytes),
}

impl Body {
    /// Whether this body variant is the one bound to `frame_type`
    pub fn fits(&self, frame_type: FrameType) -> bool {
        use FrameType::*;
        matches!(
            (self, frame_type),
            (Body::Discovery(_), DiscoveryRequest | DiscoveryResponse)
                | (Body::Account(_), AccountCreateRequest | AccountCreateResponse)
                | (Body::Login(_), LoginLogoutRequest)
                | (Body::ChannelList(_), ChannelListRequest | ChannelListResponse)
                | (Body::ChannelInfo(_), ChannelInfoRequest | ChannelInfoResponse)
                | (Body::SendMessage(_), SendMessageRequest)
                | (Body::GetMessage(_), GetMessageResponse)
        ) || (matches!(self, Body::Opaque(_)) && frame_type.layout() == BodyLayout::Opaque)
    }
}

/// Serialize `body` for `frame_type`, appending to `dst`.
pub fn encode_body<B: BufMut>(frame_type: FrameType, body: &Body, dst: &mut B) -> Result<()> {
    if !body.fits(frame_type) {
        return Err(ProtocolError::BodyTypeMismatch(frame_type));
    }

    match body {
        Body::Discovery(b) => {
            dst.put_slice(&b.address.octets());
            dst.put_u8(b.node_id);
        }
        Body::Account(b) => {
            b.auth.put(dst);
            dst.put_u8(b.account_id);
        }
        Body::Login(b) => {
            b.auth.put(dst);
            dst.put_slice(&b.client_ip.octets());
            dst.put_u8(u8::from(b.login));
        }
        Body::ChannelList(b) => {
            let count = trailer_count::<u8>(frame_type, b.channel_ids.len())?;
            b.auth.put(dst);
            dst.put_u8(count);
            dst.put_slice(&b.channel_ids);
        }
        Body::ChannelInfo(b) => {
            let count = trailer_count::<u8>(frame_type, b.member_ids.len())?;
            let mut name = [0u8; CHANNEL_NAME_LEN];
            copy_padded(&mut name, b.name.as_bytes());
            b.auth.put(dst);
            dst.put_slice(&name);
            dst.put_u8(b.channel_id);
            dst.put_u8(count);
            dst.put_slice(&b.member_ids);
        }
        Body::SendMessage(b) => {
            let len = trailer_count::<u16>(frame_type, b.message.len())?;
            b.auth.put(dst);
            dst.put_u64(b.timestamp);
            dst.put_u16(len);
            dst.put_u8(b.channel_id);
            dst.put_slice(&b.message);
        }
        Body::GetMessage(b) => {
            let len = trailer_count::<u16>(frame_type, b.message.len())?;
            b.auth.put(dst);
            dst.put_u64(b.timestamp);
            dst.put_u16(len);
            dst.put_u8(b.channel_id);
            dst.put_u8(b.sender_id);
            dst.put_slice(&b.message);
        }
        Body::Opaque(bytes) => dst.put_slice(bytes),
    }

    Ok(())
}

fn trailer_count<T: TryFrom<usize>>(frame_type: FrameType, len: usize) -> Result<T> {
    T::try_from(len).map_err(|_| ProtocolError::TrailerTooLong {
        frame_type,
        length: len,
        maximum: max_trailer(frame_type),
    })
}

fn max_trailer(frame_type: FrameType) -> usize {
    match frame_type {
        FrameType::SendMessageRequest | FrameType::GetMessageResponse => u16::MAX as usize,
        _ => u8::MAX as usize,
    }
}

/// Parse a body buffer of exactly the length the header declared.
pub fn decode_body(frame_type: FrameType, body: &[u8]) -> Result<Body> {
    let layout = frame_type.layout();
    layout.check(frame_type, body.len())?;

    let body = match frame_type {
        FrameType::DiscoveryRequest | FrameType::DiscoveryResponse => {
            let mut src = body;
            Body::Discovery(DiscoveryBody {
                address: get_ipv4(&mut src),
                node_id: src.get_u8(),
            })
        }
        FrameType::AccountCreateRequest | FrameType::AccountCreateResponse => {
            let mut src = body;
            Body::Account(AccountBody {
                auth: Credentials::get(&mut src),
                account_id: src.get_u8(),
            })
        }
        FrameType::LoginLogoutRequest => {
            let mut src = body;
            Body::Login(LoginBody {
                auth: Credentials::get(&mut src),
                client_ip: get_ipv4(&mut src),
                login: src.get_u8() != 0,
            })
        }
        FrameType::ChannelListRequest | FrameType::ChannelListResponse => {
            let (mut prefix, trailer) = split_prefix(frame_type, body)?;
            let auth = Credentials::get(&mut prefix);
            let count = prefix.get_u8() as usize;
            check_trailer(frame_type, count, trailer)?;
            Body::ChannelList(ChannelListBody {
                auth,
                channel_ids: trailer.to_vec(),
            })
        }
        FrameType::ChannelInfoRequest | FrameType::ChannelInfoResponse => {
            let (mut prefix, trailer) = split_prefix(frame_type, body)?;
            let auth = Credentials::get(&mut prefix);
            let name = trim_nul(&prefix[..CHANNEL_NAME_LEN]);
            prefix.advance(CHANNEL_NAME_LEN);
            let channel_id = prefix.get_u8();
            let count = prefix.get_u8() as usize;
            check_trailer(frame_type, count, trailer)?;
            Body::ChannelInfo(ChannelInfoBody {
                auth,
                name,
                channel_id,
                member_ids: trailer.to_vec(),
            })
        }
        FrameType::SendMessageRequest => {
            let (mut prefix, trailer) = split_prefix(frame_type, body)?;
            let auth = Credentials::get(&mut prefix);
            let timestamp = prefix.get_u64();
            let len = prefix.get_u16() as usize;
            let channel_id = prefix.get_u8();
            check_trailer(frame_type, len, trailer)?;
            Body::SendMessage(SendMessageBody {
                auth,
                timestamp,
                channel_id,
                message: Bytes::copy_from_slice(trailer),
            })
        }
        FrameType::GetMessageResponse => {
            let (mut prefix, trailer) = split_prefix(frame_type, body)?;
            let auth = Credentials::get(&mut prefix);
            let timestamp = prefix.get_u64();
            let len = prefix.get_u16() as usize;
            let channel_id = prefix.get_u8();
            let sender_id = prefix.get_u8();
            check_trailer(frame_type, len, trailer)?;
            Body::GetMessage(GetMessageBody {
                auth,
                timestamp,
                channel_id,
                sender_id,
                message: Bytes::copy_from_slice(trailer),
            })
        }
        _ => Body::Opaque(Bytes::copy_from_slice(body)),
    };

    Ok(body)
}

fn get_ipv4(src: &mut &[u8]) -> Ipv4Addr {
    let mut octets = [0u8; 4];
    src.copy_to_slice(&mut octets);
    Ipv4Addr::from(octets)
}

/// Split a variable body into its fixed prefix and trailer.
fn split_prefix(frame_type: FrameType, body: &[u8]) -> Result<(&[u8], &[u8])> {
    let prefix = frame_type.layout().min_len();
    // trailer_length = body_length - prefix; underflow means a malformed frame
    let trailer_len = body
        .len()
        .checked_sub(prefix)
        .ok_or(ProtocolError::BodyTooShort {
            frame_type,
            length: body.len(),
            minimum: prefix,
        })?;
    Ok((&body[..prefix], &body[prefix..prefix + trailer_len]))
}

fn check_trailer(frame_type: FrameType, declared: usize, trailer: &[u8]) -> Result<()> {
    if declared != trailer.len() {
        return Err(ProtocolError::TrailerMismatch {
            frame_type,
            declared,
            actual: trailer.len(),
        });
    }
    Ok(())
}
