//! Fixed 8-byte frame header and the type/status enumerations it carries.
//!
//! ```text
//! ┌─────────┬──────┬────────┬──────────┬──────────────┐
//! │ Version │ Type │ Status │ Reserved │ Body Length  │
//! │ 1 byte  │ 1    │ 1      │ 1        │ 4 bytes u32  │
//! └─────────┴──────┴────────┴──────────┴──────────────┘
//! ```
//!
//! All multi-byte integers are big-endian.

use bytes::BufMut;
use std::fmt;

use crate::error::{ProtocolError, Result};

/// Header size in bytes (fixed, exactly 8)
pub const HEADER_LEN: usize = 8;

/// Protocol version carried in every outbound header
pub const PROTOCOL_VERSION: u8 = 0x02;

/// Width of the username and password fields
pub const USERNAME_LEN: usize = 16;
pub const PASSWORD_LEN: usize = 16;

/// Width of the channel name field in channel-info bodies
pub const CHANNEL_NAME_LEN: usize = 16;

/// Auth block: username + password
pub const AUTH_LEN: usize = USERNAME_LEN + PASSWORD_LEN;

/// Frame type byte. Encodes resource, action and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    ServerRegistrationRequest = 0x00,
    ServerRegistrationResponse = 0x01,
    HealthCheckRequest = 0x04,
    HealthCheckResponse = 0x05,
    ActivationRequest = 0x08,
    ActivationResponse = 0x09,
    DiscoveryRequest = 0x0A,
    DiscoveryResponse = 0x0B,
    DeactivationRequest = 0x0E,
    DeactivationResponse = 0x0F,
    AccountCreateRequest = 0x10,
    AccountCreateResponse = 0x11,
    GetUserInfoRequest = 0x12,
    GetUserInfoResponse = 0x13,
    LoginLogoutRequest = 0x14,
    LoginLogoutResponse = 0x15,
    LogRequest = 0x18,
    LogResponse = 0x19,
    ChannelInfoRequest = 0x22,
    ChannelInfoResponse = 0x23,
    ChannelListRequest = 0x2A,
    ChannelListResponse = 0x2B,
    SendMessageRequest = 0x30,
    SendMessageResponse = 0x31,
    GetMessageRequest = 0x32,
    /// Also delivered unsolicited while messaging
    GetMessageResponse = 0x33,
}

impl FrameType {
    /// Every defined frame type, in wire order
    pub const ALL: [FrameType; 26] = [
        FrameType::ServerRegistrationRequest,
        FrameType::ServerRegistrationResponse,
        FrameType::HealthCheckRequest,
        FrameType::HealthCheckResponse,
        FrameType::ActivationRequest,
        FrameType::ActivationResponse,
        FrameType::DiscoveryRequest,
        FrameType::DiscoveryResponse,
        FrameType::DeactivationRequest,
        FrameType::DeactivationResponse,
        FrameType::AccountCreateRequest,
        FrameType::AccountCreateResponse,
        FrameType::GetUserInfoRequest,
        FrameType::GetUserInfoResponse,
        FrameType::LoginLogoutRequest,
        FrameType::LoginLogoutResponse,
        FrameType::LogRequest,
        FrameType::LogResponse,
        FrameType::ChannelInfoRequest,
        FrameType::ChannelInfoResponse,
        FrameType::ChannelListRequest,
        FrameType::ChannelListResponse,
        FrameType::SendMessageRequest,
        FrameType::SendMessageResponse,
        FrameType::GetMessageRequest,
        FrameType::GetMessageResponse,
    ];

    /// Wire byte for this type
    #[inline]
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Detect type from its wire byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_byte() == byte)
    }

    /// Body layout this type is bound to
    pub fn layout(self) -> BodyLayout {
        match self {
            FrameType::DiscoveryRequest | FrameType::DiscoveryResponse => BodyLayout::Fixed(5),
            FrameType::AccountCreateRequest | FrameType::AccountCreateResponse => {
                BodyLayout::Fixed(AUTH_LEN + 1)
            }
            FrameType::LoginLogoutRequest => BodyLayout::Fixed(AUTH_LEN + 4 + 1),
            FrameType::ChannelListRequest | FrameType::ChannelListResponse => {
                BodyLayout::Variable {
                    prefix: AUTH_LEN + 1,
                }
            }
            FrameType::ChannelInfoRequest | FrameType::ChannelInfoResponse => {
                BodyLayout::Variable {
                    prefix: AUTH_LEN + CHANNEL_NAME_LEN + 1 + 1,
                }
            }
            FrameType::SendMessageRequest => BodyLayout::Variable {
                prefix: AUTH_LEN + 8 + 2 + 1,
            },
            FrameType::GetMessageResponse => BodyLayout::Variable {
                prefix: AUTH_LEN + 8 + 2 + 1 + 1,
            },
            _ => BodyLayout::Opaque,
        }
    }

    /// Human-readable name
    pub fn name(self) -> &'static str {
        match self {
            FrameType::ServerRegistrationRequest => "server-register request",
            FrameType::ServerRegistrationResponse => "server-register response",
            FrameType::HealthCheckRequest => "health-check request",
            FrameType::HealthCheckResponse => "health-check response",
            FrameType::ActivationRequest => "activation request",
            FrameType::ActivationResponse => "activation response",
            FrameType::DiscoveryRequest => "discovery request",
            FrameType::DiscoveryResponse => "discovery response",
            FrameType::DeactivationRequest => "deactivation request",
            FrameType::DeactivationResponse => "deactivation response",
            FrameType::AccountCreateRequest => "account-create request",
            FrameType::AccountCreateResponse => "account-create response",
            FrameType::GetUserInfoRequest => "get-user-info request",
            FrameType::GetUserInfoResponse => "get-user-info response",
            FrameType::LoginLogoutRequest => "login/logout request",
            FrameType::LoginLogoutResponse => "login/logout response",
            FrameType::LogRequest => "log request",
            FrameType::LogResponse => "log response",
            FrameType::ChannelInfoRequest => "channel-info request",
            FrameType::ChannelInfoResponse => "channel-info response",
            FrameType::ChannelListRequest => "channel-list request",
            FrameType::ChannelListResponse => "channel-list response",
            FrameType::SendMessageRequest => "send-message request",
            FrameType::SendMessageResponse => "send-message response",
            FrameType::GetMessageRequest => "get-message request",
            FrameType::GetMessageResponse => "get-message response",
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#04x})", self.name(), self.as_byte())
    }
}

/// Shape of a frame body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyLayout {
    /// Exactly this many bytes
    Fixed(usize),
    /// Fixed prefix followed by a trailer whose size a prefix field declares
    Variable { prefix: usize },
    /// Not interpreted by the client; any length
    Opaque,
}

impl BodyLayout {
    /// Smallest body this layout accepts
    pub fn min_len(self) -> usize {
        match self {
            BodyLayout::Fixed(n) => n,
            BodyLayout::Variable { prefix } => prefix,
            BodyLayout::Opaque => 0,
        }
    }

    /// Validate a declared body length before any body byte is read
    pub fn check(self, frame_type: FrameType, body_length: usize) -> Result<()> {
        match self {
            BodyLayout::Fixed(expected) if body_length != expected => {
                Err(ProtocolError::BodyLengthMismatch {
                    frame_type,
                    expected,
                    actual: body_length,
                })
            }
            BodyLayout::Variable { prefix } if body_length < prefix => {
                Err(ProtocolError::BodyTooShort {
                    frame_type,
                    length: body_length,
                    minimum: prefix,
                })
            }
            _ => Ok(()),
        }
    }
}

/// Response status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Ok,
    InvalidVersion,
    InvalidType,
    InvalidSize,
    MalformedRequest,
    InvalidCredentials,
    NotFound,
    AlreadyExists,
    NotRegistered,
    Forbidden,
    NotChannelMember,
    InternalError,
    ServiceUnavailable,
    ResourceExhausted,
    MessageTooLarge,
    Timeout,
    /// Any byte outside the defined set, preserved as received
    Unknown(u8),
}

impl StatusCode {
    /// Wire byte for this status
    pub fn as_byte(self) -> u8 {
        match self {
            StatusCode::Ok => 0x00,
            StatusCode::InvalidVersion => 0x40,
            StatusCode::InvalidType => 0x41,
            StatusCode::InvalidSize => 0x42,
            StatusCode::MalformedRequest => 0x43,
            StatusCode::InvalidCredentials => 0x44,
            StatusCode::NotFound => 0x45,
            StatusCode::AlreadyExists => 0x46,
            StatusCode::NotRegistered => 0x47,
            StatusCode::Forbidden => 0x48,
            StatusCode::NotChannelMember => 0x49,
            StatusCode::InternalError => 0x80,
            StatusCode::ServiceUnavailable => 0x81,
            StatusCode::ResourceExhausted => 0x82,
            StatusCode::MessageTooLarge => 0x83,
            StatusCode::Timeout => 0x84,
            StatusCode::Unknown(byte) => byte,
        }
    }

    #[inline]
    pub fn is_ok(self) -> bool {
        self == StatusCode::Ok
    }

    /// Faults the server attributes to the client (0x40..=0x49)
    pub fn is_client_fault(self) -> bool {
        (0x40..=0x49).contains(&self.as_byte())
    }

    /// Faults the server attributes to itself (0x80..=0x84)
    pub fn is_server_fault(self) -> bool {
        (0x80..=0x84).contains(&self.as_byte())
    }

    pub fn description(self) -> &'static str {
        match self {
            StatusCode::Ok => "ok",
            StatusCode::InvalidVersion => "invalid version",
            StatusCode::InvalidType => "invalid type",
            StatusCode::InvalidSize => "invalid size",
            StatusCode::MalformedRequest => "malformed request",
            StatusCode::InvalidCredentials => "invalid credentials",
            StatusCode::NotFound => "not found",
            StatusCode::AlreadyExists => "already exists",
            StatusCode::NotRegistered => "not registered",
            StatusCode::Forbidden => "forbidden",
            StatusCode::NotChannelMember => "not a channel member",
            StatusCode::InternalError => "server internal error",
            StatusCode::ServiceUnavailable => "service unavailable",
            StatusCode::ResourceExhausted => "resource exhausted",
            StatusCode::MessageTooLarge => "message too large",
            StatusCode::Timeout => "timeout",
            StatusCode::Unknown(_) => "unknown status",
        }
    }
}

impl From<u8> for StatusCode {
    fn from(byte: u8) -> Self {
        match byte {
            0x00 => StatusCode::Ok,
            0x40 => StatusCode::InvalidVersion,
            0x41 => StatusCode::InvalidType,
            0x42 => StatusCode::InvalidSize,
            0x43 => StatusCode::MalformedRequest,
            0x44 => StatusCode::InvalidCredentials,
            0x45 => StatusCode::NotFound,
            0x46 => StatusCode::AlreadyExists,
            0x47 => StatusCode::NotRegistered,
            0x48 => StatusCode::Forbidden,
            0x49 => StatusCode::NotChannelMember,
            0x80 => StatusCode::InternalError,
            0x81 => StatusCode::ServiceUnavailable,
            0x82 => StatusCode::ResourceExhausted,
            0x83 => StatusCode::MessageTooLarge,
            0x84 => StatusCode::Timeout,
            other => StatusCode::Unknown(other),
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#04x})", self.description(), self.as_byte())
    }
}

/// Decoded frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub frame_type: FrameType,
    pub status: StatusCode,
    pub reserved: u8,
    /// Exact number of body bytes that follow the header
    pub body_length: u32,
}

impl Header {
    /// Create an outbound header for the current protocol version
    pub fn new(frame_type: FrameType, status: StatusCode, body_length: u32) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            frame_type,
            status,
            reserved: 0,
            body_length,
        }
    }

    /// Encode header to bytes (big-endian length)
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0] = self.version;
        buf[1] = self.frame_type.as_byte();
        buf[2] = self.status.as_byte();
        buf[3] = self.reserved;
        buf[4..8].copy_from_slice(&self.body_length.to_be_bytes());
        buf
    }

    /// Append the encoded header to a buffer
    pub fn encode_into<B: BufMut>(&self, dst: &mut B) {
        dst.put_slice(&self.encode());
    }

    /// Decode the 8 fixed header bytes.
    ///
    /// An unknown type byte is an error that still reports the declared body length,
    /// so the caller can drain the body and stay on a frame boundary.
    pub fn decode(bytes: &[u8; HEADER_LEN]) -> Result<Self> {
        let body_length = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);

        let frame_type =
            FrameType::from_byte(bytes[1]).ok_or(ProtocolError::UnknownFrameType {
                type_byte: bytes[1],
                body_length,
            })?;

        Ok(Self {
            version: bytes[0],
            frame_type,
            status: StatusCode::from(bytes[2]),
            reserved: bytes[3],
            body_length,
        })
    }

    /// Declared body length as a buffer size
    #[inline]
    pub fn body_len(&self) -> usize {
        self.body_length as usize
    }

    /// Validate the declared body length against this type's layout
    pub fn check_layout(&self) -> Result<()> {
        self.frame_type.layout().check(self.frame_type, self.body_len())
    }
}
