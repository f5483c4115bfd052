use std::io;

use tern_core::return_code::ConnectReturnCode;
use thiserror::Error;

/// Broad category of a [`ClientError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The byte stream failed or could not be established.
    Transport,
    /// The broker sent something the session cannot accept.
    Protocol,
    /// No acknowledgement arrived in time.
    Timeout,
    /// The call itself was invalid; connection state is untouched.
    Application,
    /// The request was abandoned by a disconnect.
    Cancelled,
}

/// Errors that can occur in the MQTT client.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Network unreachable: {0}")]
    NetworkUnreachable(#[source] io::Error),

    #[error("TLS handshake failed: {0}")]
    TlsHandshakeFailed(String),

    #[error("Connection closed by broker")]
    ConnectionClosed,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Packet error: {0}")]
    Packet(#[from] tern_core::error::Error),

    #[error("Connection refused: {0}")]
    ProtocolRejected(ConnectReturnCode),

    #[error("Subscription to '{0}' rejected by broker")]
    SubscribeRejected(String),

    #[error("Timeout waiting for CONNACK")]
    Timeout,

    #[error("Timeout waiting for SUBACK")]
    SubscribeTimeout,

    #[error("Timeout waiting for UNSUBACK")]
    UnsubscribeTimeout,

    #[error("Publish not acknowledged")]
    PublishTimeout,

    #[error("Timeout waiting for PINGRESP")]
    PingTimeout,

    #[error("Timeout writing to broker")]
    WriteTimeout,

    #[error("Invalid topic: {0}")]
    InvalidTopic(String),

    #[error("Payload of {0} bytes does not fit in a packet")]
    PayloadTooLarge(usize),

    #[error("Invalid connect options: {0}")]
    InvalidOptions(String),

    #[error("No packet identifier available")]
    PacketIdsExhausted,

    #[error("Not connected")]
    NotConnected,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Request cancelled")]
    Cancelled,
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        use ClientError::*;

        match self {
            Io(_) | NetworkUnreachable(_) | TlsHandshakeFailed(_) | ConnectionClosed => {
                ErrorKind::Transport
            }
            Protocol(_) | Packet(_) | ProtocolRejected(_) | SubscribeRejected(_) => {
                ErrorKind::Protocol
            }
            Timeout | SubscribeTimeout | UnsubscribeTimeout | PublishTimeout | PingTimeout
            | WriteTimeout => ErrorKind::Timeout,
            InvalidTopic(_) | PayloadTooLarge(_) | InvalidOptions(_) | PacketIdsExhausted
            | NotConnected | AlreadyConnected => ErrorKind::Application,
            Cancelled => ErrorKind::Cancelled,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
