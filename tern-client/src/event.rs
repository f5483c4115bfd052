use core::fmt;

use tern_core::{message::Message, qos::QoS};

use crate::error::ClientError;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnecting => "disconnecting",
        };
        write!(f, "{}", state)
    }
}

/// Reason reported when a connected session goes down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Closed on request, or the broker closed the connection.
    Closed,

    /// Transport failure, protocol violation or unacknowledged request.
    Error,

    /// No PINGRESP within one and a half keep-alive intervals.
    PingTimeout,
}

impl DisconnectReason {
    /// Reason to report for a fatal error.
    pub(crate) fn for_error(error: &ClientError) -> Self {
        match error {
            ClientError::ConnectionClosed => DisconnectReason::Closed,
            ClientError::PingTimeout => DisconnectReason::PingTimeout,
            _ => DisconnectReason::Error,
        }
    }
}

/// Outcome of a successful connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connected {
    /// The broker resumed a stored session for this client ID.
    pub session_present: bool,
}

/// Outcome of a successful subscribe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeAck {
    pub topic_filter: String,
    pub requested: QoS,
    /// May be lower than `requested`.
    pub granted: QoS,
}

/// Events queued for the delegate, in the order they happened.
#[derive(Debug)]
pub(crate) enum SessionEvent {
    Message(Message),
    PingAcknowledged,
    Disconnected {
        reason: DisconnectReason,
        error: Option<ClientError>,
    },
}
