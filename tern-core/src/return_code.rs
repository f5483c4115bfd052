//! Return codes carried by CONNACK and SUBACK in MQTT 3.1.1.

use bytes::Buf;
use core::fmt;

use crate::{
    codec::{Decoder, Encoder},
    error::Error,
    qos::QoS,
};

/// CONNACK return code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectReturnCode {
    #[default]
    Accepted,
    UnacceptableProtocolVersion,
    IdentifierRejected,
    ServerUnavailable,
    BadUserNameOrPassword,
    NotAuthorized,
}

impl fmt::Display for ConnectReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ConnectReturnCode::*;
        let msg = match self {
            Accepted => "Connection accepted",
            UnacceptableProtocolVersion => "Unacceptable protocol version",
            IdentifierRejected => "Identifier rejected",
            ServerUnavailable => "Server unavailable",
            BadUserNameOrPassword => "Bad user name or password",
            NotAuthorized => "Not authorized",
        };
        write!(f, "{}", msg)
    }
}

impl ConnectReturnCode {
    pub fn get_code(&self) -> u8 {
        use ConnectReturnCode::*;

        match *self {
            Accepted => 0x00,
            UnacceptableProtocolVersion => 0x01,
            IdentifierRejected => 0x02,
            ServerUnavailable => 0x03,
            BadUserNameOrPassword => 0x04,
            NotAuthorized => 0x05,
        }
    }
}

impl Encoder for ConnectReturnCode {
    fn encode(&self, buffer: &mut bytes::BytesMut) {
        self.get_code().encode(buffer);
    }

    fn encoded_size(&self) -> usize {
        1
    }
}

impl Decoder for ConnectReturnCode {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        use ConnectReturnCode::*;

        let code = match u8::decode(buffer)? {
            0x00 => Accepted,
            0x01 => UnacceptableProtocolVersion,
            0x02 => IdentifierRejected,
            0x03 => ServerUnavailable,
            0x04 => BadUserNameOrPassword,
            0x05 => NotAuthorized,
            _ => return Err(Error::MalformedPacket("unknown CONNACK return code")),
        };

        Ok(code)
    }
}

/// Per-filter SUBACK return code: the granted QoS, or a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubAckReturnCode {
    Granted(QoS),
    Failure,
}

impl SubAckReturnCode {
    pub fn get_code(&self) -> u8 {
        match *self {
            SubAckReturnCode::Granted(qos) => qos as u8,
            SubAckReturnCode::Failure => 0x80,
        }
    }
}

impl Encoder for SubAckReturnCode {
    fn encode(&self, buffer: &mut bytes::BytesMut) {
        self.get_code().encode(buffer);
    }

    fn encoded_size(&self) -> usize {
        1
    }
}

impl Decoder for SubAckReturnCode {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        match u8::decode(buffer)? {
            0x80 => Ok(SubAckReturnCode::Failure),
            n => QoS::try_from(n)
                .map(SubAckReturnCode::Granted)
                .map_err(|_| Error::MalformedPacket("unknown SUBACK return code")),
        }
    }
}
