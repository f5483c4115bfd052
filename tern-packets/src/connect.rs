use std::convert::TryFrom;
use std::mem;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use tern_core::{
    codec::{Decoder, Encoder, VariableByteInteger},
    error::Error,
    protocol::ProtocolVersion,
    qos::QoS,
};

#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct ConnectFlags {
    pub user_name: bool,
    pub password: bool,
    pub will_retain: bool,
    pub will_qos: QoS,
    pub will_flag: bool,
    pub clean_session: bool,
}

impl Encoder for ConnectFlags {
    fn encode(&self, buffer: &mut BytesMut) {
        let mut flags: u8 = 0;

        if self.user_name {
            flags = 0b1000_0000;
        }

        if self.password {
            flags |= 0b0100_0000;
        }

        if self.will_flag {
            flags |= 0b0000_0100;
            flags |= (self.will_qos as u8) << 3;

            if self.will_retain {
                flags |= 0b0010_0000;
            }
        }

        if self.clean_session {
            flags |= 0b0000_0010;
        }

        buffer.put_u8(flags);
    }

    fn encoded_size(&self) -> usize {
        mem::size_of::<u8>()
    }
}

impl Decoder for ConnectFlags {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        let byte = u8::decode(buffer)?;
        if (byte & 0b0000_0001) != 0 {
            return Err(Error::MalformedPacket("reserved connect flag set"));
        }

        let mut flags = ConnectFlags {
            user_name: (byte & 0b1000_0000) != 0,
            password: (byte & 0b0100_0000) != 0,
            will_retain: (byte & 0b0010_0000) != 0,
            clean_session: (byte & 0b0000_0010) != 0,
            ..Default::default()
        };

        if (byte & 0b0000_0100) != 0 {
            flags.will_flag = true;
            flags.will_qos = QoS::try_from((byte >> 3) & 0b0000_0011)?;
        } else if (byte & 0b0011_1000) != 0 {
            return Err(Error::MalformedPacket("will flags set without a will"));
        }

        if flags.password && !flags.user_name {
            return Err(Error::MalformedPacket("password flag set without user name"));
        }

        Ok(flags)
    }
}

#[derive(Default, Debug, Eq, PartialEq, Clone)]
pub struct ConnectPayload {
    pub client_id: String,
    pub will_topic: Option<String>,
    pub will_payload: Option<Bytes>,
    pub user_name: Option<String>,
    pub password: Option<Bytes>,
}

impl ConnectPayload {
    /// Encode only the fields announced by `flags`.
    pub fn encode_with_flags(&self, buffer: &mut BytesMut, flags: &ConnectFlags) {
        self.client_id.encode(buffer);

        if flags.will_flag {
            self.will_topic.encode(buffer);
            self.will_payload.encode(buffer);
        }

        if flags.user_name {
            self.user_name.encode(buffer);
        }
        if flags.password {
            self.password.encode(buffer);
        }
    }

    pub fn encoded_size_with_flags(&self, flags: &ConnectFlags) -> usize {
        let mut len = 0;

        len += self.client_id.encoded_size();

        if flags.will_flag {
            len += self.will_topic.encoded_size();
            len += self.will_payload.encoded_size();
        }

        if flags.user_name {
            len += self.user_name.encoded_size();
        }
        if flags.password {
            len += self.password.encoded_size();
        }

        len
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ConnectPacket {
    pub protocol_version: ProtocolVersion,
    pub flags: ConnectFlags,
    pub keepalive: u16,
    pub payload: ConnectPayload,
}

const PACKET_TYPE: u8 = 0x01;

impl ConnectPacket {
    fn remaining_len(&self) -> usize {
        let mut remaining_len = 0;

        remaining_len += self.protocol_version.protocol_name().encoded_size();
        remaining_len += self.protocol_version.protocol_level().encoded_size();
        remaining_len += self.flags.encoded_size();
        remaining_len += self.keepalive.encoded_size();
        remaining_len += self.payload.encoded_size_with_flags(&self.flags);

        remaining_len
    }
}

impl Encoder for ConnectPacket {
    fn encode(&self, buffer: &mut BytesMut) {
        // Fixed header
        buffer.put_u8(PACKET_TYPE << 4);
        VariableByteInteger(self.remaining_len() as u32).encode(buffer);

        // Variable header
        self.protocol_version.protocol_name().encode(buffer);
        self.protocol_version.protocol_level().encode(buffer);
        self.flags.encode(buffer);
        self.keepalive.encode(buffer);

        // Payload
        self.payload.encode_with_flags(buffer, &self.flags);
    }

    fn encoded_size(&self) -> usize {
        let remaining_len = self.remaining_len();
        1 + VariableByteInteger(remaining_len as u32).encoded_size() + remaining_len
    }
}

impl Decoder for ConnectPacket {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        buffer.advance(1); // Packet type
        let _ = VariableByteInteger::decode(buffer)?; // Remaining length

        let protocol_name = String::decode(buffer)?;
        let protocol_level = u8::decode(buffer)?;

        let protocol_version = ProtocolVersion::from_name_and_level(&protocol_name, protocol_level)
            .ok_or(Error::ProtocolViolation("unsupported protocol version"))?;

        let flags = ConnectFlags::decode(buffer)?;
        let keepalive = u16::decode(buffer)?;

        let mut payload = ConnectPayload {
            client_id: String::decode(buffer)?,
            ..Default::default()
        };

        if flags.will_flag {
            payload.will_topic = Some(String::decode(buffer)?);
            payload.will_payload = Some(Bytes::decode(buffer)?);
        }

        if flags.user_name {
            payload.user_name = Some(String::decode(buffer)?);
        }

        if flags.password {
            payload.password = Some(Bytes::decode(buffer)?);
        }

        Ok(ConnectPacket {
            protocol_version,
            flags,
            keepalive,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::connect::*;

    #[test]
    fn test_connect_packet_v3_1_1_encode_decode() {
        // Protocol: MQTT (2+4=6 bytes), Level: 1 byte, Flags: 1 byte, Keepalive: 2 bytes, Client ID: 2 bytes = 12 total
        let expected = vec![
            0x10, // Packet type: CONNECT
            0x0c, // Remaining length: 12
            0x00, 0x04, 0x4d, 0x51, 0x54, 0x54, // Protocol name: "MQTT"
            0x04, // Protocol level: 4 (MQTT 3.1.1)
            0x02, // Flags: clean_session
            0x00, 0x3c, // Keepalive: 60
            0x00, 0x00, // Client ID: empty
        ];

        let flags = ConnectFlags {
            clean_session: true,
            ..Default::default()
        };

        let packet = ConnectPacket {
            protocol_version: ProtocolVersion::V3_1_1,
            flags,
            keepalive: 60,
            payload: ConnectPayload::default(),
        };

        let mut encoded = BytesMut::new();
        packet.encode(&mut encoded);

        assert_eq!(encoded.to_vec(), expected);
        assert_eq!(packet.encoded_size(), expected.len());

        let mut bytes = Bytes::from(expected);
        let new_packet = ConnectPacket::decode(&mut bytes).expect("Unexpected error");
        assert_eq!(packet, new_packet);
    }

    #[test]
    fn test_connect_packet_with_will_and_credentials() {
        let expected = vec![
            0x10, 0x2b, 0x00, 0x04, 0x4d, 0x51, 0x54, 0x54, 0x04, 0xee, 0x00, 0x0f, 0x00, 0x05,
            0x61, 0x62, 0x63, 0x64, 0x65, 0x00, 0x04, 0x6c, 0x61, 0x73, 0x74, 0x00, 0x04, 0x67,
            0x6f, 0x6e, 0x65, 0x00, 0x04, 0x75, 0x73, 0x65, 0x72, 0x00, 0x06, 0x73, 0x65, 0x63,
            0x72, 0x65, 0x74,
        ];

        let flags = ConnectFlags {
            user_name: true,
            password: true,
            will_retain: true,
            will_qos: QoS::AtLeastOnce,
            will_flag: true,
            clean_session: true,
        };

        let payload = ConnectPayload {
            client_id: String::from("abcde"),
            will_topic: String::from("last").into(),
            will_payload: Bytes::from("gone").into(),
            user_name: String::from("user").into(),
            password: Bytes::from("secret").into(),
        };

        let packet = ConnectPacket {
            protocol_version: ProtocolVersion::V3_1_1,
            flags,
            keepalive: 15,
            payload,
        };

        let mut encoded = BytesMut::new();
        packet.encode(&mut encoded);

        assert_eq!(encoded.to_vec(), expected);

        let mut bytes = Bytes::from(expected);
        let new_packet = ConnectPacket::decode(&mut bytes).expect("Unexpected error");
        assert_eq!(packet, new_packet);
    }

    #[test]
    fn test_connect_packet_v3_1_decode() {
        // Protocol: MQIsdp (2+6=8 bytes), Level: 1 byte, Flags: 1 byte, Keepalive: 2 bytes, Client ID: 2 bytes = 14 total
        let input = vec![
            0x10, // Packet type: CONNECT
            0x0e, // Remaining length: 14
            0x00, 0x06, 0x4d, 0x51, 0x49, 0x73, 0x64, 0x70, // Protocol name: "MQIsdp"
            0x03, // Protocol level: 3 (MQTT 3.1)
            0x02, // Flags: clean_session
            0x00, 0x3c, // Keepalive: 60
            0x00, 0x00, // Client ID: empty
        ];

        let mut bytes = Bytes::from(input);
        let packet = ConnectPacket::decode(&mut bytes).expect("Unexpected error");

        assert_eq!(packet.protocol_version, ProtocolVersion::V3_1);
        assert!(packet.flags.clean_session);
        assert_eq!(packet.keepalive, 60);
    }

    #[test]
    fn test_connect_flags_reject_reserved_bit() {
        let mut bytes = Bytes::from(vec![0x03]);
        assert!(ConnectFlags::decode(&mut bytes).is_err());
    }
}
