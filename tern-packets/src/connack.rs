use bytes::{Buf, BufMut, BytesMut};

use tern_core::{
    codec::{Decoder, Encoder, VariableByteInteger},
    error::Error,
    return_code::ConnectReturnCode,
};

#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct ConnAckFlags {
    pub session_present: bool,
}

impl Encoder for ConnAckFlags {
    fn encode(&self, buffer: &mut BytesMut) {
        buffer.put_u8(self.session_present as u8);
    }

    fn encoded_size(&self) -> usize {
        1
    }
}

impl Decoder for ConnAckFlags {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        let byte = u8::decode(buffer)?;
        if byte & 0b1111_1110 != 0 {
            return Err(Error::MalformedPacket("reserved CONNACK flags set"));
        }

        Ok(ConnAckFlags {
            session_present: byte == 1,
        })
    }
}

#[derive(Default, Debug, Eq, PartialEq, Clone)]
pub struct ConnAckPacket {
    pub flags: ConnAckFlags,
    pub return_code: ConnectReturnCode,
}

const PACKET_TYPE: u8 = 0x02;

impl Encoder for ConnAckPacket {
    fn encode(&self, buffer: &mut BytesMut) {
        // Fixed header
        buffer.put_u8(PACKET_TYPE << 4);
        VariableByteInteger(2).encode(buffer);

        // Variable header
        self.flags.encode(buffer);
        self.return_code.encode(buffer);
    }

    fn encoded_size(&self) -> usize {
        4
    }
}

impl Decoder for ConnAckPacket {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        u8::decode(buffer)?; // Packet type

        let remaining_len = VariableByteInteger::decode(buffer)?;
        if remaining_len.0 != 2 {
            return Err(Error::MalformedPacket("unexpected CONNACK length"));
        }

        let flags = ConnAckFlags::decode(buffer)?;
        let return_code = ConnectReturnCode::decode(buffer)?;

        // A refused connection never resumes a session
        if flags.session_present && return_code != ConnectReturnCode::Accepted {
            return Err(Error::ProtocolViolation(
                "session present set on a refused connection",
            ));
        }

        Ok(ConnAckPacket { flags, return_code })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use crate::connack::*;

    #[test]
    fn test_connack_packet_encode_decode() {
        let expected = vec![
            0x20, // Packet type: CONNACK
            0x02, // Remaining length: 2
            0x01, // Flags: session_present = true
            0x00, // Return code: 0 = Connection Accepted
        ];

        let packet = ConnAckPacket {
            flags: ConnAckFlags {
                session_present: true,
            },
            return_code: ConnectReturnCode::Accepted,
        };

        let mut encoded = BytesMut::new();
        packet.encode(&mut encoded);

        assert_eq!(encoded.to_vec(), expected);

        let mut bytes = Bytes::from(expected);
        let new_packet = ConnAckPacket::decode(&mut bytes).expect("Unexpected error");

        assert_eq!(packet, new_packet);
    }

    #[test]
    fn test_connack_packet_not_authorized() {
        let mut bytes = Bytes::from(vec![0x20, 0x02, 0x00, 0x05]);
        let packet = ConnAckPacket::decode(&mut bytes).expect("Unexpected error");

        assert!(!packet.flags.session_present);
        assert_eq!(packet.return_code, ConnectReturnCode::NotAuthorized);
    }

    #[test]
    fn test_connack_rejects_reserved_flags() {
        let mut bytes = Bytes::from(vec![0x20, 0x02, 0x02, 0x00]);
        assert!(matches!(
            ConnAckPacket::decode(&mut bytes),
            Err(Error::MalformedPacket(_))
        ));
    }

    #[test]
    fn test_connack_rejects_session_present_on_refusal() {
        let mut bytes = Bytes::from(vec![0x20, 0x02, 0x01, 0x03]);
        assert!(matches!(
            ConnAckPacket::decode(&mut bytes),
            Err(Error::ProtocolViolation(_))
        ));
    }
}
