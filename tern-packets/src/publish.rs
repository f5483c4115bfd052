use std::convert::TryFrom;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use tern_core::{
    codec::{Decoder, Encoder, VariableByteInteger},
    error::Error,
    qos::QoS,
};

#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct PublishPacket {
    pub dup: bool,
    pub qos_level: QoS,
    pub retain: bool,
    pub topic_name: String,
    /// Present if and only if `qos_level` is above `AtMostOnce`.
    pub packet_id: Option<u16>,
    pub payload: Bytes,
}

const PACKET_TYPE: u8 = 0x03;

impl PublishPacket {
    fn remaining_len(&self) -> usize {
        let mut remaining_len = 0;

        remaining_len += self.topic_name.encoded_size();
        remaining_len += self.packet_id.encoded_size();
        remaining_len += self.payload.len();

        remaining_len
    }

    fn fixed_header(&self) -> u8 {
        let mut fixed_header = PACKET_TYPE << 4;

        if self.dup {
            fixed_header |= 0b0000_1000;
        }

        fixed_header |= (self.qos_level as u8) << 1;

        if self.retain {
            fixed_header |= 0b0000_0001;
        }

        fixed_header
    }
}

impl Encoder for PublishPacket {
    fn encode(&self, buffer: &mut BytesMut) {
        // Fixed header
        buffer.put_u8(self.fixed_header());
        VariableByteInteger(self.remaining_len() as u32).encode(buffer);

        // Variable header
        self.topic_name.encode(buffer);
        self.packet_id.encode(buffer);

        // Payload, not length prefixed
        buffer.extend_from_slice(&self.payload);
    }

    fn encoded_size(&self) -> usize {
        let remaining_len = self.remaining_len();
        1 + VariableByteInteger(remaining_len as u32).encoded_size() + remaining_len
    }
}

impl Decoder for PublishPacket {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        let fixed_header = u8::decode(buffer)?;

        let dup = (fixed_header & 0b0000_1000) != 0;
        let qos_level = QoS::try_from((fixed_header >> 1) & 0b0000_0011)?;
        let retain = (fixed_header & 0b0000_0001) != 0;

        if dup && qos_level == QoS::AtMostOnce {
            return Err(Error::MalformedPacket("DUP set on a QoS 0 PUBLISH"));
        }

        let remaining_len = VariableByteInteger::decode(buffer)?.0 as usize;
        if buffer.remaining() < remaining_len {
            return Err(Error::MalformedPacket("truncated PUBLISH"));
        }

        let start = buffer.remaining();

        let topic_name = String::decode(buffer)?;
        if topic_name.contains(|c: char| c == '+' || c == '#') {
            return Err(Error::ProtocolViolation("wildcard in PUBLISH topic name"));
        }

        let packet_id = match qos_level {
            QoS::AtMostOnce => None,
            _ => match u16::decode(buffer)? {
                0 => return Err(Error::ProtocolViolation("PUBLISH with packet identifier 0")),
                id => Some(id),
            },
        };

        let payload_len = remaining_len
            .checked_sub(start - buffer.remaining())
            .ok_or(Error::MalformedPacket("PUBLISH header exceeds remaining length"))?;
        let payload = buffer.copy_to_bytes(payload_len);

        Ok(PublishPacket {
            dup,
            qos_level,
            retain,
            topic_name,
            packet_id,
            payload,
        })
    }
}
