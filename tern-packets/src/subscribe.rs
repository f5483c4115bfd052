use std::convert::TryFrom;

use bytes::{Buf, BufMut, BytesMut};

use tern_core::{
    codec::{Decoder, Encoder, VariableByteInteger},
    error::Error,
    qos::QoS,
};

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SubscribePayload {
    pub topic_filter: String,
    pub qos: QoS,
}

impl Encoder for SubscribePayload {
    fn encode(&self, buffer: &mut BytesMut) {
        self.topic_filter.encode(buffer);
        buffer.put_u8(self.qos as u8);
    }

    fn encoded_size(&self) -> usize {
        self.topic_filter.encoded_size() + 1
    }
}

impl Decoder for SubscribePayload {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        let topic_filter = String::decode(buffer)?;

        let requested = u8::decode(buffer)?;
        if requested & 0b1111_1100 != 0 {
            return Err(Error::MalformedPacket("reserved subscription option bits set"));
        }

        Ok(SubscribePayload {
            topic_filter,
            qos: QoS::try_from(requested)?,
        })
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SubscribePacket {
    pub packet_id: u16,
    pub payload: Vec<SubscribePayload>,
}

const PACKET_TYPE: u8 = 0x08;

impl Encoder for SubscribePacket {
    fn encode(&self, buffer: &mut BytesMut) {
        let mut remaining_len = 0;

        // Fixed header
        let mut fixed_header: u8 = PACKET_TYPE << 4;
        fixed_header |= 0b0000_0010;
        fixed_header.encode(buffer);

        remaining_len += self.packet_id.encoded_size();
        remaining_len += self.payload.encoded_size();

        VariableByteInteger(remaining_len as u32).encode(buffer);

        self.packet_id.encode(buffer);
        self.payload.encode(buffer);
    }

    fn encoded_size(&self) -> usize {
        let remaining_len = 2 + self.payload.encoded_size();
        1 + VariableByteInteger(remaining_len as u32).encoded_size() + remaining_len
    }
}

impl Decoder for SubscribePacket {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        u8::decode(buffer)?; // Packet type
        let remaining_len = VariableByteInteger::decode(buffer)?.0 as usize;
        if buffer.remaining() < remaining_len || remaining_len < 2 {
            return Err(Error::MalformedPacket("truncated SUBSCRIBE"));
        }

        let next_packet = buffer.remaining() - remaining_len;

        let packet_id = u16::decode(buffer)?;
        let mut payload = Vec::new();

        while buffer.remaining() > next_packet {
            payload.push(SubscribePayload::decode(buffer)?);
        }

        if payload.is_empty() {
            return Err(Error::ProtocolViolation("SUBSCRIBE without topic filters"));
        }

        Ok(SubscribePacket { packet_id, payload })
    }
}

#[cfg(test)]
mod tests {
    use bytes::{Bytes, BytesMut};

    use crate::subscribe::*;

    #[test]
    fn test_subscribe_packet_encode_decode() {
        let expected = vec![
            0x82, 0x0f, 0x00, 0x01, 0x00, 0x0a, 0x74, 0x65, 0x73, 0x74, 0x5f, 0x74, 0x6f, 0x70,
            0x69, 0x63, 0x01,
        ];

        let packet = SubscribePacket {
            packet_id: 1,
            payload: vec![SubscribePayload {
                topic_filter: "test_topic".to_string(),
                qos: QoS::AtLeastOnce,
            }],
        };

        let mut encoded = BytesMut::new();
        packet.encode(&mut encoded);

        assert_eq!(encoded.to_vec(), expected);
        assert_eq!(packet.encoded_size(), expected.len());

        let mut bytes = Bytes::from(expected);

        let new_packet = SubscribePacket::decode(&mut bytes).expect("Unexpected error");
        assert_eq!(packet, new_packet);
    }

    #[test]
    fn test_subscribe_packet_multiple_filters() {
        let packet = SubscribePacket {
            packet_id: 10,
            payload: vec![
                SubscribePayload {
                    topic_filter: "a/#".to_string(),
                    qos: QoS::ExactlyOnce,
                },
                SubscribePayload {
                    topic_filter: "b/+".to_string(),
                    qos: QoS::AtMostOnce,
                },
            ],
        };

        let mut encoded = BytesMut::new();
        packet.encode(&mut encoded);
        assert_eq!(encoded[1], 0x0e);

        let new_packet = SubscribePacket::decode(&mut encoded).expect("Unexpected error");
        assert_eq!(packet, new_packet);
    }

    #[test]
    fn test_subscribe_rejects_empty_payload() {
        let mut bytes = Bytes::from(vec![0x82, 0x02, 0x00, 0x01]);
        assert!(matches!(
            SubscribePacket::decode(&mut bytes),
            Err(Error::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_subscribe_rejects_reserved_option_bits() {
        let mut bytes = Bytes::from(vec![0x82, 0x06, 0x00, 0x01, 0x00, 0x01, b'a', 0x04]);
        assert!(matches!(
            SubscribePacket::decode(&mut bytes),
            Err(Error::MalformedPacket(_))
        ));
    }
}
