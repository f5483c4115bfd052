use bytes::{Buf, BytesMut};

use tern_core::{
    codec::{Decoder, Encoder, VariableByteInteger},
    error::Error,
};

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct UnsubscribePayload {
    pub topic_filter: String,
}

impl Encoder for UnsubscribePayload {
    fn encode(&self, buffer: &mut BytesMut) {
        self.topic_filter.encode(buffer);
    }

    fn encoded_size(&self) -> usize {
        self.topic_filter.encoded_size()
    }
}

impl Decoder for UnsubscribePayload {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        let topic_filter = String::decode(buffer)?;

        Ok(UnsubscribePayload { topic_filter })
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct UnsubscribePacket {
    pub packet_id: u16,
    pub payload: Vec<UnsubscribePayload>,
}

const PACKET_TYPE: u8 = 0x0a;

impl Encoder for UnsubscribePacket {
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

impl Decoder for UnsubscribePacket {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        u8::decode(buffer)?; // Packet type
        let remaining_len = VariableByteInteger::decode(buffer)?.0 as usize;
        if buffer.remaining() < remaining_len || remaining_len < 2 {
            return Err(Error::MalformedPacket("truncated UNSUBSCRIBE"));
        }

        let next_packet = buffer.remaining() - remaining_len;

        let packet_id = u16::decode(buffer)?;
        let mut payload = Vec::new();

        while buffer.remaining() > next_packet {
            payload.push(UnsubscribePayload::decode(buffer)?);
        }

        if payload.is_empty() {
            return Err(Error::ProtocolViolation("UNSUBSCRIBE without topic filters"));
        }

        Ok(UnsubscribePacket { packet_id, payload })
    }
}

#[cfg(test)]
mod tests {
    use bytes::{Bytes, BytesMut};

    use crate::unsubscribe::*;

    #[test]
    fn test_unsubscribe_packet_encode_decode() {
        let expected = vec![
            0xa2, 0x0e, 0x00, 0x01, 0x00, 0x0a, 0x74, 0x65, 0x73, 0x74, 0x5f, 0x74, 0x6f, 0x70,
            0x69, 0x63,
        ];

        let packet = UnsubscribePacket {
            packet_id: 1,
            payload: vec![UnsubscribePayload {
                topic_filter: "test_topic".to_string(),
            }],
        };

        let mut encoded = BytesMut::new();
        packet.encode(&mut encoded);

        assert_eq!(encoded.to_vec(), expected);
        assert_eq!(packet.encoded_size(), expected.len());

        let mut bytes = Bytes::from(expected);

        let new_packet = UnsubscribePacket::decode(&mut bytes).expect("Unexpected error");
        assert_eq!(packet, new_packet);
    }

    #[test]
    fn test_unsubscribe_rejects_empty_payload() {
        let mut bytes = Bytes::from(vec![0xa2, 0x02, 0x00, 0x05]);
        assert!(matches!(
            UnsubscribePacket::decode(&mut bytes),
            Err(Error::ProtocolViolation(_))
        ));
    }
}
