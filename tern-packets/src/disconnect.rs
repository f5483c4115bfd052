use bytes::{Buf, BufMut, BytesMut};

use tern_core::codec::{Decoder, Encoder, VariableByteInteger};

#[derive(PartialEq, Eq, Debug, Clone, Default)]
pub struct DisconnectPacket {}

const PACKET_TYPE: u8 = 0x0e;

impl Encoder for DisconnectPacket {
    fn encode(&self, buffer: &mut BytesMut) {
        buffer.put_u8(PACKET_TYPE << 4);

        let remaining_len = 0;
        VariableByteInteger(remaining_len).encode(buffer);
    }

    fn encoded_size(&self) -> usize {
        2
    }
}

impl Decoder for DisconnectPacket {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        crate::decode_empty(buffer)?;
        Ok(Self {})
    }
}

#[cfg(test)]
mod tests {
    use bytes::{Bytes, BytesMut};

    use tern_core::codec::{Decoder, Encoder};

    use crate::disconnect::DisconnectPacket;

    #[test]
    fn test_disconnect_packet_encode_decode() {
        let expected = vec![0xe0, 0x00];

        let mut encoded = BytesMut::new();
        DisconnectPacket {}.encode(&mut encoded);

        assert_eq!(encoded.to_vec(), expected);

        let mut bytes = Bytes::from(expected);
        let packet = DisconnectPacket::decode(&mut bytes).expect("Unexpected error");
        assert_eq!(packet, DisconnectPacket {});
    }

    #[test]
    fn test_disconnect_rejects_non_empty_body() {
        let mut bytes = Bytes::from(vec![0xe0, 0x01, 0x00]);
        assert!(DisconnectPacket::decode(&mut bytes).is_err());
    }
}
