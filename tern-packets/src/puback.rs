use bytes::{Buf, BytesMut};

use tern_core::codec::{Decoder, Encoder};

/// Acknowledges a QoS 1 PUBLISH.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct PubAckPacket {
    pub packet_id: u16,
}

const FIXED_HEADER: u8 = 0x04 << 4;

impl Encoder for PubAckPacket {
    fn encode(&self, buffer: &mut BytesMut) {
        crate::encode_packet_id_only(FIXED_HEADER, self.packet_id, buffer);
    }

    fn encoded_size(&self) -> usize {
        4
    }
}

impl Decoder for PubAckPacket {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        let packet_id = crate::decode_packet_id_only(buffer)?;

        Ok(PubAckPacket { packet_id })
    }
}
