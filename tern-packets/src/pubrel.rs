use bytes::{Buf, BytesMut};

use tern_core::codec::{Decoder, Encoder};

/// Releases a QoS 2 PUBLISH after PUBREC.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct PubRelPacket {
    pub packet_id: u16,
}

const FIXED_HEADER: u8 = (0x06 << 4) | 0b0010;

impl Encoder for PubRelPacket {
    fn encode(&self, buffer: &mut BytesMut) {
        crate::encode_packet_id_only(FIXED_HEADER, self.packet_id, buffer);
    }

    fn encoded_size(&self) -> usize {
        4
    }
}

impl Decoder for PubRelPacket {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        let packet_id = crate::decode_packet_id_only(buffer)?;

        Ok(PubRelPacket { packet_id })
    }
}
