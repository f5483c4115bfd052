use bytes::{Buf, BytesMut};

use tern_core::codec::{Decoder, Encoder};

/// First acknowledgement of a QoS 2 PUBLISH.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct PubRecPacket {
    pub packet_id: u16,
}

const FIXED_HEADER: u8 = 0x05 << 4;

impl Encoder for PubRecPacket {
    fn encode(&self, buffer: &mut BytesMut) {
        crate::encode_packet_id_only(FIXED_HEADER, self.packet_id, buffer);
    }

    fn encoded_size(&self) -> usize {
        4
    }
}

impl Decoder for PubRecPacket {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        let packet_id = crate::decode_packet_id_only(buffer)?;

        Ok(PubRecPacket { packet_id })
    }
}
