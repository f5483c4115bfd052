use bytes::{Buf, BytesMut};

use tern_core::codec::{Decoder, Encoder};

/// Completes the QoS 2 handshake.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct PubCompPacket {
    pub packet_id: u16,
}

const FIXED_HEADER: u8 = 0x07 << 4;

impl Encoder for PubCompPacket {
    fn encode(&self, buffer: &mut BytesMut) {
        crate::encode_packet_id_only(FIXED_HEADER, self.packet_id, buffer);
    }

    fn encoded_size(&self) -> usize {
        4
    }
}

impl Decoder for PubCompPacket {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        let packet_id = crate::decode_packet_id_only(buffer)?;

        Ok(PubCompPacket { packet_id })
    }
}
