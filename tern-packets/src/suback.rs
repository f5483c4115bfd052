use bytes::{Buf, BytesMut};

use tern_core::{
    codec::{Decoder, Encoder, VariableByteInteger},
    error::Error,
    return_code::SubAckReturnCode,
};

/// One return code per requested topic filter, in request order.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SubAckPacket {
    pub packet_id: u16,
    pub return_codes: Vec<SubAckReturnCode>,
}

const PACKET_TYPE: u8 = 0x09;

impl Encoder for SubAckPacket {
    fn encode(&self, buffer: &mut BytesMut) {
        let mut remaining_len = 0;

        // Fixed header
        let fixed_header: u8 = PACKET_TYPE << 4;
        fixed_header.encode(buffer);

        remaining_len += self.packet_id.encoded_size();
        remaining_len += self.return_codes.encoded_size();

        VariableByteInteger(remaining_len as u32).encode(buffer);

        self.packet_id.encode(buffer);
        self.return_codes.encode(buffer);
    }

    fn encoded_size(&self) -> usize {
        let remaining_len = 2 + self.return_codes.len();
        1 + VariableByteInteger(remaining_len as u32).encoded_size() + remaining_len
    }
}

impl Decoder for SubAckPacket {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        u8::decode(buffer)?; // Packet type
        let remaining_len = VariableByteInteger::decode(buffer)?.0 as usize;
        if buffer.remaining() < remaining_len || remaining_len < 3 {
            return Err(Error::MalformedPacket("truncated SUBACK"));
        }

        let next_packet = buffer.remaining() - remaining_len;

        let packet_id = u16::decode(buffer)?;
        let mut return_codes = Vec::new();

        while buffer.remaining() > next_packet {
            return_codes.push(SubAckReturnCode::decode(buffer)?);
        }

        Ok(SubAckPacket {
            packet_id,
            return_codes,
        })
    }
}
