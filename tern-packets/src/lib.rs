pub mod connack;
pub mod connect;
pub mod disconnect;
pub mod pingreq;
pub mod pingresp;
pub mod puback;
pub mod pubcomp;
pub mod publish;
pub mod pubrec;
pub mod pubrel;
pub mod suback;
pub mod subscribe;
pub mod unsuback;
pub mod unsubscribe;

use std::convert::TryFrom;

use bytes::{Buf, BufMut, BytesMut};

use tern_core::{
    codec::{Decoder, Encoder, VariableByteInteger},
    error::Error,
    Result,
};

use crate::{
    connack::ConnAckPacket, connect::ConnectPacket, disconnect::DisconnectPacket,
    pingreq::PingReqPacket, pingresp::PingRespPacket, puback::PubAckPacket, pubcomp::PubCompPacket,
    publish::PublishPacket, pubrec::PubRecPacket, pubrel::PubRelPacket, suback::SubAckPacket,
    subscribe::SubscribePacket, unsuback::UnsubAckPacket, unsubscribe::UnsubscribePacket,
};

#[derive(PartialEq, Eq, Debug, Clone)]
pub enum ControlPacket {
    Connect(ConnectPacket),
    ConnAck(ConnAckPacket),
    Publish(PublishPacket),
    PubAck(PubAckPacket),
    PubRec(PubRecPacket),
    PubRel(PubRelPacket),
    PubComp(PubCompPacket),
    Subscribe(SubscribePacket),
    SubAck(SubAckPacket),
    Unsubscribe(UnsubscribePacket),
    UnsubAck(UnsubAckPacket),
    PingReq(PingReqPacket),
    PingResp(PingRespPacket),
    Disconnect(DisconnectPacket),
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PacketType {
    Connect = 0x01,
    ConnAck,
    Publish,
    PubAck,
    PubRec,
    PubRel,
    PubComp,
    Subscribe,
    SubAck,
    Unsubscribe,
    UnsubAck,
    PingReq,
    PingResp,
    Disconnect,
}

impl TryFrom<u8> for PacketType {
    type Error = Error;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        use PacketType::*;

        let res = match value {
            0x01 => Connect,
            0x02 => ConnAck,
            0x03 => Publish,
            0x04 => PubAck,
            0x05 => PubRec,
            0x06 => PubRel,
            0x07 => PubComp,
            0x08 => Subscribe,
            0x09 => SubAck,
            0x0a => Unsubscribe,
            0x0b => UnsubAck,
            0x0c => PingReq,
            0x0d => PingResp,
            0x0e => Disconnect,
            _ => return Err(Error::MalformedPacket("unknown packet type")),
        };

        Ok(res)
    }
}

impl PacketType {
    /// Flags every packet type except PUBLISH must carry in the fixed header.
    fn reserved_flags(&self) -> Option<u8> {
        match self {
            PacketType::Publish => None,
            PacketType::PubRel | PacketType::Subscribe | PacketType::Unsubscribe => Some(0b0010),
            _ => Some(0b0000),
        }
    }
}

impl ControlPacket {
    /// Check whether `src` starts with a complete packet.
    ///
    /// Returns the length of that packet (fixed header included), or
    /// `Error::PacketIncomplete` when more bytes are needed.
    pub fn check(src: &[u8]) -> crate::Result<usize> {
        if src.is_empty() {
            return Err(Error::PacketIncomplete);
        }

        let mut peeker = &src[1..];
        let remaining_len = VariableByteInteger::decode(&mut peeker)?;
        let packet_len = 1 + remaining_len.encoded_size() + remaining_len.0 as usize;

        if src.len() >= packet_len {
            return Ok(packet_len);
        }

        Err(Error::PacketIncomplete)
    }

    /// Parse one complete packet from the front of `src`.
    pub fn parse<T: Buf>(src: &mut T) -> crate::Result<ControlPacket> {
        use ControlPacket::*;

        if !src.has_remaining() {
            return Err(Error::PacketIncomplete);
        }

        let header = src.chunk()[0];
        let packet_type = PacketType::try_from(header >> 4)?;

        if let Some(flags) = packet_type.reserved_flags() {
            if header & 0x0f != flags {
                return Err(Error::MalformedPacket("invalid fixed header flags"));
            }
        }

        let packet = match packet_type {
            PacketType::Connect => Connect(ConnectPacket::decode(src)?),
            PacketType::ConnAck => ConnAck(ConnAckPacket::decode(src)?),
            PacketType::Publish => Publish(PublishPacket::decode(src)?),
            PacketType::PubAck => PubAck(PubAckPacket::decode(src)?),
            PacketType::PubRec => PubRec(PubRecPacket::decode(src)?),
            PacketType::PubRel => PubRel(PubRelPacket::decode(src)?),
            PacketType::PubComp => PubComp(PubCompPacket::decode(src)?),
            PacketType::Subscribe => Subscribe(SubscribePacket::decode(src)?),
            PacketType::SubAck => SubAck(SubAckPacket::decode(src)?),
            PacketType::Unsubscribe => Unsubscribe(UnsubscribePacket::decode(src)?),
            PacketType::UnsubAck => UnsubAck(UnsubAckPacket::decode(src)?),
            PacketType::PingReq => PingReq(PingReqPacket::decode(src)?),
            PacketType::PingResp => PingResp(PingRespPacket::decode(src)?),
            PacketType::Disconnect => Disconnect(DisconnectPacket::decode(src)?),
        };

        Ok(packet)
    }

    pub fn packet_type(&self) -> PacketType {
        use ControlPacket::*;

        match self {
            Connect(_) => PacketType::Connect,
            ConnAck(_) => PacketType::ConnAck,
            Publish(_) => PacketType::Publish,
            PubAck(_) => PacketType::PubAck,
            PubRec(_) => PacketType::PubRec,
            PubRel(_) => PacketType::PubRel,
            PubComp(_) => PacketType::PubComp,
            Subscribe(_) => PacketType::Subscribe,
            SubAck(_) => PacketType::SubAck,
            Unsubscribe(_) => PacketType::Unsubscribe,
            UnsubAck(_) => PacketType::UnsubAck,
            PingReq(_) => PacketType::PingReq,
            PingResp(_) => PacketType::PingResp,
            Disconnect(_) => PacketType::Disconnect,
        }
    }
}

impl Encoder for ControlPacket {
    fn encode(&self, buffer: &mut BytesMut) {
        use ControlPacket::*;

        match self {
            Connect(p) => p.encode(buffer),
            ConnAck(p) => p.encode(buffer),
            Publish(p) => p.encode(buffer),
            PubAck(p) => p.encode(buffer),
            PubRec(p) => p.encode(buffer),
            PubRel(p) => p.encode(buffer),
            PubComp(p) => p.encode(buffer),
            Subscribe(p) => p.encode(buffer),
            SubAck(p) => p.encode(buffer),
            Unsubscribe(p) => p.encode(buffer),
            UnsubAck(p) => p.encode(buffer),
            PingReq(p) => p.encode(buffer),
            PingResp(p) => p.encode(buffer),
            Disconnect(p) => p.encode(buffer),
        }
    }
}

/// Encode a packet whose variable header is only a packet identifier.
pub(crate) fn encode_packet_id_only(fixed_header: u8, packet_id: u16, buffer: &mut BytesMut) {
    buffer.put_u8(fixed_header);
    VariableByteInteger(2).encode(buffer);
    packet_id.encode(buffer);
}

/// Decode a packet whose variable header is only a packet identifier.
pub(crate) fn decode_packet_id_only<T: Buf>(buffer: &mut T) -> crate::Result<u16> {
    u8::decode(buffer)?;

    let remaining_len = VariableByteInteger::decode(buffer)?;
    if remaining_len.0 != 2 {
        return Err(Error::MalformedPacket("unexpected remaining length"));
    }

    u16::decode(buffer)
}

/// Decode a packet with an empty variable header and payload.
pub(crate) fn decode_empty<T: Buf>(buffer: &mut T) -> crate::Result<()> {
    u8::decode(buffer)?;

    let remaining_len = VariableByteInteger::decode(buffer)?;
    if remaining_len.0 != 0 {
        return Err(Error::MalformedPacket("unexpected remaining length"));
    }

    Ok(())
}
