use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Packet is not complete")]
    PacketIncomplete,

    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed packet: {0}")]
    MalformedPacket(&'static str),

    #[error("Protocol violation: {0}")]
    ProtocolViolation(&'static str),
}
