use bytes::{Buf, BytesMut};
use tern_core::codec::Encoder;
use tern_packets::ControlPacket;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ClientError, Result};

/// Any byte stream a session can run over: TCP, TLS, or an in-memory pipe.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// A byte stream with MQTT packet framing.
pub struct Connection<S> {
    stream: S,
    read_buffer: BytesMut,
    write_buffer: BytesMut,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            read_buffer: BytesMut::with_capacity(4096),
            write_buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Write a control packet to the connection.
    pub async fn write_packet(&mut self, packet: &ControlPacket) -> Result<()> {
        self.write_buffer.clear();
        packet.encode(&mut self.write_buffer);

        self.stream.write_all(&self.write_buffer).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read a control packet from the connection.
    ///
    /// Returns `None` if the peer closed the stream between packets. Safe to
    /// cancel: bytes already read stay buffered for the next call.
    pub async fn read_packet(&mut self) -> Result<Option<ControlPacket>> {
        loop {
            if let Some(packet) = self.parse_packet()? {
                return Ok(Some(packet));
            }

            if self.stream.read_buf(&mut self.read_buffer).await? == 0 {
                if self.read_buffer.is_empty() {
                    return Ok(None);
                }

                return Err(ClientError::ConnectionClosed);
            }
        }
    }

    fn parse_packet(&mut self) -> Result<Option<ControlPacket>> {
        match ControlPacket::check(&self.read_buffer) {
            Ok(len) => {
                let mut frame = self.read_buffer.split_to(len).freeze();
                let packet = ControlPacket::parse(&mut frame)?;

                if frame.has_remaining() {
                    return Err(ClientError::Protocol(format!(
                        "{} trailing bytes after {:?}",
                        frame.remaining(),
                        packet.packet_type()
                    )));
                }

                Ok(Some(packet))
            }
            Err(tern_core::error::Error::PacketIncomplete) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Flush and close the write half.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tern_packets::{puback::PubAckPacket, pingresp::PingRespPacket};
    use tokio::io::AsyncWriteExt;

    use super::*;

    #[tokio::test]
    async fn test_read_packet_across_partial_writes() {
        let (client, mut broker) = tokio::io::duplex(64);
        let mut connection = Connection::new(client);

        let reader = tokio::spawn(async move {
            let first = connection.read_packet().await.expect("read");
            let second = connection.read_packet().await.expect("read");
            let third = connection.read_packet().await.expect("read");
            (first, second, third)
        });

        broker.write_all(&[0x40, 0x02, 0x00]).await.expect("write");
        tokio::task::yield_now().await;
        broker.write_all(&[0x09, 0xd0, 0x00]).await.expect("write");
        drop(broker);

        let (first, second, third) = reader.await.expect("join");
        assert_eq!(
            first,
            Some(ControlPacket::PubAck(PubAckPacket { packet_id: 9 }))
        );
        assert_eq!(second, Some(ControlPacket::PingResp(PingRespPacket {})));
        assert_eq!(third, None);
    }

    #[tokio::test]
    async fn test_eof_mid_packet() {
        let (client, mut broker) = tokio::io::duplex(64);
        let mut connection = Connection::new(client);

        broker.write_all(&[0x30, 0x05, 0x00]).await.expect("write");
        drop(broker);

        assert!(matches!(
            connection.read_packet().await,
            Err(ClientError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_malformed_packet() {
        let (client, mut broker) = tokio::io::duplex(64);
        let mut connection = Connection::new(client);

        broker.write_all(&[0xf0, 0x00]).await.expect("write");

        assert!(matches!(
            connection.read_packet().await,
            Err(ClientError::Packet(_))
        ));
    }

    #[tokio::test]
    async fn test_write_packet() {
        let (client, mut broker) = tokio::io::duplex(64);
        let mut connection = Connection::new(client);

        connection
            .write_packet(&ControlPacket::PubAck(PubAckPacket { packet_id: 3 }))
            .await
            .expect("write");

        let mut received = [0u8; 4];
        broker.read_exact(&mut received).await.expect("read");
        assert_eq!(received, [0x40, 0x02, 0x00, 0x03]);
    }
}
