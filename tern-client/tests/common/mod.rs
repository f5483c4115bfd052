//! Scripted broker and recording delegate for session tests.

#![allow(dead_code)]

use std::time::Duration;

use bytes::Bytes;
use tern_client::{
    ClientError, ConnectOptions, Connected, Connection, DisconnectReason, ErrorKind, Message,
    MqttSession, SessionDelegate,
};
use tern_core::{qos::QoS, return_code::ConnectReturnCode};
use tern_packets::{
    connack::{ConnAckFlags, ConnAckPacket},
    connect::ConnectPacket,
    publish::PublishPacket,
    ControlPacket,
};
use tokio::io::{duplex, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;

/// What the session reported to its delegate.
#[derive(Debug, PartialEq)]
pub enum Event {
    Message(Message),
    PingAcknowledged,
    Disconnected {
        reason: DisconnectReason,
        error: Option<ErrorKind>,
    },
}

pub struct Recorder {
    events: mpsc::UnboundedSender<Event>,
}

impl SessionDelegate for Recorder {
    fn on_message_received(&self, message: &Message, _session: &MqttSession) {
        let _ = self.events.send(Event::Message(message.clone()));
    }

    fn on_disconnected(
        &self,
        _session: &MqttSession,
        reason: DisconnectReason,
        error: Option<&ClientError>,
    ) {
        let _ = self.events.send(Event::Disconnected {
            reason,
            error: error.map(ClientError::kind),
        });
    }

    fn on_ping_acknowledged(&self, _session: &MqttSession) {
        let _ = self.events.send(Event::PingAcknowledged);
    }
}

pub fn recorder() -> (Recorder, mpsc::UnboundedReceiver<Event>) {
    let (events, rx) = mpsc::unbounded_channel();
    (Recorder { events }, rx)
}

/// Options for tests: keep-alive off unless a test turns it on.
pub fn options() -> ConnectOptions {
    ConnectOptions::new("localhost", 1883)
        .client_id("tester")
        .keep_alive(0)
        .ack_timeout(Duration::from_secs(10))
        .max_retries(3)
}

/// The broker end of an in-memory connection.
pub struct MockBroker {
    connection: Connection<DuplexStream>,
}

impl MockBroker {
    pub fn new(stream: DuplexStream) -> Self {
        Self {
            connection: Connection::new(stream),
        }
    }

    /// Next packet from the client, `None` once it hung up.
    pub async fn next(&mut self) -> Option<ControlPacket> {
        self.connection
            .read_packet()
            .await
            .expect("client sent an invalid packet")
    }

    pub async fn expect(&mut self) -> ControlPacket {
        self.next().await.expect("client closed the connection")
    }

    pub async fn expect_publish(&mut self) -> PublishPacket {
        match self.expect().await {
            ControlPacket::Publish(publish) => publish,
            packet => panic!("expected PUBLISH, got {:?}", packet),
        }
    }

    pub async fn send(&mut self, packet: ControlPacket) {
        self.connection
            .write_packet(&packet)
            .await
            .expect("failed to write to client");
    }

    /// Read CONNECT and answer with a CONNACK.
    pub async fn accept(
        &mut self,
        session_present: bool,
        return_code: ConnectReturnCode,
    ) -> ConnectPacket {
        let connect = match self.expect().await {
            ControlPacket::Connect(connect) => connect,
            packet => panic!("expected CONNECT, got {:?}", packet),
        };

        self.send(ControlPacket::ConnAck(ConnAckPacket {
            flags: ConnAckFlags { session_present },
            return_code,
        }))
        .await;

        connect
    }
}

/// Write raw bytes, bypassing packet encoding.
pub async fn write_raw(stream: &mut DuplexStream, bytes: &[u8]) {
    stream.write_all(bytes).await.expect("failed to write to client");
}

/// Connect `session` to a fresh mock broker.
pub async fn connect(session: &MqttSession, session_present: bool) -> (MockBroker, Connected) {
    connect_with_buffer(session, session_present, 64 * 1024).await
}

/// Connect over a pipe holding at most `buffer` bytes in each direction.
pub async fn connect_with_buffer(
    session: &MqttSession,
    session_present: bool,
    buffer: usize,
) -> (MockBroker, Connected) {
    let (client, server) = duplex(buffer);
    let mut broker = MockBroker::new(server);

    let (connected, _) = tokio::join!(
        session.connect_with(client),
        broker.accept(session_present, ConnectReturnCode::Accepted)
    );

    (broker, connected.expect("connect failed"))
}

pub fn inbound(topic: &str, payload: &'static str, qos: QoS, packet_id: Option<u16>) -> ControlPacket {
    ControlPacket::Publish(PublishPacket {
        dup: false,
        qos_level: qos,
        retain: false,
        topic_name: topic.to_string(),
        packet_id,
        payload: Bytes::from_static(payload.as_bytes()),
    })
}
