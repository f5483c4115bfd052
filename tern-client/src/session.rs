use std::sync::{Arc, Weak};

use bytes::Bytes;
use tern_core::{
    codec::MAX_REMAINING_LENGTH,
    message::Message,
    qos::QoS,
    return_code::ConnectReturnCode,
    topic,
};
use tern_packets::{
    connect::{ConnectFlags, ConnectPacket, ConnectPayload},
    ControlPacket,
};
use tokio::{
    net::TcpStream,
    sync::{mpsc, oneshot, watch, Mutex},
    time::timeout,
};
use tracing::{debug, info, warn};

use crate::connection::{Connection, Transport};
use crate::delegate::{self, SessionDelegate};
use crate::error::{ClientError, Result};
use crate::event::{ConnectionState, Connected, SessionEvent, SubscribeAck};
use crate::event_loop::{Command, SessionLoop};
use crate::options::ConnectOptions;
use crate::subscription::{Subscription, SubscriptionSet};
use crate::tls;

/// State shared between the session handles and the connection's event loop.
pub(crate) struct Core {
    pub(crate) state: watch::Sender<ConnectionState>,
    pub(crate) subscriptions: Mutex<SubscriptionSet>,
    pub(crate) events: mpsc::UnboundedSender<SessionEvent>,
}

pub(crate) struct Shared {
    options: ConnectOptions,
    delegate: Box<dyn SessionDelegate>,
    core: Arc<Core>,
    /// Command channel of the current connection's event loop.
    link: Mutex<Option<mpsc::Sender<Command>>>,
    /// Taken when the dispatcher task starts on the first connect.
    dispatcher: Mutex<Option<mpsc::UnboundedReceiver<SessionEvent>>>,
}

/// An MQTT session with one broker.
///
/// Handles are cheap to clone and all drive the same session. Each
/// [`connect`](Self::connect) starts a fresh connection; the session itself
/// keeps its options, delegate and, when not clean, its subscriptions.
/// Dropping every handle closes the connection as [`disconnect`](Self::disconnect)
/// would.
#[derive(Clone)]
pub struct MqttSession {
    shared: Arc<Shared>,
}

/// Puts the session back to `Disconnected` if a connect attempt is abandoned.
struct ConnectAttempt<'a> {
    core: &'a Core,
    done: bool,
}

impl Drop for ConnectAttempt<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.core.state.send_replace(ConnectionState::Disconnected);
        }
    }
}

impl MqttSession {
    pub fn new(options: ConnectOptions, delegate: impl SessionDelegate) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (events, dispatcher) = mpsc::unbounded_channel();

        let core = Arc::new(Core {
            state,
            subscriptions: Mutex::new(SubscriptionSet::default()),
            events,
        });

        MqttSession {
            shared: Arc::new(Shared {
                options,
                delegate: Box::new(delegate),
                core,
                link: Mutex::new(None),
                dispatcher: Mutex::new(Some(dispatcher)),
            }),
        }
    }

    pub(crate) fn upgrade(shared: &Weak<Shared>) -> Option<MqttSession> {
        shared.upgrade().map(|shared| MqttSession { shared })
    }

    pub(crate) fn delegate(&self) -> &dyn SessionDelegate {
        self.shared.delegate.as_ref()
    }

    pub fn client_id(&self) -> &str {
        &self.shared.options.client_id
    }

    pub fn options(&self) -> &ConnectOptions {
        &self.shared.options
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.core.state.borrow()
    }

    /// Follow state changes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.core.state.subscribe()
    }

    /// Subscriptions acknowledged by the broker.
    pub async fn subscriptions(&self) -> Vec<Subscription> {
        self.shared.core.subscriptions.lock().await.to_vec()
    }

    /// Connect to the configured broker over TCP, or TLS when enabled.
    pub async fn connect(&self) -> Result<Connected> {
        let attempt = self.begin_connect()?;
        let options = &self.shared.options;

        let addr = format!("{}:{}", options.host, options.port);
        info!("Connecting to MQTT broker at {}", addr);

        let stream = timeout(options.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| ClientError::Timeout)?
            .map_err(ClientError::NetworkUnreachable)?;

        if options.tls.enabled {
            let stream = timeout(
                options.connect_timeout,
                tls::handshake(&options.tls, &options.host, stream),
            )
            .await
            .map_err(|_| ClientError::Timeout)??;

            self.handshake(stream, attempt).await
        } else {
            self.handshake(stream, attempt).await
        }
    }

    /// Connect over an already established byte stream.
    pub async fn connect_with<S: Transport>(&self, stream: S) -> Result<Connected> {
        let attempt = self.begin_connect()?;
        self.handshake(stream, attempt).await
    }

    fn begin_connect(&self) -> Result<ConnectAttempt<'_>> {
        validate_connect_options(&self.shared.options)?;
        let core = self.shared.core.as_ref();

        let started = core.state.send_if_modified(|state| {
            if *state == ConnectionState::Disconnected {
                *state = ConnectionState::Connecting;
                true
            } else {
                false
            }
        });

        if !started {
            return Err(ClientError::AlreadyConnected);
        }

        Ok(ConnectAttempt { core, done: false })
    }

    async fn handshake<S: Transport>(
        &self,
        stream: S,
        mut attempt: ConnectAttempt<'_>,
    ) -> Result<Connected> {
        let options = &self.shared.options;
        let mut connection = Connection::new(stream);

        let connect = ControlPacket::Connect(build_connect_packet(options));
        let response = timeout(options.connect_timeout, async {
            connection.write_packet(&connect).await?;
            connection.read_packet().await
        })
        .await
        .map_err(|_| ClientError::Timeout)??;

        let connack = match response {
            Some(ControlPacket::ConnAck(connack)) => connack,
            Some(packet) => {
                return Err(ClientError::Protocol(format!(
                    "expected CONNACK, got {:?}",
                    packet.packet_type()
                )))
            }
            None => return Err(ClientError::ConnectionClosed),
        };

        if connack.return_code != ConnectReturnCode::Accepted {
            warn!("Connection refused: {}", connack.return_code);
            return Err(ClientError::ProtocolRejected(connack.return_code));
        }

        let session_present = connack.flags.session_present;
        info!(
            "Connected to MQTT broker, client_id: {}, session_present: {}",
            options.client_id, session_present
        );

        if options.clean_session || !session_present {
            self.shared.core.subscriptions.lock().await.clear();
        }

        if let Some(events) = self.shared.dispatcher.lock().await.take() {
            tokio::spawn(delegate::dispatch(Arc::downgrade(&self.shared), events));
        }

        let (command_tx, command_rx) = mpsc::channel(32);
        *self.shared.link.lock().await = Some(command_tx);

        let event_loop = SessionLoop::new(connection, options, self.shared.core.clone(), command_rx);

        attempt.done = true;
        self.shared
            .core
            .state
            .send_replace(ConnectionState::Connected);
        tokio::spawn(event_loop.run());

        Ok(Connected { session_present })
    }

    /// Subscribe to a topic filter.
    ///
    /// On success the filter joins the subscription set with the QoS the
    /// broker granted, which may be lower than `qos`.
    pub async fn subscribe(&self, topic_filter: &str, qos: QoS) -> Result<SubscribeAck> {
        topic::validate_subscribe_filter(topic_filter)
            .map_err(|e| ClientError::InvalidTopic(e.to_string()))?;

        let (response, rx) = oneshot::channel();
        self.send(Command::Subscribe {
            topic_filter: topic_filter.to_string(),
            qos,
            response,
        })
        .await?;

        rx.await.map_err(|_| ClientError::Cancelled)?
    }

    pub async fn unsubscribe(&self, topic_filter: &str) -> Result<()> {
        topic::validate_subscribe_filter(topic_filter)
            .map_err(|e| ClientError::InvalidTopic(e.to_string()))?;

        let (response, rx) = oneshot::channel();
        self.send(Command::Unsubscribe {
            topic_filter: topic_filter.to_string(),
            response,
        })
        .await?;

        rx.await.map_err(|_| ClientError::Cancelled)?
    }

    /// Publish a message.
    ///
    /// Resolves once the packet is written for QoS 0, on PUBACK for QoS 1
    /// and on PUBCOMP for QoS 2. Returns the packet identifier used, if any.
    pub async fn publish(
        &self,
        topic_name: &str,
        payload: impl Into<Bytes>,
        qos: QoS,
        retain: bool,
    ) -> Result<Option<u16>> {
        topic::validate_publish_topic(topic_name)
            .map_err(|e| ClientError::InvalidTopic(e.to_string()))?;

        let payload = payload.into();
        let packet_id_len = match qos {
            QoS::AtMostOnce => 0,
            _ => 2,
        };
        let header_len = 2 + topic_name.len() + packet_id_len;
        if header_len + payload.len() > MAX_REMAINING_LENGTH as usize {
            return Err(ClientError::PayloadTooLarge(payload.len()));
        }

        let (response, rx) = oneshot::channel();
        self.send(Command::Publish {
            message: Message::new(topic_name, payload, qos).retain(retain),
            response,
        })
        .await?;

        rx.await.map_err(|_| ClientError::Cancelled)?
    }

    /// Close the connection cleanly.
    ///
    /// Pending requests resolve with [`ClientError::Cancelled`] and the
    /// delegate sees one final `on_disconnected` with reason `Closed`.
    pub async fn disconnect(&self) -> Result<()> {
        let (response, rx) = oneshot::channel();
        self.send(Command::Disconnect { response }).await?;

        // The loop may have gone down on its own meanwhile
        rx.await.unwrap_or(Ok(()))
    }

    async fn send(&self, command: Command) -> Result<()> {
        let state = self.state();
        if state != ConnectionState::Connected {
            debug!("Rejecting request while {}", state);
            return Err(ClientError::NotConnected);
        }

        let link = self
            .shared
            .link
            .lock()
            .await
            .clone()
            .ok_or(ClientError::NotConnected)?;

        link.send(command)
            .await
            .map_err(|_| ClientError::NotConnected)
    }
}

/// CONNECT fields carry a two byte length prefix.
fn check_field_len(field: &str, len: usize) -> Result<()> {
    if len > u16::MAX as usize {
        return Err(ClientError::InvalidOptions(format!(
            "{} of {} bytes exceeds {} bytes",
            field,
            len,
            u16::MAX
        )));
    }

    Ok(())
}

/// Reject options that cannot be encoded into a CONNECT packet.
fn validate_connect_options(options: &ConnectOptions) -> Result<()> {
    check_field_len("client id", options.client_id.len())?;

    if let Some(username) = &options.username {
        check_field_len("username", username.len())?;
    }

    if let Some(password) = &options.password {
        check_field_len("password", password.len())?;
    }

    if let Some(will) = &options.will {
        topic::validate_publish_topic(&will.topic)
            .map_err(|e| ClientError::InvalidTopic(e.to_string()))?;
        check_field_len("will payload", will.payload.len())?;
    }

    Ok(())
}

/// Build a CONNECT packet from options.
fn build_connect_packet(options: &ConnectOptions) -> ConnectPacket {
    let flags = ConnectFlags {
        user_name: options.username.is_some(),
        password: options.password.is_some(),
        will_retain: options.will.as_ref().map(|w| w.retain).unwrap_or(false),
        will_qos: options
            .will
            .as_ref()
            .map(|w| w.qos)
            .unwrap_or(QoS::AtMostOnce),
        will_flag: options.will.is_some(),
        clean_session: options.clean_session,
    };

    let payload = ConnectPayload {
        client_id: options.client_id.clone(),
        will_topic: options.will.as_ref().map(|w| w.topic.clone()),
        will_payload: options.will.as_ref().map(|w| w.payload.clone()),
        user_name: options.username.clone(),
        password: options.password.clone(),
    };

    ConnectPacket {
        protocol_version: options.protocol_version,
        flags,
        keepalive: options.keep_alive,
        payload,
    }
}
