use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tern_core::{message::Message, qos::QoS, return_code::SubAckReturnCode};
use tern_packets::{
    disconnect::DisconnectPacket,
    pingreq::PingReqPacket,
    puback::PubAckPacket,
    pubcomp::PubCompPacket,
    publish::PublishPacket,
    pubrec::PubRecPacket,
    pubrel::PubRelPacket,
    suback::SubAckPacket,
    subscribe::{SubscribePacket, SubscribePayload},
    unsubscribe::{UnsubscribePacket, UnsubscribePayload},
    ControlPacket,
};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use crate::connection::{Connection, Transport};
use crate::error::{ClientError, Result};
use crate::event::{ConnectionState, DisconnectReason, SessionEvent, SubscribeAck};
use crate::keepalive::{KeepAlive, KeepAliveAction};
use crate::options::ConnectOptions;
use crate::packet_id::PacketIdTable;
use crate::session::Core;

/// Requests from session handles to the event loop.
pub(crate) enum Command {
    Publish {
        message: Message,
        response: oneshot::Sender<Result<Option<u16>>>,
    },
    Subscribe {
        topic_filter: String,
        qos: QoS,
        response: oneshot::Sender<Result<SubscribeAck>>,
    },
    Unsubscribe {
        topic_filter: String,
        response: oneshot::Sender<Result<()>>,
    },
    Disconnect {
        response: oneshot::Sender<Result<()>>,
    },
}

impl Command {
    fn cancel(self) {
        match self {
            Command::Publish { response, .. } => {
                let _ = response.send(Err(ClientError::Cancelled));
            }
            Command::Subscribe { response, .. } => {
                let _ = response.send(Err(ClientError::Cancelled));
            }
            Command::Unsubscribe { response, .. } => {
                let _ = response.send(Err(ClientError::Cancelled));
            }
            Command::Disconnect { response } => {
                let _ = response.send(Ok(()));
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PublishStep {
    AwaitingPubAck,
    AwaitingPubRec,
    AwaitingPubComp,
}

/// An outbound request waiting for its acknowledgement.
enum Request {
    Subscribe {
        topic_filter: String,
        qos: QoS,
        response: oneshot::Sender<Result<SubscribeAck>>,
    },
    Unsubscribe {
        topic_filter: String,
        response: oneshot::Sender<Result<()>>,
    },
    Publish {
        packet: PublishPacket,
        step: PublishStep,
        response: oneshot::Sender<Result<Option<u16>>>,
    },
}

impl Request {
    fn timeout_error(&self) -> ClientError {
        match self {
            Request::Subscribe { .. } => ClientError::SubscribeTimeout,
            Request::Unsubscribe { .. } => ClientError::UnsubscribeTimeout,
            Request::Publish { .. } => ClientError::PublishTimeout,
        }
    }

    fn fail(self, error: ClientError) {
        match self {
            Request::Subscribe { response, .. } => {
                let _ = response.send(Err(error));
            }
            Request::Unsubscribe { response, .. } => {
                let _ = response.send(Err(error));
            }
            Request::Publish { response, .. } => {
                let _ = response.send(Err(error));
            }
        }
    }
}

struct InFlight {
    request: Request,
    deadline: Instant,
    retries: u32,
}

/// Owns one connection: the only writer to the transport, the in-flight
/// table, inbound QoS 2 state and the keep-alive timer. Ends with the
/// connection.
pub(crate) struct SessionLoop<S> {
    connection: Connection<S>,
    commands: mpsc::Receiver<Command>,
    core: Arc<Core>,
    in_flight: PacketIdTable<InFlight>,
    /// Inbound QoS 2 identifiers delivered but not yet released by PUBREL.
    awaiting_pubrel: HashSet<u16>,
    keep_alive: KeepAlive,
    /// Replies held back until teardown has marked the session disconnected.
    deferred: Vec<Box<dyn FnOnce() + Send>>,
    ack_timeout: Duration,
    max_retries: u32,
    clean_session: bool,
}

impl<S: Transport> SessionLoop<S> {
    pub(crate) fn new(
        connection: Connection<S>,
        options: &ConnectOptions,
        core: Arc<Core>,
        commands: mpsc::Receiver<Command>,
    ) -> Self {
        Self {
            connection,
            commands,
            core,
            in_flight: PacketIdTable::new(),
            awaiting_pubrel: HashSet::new(),
            keep_alive: KeepAlive::new(options.keep_alive, Instant::now()),
            deferred: Vec::new(),
            ack_timeout: options.ack_timeout,
            max_retries: options.max_retries,
            clean_session: options.clean_session,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            let timer = self.next_deadline();

            tokio::select! {
                result = self.connection.read_packet() => {
                    let outcome = match result {
                        Ok(Some(packet)) => self.handle_packet(packet).await,
                        Ok(None) => Err(ClientError::ConnectionClosed),
                        Err(e) => Err(e),
                    };

                    if let Err(e) = outcome {
                        return self.fail(e).await;
                    }
                }

                command = self.commands.recv() => {
                    let outcome = match command {
                        Some(Command::Publish { message, response }) => {
                            self.publish(message, response).await
                        }
                        Some(Command::Subscribe { topic_filter, qos, response }) => {
                            self.subscribe(topic_filter, qos, response).await
                        }
                        Some(Command::Unsubscribe { topic_filter, response }) => {
                            self.unsubscribe(topic_filter, response).await
                        }
                        Some(Command::Disconnect { response }) => {
                            self.close().await;
                            let _ = response.send(Ok(()));
                            return;
                        }
                        None => {
                            debug!("All session handles dropped");
                            return self.close().await;
                        }
                    };

                    if let Err(e) = outcome {
                        return self.fail(e).await;
                    }
                }

                _ = time::sleep_until(timer.unwrap_or_else(Instant::now)), if timer.is_some() => {
                    if let Err(e) = self.handle_timers().await {
                        return self.fail(e).await;
                    }
                }
            }
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        let acks = self.in_flight.iter().map(|(_, entry)| entry.deadline).min();

        match (acks, self.keep_alive.next_deadline()) {
            (Some(ack), Some(ping)) => Some(ack.min(ping)),
            (ack, ping) => ack.or(ping),
        }
    }

    async fn write(&mut self, packet: &ControlPacket) -> Result<()> {
        let (deadline, expired) = self.write_deadline(Instant::now());

        match time::timeout_at(deadline, self.connection.write_packet(packet)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("Write of {:?} did not complete in time", packet.packet_type());
                return Err(expired);
            }
        }

        self.keep_alive.on_outbound(Instant::now());
        Ok(())
    }

    /// Deadline for one write, and the error once it passes: an ack timeout
    /// from now, or the keep-alive dead line if sooner. Timers do not run
    /// while a write is pending.
    fn write_deadline(&self, now: Instant) -> (Instant, ClientError) {
        let ack = now + self.ack_timeout;

        match self.keep_alive.dead_deadline() {
            Some(dead) if dead < ack => (dead, ClientError::PingTimeout),
            _ => (ack, ClientError::WriteTimeout),
        }
    }

    fn defer(&mut self, reply: impl FnOnce() + Send + 'static) {
        self.deferred.push(Box::new(reply));
    }

    fn emit(&self, event: SessionEvent) {
        if self.core.events.send(event).is_err() {
            debug!("Event dispatcher is gone");
        }
    }

    async fn publish(
        &mut self,
        message: Message,
        response: oneshot::Sender<Result<Option<u16>>>,
    ) -> Result<()> {
        let mut packet = PublishPacket {
            dup: false,
            qos_level: message.qos,
            retain: message.retain,
            topic_name: message.topic,
            packet_id: None,
            payload: message.payload,
        };

        let step = match packet.qos_level {
            QoS::AtMostOnce => {
                if let Err(e) = self.write(&ControlPacket::Publish(packet)).await {
                    self.defer(move || {
                        let _ = response.send(Err(ClientError::Cancelled));
                    });
                    return Err(e);
                }

                let _ = response.send(Ok(None));
                return Ok(());
            }
            QoS::AtLeastOnce => PublishStep::AwaitingPubAck,
            QoS::ExactlyOnce => PublishStep::AwaitingPubRec,
        };

        let Some(packet_id) = self.in_flight.next_free() else {
            let _ = response.send(Err(ClientError::PacketIdsExhausted));
            return Ok(());
        };

        packet.packet_id = Some(packet_id);
        debug!(
            "Publishing to {} with {}, packet id {}",
            packet.topic_name, packet.qos_level, packet_id
        );

        let publish = ControlPacket::Publish(packet.clone());
        self.track(
            packet_id,
            Request::Publish {
                packet,
                step,
                response,
            },
        );

        self.write(&publish).await
    }

    async fn subscribe(
        &mut self,
        topic_filter: String,
        qos: QoS,
        response: oneshot::Sender<Result<SubscribeAck>>,
    ) -> Result<()> {
        let Some(packet_id) = self.in_flight.next_free() else {
            let _ = response.send(Err(ClientError::PacketIdsExhausted));
            return Ok(());
        };

        let subscribe = ControlPacket::Subscribe(SubscribePacket {
            packet_id,
            payload: vec![SubscribePayload {
                topic_filter: topic_filter.clone(),
                qos,
            }],
        });

        debug!("Subscribing to {} with {}", topic_filter, qos);
        self.track(
            packet_id,
            Request::Subscribe {
                topic_filter,
                qos,
                response,
            },
        );

        self.write(&subscribe).await
    }

    async fn unsubscribe(
        &mut self,
        topic_filter: String,
        response: oneshot::Sender<Result<()>>,
    ) -> Result<()> {
        let Some(packet_id) = self.in_flight.next_free() else {
            let _ = response.send(Err(ClientError::PacketIdsExhausted));
            return Ok(());
        };

        let unsubscribe = ControlPacket::Unsubscribe(UnsubscribePacket {
            packet_id,
            payload: vec![UnsubscribePayload {
                topic_filter: topic_filter.clone(),
            }],
        });

        debug!("Unsubscribing from {}", topic_filter);
        self.track(
            packet_id,
            Request::Unsubscribe {
                topic_filter,
                response,
            },
        );

        self.write(&unsubscribe).await
    }

    fn track(&mut self, packet_id: u16, request: Request) {
        self.in_flight.occupy(
            packet_id,
            InFlight {
                request,
                deadline: Instant::now() + self.ack_timeout,
                retries: 0,
            },
        );
    }

    async fn handle_packet(&mut self, packet: ControlPacket) -> Result<()> {
        match packet {
            ControlPacket::Publish(publish) => self.handle_publish(publish).await,
            ControlPacket::PubAck(ack) => {
                self.complete_publish(ack.packet_id, PublishStep::AwaitingPubAck);
                Ok(())
            }
            ControlPacket::PubRec(rec) => self.handle_pubrec(rec.packet_id).await,
            ControlPacket::PubRel(rel) => {
                if !self.awaiting_pubrel.remove(&rel.packet_id) {
                    debug!("PUBREL for released packet id {}", rel.packet_id);
                }

                self.write(&ControlPacket::PubComp(PubCompPacket {
                    packet_id: rel.packet_id,
                }))
                .await
            }
            ControlPacket::PubComp(comp) => {
                self.complete_publish(comp.packet_id, PublishStep::AwaitingPubComp);
                Ok(())
            }
            ControlPacket::SubAck(ack) => self.handle_suback(ack).await,
            ControlPacket::UnsubAck(ack) => self.handle_unsuback(ack.packet_id).await,
            ControlPacket::PingResp(_) => {
                debug!("Received PINGRESP");
                self.keep_alive.on_ping_response(Instant::now());
                self.emit(SessionEvent::PingAcknowledged);
                Ok(())
            }
            ControlPacket::Disconnect(_) => {
                info!("Received DISCONNECT from broker");
                Err(ClientError::ConnectionClosed)
            }
            packet => Err(ClientError::Protocol(format!(
                "unexpected {:?} from broker",
                packet.packet_type()
            ))),
        }
    }

    async fn handle_publish(&mut self, publish: PublishPacket) -> Result<()> {
        let ack = match (publish.qos_level, publish.packet_id) {
            (QoS::AtMostOnce, _) => None,
            (QoS::AtLeastOnce, Some(packet_id)) => {
                Some(ControlPacket::PubAck(PubAckPacket { packet_id }))
            }
            (QoS::ExactlyOnce, Some(packet_id)) => {
                Some(ControlPacket::PubRec(PubRecPacket { packet_id }))
            }
            (_, None) => {
                return Err(ClientError::Protocol(String::from(
                    "PUBLISH without packet identifier",
                )))
            }
        };

        let first_receipt = match (publish.qos_level, publish.packet_id) {
            (QoS::ExactlyOnce, Some(packet_id)) => self.awaiting_pubrel.insert(packet_id),
            _ => true,
        };

        if first_receipt {
            if !self.core.subscriptions.lock().await.matches(&publish.topic_name) {
                debug!("No local subscription matches {}", publish.topic_name);
            }

            let message = Message {
                topic: publish.topic_name,
                payload: publish.payload,
                qos: publish.qos_level,
                retain: publish.retain,
            };
            self.emit(SessionEvent::Message(message));
        } else {
            debug!(
                "Duplicate QoS 2 PUBLISH for packet id {:?}, not delivered",
                publish.packet_id
            );
        }

        match ack {
            Some(ack) => self.write(&ack).await,
            None => Ok(()),
        }
    }

    fn complete_publish(&mut self, packet_id: u16, expected: PublishStep) {
        let awaiting = matches!(
            self.in_flight.get(packet_id),
            Some(InFlight {
                request: Request::Publish { step, .. },
                ..
            }) if *step == expected
        );

        if !awaiting {
            warn!(
                "Ignoring acknowledgement for packet id {} not {:?}",
                packet_id, expected
            );
            return;
        }

        if let Some(InFlight {
            request: Request::Publish { response, .. },
            ..
        }) = self.in_flight.remove(packet_id)
        {
            debug!("Publish with packet id {} complete", packet_id);
            let _ = response.send(Ok(Some(packet_id)));
        }
    }

    async fn handle_pubrec(&mut self, packet_id: u16) -> Result<()> {
        let now = Instant::now();
        let ack_timeout = self.ack_timeout;

        match self.in_flight.get_mut(packet_id) {
            Some(InFlight {
                request: Request::Publish { step, .. },
                deadline,
                retries,
            }) if *step != PublishStep::AwaitingPubAck => {
                if *step == PublishStep::AwaitingPubRec {
                    *step = PublishStep::AwaitingPubComp;
                    *retries = 0;
                } else {
                    debug!("Repeated PUBREC for packet id {}", packet_id);
                }
                *deadline = now + ack_timeout;
            }
            _ => warn!("PUBREC for unknown packet id {}", packet_id),
        }

        self.write(&ControlPacket::PubRel(PubRelPacket { packet_id }))
            .await
    }

    async fn handle_suback(&mut self, ack: SubAckPacket) -> Result<()> {
        let packet_id = ack.packet_id;

        let Some(InFlight {
            request:
                Request::Subscribe {
                    topic_filter,
                    qos,
                    response,
                },
            ..
        }) = self.take_if(packet_id, |request| matches!(request, Request::Subscribe { .. }))
        else {
            warn!("SUBACK for unknown packet id {}", packet_id);
            return Ok(());
        };

        match ack.return_codes.as_slice() {
            [SubAckReturnCode::Granted(granted)] if *granted <= qos => {
                info!("Subscribed to {} with {}", topic_filter, granted);
                self.core
                    .subscriptions
                    .lock()
                    .await
                    .insert(topic_filter.clone(), *granted);

                let _ = response.send(Ok(SubscribeAck {
                    topic_filter,
                    requested: qos,
                    granted: *granted,
                }));
                Ok(())
            }
            [SubAckReturnCode::Failure] => {
                warn!("Subscription to {} rejected", topic_filter);
                let _ = response.send(Err(ClientError::SubscribeRejected(topic_filter)));
                Ok(())
            }
            codes => {
                let message = format!("invalid SUBACK {:?} for {} request", codes, qos);
                let reply = ClientError::Protocol(message.clone());
                self.defer(move || {
                    let _ = response.send(Err(reply));
                });
                Err(ClientError::Protocol(message))
            }
        }
    }

    async fn handle_unsuback(&mut self, packet_id: u16) -> Result<()> {
        let Some(InFlight {
            request: Request::Unsubscribe {
                topic_filter,
                response,
            },
            ..
        }) = self.take_if(packet_id, |request| {
            matches!(request, Request::Unsubscribe { .. })
        })
        else {
            warn!("UNSUBACK for unknown packet id {}", packet_id);
            return Ok(());
        };

        info!("Unsubscribed from {}", topic_filter);
        self.core.subscriptions.lock().await.remove(&topic_filter);
        let _ = response.send(Ok(()));

        Ok(())
    }

    /// Release `packet_id` only if it tracks the expected kind of request.
    fn take_if(&mut self, packet_id: u16, expected: impl Fn(&Request) -> bool) -> Option<InFlight> {
        match self.in_flight.get(packet_id) {
            Some(entry) if expected(&entry.request) => self.in_flight.remove(packet_id),
            _ => None,
        }
    }

    async fn handle_timers(&mut self) -> Result<()> {
        let now = Instant::now();

        match self.keep_alive.poll(now) {
            KeepAliveAction::SendPing => {
                debug!("Sending PINGREQ");
                self.write(&ControlPacket::PingReq(PingReqPacket {})).await?;
            }
            KeepAliveAction::TimedOut => {
                warn!("No PINGRESP from broker");
                return Err(ClientError::PingTimeout);
            }
            KeepAliveAction::Idle => {}
        }

        let mut expired: Vec<u16> = self
            .in_flight
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(packet_id, _)| packet_id)
            .collect();
        expired.sort_unstable();

        for packet_id in expired {
            self.on_ack_timeout(packet_id, now).await?;
        }

        Ok(())
    }

    /// Retransmit the last unacknowledged step, or give up once retries run out.
    async fn on_ack_timeout(&mut self, packet_id: u16, now: Instant) -> Result<()> {
        let ack_timeout = self.ack_timeout;
        let max_retries = self.max_retries;

        let Some(entry) = self.in_flight.get_mut(packet_id) else {
            return Ok(());
        };

        if entry.retries < max_retries {
            let resend = match &mut entry.request {
                Request::Publish {
                    step: PublishStep::AwaitingPubComp,
                    ..
                } => Some(ControlPacket::PubRel(PubRelPacket { packet_id })),
                Request::Publish { packet, .. } => {
                    packet.dup = true;
                    Some(ControlPacket::Publish(packet.clone()))
                }
                Request::Subscribe { .. } | Request::Unsubscribe { .. } => None,
            };

            if let Some(packet) = resend {
                entry.retries += 1;
                entry.deadline = now + ack_timeout;

                warn!(
                    "Retransmitting {:?} for packet id {} (attempt {} of {})",
                    packet.packet_type(),
                    packet_id,
                    entry.retries,
                    max_retries
                );
                return self.write(&packet).await;
            }
        }

        let Some(entry) = self.in_flight.remove(packet_id) else {
            return Ok(());
        };

        let request = entry.request;
        let error = request.timeout_error();
        warn!("{} for packet id {}", error, packet_id);

        self.defer(move || {
            let caller_error = request.timeout_error();
            request.fail(caller_error);
        });

        Err(error)
    }

    /// Clean shutdown on request.
    async fn close(mut self) {
        self.core
            .state
            .send_replace(ConnectionState::Disconnecting);
        info!("Disconnecting from broker");

        let (deadline, _) = self.write_deadline(Instant::now());
        let connection = &mut self.connection;
        let goodbye = time::timeout_at(deadline, async {
            if let Err(e) = connection
                .write_packet(&ControlPacket::Disconnect(DisconnectPacket {}))
                .await
            {
                debug!("Failed to send DISCONNECT: {}", e);
            }

            if let Err(e) = connection.shutdown().await {
                debug!("Failed to shut down transport: {}", e);
            }
        });

        if goodbye.await.is_err() {
            debug!("Broker not reading, dropping connection without DISCONNECT");
        }

        self.teardown(DisconnectReason::Closed, None).await;
    }

    async fn fail(mut self, error: ClientError) {
        let reason = DisconnectReason::for_error(&error);

        match reason {
            DisconnectReason::Closed => info!("Connection closed: {}", error),
            _ => error!("Connection lost ({:?}): {}", reason, error),
        }

        self.teardown(reason, Some(error)).await;
    }

    /// The state reads `Disconnected` before any request resolves or the
    /// event is queued. Nothing awaits after that point.
    async fn teardown(&mut self, reason: DisconnectReason, error: Option<ClientError>) {
        self.commands.close();

        if self.clean_session {
            self.core.subscriptions.lock().await.clear();
        }

        self.core.state.send_replace(ConnectionState::Disconnected);

        for reply in self.deferred.drain(..) {
            reply();
        }

        for (packet_id, entry) in self.in_flight.drain() {
            debug!("Cancelling request with packet id {}", packet_id);
            entry.request.fail(ClientError::Cancelled);
        }

        while let Ok(command) = self.commands.try_recv() {
            command.cancel();
        }

        self.emit(SessionEvent::Disconnected { reason, error });
    }
}
