use std::sync::Weak;

use tern_core::message::Message;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::ClientError;
use crate::event::{DisconnectReason, SessionEvent};
use crate::session::{MqttSession, Shared};

/// Receives the events of one session.
///
/// Callbacks run one at a time on the session's dispatcher task, never on
/// the network task, so a slow delegate does not stall packet handling.
/// They must not block; spawn a task to call back into the session.
pub trait SessionDelegate: Send + Sync + 'static {
    /// An application message arrived on a subscribed topic.
    fn on_message_received(&self, _message: &Message, _session: &MqttSession) {}

    /// The connection went down. Fires once per successful connect, and
    /// nothing fires for that connection afterwards.
    fn on_disconnected(
        &self,
        _session: &MqttSession,
        _reason: DisconnectReason,
        _error: Option<&ClientError>,
    ) {
    }

    /// The broker answered a PINGREQ.
    fn on_ping_acknowledged(&self, _session: &MqttSession) {}
}

/// A delegate that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDelegate;

impl SessionDelegate for NoopDelegate {}

/// Drain queued events into the delegate until the session goes away.
pub(crate) async fn dispatch(session: Weak<Shared>, mut events: mpsc::UnboundedReceiver<SessionEvent>) {
    while let Some(event) = events.recv().await {
        let Some(session) = MqttSession::upgrade(&session) else {
            debug!("Session dropped, discarding {:?}", event);
            break;
        };

        let delegate = session.delegate();
        match event {
            SessionEvent::Message(message) => delegate.on_message_received(&message, &session),
            SessionEvent::PingAcknowledged => delegate.on_ping_acknowledged(&session),
            SessionEvent::Disconnected { reason, error } => {
                delegate.on_disconnected(&session, reason, error.as_ref())
            }
        }
    }
}
