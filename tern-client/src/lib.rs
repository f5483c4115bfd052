//! Tern MQTT Client Library
//!
//! An asynchronous MQTT 3.1.1 session engine. An [`MqttSession`] owns one
//! client's connection lifecycle: the connect handshake, subscriptions,
//! publishing with QoS 0, 1 and 2, keep-alive and clean disconnects. Each
//! request is an `async` call that resolves once; broker-driven events go to
//! a [`SessionDelegate`].
//!
//! # Example
//!
//! ```no_run
//! use tern_client::{ConnectOptions, MqttSession, SessionDelegate};
//! use tern_core::{message::Message, qos::QoS};
//!
//! struct Printer;
//!
//! impl SessionDelegate for Printer {
//!     fn on_message_received(&self, message: &Message, _session: &MqttSession) {
//!         println!("{}: {:?}", message.topic, message.payload);
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = ConnectOptions::new("localhost", 1883)
//!         .client_id("my-client")
//!         .clean_session(true)
//!         .keep_alive(15);
//!
//!     let session = MqttSession::new(options, Printer);
//!     session.connect().await?;
//!
//!     session.subscribe("/#", QoS::AtLeastOnce).await?;
//!     session.publish("/hello", "Hello, MQTT!", QoS::AtLeastOnce, false).await?;
//!
//!     session.disconnect().await?;
//!     Ok(())
//! }
//! ```

mod connection;
mod delegate;
mod error;
mod event;
mod event_loop;
mod keepalive;
mod options;
mod packet_id;
mod session;
mod subscription;
mod tls;

pub use connection::{Connection, Transport};
pub use delegate::{NoopDelegate, SessionDelegate};
pub use error::{ClientError, ErrorKind, Result};
pub use event::{Connected, ConnectionState, DisconnectReason, SubscribeAck};
pub use options::{ConnectOptions, TlsOptions, Will};
pub use session::MqttSession;
pub use subscription::Subscription;

// Re-export commonly used types from tern-core
pub use tern_core::message::Message;
pub use tern_core::protocol::ProtocolVersion;
pub use tern_core::qos::QoS;
pub use tern_core::return_code::ConnectReturnCode;
