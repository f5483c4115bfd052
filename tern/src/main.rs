//! Tern - MQTT command-line client

use std::io::{self, Read};

use clap::{Parser, Subcommand};
use tern_client::{
    ClientError, ConnectionState, DisconnectReason, Message, MqttSession, NoopDelegate, QoS,
    SessionDelegate, Will,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::debug;

mod common;
mod config;
use common::{init_logging, ConnectionArgs};

#[derive(Parser, Debug)]
#[command(name = "tern")]
#[command(about = "MQTT command-line client")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Publish a message to a topic
    Pub {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Topic to publish to
        #[arg(short = 't', long)]
        topic: String,

        /// Message payload (reads from stdin if not provided)
        #[arg(short = 'm', long)]
        message: Option<String>,

        /// QoS level (0, 1, or 2)
        #[arg(short = 'q', long, default_value = "0")]
        qos: u8,

        /// Retain the message on the broker
        #[arg(short = 'r', long)]
        retain: bool,
    },
    /// Subscribe to topics and print messages
    Sub {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Topic(s) to subscribe to (can be specified multiple times)
        #[arg(short = 't', long, required = true)]
        topic: Vec<String>,

        /// QoS level for subscriptions (0, 1, or 2)
        #[arg(short = 'q', long, default_value = "0")]
        qos: u8,

        /// Print topic name before each message
        #[arg(short = 'T', long)]
        print_topic: bool,

        /// Will message topic (sent by broker if client disconnects unexpectedly)
        #[arg(long)]
        will_topic: Option<String>,

        /// Will message payload
        #[arg(long)]
        will_message: Option<String>,

        /// Will message QoS level (0, 1, or 2)
        #[arg(long, default_value = "0")]
        will_qos: u8,

        /// Retain the will message on the broker
        #[arg(long)]
        will_retain: bool,
    },
    /// Interactive session: prints every event and publishes lines typed as
    /// `<topic> <message>`
    Console {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Topic filter to subscribe to
        #[arg(short = 't', long, default_value = "/#")]
        topic: String,

        /// QoS level for the subscription and for published lines
        #[arg(short = 'q', long, default_value = "0")]
        qos: u8,
    },
}

impl Commands {
    fn connection(&self) -> &ConnectionArgs {
        match self {
            Commands::Pub { connection, .. }
            | Commands::Sub { connection, .. }
            | Commands::Console { connection, .. } => connection,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let connection = cli.command.connection();
    let config = connection.load_config()?;
    init_logging(connection.verbose, &config.logging);
    let options = connection.to_connect_options(&config.broker);

    match cli.command {
        Commands::Pub {
            topic,
            message,
            qos,
            retain,
            ..
        } => {
            let session = MqttSession::new(options, NoopDelegate);
            run_publish(session, topic, message, qos, retain).await?;
        }
        Commands::Sub {
            topic,
            qos,
            print_topic,
            will_topic,
            will_message,
            will_qos,
            will_retain,
            ..
        } => {
            let options = match will_topic {
                Some(will_topic) => options.will(
                    Will::new(will_topic, will_message.unwrap_or_default())
                        .qos(QoS::try_from(will_qos)?)
                        .retain(will_retain),
                ),
                None => options,
            };

            let session = MqttSession::new(options, Printer { print_topic });
            run_subscribe(session, topic, qos).await?;
        }
        Commands::Console { topic, qos, .. } => {
            let session = MqttSession::new(options, Console);
            run_console(session, topic, qos).await?;
        }
    }

    Ok(())
}

/// Prints received messages for `sub`.
struct Printer {
    print_topic: bool,
}

impl SessionDelegate for Printer {
    fn on_message_received(&self, message: &Message, _session: &MqttSession) {
        let payload = String::from_utf8_lossy(&message.payload);
        if self.print_topic {
            println!("{}: {}", message.topic, payload);
        } else {
            println!("{}", payload);
        }
    }

    fn on_disconnected(
        &self,
        _session: &MqttSession,
        reason: DisconnectReason,
        error: Option<&ClientError>,
    ) {
        report_disconnect(reason, error);
    }
}

/// Prints every session event for `console`.
struct Console;

impl SessionDelegate for Console {
    fn on_message_received(&self, message: &Message, _session: &MqttSession) {
        println!(
            "Data received on topic {} message {}",
            message.topic,
            message.payload_str().unwrap_or("<binary>")
        );
    }

    fn on_disconnected(
        &self,
        _session: &MqttSession,
        reason: DisconnectReason,
        error: Option<&ClientError>,
    ) {
        report_disconnect(reason, error);
    }

    fn on_ping_acknowledged(&self, _session: &MqttSession) {
        println!("Ping acknowledged.");
    }
}

fn report_disconnect(reason: DisconnectReason, error: Option<&ClientError>) {
    match error {
        Some(error) => eprintln!("Session disconnected ({:?}): {}", reason, error),
        None => eprintln!("Session disconnected ({:?})", reason),
    }
}

async fn run_publish(
    session: MqttSession,
    topic: String,
    message: Option<String>,
    qos_level: u8,
    retain: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    // Get the message payload
    let payload = match message {
        Some(msg) => msg,
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let qos = QoS::try_from(qos_level)?;

    session.connect().await?;
    session.publish(&topic, payload, qos, retain).await?;

    // Disconnect gracefully
    session.disconnect().await?;

    Ok(())
}

async fn run_subscribe(
    session: MqttSession,
    topics: Vec<String>,
    qos_level: u8,
) -> Result<(), Box<dyn std::error::Error>> {
    let qos = QoS::try_from(qos_level)?;

    session.connect().await?;

    for topic in &topics {
        let ack = session.subscribe(topic, qos).await?;
        if ack.granted < ack.requested {
            eprintln!("Subscribed to {} with {} only", ack.topic_filter, ack.granted);
        }
    }

    // Handle Ctrl+C for graceful shutdown
    tokio::select! {
        _ = signal::ctrl_c() => {
            eprintln!("\nDisconnecting...");
            let _ = session.disconnect().await;
        }
        _ = disconnected(&session) => {}
    }

    Ok(())
}

async fn run_console(
    session: MqttSession,
    topic: String,
    qos_level: u8,
) -> Result<(), Box<dyn std::error::Error>> {
    let qos = QoS::try_from(qos_level)?;
    let options = session.options();

    println!(
        "Trying to connect to {} on port {} for client ID {}",
        options.host(),
        options.port(),
        session.client_id()
    );
    session.connect().await?;
    println!("Connected.");

    match session.subscribe(&topic, qos).await {
        Ok(ack) => println!("Subscribed to {} with {}", ack.topic_filter, ack.granted),
        Err(e) => eprintln!("Error occurred during subscription: {}", e),
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                eprintln!("\nDisconnecting...");
                break;
            }
            _ = disconnected(&session) => return Ok(()),
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("End of input");
                    break;
                };

                let Some((channel, text)) = line.trim().split_once(char::is_whitespace) else {
                    if !line.trim().is_empty() {
                        eprintln!("Usage: <topic> <message>");
                    }
                    continue;
                };

                match session.publish(channel, text.trim().to_string(), qos, false).await {
                    Ok(_) => println!("Published {} on channel {}", text.trim(), channel),
                    Err(e) => eprintln!("Error occurred during publish: {}", e),
                }
            }
        }
    }

    let _ = session.disconnect().await;
    Ok(())
}

/// Resolves once the session reports `Disconnected`.
async fn disconnected(session: &MqttSession) {
    let mut state = session.watch_state();
    let _ = state
        .wait_for(|state| *state == ConnectionState::Disconnected)
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pub() {
        let cli = Cli::try_parse_from([
            "tern", "pub", "-H", "broker", "-t", "a/b", "-m", "hi", "-q", "1", "-r",
        ])
        .unwrap();

        match cli.command {
            Commands::Pub {
                connection,
                topic,
                message,
                qos,
                retain,
            } => {
                assert_eq!(connection.host.as_deref(), Some("broker"));
                assert_eq!(topic, "a/b");
                assert_eq!(message.as_deref(), Some("hi"));
                assert_eq!(qos, 1);
                assert!(retain);
            }
            command => panic!("parsed {:?}", command),
        }
    }

    #[test]
    fn test_parse_sub_requires_topic() {
        assert!(Cli::try_parse_from(["tern", "sub"]).is_err());

        let cli = Cli::try_parse_from(["tern", "sub", "-t", "a/#", "-t", "b/+", "-T"]).unwrap();
        match cli.command {
            Commands::Sub {
                topic, print_topic, ..
            } => {
                assert_eq!(topic, vec!["a/#", "b/+"]);
                assert!(print_topic);
            }
            command => panic!("parsed {:?}", command),
        }
    }

    #[test]
    fn test_parse_console_defaults() {
        let cli = Cli::try_parse_from(["tern", "console", "--persistent", "-k", "30"]).unwrap();

        match cli.command {
            Commands::Console {
                connection,
                topic,
                qos,
            } => {
                assert_eq!(topic, "/#");
                assert_eq!(qos, 0);
                assert!(connection.persistent);
                assert_eq!(connection.keep_alive, Some(30));
            }
            command => panic!("parsed {:?}", command),
        }
    }
}
