//! AMQP transport: inbound ladder commands, outbound notices
//!
//! The chat-platform adapter publishes typed `Command` messages onto a
//! durable queue; the service consumes them and routes each variant to the
//! owning coordinator. Notices flow the other way through a topic exchange.

pub mod connection;
pub mod consumer;
pub mod messages;
pub mod publisher;

pub use connection::{BrokerConfig, BrokerConnection};
pub use consumer::{CommandConsumer, CommandHandler};
pub use messages::{Command, MessageEnvelope};
pub use publisher::AmqpNotifier;
