//! AMQP notice publisher: the production `Notifier`

use crate::amqp::messages::MessageEnvelope;
use crate::error::{LadderError, Result};
use crate::notify::{Notice, Notifier, Recipient};
use amqprs::{
    channel::{BasicPublishArguments, Channel, ExchangeDeclareArguments},
    BasicProperties,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Configuration for notice publishing
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub exchange: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            exchange: "ladder.notices".to_string(),
            max_retries: 3,
            retry_delay_ms: 500,
        }
    }
}

/// What actually travels over the wire for each notice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoticePayload {
    pub recipient: Recipient,
    pub notice: Notice,
}

/// Notifier that publishes notices to a topic exchange
pub struct AmqpNotifier {
    channel: Channel,
    config: PublisherConfig,
}

impl AmqpNotifier {
    pub async fn new(channel: Channel, config: PublisherConfig) -> Result<Self> {
        let publisher = Self { channel, config };
        publisher.setup_exchange().await?;
        Ok(publisher)
    }

    async fn setup_exchange(&self) -> Result<()> {
        let args = ExchangeDeclareArguments::new(&self.config.exchange, "topic");
        self.channel.exchange_declare(args).await.map_err(|e| {
            LadderError::BrokerConnectionFailed {
                message: format!("Failed to declare notice exchange: {}", e),
            }
        })?;
        info!("Notice exchange '{}' declared", self.config.exchange);
        Ok(())
    }

    /// Routing key per recipient so adapters can bind selectively
    fn routing_key(recipient: &Recipient) -> String {
        match recipient {
            Recipient::Player(platform_id) => format!("notice.player.{}", platform_id),
            Recipient::Moderator => "notice.moderator".to_string(),
            Recipient::Channel(name) => format!("notice.channel.{}", name),
        }
    }

    async fn publish_with_retry(&self, envelope: &MessageEnvelope<NoticePayload>) -> Result<()> {
        let mut retry_count = 0;
        let mut delay = Duration::from_millis(self.config.retry_delay_ms);

        loop {
            match self.try_publish(envelope).await {
                Ok(_) => {
                    debug!(
                        "Published notice {} to '{}'",
                        envelope.correlation_id, envelope.routing_key
                    );
                    return Ok(());
                }
                Err(e) => {
                    retry_count += 1;
                    if retry_count > self.config.max_retries {
                        error!(
                            "Failed to publish notice {} after {} retries: {}",
                            envelope.correlation_id, self.config.max_retries, e
                        );
                        return Err(e);
                    }
                    warn!(
                        "Publish attempt {} failed for notice {}: {}. Retrying in {:?}",
                        retry_count, envelope.correlation_id, e, delay
                    );
                    sleep(delay).await;
                    delay = Duration::from_millis((delay.as_millis() as u64 * 2).min(5000));
                }
            }
        }
    }

    async fn try_publish(&self, envelope: &MessageEnvelope<NoticePayload>) -> Result<()> {
        let payload = envelope.to_bytes()?;

        let args = BasicPublishArguments::new(&self.config.exchange, &envelope.routing_key);
        let mut properties = BasicProperties::default();
        properties
            .with_message_id(&envelope.correlation_id)
            .with_timestamp(envelope.timestamp.timestamp() as u64)
            .with_content_type("application/json");

        self.channel
            .basic_publish(properties, payload, args)
            .await
            .map_err(|e| LadderError::BrokerConnectionFailed {
                message: format!("Failed to publish notice: {}", e),
            })?;

        Ok(())
    }
}

#[async_trait]
impl Notifier for AmqpNotifier {
    async fn notify(&self, recipient: Recipient, notice: Notice) -> Result<()> {
        let routing_key = Self::routing_key(&recipient);
        let envelope = MessageEnvelope::new(NoticePayload { recipient, notice }, routing_key);
        self.publish_with_retry(&envelope).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publisher_config_default() {
        let config = PublisherConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.exchange, "ladder.notices");
    }

    #[test]
    fn test_routing_keys() {
        assert_eq!(
            AmqpNotifier::routing_key(&Recipient::Player("p-1".to_string())),
            "notice.player.p-1"
        );
        assert_eq!(
            AmqpNotifier::routing_key(&Recipient::Moderator),
            "notice.moderator"
        );
        assert_eq!(
            AmqpNotifier::routing_key(&Recipient::Channel("ladder-results".to_string())),
            "notice.channel.ladder-results"
        );
    }

    // Publishing against a live broker is covered by deployment smoke tests,
    // not unit tests.
}
