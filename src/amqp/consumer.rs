//! Command consumption and dispatch

use crate::amqp::messages::{decode_command, Command};
use crate::error::{LadderError, Result};
use amqprs::{
    channel::{BasicCancelArguments, BasicConsumeArguments, Channel},
    consumer::AsyncConsumer,
    BasicProperties, Deliver,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

/// The single routing point for inbound commands
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Execute one command against the owning coordinator
    async fn handle_command(&self, command: Command) -> Result<()>;

    /// Called when a message cannot be parsed or a command fails
    async fn handle_error(&self, error: anyhow::Error, message_data: &[u8]);
}

/// Consumer for the ladder command queue
pub struct CommandConsumer {
    handler: Arc<dyn CommandHandler>,
    channel: Channel,
    consumer_tag: String,
}

impl CommandConsumer {
    pub fn new(handler: Arc<dyn CommandHandler>, channel: Channel) -> Self {
        let consumer_tag = format!("ladder-consumer-{}", crate::utils::generate_correlation_id());
        Self {
            handler,
            channel,
            consumer_tag,
        }
    }

    /// Start consuming commands from the queue
    pub async fn start_consuming(&self, queue_name: &str) -> Result<()> {
        let args = BasicConsumeArguments::new(queue_name, &self.consumer_tag);

        self.channel
            .basic_consume(QueueConsumer::new(self.handler.clone()), args)
            .await
            .map_err(|e| LadderError::BrokerConnectionFailed {
                message: format!("Failed to start consuming: {}", e),
            })?;

        info!("Consuming commands from queue '{}'", queue_name);
        Ok(())
    }

    /// Stop consuming commands
    pub async fn stop_consuming(&self) -> Result<()> {
        let args = BasicCancelArguments::new(&self.consumer_tag);

        self.channel
            .basic_cancel(args)
            .await
            .map_err(|e| LadderError::BrokerConnectionFailed {
                message: format!("Failed to stop consuming: {}", e),
            })?;

        info!("Stopped consuming commands");
        Ok(())
    }
}

struct QueueConsumer {
    handler: Arc<dyn CommandHandler>,
}

impl QueueConsumer {
    fn new(handler: Arc<dyn CommandHandler>) -> Self {
        Self { handler }
    }

    async fn process_message(&self, content: &[u8]) -> Result<()> {
        let command = decode_command(content)?;
        self.handler.handle_command(command).await
    }
}

#[async_trait]
impl AsyncConsumer for QueueConsumer {
    async fn consume(
        &mut self,
        _channel: &Channel,
        deliver: Deliver,
        _basic_properties: BasicProperties,
        content: Vec<u8>,
    ) {
        let delivery_tag = deliver.delivery_tag();

        match self.process_message(&content).await {
            Ok(_) => {
                info!("Command processed - delivery_tag: {}", delivery_tag);
            }
            Err(e) => {
                // A failed command degrades to "no state change, log, move on"
                error!(
                    "Command processing failed - delivery_tag: {}, error: {}",
                    delivery_tag, e
                );
                self.handler.handle_error(e, &content).await;
            }
        }
    }
}

/// Recording handler for tests
pub struct RecordingCommandHandler {
    pub received: Arc<tokio::sync::Mutex<Vec<Command>>>,
}

impl Default for RecordingCommandHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingCommandHandler {
    pub fn new() -> Self {
        Self {
            received: Arc::new(tokio::sync::Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl CommandHandler for RecordingCommandHandler {
    async fn handle_command(&self, command: Command) -> Result<()> {
        let mut received = self.received.lock().await;
        received.push(command);
        Ok(())
    }

    async fn handle_error(&self, error: anyhow::Error, _message_data: &[u8]) {
        warn!("Recording handler received error: {}", error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_handler_captures_commands() {
        let handler = RecordingCommandHandler::new();
        handler
            .handle_command(Command::Dequeue {
                platform_id: "p-1".to_string(),
            })
            .await
            .unwrap();

        let received = handler.received.lock().await;
        assert_eq!(received.len(), 1);
        assert!(matches!(received[0], Command::Dequeue { .. }));
    }
}
