//! AMQP message handlers for processing queue commands
//!
//! Enqueue and cancel commands arrive on a single request queue. Each
//! delivery is decoded, validated and dispatched to a [`CommandHandler`],
//! then acknowledged whether or not the handler accepted it.

use crate::amqp::messages::MessageUtils;
use crate::error::{MatchmakingError, Result};
use crate::types::{CancelRequest, QueueCommand, QueueRequest};
use amqprs::{
    channel::{BasicAckArguments, BasicCancelArguments, BasicConsumeArguments, Channel},
    consumer::AsyncConsumer,
    BasicProperties, Deliver,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Trait defining the interface for handling queue commands
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Handle a request to join the queue
    async fn handle_enqueue(&self, request: QueueRequest) -> Result<()>;

    /// Handle a request to leave the queue
    async fn handle_cancel(&self, request: CancelRequest) -> Result<()>;

    /// Handle processing errors
    async fn handle_error(&self, error: MatchmakingError, message_data: &[u8]);
}

/// Decode one delivery body and route it to the handler
pub async fn dispatch_command(handler: &dyn CommandHandler, content: &[u8]) -> Result<()> {
    let command = MessageUtils::deserialize_command(content)?;

    match command {
        QueueCommand::Enqueue(request) => {
            debug!(
                "Enqueue command parsed - player_id: '{}', rating: {}",
                request.player_id, request.rating
            );
            handler.handle_enqueue(request).await
        }
        QueueCommand::Cancel(request) => {
            debug!("Cancel command parsed - player_id: '{}'", request.player_id);
            handler.handle_cancel(request).await
        }
    }
}

/// Consumer for the queue command stream
pub struct QueueCommandConsumer {
    handler: Arc<dyn CommandHandler>,
    channel: Channel,
    consumer_tag: String,
}

impl QueueCommandConsumer {
    pub fn new(handler: Arc<dyn CommandHandler>, channel: Channel) -> Self {
        let consumer_tag = format!("skill-queue-consumer-{}", uuid::Uuid::new_v4());

        Self {
            handler,
            channel,
            consumer_tag,
        }
    }

    pub fn consumer_tag(&self) -> &str {
        &self.consumer_tag
    }

    /// Start consuming messages from the queue
    pub async fn start_consuming(&self, queue_name: &str) -> Result<()> {
        let args = BasicConsumeArguments::new(queue_name, &self.consumer_tag);

        self.channel
            .basic_consume(CommandConsumer::new(self.handler.clone()), args)
            .await
            .map_err(|e| MatchmakingError::AmqpConnectionFailed {
                message: format!("Failed to start consuming: {}", e),
            })?;

        info!("Started consuming queue commands from: {}", queue_name);
        Ok(())
    }

    /// Stop consuming messages
    pub async fn stop_consuming(&self) -> Result<()> {
        let args = BasicCancelArguments::new(&self.consumer_tag);

        self.channel.basic_cancel(args).await.map_err(|e| {
            MatchmakingError::AmqpConnectionFailed {
                message: format!("Failed to stop consuming: {}", e),
            }
        })?;

        info!("Stopped consuming queue commands");
        Ok(())
    }
}

struct CommandConsumer {
    handler: Arc<dyn CommandHandler>,
}

impl CommandConsumer {
    fn new(handler: Arc<dyn CommandHandler>) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl AsyncConsumer for CommandConsumer {
    async fn consume(
        &mut self,
        channel: &Channel,
        deliver: Deliver,
        _basic_properties: BasicProperties,
        content: Vec<u8>,
    ) {
        let delivery_tag = deliver.delivery_tag();

        debug!(
            "AMQP message received - delivery_tag: {}, routing_key: '{}', size: {} bytes",
            delivery_tag,
            deliver.routing_key(),
            content.len()
        );

        let start_time = std::time::Instant::now();

        match dispatch_command(self.handler.as_ref(), &content).await {
            Ok(_) => {
                debug!(
                    "Command processed - delivery_tag: {}, processing_time: {:.2}ms",
                    delivery_tag,
                    start_time.elapsed().as_secs_f64() * 1000.0
                );
            }
            Err(e) => {
                warn!(
                    "Command rejected - delivery_tag: {}, error: {}",
                    delivery_tag, e
                );
                let error = match e.downcast::<MatchmakingError>() {
                    Ok(typed) => typed,
                    Err(other) => MatchmakingError::InternalError {
                        message: other.to_string(),
                    },
                };
                self.handler.handle_error(error, &content).await;
            }
        }

        // Rejected commands are not redelivered
        let ack = BasicAckArguments::new(delivery_tag, false);
        if let Err(e) = channel.basic_ack(ack).await {
            error!("Failed to ack delivery {}: {}", delivery_tag, e);
        }
    }
}

/// Handler that records commands, for testing
#[derive(Default)]
pub struct MockCommandHandler {
    pub received_enqueues: Arc<tokio::sync::Mutex<Vec<QueueRequest>>>,
    pub received_cancels: Arc<tokio::sync::Mutex<Vec<CancelRequest>>>,
    pub received_errors: Arc<tokio::sync::Mutex<Vec<MatchmakingError>>>,
}

impl MockCommandHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CommandHandler for MockCommandHandler {
    async fn handle_enqueue(&self, request: QueueRequest) -> Result<()> {
        self.received_enqueues.lock().await.push(request);
        Ok(())
    }

    async fn handle_cancel(&self, request: CancelRequest) -> Result<()> {
        self.received_cancels.lock().await.push(request);
        Ok(())
    }

    async fn handle_error(&self, error: MatchmakingError, _message_data: &[u8]) {
        self.received_errors.lock().await.push(error);
    }
}
