//! Main application state and service coordination
//!
//! This module contains the production AppState that coordinates the
//! matchmaker, AMQP consumption and publishing, the health server and the
//! background tasks, including the scheduling loop that forms matches.

use crate::amqp::connection::{AmqpConfig, AmqpConnection};
use crate::amqp::handlers::{CommandHandler, QueueCommandConsumer};
use crate::amqp::publisher::{
    AmqpMatchPublisher, LoggingMatchPublisher, MatchPublisher, PublisherConfig,
};
use crate::config::AppConfig;
use crate::error::{MatchmakingError, Result as MatchmakingResult};
use crate::matchmaker::Matchmaker;
use crate::metrics::{MetricsCollector, MetricsService};
use crate::service::health::{HealthCheck, HealthContext, HealthStatus};
use crate::types::{CancelRequest, QueueRequest};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("AMQP connection error: {message}")]
    AmqpConnection { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Command handler that feeds the matchmaker
pub struct ProductionCommandHandler {
    matchmaker: Matchmaker,
}

impl ProductionCommandHandler {
    pub fn new(matchmaker: Matchmaker) -> Self {
        Self { matchmaker }
    }
}

#[async_trait]
impl CommandHandler for ProductionCommandHandler {
    async fn handle_enqueue(&self, request: QueueRequest) -> MatchmakingResult<()> {
        let start_time = std::time::Instant::now();
        let result = self.matchmaker.enqueue(request.player_id, request.rating);
        self.matchmaker
            .metrics()
            .record_amqp_operation("enqueue", result.is_ok(), start_time.elapsed());

        result.map(|_| ()).map_err(Into::into)
    }

    async fn handle_cancel(&self, request: CancelRequest) -> MatchmakingResult<()> {
        let start_time = std::time::Instant::now();
        let result = self.matchmaker.cancel(&request.player_id);
        self.matchmaker
            .metrics()
            .record_amqp_operation("cancel", result.is_ok(), start_time.elapsed());

        result.map(|_| ()).map_err(Into::into)
    }

    async fn handle_error(&self, error: MatchmakingError, message_data: &[u8]) {
        match &error {
            // Expected client races, not service faults
            MatchmakingError::DuplicateIdentity { .. } | MatchmakingError::NotFound { .. } => {
                info!("Queue command refused: {}", error);
            }
            _ => {
                let preview_len = std::cmp::min(100, message_data.len());
                warn!(
                    "Queue command failed - error: '{}', message_size: {} bytes, preview: {:?}",
                    error,
                    message_data.len(),
                    String::from_utf8_lossy(&message_data[..preview_len])
                );
            }
        }
    }
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// The queue and its match finder
    matchmaker: Matchmaker,

    /// AMQP connection; absent in standalone mode
    amqp_connection: Option<Arc<AmqpConnection>>,

    /// Metrics service for monitoring and health checks
    metrics_service: Arc<MetricsService>,

    /// Background task handles
    background_tasks: Vec<JoinHandle<()>>,

    /// AMQP consumer for queue commands
    queue_consumer: Option<QueueCommandConsumer>,

    /// Service status
    is_running: Arc<RwLock<bool>>,

    health_context: HealthContext,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing skill-queue matchmaking service");
        info!(
            "Configuration: service={}, amqp_url={}",
            config.service.name, config.amqp.url
        );

        let amqp_connection = Self::initialize_amqp(&config).await?;
        let publisher = Self::initialize_publisher(&config, &amqp_connection).await?;

        Self::assemble(config, publisher, Some(amqp_connection))
    }

    /// Initialize without a broker; formed matches are only logged
    pub fn standalone(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing skill-queue in standalone mode (no AMQP)");
        Self::assemble(config, Arc::new(LoggingMatchPublisher), None)
    }

    fn assemble(
        config: AppConfig,
        publisher: Arc<dyn MatchPublisher>,
        amqp_connection: Option<Arc<AmqpConnection>>,
    ) -> Result<Self, ServiceError> {
        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let matchmaker = Matchmaker::with_metrics(
            config.matchmaking_config(),
            publisher,
            metrics_collector.clone(),
        )
        .map_err(|e| ServiceError::Configuration {
            message: format!("Invalid matchmaking settings: {}", e),
        })?;

        let is_running = Arc::new(RwLock::new(false));
        let mut health_context = HealthContext::new(
            config.service.name.clone(),
            matchmaker.clone(),
            is_running.clone(),
        );
        if let Some(connection) = &amqp_connection {
            health_context = health_context.with_amqp_connection(connection.clone());
        }

        info!(
            "Initializing metrics service on port {}",
            config.service.health_port
        );
        let metrics_service = Arc::new(MetricsService::new(
            config.service.health_port,
            metrics_collector,
            health_context.clone(),
        ));

        Ok(Self {
            config,
            matchmaker,
            amqp_connection,
            metrics_service,
            background_tasks: Vec::new(),
            queue_consumer: None,
            is_running,
            health_context,
        })
    }

    /// Start all background services and message consumption
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting skill-queue matchmaking service");

        *self.is_running.write().await = true;

        self.start_metrics_service().await?;

        if self.amqp_connection.is_some() {
            self.start_amqp_consumption().await?;
        } else {
            info!("No AMQP connection - skipping command consumption");
        }

        self.start_background_tasks();

        info!("Skill-queue matchmaking service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of skill-queue service");

        *self.is_running.write().await = false;

        if let Some(consumer) = &self.queue_consumer {
            if let Err(e) = consumer.stop_consuming().await {
                warn!("Failed to stop AMQP consumer: {}", e);
            } else {
                info!("AMQP command consumption stopped");
            }
        }

        self.stop_background_tasks().await;

        if let Err(e) = self.metrics_service.stop().await {
            warn!("Failed to stop metrics service: {}", e);
        }

        let final_stats =
            self.matchmaker
                .stats()
                .map_err(|e| ServiceError::BackgroundTask {
                    message: format!("Failed to get final stats: {}", e),
                })?;
        info!("Final service statistics: {:?}", final_stats);

        let abandoned =
            self.matchmaker
                .shutdown()
                .map_err(|e| ServiceError::BackgroundTask {
                    message: format!("Failed to drain queue: {}", e),
                })?;
        if !abandoned.is_empty() {
            warn!(
                "{} players were still waiting at shutdown and were dropped",
                abandoned.len()
            );
        }

        info!("Skill-queue service shutdown completed");
        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn matchmaker(&self) -> &Matchmaker {
        &self.matchmaker
    }

    pub fn metrics_service(&self) -> Arc<MetricsService> {
        self.metrics_service.clone()
    }

    pub fn health_context(&self) -> &HealthContext {
        &self.health_context
    }

    async fn start_metrics_service(&mut self) -> Result<(), ServiceError> {
        let metrics_service = self.metrics_service.clone();
        let port = metrics_service.port();

        let metrics_handle = tokio::spawn(async move {
            if let Err(e) = metrics_service.start().await {
                error!("Metrics service failed: {}", e);
            } else {
                info!("Metrics service task completed");
            }
        });
        self.background_tasks.push(metrics_handle);

        // Give the server a moment to bind
        tokio::time::sleep(Duration::from_millis(100)).await;

        info!("Metrics service started on port {}", port);
        Ok(())
    }

    async fn initialize_amqp(config: &AppConfig) -> Result<Arc<AmqpConnection>, ServiceError> {
        let amqp_config =
            AmqpConfig::from_app_config(config).map_err(|e| ServiceError::Configuration {
                message: format!("Failed to parse AMQP URL: {}", e),
            })?;

        let connection =
            AmqpConnection::new(amqp_config)
                .await
                .map_err(|e| ServiceError::AmqpConnection {
                    message: format!("Failed to connect to AMQP: {}", e),
                })?;

        Ok(Arc::new(connection))
    }

    async fn initialize_publisher(
        config: &AppConfig,
        connection: &AmqpConnection,
    ) -> Result<Arc<dyn MatchPublisher>, ServiceError> {
        let channel = connection
            .open_channel()
            .await
            .map_err(|e| ServiceError::Initialization {
                message: format!("Failed to open publisher channel: {}", e),
            })?;

        let publisher_config = PublisherConfig {
            exchange_name: config.amqp.exchange_name.clone(),
            max_retries: config.amqp.max_retry_attempts,
            retry_delay_ms: config.amqp.retry_delay_ms,
            ..Default::default()
        };

        let publisher = AmqpMatchPublisher::new(channel, publisher_config)
            .await
            .map_err(|e| ServiceError::Initialization {
                message: format!("Failed to initialize match publisher: {}", e),
            })?;

        Ok(Arc::new(publisher))
    }

    /// Start AMQP command consumption
    async fn start_amqp_consumption(&mut self) -> Result<(), ServiceError> {
        let Some(connection) = &self.amqp_connection else {
            return Ok(());
        };
        let queue_name = self.config.amqp.request_queue.clone();

        let channel = connection
            .open_channel()
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to open consumer channel: {}", e),
            })?;

        let queue_declare_args = amqprs::channel::QueueDeclareArguments::new(&queue_name)
            .durable(true)
            .auto_delete(false)
            .finish();

        channel
            .queue_declare(queue_declare_args)
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to declare queue {}: {}", queue_name, e),
            })?;
        debug!("Queue '{}' declared", queue_name);

        let handler = Arc::new(ProductionCommandHandler::new(self.matchmaker.clone()));
        let consumer = QueueCommandConsumer::new(handler, channel);

        consumer
            .start_consuming(&queue_name)
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to start consuming commands: {}", e),
            })?;

        self.queue_consumer = Some(consumer);
        info!("Listening for queue commands on '{}'", queue_name);
        Ok(())
    }

    /// Start the scheduling loop and health metrics task
    fn start_background_tasks(&mut self) {
        let match_interval = self.config.match_interval();
        info!(
            "Starting matching task ({}ms interval)...",
            match_interval.as_millis()
        );

        let matching_task = {
            let matchmaker = self.matchmaker.clone();
            let is_running = self.is_running.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(match_interval);

                while *is_running.read().await {
                    interval.tick().await;

                    match matchmaker.drain_matches().await {
                        Ok(formed) if !formed.is_empty() => {
                            info!("Matching pass formed {} matches", formed.len());
                        }
                        Ok(_) => {}
                        Err(e) => warn!("Matching pass failed: {}", e),
                    }
                }

                info!("Matching task stopped");
            })
        };

        let health_metrics_task = {
            let context = self.health_context.clone();
            let metrics_collector = self.metrics_service.collector();
            let is_running = self.is_running.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(15));

                while *is_running.read().await {
                    interval.tick().await;

                    metrics_collector.update_uptime(context.started_at.elapsed());

                    match HealthCheck::check(&context).await {
                        Ok(health) => {
                            metrics_collector.update_health_status(health.status.as_gauge());
                            for check in &health.checks {
                                metrics_collector.update_component_health(
                                    &check.name,
                                    check.status != HealthStatus::Unhealthy,
                                );
                            }
                        }
                        Err(e) => warn!("Health metrics update failed: {}", e),
                    }
                }

                info!("Health metrics task stopped");
            })
        };

        self.background_tasks.push(matching_task);
        self.background_tasks.push(health_metrics_task);
        info!("Background tasks started");
    }

    /// Stop all background tasks
    async fn stop_background_tasks(&mut self) {
        let task_count = self.background_tasks.len();
        if task_count == 0 {
            return;
        }

        info!("Stopping {} background tasks...", task_count);
        for task in self.background_tasks.drain(..) {
            task.abort();
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        info!("All {} background tasks stopped", task_count);
    }
}
