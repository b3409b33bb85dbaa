//! Health check endpoints and monitoring
//!
//! This module provides health check functionality for the skill-queue
//! matchmaking service, including readiness and liveness probes.

use crate::amqp::connection::AmqpConnection;
use crate::matchmaker::Matchmaker;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::debug;

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Gauge value exported as `skill_queue_health_status`
    pub fn as_gauge(self) -> u8 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        }
    }

    fn worst(self, other: HealthStatus) -> HealthStatus {
        if self.as_gauge() <= other.as_gauge() {
            self
        } else {
            other
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// What the health checks need to see of the running service
#[derive(Clone)]
pub struct HealthContext {
    pub service_name: String,
    pub matchmaker: Matchmaker,
    pub is_running: Arc<RwLock<bool>>,
    pub amqp_connection: Option<Arc<AmqpConnection>>,
    pub started_at: Instant,
}

impl HealthContext {
    pub fn new(
        service_name: impl Into<String>,
        matchmaker: Matchmaker,
        is_running: Arc<RwLock<bool>>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            matchmaker,
            is_running,
            amqp_connection: None,
            started_at: Instant::now(),
        }
    }

    pub fn with_amqp_connection(mut self, connection: Arc<AmqpConnection>) -> Self {
        self.amqp_connection = Some(connection);
        self
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Service version
    pub version: String,
    /// Current timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Service statistics
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional error message if unhealthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    pub players_waiting: usize,
    pub players_enqueued: u64,
    pub players_cancelled: u64,
    pub matches_formed: u64,
    pub players_matched: u64,
    pub races_lost: u64,
    pub delivery_failures: u64,
    pub uptime_seconds: u64,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(context: &HealthContext) -> Result<Self> {
        let checks = vec![
            Self::check_service_running(context).await,
            Self::check_queue(context),
            Self::check_amqp(context),
        ];

        let status = checks
            .iter()
            .fold(HealthStatus::Healthy, |acc, check| acc.worst(check.status));

        Ok(HealthCheck {
            status,
            service: context.service_name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats: Self::gather_service_stats(context),
        })
    }

    /// Simple liveness check - just verify service is running
    pub async fn liveness_check(context: &HealthContext) -> Result<HealthStatus> {
        if context.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness check - verify service can accept queue commands
    pub async fn readiness_check(context: &HealthContext) -> Result<HealthStatus> {
        if !context.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        Ok(Self::check_queue(context).status)
    }

    async fn check_service_running(context: &HealthContext) -> ComponentCheck {
        let start = Instant::now();

        let (status, message) = if context.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// The queue is healthy while its lock can be taken
    fn check_queue(context: &HealthContext) -> ComponentCheck {
        let start = Instant::now();

        let (status, message) = match context.matchmaker.queue_len() {
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => (HealthStatus::Unhealthy, Some(e.to_string())),
        };

        ComponentCheck {
            name: "queue".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn check_amqp(context: &HealthContext) -> ComponentCheck {
        let start = Instant::now();

        let (status, message) = match &context.amqp_connection {
            Some(connection) if connection.is_alive() => (HealthStatus::Healthy, None),
            Some(_) => (
                HealthStatus::Unhealthy,
                Some("AMQP connection closed".to_string()),
            ),
            None => (
                HealthStatus::Degraded,
                Some("No AMQP connection, matches are not delivered".to_string()),
            ),
        };

        ComponentCheck {
            name: "amqp_connection".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn gather_service_stats(context: &HealthContext) -> ServiceStats {
        let uptime_seconds = context.started_at.elapsed().as_secs();

        match context.matchmaker.stats() {
            Ok(stats) => ServiceStats {
                players_waiting: stats.players_waiting,
                players_enqueued: stats.players_enqueued,
                players_cancelled: stats.players_cancelled,
                matches_formed: stats.matches_formed,
                players_matched: stats.players_matched,
                races_lost: stats.races_lost,
                delivery_failures: stats.delivery_failures,
                uptime_seconds,
            },
            Err(e) => {
                debug!("Failed to get matchmaker stats for health check: {}", e);
                ServiceStats {
                    uptime_seconds,
                    ..Default::default()
                }
            }
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}
