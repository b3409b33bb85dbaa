//! Metrics and monitoring for the skill-queue matchmaking service
//!
//! This module provides Prometheus metrics collection and the HTTP server
//! exposing health probes and the metrics scrape endpoint.

pub mod collector;
pub mod health;

pub use collector::{
    MatchMetrics, MetricsCollector, MetricsTimer, PerformanceMetrics, QueueMetrics,
    ServiceMetrics,
};
pub use health::{HealthServer, HealthServerConfig};

use crate::service::health::HealthContext;
use std::sync::Arc;

/// The collector plus the HTTP server that exposes it
#[derive(Clone)]
pub struct MetricsService {
    collector: Arc<MetricsCollector>,
    health_server: Arc<HealthServer>,
    port: u16,
}

impl MetricsService {
    /// Serve `collector` on all interfaces at `port`, with health routes
    /// inspecting the service described by `context`
    pub fn new(port: u16, collector: Arc<MetricsCollector>, context: HealthContext) -> Self {
        let config = HealthServerConfig {
            port,
            ..Default::default()
        };
        let health_server =
            Arc::new(HealthServer::new(config, collector.clone()).with_context(context));

        Self {
            collector,
            health_server,
            port,
        }
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until `stop` is called
    pub async fn start(&self) -> anyhow::Result<()> {
        self.health_server.start().await
    }

    pub async fn stop(&self) -> anyhow::Result<()> {
        self.health_server.stop().await
    }
}
