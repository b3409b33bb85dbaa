//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the skill-queue matchmaking
//! service using Prometheus metrics.

use crate::types::Match;
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the matchmaking service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Queue membership metrics
    queue_metrics: QueueMetrics,

    /// Match formation metrics
    match_metrics: MatchMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Total AMQP messages processed
    pub amqp_messages_total: IntCounterVec,

    /// AMQP message processing errors
    pub amqp_errors_total: IntCounterVec,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Queue membership metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Total players admitted to the queue
    pub players_enqueued_total: IntCounter,

    /// Total players removed by cancellation
    pub players_cancelled_total: IntCounter,

    /// Rejected queue operations by reason
    pub queue_rejections_total: IntCounterVec,

    /// Players currently waiting in queue
    pub players_waiting: IntGauge,
}

/// Match formation metrics
#[derive(Clone)]
pub struct MatchMetrics {
    /// Total matches formed
    pub matches_formed_total: IntCounter,

    /// Total players placed into matches
    pub players_matched_total: IntCounter,

    /// Match searches by outcome
    pub match_searches_total: IntCounterVec,

    /// Searches that lost their candidates to a concurrent search or cancel
    pub match_race_lost_total: IntCounter,

    /// Formed matches whose notification could not be delivered
    pub delivery_failures_total: IntCounter,

    /// Time players spent queued before being matched
    pub queue_wait_time_seconds: Histogram,

    /// Rating spread of formed matches
    pub match_rating_spread: Histogram,

    /// Average rating of formed matches
    pub match_average_rating: Histogram,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Match search duration
    pub match_search_duration: Histogram,

    /// AMQP operation durations
    pub amqp_operation_duration: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let queue_metrics = QueueMetrics::new(&registry)?;
        let match_metrics = MatchMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            queue_metrics,
            match_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    pub fn matches(&self) -> &MatchMetrics {
        &self.match_metrics
    }

    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Record a player joining the queue
    pub fn record_enqueued(&self, queue_len: usize) {
        self.queue_metrics.players_enqueued_total.inc();
        self.set_queue_depth(queue_len);
    }

    /// Record players leaving the queue by cancellation
    pub fn record_cancelled(&self, count: usize, queue_len: usize) {
        self.queue_metrics
            .players_cancelled_total
            .inc_by(count as u64);
        self.set_queue_depth(queue_len);
    }

    /// Record a rejected enqueue or cancel, labelled by error kind
    pub fn record_rejection(&self, reason: &str) {
        self.queue_metrics
            .queue_rejections_total
            .with_label_values(&[reason])
            .inc();
    }

    pub fn set_queue_depth(&self, queue_len: usize) {
        self.queue_metrics.players_waiting.set(queue_len as i64);
    }

    /// Record the outcome and duration of one match search
    pub fn record_match_search(&self, outcome: &str, duration: Duration) {
        self.match_metrics
            .match_searches_total
            .with_label_values(&[outcome])
            .inc();

        self.performance_metrics
            .match_search_duration
            .observe(duration.as_secs_f64());
    }

    /// Record a formed match
    pub fn record_match_formed(&self, formed: &Match, now: Instant, queue_len: usize) {
        self.match_metrics.matches_formed_total.inc();

        let mut matched = 0;
        for player in formed.players() {
            matched += 1;
            self.match_metrics
                .queue_wait_time_seconds
                .observe(player.wait_time(now).as_secs_f64());
        }
        self.match_metrics.players_matched_total.inc_by(matched);

        self.match_metrics
            .match_rating_spread
            .observe(formed.rating_spread as f64);
        self.match_metrics
            .match_average_rating
            .observe(formed.average_rating as f64);

        self.set_queue_depth(queue_len);
    }

    pub fn record_race_lost(&self) {
        self.match_metrics.match_race_lost_total.inc();
    }

    pub fn record_delivery_failure(&self) {
        self.match_metrics.delivery_failures_total.inc();
    }

    /// Record AMQP operation
    pub fn record_amqp_operation(&self, operation: &str, success: bool, duration: Duration) {
        let status = if success { "success" } else { "error" };

        self.service_metrics
            .amqp_messages_total
            .with_label_values(&[operation, status])
            .inc();

        if !success {
            self.service_metrics
                .amqp_errors_total
                .with_label_values(&[operation])
                .inc();
        }

        self.performance_metrics
            .amqp_operation_duration
            .with_label_values(&[operation, status])
            .observe(duration.as_secs_f64());
    }

    pub fn update_uptime(&self, uptime: Duration) {
        self.service_metrics
            .uptime_seconds
            .set(uptime.as_secs() as i64);
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("skill_queue_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let amqp_messages_total = IntCounterVec::new(
            Opts::new(
                "skill_queue_amqp_messages_total",
                "Total AMQP messages processed",
            ),
            &["operation", "status"],
        )?;
        registry.register(Box::new(amqp_messages_total.clone()))?;

        let amqp_errors_total = IntCounterVec::new(
            Opts::new("skill_queue_amqp_errors_total", "Total AMQP errors"),
            &["operation"],
        )?;
        registry.register(Box::new(amqp_errors_total.clone()))?;

        let health_status = IntGauge::new(
            "skill_queue_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("skill_queue_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            amqp_messages_total,
            amqp_errors_total,
            health_status,
            component_health,
        })
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let players_enqueued_total = IntCounter::new(
            "skill_queue_players_enqueued_total",
            "Total players admitted to the queue",
        )?;
        registry.register(Box::new(players_enqueued_total.clone()))?;

        let players_cancelled_total = IntCounter::new(
            "skill_queue_players_cancelled_total",
            "Total players removed by cancellation",
        )?;
        registry.register(Box::new(players_cancelled_total.clone()))?;

        let queue_rejections_total = IntCounterVec::new(
            Opts::new(
                "skill_queue_queue_rejections_total",
                "Rejected queue operations",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(queue_rejections_total.clone()))?;

        let players_waiting = IntGauge::new(
            "skill_queue_players_waiting",
            "Players currently waiting in queue",
        )?;
        registry.register(Box::new(players_waiting.clone()))?;

        Ok(Self {
            players_enqueued_total,
            players_cancelled_total,
            queue_rejections_total,
            players_waiting,
        })
    }
}

impl MatchMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let matches_formed_total =
            IntCounter::new("skill_queue_matches_formed_total", "Total matches formed")?;
        registry.register(Box::new(matches_formed_total.clone()))?;

        let players_matched_total = IntCounter::new(
            "skill_queue_players_matched_total",
            "Total players placed into matches",
        )?;
        registry.register(Box::new(players_matched_total.clone()))?;

        let match_searches_total = IntCounterVec::new(
            Opts::new("skill_queue_match_searches_total", "Match searches run"),
            &["outcome"],
        )?;
        registry.register(Box::new(match_searches_total.clone()))?;

        let match_race_lost_total = IntCounter::new(
            "skill_queue_match_race_lost_total",
            "Match searches whose candidates were claimed concurrently",
        )?;
        registry.register(Box::new(match_race_lost_total.clone()))?;

        let delivery_failures_total = IntCounter::new(
            "skill_queue_delivery_failures_total",
            "Formed matches whose notification failed",
        )?;
        registry.register(Box::new(delivery_failures_total.clone()))?;

        let queue_wait_time_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "skill_queue_queue_wait_time_seconds",
                "Time players waited before being matched",
            )
            .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        )?;
        registry.register(Box::new(queue_wait_time_seconds.clone()))?;

        let match_rating_spread = Histogram::with_opts(
            HistogramOpts::new(
                "skill_queue_match_rating_spread",
                "Rating spread of formed matches",
            )
            .buckets(vec![10.0, 25.0, 50.0, 100.0, 200.0, 400.0, 800.0]),
        )?;
        registry.register(Box::new(match_rating_spread.clone()))?;

        let match_average_rating = Histogram::with_opts(
            HistogramOpts::new(
                "skill_queue_match_average_rating",
                "Average rating of formed matches",
            )
            .buckets(vec![
                500.0, 1000.0, 1200.0, 1400.0, 1600.0, 1800.0, 2000.0, 2500.0,
            ]),
        )?;
        registry.register(Box::new(match_average_rating.clone()))?;

        Ok(Self {
            matches_formed_total,
            players_matched_total,
            match_searches_total,
            match_race_lost_total,
            delivery_failures_total,
            queue_wait_time_seconds,
            match_rating_spread,
            match_average_rating,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let match_search_duration = Histogram::with_opts(
            HistogramOpts::new(
                "skill_queue_match_search_duration_seconds",
                "Match search time",
            )
            .buckets(vec![0.0001, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
        )?;
        registry.register(Box::new(match_search_duration.clone()))?;

        let amqp_operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "skill_queue_amqp_operation_duration_seconds",
                "AMQP operation duration",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["operation", "status"],
        )?;
        registry.register(Box::new(amqp_operation_duration.clone()))?;

        Ok(Self {
            match_search_duration,
            amqp_operation_duration,
        })
    }
}
