//! Main entry point for the skill-queue matchmaking service
//!
//! This is the production entry point that initializes and runs the
//! matchmaking microservice with logging and graceful shutdown.

use anyhow::Result;
use clap::Parser;
use skill_queue::config::{validate_config, AppConfig};
use skill_queue::service::AppState;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};

/// Skill Queue Matchmaking Service - MMR queue forming balanced two-team matches
#[derive(Parser)]
#[command(
    name = "skill-queue",
    version,
    about = "A matchmaking microservice that forms balanced two-team matches from an MMR queue",
    long_about = "Skill Queue consumes enqueue and cancel commands over AMQP, keeps waiting \
                 players in a rating-sorted queue, and periodically forms two balanced teams \
                 from the first window whose rating spread fits a tolerance that widens with \
                 wait time. Formed matches are published back over AMQP."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// AMQP URL override
    #[arg(long, value_name = "URL", help = "Override AMQP connection URL")]
    amqp_url: Option<String>,

    /// Health server port override
    #[arg(long, value_name = "PORT", help = "Override health and metrics port")]
    health_port: Option<u16>,

    #[arg(long, value_name = "SPREAD", help = "Rating spread accepted with no wait")]
    base_range: Option<f64>,

    #[arg(
        long,
        value_name = "PER_SECOND",
        help = "Extra rating spread accepted per second waited"
    )]
    range_expansion: Option<f64>,

    #[arg(long, value_name = "PLAYERS", help = "Players per team")]
    team_size: Option<usize>,

    /// Run without a broker
    #[arg(
        long,
        help = "Run the queue and health server without AMQP; matches are only logged"
    )]
    standalone: bool,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig, standalone: bool) {
    info!("Skill Queue Matchmaking Service v{}", skill_queue::VERSION);
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Health port: {}", config.service.health_port);
    if standalone {
        info!("   AMQP: disabled (standalone)");
    } else {
        info!("   AMQP: {}", config.amqp.url);
        info!("   Request queue: {}", config.amqp.request_queue);
        info!("   Match exchange: {}", config.amqp.exchange_name);
    }
    info!(
        "   Team size: {}, base range: {}, range expansion: {}/s",
        config.matchmaking.team_size, config.matchmaking.base_range, config.matchmaking.range_expansion
    );
    info!("   Match interval: {}ms", config.matchmaking.match_interval_ms);
}

impl Args {
    /// Apply command line overrides on top of a loaded configuration
    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(log_level) = &self.log_level {
            config.service.log_level = log_level.clone();
        }
        if self.debug {
            config.service.log_level = "debug".to_string();
        }
        if let Some(amqp_url) = &self.amqp_url {
            config.amqp.url = amqp_url.clone();
        }
        if let Some(health_port) = self.health_port {
            config.service.health_port = health_port;
        }

        let matchmaking = &mut config.matchmaking;
        matchmaking.base_range = self.base_range.unwrap_or(matchmaking.base_range);
        matchmaking.range_expansion = self.range_expansion.unwrap_or(matchmaking.range_expansion);
        matchmaking.team_size = self.team_size.unwrap_or(matchmaking.team_size);
    }
}

/// Load configuration from a file or the environment, then apply CLI overrides
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(config_path) => AppConfig::from_file(config_path)?,
        None => AppConfig::from_env()?,
    };

    args.apply_overrides(&mut config);

    // Overrides can invalidate an otherwise valid file
    validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {:#}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    display_startup_banner(&config, args.standalone);

    if args.dry_run {
        info!("Configuration validation successful - exiting without starting service");
        return Ok(());
    }

    let state = if args.standalone {
        AppState::standalone(config.clone())
    } else {
        AppState::new(config.clone()).await
    };
    let mut app_state = match state {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    info!("Skill Queue is running, press Ctrl+C to shut down");

    wait_for_shutdown_signal().await;

    info!("Shutdown signal received, beginning graceful shutdown...");

    match tokio::time::timeout(config.shutdown_timeout(), app_state.shutdown()).await {
        Ok(Ok(())) => info!("Graceful shutdown completed"),
        Ok(Err(e)) => error!("Shutdown finished with error: {}", e),
        Err(_) => warn!("Shutdown timeout exceeded, forcing exit"),
    }

    Ok(())
}
