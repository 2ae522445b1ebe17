mod console;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tickeasy_core::{
    create_workflow_channel, establish_session, load_config, validate_config, Config,
    GatedScanner, HttpTicketBackend, RedemptionController, SanitizedConfig, StatsMonitor,
    TicketBackend,
};

/// Check-in station for Tickeasy events.
#[derive(Parser, Debug)]
#[command(name = "tickeasy", author, version, about)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, short, env = "TICKEASY_CONFIG", default_value = "tickeasy.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan tickets from stdin and redeem them
    Checkin,
    /// Show redemption statistics
    Stats {
        /// Restrict statistics to one concert
        #[arg(long)]
        concert_id: Option<String>,
        /// Refresh on the configured interval until interrupted
        #[arg(long)]
        watch: bool,
        /// Print reports as JSON lines
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Logs go to stderr; stdout belongs to the operator console.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Loading configuration from {:?}", cli.config);
    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;

    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Auth method: {:?}", config.auth.method);
    debug!(
        "Effective configuration: {}",
        serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default()
    );

    let backend = connect(&config).await?;

    match cli.command {
        Command::Checkin => checkin(&config, backend).await,
        Command::Stats {
            concert_id,
            watch,
            json,
        } => stats(&config, backend, concert_id, watch, json).await,
    }
}

/// Log in and build the HTTP backend.
async fn connect(config: &Config) -> Result<Arc<dyn TicketBackend>> {
    let session = establish_session(&config.auth)
        .await
        .context("Failed to log in")?;
    info!(
        operator = session.operator_id().unwrap_or("unknown"),
        "Logged in"
    );

    let backend = HttpTicketBackend::new(&config.backend, session.into_shared())
        .context("Failed to create backend client")?;
    info!("Using ticket backend at {}", backend.base_url());

    Ok(Arc::new(backend))
}

async fn checkin(config: &Config, backend: Arc<dyn TicketBackend>) -> Result<()> {
    let (handle, receiver) = create_workflow_channel(config.redemption.event_buffer);
    let scanner = Arc::new(GatedScanner::new(handle.clone()));

    let mut controller = RedemptionController::new(
        config.redemption.clone(),
        backend,
        scanner.clone(),
        handle.clone(),
        receiver,
    )
    .with_update_callback(Arc::new(console::print_snapshot));

    console::print_help();
    // Start before reading stdin so the first scan finds the scanner active.
    controller.start();
    let mut controller_task = tokio::spawn(controller.run());
    console::spawn_stdin_reader(scanner, handle.clone());

    tokio::select! {
        result = &mut controller_task => {
            result.context("Redemption controller failed")?;
        }
        _ = shutdown_signal() => {
            info!("Interrupted, shutting down");
            handle.shutdown().await;
            controller_task.await.context("Redemption controller failed")?;
        }
    }

    info!("Check-in session closed");
    Ok(())
}

async fn stats(
    config: &Config,
    backend: Arc<dyn TicketBackend>,
    concert_id: Option<String>,
    watch: bool,
    json: bool,
) -> Result<()> {
    let mut monitor = StatsMonitor::new(&config.stats, backend);
    if concert_id.is_some() {
        monitor = monitor.with_concert_id(concert_id);
    }

    if !watch {
        let report = monitor
            .fetch_once()
            .await
            .context("Failed to fetch statistics")?;
        console::print_stats(&report, json);
        return Ok(());
    }

    info!("Refreshing statistics every {:?}", monitor.interval());
    let handle = monitor.spawn(move |result| match result {
        Ok(report) => console::print_stats(&report, json),
        Err(e) => console::print_stats_error(&e),
    });

    shutdown_signal().await;
    handle.stop().await;
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
