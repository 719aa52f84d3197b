mod check_commands;

use std::{path::PathBuf, sync::Arc};

use {
    clap::{Parser, Subcommand},
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    logrelay_config::{
        Credentials, Severity, load_channel_map, load_settings, validate_channels,
    },
    logrelay_irc::TcpConnector,
    logrelay_logs::LogsClient,
    logrelay_relay::Supervisor,
};

#[derive(Parser)]
#[command(name = "logrelay", version, about = "logrelay: announce new match logs in chat")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// JSON object mapping each tracked identity to its chat destination.
    #[arg(long, global = true, env = "LOGRELAY_CHANNELS", default_value = "channels.json")]
    channels: PathBuf,

    /// Optional TOML file with tunables. Defaults apply when omitted.
    #[arg(long, global = true, env = "LOGRELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Chat username.
    #[arg(long, global = true, env = "LOGS_BOT_USERNAME", hide_env_values = true)]
    username: Option<String>,

    /// Chat OAuth key, including the `oauth:` prefix.
    #[arg(long, global = true, env = "LOGS_BOT_OAUTH_KEY", hide_env_values = true)]
    oauth_key: Option<String>,

    /// Serve Prometheus metrics on this address.
    #[cfg(feature = "prometheus")]
    #[arg(long, global = true, env = "LOGRELAY_METRICS_ADDR")]
    metrics_addr: Option<std::net::SocketAddr>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and relay new logs (default when no subcommand is provided).
    Run,
    /// Load and validate the configuration, then exit.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    match cli.command {
        None | Some(Commands::Run) => run(&cli).await,
        Some(Commands::Check { verbose }) => {
            let credentials = Credentials::new(cli.username.clone(), cli.oauth_key.clone()).ok();
            check_commands::check(
                &cli.channels,
                cli.config.as_deref(),
                credentials.as_ref(),
                verbose,
            )
        },
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "logrelay starting");

    // Configuration failures are fatal and surface as a non-zero exit.
    let settings = load_settings(cli.config.as_deref())?;
    let channels = load_channel_map(&cli.channels)?;
    for diag in validate_channels(&channels).diagnostics {
        match diag.severity {
            Severity::Info => info!(field = %diag.path, "{}", diag.message),
            _ => warn!(field = %diag.path, "{}", diag.message),
        }
    }
    let credentials = Credentials::new(cli.username.clone(), cli.oauth_key.clone())?;

    #[cfg(feature = "prometheus")]
    match cli.metrics_addr {
        Some(addr) => logrelay_metrics::init_metrics(addr)?,
        None => info!("metrics export is disabled"),
    }

    info!(
        identities = channels.len(),
        address = %settings.irc.address,
        logs = %settings.logs.base_url,
        "configuration loaded"
    );

    let connector = Arc::new(TcpConnector::from_config(&settings.irc, credentials));
    let source = Arc::new(LogsClient::new(&settings.logs)?);
    let supervisor = Supervisor::new(connector, source, channels, &settings);

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    supervisor.run(shutdown).await;
    info!("logrelay stopped");
    Ok(())
}

/// Cancel `shutdown` on Ctrl-C or SIGTERM.
async fn wait_for_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "failed to register SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received ctrl-c, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
    shutdown.cancel();
}
