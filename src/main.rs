mod api;
mod supervisor;

use clap::{Parser, Subcommand};
use hive_channels::{qr, qr::QrRenderer, whatsapp::WhatsAppProvider};
use hive_core::config::{self, Config};
use hive_store::CredentialStore;
use std::sync::Arc;
use supervisor::Supervisor;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "hive",
    version,
    about = "Hive: multi-session WhatsApp Web gateway"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API and session supervisor.
    Serve,
    /// Show the resolved configuration and persisted sessions.
    Status,
    /// Render a QR payload in the terminal.
    Qr {
        /// The payload to encode.
        payload: String,
    },
}

/// Install the global subscriber. The returned guard flushes the log file on drop.
fn init_tracing(cfg: &Config) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.hive.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if !cfg.hive.log_to_file {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
        return Ok(None);
    }

    let logs_dir = cfg.hive.logs_dir();
    std::fs::create_dir_all(&logs_dir)?;
    let appender = tracing_appender::rolling::daily(&logs_dir, "hive.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Ok(Some(guard))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            let cfg = config::load(&cli.config)?
                .with_port_override(std::env::var("PORT").ok().as_deref())?;
            let _guard = init_tracing(&cfg)?;
            serve(cfg).await?;
        }
        Commands::Status => {
            let cfg = config::load(&cli.config)?
                .with_port_override(std::env::var("PORT").ok().as_deref())?;
            println!("Hive: status\n");
            println!("Config:    {}", cli.config);
            println!("Data dir:  {}", config::shellexpand(&cfg.hive.data_dir));
            println!("API:       http://{}:{}", cfg.api.host, cfg.api.port);
            println!(
                "Auth:      {}",
                if cfg.api.api_key.is_empty() {
                    "disabled"
                } else {
                    "bearer token"
                }
            );
            println!(
                "Reconnect: every {}s{}",
                cfg.supervisor.reconnect_delay_secs,
                if cfg.supervisor.restore_on_start {
                    ", sessions restored on start"
                } else {
                    ""
                }
            );
            println!();

            let store = CredentialStore::new(cfg.hive.sessions_dir());
            let ids = store.list().await?;
            if ids.is_empty() {
                println!("  no persisted sessions");
            } else {
                for id in ids {
                    println!("  {id}");
                }
            }
        }
        Commands::Qr { payload } => {
            println!("{}", qr::generate_qr_terminal(&payload)?);
        }
    }

    Ok(())
}

async fn serve(cfg: Config) -> anyhow::Result<()> {
    let provider = Arc::new(WhatsAppProvider::default());
    let store = CredentialStore::new(cfg.hive.sessions_dir());
    let renderer = QrRenderer::new(cfg.hive.public_dir());
    let supervisor = Supervisor::new(
        provider,
        store,
        renderer,
        cfg.supervisor.reconnect_delay(),
    );

    if cfg.supervisor.restore_on_start {
        if let Err(e) = supervisor.restore().await {
            warn!("session restore failed: {e}");
        }
    }

    let state = api::ApiState::new(
        supervisor.clone(),
        &cfg.api.api_key,
        cfg.uploads.max_image_bytes,
        cfg.hive.uploads_dir(),
        cfg.hive.public_dir(),
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for shutdown signal: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal");
    };

    let result = api::serve(&cfg.api, state, shutdown).await;
    supervisor.shutdown().await;
    result
}
