//! parlor-server - TCP chat server pairing users into rooms

use anyhow::Result;
use clap::Parser;
use parlor::config::Config;
use parlor::server::ServerListener;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "parlor-server")]
#[command(about = "parlor chat server")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Bind address override
    #[arg(long)]
    bind: Option<String>,

    /// Port override
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    tracing::info!(
        "Starting parlor server on {} (allowed: {:?})",
        config.listen_addr(),
        config.identity.policy().allowed()
    );

    let server = ServerListener::bind(&config).await?;

    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = shutdown_tx.send(()).await;
            }
            Err(e) => {
                // Keep the sender alive so the server keeps running
                tracing::error!("Failed to listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
                drop(shutdown_tx);
            }
        }
    });

    server.run(shutdown_rx).await
}
