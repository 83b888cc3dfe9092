//! parlor - interactive client for the parlor chat server

use anyhow::Result;
use clap::Parser;
use parlor::config::Config;

#[derive(Parser)]
#[command(name = "parlor")]
#[command(about = "Interactive client for the parlor chat server")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Server host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Server port (defaults to the configured port)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Log to stderr so server lines on stdout stay clean
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let port = cli.port.unwrap_or(config.server.port);

    parlor::client::run(&format!("{}:{}", cli.host, port)).await
}
