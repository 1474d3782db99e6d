use anyhow::Result;
use clap::Parser;
use zimgx::config::Config;
use zimgx::server::Server;

/// zimgx - high-performance image proxy with on-the-fly transformation
///
/// All configuration comes from ZIMGX_* environment variables; the flags
/// below override the bind address for local runs.
#[derive(Parser, Debug)]
#[command(name = "zimgx")]
#[command(version, about, long_about = None)]
struct Args {
    /// Override ZIMGX_SERVER_HOST
    #[arg(long)]
    host: Option<String>,

    /// Override ZIMGX_SERVER_PORT
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    zimgx::logging::init_subscriber()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    let mut config =
        Config::from_env().map_err(|e| anyhow::anyhow!("failed to load configuration: {}", e))?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        origin = ?config.origin.origin_type,
        cache_enabled = config.cache.enabled,
        "starting zimgx"
    );

    let server =
        Server::from_config(config).map_err(|e| anyhow::anyhow!("failed to create server: {}", e))?;

    server
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("server failed: {}", e))?;

    Ok(())
}
