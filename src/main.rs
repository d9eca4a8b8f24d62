use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;

use zipslice::server::{self, AppState};

/// Partial extraction service for remote ZIP archives.
///
/// Lists the members of an archive served over HTTP with range support and
/// re-packages a chosen subset into a fresh archive, fetching only the
/// trailer and the selected members' byte ranges.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 5000)]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Maximum number of cached archive listings
    #[arg(long, default_value_t = 64)]
    cache_entries: usize,

    /// Seconds a cached listing stays valid
    #[arg(long, default_value_t = 30)]
    cache_ttl_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    let args = Args::parse();
    let state = AppState::new(args.cache_entries, Duration::from_secs(args.cache_ttl_secs));
    let app = server::build_router(state);

    let listener = TcpListener::bind(format!("{}:{}", args.bind, args.port)).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
