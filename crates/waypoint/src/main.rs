//! `waypoint-server`: runs a Waypoint server from the command line.
//!
//! Every flag can also come from the environment, e.g.
//! `PORT=9000 MOVEMENT_LOG=movements.jsonl waypoint-server`.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use waypoint::prelude::*;

/// Server-authoritative grid position tracker.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, env = "WAYPOINT_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Milliseconds without a move before a game is closed
    #[arg(long, env = "IDLE_TIMEOUT_MS", default_value_t = 10_000)]
    idle_timeout_ms: u64,

    /// Milliseconds a new peer gets to finish the WebSocket handshake
    #[arg(long, env = "HANDSHAKE_TIMEOUT_MS", default_value_t = 10_000)]
    handshake_timeout_ms: u64,

    /// Append movement records to this newline-delimited JSON file.
    /// Without it, movements are only traced.
    #[arg(long, env = "MOVEMENT_LOG")]
    movement_log: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), WaypointError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);
    let builder = ServerBuilder::new()
        .bind(&addr)
        .inactivity_timeout(Duration::from_millis(args.idle_timeout_ms))
        .handshake_timeout(Duration::from_millis(args.handshake_timeout_ms));

    // A movement log that can't be opened is fatal: refuse to start.
    match args.movement_log {
        Some(path) => {
            let sink = JsonLinesSink::open(&path).await.inspect_err(|e| {
                tracing::error!(path = %path.display(), error = %e, "cannot open movement log");
            })?;
            tracing::info!(path = %sink.path().display(), "appending movements");
            serve(builder.build(sink).await?).await
        }
        None => {
            tracing::warn!("no movement log configured, movements are traced only");
            serve(builder.build(LogSink).await?).await
        }
    }
}

async fn serve(server: Server<JsonCodec>) -> Result<(), WaypointError> {
    if let Ok(addr) = server.local_addr() {
        tracing::info!(%addr, "listening");
    }

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("received ctrl-c, shutting down");
        })
        .await
}
