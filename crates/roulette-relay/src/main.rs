//! roulette-relay: WebSocket front-end for the anonymous pairing engine.
//!
//! Accepts WebSocket connections, identifies users by their hello frame,
//! and dispatches find/next/stop/say commands to the session controller.
//! Conversation content is forwarded verbatim between paired users and
//! never inspected beyond frame parsing.

mod connection;
mod protocol;
mod registry;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;

use roulette_core::SessionController;
use roulette_store::{MemoryStore, PairStore, SnapshotStore};

use crate::connection::handle_connection;
use crate::registry::UserRegistry;

#[derive(Parser)]
#[command(name = "roulette-relay", about = "Anonymous chat pairing relay")]
struct Args {
    /// Port to listen on.
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Path to the pairing snapshot file. Omit for a purely in-memory
    /// store (pairings are lost on restart).
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Seconds to wait for a client's hello frame.
    #[arg(long, default_value_t = 10)]
    hello_timeout: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roulette_relay=info".into()),
        )
        .init();

    let args = Args::parse();

    let store: Arc<dyn PairStore> = match &args.snapshot {
        Some(path) => match SnapshotStore::open(path) {
            Ok(s) => Arc::new(s),
            Err(e) => {
                tracing::error!(error = %e, "Failed to open snapshot store");
                std::process::exit(1);
            }
        },
        None => Arc::new(MemoryStore::new()),
    };
    let controller = Arc::new(SessionController::new(store));
    let registry = UserRegistry::new();
    let hello_timeout = Duration::from_secs(args.hello_timeout);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Failed to bind TCP listener");

    tracing::info!("roulette-relay listening on {}", addr);

    // Accept loop.
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let controller = controller.clone();
                let registry = registry.clone();
                tokio::spawn(async move {
                    match accept_async(stream).await {
                        Ok(ws) => {
                            handle_connection(ws, addr, controller, registry, hello_timeout).await
                        }
                        Err(e) => {
                            tracing::warn!(peer = %addr, error = %e, "WS handshake failed");
                        }
                    }
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "TCP accept error");
            }
        }
    }
}
