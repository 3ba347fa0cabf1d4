//! Chatroom relay server -- single-room WebSocket broadcast relay.
//!
//! An axum WebSocket server that relays chat messages, typing indicators,
//! and presence notices between members of one shared room. Nothing is
//! persisted; the relay is a pure fan-out.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:3001
//! cargo run --bin chatroom-relay
//!
//! # Run on custom address with a pinned client origin
//! cargo run --bin chatroom-relay -- --bind 127.0.0.1:8080 \
//!     --allowed-origin http://localhost:5173
//!
//! # Or via environment variable
//! RELAY_ADDR=127.0.0.1:8080 cargo run --bin chatroom-relay
//! ```

use std::sync::Arc;

use chatroom_relay::config::{RelayCliArgs, RelayConfig};
use chatroom_relay::relay::{self, RelayState};
use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = RelayCliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match RelayConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing with the resolved log level.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(addr = %config.bind_addr, "starting chatroom relay server");

    let state = Arc::new(RelayState::new());

    match relay::start_server_with_state(&config.bind_addr, state, config.allowed_origin.as_deref())
        .await
    {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "relay server listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "relay server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start relay server");
            std::process::exit(1);
        }
    }
}
