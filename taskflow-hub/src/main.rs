//! `TaskFlow` hub server -- account-scoped task store with change push.
//!
//! An axum WebSocket server that holds each account's task rows and
//! notifies every connected session of an account when any row changes.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:9100
//! cargo run --bin taskflow-hub
//!
//! # Run on custom address
//! cargo run --bin taskflow-hub -- --bind 127.0.0.1:8080
//!
//! # Or via environment variable
//! TASKFLOW_HUB_ADDR=127.0.0.1:8080 cargo run --bin taskflow-hub
//! ```

use clap::Parser;
use taskflow_hub::config::{HubCliArgs, HubConfig};
use taskflow_hub::hub;

#[tokio::main]
async fn main() {
    let cli = HubCliArgs::parse();

    let config = match HubConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(addr = %config.bind_addr, "starting taskflow hub");

    match hub::start_server(&config.bind_addr).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "hub listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "hub server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start hub server");
            std::process::exit(1);
        }
    }
}
