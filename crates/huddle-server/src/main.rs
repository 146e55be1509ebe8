//! # Huddle Server
//!
//! Password-gated group-chat relay. Rooms are created and joined over TCP;
//! messages travel over UDP on the same port.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings (0.0.0.0:9001)
//! huddle
//!
//! # Run with custom config
//! huddle --config /path/to/huddle.toml
//!
//! # Run with environment variables
//! HUDDLE_PORT=9100 HUDDLE_HOST=127.0.0.1 huddle
//! ```

mod config;
mod handlers;
mod metrics;
mod relay;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "huddle=debug,huddle_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let config = match (args.next().as_deref(), args.next()) {
        (Some("--config"), Some(path)) => config::Config::from_file(path)?,
        _ => config::Config::load()?,
    };

    tracing::info!("Starting Huddle server on {}:{}", config.host, config.port);

    metrics::init_metrics();

    handlers::run_server(config).await?;

    Ok(())
}
