//! Template Proxy
//!
//! A caching reverse proxy that turns request paths into upstream URLs
//! through configured templates.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌───────────────────────────────────────────────────┐
//!                     │                  TEMPLATE PROXY                   │
//!                     │                                                   │
//!   GET /k/v/...      │  ┌─────────┐   ┌───────────┐   ┌────────────┐     │
//!   ──────────────────┼─▶│  http   │──▶│  routing  │──▶│  security  │     │
//!                     │  │ server  │   │ resolve + │   │ allow-list │     │
//!                     │  └─────────┘   │ build URL │   └─────┬──────┘     │
//!                     │                └───────────┘         │            │
//!                     │                                      ▼            │
//!   Response          │  ┌─────────┐   ┌───────────┐   ┌────────────┐     │
//!   ◀─────────────────┼──│response │◀──│ upstream  │◀──│   cache    │     │
//!                     │  │ headers │   │  client   │   │ HIT / MISS │     │
//!                     │  └─────────┘   └───────────┘   └─────▲──────┘     │
//!                     │                                      │            │
//!                     │                   admin (bearer) ────┤            │
//!                     │                   sweeper (timer) ───┘            │
//!                     │                                                   │
//!                     │  config · observability · lifecycle               │
//!                     └───────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use template_proxy::config::load_config;
use template_proxy::lifecycle::startup;
use template_proxy::observability::logging;

#[derive(Parser)]
#[command(name = "template-proxy")]
#[command(about = "Template-driven caching reverse proxy", long_about = None)]
struct Args {
    /// Path to a TOML config file. Environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    logging::init_logging(&config.observability.log_level);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "template-proxy starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        parameter_mode = ?config.routes.parameter_mode,
        cache_backend = ?config.cache.backend,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    startup::run(config).await
}
