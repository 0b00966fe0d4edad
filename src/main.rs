//! http-guard
//!
//! Security gateway in front of a single upstream application.
//!
//! ```text
//!                         ┌──────────────────────────────────────────┐
//!     Client Request      │               HTTP GUARD                 │
//!     ────────────────────┼─▶ forced SSL ─▶ cookies (verify/decrypt) ─┼──▶ Upstream
//!                         │                                          │
//!     Client Response     │   headers ◀─ redirect guard ◀─ cookies   │
//!     ◀───────────────────┼── (CSP, XFO,    (Location     (sign/     ◀┼─── Upstream
//!                         │    nosniff)      whitelist)    encrypt)  │
//!                         └──────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use http_guard::config::{load_config, GatewayConfig};
use http_guard::lifecycle;
use http_guard::observability::logging;

#[derive(Parser)]
#[command(name = "http-guard")]
#[command(about = "Security gateway enforcing CSP, cookie protection and redirect policies", long_about = None)]
struct Args {
    /// Path to the TOML configuration file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        request_timeout_secs = config.timeouts.request_secs,
        "http-guard starting"
    );

    lifecycle::start(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
