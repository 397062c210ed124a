use anyhow::Result;
use bustrack_core::config::{TrackingConfig, DEFAULT_HISTORY_LIMIT_CAP, DEFAULT_SUBSCRIBER_BUFFER};
use bustrack_core::vehicle_registry::StaticVehicleRegistry;
use bustrack_core::{logs, server, Tracker};
use clap::Parser;
use log::{info, warn, LevelFilter};
use std::path::PathBuf;
use std::sync::Arc;

/// Realtime vehicle location tracking server.
#[derive(Parser, Debug)]
#[command(name = "bustrack-server", version, about)]
struct Args {
    #[arg(long, env = "BUSTRACK_HOST", default_value = "127.0.0.1")]
    host: String,

    #[arg(long, env = "BUSTRACK_PORT", default_value_t = 8080)]
    port: u16,

    /// Directory holding the location log. Kept in memory when omitted.
    #[arg(long, env = "BUSTRACK_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Directory for rotating log files. Terminal only when omitted.
    #[arg(long, env = "BUSTRACK_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// JSON array of known vehicles: [{"id": 1, "route": "..."}, ...]
    #[arg(long, env = "BUSTRACK_VEHICLES")]
    vehicles: Option<PathBuf>,

    #[arg(long, env = "BUSTRACK_HISTORY_LIMIT_CAP", default_value_t = DEFAULT_HISTORY_LIMIT_CAP)]
    history_limit_cap: usize,

    #[arg(long, env = "BUSTRACK_SUBSCRIBER_BUFFER", default_value_t = DEFAULT_SUBSCRIBER_BUFFER)]
    subscriber_buffer: usize,

    #[arg(long, env = "BUSTRACK_LOG_LEVEL", default_value = "info")]
    log_level: LevelFilter,
}

#[actix_web::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logs::init(args.log_dir.as_deref(), args.log_level)?;

    let registry = match &args.vehicles {
        Some(path) => StaticVehicleRegistry::load_json(path)?,
        None => {
            warn!("no vehicle file given, every location report will be rejected");
            StaticVehicleRegistry::new()
        }
    };

    let config = TrackingConfig {
        history_limit_cap: args.history_limit_cap,
        default_history_limit: args.history_limit_cap,
        subscriber_buffer: args.subscriber_buffer,
        data_dir: args.data_dir,
    };
    let tracker = Arc::new(Tracker::open(config, Arc::new(registry))?);

    info!("starting tracking server on {}:{}", args.host, args.port);
    server::run(&args.host, args.port, tracker).await?;
    Ok(())
}
