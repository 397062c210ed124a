use std::path::Path;

use anyhow::Result;
use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    {ContentLimit, FileRotate},
};
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};

pub const LOG_FILE: &str = "logs/tracking.log";

/// Installs the global logger: always the terminal, plus a rotating file under
/// `log_dir` when one is given. Can only succeed once per process.
pub fn init(log_dir: Option<&Path>, level: LevelFilter) -> Result<()> {
    let config = ConfigBuilder::new().set_time_format_rfc3339().build();
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    if let Some(log_dir) = log_dir {
        let log = FileRotate::new(
            log_dir.join(LOG_FILE),
            AppendTimestamp::default(FileLimit::MaxFiles(3)),
            ContentLimit::Lines(1000),
            Compression::None,
            #[cfg(unix)]
            None,
        );
        loggers.push(WriteLogger::new(level, config, log));
    }
    CombinedLogger::init(loggers)?;
    info!("logger initialized at level {}", level);
    Ok(())
}
