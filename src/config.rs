use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_HISTORY_LIMIT_CAP: usize = 100;
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrackingConfig {
    /// Upper bound for any history query, whatever the caller asks for.
    pub history_limit_cap: usize,
    /// Used when a history query does not say how many fixes it wants.
    pub default_history_limit: usize,
    /// Pending realtime events kept per session before the oldest is dropped.
    pub subscriber_buffer: usize,
    /// Where `locations.db` lives. `None` keeps the log in memory.
    pub data_dir: Option<PathBuf>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            history_limit_cap: DEFAULT_HISTORY_LIMIT_CAP,
            default_history_limit: DEFAULT_HISTORY_LIMIT_CAP,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
            data_dir: None,
        }
    }
}

impl TrackingConfig {
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(data_dir.into()),
            ..Self::default()
        }
    }
}
