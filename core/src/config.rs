/// Configuration management
use crate::error::{ChatError, Result};
use std::path::PathBuf;

const DEFAULT_EVENT_CAPACITY: usize = 64;
const DEFAULT_UPLOAD_CHUNK: usize = 64 * 1024;

/// Core configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Data directory for the embedded store (defaults to `.neighborly`)
    pub data_dir: PathBuf,

    /// Capacity of the store change feed and toast channels
    pub event_capacity: usize,

    /// Upload chunk size in bytes (controls progress granularity)
    pub upload_chunk_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".neighborly"),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            upload_chunk_size: DEFAULT_UPLOAD_CHUNK,
        }
    }
}

impl Config {
    /// Create config from command line arguments
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut config = Self::default();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--data-dir" => {
                    let path = args.get(i + 1).ok_or_else(|| {
                        ChatError::Config("--data-dir requires a path argument".to_string())
                    })?;
                    config.data_dir = PathBuf::from(path);
                    i += 2;
                }
                "--event-capacity" => {
                    let n = args.get(i + 1).ok_or_else(|| {
                        ChatError::Config("--event-capacity requires a number".to_string())
                    })?;
                    config.event_capacity = n.parse::<usize>().map_err(|_| {
                        ChatError::Config("--event-capacity must be a positive number".to_string())
                    })?;
                    i += 2;
                }
                "--upload-chunk-size" => {
                    let n = args.get(i + 1).ok_or_else(|| {
                        ChatError::Config("--upload-chunk-size requires a byte count".to_string())
                    })?;
                    config.upload_chunk_size = n.parse::<usize>().map_err(|_| {
                        ChatError::Config(
                            "--upload-chunk-size must be a positive number".to_string(),
                        )
                    })?;
                    i += 2;
                }
                other => {
                    return Err(ChatError::Config(format!(
                        "Unknown argument: {} (usage: {} [--data-dir <path>] [--event-capacity <n>] [--upload-chunk-size <bytes>])",
                        other,
                        args.first().map(String::as_str).unwrap_or("core")
                    )));
                }
            }
        }

        // Env overrides (nice for scripts)
        if let Ok(dir) = std::env::var("NEIGHBORLY_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(n) = std::env::var("NEIGHBORLY_EVENT_CAPACITY")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
        {
            config.event_capacity = n;
        }
        if let Some(n) = std::env::var("NEIGHBORLY_UPLOAD_CHUNK")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
        {
            config.upload_chunk_size = n;
        }

        Ok(config)
    }
}
