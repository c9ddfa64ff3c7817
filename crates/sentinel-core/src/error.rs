use thiserror::Error;

/// Top-level error type shared by Sentinel crates.
#[derive(Error, Debug)]
pub enum SentinelError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}
