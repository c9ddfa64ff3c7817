//! Configuration management for Sentinel services.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`SENTINEL_<SECTION>__<KEY>`, `__` between nesting levels)
//! 2. Config file (`sentinel.toml` by default)
//! 3. Defaults

use serde::de::DeserializeOwned;

use crate::error::SentinelError;

/// Load one section of the config file, overlaid with environment variables.
///
/// A missing file is not an error. A missing section yields `T::default()`;
/// a present but malformed section is reported.
pub fn load_section<T>(file_prefix: &str, section: &str) -> Result<T, SentinelError>
where
    T: DeserializeOwned + Default,
{
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("SENTINEL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    match cfg.get::<T>(section) {
        Ok(value) => Ok(value),
        Err(config::ConfigError::NotFound(_)) => {
            tracing::debug!(section, "Config section absent, using defaults");
            Ok(T::default())
        }
        Err(e) => Err(e.into()),
    }
}
