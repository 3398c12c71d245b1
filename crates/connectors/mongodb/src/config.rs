use mongordd_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Everything a [`crate::MongoReader`] needs to split and query a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderSettings {
    pub uri: String,
    pub database: String,
    pub collection: String,
    pub partition_key: String,
    pub lower_bound: i64,
    pub upper_bound: i64,
    #[serde(default = "default_num_partitions")]
    pub num_partitions: usize,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_num_partitions() -> usize {
    1
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

impl ReaderSettings {
    /// Load settings from the file named by `MONGORDD_CONFIG_PATH`
    /// (default `config/default.toml`), overlaid with `MONGORDD__*`
    /// environment variables.
    pub fn new() -> Result<Self> {
        let config_file_path =
            std::env::var("MONGORDD_CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());
        Self::from_file(config_file_path)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(true))
            .add_source(
                config::Environment::with_prefix("MONGORDD")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let settings: Self = s.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_partitions == 0 {
            return Err(Error::invalid_argument("num_partitions must be at least 1"));
        }
        if self.lower_bound > self.upper_bound {
            return Err(Error::invalid_argument(format!(
                "lower_bound {} is greater than upper_bound {}",
                self.lower_bound, self.upper_bound
            )));
        }
        if self.connect_timeout_ms == 0 {
            return Err(Error::invalid_argument("connect_timeout_ms must be positive"));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
