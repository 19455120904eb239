//! Configuration loading.
//!
//! Configuration is read from a TOML file. Every field has a default, so an
//! empty file (or no file at all) yields [`Config::default`].
//!
//! ```toml
//! [gpu]
//! validation = false
//! frames_in_flight = 3
//! max_descriptors = 1024
//! frames = 120
//!
//! [logging]
//! filter = "info,vellum=debug"
//! thread_ids = true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// GPU and frame settings.
    pub gpu: GpuConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// GPU and frame settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuConfig {
    /// Enable the Khronos validation layer when it is installed.
    pub validation: bool,
    /// Number of frames that may be in flight at once.
    pub frames_in_flight: usize,
    /// Upper bound on image and buffer descriptors per frame. The device
    /// limit is applied on top of this.
    pub max_descriptors: u32,
    /// Number of frames the headless driver renders before exiting.
    pub frames: u32,
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            validation: cfg!(debug_assertions),
            frames_in_flight: 3,
            max_descriptors: 1024,
            frames: 120,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// Include thread ids in log lines.
    pub thread_ids: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,vellum=debug".to_string(),
            thread_ids: true,
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, does not parse, or holds
    /// out-of-range values.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.gpu.frames_in_flight == 0 {
            return Err(Error::ConfigValue {
                key: "gpu.frames_in_flight",
                message: "must be at least 1".to_string(),
            });
        }
        if self.gpu.max_descriptors == 0 {
            return Err(Error::ConfigValue {
                key: "gpu.max_descriptors",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
