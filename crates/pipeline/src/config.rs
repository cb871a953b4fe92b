//! Pipeline configuration

use crate::PipelineError;
use inference_engine::PredictorConfig;
use serde::{Deserialize, Serialize};
use sources::{ForecastPoint, StaticForecast, SyntheticParams};
use std::path::Path;
use trainer::TrainerConfig;

/// Default configuration file, looked up in the working directory
pub const CONFIG_FILE: &str = "aqi-pipeline";

/// Environment prefix; `AQI__TRAINER__LOOKBACK=24` sets `trainer.lookback`
pub const ENV_PREFIX: &str = "AQI";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub storage: StorageConfig,
    pub trainer: TrainerConfig,
    pub predictor: PredictorConfig,
    pub forecast: ForecastConfig,
    pub synthetic: SyntheticParams,
    pub logging: LoggingConfig,
}

/// Where feature rows and models live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `sqlite:` URL, or `memory` for a process-local store
    pub url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://aqi.db".to_string(),
        }
    }
}

/// Daily forecast points served to the predictor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub points: Vec<ForecastPoint>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            points: StaticForecast::default().points,
        }
    }
}

/// Log output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    pub level: String,

    /// Emit JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl PipelineConfig {
    /// Layer defaults, then the config file, then `AQI__` environment
    /// variables. Without an explicit path the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, PipelineError> {
        let builder = ::config::Config::builder();
        let builder = match path {
            Some(path) => builder.add_source(::config::File::from(path)),
            None => builder.add_source(::config::File::with_name(CONFIG_FILE).required(false)),
        };

        let settings = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
