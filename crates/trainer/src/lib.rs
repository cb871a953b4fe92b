//! Model Trainer
//!
//! Pulls a window of stored feature rows, rebuilds supervised lookback
//! samples, splits them chronologically and fits every candidate family on
//! the same split. All candidates are persisted; the lowest held-out RMSE
//! is also published under the `best_model` alias.

mod config;
mod ingest;
mod report;
mod trainer;

pub use config::TrainerConfig;
pub use ingest::store_readings;
pub use report::{BestModel, CandidateOutcome, TrainedCandidate, TrainingReport};
pub use trainer::{ModelTrainer, PreparedData};

use feature_engine::FeatureError;
use model_registry::RegistryError;
use sources::SourceError;
use storage::StorageError;
use thiserror::Error;

/// Training errors
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("No feature data in the last {requested_days} days ({available_rows} rows available)")]
    DataUnavailable {
        requested_days: u32,
        available_rows: usize,
    },
    #[error("Splitting {samples} samples at {train_fraction} leaves an empty partition")]
    EmptySplit { samples: usize, train_fraction: f64 },
    #[error("Invalid trainer configuration: {0}")]
    InvalidConfig(String),
    #[error("Feature error: {0}")]
    Feature(#[from] FeatureError),
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::TrainerConfig;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use feature_engine::RawReading;
    use regressors::{BoostingParams, ForestParams, HistBoostingParams};
    use sources::FixedClock;

    pub fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).single().expect("valid start")
    }

    pub fn clock_at_hour(hour: i64) -> FixedClock {
        FixedClock(start() + Duration::hours(hour))
    }

    /// Hourly readings with a strictly rising AQI
    pub fn readings(n: usize) -> Vec<RawReading> {
        (0..n)
            .map(|i| {
                let aqi = 50.0 + i as f64 + (i % 3) as f64 * 0.2;
                RawReading {
                    timestamp: start() + Duration::hours(i as i64),
                    temp: 24.0 + (i % 6) as f64,
                    humidity: 70.0 - (i % 5) as f64,
                    pressure: 1010.0,
                    wind_speed: 3.0 + (i % 4) as f64,
                    wind_deg: 120.0,
                    weather_main: "Clouds".into(),
                    weather_description: "scattered clouds".into(),
                    aqi,
                    pm25: Some(aqi * 0.6),
                    pm10: Some(aqi * 0.8),
                    o3: None,
                    no2: None,
                    so2: None,
                    co: None,
                }
            })
            .collect()
    }

    /// Small candidates and a short lookback
    pub fn quick_config() -> TrainerConfig {
        TrainerConfig {
            lookback: 6,
            random_forest: ForestParams {
                n_estimators: 8,
                max_depth: 5,
                ..ForestParams::default()
            },
            gradient_boosting: BoostingParams {
                n_rounds: 15,
                max_depth: 3,
                ..BoostingParams::default()
            },
            hist_gradient_boosting: HistBoostingParams {
                n_rounds: 15,
                max_bins: 32,
                ..HistBoostingParams::default()
            },
            ..TrainerConfig::default()
        }
    }
}
