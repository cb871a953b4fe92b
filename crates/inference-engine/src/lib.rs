//! AQI Inference Engine
//!
//! Loads the selected model from the registry and turns the latest stored
//! feature window plus a short weather forecast into categorized daily AQI
//! predictions.

mod predictor;

pub use predictor::{CurrentAqi, Forecast, LoadedModel, Predictor};

use chrono::{DateTime, Utc};
use feature_engine::FeatureError;
use model_registry::{RegistryError, BEST_MODEL};
use regressors::{ModelError, ModelFamily};
use serde::{Deserialize, Serialize};
use sources::SourceError;
use storage::StorageError;
use thiserror::Error;

/// Hours of feature history the predictor insists on before forecasting
pub const MIN_HISTORY_HOURS: u32 = 24;

/// Errors during prediction
#[derive(Debug, Error)]
pub enum PredictError {
    #[error(
        "Recent feature rows cover {covered_hours} of the required {required_hours} hours ({available_rows} rows)"
    )]
    DataUnavailable {
        required_hours: u32,
        covered_hours: u32,
        available_rows: usize,
    },
    #[error("Newest feature row is from {newest}, older than {max_age_hours} hours")]
    StaleData {
        newest: DateTime<Utc>,
        max_age_hours: u32,
    },
    #[error("No model stored under {name} or fallback {fallback}")]
    ModelNotFound { name: String, fallback: String },
    #[error("Feature error: {0}")]
    Feature(#[from] FeatureError),
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
}

/// Predictor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Registry name tried first
    pub model_name: String,

    /// Registry name tried when `model_name` has no versions
    pub fallback_model: String,

    /// Most recent feature rows pulled to rebuild the input window; raised
    /// to the model's lookback when that is longer
    pub context_rows: usize,

    /// Age limit on the newest stored feature row
    pub max_staleness_hours: u32,

    pub default_horizon_days: usize,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            model_name: BEST_MODEL.to_string(),
            fallback_model: ModelFamily::RandomForest.as_str().to_string(),
            context_rows: 48,
            max_staleness_hours: 24,
            default_horizon_days: 3,
        }
    }
}
