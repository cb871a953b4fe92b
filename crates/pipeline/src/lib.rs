//! AQI Forecast Pipeline
//!
//! Wires the feature store, trainer, registry and predictor into the
//! pipeline's entry points: store features for readings, backfill proxy
//! history, train every candidate, forecast and report the current AQI.

mod config;

pub use config::{ForecastConfig, LoggingConfig, PipelineConfig, StorageConfig, CONFIG_FILE, ENV_PREFIX};

use chrono::{DateTime, Duration, Utc};
use feature_engine::{FeatureEngineer, RawReading};
use inference_engine::{CurrentAqi, Forecast, PredictError, Predictor};
use model_registry::ModelRegistry;
use sources::{
    AqiSynthesizer, Clock, ForecastSource, ProxyHistorySource, RawReadingSource, SourceError,
    StaticForecast, SyntheticReadings, SystemClock,
};
use std::sync::Arc;
use storage::{FeatureStore, MemoryRepository, ModelStore, Repository, StorageError};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use trainer::{store_readings, ModelTrainer, TrainerError, TrainingReport};

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),
    #[error("Logging setup failed: {0}")]
    Logging(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
    #[error("Training error: {0}")]
    Trainer(#[from] TrainerError),
    #[error("Prediction error: {0}")]
    Predict(#[from] PredictError),
}

/// Storage URL selecting the in-process store
pub const MEMORY_URL: &str = "memory";

/// External collaborators the pipeline runs against
pub struct Collaborators {
    pub feature_store: Arc<dyn FeatureStore>,
    pub model_store: Arc<dyn ModelStore>,
    pub readings: Arc<dyn RawReadingSource>,
    pub proxy: Arc<dyn ProxyHistorySource>,
    pub forecast: Arc<dyn ForecastSource>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// Configured storage, the seeded synthetic provider for readings and
    /// proxy history, and the configured static forecast
    pub fn from_config(config: &PipelineConfig, clock: Arc<dyn Clock>) -> Result<Self, PipelineError> {
        let (feature_store, model_store) = open_storage(&config.storage.url)?;
        let synthetic = Arc::new(SyntheticReadings::new(config.synthetic, clock.clone())?);

        Ok(Self {
            feature_store,
            model_store,
            readings: synthetic.clone(),
            proxy: synthetic,
            forecast: Arc::new(StaticForecast::new(config.forecast.points.clone())),
            clock,
        })
    }
}

/// Open the feature and model stores behind one URL
pub fn open_storage(url: &str) -> Result<(Arc<dyn FeatureStore>, Arc<dyn ModelStore>), PipelineError> {
    if url == MEMORY_URL {
        info!("Using in-memory storage");
        let repo = Arc::new(MemoryRepository::new());
        let features: Arc<dyn FeatureStore> = repo.clone();
        return Ok((features, repo));
    }
    let repo = Arc::new(Repository::connect(url)?);
    let features: Arc<dyn FeatureStore> = repo.clone();
    Ok((features, repo))
}

/// The pipeline's entry points over one set of collaborators
pub struct Pipeline {
    features: Arc<dyn FeatureStore>,
    readings: Arc<dyn RawReadingSource>,
    proxy: Arc<dyn ProxyHistorySource>,
    clock: Arc<dyn Clock>,
    synthesizer: AqiSynthesizer,
    engineer: FeatureEngineer,
    trainer: ModelTrainer,
    predictor: Predictor,
}

impl Pipeline {
    pub fn new(config: &PipelineConfig, parts: Collaborators) -> Result<Self, PipelineError> {
        let registry = ModelRegistry::new(parts.model_store);
        let trainer = ModelTrainer::new(
            parts.feature_store.clone(),
            registry.clone(),
            parts.clock.clone(),
            config.trainer.clone(),
        )?;
        let predictor = Predictor::new(
            parts.feature_store.clone(),
            registry,
            parts.forecast,
            parts.readings.clone(),
            parts.clock.clone(),
            config.predictor.clone(),
        );

        Ok(Self {
            features: parts.feature_store,
            readings: parts.readings,
            proxy: parts.proxy,
            clock: parts.clock,
            synthesizer: AqiSynthesizer::new(config.synthetic.seed),
            engineer: FeatureEngineer::new(config.trainer.normalization),
            trainer,
            predictor,
        })
    }

    /// Pipeline over the configured storage and the system clock
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let parts = Collaborators::from_config(config, Arc::new(SystemClock))?;
        Self::new(config, parts)
    }

    /// Build features for `readings` and store them; returns rows stored
    pub fn run_feature_pipeline(&self, readings: &[RawReading]) -> Result<usize, PipelineError> {
        Ok(store_readings(self.features.as_ref(), &self.engineer, readings)?)
    }

    /// Fetch the live reading and store its features
    pub fn ingest_current(&self) -> Result<usize, PipelineError> {
        let reading = self.readings.current()?;
        info!("Ingesting reading at {} (AQI {})", reading.timestamp, reading.aqi);
        self.run_feature_pipeline(&[reading])
    }

    /// Pull `days` of hourly readings ending now and store their features
    pub fn generate_history(&self, days: u32) -> Result<usize, PipelineError> {
        let now = self.clock.now();
        let readings = self.readings.pull(now - Duration::days(i64::from(days)), now)?;
        info!("Pulled {} readings covering {} days", readings.len(), days);
        self.run_feature_pipeline(&readings)
    }

    /// Store proxy history with synthesized AQI
    pub fn backfill(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<usize, PipelineError> {
        Ok(self
            .trainer
            .backfill_historical_data(self.proxy.as_ref(), &self.synthesizer, start, end)?)
    }

    /// Train every candidate on the last `days` (default from config)
    pub fn train_all_models(&self, days: Option<u32>) -> Result<TrainingReport, PipelineError> {
        let days = days.unwrap_or(self.trainer.config().default_days);
        Ok(self.trainer.train_all_models(days)?)
    }

    /// Forecast `horizon_days` days (default from config)
    pub fn predict(&self, horizon_days: Option<usize>) -> Result<Vec<Forecast>, PipelineError> {
        let days = horizon_days.unwrap_or(self.predictor.config().default_horizon_days);
        Ok(self.predictor.predict_next_n_days(days)?)
    }

    pub fn current_aqi(&self) -> Result<CurrentAqi, PipelineError> {
        Ok(self.predictor.get_current_aqi()?)
    }
}

/// Initialize logging to stderr; `RUST_LOG` overrides the configured level
pub fn init_logging(config: &LoggingConfig) -> Result<(), PipelineError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    let result = if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    result.map_err(|e| PipelineError::Logging(e.to_string()))
}
