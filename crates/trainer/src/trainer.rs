//! Multi-Candidate Model Trainer

use crate::config::TrainerConfig;
use crate::ingest::store_readings;
use crate::report::{select_best, BestModel, CandidateOutcome, TrainedCandidate, TrainingReport};
use crate::TrainerError;
use chrono::{DateTime, Duration, Utc};
use feature_engine::{FeatureEngineer, FeatureError, FittedScaler, RawReading, ScaledFeatures};
use model_registry::{ModelArtifact, ModelMetadata, ModelRegistry, BEST_MODEL};
use ndarray::{s, Array1, Array2};
use rayon::prelude::*;
use regressors::{EvaluationMetrics, FittedModel, ModelError, ModelSpec, Regressor};
use sources::{AqiSynthesizer, Clock, ProxyHistorySource};
use std::sync::Arc;
use storage::{FeatureQuery, FeatureStore};
use tracing::{debug, error, info, warn};

/// Scaled, chronologically split samples ready for fitting
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub window_days: u32,
    /// Feature rows the samples were built from
    pub source_rows: usize,
    pub feature_columns: Vec<String>,
    pub lookback: usize,
    pub scaler: FittedScaler,
    pub x_train: Array2<f64>,
    pub y_train: Array1<f64>,
    pub x_test: Array2<f64>,
    pub y_test: Array1<f64>,
}

impl PreparedData {
    pub fn train_rows(&self) -> usize {
        self.y_train.len()
    }

    pub fn test_rows(&self) -> usize {
        self.y_test.len()
    }
}

/// Trains every candidate family on one split and keeps the registry's
/// `best_model` alias pointing at the lowest held-out RMSE.
pub struct ModelTrainer {
    features: Arc<dyn FeatureStore>,
    registry: ModelRegistry,
    clock: Arc<dyn Clock>,
    config: TrainerConfig,
    engineer: FeatureEngineer,
}

impl ModelTrainer {
    pub fn new(
        features: Arc<dyn FeatureStore>,
        registry: ModelRegistry,
        clock: Arc<dyn Clock>,
        config: TrainerConfig,
    ) -> Result<Self, TrainerError> {
        if config.lookback == 0 {
            return Err(TrainerError::InvalidConfig("lookback must be at least 1".into()));
        }
        if !(config.train_fraction > 0.0 && config.train_fraction < 1.0) {
            return Err(TrainerError::InvalidConfig(format!(
                "train_fraction must be in (0, 1), got {}",
                config.train_fraction
            )));
        }

        let engineer = FeatureEngineer::new(config.normalization);
        Ok(Self {
            features,
            registry,
            clock,
            config,
            engineer,
        })
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Pull `days` of history, rebuild features, window, split and scale.
    ///
    /// The first `floor(n * train_fraction)` samples train and the rest
    /// test, so every test target is later than every training target.
    pub fn prepare_data(&self, days: u32) -> Result<PreparedData, TrainerError> {
        let end = self.clock.now();
        let start = end - Duration::days(i64::from(days));
        let rows = self.features.query(&FeatureQuery::between(start, end))?;
        if rows.is_empty() {
            return Err(TrainerError::DataUnavailable {
                requested_days: days,
                available_rows: 0,
            });
        }
        let source_rows = rows.len();

        let readings: Vec<RawReading> = rows.into_iter().map(|v| v.reading).collect();
        let frame = self.engineer.create_features(&readings);
        let set = self
            .engineer
            .prepare_training_data(&frame, &self.config.target, self.config.lookback)?;

        let samples = set.len();
        let n_train = (samples as f64 * self.config.train_fraction).floor() as usize;
        if n_train == 0 || n_train >= samples {
            return Err(TrainerError::EmptySplit {
                samples,
                train_fraction: self.config.train_fraction,
            });
        }

        let x_train = set.x.slice(s![..n_train, ..]).to_owned();
        let x_test = set.x.slice(s![n_train.., ..]).to_owned();
        let y_train = set.y.slice(s![..n_train]).to_owned();
        let y_test = set.y.slice(s![n_train..]).to_owned();

        let ScaledFeatures { scaler, train, test } =
            self.engineer.scale_features(&x_train, Some(&x_test))?;
        let test = test.ok_or(FeatureError::EmptyInput)?;

        info!(
            "Prepared {} training and {} test samples from {} rows ({} columns x {} steps)",
            n_train,
            samples - n_train,
            source_rows,
            set.feature_columns.len(),
            set.lookback
        );

        Ok(PreparedData {
            window_days: days,
            source_rows,
            feature_columns: set.feature_columns,
            lookback: set.lookback,
            scaler,
            x_train: train,
            y_train,
            x_test: test,
            y_test,
        })
    }

    /// Train, evaluate and persist every candidate, then alias the best.
    ///
    /// Candidates fit in parallel on the shared split; persistence runs in
    /// family order afterwards. A candidate that fails to fit, evaluate or
    /// persist is reported as failed and the rest continue.
    pub fn train_all_models(&self, days: u32) -> Result<TrainingReport, TrainerError> {
        let data = self.prepare_data(days)?;
        let trained_at = self.clock.now();

        let fits: Vec<(ModelSpec, Result<(FittedModel, EvaluationMetrics), ModelError>)> = self
            .config
            .candidates()
            .into_par_iter()
            .map(|spec| {
                let result = fit_and_evaluate(&spec, &data);
                (spec, result)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(fits.len());
        let mut artifacts = Vec::with_capacity(fits.len());

        for (spec, result) in fits {
            let family = spec.family();
            let registered = result.map_err(|e| e.to_string()).and_then(|(model, metrics)| {
                let metadata = ModelMetadata {
                    family,
                    feature_columns: data.feature_columns.clone(),
                    lookback: data.lookback,
                    target: self.config.target.clone(),
                    metrics,
                    training_date: trained_at,
                    scaler: data.scaler.clone(),
                    train_rows: data.train_rows(),
                    test_rows: data.test_rows(),
                    hyperparameters: spec,
                    source: None,
                };
                let version = self
                    .registry
                    .register(family.as_str(), &model, &metadata)
                    .map_err(|e| e.to_string())?;
                Ok(ModelArtifact {
                    name: family.as_str().to_string(),
                    version,
                    model,
                    metadata,
                })
            });

            match registered {
                Ok(artifact) => {
                    info!("{} trained: {}", family, artifact.metadata.metrics);
                    metrics::counter!("aqi_candidates_trained_total").increment(1);
                    outcomes.push(CandidateOutcome::Trained(TrainedCandidate {
                        family,
                        name: artifact.name.clone(),
                        version: artifact.version,
                        metrics: artifact.metadata.metrics,
                    }));
                    artifacts.push(artifact);
                }
                Err(reason) => {
                    warn!("{} failed: {}", family, reason);
                    metrics::counter!("aqi_candidates_failed_total").increment(1);
                    outcomes.push(CandidateOutcome::Failed { family, reason });
                }
            }
        }

        let best = match select_best(&artifacts, |a| a.metadata.metrics.rmse) {
            Some(artifact) => {
                let alias_version = self.registry.promote(artifact, BEST_MODEL)?;
                let rmse = artifact.metadata.metrics.rmse;
                metrics::gauge!("aqi_best_rmse").set(rmse);
                info!("Best model is {} with RMSE {:.3}", artifact.name, rmse);
                Some(BestModel {
                    candidate: TrainedCandidate {
                        family: artifact.metadata.family,
                        name: artifact.name.clone(),
                        version: artifact.version,
                        metrics: artifact.metadata.metrics,
                    },
                    alias: BEST_MODEL.to_string(),
                    alias_version,
                })
            }
            None => {
                error!("Every candidate failed; {} keeps its previous version", BEST_MODEL);
                None
            }
        };

        Ok(TrainingReport {
            trained_at,
            window_days: days,
            train_rows: data.train_rows(),
            test_rows: data.test_rows(),
            candidates: outcomes,
            best,
        })
    }

    /// Fill the feature store from forecast-derived proxy weather with
    /// synthesized AQI, through the same feature transform as live data.
    pub fn backfill_historical_data(
        &self,
        proxy: &dyn ProxyHistorySource,
        synthesizer: &AqiSynthesizer,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<usize, TrainerError> {
        let observations = proxy.history(start, end)?;
        if observations.is_empty() {
            warn!("Proxy history returned no observations");
            return Ok(0);
        }

        let aqi = synthesizer.synthesize(observations.len());
        let readings: Vec<RawReading> = observations
            .into_iter()
            .zip(aqi)
            .map(|(observation, aqi)| observation.with_aqi(aqi))
            .collect();
        debug!("Backfilling {} proxy readings", readings.len());

        Ok(store_readings(self.features.as_ref(), &self.engineer, &readings)?)
    }
}

fn fit_and_evaluate(
    spec: &ModelSpec,
    data: &PreparedData,
) -> Result<(FittedModel, EvaluationMetrics), ModelError> {
    let model = spec.fit(data.x_train.view(), data.y_train.view())?;
    let predictions = model.predict(data.x_test.view())?;
    let metrics = EvaluationMetrics::evaluate(data.y_test.view(), predictions.view())?;
    if !metrics.is_finite() {
        return Err(ModelError::NonFinite("evaluation metrics"));
    }
    Ok((model, metrics))
}
