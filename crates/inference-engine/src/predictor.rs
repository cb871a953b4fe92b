//! Forecast Reconstruction and Inference

use crate::{PredictError, PredictorConfig, MIN_HISTORY_HOURS};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use feature_engine::{create_features, inference_input, AqiCategory, FeatureVector, RawReading};
use model_registry::{ModelArtifact, ModelRegistry};
use regressors::{ModelError, Regressor};
use serde::{Deserialize, Serialize};
use sources::{Clock, ForecastSource, RawReadingSource};
use std::sync::Arc;
use storage::{FeatureQuery, FeatureStore};
use tracing::{debug, info, warn};

/// One day-ahead prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub date: NaiveDate,
    /// Never negative
    pub predicted_aqi: f64,
    pub category: AqiCategory,
}

/// The live reading's AQI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentAqi {
    pub value: f64,
    pub category: AqiCategory,
    pub timestamp: DateTime<Utc>,
}

/// A model resolved from the registry
#[derive(Debug)]
pub struct LoadedModel {
    pub artifact: ModelArtifact,
    /// Whether the configured fallback stood in for the requested name
    pub used_fallback: bool,
}

/// Produces daily AQI forecasts from the registry's selected model
pub struct Predictor {
    features: Arc<dyn FeatureStore>,
    registry: ModelRegistry,
    forecast: Arc<dyn ForecastSource>,
    readings: Arc<dyn RawReadingSource>,
    clock: Arc<dyn Clock>,
    config: PredictorConfig,
}

impl Predictor {
    pub fn new(
        features: Arc<dyn FeatureStore>,
        registry: ModelRegistry,
        forecast: Arc<dyn ForecastSource>,
        readings: Arc<dyn RawReadingSource>,
        clock: Arc<dyn Clock>,
        config: PredictorConfig,
    ) -> Self {
        debug!(
            "Creating predictor for {} (fallback {})",
            config.model_name, config.fallback_model
        );
        Self {
            features,
            registry,
            forecast,
            readings,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    /// Latest version of `name`, else of the configured fallback.
    /// `Ok(None)` when neither has been registered.
    pub fn load_model(&self, name: &str) -> Result<Option<LoadedModel>, PredictError> {
        if let Some(artifact) = self.registry.load(name, None)? {
            debug!("Loaded {} version {}", artifact.name, artifact.version);
            return Ok(Some(LoadedModel {
                artifact,
                used_fallback: false,
            }));
        }

        let fallback = &self.config.fallback_model;
        if fallback == name {
            return Ok(None);
        }
        let loaded = self.registry.load(fallback, None)?.map(|artifact| {
            warn!(
                "No model under {}, using {} version {}",
                name, artifact.name, artifact.version
            );
            LoadedModel {
                artifact,
                used_fallback: true,
            }
        });
        Ok(loaded)
    }

    /// Predict the next `n` days.
    ///
    /// The input window is the most recent stored rows, however sparse:
    /// they must span [`MIN_HISTORY_HOURS`] and the newest must fall within
    /// the staleness limit. Each horizon appends one reconstructed row to
    /// that window: the latest reading with that day's forecast temperature
    /// and humidity. Lag and rolling columns repeat the latest known values
    /// for every horizon, so further days are coarser approximations.
    pub fn predict_next_n_days(&self, n: usize) -> Result<Vec<Forecast>, PredictError> {
        let now = self.clock.now();
        let mut rows = self.recent_rows(now, self.config.context_rows)?;
        check_history(&rows, now, self.config.max_staleness_hours)?;

        let loaded = self
            .load_model(&self.config.model_name)?
            .ok_or_else(|| PredictError::ModelNotFound {
                name: self.config.model_name.clone(),
                fallback: self.config.fallback_model.clone(),
            })?;
        let artifact = &loaded.artifact;
        let metadata = &artifact.metadata;
        if rows.len() < metadata.lookback {
            rows = self.recent_rows(now, metadata.lookback)?;
            if rows.len() < metadata.lookback {
                return Err(PredictError::DataUnavailable {
                    required_hours: MIN_HISTORY_HOURS,
                    covered_hours: covered_hours(&rows),
                    available_rows: rows.len(),
                });
            }
        }
        debug!(
            "Predicting from {} rows covering {} hours",
            rows.len(),
            covered_hours(&rows)
        );

        let readings: Vec<RawReading> = rows.into_iter().map(|v| v.reading).collect();
        let frame = create_features(&readings);
        let base = readings.last().ok_or(PredictError::DataUnavailable {
            required_hours: MIN_HISTORY_HOURS,
            covered_hours: 0,
            available_rows: 0,
        })?;
        let points = self.forecast.forecast(n)?;

        let mut forecasts = Vec::with_capacity(n);
        for day in 1..=n {
            let date = now + Duration::days(day as i64);
            let mut reading = base.clone();
            reading.timestamp = date;
            if let Some(point) = points.get(day - 1) {
                reading.temp = point.temp;
                reading.humidity = point.humidity;
            }

            let extended = frame.extend_with_forecast(reading)?;
            let input = inference_input(&extended, &metadata.feature_columns, metadata.lookback)?;
            let scaled = metadata.scaler.transform(&input)?;
            let raw = artifact
                .model
                .predict(scaled.view())?
                .first()
                .copied()
                .filter(|v| v.is_finite())
                .ok_or(ModelError::NonFinite("prediction"))?;

            let predicted_aqi = raw.max(0.0);
            forecasts.push(Forecast {
                date: date.date_naive(),
                predicted_aqi,
                category: AqiCategory::from_aqi(predicted_aqi),
            });
        }

        metrics::counter!("aqi_predictions_total").increment(forecasts.len() as u64);
        info!(
            "Forecast {} days with {} version {}",
            forecasts.len(),
            artifact.name,
            artifact.version
        );
        Ok(forecasts)
    }

    fn recent_rows(&self, now: DateTime<Utc>, n: usize) -> Result<Vec<FeatureVector>, PredictError> {
        Ok(self.features.query(&FeatureQuery::latest(n, now))?)
    }

    /// AQI of the live reading
    pub fn get_current_aqi(&self) -> Result<CurrentAqi, PredictError> {
        let reading = self.readings.current()?;
        Ok(CurrentAqi {
            value: reading.aqi,
            category: AqiCategory::from_aqi(reading.aqi),
            timestamp: reading.timestamp,
        })
    }
}

/// Hour slots touched from the oldest row through the newest, inclusive
fn covered_hours(rows: &[FeatureVector]) -> u32 {
    match (rows.first(), rows.last()) {
        (Some(first), Some(last)) => {
            let span = (last.timestamp() - first.timestamp()).num_hours();
            u32::try_from(span + 1).unwrap_or(u32::MAX)
        }
        _ => 0,
    }
}

fn check_history(
    rows: &[FeatureVector],
    now: DateTime<Utc>,
    max_age_hours: u32,
) -> Result<(), PredictError> {
    let covered = covered_hours(rows);
    let newest = match rows.last() {
        Some(v) if covered >= MIN_HISTORY_HOURS => v.timestamp(),
        _ => {
            return Err(PredictError::DataUnavailable {
                required_hours: MIN_HISTORY_HOURS,
                covered_hours: covered,
                available_rows: rows.len(),
            })
        }
    };
    if now - newest > Duration::hours(i64::from(max_age_hours)) {
        return Err(PredictError::StaleData {
            newest,
            max_age_hours,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use feature_engine::FeatureEngineer;
    use model_registry::{ModelMetadata, BEST_MODEL};
    use ndarray::{s, Array1, Array2};
    use proptest::prelude::*;
    use regressors::{BoostingParams, ForestParams, HistBoostingParams, ModelFamily, ModelSpec, RidgeParams};
    use sources::{FixedClock, ForecastPoint, StaticForecast, SyntheticParams, SyntheticReadings};
    use storage::MemoryRepository;
    use trainer::{store_readings, ModelTrainer, TrainerConfig};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    }

    fn readings(from_hour: usize, n: usize, aqi: impl Fn(usize) -> f64, pm25: bool) -> Vec<RawReading> {
        (from_hour..from_hour + n)
            .map(|i| RawReading {
                timestamp: start() + Duration::hours(i as i64),
                temp: 25.0 + (i % 4) as f64,
                humidity: 62.0 - (i % 5) as f64,
                pressure: 1009.0,
                wind_speed: 2.0 + (i % 3) as f64,
                wind_deg: 45.0,
                weather_main: "Haze".into(),
                weather_description: "haze".into(),
                aqi: aqi(i),
                pm25: pm25.then(|| aqi(i) * 0.6),
                pm10: None,
                o3: None,
                no2: None,
                so2: None,
                co: None,
            })
            .collect()
    }

    fn quick_config() -> TrainerConfig {
        TrainerConfig {
            lookback: 6,
            random_forest: ForestParams {
                n_estimators: 6,
                max_depth: 4,
                ..ForestParams::default()
            },
            gradient_boosting: BoostingParams {
                n_rounds: 10,
                max_depth: 3,
                ..BoostingParams::default()
            },
            hist_gradient_boosting: HistBoostingParams {
                n_rounds: 10,
                max_bins: 32,
                ..HistBoostingParams::default()
            },
            ..TrainerConfig::default()
        }
    }

    fn store(repo: &MemoryRepository, rows: &[RawReading]) {
        store_readings(repo, &FeatureEngineer::default(), rows).unwrap();
    }

    fn train_with(repo: &Arc<MemoryRepository>, at_hour: i64, config: TrainerConfig) {
        let trainer = ModelTrainer::new(
            repo.clone(),
            ModelRegistry::new(repo.clone()),
            Arc::new(FixedClock(start() + Duration::hours(at_hour))),
            config,
        )
        .unwrap();
        trainer.train_all_models(7).unwrap();
    }

    fn train(repo: &Arc<MemoryRepository>, at_hour: i64) {
        train_with(repo, at_hour, quick_config());
    }

    /// Ten days of readings every three hours, like a backfill
    fn sparse_repo() -> Arc<MemoryRepository> {
        let repo = Arc::new(MemoryRepository::new());
        let rows: Vec<RawReading> = readings(0, 240, |i| 55.0 + (i % 24) as f64, true)
            .into_iter()
            .step_by(3)
            .collect();
        store(&repo, &rows);
        repo
    }

    fn predictor_with(
        repo: &Arc<MemoryRepository>,
        at_hour: i64,
        forecast: StaticForecast,
        config: PredictorConfig,
    ) -> Predictor {
        let clock = Arc::new(FixedClock(start() + Duration::hours(at_hour)));
        let live = SyntheticReadings::new(SyntheticParams::default(), clock.clone()).unwrap();
        Predictor::new(
            repo.clone(),
            ModelRegistry::new(repo.clone()),
            Arc::new(forecast),
            Arc::new(live),
            clock,
            config,
        )
    }

    fn predictor(repo: &Arc<MemoryRepository>, at_hour: i64) -> Predictor {
        predictor_with(repo, at_hour, StaticForecast::default(), PredictorConfig::default())
    }

    fn trained_repo(n: usize) -> Arc<MemoryRepository> {
        let repo = Arc::new(MemoryRepository::new());
        store(&repo, &readings(0, n, |i| 60.0 + (i % 24) as f64 * 2.0, true));
        train(&repo, n as i64 - 1);
        repo
    }

    #[test]
    fn test_three_day_forecast() {
        let repo = trained_repo(72);
        let forecasts = predictor(&repo, 71).predict_next_n_days(3).unwrap();

        assert_eq!(forecasts.len(), 3);
        let first_day = (start() + Duration::hours(71) + Duration::days(1)).date_naive();
        assert_eq!(forecasts[0].date, first_day);
        assert_eq!(forecasts[2].date, first_day + Duration::days(2));
        for f in &forecasts {
            assert!(f.predicted_aqi >= 0.0 && f.predicted_aqi.is_finite());
            assert_eq!(f.category, AqiCategory::from_aqi(f.predicted_aqi));
        }
    }

    #[test]
    fn test_horizon_beyond_forecast_points() {
        let repo = trained_repo(72);
        let forecast = StaticForecast::new(vec![ForecastPoint { temp: 30.0, humidity: 40.0 }]);
        let p = predictor_with(&repo, 71, forecast, PredictorConfig::default());
        assert_eq!(p.predict_next_n_days(5).unwrap().len(), 5);
    }

    #[test]
    fn test_empty_store_is_data_unavailable() {
        let repo = Arc::new(MemoryRepository::new());
        assert!(matches!(
            predictor(&repo, 0).predict_next_n_days(3),
            Err(PredictError::DataUnavailable {
                required_hours: 24,
                covered_hours: 0,
                available_rows: 0
            })
        ));
    }

    #[test]
    fn test_data_is_checked_before_the_model() {
        let repo = Arc::new(MemoryRepository::new());
        store(&repo, &readings(0, 10, |_| 70.0, true));
        assert!(matches!(
            predictor(&repo, 9).predict_next_n_days(3),
            Err(PredictError::DataUnavailable {
                covered_hours: 10,
                available_rows: 10,
                ..
            })
        ));

        store(&repo, &readings(10, 30, |_| 70.0, true));
        match predictor(&repo, 39).predict_next_n_days(3) {
            Err(PredictError::ModelNotFound { name, fallback }) => {
                assert_eq!(name, BEST_MODEL);
                assert_eq!(fallback, "random_forest");
            }
            other => panic!("expected ModelNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_sparse_history_is_enough() {
        let repo = sparse_repo();
        train(&repo, 237);

        // eight rows three hours apart cover 22 hours
        let config = PredictorConfig {
            context_rows: 8,
            ..PredictorConfig::default()
        };
        let short = predictor_with(&repo, 237, StaticForecast::default(), config);
        assert!(matches!(
            short.predict_next_n_days(3),
            Err(PredictError::DataUnavailable {
                covered_hours: 22,
                available_rows: 8,
                ..
            })
        ));

        let forecasts = predictor(&repo, 237).predict_next_n_days(3).unwrap();
        assert_eq!(forecasts.len(), 3);
        assert!(forecasts.iter().all(|f| f.predicted_aqi.is_finite()));
    }

    #[test]
    fn test_context_grows_to_the_model_lookback() {
        let repo = sparse_repo();
        let config = TrainerConfig {
            lookback: 12,
            ..quick_config()
        };
        train_with(&repo, 237, config);

        // nine rows span a day but hold fewer steps than the model reads
        let config = PredictorConfig {
            context_rows: 9,
            ..PredictorConfig::default()
        };
        let p = predictor_with(&repo, 237, StaticForecast::default(), config);
        assert_eq!(p.predict_next_n_days(2).unwrap().len(), 2);
    }

    #[test]
    fn test_stale_history_is_rejected() {
        let repo = trained_repo(72);
        match predictor(&repo, 71 + 25).predict_next_n_days(1) {
            Err(PredictError::StaleData {
                newest,
                max_age_hours,
            }) => {
                assert_eq!(newest, start() + Duration::hours(71));
                assert_eq!(max_age_hours, 24);
            }
            other => panic!("expected StaleData, got {:?}", other),
        }
        assert!(predictor(&repo, 71 + 24).predict_next_n_days(1).is_ok());
    }

    #[test]
    fn test_negative_model_output_is_clamped_to_zero() {
        let repo = trained_repo(72);
        let registry = ModelRegistry::new(repo.clone());
        let ridge = registry.load("ridge", None).unwrap().unwrap();

        // constant target: the ridge intercept alone answers -500 for any input
        let width = ridge.metadata.input_width();
        let x = Array2::from_shape_fn((12, width), |(i, j)| ((i * 5 + j) % 11) as f64 / 10.0);
        let y = Array1::from_elem(12, -500.0);
        let spec = ModelSpec::Ridge(RidgeParams::default());
        let model = spec.fit(x.view(), y.view()).unwrap();
        let raw = model.predict(x.slice(s![..1, ..])).unwrap();
        assert!((raw[0] + 500.0).abs() < 1e-9, "{}", raw[0]);

        let metadata = ModelMetadata {
            hyperparameters: spec,
            source: None,
            ..ridge.metadata.clone()
        };
        registry.register(BEST_MODEL, &model, &metadata).unwrap();

        let forecasts = predictor(&repo, 71).predict_next_n_days(3).unwrap();
        assert_eq!(forecasts.len(), 3);
        for f in forecasts {
            assert_eq!(f.predicted_aqi, 0.0);
            assert_eq!(f.category, AqiCategory::Good);
        }
    }

    #[test]
    fn test_load_model_prefers_requested_name() {
        let repo = trained_repo(60);
        let loaded = predictor(&repo, 59).load_model(BEST_MODEL).unwrap().unwrap();
        assert!(!loaded.used_fallback);
        assert_eq!(loaded.artifact.name, BEST_MODEL);
        assert!(loaded.artifact.metadata.source.is_some());
    }

    #[test]
    fn test_load_model_falls_back() {
        let repo = trained_repo(60);
        let config = PredictorConfig {
            model_name: "lstm".into(),
            ..PredictorConfig::default()
        };
        let p = predictor_with(&repo, 59, StaticForecast::default(), config);

        let loaded = p.load_model("lstm").unwrap().unwrap();
        assert!(loaded.used_fallback);
        assert_eq!(loaded.artifact.metadata.family, ModelFamily::RandomForest);
        assert_eq!(p.predict_next_n_days(2).unwrap().len(), 2);
    }

    #[test]
    fn test_load_model_on_empty_registry() {
        let repo = Arc::new(MemoryRepository::new());
        assert!(predictor(&repo, 0).load_model(BEST_MODEL).unwrap().is_none());
        assert!(predictor(&repo, 0).load_model("random_forest").unwrap().is_none());
    }

    #[test]
    fn test_missing_schema_column_is_an_error() {
        let repo = trained_repo(72);
        // later rows stop reporting pm25, which the model was trained on
        store(&repo, &readings(72, 60, |_| 80.0, false));

        assert!(matches!(
            predictor(&repo, 131).predict_next_n_days(1),
            Err(PredictError::Feature(feature_engine::FeatureError::SchemaMismatch(_)))
        ));
    }

    #[test]
    fn test_current_aqi() {
        let repo = Arc::new(MemoryRepository::new());
        let current = predictor(&repo, 5).get_current_aqi().unwrap();
        assert_eq!(current.timestamp, start() + Duration::hours(5));
        assert_eq!(current.category, AqiCategory::from_aqi(current.value));
        assert!((40.0..=250.0).contains(&current.value));
    }

    #[test]
    fn test_forecast_json_shape() {
        let forecast = Forecast {
            date: NaiveDate::from_ymd_opt(2024, 5, 4).unwrap(),
            predicted_aqi: 51.5,
            category: AqiCategory::Moderate,
        };
        let json = serde_json::to_value(&forecast).unwrap();
        assert_eq!(json["date"], "2024-05-04");
        assert_eq!(json["category"], "Moderate");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(6))]

        #[test]
        fn prop_predictions_are_never_negative(slope in 0.5f64..4.0, floor in 0.0f64..5.0) {
            // steadily falling AQI invites negative extrapolation
            let repo = Arc::new(MemoryRepository::new());
            store(&repo, &readings(0, 60, |i| floor + slope * (60 - i) as f64, true));
            train(&repo, 59);

            let forecasts = predictor(&repo, 59).predict_next_n_days(3).unwrap();
            prop_assert_eq!(forecasts.len(), 3);
            for f in forecasts {
                prop_assert!(f.predicted_aqi >= 0.0);
            }
        }
    }
}
