//! Model Registry
//!
//! Stores fitted models as versioned artifacts: a postcard payload plus a
//! JSON metadata document carrying the input schema, the fitted scaler and
//! held-out metrics. Versions are append-only; the `best_model` alias is
//! just another name whose documents point back at their source candidate.

use chrono::{DateTime, Utc};
use feature_engine::FittedScaler;
use regressors::{EvaluationMetrics, FittedModel, ModelError, ModelFamily, ModelSpec, Regressor};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storage::{ModelStore, StorageError};
use thiserror::Error;
use tracing::{debug, info};

/// Registry name of the currently selected model
pub const BEST_MODEL: &str = "best_model";

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Inconsistent metadata for {name}: {reason}")]
    InconsistentMetadata { name: String, reason: String },
}

impl From<ModelError> for RegistryError {
    fn from(err: ModelError) -> Self {
        RegistryError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Serialization(err.to_string())
    }
}

/// Candidate an aliased artifact was copied from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceModel {
    pub name: String,
    pub version: u32,
}

/// Everything needed to rebuild inference inputs for a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub family: ModelFamily,
    /// Ordered per-step input columns
    pub feature_columns: Vec<String>,
    pub lookback: usize,
    pub target: String,
    pub metrics: EvaluationMetrics,
    pub training_date: DateTime<Utc>,
    pub scaler: FittedScaler,
    pub train_rows: usize,
    pub test_rows: usize,
    pub hyperparameters: ModelSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceModel>,
}

impl ModelMetadata {
    /// Width of one flattened model input
    pub fn input_width(&self) -> usize {
        self.lookback * self.feature_columns.len()
    }
}

/// A decoded model with its metadata
#[derive(Debug)]
pub struct ModelArtifact {
    pub name: String,
    pub version: u32,
    pub model: FittedModel,
    pub metadata: ModelMetadata,
}

fn check_consistency(
    name: &str,
    model: &FittedModel,
    metadata: &ModelMetadata,
) -> Result<(), RegistryError> {
    let inconsistent = |reason: String| RegistryError::InconsistentMetadata {
        name: name.to_string(),
        reason,
    };

    if model.family() != metadata.family {
        return Err(inconsistent(format!(
            "payload is {} but metadata says {}",
            model.family(),
            metadata.family
        )));
    }
    if model.n_features() != metadata.input_width() {
        return Err(inconsistent(format!(
            "model expects {} inputs, schema yields {}",
            model.n_features(),
            metadata.input_width()
        )));
    }
    if metadata.scaler.n_features() != metadata.input_width() {
        return Err(inconsistent(format!(
            "scaler covers {} inputs, schema yields {}",
            metadata.scaler.n_features(),
            metadata.input_width()
        )));
    }
    Ok(())
}

/// Versioned model artifacts over a [`ModelStore`]
#[derive(Clone)]
pub struct ModelRegistry {
    store: Arc<dyn ModelStore>,
}

impl ModelRegistry {
    pub fn new(store: Arc<dyn ModelStore>) -> Self {
        Self { store }
    }

    /// Persist a model under `name`; returns the assigned version
    pub fn register(
        &self,
        name: &str,
        model: &FittedModel,
        metadata: &ModelMetadata,
    ) -> Result<u32, RegistryError> {
        check_consistency(name, model, metadata)?;
        let payload = model.to_bytes()?;
        let document = serde_json::to_value(metadata)?;

        let version = self.store.put(name, &payload, &document)?;
        info!(
            "Registered {} version {} ({} bytes, {})",
            name,
            version,
            payload.len(),
            metadata.metrics
        );
        Ok(version)
    }

    /// Latest artifact for `name`, or a specific version
    pub fn load(&self, name: &str, version: Option<u32>) -> Result<Option<ModelArtifact>, RegistryError> {
        let Some(record) = self.store.get(name, version)? else {
            debug!("No model stored under {}", name);
            return Ok(None);
        };

        let model = FittedModel::from_bytes(&record.payload)?;
        let metadata: ModelMetadata = serde_json::from_value(record.metadata)?;
        check_consistency(name, &model, &metadata)?;

        Ok(Some(ModelArtifact {
            name: record.name,
            version: record.version,
            model,
            metadata,
        }))
    }

    /// Copy an artifact under another name, recording where it came from
    pub fn promote(&self, artifact: &ModelArtifact, alias: &str) -> Result<u32, RegistryError> {
        let metadata = ModelMetadata {
            source: Some(SourceModel {
                name: artifact.name.clone(),
                version: artifact.version,
            }),
            ..artifact.metadata.clone()
        };
        let version = self.register(alias, &artifact.model, &metadata)?;
        info!(
            "Promoted {} version {} to {} version {}",
            artifact.name, artifact.version, alias, version
        );
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feature_engine::NormalizationMethod;
    use ndarray::{Array1, Array2};
    use regressors::RidgeParams;
    use storage::MemoryRepository;

    fn fitted() -> (FittedModel, ModelMetadata) {
        let x = Array2::from_shape_fn((12, 4), |(i, j)| (i * (j + 1) % 7) as f64);
        let y = Array1::from_shape_fn(12, |i| i as f64);
        let spec = ModelSpec::Ridge(RidgeParams::default());
        let model = spec.fit(x.view(), y.view()).unwrap();
        let metadata = ModelMetadata {
            family: ModelFamily::Ridge,
            feature_columns: vec!["temp".into(), "humidity".into()],
            lookback: 2,
            target: "aqi".into(),
            metrics: EvaluationMetrics {
                rmse: 1.5,
                mae: 1.0,
                r2: 0.9,
            },
            training_date: Utc::now(),
            scaler: FittedScaler::fit(NormalizationMethod::ZScore, &x).unwrap(),
            train_rows: 12,
            test_rows: 3,
            hyperparameters: spec,
            source: None,
        };
        (model, metadata)
    }

    fn registry() -> ModelRegistry {
        ModelRegistry::new(Arc::new(MemoryRepository::new()))
    }

    #[test]
    fn test_register_and_load_latest() {
        let registry = registry();
        let (model, metadata) = fitted();

        assert_eq!(registry.register("ridge", &model, &metadata).unwrap(), 1);
        assert_eq!(registry.register("ridge", &model, &metadata).unwrap(), 2);

        let artifact = registry.load("ridge", None).unwrap().unwrap();
        assert_eq!(artifact.version, 2);
        assert_eq!(artifact.metadata, metadata);
        assert_eq!(artifact.model.to_bytes().unwrap(), model.to_bytes().unwrap());

        let first = registry.load("ridge", Some(1)).unwrap().unwrap();
        assert_eq!(first.version, 1);
    }

    #[test]
    fn test_missing_model_is_none() {
        assert!(registry().load(BEST_MODEL, None).unwrap().is_none());
    }

    #[test]
    fn test_promote_records_source() {
        let registry = registry();
        let (model, metadata) = fitted();
        registry.register("ridge", &model, &metadata).unwrap();
        let artifact = registry.load("ridge", None).unwrap().unwrap();

        registry.promote(&artifact, BEST_MODEL).unwrap();
        let best = registry.load(BEST_MODEL, None).unwrap().unwrap();
        assert_eq!(
            best.metadata.source,
            Some(SourceModel {
                name: "ridge".into(),
                version: 1
            })
        );
        // the candidate itself is untouched
        assert!(registry.load("ridge", None).unwrap().unwrap().metadata.source.is_none());
    }

    #[test]
    fn test_schema_width_mismatch_rejected() {
        let registry = registry();
        let (model, mut metadata) = fitted();
        metadata.feature_columns.push("pressure".into());
        assert!(matches!(
            registry.register("ridge", &model, &metadata),
            Err(RegistryError::InconsistentMetadata { .. })
        ));
    }

    #[test]
    fn test_corrupt_payload_is_serialization_error() {
        let store = Arc::new(MemoryRepository::new());
        let (_, metadata) = fitted();
        store
            .put("ridge", &[0xff, 0xff, 0xff], &serde_json::to_value(&metadata).unwrap())
            .unwrap();

        let registry = ModelRegistry::new(store);
        assert!(matches!(
            registry.load("ridge", None),
            Err(RegistryError::Serialization(_))
        ));
    }
}
