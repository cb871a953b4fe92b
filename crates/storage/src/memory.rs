//! In-Memory Repository

use crate::{FeatureQuery, FeatureStore, ModelRecord, ModelStore, StorageError};
use chrono::Utc;
use feature_engine::FeatureVector;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Process-local store for tests and `memory` URLs
pub struct MemoryRepository {
    features: Mutex<Vec<FeatureVector>>,
    models: Mutex<Vec<ModelRecord>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))
}

impl MemoryRepository {
    pub fn new() -> Self {
        info!("Creating in-memory repository");
        Self {
            features: Mutex::new(Vec::new()),
            models: Mutex::new(Vec::new()),
        }
    }

    pub fn feature_count(&self) -> Result<usize, StorageError> {
        Ok(lock(&self.features)?.len())
    }

    pub fn model_count(&self) -> Result<usize, StorageError> {
        Ok(lock(&self.models)?.len())
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureStore for MemoryRepository {
    fn append(&self, vectors: &[FeatureVector]) -> Result<usize, StorageError> {
        let mut features = lock(&self.features)?;
        features.extend_from_slice(vectors);
        debug!("Appended {} feature rows", vectors.len());
        Ok(vectors.len())
    }

    fn query(&self, query: &FeatureQuery) -> Result<Vec<FeatureVector>, StorageError> {
        let features = lock(&self.features)?;
        let mut matching: Vec<&FeatureVector> = features
            .iter()
            .filter(|v| query.contains(v.timestamp()))
            .collect();
        // stable: equal timestamps keep insertion order
        matching.sort_by_key(|v| v.timestamp());

        let limit = query.limit.unwrap_or(usize::MAX).min(matching.len());
        let kept = if query.newest {
            &matching[matching.len() - limit..]
        } else {
            &matching[..limit]
        };
        Ok(kept.iter().map(|v| (*v).clone()).collect())
    }
}

impl ModelStore for MemoryRepository {
    fn put(
        &self,
        name: &str,
        payload: &[u8],
        metadata: &serde_json::Value,
    ) -> Result<u32, StorageError> {
        let mut models = lock(&self.models)?;
        let version = models
            .iter()
            .filter(|m| m.name == name)
            .map(|m| m.version)
            .max()
            .unwrap_or(0)
            + 1;

        models.push(ModelRecord {
            name: name.to_string(),
            version,
            payload: payload.to_vec(),
            metadata: metadata.clone(),
            created_at: Utc::now(),
        });
        debug!("Stored model {} version {}", name, version);
        Ok(version)
    }

    fn get(&self, name: &str, version: Option<u32>) -> Result<Option<ModelRecord>, StorageError> {
        let models = lock(&self.models)?;
        Ok(models
            .iter()
            .rev()
            .find(|r| r.name == name && version.map_or(true, |v| r.version == v))
            .cloned())
    }
}
