//! Storage Layer
//!
//! Append-only persistence for feature rows and versioned model documents.
//! Both stores are blocking from the caller's point of view. Identifiers
//! assigned by the backend never leave this crate.

mod memory;
mod repository;

pub use memory::MemoryRepository;
pub use repository::Repository;

use chrono::{DateTime, Utc};
use feature_engine::FeatureVector;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Invalid storage URL: {0}")]
    InvalidUrl(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}

/// Time window over stored feature rows. Both bounds are inclusive and
/// results are always ascending by timestamp. `limit` keeps the earliest
/// rows, or the most recent ones when `newest` is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub newest: bool,
}

impl FeatureQuery {
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            ..Self::default()
        }
    }

    /// The `n` most recent rows at or before `end`
    pub fn latest(n: usize, end: DateTime<Utc>) -> Self {
        Self {
            end: Some(end),
            limit: Some(n),
            newest: true,
            ..Self::default()
        }
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| timestamp >= s) && self.end.map_or(true, |e| timestamp <= e)
    }
}

/// One stored model document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub name: String,
    pub version: u32,
    pub payload: Vec<u8>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Append-only, time-ordered feature row storage
pub trait FeatureStore: Send + Sync {
    /// Store rows; returns how many were written
    fn append(&self, vectors: &[FeatureVector]) -> Result<usize, StorageError>;

    /// Rows inside the window, ascending by timestamp. Rows sharing a
    /// timestamp come back in insertion order.
    fn query(&self, query: &FeatureQuery) -> Result<Vec<FeatureVector>, StorageError>;
}

/// Versioned, append-only model document storage
pub trait ModelStore: Send + Sync {
    /// Atomically store a payload with its metadata under the next version
    /// for `name`; returns that version (1 for the first put).
    fn put(
        &self,
        name: &str,
        payload: &[u8],
        metadata: &serde_json::Value,
    ) -> Result<u32, StorageError>;

    /// Most recently created document for `name`, optionally restricted to
    /// one version
    fn get(&self, name: &str, version: Option<u32>) -> Result<Option<ModelRecord>, StorageError>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use feature_engine::{create_features, FeatureVector, RawReading};

    pub fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).single().expect("valid start")
    }

    pub fn vectors(n: usize) -> Vec<FeatureVector> {
        let readings: Vec<RawReading> = (0..n)
            .map(|i| RawReading {
                timestamp: start() + Duration::hours(i as i64),
                temp: 22.0,
                humidity: 55.0,
                pressure: 1013.0,
                wind_speed: 3.0,
                wind_deg: 90.0,
                weather_main: "Clear".into(),
                weather_description: "clear sky".into(),
                aqi: 40.0 + i as f64,
                pm25: None,
                pm10: None,
                o3: None,
                no2: None,
                so2: None,
                co: None,
            })
            .collect();
        create_features(&readings).to_vectors()
    }
}
