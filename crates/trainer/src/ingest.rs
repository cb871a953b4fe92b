//! Feature Pipeline Step

use feature_engine::{FeatureEngineer, RawReading};
use storage::{FeatureStore, StorageError};
use tracing::info;

/// Build features for `readings` and append them to the store.
///
/// Features are derived from this batch alone; lag and rolling columns of
/// its first rows are filled from within the batch.
pub fn store_readings(
    store: &dyn FeatureStore,
    engineer: &FeatureEngineer,
    readings: &[RawReading],
) -> Result<usize, StorageError> {
    if readings.is_empty() {
        return Ok(0);
    }

    let vectors = engineer.create_features(readings).to_vectors();
    let stored = store.append(&vectors)?;
    metrics::counter!("aqi_feature_rows_stored_total").increment(stored as u64);

    info!("Stored {} feature rows", stored);
    Ok(stored)
}
