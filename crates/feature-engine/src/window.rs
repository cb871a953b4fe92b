//! Supervised Lookback Windows

use crate::error::FeatureError;
use crate::features::FeatureFrame;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Default number of past rows flattened into one input
pub const DEFAULT_LOOKBACK: usize = 24;

/// Default prediction target column
pub const DEFAULT_TARGET: &str = "aqi";

/// Flattened (X, y) samples and the per-step column schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSet {
    /// One row per sample: `lookback` steps × `feature_columns`
    pub x: Array2<f64>,
    /// Target value at the step following each window
    pub y: Array1<f64>,
    /// Ordered per-step columns; defines the model input schema
    pub feature_columns: Vec<String>,
    pub lookback: usize,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}

/// Build training samples from a feature frame.
///
/// Every column except `target` is an input. For each `i` in
/// `lookback..len`, rows `[i - lookback, i)` are flattened row by row into
/// one input and paired with `target` at row `i`.
pub fn prepare_training_data(
    frame: &FeatureFrame,
    target: &str,
    lookback: usize,
) -> Result<TrainingSet, FeatureError> {
    if lookback == 0 {
        return Err(FeatureError::InvalidLookback);
    }
    if frame.len() < lookback + 1 {
        return Err(FeatureError::InsufficientData {
            required: lookback + 1,
            available: frame.len(),
        });
    }

    let target_idx = frame
        .column_index(target)
        .ok_or_else(|| FeatureError::UnknownColumn(target.to_string()))?;

    let feature_columns: Vec<String> = frame
        .columns()
        .iter()
        .filter(|c| c.as_str() != target)
        .cloned()
        .collect();
    let resolved = frame.resolve_schema(&feature_columns)?;

    let n_samples = frame.len() - lookback;
    let width = lookback * feature_columns.len();
    let mut flat = Vec::with_capacity(n_samples * width);
    let mut targets = Vec::with_capacity(n_samples);

    for i in lookback..frame.len() {
        flat.extend(frame.flatten_rows(i - lookback..i, &resolved));
        targets.push(frame.values()[(i, target_idx)]);
    }

    let x = Array2::from_shape_vec((n_samples, width), flat).map_err(|_| {
        FeatureError::DimensionMismatch {
            expected: width,
            actual: feature_columns.len(),
        }
    })?;

    Ok(TrainingSet {
        x,
        y: Array1::from_vec(targets),
        feature_columns,
        lookback,
    })
}

/// Flatten the most recent `lookback` rows of a frame into one model input,
/// projected onto a stored model schema.
pub fn inference_input(
    frame: &FeatureFrame,
    schema: &[String],
    lookback: usize,
) -> Result<Array2<f64>, FeatureError> {
    if lookback == 0 {
        return Err(FeatureError::InvalidLookback);
    }
    if frame.len() < lookback {
        return Err(FeatureError::InsufficientData {
            required: lookback,
            available: frame.len(),
        });
    }

    let resolved = frame.resolve_schema(schema)?;
    let flat = frame.flatten_rows(frame.len() - lookback..frame.len(), &resolved);
    let width = flat.len();

    Array2::from_shape_vec((1, width), flat).map_err(|_| FeatureError::DimensionMismatch {
        expected: lookback * schema.len(),
        actual: width,
    })
}
