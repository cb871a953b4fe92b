//! Column Scaling Fitted on Training Rows

use crate::error::FeatureError;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Normalization method
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationMethod {
    /// Subtract column mean, divide by population standard deviation
    #[default]
    #[serde(alias = "zscore")]
    ZScore,
    /// Map the training range of each column onto [0, 1]
    #[serde(alias = "minmax")]
    MinMax,
    /// Pass values through unchanged
    None,
}

/// Per-column affine transform `(x - offset) / scale`.
///
/// Statistics are taken from the training partition only and never updated
/// afterwards, so the same scaler is stored with a model and reused at
/// inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedScaler {
    pub method: NormalizationMethod,
    pub offsets: Vec<f64>,
    pub scales: Vec<f64>,
}

impl FittedScaler {
    /// Fit column statistics on `data` (rows × features)
    pub fn fit(method: NormalizationMethod, data: &Array2<f64>) -> Result<Self, FeatureError> {
        if data.nrows() == 0 {
            return Err(FeatureError::EmptyInput);
        }
        let n_features = data.ncols();

        let (offsets, scales) = match method {
            NormalizationMethod::ZScore => {
                let mean = data
                    .mean_axis(Axis(0))
                    .unwrap_or_else(|| Array1::zeros(n_features));
                let std = data.std_axis(Axis(0), 0.0);
                (mean.to_vec(), std.iter().map(|s| spread_or_one(*s)).collect())
            }
            NormalizationMethod::MinMax => {
                let min = data.fold_axis(Axis(0), f64::INFINITY, |acc, v| acc.min(*v));
                let max = data.fold_axis(Axis(0), f64::NEG_INFINITY, |acc, v| acc.max(*v));
                let scales = min
                    .iter()
                    .zip(max.iter())
                    .map(|(lo, hi)| spread_or_one(hi - lo))
                    .collect();
                (min.to_vec(), scales)
            }
            NormalizationMethod::None => (vec![0.0; n_features], vec![1.0; n_features]),
        };

        Ok(Self {
            method,
            offsets,
            scales,
        })
    }

    pub fn n_features(&self) -> usize {
        self.offsets.len()
    }

    /// Apply the fitted transform; the column count must match the fit
    pub fn transform(&self, data: &Array2<f64>) -> Result<Array2<f64>, FeatureError> {
        if data.ncols() != self.n_features() {
            return Err(FeatureError::DimensionMismatch {
                expected: self.n_features(),
                actual: data.ncols(),
            });
        }

        let offsets = Array1::from_vec(self.offsets.clone());
        let scales = Array1::from_vec(self.scales.clone());
        Ok((data - &offsets) / &scales)
    }
}

/// Constant columns keep their centered value instead of dividing by zero
fn spread_or_one(spread: f64) -> f64 {
    if spread.is_finite() && spread > f64::EPSILON {
        spread
    } else {
        1.0
    }
}

/// Scaled train/test partitions and the scaler that produced them
#[derive(Debug, Clone)]
pub struct ScaledFeatures {
    pub scaler: FittedScaler,
    pub train: Array2<f64>,
    pub test: Option<Array2<f64>>,
}

/// Fit `method` on `train` and apply it to both partitions
pub fn scale_features(
    method: NormalizationMethod,
    train: &Array2<f64>,
    test: Option<&Array2<f64>>,
) -> Result<ScaledFeatures, FeatureError> {
    let scaler = FittedScaler::fit(method, train)?;
    let scaled_train = scaler.transform(train)?;
    let scaled_test = test.map(|t| scaler.transform(t)).transpose()?;

    Ok(ScaledFeatures {
        scaler,
        train: scaled_train,
        test: scaled_test,
    })
}
