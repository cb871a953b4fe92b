//! Regression Error Metrics

use crate::error::ModelError;
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Held-out error of one fitted model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

impl EvaluationMetrics {
    /// Compare predictions with ground truth.
    ///
    /// A constant target has no variance to explain: R² is 1 for an exact
    /// fit and 0 otherwise.
    pub fn evaluate(
        y_true: ArrayView1<'_, f64>,
        y_pred: ArrayView1<'_, f64>,
    ) -> Result<Self, ModelError> {
        if y_true.len() != y_pred.len() {
            return Err(ModelError::DimensionMismatch {
                expected: y_true.len(),
                actual: y_pred.len(),
            });
        }
        let n = y_true.len();
        if n == 0 {
            return Err(ModelError::EmptyTrainingSet);
        }

        let mean = y_true.sum() / n as f64;
        let (mut ss_res, mut abs_err, mut ss_tot) = (0.0, 0.0, 0.0);
        for (t, p) in y_true.iter().zip(y_pred.iter()) {
            let residual = t - p;
            ss_res += residual * residual;
            abs_err += residual.abs();
            ss_tot += (t - mean) * (t - mean);
        }

        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };

        Ok(Self {
            rmse: (ss_res / n as f64).sqrt(),
            mae: abs_err / n as f64,
            r2,
        })
    }

    pub fn is_finite(&self) -> bool {
        self.rmse.is_finite() && self.mae.is_finite() && self.r2.is_finite()
    }
}

impl fmt::Display for EvaluationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RMSE {:.3}, MAE {:.3}, R² {:.3}", self.rmse, self.mae, self.r2)
    }
}
