//! L2-Regularized Linear Regression

use crate::error::ModelError;
use crate::{to_matrix, Matrix, Regressor};
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use smartcore::linear::ridge_regression::{
    RidgeRegression, RidgeRegressionParameters, RidgeRegressionSolverName,
};

/// Ridge hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RidgeParams {
    /// L2 penalty on the coefficients (the intercept is not penalized)
    pub alpha: f64,
}

impl Default for RidgeParams {
    fn default() -> Self {
        Self { alpha: 1.0 }
    }
}

/// Fitted ridge model.
///
/// The solver only ever sees `x - x_offset` and `y - y_offset`, so the
/// intercept is `y_offset` and stays out of the penalty.
#[derive(Debug, Serialize, Deserialize)]
pub struct RidgeModel {
    inner: RidgeRegression<f64, f64, Matrix, Vec<f64>>,
    x_offset: Vec<f64>,
    y_offset: f64,
}

impl RidgeModel {
    /// Cholesky solve of `(XᵀX + αI) w = Xᵀy` on centered data
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        params: &RidgeParams,
    ) -> Result<Self, ModelError> {
        if !(params.alpha >= 0.0 && params.alpha.is_finite()) {
            return Err(ModelError::InvalidHyperparameter(format!(
                "ridge alpha must be finite and >= 0, got {}",
                params.alpha
            )));
        }

        let (n_samples, n_features) = x.dim();
        let x_offset = x
            .mean_axis(Axis(0))
            .ok_or(ModelError::EmptyTrainingSet)?;
        let y_offset = y.mean().ok_or(ModelError::EmptyTrainingSet)?;

        // Zero rows leave XᵀX and Xᵀy unchanged; the solver wants more rows than columns
        let n_rows = n_samples.max(n_features + 1);
        let mut xc = Array2::<f64>::zeros((n_rows, n_features));
        xc.slice_mut(s![..n_samples, ..]).assign(&(&x - &x_offset));
        let mut yc = vec![0.0; n_rows];
        for (slot, target) in yc.iter_mut().zip(y.iter()) {
            *slot = target - y_offset;
        }

        let solver = RidgeRegressionParameters::default()
            .with_alpha(params.alpha)
            .with_solver(RidgeRegressionSolverName::Cholesky)
            .with_normalize(false);
        let inner = RidgeRegression::fit(&to_matrix(xc.view()), &yc, solver)?;

        Ok(Self {
            inner,
            x_offset: x_offset.to_vec(),
            y_offset,
        })
    }
}

impl Regressor for RidgeModel {
    fn n_features(&self) -> usize {
        self.x_offset.len()
    }

    fn predict_rows(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, ModelError> {
        let centered = &x - &ArrayView1::from(&self.x_offset[..]);
        let predictions = self.inner.predict(&to_matrix(centered.view()))?;
        Ok(predictions.into_iter().map(|p| p + self.y_offset).collect())
    }
}
