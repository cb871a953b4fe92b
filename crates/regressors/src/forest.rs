//! Random Forest Regression

use crate::error::ModelError;
use crate::{to_matrix, Matrix, Regressor};
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};

/// Random forest hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_estimators: u16,
    pub max_depth: u16,
    /// Fraction of features considered at each split, in (0, 1]
    pub max_features: f64,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 10,
            max_features: 1.0 / 3.0,
            seed: 42,
        }
    }
}

/// Bagged least-squares trees; predicts the mean of its trees
#[derive(Debug, Serialize, Deserialize)]
pub struct RandomForestModel {
    inner: RandomForestRegressor<f64, f64, Matrix, Vec<f64>>,
    n_features: usize,
}

impl RandomForestModel {
    /// Bootstrap rows and feature subsets are drawn from `seed`
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        params: &ForestParams,
    ) -> Result<Self, ModelError> {
        if params.n_estimators == 0 {
            return Err(ModelError::InvalidHyperparameter(
                "n_estimators must be positive".into(),
            ));
        }
        if !(params.max_features > 0.0 && params.max_features <= 1.0) {
            return Err(ModelError::InvalidHyperparameter(format!(
                "max_features must be in (0, 1], got {}",
                params.max_features
            )));
        }

        let n_features = x.ncols();
        let m = ((n_features as f64 * params.max_features).round() as usize).max(1);
        let forest = RandomForestRegressorParameters::default()
            .with_n_trees(params.n_estimators.into())
            .with_max_depth(params.max_depth)
            .with_m(m)
            .with_seed(params.seed);

        let inner = RandomForestRegressor::fit(&to_matrix(x), &y.to_vec(), forest)?;
        Ok(Self { inner, n_features })
    }
}

impl Regressor for RandomForestModel {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_rows(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, ModelError> {
        Ok(Array1::from_vec(self.inner.predict(&to_matrix(x))?))
    }
}
