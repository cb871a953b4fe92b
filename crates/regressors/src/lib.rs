//! Regression Model Families
//!
//! Candidate regressors for AQI forecasting: ridge regression, a random
//! forest and two gradient-boosted tree variants. Ridge, the forest and the
//! depth-wise boosting trees are fitted with smartcore; the leaf-wise
//! histogram trees are grown here. Every fitted model is a variant of the
//! tagged [`FittedModel`] enum, which encodes to a compact postcard payload
//! and dispatches prediction by family.

mod boosting;
mod error;
mod forest;
mod histogram;
mod linear;
mod metrics;
mod tree;

pub use boosting::{BoostedTrees, BoostingParams, HistBoostedTrees, HistBoostingParams};
pub use error::ModelError;
pub use forest::{ForestParams, RandomForestModel};
pub use histogram::MAX_BINS;
pub use linear::{RidgeModel, RidgeParams};
pub use metrics::EvaluationMetrics;
pub use tree::{Node, RegressionTree};

use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Matrix type handed to smartcore estimators
pub(crate) type Matrix = DenseMatrix<f64>;

/// Copy a view into a row-major smartcore matrix
pub(crate) fn to_matrix(x: ArrayView2<'_, f64>) -> Matrix {
    DenseMatrix::new(x.nrows(), x.ncols(), x.iter().copied().collect(), false)
}

/// A fitted model that maps flattened feature rows to predictions
pub trait Regressor {
    /// Input width the model was fitted on
    fn n_features(&self) -> usize;

    /// Predict rows whose width already matches [`Regressor::n_features`]
    fn predict_rows(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, ModelError>;

    /// Predict every row of `x`
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, ModelError> {
        if x.ncols() != self.n_features() {
            return Err(ModelError::DimensionMismatch {
                expected: self.n_features(),
                actual: x.ncols(),
            });
        }
        if x.nrows() == 0 {
            return Ok(Array1::zeros(0));
        }
        self.predict_rows(x)
    }
}

/// Model family tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    Ridge,
    RandomForest,
    GradientBoosting,
    HistGradientBoosting,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 4] = [
        ModelFamily::Ridge,
        ModelFamily::RandomForest,
        ModelFamily::GradientBoosting,
        ModelFamily::HistGradientBoosting,
    ];

    /// Registry name of the family's candidate
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::Ridge => "ridge",
            ModelFamily::RandomForest => "random_forest",
            ModelFamily::GradientBoosting => "gradient_boosting",
            ModelFamily::HistGradientBoosting => "hist_gradient_boosting",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelFamily {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelFamily::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| ModelError::InvalidHyperparameter(format!("unknown model family {s}")))
    }
}

/// One untrained candidate: a family plus its hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSpec {
    Ridge(RidgeParams),
    RandomForest(ForestParams),
    GradientBoosting(BoostingParams),
    HistGradientBoosting(HistBoostingParams),
}

impl ModelSpec {
    pub fn family(&self) -> ModelFamily {
        match self {
            ModelSpec::Ridge(_) => ModelFamily::Ridge,
            ModelSpec::RandomForest(_) => ModelFamily::RandomForest,
            ModelSpec::GradientBoosting(_) => ModelFamily::GradientBoosting,
            ModelSpec::HistGradientBoosting(_) => ModelFamily::HistGradientBoosting,
        }
    }

    /// Fit this candidate on (x, y)
    pub fn fit(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> Result<FittedModel, ModelError> {
        validate_training_data(x, y)?;
        debug!(
            "Fitting {} on {} samples x {} features",
            self.family(),
            x.nrows(),
            x.ncols()
        );

        let model = match self {
            ModelSpec::Ridge(p) => FittedModel::Ridge(RidgeModel::fit(x, y, p)?),
            ModelSpec::RandomForest(p) => FittedModel::RandomForest(RandomForestModel::fit(x, y, p)?),
            ModelSpec::GradientBoosting(p) => FittedModel::GradientBoosting(BoostedTrees::fit(x, y, p)?),
            ModelSpec::HistGradientBoosting(p) => {
                FittedModel::HistGradientBoosting(HistBoostedTrees::fit(x, y, p)?)
            }
        };
        Ok(model)
    }
}

fn validate_training_data(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<(), ModelError> {
    if x.nrows() == 0 {
        return Err(ModelError::EmptyTrainingSet);
    }
    if x.nrows() != y.len() {
        return Err(ModelError::DimensionMismatch {
            expected: x.nrows(),
            actual: y.len(),
        });
    }
    if !x.iter().all(|v| v.is_finite()) {
        return Err(ModelError::NonFinite("features"));
    }
    if !y.iter().all(|v| v.is_finite()) {
        return Err(ModelError::NonFinite("target"));
    }
    Ok(())
}

/// A fitted model of any family. Decoding dispatches on the variant tag.
#[derive(Debug, Serialize, Deserialize)]
pub enum FittedModel {
    Ridge(RidgeModel),
    RandomForest(RandomForestModel),
    GradientBoosting(BoostedTrees),
    HistGradientBoosting(HistBoostedTrees),
}

impl FittedModel {
    pub fn family(&self) -> ModelFamily {
        match self {
            FittedModel::Ridge(_) => ModelFamily::Ridge,
            FittedModel::RandomForest(_) => ModelFamily::RandomForest,
            FittedModel::GradientBoosting(_) => ModelFamily::GradientBoosting,
            FittedModel::HistGradientBoosting(_) => ModelFamily::HistGradientBoosting,
        }
    }

    fn inner(&self) -> &dyn Regressor {
        match self {
            FittedModel::Ridge(m) => m,
            FittedModel::RandomForest(m) => m,
            FittedModel::GradientBoosting(m) => m,
            FittedModel::HistGradientBoosting(m) => m,
        }
    }

    /// Encode as a postcard payload
    pub fn to_bytes(&self) -> Result<Vec<u8>, ModelError> {
        Ok(postcard::to_allocvec(self)?)
    }

    /// Decode a postcard payload; leaf-wise trees are checked for structure
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        let model: FittedModel = postcard::from_bytes(bytes)?;
        if let FittedModel::HistGradientBoosting(m) = &model {
            m.validate()?;
        }
        Ok(model)
    }
}

impl Regressor for FittedModel {
    fn n_features(&self) -> usize {
        self.inner().n_features()
    }

    fn predict_rows(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, ModelError> {
        self.inner().predict_rows(x)
    }
}
