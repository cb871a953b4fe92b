//! Gradient-Boosted Regression Trees
//!
//! Two weak learners over the same squared-error boosting loop: depth-wise
//! CART trees fitted by smartcore on raw values, and leaf-wise trees grown
//! over histogram-binned features.

use crate::error::ModelError;
use crate::histogram::{grow_leafwise, BinMapper};
use crate::tree::{RegressionTree, TreeParams};
use crate::{to_matrix, Matrix, Regressor};
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use smartcore::tree::decision_tree_regressor::{
    DecisionTreeRegressor, DecisionTreeRegressorParameters,
};
use tracing::debug;

type CartTree = DecisionTreeRegressor<f64, f64, Matrix, Vec<f64>>;

/// Depth-wise gradient boosting hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingParams {
    pub n_rounds: usize,
    pub max_depth: u16,
    pub learning_rate: f64,
    pub min_samples_leaf: usize,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_rounds: 100,
            max_depth: 6,
            learning_rate: 0.1,
            min_samples_leaf: 1,
        }
    }
}

/// Histogram leaf-wise gradient boosting hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistBoostingParams {
    pub n_rounds: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub max_leaves: usize,
    pub max_bins: usize,
    pub lambda: f64,
    pub min_samples_leaf: usize,
}

impl Default for HistBoostingParams {
    fn default() -> Self {
        Self {
            n_rounds: 100,
            max_depth: 6,
            learning_rate: 0.1,
            max_leaves: 31,
            max_bins: 255,
            lambda: 0.0,
            min_samples_leaf: 1,
        }
    }
}

/// Additive CART ensemble: `base_score + learning_rate * Σ tree(x)`
#[derive(Debug, Serialize, Deserialize)]
pub struct BoostedTrees {
    base_score: f64,
    learning_rate: f64,
    trees: Vec<CartTree>,
    n_features: usize,
}

/// Additive leaf-wise ensemble: `base_score + learning_rate * Σ tree(x)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistBoostedTrees {
    pub base_score: f64,
    pub learning_rate: f64,
    pub trees: Vec<RegressionTree>,
    pub n_features: usize,
}

impl Regressor for BoostedTrees {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_rows(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, ModelError> {
        let matrix = to_matrix(x);
        let mut predictions = Array1::from_elem(x.nrows(), self.base_score);
        for tree in &self.trees {
            for (p, output) in predictions.iter_mut().zip(tree.predict(&matrix)?) {
                *p += self.learning_rate * output;
            }
        }
        Ok(predictions)
    }
}

impl HistBoostedTrees {
    fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        self.base_score
            + self.learning_rate * self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
    }

    pub(crate) fn validate(&self) -> Result<(), ModelError> {
        self.trees.iter().try_for_each(|t| t.validate(self.n_features))
    }
}

impl Regressor for HistBoostedTrees {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_rows(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, ModelError> {
        Ok(x.rows().into_iter().map(|row| self.predict_row(row)).collect())
    }
}

fn check_rate(n_rounds: usize, learning_rate: f64) -> Result<(), ModelError> {
    if n_rounds == 0 {
        return Err(ModelError::InvalidHyperparameter(
            "n_rounds must be positive".into(),
        ));
    }
    if !(learning_rate > 0.0 && learning_rate.is_finite()) {
        return Err(ModelError::InvalidHyperparameter(format!(
            "learning_rate must be positive, got {learning_rate}"
        )));
    }
    Ok(())
}

/// Squared-error boosting from the target mean. Each round fits a learner
/// to the residuals `y - prediction` and returns it with its output on the
/// training rows.
fn boost<T>(
    y: ArrayView1<'_, f64>,
    n_rounds: usize,
    learning_rate: f64,
    mut fit_round: impl FnMut(&[f64]) -> Result<(T, Vec<f64>), ModelError>,
) -> Result<(f64, Vec<T>), ModelError> {
    let base_score = y.mean().ok_or(ModelError::EmptyTrainingSet)?;
    let mut predictions = vec![base_score; y.len()];
    let mut learners = Vec::with_capacity(n_rounds);

    for round in 0..n_rounds {
        let residuals: Vec<f64> = y.iter().zip(&predictions).map(|(t, p)| t - p).collect();
        let (learner, output) = fit_round(&residuals)?;
        for (p, o) in predictions.iter_mut().zip(output) {
            *p += learning_rate * o;
        }
        learners.push(learner);

        if round % 25 == 0 {
            let mse = residuals.iter().map(|r| r * r).sum::<f64>() / y.len() as f64;
            debug!("Boosting round {} training MSE {:.4}", round, mse);
        }
    }

    Ok((base_score, learners))
}

impl BoostedTrees {
    /// Depth-wise boosting with exact threshold search on every feature
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        params: &BoostingParams,
    ) -> Result<Self, ModelError> {
        check_rate(params.n_rounds, params.learning_rate)?;
        let matrix = to_matrix(x);
        let tree_params = DecisionTreeRegressorParameters::default()
            .with_max_depth(params.max_depth)
            .with_min_samples_leaf(params.min_samples_leaf);

        let (base_score, trees) = boost(y, params.n_rounds, params.learning_rate, |residuals| {
            let tree = CartTree::fit(&matrix, &residuals.to_vec(), tree_params.clone())?;
            let output = tree.predict(&matrix)?;
            Ok((tree, output))
        })?;

        Ok(Self {
            base_score,
            learning_rate: params.learning_rate,
            trees,
            n_features: x.ncols(),
        })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn base_score(&self) -> f64 {
        self.base_score
    }
}

impl HistBoostedTrees {
    /// Leaf-wise boosting over features pre-binned at training quantiles
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        params: &HistBoostingParams,
    ) -> Result<Self, ModelError> {
        check_rate(params.n_rounds, params.learning_rate)?;
        if params.max_leaves < 2 {
            return Err(ModelError::InvalidHyperparameter(
                "max_leaves must be at least 2".into(),
            ));
        }
        let tree_params = TreeParams {
            lambda: params.lambda,
            min_samples_leaf: params.min_samples_leaf,
            ..TreeParams::new(params.max_depth)
        };

        let mapper = BinMapper::fit(x, params.max_bins);
        let binned = mapper.transform(x);
        let hess = vec![1.0; y.len()];

        let (base_score, trees) = boost(y, params.n_rounds, params.learning_rate, |residuals| {
            let grad: Vec<f64> = residuals.iter().map(|r| -r).collect();
            let tree = grow_leafwise(&binned, &mapper, &grad, &hess, &tree_params, params.max_leaves);
            let output = x.rows().into_iter().map(|row| tree.predict_row(row)).collect();
            Ok((tree, output))
        })?;

        Ok(Self {
            base_score,
            learning_rate: params.learning_rate,
            trees,
            n_features: x.ncols(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn curve() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((80, 2), |(i, j)| if j == 0 { i as f64 / 8.0 } else { (i % 3) as f64 });
        let y = x.column(0).mapv(|v| (v * 0.8).sin() * 20.0 + 50.0);
        (x, y)
    }

    fn mse(model: &dyn Regressor, x: &Array2<f64>, y: &Array1<f64>) -> f64 {
        let p = model.predict(x.view()).unwrap();
        p.iter().zip(y.iter()).map(|(p, t)| (p - t).powi(2)).sum::<f64>() / y.len() as f64
    }

    #[test]
    fn test_exact_boosting_reduces_error() {
        let (x, y) = curve();
        let few = BoostingParams {
            n_rounds: 2,
            ..BoostingParams::default()
        };
        let many = BoostingParams {
            n_rounds: 60,
            ..BoostingParams::default()
        };
        let a = BoostedTrees::fit(x.view(), y.view(), &few).unwrap();
        let b = BoostedTrees::fit(x.view(), y.view(), &many).unwrap();

        assert_eq!(b.n_trees(), 60);
        assert!(mse(&b, &x, &y) < mse(&a, &x, &y));
        assert!(mse(&b, &x, &y) < 5.0);
    }

    #[test]
    fn test_histogram_boosting_fits_curve() {
        let (x, y) = curve();
        let params = HistBoostingParams {
            n_rounds: 60,
            max_bins: 64,
            ..HistBoostingParams::default()
        };
        let model = HistBoostedTrees::fit(x.view(), y.view(), &params).unwrap();
        assert!(mse(&model, &x, &y) < 5.0);
        assert!(model.trees.iter().all(|t| t.n_leaves() <= params.max_leaves));
    }

    #[test]
    fn test_base_score_is_target_mean() {
        let (x, y) = curve();
        let params = BoostingParams {
            n_rounds: 1,
            ..BoostingParams::default()
        };
        let model = BoostedTrees::fit(x.view(), y.view(), &params).unwrap();
        assert!((model.base_score() - y.mean().unwrap()).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_learning_rate() {
        let (x, y) = curve();
        let params = BoostingParams {
            learning_rate: 0.0,
            ..BoostingParams::default()
        };
        assert!(matches!(
            BoostedTrees::fit(x.view(), y.view(), &params),
            Err(ModelError::InvalidHyperparameter(_))
        ));
        let hist = HistBoostingParams {
            max_leaves: 1,
            ..HistBoostingParams::default()
        };
        assert!(matches!(
            HistBoostedTrees::fit(x.view(), y.view(), &hist),
            Err(ModelError::InvalidHyperparameter(_))
        ));
    }
}
