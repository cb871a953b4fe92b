//! Trainer configuration

use feature_engine::{NormalizationMethod, DEFAULT_LOOKBACK, DEFAULT_TARGET};
use regressors::{BoostingParams, ForestParams, HistBoostingParams, ModelSpec, RidgeParams};
use serde::{Deserialize, Serialize};

/// Training window, split and candidate hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Past rows flattened into one model input
    pub lookback: usize,

    /// Column predicted one step ahead
    pub target: String,

    /// Leading share of samples used for fitting; the rest is held out
    pub train_fraction: f64,

    /// History pulled when the caller does not name a window
    pub default_days: u32,

    pub normalization: NormalizationMethod,

    /// Seed for every randomized candidate
    pub seed: u64,

    pub ridge: RidgeParams,
    pub random_forest: ForestParams,
    pub gradient_boosting: BoostingParams,
    pub hist_gradient_boosting: HistBoostingParams,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            lookback: DEFAULT_LOOKBACK,
            target: DEFAULT_TARGET.to_string(),
            train_fraction: 0.8,
            default_days: 30,
            normalization: NormalizationMethod::ZScore,
            seed: 42,
            ridge: RidgeParams::default(),
            random_forest: ForestParams::default(),
            gradient_boosting: BoostingParams::default(),
            hist_gradient_boosting: HistBoostingParams::default(),
        }
    }
}

impl TrainerConfig {
    /// One candidate per model family, in family order
    pub fn candidates(&self) -> Vec<ModelSpec> {
        vec![
            ModelSpec::Ridge(self.ridge),
            ModelSpec::RandomForest(ForestParams {
                seed: self.seed,
                ..self.random_forest
            }),
            ModelSpec::GradientBoosting(self.gradient_boosting),
            ModelSpec::HistGradientBoosting(self.hist_gradient_boosting),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regressors::ModelFamily;

    #[test]
    fn test_defaults() {
        let config = TrainerConfig::default();
        assert_eq!(config.lookback, 24);
        assert_eq!(config.target, "aqi");
        assert_eq!(config.train_fraction, 0.8);
        assert_eq!(config.random_forest.n_estimators, 100);
        assert_eq!(config.hist_gradient_boosting.max_leaves, 31);
    }

    #[test]
    fn test_candidates_cover_every_family() {
        let families: Vec<ModelFamily> = TrainerConfig::default()
            .candidates()
            .iter()
            .map(|c| c.family())
            .collect();
        assert_eq!(families, ModelFamily::ALL.to_vec());
    }

    #[test]
    fn test_seed_reaches_the_forest() {
        let config = TrainerConfig {
            seed: 7,
            ..TrainerConfig::default()
        };
        match config.candidates()[1] {
            ModelSpec::RandomForest(p) => assert_eq!(p.seed, 7),
            other => panic!("unexpected candidate {:?}", other),
        }
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config: TrainerConfig =
            serde_json::from_str(r#"{"lookback": 6, "normalization": "min_max"}"#).unwrap();
        assert_eq!(config.lookback, 6);
        assert_eq!(config.normalization, NormalizationMethod::MinMax);
        assert_eq!(config.default_days, 30);
    }
}
