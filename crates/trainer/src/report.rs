//! Training Report

use chrono::{DateTime, Utc};
use regressors::{EvaluationMetrics, ModelFamily};
use serde::{Deserialize, Serialize};

/// A candidate that trained, evaluated and was persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedCandidate {
    pub family: ModelFamily,
    /// Registry name the candidate was stored under
    pub name: String,
    pub version: u32,
    pub metrics: EvaluationMetrics,
}

/// Outcome of one candidate. A failure never aborts the other candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CandidateOutcome {
    Trained(TrainedCandidate),
    Failed { family: ModelFamily, reason: String },
}

impl CandidateOutcome {
    pub fn family(&self) -> ModelFamily {
        match self {
            CandidateOutcome::Trained(c) => c.family,
            CandidateOutcome::Failed { family, .. } => *family,
        }
    }

    pub fn trained(&self) -> Option<&TrainedCandidate> {
        match self {
            CandidateOutcome::Trained(c) => Some(c),
            CandidateOutcome::Failed { .. } => None,
        }
    }
}

/// The lowest-RMSE candidate and its `best_model` alias version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestModel {
    pub candidate: TrainedCandidate,
    pub alias: String,
    pub alias_version: u32,
}

/// Result of one `train_all_models` run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub trained_at: DateTime<Utc>,
    pub window_days: u32,
    pub train_rows: usize,
    pub test_rows: usize,
    pub candidates: Vec<CandidateOutcome>,
    /// `None` when every candidate failed
    pub best: Option<BestModel>,
}

impl TrainingReport {
    pub fn trained(&self) -> impl Iterator<Item = &TrainedCandidate> {
        self.candidates.iter().filter_map(CandidateOutcome::trained)
    }

    pub fn failed_count(&self) -> usize {
        self.candidates.len() - self.trained().count()
    }
}

/// Lowest RMSE wins; ties keep the earlier item
pub(crate) fn select_best<T>(items: impl IntoIterator<Item = T>, rmse: impl Fn(&T) -> f64) -> Option<T> {
    items.into_iter().fold(None, |best, item| match best {
        Some(b) if rmse(&b) <= rmse(&item) => Some(b),
        _ => Some(item),
    })
}
