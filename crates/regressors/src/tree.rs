//! Regression Trees over Gradient Statistics
//!
//! A leaf predicts `-G / (H + lambda)` and a split scores
//! `0.5 * (GL²/(HL+λ) + GR²/(HR+λ) - G²/(H+λ))`. With squared error the
//! gradients are `prediction - y` and every hessian is 1, so an
//! unregularized leaf is the mean residual of its rows.

use crate::error::ModelError;
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Smallest score improvement accepted as a split
const MIN_GAIN: f64 = 1e-12;

/// One node of a flattened tree. Children always sit after their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        /// Rows with `x[feature] <= threshold` go left
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Binary regression tree stored as a node arena rooted at index 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    pub(crate) fn from_nodes(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Check structural soundness of a decoded tree
    pub(crate) fn validate(&self, n_features: usize) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::Serialization("empty tree".into()));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature,
                left,
                right,
                ..
            } = node
            {
                let children_ok = *left > idx
                    && *right > idx
                    && *left < self.nodes.len()
                    && *right < self.nodes.len();
                if !children_ok || *feature >= n_features {
                    return Err(ModelError::Serialization(format!("corrupt tree node {idx}")));
                }
            }
        }
        Ok(())
    }
}

/// Growth limits and regularization for the leaf-wise builder
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// L2 penalty on leaf weights
    pub lambda: f64,
}

impl TreeParams {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            min_samples_split: 2,
            min_samples_leaf: 1,
            lambda: 0.0,
        }
    }
}

pub(crate) fn leaf_weight(g: f64, h: f64, lambda: f64) -> f64 {
    let denom = h + lambda;
    if denom > 0.0 {
        -g / denom
    } else {
        0.0
    }
}

fn score(g: f64, h: f64, lambda: f64) -> f64 {
    let denom = h + lambda;
    if denom > 0.0 {
        g * g / denom
    } else {
        0.0
    }
}

/// Gain of splitting a node with totals (g, h) into (gl, hl) and the rest
pub(crate) fn split_gain(gl: f64, hl: f64, g: f64, h: f64, lambda: f64) -> f64 {
    let (gr, hr) = (g - gl, h - hl);
    0.5 * (score(gl, hl, lambda) + score(gr, hr, lambda) - score(g, h, lambda))
}

pub(crate) fn gradient_sums(rows: &[usize], grad: &[f64], hess: &[f64]) -> (f64, f64) {
    rows.iter()
        .fold((0.0, 0.0), |(g, h), &r| (g + grad[r], h + hess[r]))
}

pub(crate) fn is_better(gain: f64, best: Option<f64>) -> bool {
    gain > MIN_GAIN && best.map_or(true, |b| gain > b)
}
