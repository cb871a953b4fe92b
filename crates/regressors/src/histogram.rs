//! Histogram Binning and Leaf-wise Tree Growth

use crate::tree::{gradient_sums, is_better, leaf_weight, split_gain, Node, RegressionTree, TreeParams};
use ndarray::ArrayView2;

/// Upper limit on bins per feature (bin ids are stored as `u8`)
pub const MAX_BINS: usize = 256;

/// Per-feature quantile cut points learned from training data.
///
/// A value falls into bin `b` when `thresholds[b - 1] < value <= thresholds[b]`,
/// so a split "bin <= b" is the same as "value <= thresholds[b]" and the
/// resulting tree can be evaluated on raw values.
#[derive(Debug, Clone)]
pub(crate) struct BinMapper {
    thresholds: Vec<Vec<f64>>,
}

impl BinMapper {
    pub fn fit(x: ArrayView2<'_, f64>, max_bins: usize) -> Self {
        let max_bins = max_bins.clamp(2, MAX_BINS);
        let thresholds = x
            .columns()
            .into_iter()
            .map(|column| {
                let mut sorted: Vec<f64> = column.to_vec();
                sorted.sort_by(|a, b| a.total_cmp(b));
                let mut distinct = sorted.clone();
                distinct.dedup();

                if distinct.len() <= max_bins {
                    distinct.windows(2).map(|w| w[0] + (w[1] - w[0]) / 2.0).collect()
                } else {
                    let n = sorted.len();
                    let top = sorted[n - 1];
                    let mut cuts: Vec<f64> = Vec::with_capacity(max_bins - 1);
                    for k in 1..max_bins {
                        let q = sorted[k * n / max_bins];
                        if q < top && cuts.last().map_or(true, |last| q > *last) {
                            cuts.push(q);
                        }
                    }
                    cuts
                }
            })
            .collect();

        Self { thresholds }
    }

    pub fn n_bins(&self, feature: usize) -> usize {
        self.thresholds[feature].len() + 1
    }

    pub fn threshold(&self, feature: usize, bin: usize) -> f64 {
        self.thresholds[feature][bin]
    }

    pub fn bin(&self, feature: usize, value: f64) -> u8 {
        self.thresholds[feature].partition_point(|t| *t < value) as u8
    }

    pub fn transform(&self, x: ArrayView2<'_, f64>) -> BinnedMatrix {
        let n_features = x.ncols();
        let mut bins = Vec::with_capacity(x.nrows() * n_features);
        for row in x.rows() {
            for (feature, value) in row.iter().enumerate() {
                bins.push(self.bin(feature, *value));
            }
        }
        BinnedMatrix { bins, n_features }
    }
}

/// Row-major matrix of bin ids
pub(crate) struct BinnedMatrix {
    bins: Vec<u8>,
    n_features: usize,
}

impl BinnedMatrix {
    fn get(&self, row: usize, feature: usize) -> usize {
        self.bins[row * self.n_features + feature] as usize
    }
}

#[derive(Debug, Clone, Copy)]
struct BinSplit {
    feature: usize,
    bin: usize,
    gain: f64,
}

struct OpenLeaf {
    node: usize,
    rows: Vec<usize>,
    depth: usize,
    split: Option<BinSplit>,
}

#[derive(Clone, Copy, Default)]
struct Bucket {
    g: f64,
    h: f64,
    count: usize,
}

#[allow(clippy::too_many_arguments)]
fn best_bin_split(
    binned: &BinnedMatrix,
    mapper: &BinMapper,
    grad: &[f64],
    hess: &[f64],
    rows: &[usize],
    g_total: f64,
    h_total: f64,
    params: &TreeParams,
) -> Option<BinSplit> {
    let mut best: Option<BinSplit> = None;

    for feature in 0..binned.n_features {
        let n_bins = mapper.n_bins(feature);
        if n_bins < 2 {
            continue;
        }

        let mut histogram = vec![Bucket::default(); n_bins];
        for &r in rows {
            let bucket = &mut histogram[binned.get(r, feature)];
            bucket.g += grad[r];
            bucket.h += hess[r];
            bucket.count += 1;
        }

        let (mut gl, mut hl, mut nl) = (0.0, 0.0, 0usize);
        for (bin, bucket) in histogram.iter().enumerate().take(n_bins - 1) {
            gl += bucket.g;
            hl += bucket.h;
            nl += bucket.count;
            if bucket.count == 0 {
                continue;
            }
            let min_leaf = params.min_samples_leaf.max(1);
            if nl < min_leaf || rows.len() - nl < min_leaf {
                continue;
            }

            let gain = split_gain(gl, hl, g_total, h_total, params.lambda);
            if is_better(gain, best.map(|b| b.gain)) {
                best = Some(BinSplit { feature, bin, gain });
            }
        }
    }

    best
}

/// Grow a tree best-first: always split the open leaf with the largest gain,
/// until `max_leaves` leaves exist or no leaf can improve.
pub(crate) fn grow_leafwise(
    binned: &BinnedMatrix,
    mapper: &BinMapper,
    grad: &[f64],
    hess: &[f64],
    params: &TreeParams,
    max_leaves: usize,
) -> RegressionTree {
    let all_rows: Vec<usize> = (0..grad.len()).collect();
    let mut nodes = vec![Node::Leaf { value: 0.0 }];

    let open = |nodes: &mut Vec<Node>, node: usize, rows: Vec<usize>, depth: usize| {
        let (g, h) = gradient_sums(&rows, grad, hess);
        nodes[node] = Node::Leaf {
            value: leaf_weight(g, h, params.lambda),
        };
        let split = if depth < params.max_depth && rows.len() >= params.min_samples_split.max(2) {
            best_bin_split(binned, mapper, grad, hess, &rows, g, h, params)
        } else {
            None
        };
        OpenLeaf {
            node,
            rows,
            depth,
            split,
        }
    };

    let mut leaves = vec![open(&mut nodes, 0, all_rows, 0)];
    let mut n_leaves = 1;

    while n_leaves < max_leaves.max(1) {
        let Some(pos) = leaves
            .iter()
            .enumerate()
            .filter_map(|(i, leaf)| leaf.split.map(|s| (i, s.gain)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
        else {
            break;
        };

        let leaf = leaves.swap_remove(pos);
        let Some(split) = leaf.split else {
            break;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = leaf
            .rows
            .iter()
            .partition(|&&r| binned.get(r, split.feature) <= split.bin);

        let left = nodes.len();
        let right = left + 1;
        nodes.push(Node::Leaf { value: 0.0 });
        nodes.push(Node::Leaf { value: 0.0 });
        nodes[leaf.node] = Node::Split {
            feature: split.feature,
            threshold: mapper.threshold(split.feature, split.bin),
            left,
            right,
        };

        leaves.push(open(&mut nodes, left, left_rows, leaf.depth + 1));
        leaves.push(open(&mut nodes, right, right_rows, leaf.depth + 1));
        n_leaves += 1;
    }

    RegressionTree::from_nodes(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn test_few_distinct_values_get_midpoint_cuts() {
        let x = array![[1.0], [3.0], [3.0], [5.0]];
        let mapper = BinMapper::fit(x.view(), 255);
        assert_eq!(mapper.n_bins(0), 3);
        assert_eq!(mapper.threshold(0, 0), 2.0);
        assert_eq!(mapper.bin(0, 1.0), 0);
        assert_eq!(mapper.bin(0, 3.0), 1);
        assert_eq!(mapper.bin(0, 9.0), 2);
    }

    #[test]
    fn test_quantile_cuts_respect_bin_limit() {
        let x = Array2::from_shape_fn((1000, 1), |(i, _)| i as f64);
        let mapper = BinMapper::fit(x.view(), 16);
        assert!(mapper.n_bins(0) <= 16);
        let binned = mapper.transform(x.view());
        // bins are monotone in the value
        for r in 1..1000 {
            assert!(binned.get(r, 0) >= binned.get(r - 1, 0));
        }
        // bin split and raw threshold agree
        for r in 0..1000 {
            let b = binned.get(r, 0);
            if b < mapper.n_bins(0) - 1 {
                assert!(x[(r, 0)] <= mapper.threshold(0, b));
            }
        }
    }

    #[test]
    fn test_constant_column_has_one_bin() {
        let x = array![[4.0], [4.0], [4.0]];
        assert_eq!(BinMapper::fit(x.view(), 255).n_bins(0), 1);
    }

    #[test]
    fn test_leafwise_respects_leaf_budget() {
        let x = Array2::from_shape_fn((64, 2), |(i, j)| (i * (j + 1)) as f64);
        let grad: Vec<f64> = (0..64).map(|i| -((i % 9) as f64)).collect();
        let hess = vec![1.0; 64];
        let mapper = BinMapper::fit(x.view(), 255);
        let binned = mapper.transform(x.view());

        let tree = grow_leafwise(&binned, &mapper, &grad, &hess, &TreeParams::new(10), 5);
        assert!(tree.n_leaves() <= 5);
        assert!(tree.n_leaves() > 1);
    }

    #[test]
    fn test_leafwise_step_function() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let grad = [-5.0, -5.0, -5.0, -20.0, -20.0, -20.0];
        let hess = [1.0; 6];
        let mapper = BinMapper::fit(x.view(), 255);
        let binned = mapper.transform(x.view());

        let tree = grow_leafwise(&binned, &mapper, &grad, &hess, &TreeParams::new(6), 31);
        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.predict_row(array![2.0].view()), 5.0);
        assert_eq!(tree.predict_row(array![11.5].view()), 20.0);
    }
}
