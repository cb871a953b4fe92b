//! Windowed Statistics over Gappy Series
//!
//! Series are `Option<f64>` so that "not enough history" stays distinct from
//! a real zero until the frame is filled.

/// Summary statistics for one window of values
#[derive(Debug, Clone, Default)]
pub struct WindowStatistics {
    /// Number of values
    pub count: usize,
    /// Mean value
    pub mean: f64,
    /// Sample standard deviation (n - 1 denominator)
    pub std_dev: f64,
    /// Minimum value
    pub min: f64,
    /// Maximum value
    pub max: f64,
}

impl WindowStatistics {
    /// Compute statistics from a slice of values
    pub fn compute(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let min = values.iter().cloned().fold(f64::MAX, f64::min);
        let max = values.iter().cloned().fold(f64::MIN, f64::max);

        let std_dev = if values.len() >= 2 {
            let m2: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
            (m2 / (n - 1.0)).sqrt()
        } else {
            0.0
        };

        Self {
            count: values.len(),
            mean,
            std_dev,
            min,
            max,
        }
    }
}

/// Value `k` samples earlier; undefined for the first `k` samples
pub fn lag(series: &[Option<f64>], k: usize) -> Vec<Option<f64>> {
    (0..series.len())
        .map(|i| if i >= k { series[i - k] } else { None })
        .collect()
}

/// First difference; undefined at the first sample or next to a gap
pub fn diff(series: &[Option<f64>]) -> Vec<Option<f64>> {
    (0..series.len())
        .map(|i| match (i.checked_sub(1).and_then(|p| series[p]), series[i]) {
            (Some(prev), Some(curr)) => Some(curr - prev),
            _ => None,
        })
        .collect()
}

/// Trailing-window statistic, defined once a full window of values exists
fn rolling(
    series: &[Option<f64>],
    window: usize,
    stat: impl Fn(&WindowStatistics) -> f64,
) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; series.len()];
    }

    (0..series.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            let values: Option<Vec<f64>> = series[i + 1 - window..=i].iter().copied().collect();
            values.map(|v| stat(&WindowStatistics::compute(&v)))
        })
        .collect()
}

/// Trailing mean over `window` samples
pub fn rolling_mean(series: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(series, window, |s| s.mean)
}

/// Trailing sample standard deviation over `window` samples
pub fn rolling_std(series: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(series, window, |s| s.std_dev)
}

/// Forward-fill then backward-fill gaps. A series with no defined value at
/// all becomes zeros.
pub fn fill_forward_backward(series: &[Option<f64>]) -> Vec<f64> {
    let mut filled: Vec<Option<f64>> = Vec::with_capacity(series.len());
    let mut last = None;
    for value in series {
        if value.is_some() {
            last = *value;
        }
        filled.push(last);
    }

    let mut next = None;
    for value in filled.iter_mut().rev() {
        if value.is_some() {
            next = *value;
        } else {
            *value = next;
        }
    }

    filled.into_iter().map(|v| v.unwrap_or(0.0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn test_mean_computation() {
        let stats = WindowStatistics::compute(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!((stats.mean - 3.0).abs() < 0.001);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 5.0);
    }

    #[test]
    fn test_sample_std_dev() {
        let stats = WindowStatistics::compute(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((stats.std_dev - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_empty_values() {
        let stats = WindowStatistics::compute(&[]);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.mean, 0.0);
    }

    #[test]
    fn test_lag_and_diff() {
        let series = some(&[1.0, 3.0, 6.0]);
        assert_eq!(lag(&series, 1), vec![None, Some(1.0), Some(3.0)]);
        assert_eq!(lag(&series, 5), vec![None, None, None]);
        assert_eq!(diff(&series), vec![None, Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_diff_next_to_gap() {
        let series = vec![Some(1.0), None, Some(4.0)];
        assert_eq!(diff(&series), vec![None, None, None]);
    }

    #[test]
    fn test_rolling_defined_after_full_window() {
        let series = some(&[1.0, 2.0, 3.0, 4.0]);
        let means = rolling_mean(&series, 3);
        assert_eq!(means, vec![None, None, Some(2.0), Some(3.0)]);
        let stds = rolling_std(&series, 3);
        assert_eq!(stds[2], Some(1.0));
    }

    #[test]
    fn test_rolling_undefined_over_gap() {
        let series = vec![Some(1.0), None, Some(3.0), Some(4.0)];
        let means = rolling_mean(&series, 2);
        assert_eq!(means, vec![None, None, None, Some(3.5)]);
    }

    #[test]
    fn test_fill_forward_then_backward() {
        let series = vec![None, None, Some(2.0), None, Some(5.0), None];
        assert_eq!(fill_forward_backward(&series), vec![2.0, 2.0, 2.0, 2.0, 5.0, 5.0]);
    }

    #[test]
    fn test_fill_all_missing() {
        assert_eq!(fill_forward_backward(&[None, None]), vec![0.0, 0.0]);
    }
}
