//! Bagged ensemble of single-feature regression trees
//!
//! Each tree is grown on a bootstrap resample of the training pairs. Leaves
//! hold a local least-squares line (a constant when the leaf has a single
//! distinct x). Every tree prediction is clamped to the range of the training
//! targets, so the ensemble never leaves the observed price band however far
//! past the data it is asked to predict.

use super::{check_inputs, FitError, LinearTrend};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Forest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees in the forest
    pub n_trees: usize,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Minimum samples to split a node
    pub min_samples_split: usize,
    /// Minimum samples in a leaf
    pub min_samples_leaf: usize,
    /// Base seed; tree `i` resamples with `seed + i`
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 6,
            min_samples_split: 20,
            min_samples_leaf: 10,
            seed: 42,
        }
    }
}

impl ForestConfig {
    fn validate(&self) -> Result<(), FitError> {
        if self.n_trees == 0 {
            return Err(FitError::InvalidConfig("n_trees must be positive"));
        }
        if self.min_samples_leaf == 0 {
            return Err(FitError::InvalidConfig("min_samples_leaf must be positive"));
        }
        if self.min_samples_split < 2 * self.min_samples_leaf {
            return Err(FitError::InvalidConfig(
                "min_samples_split must fit two leaves",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Leaf {
    Constant(f64),
    Linear(LinearTrend),
}

impl Leaf {
    fn from_samples(samples: &[(f64, f64)]) -> Self {
        let xs: Vec<f64> = samples.iter().map(|s| s.0).collect();
        let ys: Vec<f64> = samples.iter().map(|s| s.1).collect();
        match LinearTrend::fit(&xs, &ys) {
            Ok(line) => Leaf::Linear(line),
            // Single distinct x in the leaf
            Err(_) => Leaf::Constant(ys.iter().sum::<f64>() / ys.len().max(1) as f64),
        }
    }

    fn predict(&self, x: f64) -> f64 {
        match self {
            Leaf::Constant(value) => *value,
            Leaf::Linear(line) => line.predict(x),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf(Leaf),
    Split {
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegressionTree {
    root: Node,
}

impl RegressionTree {
    /// Grow a tree over samples sorted by x
    fn grow(samples: &[(f64, f64)], config: &ForestConfig) -> Self {
        Self {
            root: build_node(samples, 0, config),
        }
    }

    fn predict(&self, x: f64) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf(leaf) => return leaf.predict(x),
                Node::Split {
                    threshold,
                    left,
                    right,
                } => node = if x <= *threshold { left } else { right },
            }
        }
    }
}

fn build_node(samples: &[(f64, f64)], depth: usize, config: &ForestConfig) -> Node {
    if depth >= config.max_depth || samples.len() < config.min_samples_split {
        return Node::Leaf(Leaf::from_samples(samples));
    }

    match best_split(samples, config.min_samples_leaf) {
        Some(k) => {
            let threshold = (samples[k - 1].0 + samples[k].0) / 2.0;
            let (left, right) = samples.split_at(k);
            Node::Split {
                threshold,
                left: Box::new(build_node(left, depth + 1, config)),
                right: Box::new(build_node(right, depth + 1, config)),
            }
        }
        None => Node::Leaf(Leaf::from_samples(samples)),
    }
}

/// Index `k` minimising the summed squared error of `[..k]` and `[k..]`.
///
/// Only cuts between distinct x values qualify, and only if they strictly
/// reduce the parent's error.
fn best_split(samples: &[(f64, f64)], min_leaf: usize) -> Option<usize> {
    let n = samples.len();
    if n < 2 * min_leaf {
        return None;
    }

    let total_sum: f64 = samples.iter().map(|s| s.1).sum();
    let total_sq: f64 = samples.iter().map(|s| s.1 * s.1).sum();
    let sse = |sum: f64, sq: f64, count: usize| sq - sum * sum / count as f64;

    let parent_error = sse(total_sum, total_sq, n);
    let mut best: Option<(usize, f64)> = None;
    let (mut left_sum, mut left_sq) = (0.0, 0.0);

    for k in 1..n {
        let y = samples[k - 1].1;
        left_sum += y;
        left_sq += y * y;

        if k < min_leaf || n - k < min_leaf || samples[k - 1].0 == samples[k].0 {
            continue;
        }

        let error = sse(left_sum, left_sq, k)
            + sse(total_sum - left_sum, total_sq - left_sq, n - k);
        if best.map_or(true, |(_, e)| error < e) {
            best = Some((k, error));
        }
    }

    best.filter(|&(_, error)| error < parent_error - 1e-12)
        .map(|(k, _)| k)
}

/// Bootstrap-aggregated regression forest over one input feature
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    config: ForestConfig,
    trees: Vec<RegressionTree>,
    /// (min, max) of the training targets
    target_range: (f64, f64),
}

impl RandomForest {
    /// Grow `config.n_trees` trees. Deterministic for a given seed.
    pub fn fit(xs: &[f64], ys: &[f64], config: ForestConfig) -> Result<Self, FitError> {
        config.validate()?;
        check_inputs(xs, ys, 2)?;

        let pairs: Vec<(f64, f64)> = xs.iter().copied().zip(ys.iter().copied()).collect();
        let n = pairs.len();
        let target_range = ys
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &y| {
                (lo.min(y), hi.max(y))
            });

        let trees: Vec<RegressionTree> = (0..config.n_trees)
            .into_par_iter()
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(i as u64));
                let mut sample: Vec<(f64, f64)> =
                    (0..n).map(|_| pairs[rng.gen_range(0..n)]).collect();
                sample.sort_by(|a, b| a.0.total_cmp(&b.0));
                RegressionTree::grow(&sample, &config)
            })
            .collect();

        Ok(Self {
            config,
            trees,
            target_range,
        })
    }

    /// Mean of the per-tree predictions, each clamped to the training range
    pub fn predict(&self, x: f64) -> f64 {
        let (lo, hi) = self.target_range;
        let sum: f64 = self.trees.iter().map(|t| t.predict(x).clamp(lo, hi)).sum();
        sum / self.trees.len() as f64
    }

    /// Smallest and largest training target
    pub fn target_range(&self) -> (f64, f64) {
        self.target_range
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trend_data(n: usize, slope: f64) -> (Vec<f64>, Vec<f64>) {
        let xs: Vec<f64> = (0..n).map(|i| 738_000.0 + i as f64).collect();
        let ys: Vec<f64> = (0..n).map(|i| 100.0 + slope * i as f64).collect();
        (xs, ys)
    }

    #[test]
    fn test_forest_fits_in_range() {
        let (xs, ys) = trend_data(200, 0.5);
        let forest = RandomForest::fit(&xs, &ys, ForestConfig::default()).unwrap();

        assert_eq!(forest.n_trees(), 100);
        let mid = forest.predict(738_100.0);
        assert!((mid - 150.0).abs() < 1.0, "mid = {mid}");
    }

    #[test]
    fn test_forest_is_deterministic() {
        let xs: Vec<f64> = (0..120).map(|i| i as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|x| (x * 0.3).sin() * 10.0 + x).collect();

        let a = RandomForest::fit(&xs, &ys, ForestConfig::default()).unwrap();
        let b = RandomForest::fit(&xs, &ys, ForestConfig::default()).unwrap();
        for x in [0.0, 17.5, 60.0, 119.0, 200.0] {
            assert_eq!(a.predict(x), b.predict(x));
        }
    }

    #[test]
    fn test_rising_trend_holds_last_value_past_training_range() {
        let (xs, ys) = trend_data(100, 0.4);
        let forest = RandomForest::fit(&xs, &ys, ForestConfig::default()).unwrap();

        let last = ys[ys.len() - 1];
        assert_eq!(forest.target_range(), (100.0, last));
        for ahead in [1.0, 30.0, 365.0] {
            let value = forest.predict(xs[xs.len() - 1] + ahead);
            assert!((value - last).abs() < 1e-9, "+{ahead}: {value}");
        }
    }

    #[test]
    fn test_sharp_reversal_stays_within_training_range() {
        // 200 days rising 100 -> 160, then 20 days falling 4% a day
        let mut ys: Vec<f64> = (0..200).map(|i| 100.0 + 60.0 * i as f64 / 199.0).collect();
        for _ in 0..20 {
            let next = ys[ys.len() - 1] * 0.96;
            ys.push(next);
        }
        let xs: Vec<f64> = (0..ys.len()).map(|i| 738_000.0 + i as f64).collect();
        let forest = RandomForest::fit(&xs, &ys, ForestConfig::default()).unwrap();

        let (lo, hi) = forest.target_range();
        let last_x = xs[xs.len() - 1];
        for ahead in [-300.0, 1.0, 30.0, 180.0, 365.0, 5_000.0] {
            let value = forest.predict(last_x + ahead);
            assert!(value >= lo && value <= hi, "+{ahead}: {value} outside [{lo}, {hi}]");
        }
        assert!((forest.predict(last_x + 365.0) - lo).abs() < 1.0);
    }

    #[test]
    fn test_constant_target_predicts_constant() {
        let xs: Vec<f64> = (0..60).map(|i| i as f64).collect();
        let ys = vec![42.0; 60];
        let forest = RandomForest::fit(&xs, &ys, ForestConfig::default()).unwrap();
        assert!((forest.predict(30.0) - 42.0).abs() < 1e-9);
        assert!((forest.predict(500.0) - 42.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let (xs, ys) = trend_data(50, 1.0);
        let config = ForestConfig {
            n_trees: 0,
            ..Default::default()
        };
        assert!(matches!(
            RandomForest::fit(&xs, &ys, config),
            Err(FitError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_split_only_between_distinct_values() {
        let samples: Vec<(f64, f64)> = (0..20)
            .map(|i| (if i < 10 { 1.0 } else { 2.0 }, if i < 10 { 0.0 } else { 10.0 }))
            .collect();
        assert_eq!(best_split(&samples, 5), Some(10));

        let flat: Vec<(f64, f64)> = (0..20).map(|_| (1.0, 3.0)).collect();
        assert_eq!(best_split(&flat, 5), None);
    }
}
