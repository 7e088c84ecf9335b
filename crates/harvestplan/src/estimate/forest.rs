//! Bagged regression trees.
//!
//! Each tree is grown to purity on a bootstrap sample of the rows, splitting
//! on the threshold that removes the most squared error. Every feature is a
//! split candidate at every node. Predictions average the trees.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use super::validation::SHUFFLE_SEED;
use crate::error::{Error, Result};

/// Trees per forest.
pub const N_TREES: usize = 100;

/// Split gains below this count as no improvement.
const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn predict(&self, row: &[f64]) -> f64 {
        let mut node = self;
        loop {
            match node {
                Self::Leaf { value } => return *value,
                Self::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let x = row.get(*feature).copied().unwrap_or(0.0);
                    node = if x <= *threshold { left } else { right };
                }
            }
        }
    }
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Sum and sum of squares, for squared error around the mean.
fn sse(sum: f64, sum_sq: f64, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = count as f64;
    (sum_sq - sum * sum / n).max(0.0)
}

/// One regression tree grown without depth limit.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTree {
    root: Node,
}

impl RegressionTree {
    /// Grow a tree on `samples` (indices into `rows`, repeats allowed).
    /// Squared-error reductions are added to `gains` per feature.
    fn grow(rows: &[Vec<f64>], targets: &[f64], samples: &[usize], gains: &mut [f64]) -> Self {
        Self {
            root: build(rows, targets, samples.to_vec(), gains),
        }
    }

    /// Predict one encoded row.
    #[must_use]
    pub fn predict(&self, row: &[f64]) -> f64 {
        self.root.predict(row)
    }
}

fn mean(targets: &[f64], samples: &[usize]) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let n = samples.len().max(1) as f64;
    samples.iter().map(|i| targets[*i]).sum::<f64>() / n
}

fn build(rows: &[Vec<f64>], targets: &[f64], samples: Vec<usize>, gains: &mut [f64]) -> Node {
    let leaf = Node::Leaf {
        value: mean(targets, &samples),
    };
    if samples.len() < 2 {
        return leaf;
    }
    let Some(best) = best_split(rows, targets, &samples, gains.len()) else {
        return leaf;
    };

    gains[best.feature] += best.gain;
    let (left, right): (Vec<usize>, Vec<usize>) = samples
        .into_iter()
        .partition(|i| rows[*i][best.feature] <= best.threshold);
    Node::Split {
        feature: best.feature,
        threshold: best.threshold,
        left: Box::new(build(rows, targets, left, gains)),
        right: Box::new(build(rows, targets, right, gains)),
    }
}

fn best_split(
    rows: &[Vec<f64>],
    targets: &[f64],
    samples: &[usize],
    width: usize,
) -> Option<BestSplit> {
    let total: f64 = samples.iter().map(|i| targets[*i]).sum();
    let total_sq: f64 = samples.iter().map(|i| targets[*i] * targets[*i]).sum();
    let parent = sse(total, total_sq, samples.len());
    if parent <= MIN_GAIN {
        return None;
    }

    let mut best: Option<BestSplit> = None;
    let mut order = samples.to_vec();
    for feature in 0..width {
        order.sort_by(|a, b| rows[*a][feature].total_cmp(&rows[*b][feature]));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for k in 0..order.len() - 1 {
            let y = targets[order[k]];
            left_sum += y;
            left_sq += y * y;

            let here = rows[order[k]][feature];
            let next = rows[order[k + 1]][feature];
            if here >= next {
                continue;
            }
            let left_n = k + 1;
            let children = sse(left_sum, left_sq, left_n)
                + sse(total - left_sum, total_sq - left_sq, order.len() - left_n);
            let gain = parent - children;
            if gain > MIN_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
                best = Some(BestSplit {
                    feature,
                    threshold: (here + next) / 2.0,
                    gain,
                });
            }
        }
    }
    best
}

/// A fitted random forest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RandomForest {
    #[serde(skip)]
    trees: Vec<RegressionTree>,
    /// Share of squared-error reduction per encoded column, summing to 1
    /// (all zero when no tree could split).
    pub importances: Vec<f64>,
}

impl RandomForest {
    /// Fit [`N_TREES`] trees on bootstrap samples drawn with a fixed seed.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no rows or rows and targets differ in
    /// length.
    pub fn fit(rows: &[Vec<f64>], targets: &[f64]) -> Result<Self> {
        Self::fit_with(rows, targets, N_TREES)
    }

    /// Fit a forest of `n_trees` trees.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no rows, no trees were requested, or
    /// rows and targets differ in length.
    pub fn fit_with(rows: &[Vec<f64>], targets: &[f64], n_trees: usize) -> Result<Self> {
        if rows.is_empty() || n_trees == 0 {
            return Err(Error::insufficient_data(format!(
                "random forest needs rows and trees, got {} rows and {n_trees} trees",
                rows.len()
            )));
        }
        if rows.len() != targets.len() {
            return Err(Error::internal(format!(
                "{} rows but {} targets",
                rows.len(),
                targets.len()
            )));
        }

        let n = rows.len();
        let width = rows[0].len();
        let mut rng = StdRng::seed_from_u64(SHUFFLE_SEED);
        let mut importances = vec![0.0; width];
        let mut trees = Vec::with_capacity(n_trees);
        for _ in 0..n_trees {
            let sample: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
            let mut gains = vec![0.0; width];
            trees.push(RegressionTree::grow(rows, targets, &sample, &mut gains));

            let tree_total: f64 = gains.iter().sum();
            if tree_total > 0.0 {
                for (acc, g) in importances.iter_mut().zip(&gains) {
                    *acc += g / tree_total;
                }
            }
        }

        let sum: f64 = importances.iter().sum();
        if sum > 0.0 {
            for v in &mut importances {
                *v /= sum;
            }
        }
        Ok(Self { trees, importances })
    }

    /// Mean prediction of the trees.
    #[must_use]
    pub fn predict(&self, row: &[f64]) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let n = self.trees.len().max(1) as f64;
        self.trees.iter().map(|t| t.predict(row)).sum::<f64>() / n
    }

    /// Number of trees.
    #[must_use]
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    /// Whether the forest has no trees.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_fits_step_exactly() {
        let rows = vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0]];
        let targets = [10.0, 10.0, 30.0, 30.0];
        let mut gains = vec![0.0];
        let tree = RegressionTree::grow(&rows, &targets, &[0, 1, 2, 3], &mut gains);

        assert_eq!(tree.predict(&[1.5]), 10.0);
        assert_eq!(tree.predict(&[3.5]), 30.0);
        // threshold halfway between 2 and 3
        assert_eq!(tree.predict(&[2.5]), 10.0);
        assert_eq!(tree.predict(&[2.6]), 30.0);
        // 4 * 100 squared error removed by the single split
        assert!((gains[0] - 400.0).abs() < 1e-9);
    }

    #[test]
    fn test_tree_constant_target_is_leaf() {
        let rows = vec![vec![1.0], vec![2.0]];
        let mut gains = vec![0.0];
        let tree = RegressionTree::grow(&rows, &[5.0, 5.0], &[0, 1], &mut gains);
        assert_eq!(tree.root, Node::Leaf { value: 5.0 });
        assert_eq!(gains[0], 0.0);
    }

    #[test]
    fn test_tree_identical_rows_do_not_split() {
        let rows = vec![vec![1.0], vec![1.0]];
        let mut gains = vec![0.0];
        let tree = RegressionTree::grow(&rows, &[2.0, 4.0], &[0, 1], &mut gains);
        assert_eq!(tree.predict(&[1.0]), 3.0);
    }

    #[test]
    fn test_forest_importance_favors_informative_column() {
        // column 0 decides the target, column 1 is noise
        let rows: Vec<Vec<f64>> = (0..20)
            .map(|i| vec![f64::from(i % 2), f64::from((i * 7) % 5)])
            .collect();
        let targets: Vec<f64> = rows.iter().map(|r| 100.0 * r[0] + 5.0).collect();

        let forest = RandomForest::fit(&rows, &targets).unwrap();
        assert_eq!(forest.len(), N_TREES);
        assert!((forest.importances.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(forest.importances[0] > 0.99);

        assert!((forest.predict(&[1.0, 3.0]) - 105.0).abs() < 1e-9);
        assert!((forest.predict(&[0.0, 1.0]) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_forest_is_reproducible() {
        let rows: Vec<Vec<f64>> = (0..12).map(|i| vec![f64::from(i)]).collect();
        let targets: Vec<f64> = (0..12).map(|i| f64::from(i * i)).collect();
        let a = RandomForest::fit_with(&rows, &targets, 10).unwrap();
        let b = RandomForest::fit_with(&rows, &targets, 10).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_forest_prediction_within_target_range() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![f64::from(i)]).collect();
        let targets: Vec<f64> = (0..10).map(|i| f64::from(i) * 3.0).collect();
        let forest = RandomForest::fit_with(&rows, &targets, 25).unwrap();

        for x in [-5.0, 0.0, 4.5, 20.0] {
            let p = forest.predict(&[x]);
            assert!((0.0..=27.0).contains(&p), "prediction {p} for {x}");
        }
    }

    #[test]
    fn test_forest_rejects_bad_input() {
        assert!(RandomForest::fit(&[], &[]).is_err());
        assert!(RandomForest::fit(&[vec![1.0]], &[1.0, 2.0]).is_err());
        assert!(RandomForest::fit_with(&[vec![1.0]], &[1.0], 0).is_err());
    }
}
