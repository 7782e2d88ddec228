//! CART classification tree
//!
//! Gini-impurity splits on continuous features; leaves keep the class
//! distribution of the samples that reached them.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Tree node
#[derive(Debug, Clone)]
pub enum DecisionNode {
    Leaf {
        /// Class probabilities, indexed by class id
        distribution: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<DecisionNode>,
        right: Box<DecisionNode>,
    },
}

#[derive(Debug, Clone)]
pub struct DecisionTree {
    root: Option<DecisionNode>,
    max_depth: usize,
    min_samples_split: usize,
    /// Features considered per split; `None` means all
    max_features: Option<usize>,
    n_classes: usize,
    n_nodes: usize,
    importances: Vec<f64>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    impurity: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

impl DecisionTree {
    pub fn new(max_depth: usize, min_samples_split: usize) -> Self {
        Self {
            root: None,
            max_depth,
            min_samples_split: min_samples_split.max(2),
            max_features: None,
            n_classes: 0,
            n_nodes: 0,
            importances: Vec::new(),
        }
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features.max(1));
        self
    }

    /// Fit on the rows of `x` selected by `indices` (repeats allowed).
    pub fn fit(
        &mut self,
        x: &[Vec<f64>],
        y: &[usize],
        n_classes: usize,
        indices: &[usize],
        rng: &mut StdRng,
    ) {
        self.n_classes = n_classes;
        self.n_nodes = 0;
        let n_features = x.first().map_or(0, Vec::len);
        self.importances = vec![0.0; n_features];

        if indices.is_empty() || n_classes == 0 {
            self.root = None;
            return;
        }

        let root = self.build(x, y, indices.to_vec(), 0, rng);
        self.root = Some(root);
    }

    fn build(
        &mut self,
        x: &[Vec<f64>],
        y: &[usize],
        indices: Vec<usize>,
        depth: usize,
        rng: &mut StdRng,
    ) -> DecisionNode {
        self.n_nodes += 1;
        let counts = class_counts(y, &indices, self.n_classes);
        let parent_impurity = gini(&counts, indices.len());

        let stop = depth >= self.max_depth
            || indices.len() < self.min_samples_split
            || parent_impurity <= f64::EPSILON;
        if stop {
            return leaf(&counts, indices.len());
        }

        let Some(best) = self.best_split(x, y, &indices, rng) else {
            return leaf(&counts, indices.len());
        };
        if best.impurity >= parent_impurity - 1e-12 {
            return leaf(&counts, indices.len());
        }

        let n = indices.len() as f64;
        self.importances[best.feature] += n * (parent_impurity - best.impurity);

        let left = self.build(x, y, best.left, depth + 1, rng);
        let right = self.build(x, y, best.right, depth + 1, rng);

        DecisionNode::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn best_split(
        &self,
        x: &[Vec<f64>],
        y: &[usize],
        indices: &[usize],
        rng: &mut StdRng,
    ) -> Option<BestSplit> {
        let n_features = self.importances.len();
        let mut features: Vec<usize> = (0..n_features).collect();
        if let Some(k) = self.max_features {
            if k < n_features {
                features.shuffle(rng);
                features.truncate(k);
            }
        }

        let total = indices.len();
        let mut best: Option<(usize, f64, f64)> = None;

        for &feature in &features {
            let mut sorted = indices.to_vec();
            sorted.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));

            let mut left_counts = vec![0usize; self.n_classes];
            let mut right_counts = class_counts(y, &sorted, self.n_classes);

            for pos in 0..total - 1 {
                let class = y[sorted[pos]];
                left_counts[class] += 1;
                right_counts[class] -= 1;

                let here = x[sorted[pos]][feature];
                let next = x[sorted[pos + 1]][feature];
                if here >= next {
                    continue;
                }

                let n_left = pos + 1;
                let n_right = total - n_left;
                let impurity = (n_left as f64 * gini(&left_counts, n_left)
                    + n_right as f64 * gini(&right_counts, n_right))
                    / total as f64;

                if best.map_or(true, |(_, _, current)| impurity < current) {
                    best = Some((feature, midpoint(here, next), impurity));
                }
            }
        }

        let (feature, threshold, impurity) = best?;
        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| x[i][feature] <= threshold);

        Some(BestSplit {
            feature,
            threshold,
            impurity,
            left,
            right,
        })
    }

    /// Class distribution of the leaf `features` falls into.
    pub fn predict_proba(&self, features: &[f64]) -> Option<&[f64]> {
        let mut node = self.root.as_ref()?;
        loop {
            match node {
                DecisionNode::Leaf { distribution } => return Some(distribution),
                DecisionNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if features[*feature] <= *threshold {
                        left.as_ref()
                    } else {
                        right.as_ref()
                    };
                }
            }
        }
    }

    /// Impurity decrease per feature, normalized to sum to 1.
    pub fn feature_importances(&self) -> Vec<f64> {
        let total: f64 = self.importances.iter().sum();
        if total <= 0.0 {
            return vec![0.0; self.importances.len()];
        }
        self.importances.iter().map(|imp| imp / total).collect()
    }

    #[inline(always)]
    pub fn n_nodes(&self) -> usize {
        self.n_nodes
    }
}

/// Threshold strictly below `next`, so `next` always goes right. Adjacent
/// floats can round their midpoint up to `next`.
fn midpoint(here: f64, next: f64) -> f64 {
    let mid = (here + next) / 2.0;
    if mid < next {
        mid
    } else {
        here
    }
}

fn class_counts(y: &[usize], indices: &[usize], n_classes: usize) -> Vec<usize> {
    let mut counts = vec![0usize; n_classes];
    for &i in indices {
        counts[y[i]] += 1;
    }
    counts
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total;
            p * p
        })
        .sum::<f64>()
}

fn leaf(counts: &[usize], total: usize) -> DecisionNode {
    let total = total.max(1) as f64;
    DecisionNode::Leaf {
        distribution: counts.iter().map(|&c| c as f64 / total).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn xor_data() -> (Vec<Vec<f64>>, Vec<usize>) {
        let x = vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 1.0],
        ];
        let y = vec![0, 1, 1, 0];
        (x, y)
    }

    #[test]
    fn grows_until_leaves_are_pure() {
        let x = vec![vec![0.1], vec![0.2], vec![0.8], vec![0.9]];
        let y = vec![0, 0, 1, 1];
        let mut tree = DecisionTree::new(5, 2);
        let mut rng = StdRng::seed_from_u64(7);
        tree.fit(&x, &y, 2, &[0, 1, 2, 3], &mut rng);

        assert_eq!(tree.n_nodes(), 3);
        assert_eq!(tree.predict_proba(&[0.15]), Some(&[1.0, 0.0][..]));
        assert_eq!(tree.predict_proba(&[0.95]), Some(&[0.0, 1.0][..]));
        assert_eq!(tree.feature_importances(), vec![1.0]);
    }

    #[test]
    fn depth_limit_produces_mixed_leaves() {
        let (x, y) = xor_data();
        let mut tree = DecisionTree::new(1, 2);
        let mut rng = StdRng::seed_from_u64(7);
        tree.fit(&x, &y, 2, &[0, 1, 2, 3], &mut rng);

        let proba = tree.predict_proba(&[0.0, 0.0]).unwrap();
        assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn adjacent_values_still_split_both_ways() {
        let a = 1e-4_f64;
        let b = f64::from_bits(a.to_bits() + 1);
        assert!(midpoint(a, b) < b);
        assert_eq!(midpoint(0.25, 0.75), 0.5);

        let x = vec![vec![a], vec![b]];
        let y = vec![0, 1];
        let mut tree = DecisionTree::new(5, 2);
        let mut rng = StdRng::seed_from_u64(7);
        tree.fit(&x, &y, 2, &[0, 1], &mut rng);

        assert_eq!(tree.n_nodes(), 3);
        assert_eq!(tree.predict_proba(&[a]), Some(&[1.0, 0.0][..]));
        assert_eq!(tree.predict_proba(&[0.9]), Some(&[0.0, 1.0][..]));
    }

    #[test]
    fn unfitted_tree_predicts_nothing() {
        let tree = DecisionTree::new(3, 2);
        assert!(tree.predict_proba(&[0.5]).is_none());
    }

    #[test]
    fn constant_feature_yields_single_leaf() {
        let x = vec![vec![0.5], vec![0.5], vec![0.5]];
        let y = vec![0, 1, 1];
        let mut tree = DecisionTree::new(4, 2);
        let mut rng = StdRng::seed_from_u64(1);
        tree.fit(&x, &y, 2, &[0, 1, 2], &mut rng);

        assert_eq!(tree.n_nodes(), 1);
        let proba = tree.predict_proba(&[0.5]).unwrap();
        assert!((proba[1] - 2.0 / 3.0).abs() < 1e-12);
    }
}
