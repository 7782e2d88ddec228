//! Random forest ensemble
//!
//! Bagged CART trees with per-split feature subsampling. Class
//! probabilities are the mean of the leaf distributions across trees.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::ForestConfig;
use crate::tree::DecisionTree;

#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_trees: usize,
    max_depth: usize,
    min_samples_split: usize,
    seed: u64,
    n_classes: usize,
    n_features: usize,
}

impl RandomForest {
    pub fn new(n_trees: usize, max_depth: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_trees,
            max_depth,
            min_samples_split: 2,
            seed: 42,
            n_classes: 0,
            n_features: 0,
        }
    }

    pub fn from_config(config: &ForestConfig) -> Self {
        Self::new(config.n_trees, config.max_depth)
            .with_min_samples_split(config.min_samples_split)
            .with_seed(config.seed)
    }

    #[inline(always)]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[inline(always)]
    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    /// Fit the forest on rows `x` with class ids `y` in `0..n_classes`.
    pub fn fit(&mut self, x: &[Vec<f64>], y: &[usize], n_classes: usize) {
        self.trees.clear();
        self.n_classes = n_classes;
        self.n_features = x.first().map_or(0, Vec::len);

        if x.is_empty() || x.len() != y.len() {
            return;
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let max_features = ((self.n_features as f64).sqrt() as usize).max(1);

        for _ in 0..self.n_trees {
            let bootstrap: Vec<usize> = (0..x.len()).map(|_| rng.gen_range(0..x.len())).collect();

            let mut tree = DecisionTree::new(self.max_depth, self.min_samples_split)
                .with_max_features(max_features);
            tree.fit(x, y, n_classes, &bootstrap, &mut rng);
            self.trees.push(tree);
        }

        debug!(
            trees = self.trees.len(),
            nodes = self.trees.iter().map(DecisionTree::n_nodes).sum::<usize>(),
            "fitted random forest"
        );
    }

    /// Mean class distribution over all trees.
    pub fn predict_proba(&self, features: &[f64]) -> Option<Vec<f64>> {
        if self.trees.is_empty() || features.len() != self.n_features {
            return None;
        }

        let mut totals = vec![0.0; self.n_classes];
        let mut voters = 0usize;
        for distribution in self.trees.iter().filter_map(|t| t.predict_proba(features)) {
            for (total, p) in totals.iter_mut().zip(distribution) {
                *total += p;
            }
            voters += 1;
        }

        if voters == 0 {
            return None;
        }

        let voters = voters as f64;
        Some(totals.into_iter().map(|t| t / voters).collect())
    }

    /// Mean of the per-tree normalized importances.
    pub fn feature_importances(&self) -> Vec<f64> {
        if self.trees.is_empty() {
            return Vec::new();
        }

        let mut importances = vec![0.0; self.n_features];
        for tree in &self.trees {
            for (total, imp) in importances.iter_mut().zip(tree.feature_importances()) {
                *total += imp;
            }
        }

        let sum: f64 = importances.iter().sum();
        if sum > 0.0 {
            for imp in &mut importances {
                *imp /= sum;
            }
        }
        importances
    }

    #[inline(always)]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    #[inline(always)]
    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

/// Index of the largest value; ties resolve to the lower index.
pub fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, current)) if current >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> (Vec<Vec<f64>>, Vec<usize>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..20 {
            let jitter = i as f64 * 0.005;
            x.push(vec![0.1 + jitter, 0.8 - jitter]);
            y.push(0);
            x.push(vec![0.9 - jitter, 0.2 + jitter]);
            y.push(1);
        }
        (x, y)
    }

    #[test]
    fn separates_clean_clusters() {
        let (x, y) = two_blobs();
        let mut forest = RandomForest::new(25, 6).with_seed(3);
        forest.fit(&x, &y, 2);

        assert_eq!(forest.n_trees(), 25);
        let near_first = forest.predict_proba(&[0.12, 0.79]).unwrap();
        let near_second = forest.predict_proba(&[0.88, 0.21]).unwrap();
        assert_eq!(argmax(&near_first), Some(0));
        assert_eq!(argmax(&near_second), Some(1));
    }

    #[test]
    fn probabilities_sum_to_one() {
        let (x, y) = two_blobs();
        let mut forest = RandomForest::new(15, 4);
        forest.fit(&x, &y, 3);

        for point in [[0.5, 0.5], [0.0, 1.0], [1.0, 0.0]] {
            let proba = forest.predict_proba(&point).unwrap();
            assert_eq!(proba.len(), 3);
            assert!(proba.iter().all(|&p| p >= 0.0));
            assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-9);
            assert_eq!(proba[2], 0.0);
        }
    }

    #[test]
    fn same_seed_same_forest() {
        let (x, y) = two_blobs();
        let mut a = RandomForest::new(10, 5).with_seed(11);
        let mut b = RandomForest::new(10, 5).with_seed(11);
        a.fit(&x, &y, 2);
        b.fit(&x, &y, 2);
        assert_eq!(a.predict_proba(&[0.5, 0.5]), b.predict_proba(&[0.5, 0.5]));
        assert_eq!(a.feature_importances(), b.feature_importances());
    }

    #[test]
    fn wrong_width_or_unfitted_returns_none() {
        let forest = RandomForest::new(5, 3);
        assert!(forest.predict_proba(&[0.1, 0.2]).is_none());

        let (x, y) = two_blobs();
        let mut fitted = RandomForest::new(5, 3);
        fitted.fit(&x, &y, 2);
        assert!(fitted.predict_proba(&[0.1]).is_none());
    }

    #[test]
    fn importances_are_normalized() {
        let (x, y) = two_blobs();
        let mut forest = RandomForest::new(10, 4);
        forest.fit(&x, &y, 2);
        let importances = forest.feature_importances();
        assert_eq!(importances.len(), 2);
        assert!((importances.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn argmax_prefers_first_on_ties() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), Some(1));
        assert_eq!(argmax(&[]), None);
    }
}
