use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_classifier::{
    DecisionTreeClassifier, DecisionTreeClassifierParameters, SplitCriterion,
};

use crate::error::{AppError, Result};

/// Ensemble hyperparameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: u16,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            seed: 42,
        }
    }
}

/// Bagged ensemble of Gini decision trees for one binary target.
///
/// Each tree is fitted on a bootstrap resample of the training
/// partition; the positive-class probability of a row is the fraction
/// of trees voting positive.
#[derive(Serialize, Deserialize)]
pub struct RiskForest {
    trees: Vec<DecisionTreeClassifier<f64, i32, DenseMatrix<f64>, Vec<i32>>>,
    params: ForestParams,
    n_features: usize,
}

impl RiskForest {
    /// Train the ensemble. Trees are independent and fitted in parallel;
    /// only their collection order matters for reproducibility, which the
    /// per-tree seed preserves.
    pub fn fit(features: &Array2<f64>, labels: &[u8], params: ForestParams) -> Result<Self> {
        if features.nrows() != labels.len() {
            return Err(AppError::Internal(format!(
                "feature/label length mismatch: {} rows vs {} labels",
                features.nrows(),
                labels.len()
            )));
        }
        if features.nrows() == 0 {
            return Err(AppError::Validation(
                "cannot train on an empty partition".to_string(),
            ));
        }

        let n_rows = features.nrows();
        let trees: Result<Vec<_>> = (0..params.n_trees)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(tree_idx as u64));
                let mut data = Vec::with_capacity(n_rows * features.ncols());
                let mut y = Vec::with_capacity(n_rows);
                for _ in 0..n_rows {
                    let source = rng.gen_range(0..n_rows);
                    data.extend(features.row(source).iter().copied());
                    y.push(i32::from(labels[source]));
                }

                let x = DenseMatrix::new(n_rows, features.ncols(), data, false);
                let tree_params = DecisionTreeClassifierParameters::default()
                    .with_max_depth(params.max_depth)
                    .with_criterion(SplitCriterion::Gini);

                DecisionTreeClassifier::fit(&x, &y, tree_params)
                    .map_err(|e| AppError::Internal(format!("failed to fit tree: {e}")))
            })
            .collect();

        Ok(Self {
            trees: trees?,
            params,
            n_features: features.ncols(),
        })
    }

    /// Positive-class probability per row
    pub fn predict_proba(&self, features: &Array2<f64>) -> Result<Vec<f64>> {
        if features.ncols() != self.n_features {
            return Err(AppError::ColumnMismatch(format!(
                "model expects {} feature columns, got {}",
                self.n_features,
                features.ncols()
            )));
        }

        let x = Self::to_dense(features);
        let mut positive_votes = vec![0usize; features.nrows()];

        for tree in &self.trees {
            let votes = tree
                .predict(&x)
                .map_err(|e| AppError::Internal(format!("tree prediction failed: {e}")))?;
            for (row, vote) in votes.iter().enumerate() {
                if *vote == 1 {
                    positive_votes[row] += 1;
                }
            }
        }

        Ok(positive_votes
            .into_iter()
            .map(|votes| votes as f64 / self.trees.len() as f64)
            .collect())
    }

    /// Hard labels: positive when more than half of the trees vote positive
    pub fn predict(&self, features: &Array2<f64>) -> Result<Vec<u8>> {
        Ok(self
            .predict_proba(features)?
            .into_iter()
            .map(|p| u8::from(p > 0.5))
            .collect())
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn params(&self) -> ForestParams {
        self.params
    }

    fn to_dense(features: &Array2<f64>) -> DenseMatrix<f64> {
        let data: Vec<f64> = features.iter().copied().collect();
        DenseMatrix::new(features.nrows(), features.ncols(), data, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// Two well-separated clusters around 0 and 10
    fn separable_dataset(n_per_class: usize) -> (Array2<f64>, Vec<u8>) {
        let mut data = Vec::new();
        let mut labels = Vec::new();
        for i in 0..n_per_class {
            let jitter = (i % 5) as f64 * 0.1;
            data.extend([jitter, jitter * 2.0]);
            labels.push(0);
            data.extend([10.0 + jitter, 20.0 + jitter]);
            labels.push(1);
        }
        let features = Array2::from_shape_vec((n_per_class * 2, 2), data).unwrap();
        (features, labels)
    }

    fn params(n_trees: usize) -> ForestParams {
        ForestParams {
            n_trees,
            max_depth: 5,
            seed: 42,
        }
    }

    #[test]
    fn learns_a_separable_problem() {
        let (features, labels) = separable_dataset(25);
        let forest = RiskForest::fit(&features, &labels, params(20)).unwrap();

        let predictions = forest.predict(&features).unwrap();
        assert_eq!(predictions, labels);
    }

    #[test]
    fn probabilities_are_vote_fractions() {
        let (features, labels) = separable_dataset(25);
        let forest = RiskForest::fit(&features, &labels, params(20)).unwrap();

        let probabilities = forest.predict_proba(&features).unwrap();
        for (p, &label) in probabilities.iter().zip(labels.iter()) {
            assert!((0.0..=1.0).contains(p));
            if label == 1 {
                assert!(*p > 0.5);
            } else {
                assert!(*p < 0.5);
            }
        }
    }

    #[test]
    fn training_is_deterministic_for_a_seed() {
        let (features, labels) = separable_dataset(15);
        let a = RiskForest::fit(&features, &labels, params(10)).unwrap();
        let b = RiskForest::fit(&features, &labels, params(10)).unwrap();

        assert_eq!(
            a.predict_proba(&features).unwrap(),
            b.predict_proba(&features).unwrap()
        );
    }

    #[test]
    fn wrong_column_count_is_a_column_mismatch() {
        let (features, labels) = separable_dataset(10);
        let forest = RiskForest::fit(&features, &labels, params(5)).unwrap();

        let narrow = Array2::zeros((1, 1));
        assert!(matches!(
            forest.predict(&narrow),
            Err(AppError::ColumnMismatch(_))
        ));
    }

    #[test]
    fn empty_partition_is_rejected() {
        let features = Array2::zeros((0, 2));
        assert!(RiskForest::fit(&features, &[], params(5)).is_err());
    }
}
