use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-class evaluation metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Held-out evaluation report for one trained target model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricReport {
    /// Accuracy on the evaluation partition
    pub accuracy: f64,

    /// ROC-AUC on the evaluation partition; None when the partition is
    /// degenerate (single class), where the score is undefined
    pub roc_auc: Option<f64>,

    /// Macro-averaged F1 on the evaluation partition
    pub macro_f1: f64,

    /// Per-class precision/recall/F1
    pub per_class: BTreeMap<String, ClassMetrics>,

    /// Mean macro-F1 across cross-validation folds, diagnostic only
    pub cv_macro_f1: Option<f64>,
}

pub fn accuracy(y_true: &[u8], y_pred: &[u8]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t == p)
        .count();
    correct as f64 / y_true.len() as f64
}

/// Precision/recall/F1 for both classes of a binary problem
pub fn per_class_metrics(y_true: &[u8], y_pred: &[u8]) -> BTreeMap<String, ClassMetrics> {
    let mut per_class = BTreeMap::new();

    for class in [0u8, 1u8] {
        let tp = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(t, p)| **t == class && **p == class)
            .count();
        let fp = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(t, p)| **t != class && **p == class)
            .count();
        let fn_count = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(t, p)| **t == class && **p != class)
            .count();

        let precision = if tp + fp > 0 {
            tp as f64 / (tp + fp) as f64
        } else {
            0.0
        };
        let recall = if tp + fn_count > 0 {
            tp as f64 / (tp + fn_count) as f64
        } else {
            0.0
        };
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        let support = y_true.iter().filter(|&&t| t == class).count();

        per_class.insert(
            format!("class_{class}"),
            ClassMetrics {
                precision,
                recall,
                f1_score: f1,
                support,
            },
        );
    }

    per_class
}

/// F1 averaged evenly across both classes, ignoring class frequency
pub fn macro_f1(y_true: &[u8], y_pred: &[u8]) -> f64 {
    let per_class = per_class_metrics(y_true, y_pred);
    per_class.values().map(|m| m.f1_score).sum::<f64>() / per_class.len() as f64
}

/// Rank-based ROC-AUC (Mann-Whitney statistic) from positive-class
/// scores, with average ranks for ties. Undefined when only one class
/// is present.
pub fn roc_auc(y_true: &[u8], scores: &[f64]) -> Option<f64> {
    let n_pos = y_true.iter().filter(|&&t| t == 1).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[a]
            .partial_cmp(&scores[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Average ranks over tied score groups
    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let average_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = average_rank;
        }
        i = j + 1;
    }

    let positive_rank_sum: f64 = (0..y_true.len())
        .filter(|&i| y_true[i] == 1)
        .map(|i| ranks[i])
        .sum();

    let u = positive_rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
    Some(u / (n_pos * n_neg) as f64)
}

/// Build the full evaluation report from held-out truth, hard
/// predictions and positive-class scores
pub fn evaluate(y_true: &[u8], y_pred: &[u8], scores: &[f64]) -> MetricReport {
    MetricReport {
        accuracy: accuracy(y_true, y_pred),
        roc_auc: roc_auc(y_true, scores),
        macro_f1: macro_f1(y_true, y_pred),
        per_class: per_class_metrics(y_true, y_pred),
        cv_macro_f1: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_counts_matches() {
        assert_eq!(accuracy(&[1, 0, 1, 0], &[1, 0, 0, 0]), 0.75);
        assert_eq!(accuracy(&[1, 1], &[1, 1]), 1.0);
    }

    #[test]
    fn perfect_predictions_give_unit_metrics() {
        let y = [1u8, 0, 1, 0, 1];
        let per_class = per_class_metrics(&y, &y);
        for metrics in per_class.values() {
            assert_eq!(metrics.precision, 1.0);
            assert_eq!(metrics.recall, 1.0);
            assert_eq!(metrics.f1_score, 1.0);
        }
        assert_eq!(macro_f1(&y, &y), 1.0);
    }

    #[test]
    fn macro_f1_weighs_classes_evenly() {
        // Predict everything positive over an imbalanced truth
        let y_true = [1u8, 1, 1, 1, 1, 1, 1, 1, 1, 0];
        let y_pred = [1u8; 10];

        // class_1: precision 0.9, recall 1.0; class_0: all zero
        let f1_pos = 2.0 * 0.9 / 1.9;
        let expected = f1_pos / 2.0;
        assert!((macro_f1(&y_true, &y_pred) - expected).abs() < 1e-9);
    }

    #[test]
    fn roc_auc_separable_scores_give_one() {
        let y_true = [0u8, 0, 1, 1];
        let scores = [0.1, 0.2, 0.8, 0.9];
        assert_eq!(roc_auc(&y_true, &scores), Some(1.0));
    }

    #[test]
    fn roc_auc_reversed_scores_give_zero() {
        let y_true = [1u8, 1, 0, 0];
        let scores = [0.1, 0.2, 0.8, 0.9];
        assert_eq!(roc_auc(&y_true, &scores), Some(0.0));
    }

    #[test]
    fn roc_auc_handles_ties_with_average_ranks() {
        let y_true = [0u8, 1];
        let scores = [0.5, 0.5];
        let auc = roc_auc(&y_true, &scores).unwrap();
        assert!((auc - 0.5).abs() < 1e-9);
    }

    #[test]
    fn roc_auc_is_undefined_for_single_class() {
        assert_eq!(roc_auc(&[1u8, 1], &[0.2, 0.8]), None);
        assert_eq!(roc_auc(&[0u8, 0], &[0.2, 0.8]), None);
    }

    #[test]
    fn evaluate_assembles_a_full_report() {
        let y_true = [1u8, 0, 1, 0];
        let y_pred = [1u8, 0, 0, 0];
        let scores = [0.9, 0.2, 0.4, 0.1];

        let report = evaluate(&y_true, &y_pred, &scores);
        assert_eq!(report.accuracy, 0.75);
        assert!(report.roc_auc.is_some());
        assert_eq!(report.per_class.len(), 2);
        assert!(report.cv_macro_f1.is_none());
    }
}
