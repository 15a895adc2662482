use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{AppError, Result};

/// Oversample the minority class until both label counts are equal.
///
/// Duplicated rows are drawn uniformly at random from the minority class
/// with a seeded generator, so a fixed seed yields an identical resample.
/// This is applied to the training partition only; the evaluation
/// partition must never pass through here.
pub fn balance(
    features: &Array2<f64>,
    labels: &[u8],
    seed: u64,
) -> Result<(Array2<f64>, Vec<u8>)> {
    if features.nrows() != labels.len() {
        return Err(AppError::Internal(format!(
            "feature/label length mismatch: {} rows vs {} labels",
            features.nrows(),
            labels.len()
        )));
    }

    let positives: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == 1).collect();
    let negatives: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == 0).collect();

    if positives.is_empty() || negatives.is_empty() {
        tracing::warn!(
            positives = positives.len(),
            negatives = negatives.len(),
            "Single-class training partition; skipping balancing"
        );
        return Ok((features.to_owned(), labels.to_vec()));
    }

    let (minority, deficit) = if positives.len() < negatives.len() {
        (&positives, negatives.len() - positives.len())
    } else {
        (&negatives, positives.len() - negatives.len())
    };

    let mut rng = StdRng::seed_from_u64(seed);
    let mut balanced_features = features.to_owned();
    let mut balanced_labels = labels.to_vec();

    for _ in 0..deficit {
        let source = minority[rng.gen_range(0..minority.len())];
        let row = features.row(source).to_owned();
        balanced_features
            .push(Axis(0), row.view())
            .map_err(|e| AppError::Internal(format!("failed to append resampled row: {e}")))?;
        balanced_labels.push(labels[source]);
    }

    Ok((balanced_features, balanced_labels))
}
