use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::models::StudentRecord;
use crate::pipeline::bundle::ModelBundle;
use crate::pipeline::labels::{derive_labels, LabelRules};
use crate::pipeline::metrics;
use crate::pipeline::transform;

/// Accuracy drop observed when one feature column is shuffled
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub column: String,
    pub importance: f64,
}

/// Permutation feature importance over a trained bundle.
///
/// Each column of the transformed matrix is shuffled in turn (with a
/// per-column seed) and the model is re-scored; the importance of a
/// column is the accuracy lost when its values no longer line up with
/// the rest of the row. Results are sorted most-important first.
pub fn permutation_importance(
    bundle: &ModelBundle,
    records: &[StudentRecord],
    seed: u64,
) -> Result<Vec<FeatureImportance>> {
    let rules = LabelRules::preset(&bundle.preset)?;
    let features: Vec<_> = records.iter().map(|r| r.features()).collect();
    let labels: Vec<u8> = features
        .iter()
        .map(|row| derive_labels(row, &rules).map(|l| l.label_for(bundle.target)))
        .collect::<Result<_>>()?;

    let matrix = transform::transform(&features, &bundle.state)?;
    let values = matrix.reindex(&bundle.feature_order)?;

    let baseline = metrics::accuracy(&labels, &bundle.forest.predict(&values)?);

    let mut importances = Vec::with_capacity(bundle.feature_order.len());
    for (col, column) in bundle.feature_order.iter().enumerate() {
        let shuffled = shuffle_column(&values, col, seed.wrapping_add(col as u64));
        let permuted = metrics::accuracy(&labels, &bundle.forest.predict(&shuffled)?);
        importances.push(FeatureImportance {
            column: column.clone(),
            importance: baseline - permuted,
        });
    }

    importances.sort_by(|a, b| {
        b.importance
            .partial_cmp(&a.importance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    info!(
        target = %bundle.target,
        rows = records.len(),
        baseline_accuracy = baseline,
        "Computed permutation importance"
    );

    Ok(importances)
}

fn shuffle_column(values: &Array2<f64>, col: usize, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut column: Vec<f64> = values.column(col).iter().copied().collect();
    column.shuffle(&mut rng);

    let mut shuffled = values.clone();
    for (row, value) in column.into_iter().enumerate() {
        shuffled[[row, col]] = value;
    }
    shuffled
}
