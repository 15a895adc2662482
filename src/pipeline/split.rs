use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{AppError, Result};

/// Stratified train/evaluation split: each class contributes the same
/// fraction of rows to the evaluation partition, preserving the label
/// ratio on both sides.
pub fn stratified_split(
    labels: &[u8],
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(0.0..1.0).contains(&test_fraction) || test_fraction == 0.0 {
        return Err(AppError::Configuration(format!(
            "test_fraction must be in (0, 1), got {test_fraction}"
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut eval = Vec::new();

    for class in [0u8, 1u8] {
        let mut indices: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == class).collect();
        indices.shuffle(&mut rng);

        let n_eval = ((indices.len() as f64) * test_fraction).round() as usize;
        eval.extend_from_slice(&indices[..n_eval]);
        train.extend_from_slice(&indices[n_eval..]);
    }

    if train.is_empty() || eval.is_empty() {
        return Err(AppError::Validation(format!(
            "corpus too small to split: {} train rows, {} eval rows",
            train.len(),
            eval.len()
        )));
    }

    train.sort_unstable();
    eval.sort_unstable();
    Ok((train, eval))
}

/// Stratified k-fold assignment. Shuffled per-class indices are dealt
/// round-robin across folds so every fold keeps the corpus label ratio.
pub fn stratified_kfold(labels: &[u8], k: usize, seed: u64) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
    if k < 2 {
        return Err(AppError::Configuration(format!(
            "cross-validation needs at least 2 folds, got {k}"
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut fold_members: Vec<Vec<usize>> = vec![Vec::new(); k];

    for class in [0u8, 1u8] {
        let mut indices: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == class).collect();
        indices.shuffle(&mut rng);
        for (position, index) in indices.into_iter().enumerate() {
            fold_members[position % k].push(index);
        }
    }

    let mut folds = Vec::with_capacity(k);
    for held_out in 0..k {
        let mut test: Vec<usize> = fold_members[held_out].clone();
        let mut train: Vec<usize> = fold_members
            .iter()
            .enumerate()
            .filter(|(fold, _)| *fold != held_out)
            .flat_map(|(_, members)| members.iter().copied())
            .collect();

        if test.is_empty() || train.is_empty() {
            return Err(AppError::Validation(format!(
                "corpus too small for {k}-fold cross-validation"
            )));
        }

        test.sort_unstable();
        train.sort_unstable();
        folds.push((train, test));
    }

    Ok(folds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(positives: usize, negatives: usize) -> Vec<u8> {
        let mut labels = vec![1u8; positives];
        labels.extend(vec![0u8; negatives]);
        labels
    }

    #[test]
    fn split_preserves_class_ratio() {
        let labels = labels(20, 80);
        let (train, eval) = stratified_split(&labels, 0.2, 42).unwrap();

        let eval_pos = eval.iter().filter(|&&i| labels[i] == 1).count();
        let eval_neg = eval.iter().filter(|&&i| labels[i] == 0).count();
        assert_eq!(eval_pos, 4);
        assert_eq!(eval_neg, 16);
        assert_eq!(train.len() + eval.len(), labels.len());
    }

    #[test]
    fn split_partitions_are_disjoint_and_complete() {
        let labels = labels(10, 30);
        let (train, eval) = stratified_split(&labels, 0.25, 1).unwrap();

        let mut all: Vec<usize> = train.iter().chain(eval.iter()).copied().collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), labels.len());
    }

    #[test]
    fn split_is_deterministic_for_a_seed() {
        let labels = labels(15, 45);
        let a = stratified_split(&labels, 0.2, 42).unwrap();
        let b = stratified_split(&labels, 0.2, 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn invalid_fraction_is_rejected() {
        let labels = labels(5, 5);
        assert!(stratified_split(&labels, 0.0, 42).is_err());
        assert!(stratified_split(&labels, 1.0, 42).is_err());
    }

    #[test]
    fn kfold_covers_every_index_exactly_once_as_test() {
        let labels = labels(12, 28);
        let folds = stratified_kfold(&labels, 5, 42).unwrap();
        assert_eq!(folds.len(), 5);

        let mut seen: Vec<usize> = folds.iter().flat_map(|(_, test)| test.clone()).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), labels.len());
    }

    #[test]
    fn kfold_folds_keep_both_classes() {
        let labels = labels(10, 40);
        let folds = stratified_kfold(&labels, 5, 42).unwrap();
        for (_, test) in folds {
            assert!(test.iter().any(|&i| labels[i] == 1));
            assert!(test.iter().any(|&i| labels[i] == 0));
        }
    }
}
