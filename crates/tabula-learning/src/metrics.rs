//! Evaluation metrics.
//!
//! Accuracy, precision/recall/F1 with binary or weighted averaging, the
//! confusion matrix, and ROC-AUC: rank-based for two classes, one-vs-rest
//! weighted for more.

use ndarray::ArrayView2;
use std::collections::HashSet;

/// Averaging mode for precision/recall/F1.
///
/// `Binary` scores the positive class (index 1) only; `Weighted` averages
/// per-class scores weighted by support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Averaging {
    Binary,
    Weighted,
}

/// Averaging convention for a problem with `n_classes` classes.
pub fn default_averaging(n_classes: usize) -> Averaging {
    if n_classes == 2 {
        Averaging::Binary
    } else {
        Averaging::Weighted
    }
}

/// Fraction of correct predictions.
pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}

/// Confusion matrix with rows = actual class, columns = predicted class.
pub fn confusion_matrix(y_true: &[usize], y_pred: &[usize], n_classes: usize) -> Vec<Vec<usize>> {
    let mut matrix = vec![vec![0usize; n_classes]; n_classes];
    for (&t, &p) in y_true.iter().zip(y_pred) {
        if t < n_classes && p < n_classes {
            matrix[t][p] += 1;
        }
    }
    matrix
}

/// Precision, recall and F1. Divisions by zero score 0, mirroring the usual
/// `zero_division=0` convention.
pub fn precision_recall_f1(
    y_true: &[usize],
    y_pred: &[usize],
    n_classes: usize,
    averaging: Averaging,
) -> (f64, f64, f64) {
    let matrix = confusion_matrix(y_true, y_pred, n_classes);
    let per_class: Vec<(f64, f64, f64, usize)> = (0..n_classes)
        .map(|class| {
            let tp = matrix[class][class] as f64;
            let predicted: f64 = (0..n_classes).map(|r| matrix[r][class] as f64).sum();
            let actual: f64 = matrix[class].iter().map(|&v| v as f64).sum();
            let precision = if predicted > 0.0 { tp / predicted } else { 0.0 };
            let recall = if actual > 0.0 { tp / actual } else { 0.0 };
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            (precision, recall, f1, actual as usize)
        })
        .collect();

    match averaging {
        Averaging::Binary => {
            let (precision, recall, f1, _) = per_class.get(1).copied().unwrap_or((0.0, 0.0, 0.0, 0));
            (precision, recall, f1)
        }
        Averaging::Weighted => {
            let total: usize = per_class.iter().map(|(_, _, _, support)| support).sum();
            if total == 0 {
                return (0.0, 0.0, 0.0);
            }
            let mut precision = 0.0;
            let mut recall = 0.0;
            let mut f1 = 0.0;
            for (p, r, f, support) in per_class {
                let weight = support as f64 / total as f64;
                precision += p * weight;
                recall += r * weight;
                f1 += f * weight;
            }
            (precision, recall, f1)
        }
    }
}

/// Binary ROC-AUC from positive-class scores, computed as the normalized
/// Mann-Whitney U statistic with tie-corrected average ranks.
///
/// Returns `None` when either class is absent.
pub fn roc_auc_binary(positive: &[bool], scores: &[f64]) -> Option<f64> {
    let n_pos = positive.iter().filter(|&&p| p).count();
    let n_neg = positive.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[a]
            .partial_cmp(&scores[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Average ranks over tie groups.
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

    let rank_sum: f64 = positive
        .iter()
        .zip(&ranks)
        .filter(|(&p, _)| p)
        .map(|(_, &r)| r)
        .sum();
    let u = rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
    Some(u / (n_pos as f64 * n_neg as f64))
}

/// Multiclass one-vs-rest ROC-AUC with support-weighted averaging.
///
/// Only defined when every class in `known_classes` (the model's training
/// classes) also appears in the held-out labels; otherwise returns `None`
/// rather than an error, per the evaluation contract.
pub fn roc_auc_weighted_ovr(
    y_true: &[usize],
    scores: &ArrayView2<'_, f64>,
    known_classes: &HashSet<usize>,
) -> Option<f64> {
    let present: HashSet<usize> = y_true.iter().copied().collect();
    if !known_classes.is_subset(&present) {
        return None;
    }
    if present.len() < 2 {
        return None;
    }

    let mut weighted_sum = 0.0;
    let mut total_support = 0usize;
    let mut classes: Vec<usize> = present.into_iter().collect();
    classes.sort_unstable();
    for class in classes {
        if class >= scores.ncols() {
            return None;
        }
        let positive: Vec<bool> = y_true.iter().map(|&t| t == class).collect();
        let class_scores: Vec<f64> = scores.column(class).iter().copied().collect();
        let auc = roc_auc_binary(&positive, &class_scores)?;
        let support = positive.iter().filter(|&&p| p).count();
        weighted_sum += auc * support as f64;
        total_support += support;
    }
    if total_support == 0 {
        return None;
    }
    Some(weighted_sum / total_support as f64)
}
