//! Classification performance against delayed ground truth

use crate::models::LabeledPair;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Performance metrics for one window; `None` where undefined
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub accuracy: Option<f64>,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1_score: Option<f64>,
    pub auc_roc: Option<f64>,
}

impl PerformanceSnapshot {
    /// Snapshot for a window without ground truth
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn is_available(&self) -> bool {
        self.accuracy.is_some()
    }
}

fn ratio_or_zero(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Evaluate binary predictions (positive class = 1).
///
/// Precision, recall and F1 fall back to 0 on zero division. AUC-ROC is
/// `None` unless both classes occur in `labels`. With no pairs at all, every
/// field is `None`.
pub fn evaluate(predictions: &[u8], probabilities: &[f64], labels: &[u8]) -> PerformanceSnapshot {
    let n = predictions.len().min(labels.len());
    if n == 0 {
        return PerformanceSnapshot::unavailable();
    }

    let (mut tp, mut fp, mut fn_, mut correct) = (0usize, 0usize, 0usize, 0usize);
    for (&p, &y) in predictions.iter().zip(labels.iter()).take(n) {
        let (p, y) = (p != 0, y != 0);
        if p == y {
            correct += 1;
        }
        match (p, y) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, true) => fn_ += 1,
            (false, false) => {}
        }
    }

    let precision = ratio_or_zero(tp, tp + fp);
    let recall = ratio_or_zero(tp, tp + fn_);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    let auc = if probabilities.len() >= n {
        roc_auc(&probabilities[..n], &labels[..n])
    } else {
        None
    };

    PerformanceSnapshot {
        accuracy: Some(correct as f64 / n as f64),
        precision: Some(precision),
        recall: Some(recall),
        f1_score: Some(f1),
        auc_roc: auc,
    }
}

/// Evaluate joined (prediction, probability, label) triples
pub fn evaluate_pairs(pairs: &[LabeledPair]) -> PerformanceSnapshot {
    let predictions: Vec<u8> = pairs.iter().map(|p| p.prediction).collect();
    let probabilities: Vec<f64> = pairs.iter().map(|p| p.probability).collect();
    let labels: Vec<u8> = pairs.iter().map(|p| p.label).collect();
    evaluate(&predictions, &probabilities, &labels)
}

/// Area under the ROC curve via the Mann-Whitney rank statistic.
///
/// Tied scores receive their average rank. Returns `None` when only one
/// class is present or a score is not finite.
pub fn roc_auc(scores: &[f64], labels: &[u8]) -> Option<f64> {
    if scores.len() != labels.len() || scores.iter().any(|s| !s.is_finite()) {
        return None;
    }

    let positives = labels.iter().filter(|&&y| y != 0).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].partial_cmp(&scores[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // 1-based average rank of the tie group
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg_rank;
        }
        i = j + 1;
    }

    let positive_rank_sum: f64 = ranks
        .iter()
        .zip(labels.iter())
        .filter(|(_, &y)| y != 0)
        .map(|(r, _)| r)
        .sum();

    let p = positives as f64;
    let u = positive_rank_sum - p * (p + 1.0) / 2.0;
    Some(u / (p * negatives as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_pairs_all_none() {
        let snapshot = evaluate(&[], &[], &[]);
        assert_eq!(snapshot, PerformanceSnapshot::unavailable());
        assert!(!snapshot.is_available());
    }

    #[test]
    fn test_basic_metrics() {
        let predictions = [1, 0, 1, 1, 0, 0];
        let probabilities = [0.9, 0.2, 0.7, 0.6, 0.4, 0.1];
        let labels = [1, 0, 0, 1, 1, 0];

        let s = evaluate(&predictions, &probabilities, &labels);
        // tp=2 fp=1 fn=1 tn=2
        assert!((s.accuracy.unwrap() - 4.0 / 6.0).abs() < 1e-12);
        assert!((s.precision.unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert!((s.recall.unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert!((s.f1_score.unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert!(s.auc_roc.is_some());
    }

    #[test]
    fn test_zero_division_yields_zero() {
        // Model never predicts the positive class
        let s = evaluate(&[0, 0, 0], &[0.1, 0.2, 0.3], &[1, 0, 1]);
        assert_eq!(s.precision, Some(0.0));
        assert_eq!(s.recall, Some(0.0));
        assert_eq!(s.f1_score, Some(0.0));
    }

    #[test]
    fn test_auc_none_for_single_class_with_many_predictions() {
        let predictions: Vec<u8> = (0..1_000).map(|i| (i % 7 == 0) as u8).collect();
        let probabilities: Vec<f64> = (0..1_000).map(|i| (i % 100) as f64 / 100.0).collect();
        let labels = vec![0u8; 1_000];

        let s = evaluate(&predictions, &probabilities, &labels);
        assert!(s.accuracy.is_some());
        assert!(s.auc_roc.is_none());
    }

    #[test]
    fn test_auc_perfect_and_inverted() {
        let labels = [0, 0, 1, 1];
        assert_eq!(roc_auc(&[0.1, 0.2, 0.8, 0.9], &labels), Some(1.0));
        assert_eq!(roc_auc(&[0.9, 0.8, 0.2, 0.1], &labels), Some(0.0));
    }

    #[test]
    fn test_auc_ties_average() {
        // All scores tied: no discrimination
        assert_eq!(roc_auc(&[0.5; 6], &[0, 1, 0, 1, 0, 1]), Some(0.5));
        // One positive tied with one negative
        let auc = roc_auc(&[0.1, 0.5, 0.5, 0.9], &[0, 0, 1, 1]).unwrap();
        assert!((auc - 0.875).abs() < 1e-12);
    }

    #[test]
    fn test_evaluate_pairs() {
        let pairs = vec![
            LabeledPair {
                prediction: 1,
                probability: 0.8,
                label: 1,
            },
            LabeledPair {
                prediction: 0,
                probability: 0.3,
                label: 0,
            },
        ];
        let s = evaluate_pairs(&pairs);
        assert_eq!(s.accuracy, Some(1.0));
        assert_eq!(s.auc_roc, Some(1.0));
    }
}
