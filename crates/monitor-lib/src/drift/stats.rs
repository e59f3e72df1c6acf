//! Statistical comparison primitives
//!
//! Population Stability Index and the two-sample Kolmogorov-Smirnov test.
//! Both drop missing observations first and return a neutral value when a
//! side has no data: absence of data counts as no evidence of drift.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::warn;

/// Smoothing added to bin proportions and to ratio denominators
pub const EPSILON: f64 = 1e-10;

/// Default number of PSI bins
pub const DEFAULT_BINS: usize = 10;

/// Outcome of a two-sample KS test
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KsResult {
    /// Supremum distance between the two empirical CDFs, in [0, 1]
    pub statistic: f64,
    /// Asymptotic p-value, in [0, 1]
    pub p_value: f64,
}

impl KsResult {
    /// "No evidence of difference"
    pub const NEUTRAL: KsResult = KsResult {
        statistic: 0.0,
        p_value: 1.0,
    };
}

fn finite_sorted(values: &[f64]) -> Vec<f64> {
    let mut cleaned: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    cleaned.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    cleaned
}

/// Population Stability Index of `current` against `baseline`.
///
/// Bins are equal-width over the combined range with the outer edges opened
/// to infinity. The score depends on `bins`, so a comparison series must use
/// a fixed bin count.
pub fn psi(baseline: &[f64], current: &[f64], bins: usize) -> f64 {
    let baseline = finite_sorted(baseline);
    let current = finite_sorted(current);

    if baseline.is_empty() || current.is_empty() {
        return 0.0;
    }

    let min = baseline[0].min(current[0]);
    let max = baseline[baseline.len() - 1].max(current[current.len() - 1]);
    if min == max {
        return 0.0;
    }

    let bins = bins.max(1);
    let width = (max - min) / bins as f64;
    // Interior edges only; the first and last bins are unbounded
    let interior: Vec<f64> = (1..bins).map(|i| min + width * i as f64).collect();

    let baseline_pct = bin_proportions(&baseline, &interior);
    let current_pct = bin_proportions(&current, &interior);

    let score: f64 = baseline_pct
        .iter()
        .zip(current_pct.iter())
        .map(|(&b, &c)| {
            let b = b + EPSILON;
            let c = c + EPSILON;
            (c - b) * (c / b).ln()
        })
        .sum();

    if !score.is_finite() {
        warn!(score, "Non-finite PSI, treating as no drift");
        return 0.0;
    }

    // Each term is non-negative; clamp away rounding noise
    score.max(0.0)
}

/// Proportion of values per bin, bins being `[e_i, e_{i+1})`
fn bin_proportions(values: &[f64], interior_edges: &[f64]) -> Vec<f64> {
    let mut counts = vec![0usize; interior_edges.len() + 1];
    for &v in values {
        let idx = interior_edges.partition_point(|&edge| edge <= v);
        counts[idx] += 1;
    }

    let total = values.len() as f64;
    counts.into_iter().map(|c| c as f64 / total).collect()
}

/// Two-sample Kolmogorov-Smirnov test with asymptotic p-value
pub fn ks_test(baseline: &[f64], current: &[f64]) -> KsResult {
    let a = finite_sorted(baseline);
    let b = finite_sorted(current);

    if a.is_empty() || b.is_empty() {
        return KsResult::NEUTRAL;
    }

    let statistic = ks_statistic(&a, &b);

    let n = a.len() as f64;
    let m = b.len() as f64;
    let effective = (n * m / (n + m)).sqrt();
    let lambda = (effective + 0.12 + 0.11 / effective) * statistic;

    KsResult {
        statistic,
        p_value: kolmogorov_survival(lambda),
    }
}

/// Supremum ECDF distance over two sorted samples
fn ks_statistic(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    let m = b.len() as f64;
    let (mut i, mut j) = (0usize, 0usize);
    let mut d = 0.0f64;

    while i < a.len() && j < b.len() {
        let x = a[i].min(b[j]);
        // Step past every tie at x on both sides before comparing
        while i < a.len() && a[i] <= x {
            i += 1;
        }
        while j < b.len() && b[j] <= x {
            j += 1;
        }
        d = d.max((i as f64 / n - j as f64 / m).abs());
    }

    d.clamp(0.0, 1.0)
}

/// Q_KS(lambda) = 2 * sum_{k>=1} (-1)^{k-1} exp(-2 k^2 lambda^2)
fn kolmogorov_survival(lambda: f64) -> f64 {
    if !lambda.is_finite() || lambda <= 0.0 {
        return 1.0;
    }

    let a2 = -2.0 * lambda * lambda;
    let mut sign = 2.0;
    let mut sum = 0.0;
    let mut previous_term = 0.0f64;

    for k in 1..=100 {
        let kf = k as f64;
        let term = sign * (a2 * kf * kf).exp();
        sum += term;
        if term.abs() <= 1e-3 * previous_term || term.abs() <= 1e-8 * sum.abs() {
            return sum.clamp(0.0, 1.0);
        }
        sign = -sign;
        previous_term = term.abs();
    }

    // Series failed to converge: lambda is tiny and the samples are indistinguishable
    1.0
}

/// Location and spread summary of a sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

impl SummaryStats {
    /// Summary of the finite values, `None` when there are none
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let sorted = finite_sorted(values);
        if sorted.is_empty() {
            return None;
        }

        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        Some(Self {
            mean,
            std: variance.sqrt(),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            median,
        })
    }
}

/// Mean of the finite values, `None` when there are none
pub fn mean(values: &[f64]) -> Option<f64> {
    let (sum, count) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Relative change in percent, with the denominator smoothed by [`EPSILON`]
pub fn percent_change(baseline: f64, current: f64) -> f64 {
    (current - baseline) / (baseline + EPSILON) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn normal_sample(seed: u64, mean: f64, std: f64, n: usize) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let dist = Normal::new(mean, std).unwrap();
        (0..n).map(|_| dist.sample(&mut rng)).collect()
    }

    #[test]
    fn test_psi_identical_is_zero_for_all_bin_counts() {
        let x = normal_sample(7, 100.0, 15.0, 2_000);
        for bins in 2..=20 {
            assert!(psi(&x, &x, bins).abs() < 1e-12, "bins={}", bins);
        }
    }

    #[test]
    fn test_psi_empty_or_constant_is_zero() {
        assert_eq!(psi(&[], &[1.0, 2.0], 10), 0.0);
        assert_eq!(psi(&[1.0, 2.0], &[], 10), 0.0);
        assert_eq!(psi(&[f64::NAN, f64::NAN], &[1.0], 10), 0.0);
        assert_eq!(psi(&[3.0; 50], &[3.0; 20], 10), 0.0);
    }

    #[test]
    fn test_psi_non_negative() {
        for seed in 0..20 {
            let a = normal_sample(seed, 0.0, 1.0, 300);
            let b = normal_sample(seed + 100, (seed as f64) * 0.1, 1.0 + seed as f64 * 0.05, 200);
            assert!(psi(&a, &b, 10) >= 0.0);
        }
    }

    #[test]
    fn test_psi_monotone_in_shift() {
        let baseline = normal_sample(42, 100.0, 15.0, 10_000);
        let mut previous = 0.0;
        for shift in [0.0, 5.0, 15.0, 30.0, 60.0] {
            let current: Vec<f64> = normal_sample(43, 100.0, 15.0, 10_000)
                .into_iter()
                .map(|v| v + shift)
                .collect();
            let score = psi(&baseline, &current, 10);
            assert!(score + 1e-9 >= previous, "shift={} psi={} prev={}", shift, score, previous);
            previous = score;
        }
    }

    #[test]
    fn test_psi_large_shift_exceeds_high_band() {
        let baseline = normal_sample(42, 100.0, 15.0, 10_000);
        let current = normal_sample(43, 130.0, 20.0, 10_000);
        assert!(psi(&baseline, &current, 10) >= 0.5);
    }

    #[test]
    fn test_psi_captures_out_of_range_current() {
        let baseline: Vec<f64> = (0..100).map(|v| v as f64).collect();
        let current: Vec<f64> = (0..100).map(|v| 1_000.0 + v as f64).collect();
        // Every current value lands in the top bin, baseline mostly in the bottom
        assert!(psi(&baseline, &current, 10) > 1.0);
    }

    #[test]
    fn test_ks_identical_samples() {
        let x = normal_sample(1, 0.0, 1.0, 500);
        let result = ks_test(&x, &x);
        assert_eq!(result.statistic, 0.0);
        assert_eq!(result.p_value, 1.0);
    }

    #[test]
    fn test_ks_empty_is_neutral() {
        assert_eq!(ks_test(&[], &[1.0]), KsResult::NEUTRAL);
        assert_eq!(ks_test(&[1.0], &[f64::NAN]), KsResult::NEUTRAL);
    }

    #[test]
    fn test_ks_disjoint_samples() {
        let a: Vec<f64> = (0..200).map(|v| v as f64).collect();
        let b: Vec<f64> = (0..200).map(|v| 1_000.0 + v as f64).collect();
        let result = ks_test(&a, &b);
        assert!((result.statistic - 1.0).abs() < 1e-12);
        assert!(result.p_value < 1e-10);
    }

    #[test]
    fn test_ks_bounds_hold() {
        for seed in 0..20 {
            let a = normal_sample(seed, 0.0, 1.0, 50 + seed as usize * 10);
            let b = normal_sample(seed + 500, 0.3, 1.2, 40 + seed as usize * 7);
            let result = ks_test(&a, &b);
            assert!((0.0..=1.0).contains(&result.statistic));
            assert!((0.0..=1.0).contains(&result.p_value));
        }
    }

    #[test]
    fn test_ks_handles_ties() {
        // Identical discrete distributions must not report a distance
        let a = vec![0.0, 0.0, 1.0, 1.0];
        let b = vec![0.0, 1.0];
        assert_eq!(ks_test(&a, &b).statistic, 0.0);
    }

    #[test]
    fn test_ks_same_distribution_not_significant() {
        let a = normal_sample(10, 0.0, 1.0, 2_000);
        let b = normal_sample(11, 0.0, 1.0, 2_000);
        assert!(ks_test(&a, &b).p_value > 0.001);
    }

    #[test]
    fn test_summary_stats() {
        let stats = SummaryStats::from_values(&[4.0, 1.0, f64::NAN, 3.0, 2.0]).unwrap();
        assert_eq!(stats.mean, 2.5);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);
        assert_eq!(stats.median, 2.5);
        assert!((stats.std - 1.25f64.sqrt()).abs() < 1e-12);

        assert!(SummaryStats::from_values(&[]).is_none());
    }

    #[test]
    fn test_mean_and_percent_change() {
        assert_eq!(mean(&[1.0, 3.0, f64::NAN]), Some(2.0));
        assert_eq!(mean(&[]), None);
        assert!((percent_change(50.0, 65.0) - 30.0).abs() < 1e-6);
        assert!(percent_change(0.0, 1.0).is_finite());
    }
}
