//! Synthetic card-transaction generator
//!
//! Produces labeled feature sets over the fraud-transaction schema, either
//! from the reference distributions or with a configurable drift applied.
//! Used as the cold-start baseline when nothing has been persisted yet.

use crate::error::{MonitorError, Result};
use crate::schema::{FeatureSchema, FeatureSet, Sample};
use rand::distributions::{Bernoulli, Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Beta, Exp, Gamma, Normal, Poisson};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const DEFAULT_FRAUD_RATE: f64 = 0.02;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_BASELINE_SAMPLES: usize = 10_000;

const FEATURE_COUNT: usize = 12;

/// Daytime-weighted hour distribution for legitimate traffic (hours 6..=22)
const LEGITIMATE_HOUR_WEIGHTS: [f64; 17] = [
    0.02, 0.03, 0.04, 0.06, 0.08, 0.09, 0.09, 0.08, 0.08, 0.07, 0.07, 0.06, 0.06, 0.05, 0.05,
    0.04, 0.03,
];

/// Shifts applied on top of the reference distributions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriftProfile {
    /// Relative increase of `amount`
    pub amount_shift: f64,
    /// Relative increase of `distance_from_home_km`
    pub distance_shift: f64,
    /// Fraud rate of the drifted traffic
    pub fraud_rate: f64,
    /// Forces this share of rows to be international
    #[serde(default)]
    pub international_rate: Option<f64>,
}

impl Default for DriftProfile {
    fn default() -> Self {
        Self {
            amount_shift: 0.3,
            distance_shift: 0.5,
            fraud_rate: 0.05,
            international_rate: None,
        }
    }
}

/// Generated feature columns with their fraud labels
#[derive(Debug, Clone)]
pub struct SyntheticBatch {
    pub features: FeatureSet,
    pub labels: Vec<u8>,
}

impl SyntheticBatch {
    pub fn fraud_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l == 1).count()
    }
}

/// Per-class sampling distributions, clipped to realistic ranges
struct TransactionProfile {
    amount: Gamma<f64>,
    amount_range: (f64, f64),
    hours: HourSampler,
    home_distance: Normal<f64>,
    home_distance_max: f64,
    last_txn_distance: Normal<f64>,
    last_txn_distance_max: f64,
    since_last_txn: Exp<f64>,
    avg_amount: Gamma<f64>,
    txn_count: Poisson<f64>,
    txn_count_max: f64,
    merchant_risk: Beta<f64>,
    international: Bernoulli,
    card_present: Bernoulli,
    velocity: Gamma<f64>,
    velocity_max: f64,
}

enum HourSampler {
    Weighted(WeightedIndex<f64>),
    Uniform,
}

fn param_error(e: impl std::fmt::Display) -> MonitorError {
    MonitorError::Baseline(format!("invalid synthetic distribution parameter: {}", e))
}

impl TransactionProfile {
    fn legitimate() -> Result<Self> {
        Ok(Self {
            amount: Gamma::new(2.0, 45.0).map_err(param_error)?,
            amount_range: (0.1, 5000.0),
            hours: HourSampler::Weighted(
                WeightedIndex::new(LEGITIMATE_HOUR_WEIGHTS).map_err(param_error)?,
            ),
            home_distance: Normal::new(8.0, 12.0).map_err(param_error)?,
            home_distance_max: 100.0,
            last_txn_distance: Normal::new(5.0, 8.0).map_err(param_error)?,
            last_txn_distance_max: 50.0,
            since_last_txn: Exp::new(1.0 / 120.0).map_err(param_error)?,
            avg_amount: Gamma::new(2.0, 40.0).map_err(param_error)?,
            txn_count: Poisson::new(3.0).map_err(param_error)?,
            txn_count_max: 20.0,
            merchant_risk: Beta::new(2.0, 8.0).map_err(param_error)?,
            international: Bernoulli::new(0.05).map_err(param_error)?,
            card_present: Bernoulli::new(0.85).map_err(param_error)?,
            velocity: Gamma::new(1.5, 0.5).map_err(param_error)?,
            velocity_max: 5.0,
        })
    }

    fn fraudulent() -> Result<Self> {
        Ok(Self {
            amount: Gamma::new(3.0, 80.0).map_err(param_error)?,
            amount_range: (50.0, 10_000.0),
            hours: HourSampler::Uniform,
            home_distance: Normal::new(45.0, 35.0).map_err(param_error)?,
            home_distance_max: 500.0,
            last_txn_distance: Normal::new(30.0, 40.0).map_err(param_error)?,
            last_txn_distance_max: 500.0,
            since_last_txn: Exp::new(1.0 / 30.0).map_err(param_error)?,
            avg_amount: Gamma::new(2.0, 40.0).map_err(param_error)?,
            txn_count: Poisson::new(8.0).map_err(param_error)?,
            txn_count_max: 50.0,
            merchant_risk: Beta::new(5.0, 2.0).map_err(param_error)?,
            international: Bernoulli::new(0.35).map_err(param_error)?,
            card_present: Bernoulli::new(0.25).map_err(param_error)?,
            velocity: Gamma::new(3.0, 1.0).map_err(param_error)?,
            velocity_max: 10.0,
        })
    }

    /// One row in fraud-schema order
    fn sample<R: Rng>(&self, rng: &mut R) -> [f64; FEATURE_COUNT] {
        let hour = match &self.hours {
            HourSampler::Weighted(index) => (6 + index.sample(rng)) as f64,
            HourSampler::Uniform => rng.gen_range(0..24) as f64,
        };

        [
            self.amount
                .sample(rng)
                .clamp(self.amount_range.0, self.amount_range.1),
            hour,
            rng.gen_range(0..7) as f64,
            self.home_distance
                .sample(rng)
                .abs()
                .min(self.home_distance_max),
            self.last_txn_distance
                .sample(rng)
                .abs()
                .min(self.last_txn_distance_max),
            self.since_last_txn.sample(rng).clamp(1.0, 1440.0),
            self.avg_amount.sample(rng).clamp(5.0, 3000.0),
            Distribution::<f64>::sample(&self.txn_count, rng).min(self.txn_count_max),
            self.merchant_risk.sample(rng).clamp(0.0, 1.0),
            self.international.sample(rng) as u8 as f64,
            self.card_present.sample(rng) as u8 as f64,
            self.velocity.sample(rng).clamp(0.0, self.velocity_max),
        ]
    }
}

/// Seeded generator of labeled synthetic transactions.
///
/// Every call draws from a fresh RNG seeded with the configured seed, so the
/// same generator always yields the same baseline.
#[derive(Debug, Clone)]
pub struct SyntheticGenerator {
    schema: FeatureSchema,
    seed: u64,
    fraud_rate: f64,
}

impl SyntheticGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            schema: FeatureSchema::fraud_transactions(),
            seed,
            fraud_rate: DEFAULT_FRAUD_RATE,
        }
    }

    pub fn with_fraud_rate(mut self, fraud_rate: f64) -> Self {
        self.fraud_rate = fraud_rate.clamp(0.0, 1.0);
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Reference traffic at the configured fraud rate
    pub fn generate_baseline(&self, n_samples: usize) -> Result<SyntheticBatch> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let batch = self.generate(&mut rng, n_samples, self.fraud_rate)?;
        info!(
            samples = n_samples,
            frauds = batch.fraud_count(),
            seed = self.seed,
            "Generated synthetic baseline"
        );
        Ok(batch)
    }

    /// Traffic with the profile's shifts applied.
    ///
    /// Draws from a stream distinct from the baseline so the two never share
    /// rows.
    pub fn generate_drifted(&self, n_samples: usize, profile: DriftProfile) -> Result<SyntheticBatch> {
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(1));
        let mut rows = self.generate_rows(&mut rng, n_samples, profile.fraud_rate)?;

        for (row, _) in rows.iter_mut() {
            row[0] *= 1.0 + profile.amount_shift;
            row[3] *= 1.0 + profile.distance_shift;
        }

        if let Some(rate) = profile.international_rate {
            let n_change = (rows.len() as f64 * rate.clamp(0.0, 1.0)) as usize;
            let mut indices: Vec<usize> = (0..rows.len()).collect();
            indices.shuffle(&mut rng);
            for &idx in indices.iter().take(n_change) {
                rows[idx].0[9] = 1.0;
            }
        }

        info!(
            samples = n_samples,
            amount_shift = profile.amount_shift,
            distance_shift = profile.distance_shift,
            fraud_rate = profile.fraud_rate,
            "Generated drifted synthetic traffic"
        );
        Ok(self.into_batch(rows))
    }

    fn generate(&self, rng: &mut StdRng, n_samples: usize, fraud_rate: f64) -> Result<SyntheticBatch> {
        let rows = self.generate_rows(rng, n_samples, fraud_rate)?;
        Ok(self.into_batch(rows))
    }

    fn generate_rows(
        &self,
        rng: &mut StdRng,
        n_samples: usize,
        fraud_rate: f64,
    ) -> Result<Vec<([f64; FEATURE_COUNT], u8)>> {
        let legitimate = TransactionProfile::legitimate()?;
        let fraudulent = TransactionProfile::fraudulent()?;

        let n_fraud = (n_samples as f64 * fraud_rate.clamp(0.0, 1.0)) as usize;
        let n_legitimate = n_samples - n_fraud;

        let mut rows = Vec::with_capacity(n_samples);
        for _ in 0..n_legitimate {
            rows.push((legitimate.sample(rng), 0u8));
        }
        for _ in 0..n_fraud {
            rows.push((fraudulent.sample(rng), 1u8));
        }
        rows.shuffle(rng);
        Ok(rows)
    }

    fn into_batch(&self, rows: Vec<([f64; FEATURE_COUNT], u8)>) -> SyntheticBatch {
        let mut features = FeatureSet::default();
        for (idx, name) in self.schema.names().enumerate() {
            features.insert(name, rows.iter().map(|(row, _)| row[idx]).collect::<Sample>());
        }
        let labels = rows.iter().map(|(_, label)| *label).collect();
        SyntheticBatch { features, labels }
    }
}

impl Default for SyntheticGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}
