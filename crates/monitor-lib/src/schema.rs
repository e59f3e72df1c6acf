//! Feature schema and column-oriented samples
//!
//! Records arrive as loosely keyed feature maps. They are validated once
//! against a [`FeatureSchema`] at the store boundary and from then on live as
//! ordered columns in a [`FeatureSet`], so the drift code never deals with
//! ad hoc dictionaries.

use crate::error::{MonitorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value domain of a feature slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    /// Real-valued measurement
    Continuous,
    /// Integer counts or categorical codes
    Discrete,
    /// 0/1 indicator
    Binary,
}

/// A named, typed feature slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSlot {
    pub name: String,
    pub kind: FeatureKind,
}

impl FeatureSlot {
    pub fn new(name: impl Into<String>, kind: FeatureKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Ordered list of feature slots shared by records, samples and drift results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    slots: Vec<FeatureSlot>,
}

impl FeatureSchema {
    pub fn new(slots: Vec<FeatureSlot>) -> Self {
        Self { slots }
    }

    /// Schema of the card-transaction fraud model
    pub fn fraud_transactions() -> Self {
        use FeatureKind::*;
        Self::new(vec![
            FeatureSlot::new("amount", Continuous),
            FeatureSlot::new("hour_of_day", Discrete),
            FeatureSlot::new("day_of_week", Discrete),
            FeatureSlot::new("distance_from_home_km", Continuous),
            FeatureSlot::new("distance_from_last_txn_km", Continuous),
            FeatureSlot::new("time_since_last_txn_mins", Continuous),
            FeatureSlot::new("avg_amount_last_30d", Continuous),
            FeatureSlot::new("num_transactions_24h", Discrete),
            FeatureSlot::new("merchant_risk_score", Continuous),
            FeatureSlot::new("is_international", Binary),
            FeatureSlot::new("card_present", Binary),
            FeatureSlot::new("transaction_velocity", Continuous),
        ])
    }

    pub fn slots(&self) -> &[FeatureSlot] {
        &self.slots
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.name == name)
    }

    /// Validate a keyed feature map into a vector aligned with the schema.
    ///
    /// Keys outside the schema are rejected. Absent keys and non-finite
    /// values become missing observations.
    pub fn validate(&self, features: &BTreeMap<String, f64>) -> Result<FeatureVector> {
        if let Some(unknown) = features.keys().find(|k| self.index_of(k).is_none()) {
            return Err(MonitorError::InvalidRecord(format!(
                "unknown feature '{}'",
                unknown
            )));
        }

        let values = self
            .slots
            .iter()
            .map(|slot| {
                features
                    .get(&slot.name)
                    .copied()
                    .filter(|v| v.is_finite())
            })
            .collect();

        Ok(FeatureVector { values })
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::fraud_transactions()
    }
}

/// One record's features, aligned with a [`FeatureSchema`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector {
    pub values: Vec<Option<f64>>,
}

/// Ordered observations of a single feature or score; `None` marks a missing value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sample {
    observations: Vec<Option<f64>>,
}

impl Sample {
    pub fn new(observations: Vec<Option<f64>>) -> Self {
        Self { observations }
    }

    /// Build from raw values, treating NaN and infinities as missing
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            observations: values
                .into_iter()
                .map(|v| if v.is_finite() { Some(v) } else { None })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn observations(&self) -> &[Option<f64>] {
        &self.observations
    }

    /// Observed values with missing entries dropped
    pub fn cleaned(&self) -> Vec<f64> {
        self.observations
            .iter()
            .filter_map(|v| v.filter(|x| x.is_finite()))
            .collect()
    }

    pub fn push(&mut self, value: Option<f64>) {
        self.observations.push(value);
    }
}

impl FromIterator<f64> for Sample {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        Sample::from_values(iter)
    }
}

/// A named column of a [`FeatureSet`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureColumn {
    pub name: String,
    pub values: Sample,
}

/// Column-oriented feature samples for one window or for the baseline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    columns: Vec<FeatureColumn>,
}

impl FeatureSet {
    pub fn new(columns: Vec<FeatureColumn>) -> Self {
        Self { columns }
    }

    /// Empty columns for every slot of the schema
    pub fn empty(schema: &FeatureSchema) -> Self {
        Self {
            columns: schema
                .names()
                .map(|name| FeatureColumn {
                    name: name.to_string(),
                    values: Sample::default(),
                })
                .collect(),
        }
    }

    /// Transpose schema-aligned vectors into columns
    pub fn from_vectors<'a>(
        schema: &FeatureSchema,
        vectors: impl IntoIterator<Item = &'a FeatureVector>,
    ) -> Self {
        let mut set = Self::empty(schema);
        for vector in vectors {
            for (column, value) in set.columns.iter_mut().zip(vector.values.iter()) {
                column.values.push(*value);
            }
        }
        set
    }

    /// Add or replace a column
    pub fn insert(&mut self, name: impl Into<String>, values: Sample) {
        let name = name.into();
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(column) => column.values = values,
            None => self.columns.push(FeatureColumn { name, values }),
        }
    }

    pub fn column(&self, name: &str) -> Option<&Sample> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.values)
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Number of rows (length of the longest column)
    pub fn row_count(&self) -> usize {
        self.columns.iter().map(|c| c.values.len()).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }
}
