//! Change reports produced by the change detector.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::weather::ConditionFamily;

/// Snapshot fields the change detector compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeField {
    Temperature,
    PrecipitationProbability,
    /// Used when either snapshot lacks a precipitation probability.
    PrecipitationAmount,
    WindSpeed,
    Condition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChangeValue {
    Numeric(f64),
    Condition(ConditionFamily),
}

/// One field whose change crossed its threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub field: ChangeField,
    pub old_value: ChangeValue,
    pub new_value: ChangeValue,
    /// Absolute delta for numeric fields, 1.0 for a condition change.
    pub magnitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeReport {
    pub entries: Vec<ChangeEntry>,
}

impl ChangeReport {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, field: ChangeField) -> bool {
        self.entries.iter().any(|e| e.field == field)
    }
}

/// A single alert event carrying every triggered entry of one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeAlert {
    pub location_name: String,
    pub detected_at: DateTime<Utc>,
    pub report: ChangeReport,
}
