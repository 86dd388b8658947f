//! Vendor data point model
//!
//! One measurement as it leaves the translator: metric name, numeric value
//! with an explicit int/double kind, vendor metric type, ordered dimensions
//! and a timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// METRIC ENUMS
// ============================================================================

/// Vendor metric type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    #[default]
    Gauge,
    Counter,
    CumulativeCounter,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gauge => "gauge",
            Self::Counter => "counter",
            Self::CumulativeCounter => "cumulative_counter",
        }
    }
}

/// Numeric kind targeted by a `convert_values` rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Int,
    Double,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Double => "double",
        }
    }
}

// ============================================================================
// VALUE
// ============================================================================

/// Numeric value of a data point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Int(i64),
    Double(f64),
}

impl Value {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Int(i) => i as f64,
            Self::Double(d) => d,
        }
    }

    /// Convert to the given kind. Double to int truncates toward zero.
    pub fn convert(self, kind: ValueKind) -> Self {
        match (self, kind) {
            (Self::Int(i), ValueKind::Double) => Self::Double(i as f64),
            (Self::Double(d), ValueKind::Int) => Self::Int(d.trunc() as i64),
            (v, _) => v,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

// ============================================================================
// DIMENSIONS
// ============================================================================

/// A key/value label attached to a data point
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimension {
    pub key: String,
    pub value: String,
}

impl Dimension {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

// ============================================================================
// DATA POINT
// ============================================================================

/// A single vendor data point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub metric: String,
    pub value: Value,
    pub metric_type: MetricType,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub dimensions: Vec<Dimension>,
}

impl DataPoint {
    pub fn new(
        metric: impl Into<String>,
        value: impl Into<Value>,
        metric_type: MetricType,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            metric: metric.into(),
            value: value.into(),
            metric_type,
            timestamp,
            dimensions: Vec::new(),
        }
    }

    /// Builder-style dimension insert (replaces the value when the key exists)
    pub fn with_dimension(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_dimension(key, value);
        self
    }

    pub fn dimension(&self, key: &str) -> Option<&str> {
        self.dimensions
            .iter()
            .find(|d| d.key == key)
            .map(|d| d.value.as_str())
    }

    /// Insert or overwrite a dimension, keeping the position of an existing key
    pub fn set_dimension(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.dimensions.iter_mut().find(|d| d.key == key) {
            Some(existing) => existing.value = value,
            None => self.dimensions.push(Dimension { key, value }),
        }
    }

    /// Remove a dimension, returning its value
    pub fn remove_dimension(&mut self, key: &str) -> Option<String> {
        let idx = self.dimensions.iter().position(|d| d.key == key)?;
        Some(self.dimensions.remove(idx).value)
    }

    pub fn is_cumulative(&self) -> bool {
        self.metric_type == MetricType::CumulativeCounter
    }
}
