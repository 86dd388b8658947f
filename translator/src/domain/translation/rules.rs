//! Translation rule definitions
//!
//! Rules are a closed set of actions, deserialized from an internally
//! tagged representation: `{"action": "rename_metrics", "mapping": {...}}`.
//! Each variant carries only the arguments its action needs.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::TranslationError;
use crate::data::ValueKind;

/// How `aggregate_metric` combines points that share a reduced dimension set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMethod {
    Sum,
    Count,
    Avg,
}

impl AggregationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Count => "count",
            Self::Avg => "avg",
        }
    }
}

/// Arithmetic operator for `calculate_new_metric`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricOperator {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
    #[serde(rename = "*")]
    Multiply,
    #[serde(rename = "/")]
    Divide,
}

impl MetricOperator {
    /// Apply the operator. Returns `None` on division by zero.
    pub fn apply(&self, lhs: f64, rhs: f64) -> Option<f64> {
        match self {
            Self::Add => Some(lhs + rhs),
            Self::Subtract => Some(lhs - rhs),
            Self::Multiply => Some(lhs * rhs),
            Self::Divide => (rhs != 0.0).then(|| lhs / rhs),
        }
    }
}

impl fmt::Display for MetricOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
        };
        f.write_str(op)
    }
}

/// A single translation rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Rule {
    /// Rename dimension keys, optionally only on the listed metrics
    RenameDimensionKeys {
        mapping: HashMap<String, String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        metric_names: Vec<String>,
    },
    RenameMetrics {
        mapping: HashMap<String, String>,
    },
    MultiplyInt {
        scale_factors_int: HashMap<String, i64>,
    },
    DivideInt {
        scale_factors_int: HashMap<String, i64>,
    },
    MultiplyFloat {
        scale_factors_float: HashMap<String, f64>,
    },
    ConvertValues {
        types_mapping: HashMap<String, ValueKind>,
    },
    /// Duplicate points under a new name, optionally only when a dimension
    /// has one of the listed values
    CopyMetrics {
        mapping: HashMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dimension_key: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        dimension_values: Vec<String>,
    },
    /// Derive a metric per value of `dimension_key`, dropping that dimension
    SplitMetric {
        metric_name: String,
        dimension_key: String,
        mapping: HashMap<String, String>,
    },
    AggregateMetric {
        metric_name: String,
        aggregation_method: AggregationMethod,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        without_dimensions: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        dimensions: Vec<String>,
    },
    CalculateNewMetric {
        metric_name: String,
        operand1_metric: String,
        operand2_metric: String,
        operator: MetricOperator,
    },
    /// `sum(used) / (sum(used) + sum(free)) * 100` per dimension set
    ComputeUtilization {
        metric_name: String,
        used_metrics: Vec<String>,
        free_metrics: Vec<String>,
    },
    DeltaMetric {
        mapping: HashMap<String, String>,
    },
    ComputeRate {
        mapping: HashMap<String, String>,
    },
    DropMetrics {
        metric_names: Vec<String>,
    },
    /// Remove dimensions; an empty value list drops the key whatever its value
    DropDimensions {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        metric_names: Vec<String>,
        dimension_pairs: HashMap<String, Vec<String>>,
    },
}

impl Rule {
    pub fn action(&self) -> &'static str {
        match self {
            Self::RenameDimensionKeys { .. } => "rename_dimension_keys",
            Self::RenameMetrics { .. } => "rename_metrics",
            Self::MultiplyInt { .. } => "multiply_int",
            Self::DivideInt { .. } => "divide_int",
            Self::MultiplyFloat { .. } => "multiply_float",
            Self::ConvertValues { .. } => "convert_values",
            Self::CopyMetrics { .. } => "copy_metrics",
            Self::SplitMetric { .. } => "split_metric",
            Self::AggregateMetric { .. } => "aggregate_metric",
            Self::CalculateNewMetric { .. } => "calculate_new_metric",
            Self::ComputeUtilization { .. } => "compute_utilization",
            Self::DeltaMetric { .. } => "delta_metric",
            Self::ComputeRate { .. } => "compute_rate",
            Self::DropMetrics { .. } => "drop_metrics",
            Self::DropDimensions { .. } => "drop_dimensions",
        }
    }

    /// Whether the rule reads or writes the delta cache
    pub fn is_stateful(&self) -> bool {
        matches!(self, Self::DeltaMetric { .. } | Self::ComputeRate { .. })
    }

    /// Whether the rule fails on a point of the wrong numeric kind
    pub fn checks_value_kind(&self) -> bool {
        matches!(self, Self::MultiplyInt { .. } | Self::DivideInt { .. })
    }

    /// Check that every required argument is present and well-formed
    pub fn validate(&self) -> Result<(), TranslationError> {
        let action = self.action();
        match self {
            Self::RenameDimensionKeys { mapping, .. }
            | Self::RenameMetrics { mapping }
            | Self::DeltaMetric { mapping }
            | Self::ComputeRate { mapping } => require_mapping(action, "mapping", mapping),
            Self::MultiplyInt { scale_factors_int } => {
                require_mapping(action, "scale_factors_int", scale_factors_int)
            }
            Self::DivideInt { scale_factors_int } => {
                require_mapping(action, "scale_factors_int", scale_factors_int)?;
                if let Some((metric, _)) = scale_factors_int.iter().find(|(_, f)| **f == 0) {
                    return Err(TranslationError::invalid(
                        action,
                        format!("scale factor for \"{metric}\" must not be zero"),
                    ));
                }
                Ok(())
            }
            Self::MultiplyFloat {
                scale_factors_float,
            } => require_mapping(action, "scale_factors_float", scale_factors_float),
            Self::ConvertValues { types_mapping } => {
                require_mapping(action, "types_mapping", types_mapping)
            }
            Self::CopyMetrics {
                mapping,
                dimension_key,
                dimension_values,
            } => {
                require_mapping(action, "mapping", mapping)?;
                match dimension_key.as_deref() {
                    Some("") => Err(TranslationError::invalid(
                        action,
                        "field \"dimension_key\" must not be empty",
                    )),
                    Some(_) if dimension_values.is_empty() => Err(TranslationError::invalid(
                        action,
                        "\"dimension_values\" is required when \"dimension_key\" is set",
                    )),
                    None if !dimension_values.is_empty() => Err(TranslationError::invalid(
                        action,
                        "\"dimension_key\" is required when \"dimension_values\" is set",
                    )),
                    _ => Ok(()),
                }
            }
            Self::SplitMetric {
                metric_name,
                dimension_key,
                mapping,
            } => {
                require_field(action, "metric_name", metric_name)?;
                require_field(action, "dimension_key", dimension_key)?;
                require_mapping(action, "mapping", mapping)
            }
            Self::AggregateMetric {
                metric_name,
                without_dimensions,
                dimensions,
                ..
            } => {
                require_field(action, "metric_name", metric_name)?;
                match (without_dimensions.is_empty(), dimensions.is_empty()) {
                    (true, true) => Err(TranslationError::invalid(
                        action,
                        "one of \"without_dimensions\" or \"dimensions\" is required",
                    )),
                    (false, false) => Err(TranslationError::invalid(
                        action,
                        "\"without_dimensions\" and \"dimensions\" are mutually exclusive",
                    )),
                    _ => Ok(()),
                }
            }
            Self::CalculateNewMetric {
                metric_name,
                operand1_metric,
                operand2_metric,
                ..
            } => {
                require_field(action, "metric_name", metric_name)?;
                require_field(action, "operand1_metric", operand1_metric)?;
                require_field(action, "operand2_metric", operand2_metric)
            }
            Self::ComputeUtilization {
                metric_name,
                used_metrics,
                free_metrics,
            } => {
                require_field(action, "metric_name", metric_name)?;
                require_list(action, "used_metrics", used_metrics)?;
                require_list(action, "free_metrics", free_metrics)
            }
            Self::DropMetrics { metric_names } => require_list(action, "metric_names", metric_names),
            Self::DropDimensions {
                dimension_pairs, ..
            } => require_mapping(action, "dimension_pairs", dimension_pairs),
        }
    }
}

fn require_field(action: &'static str, field: &str, value: &str) -> Result<(), TranslationError> {
    if value.is_empty() {
        return Err(TranslationError::invalid(
            action,
            format!("field \"{field}\" is required"),
        ));
    }
    Ok(())
}

fn require_list(
    action: &'static str,
    field: &str,
    values: &[String],
) -> Result<(), TranslationError> {
    if values.is_empty() || values.iter().any(String::is_empty) {
        return Err(TranslationError::invalid(
            action,
            format!("field \"{field}\" must list at least one non-empty name"),
        ));
    }
    Ok(())
}

fn require_mapping<V>(
    action: &'static str,
    field: &str,
    mapping: &HashMap<String, V>,
) -> Result<(), TranslationError> {
    if mapping.is_empty() {
        return Err(TranslationError::invalid(
            action,
            format!("field \"{field}\" is required"),
        ));
    }
    Ok(())
}
