//! Rule engine
//!
//! Applies an ordered rule list to a batch of data points. Each rule sees
//! the output of the rules before it. Rules that match nothing are no-ops.
//! Points that cannot produce output (missing operand, first observation of
//! a cumulative series) are skipped with a debug event, never an error.

use std::collections::HashMap;

use rustc_hash::{FxHashMap, FxHashSet};

use super::delta::DeltaCache;
use super::error::TranslationError;
use super::rules::{AggregationMethod, MetricOperator, Rule};
use crate::data::{DataPoint, DimensionSignature, MetricType, Value, ValueKind, dimension_set_key};

/// Interprets translation rules against data point batches.
///
/// Shared across threads: the rule list is immutable and the delta cache
/// serializes updates per series.
pub struct MetricTranslator {
    rules: Vec<Rule>,
    /// Unrestricted dimension key renames, for [`Self::translate_dimension`]
    dimensions_map: HashMap<String, String>,
    delta_cache: DeltaCache,
}

impl MetricTranslator {
    /// Validate the rules and build a translator.
    ///
    /// `delta_translation_ttl` is the maximum age in seconds of a previous
    /// cumulative observation used by `delta_metric` and `compute_rate`.
    pub fn new(rules: Vec<Rule>, delta_translation_ttl: u64) -> Result<Self, TranslationError> {
        if delta_translation_ttl == 0 {
            return Err(TranslationError::InvalidTtl);
        }
        for rule in &rules {
            rule.validate()?;
        }

        let dimensions_map = rules
            .iter()
            .find_map(|rule| match rule {
                Rule::RenameDimensionKeys {
                    mapping,
                    metric_names,
                } if metric_names.is_empty() => Some(mapping.clone()),
                _ => None,
            })
            .unwrap_or_default();

        tracing::debug!(
            rules = rules.len(),
            stateful = rules.iter().filter(|r| r.is_stateful()).count(),
            ttl_secs = delta_translation_ttl,
            "Created metric translator"
        );

        Ok(Self {
            rules,
            dimensions_map,
            delta_cache: DeltaCache::new(delta_translation_ttl),
        })
    }

    /// Whether `translate_data_points` can return an error.
    ///
    /// Only integer scaling rules reject points. Without them a batch
    /// always translates.
    pub fn may_reject(&self) -> bool {
        self.rules.iter().any(Rule::checks_value_kind)
    }

    /// Number of series tracked by the delta cache
    pub fn tracked_series(&self) -> usize {
        self.delta_cache.len()
    }

    /// Translated name of a dimension key, or the key itself when no
    /// unrestricted rename applies
    pub fn translate_dimension<'a>(&'a self, key: &'a str) -> &'a str {
        self.dimensions_map
            .get(key)
            .map(String::as_str)
            .unwrap_or(key)
    }

    /// Run every rule, in order, over the batch.
    ///
    /// On error the batch is consumed. Delta cache updates made by stateful
    /// rules that ran before the failing rule stay committed.
    pub fn translate_data_points(
        &self,
        points: Vec<DataPoint>,
    ) -> Result<Vec<DataPoint>, TranslationError> {
        let mut points = points;
        for rule in &self.rules {
            points = self.apply(rule, points)?;
            tracing::trace!(
                action = rule.action(),
                points = points.len(),
                "Applied translation rule"
            );
        }
        Ok(points)
    }

    fn apply(
        &self,
        rule: &Rule,
        mut points: Vec<DataPoint>,
    ) -> Result<Vec<DataPoint>, TranslationError> {
        match rule {
            Rule::RenameDimensionKeys {
                mapping,
                metric_names,
            } => {
                for dp in points
                    .iter_mut()
                    .filter(|dp| matches_names(metric_names, &dp.metric))
                {
                    rename_dimension_keys(dp, mapping);
                }
            }
            Rule::RenameMetrics { mapping } => {
                for dp in &mut points {
                    if let Some(new_name) = mapping.get(&dp.metric) {
                        dp.metric = new_name.clone();
                    }
                }
            }
            Rule::MultiplyInt { scale_factors_int } => {
                scale_int(rule.action(), &mut points, scale_factors_int, |v, f| {
                    v.saturating_mul(f)
                })?;
            }
            Rule::DivideInt { scale_factors_int } => {
                scale_int(rule.action(), &mut points, scale_factors_int, |v, f| {
                    v.wrapping_div(f)
                })?;
            }
            Rule::MultiplyFloat {
                scale_factors_float,
            } => {
                for dp in &mut points {
                    if let Some(factor) = scale_factors_float.get(&dp.metric) {
                        dp.value = Value::Double(dp.value.as_f64() * factor);
                    }
                }
            }
            Rule::ConvertValues { types_mapping } => {
                for dp in &mut points {
                    if let Some(kind) = types_mapping.get(&dp.metric) {
                        dp.value = dp.value.convert(*kind);
                    }
                }
            }
            Rule::CopyMetrics {
                mapping,
                dimension_key,
                dimension_values,
            } => {
                let copies = copy_metrics(
                    &points,
                    mapping,
                    dimension_key.as_deref(),
                    dimension_values,
                );
                points.extend(copies);
            }
            Rule::SplitMetric {
                metric_name,
                dimension_key,
                mapping,
            } => {
                let derived = split_metric(&points, metric_name, dimension_key, mapping);
                points.extend(derived);
            }
            Rule::AggregateMetric {
                metric_name,
                aggregation_method,
                without_dimensions,
                dimensions,
            } => {
                let selection = if without_dimensions.is_empty() {
                    DimensionSelection::Keep(dimensions)
                } else {
                    DimensionSelection::Without(without_dimensions)
                };
                points = aggregate_metric(points, metric_name, *aggregation_method, selection);
            }
            Rule::CalculateNewMetric {
                metric_name,
                operand1_metric,
                operand2_metric,
                operator,
            } => {
                let derived = calculate_new_metric(
                    &points,
                    metric_name,
                    operand1_metric,
                    operand2_metric,
                    *operator,
                );
                points.extend(derived);
            }
            Rule::ComputeUtilization {
                metric_name,
                used_metrics,
                free_metrics,
            } => {
                let derived = compute_utilization(&points, metric_name, used_metrics, free_metrics);
                points.extend(derived);
            }
            Rule::DeltaMetric { mapping } => {
                let derived = self.cumulative_derivatives(&points, mapping, Derivative::Delta);
                points.extend(derived);
            }
            Rule::ComputeRate { mapping } => {
                let derived = self.cumulative_derivatives(&points, mapping, Derivative::Rate);
                points.extend(derived);
            }
            Rule::DropMetrics { metric_names } => {
                points.retain(|dp| !metric_names.contains(&dp.metric));
            }
            Rule::DropDimensions {
                metric_names,
                dimension_pairs,
            } => {
                for dp in points
                    .iter_mut()
                    .filter(|dp| matches_names(metric_names, &dp.metric))
                {
                    dp.dimensions
                        .retain(|d| match dimension_pairs.get(&d.key) {
                            Some(values) => !values.is_empty() && !values.contains(&d.value),
                            None => true,
                        });
                }
            }
        }
        Ok(points)
    }

    /// New points derived from cumulative counters through the delta cache.
    ///
    /// The cache key is the derived series (target name plus dimensions), so
    /// two rules reading the same source never share state.
    fn cumulative_derivatives(
        &self,
        points: &[DataPoint],
        mapping: &HashMap<String, String>,
        derivative: Derivative,
    ) -> Vec<DataPoint> {
        let mut derived = Vec::new();
        for dp in points {
            let Some(target) = mapping.get(&dp.metric) else {
                continue;
            };
            if !dp.is_cumulative() {
                tracing::trace!(
                    metric = %dp.metric,
                    metric_type = dp.metric_type.as_str(),
                    "Skipping non-cumulative point"
                );
                continue;
            }

            let signature = DimensionSignature::new(target, &dp.dimensions);
            let value = match derivative {
                Derivative::Delta => self.delta_cache.delta(&signature, dp.value, dp.timestamp),
                Derivative::Rate => self
                    .delta_cache
                    .rate(&signature, dp.value, dp.timestamp)
                    .map(Value::Double),
            };
            match value {
                Some(value) => derived.push(DataPoint {
                    metric: target.clone(),
                    value,
                    metric_type: MetricType::Gauge,
                    timestamp: dp.timestamp,
                    dimensions: dp.dimensions.clone(),
                }),
                None => tracing::debug!(
                    metric = %dp.metric,
                    target = %target,
                    "No previous observation, nothing emitted"
                ),
            }
        }
        derived
    }
}

#[derive(Debug, Clone, Copy)]
enum Derivative {
    Delta,
    Rate,
}

#[derive(Clone, Copy)]
enum DimensionSelection<'a> {
    Without(&'a [String]),
    Keep(&'a [String]),
}

fn matches_names(metric_names: &[String], metric: &str) -> bool {
    metric_names.is_empty() || metric_names.iter().any(|name| name == metric)
}

/// Rename keys in point order; a key renamed onto an existing one takes its
/// position and the later value wins.
fn rename_dimension_keys(dp: &mut DataPoint, mapping: &HashMap<String, String>) {
    if !dp.dimensions.iter().any(|d| mapping.contains_key(&d.key)) {
        return;
    }
    let dimensions = std::mem::take(&mut dp.dimensions);
    for d in dimensions {
        let key = mapping.get(&d.key).cloned().unwrap_or(d.key);
        dp.set_dimension(key, d.value);
    }
}

fn scale_int(
    action: &'static str,
    points: &mut [DataPoint],
    factors: &HashMap<String, i64>,
    scale: impl Fn(i64, i64) -> i64,
) -> Result<(), TranslationError> {
    for dp in points {
        let Some(factor) = factors.get(&dp.metric) else {
            continue;
        };
        match dp.value {
            Value::Int(v) => dp.value = Value::Int(scale(v, *factor)),
            Value::Double(_) => {
                return Err(TranslationError::TypeMismatch {
                    action,
                    metric: dp.metric.clone(),
                    expected: ValueKind::Int.as_str(),
                });
            }
        }
    }
    Ok(())
}

fn copy_metrics(
    points: &[DataPoint],
    mapping: &HashMap<String, String>,
    dimension_key: Option<&str>,
    dimension_values: &[String],
) -> Vec<DataPoint> {
    points
        .iter()
        .filter_map(|dp| {
            let target = mapping.get(&dp.metric)?;
            if let Some(key) = dimension_key
                && !dp
                    .dimension(key)
                    .is_some_and(|value| dimension_values.iter().any(|v| v == value))
            {
                return None;
            }
            let mut copy = dp.clone();
            copy.metric = target.clone();
            Some(copy)
        })
        .collect()
}

fn split_metric(
    points: &[DataPoint],
    metric_name: &str,
    dimension_key: &str,
    mapping: &HashMap<String, String>,
) -> Vec<DataPoint> {
    points
        .iter()
        .filter(|dp| dp.metric == metric_name)
        .filter_map(|dp| {
            let target = mapping.get(dp.dimension(dimension_key)?)?;
            let mut derived = dp.clone();
            derived.metric = target.clone();
            derived.remove_dimension(dimension_key);
            Some(derived)
        })
        .collect()
}

/// Collapse points of `metric_name` that share a dimension set once the
/// selected keys are removed. Results follow the non-matching points, in
/// first-seen group order.
fn aggregate_metric(
    points: Vec<DataPoint>,
    metric_name: &str,
    method: AggregationMethod,
    selection: DimensionSelection<'_>,
) -> Vec<DataPoint> {
    let (matching, mut output): (Vec<_>, Vec<_>) =
        points.into_iter().partition(|dp| dp.metric == metric_name);
    if matching.is_empty() {
        return output;
    }

    let mut groups: Vec<Vec<DataPoint>> = Vec::new();
    let mut index: FxHashMap<String, usize> = FxHashMap::default();
    for mut dp in matching {
        match selection {
            DimensionSelection::Without(removed) => {
                dp.dimensions.retain(|d| !removed.contains(&d.key));
            }
            DimensionSelection::Keep(kept) => {
                if let Some(missing) = kept.iter().find(|key| dp.dimension(key).is_none()) {
                    tracing::debug!(
                        metric = %dp.metric,
                        dimension = %missing,
                        "Point lacks aggregation dimension, dropped"
                    );
                    continue;
                }
                dp.dimensions.retain(|d| kept.contains(&d.key));
            }
        }

        let key = dimension_set_key(&dp.dimensions);
        match index.get(&key) {
            Some(&i) => groups[i].push(dp),
            None => {
                index.insert(key, groups.len());
                groups.push(vec![dp]);
            }
        }
    }

    tracing::trace!(
        metric = metric_name,
        method = method.as_str(),
        groups = groups.len(),
        "Aggregated metric"
    );
    output.extend(
        groups
            .into_iter()
            .filter_map(|group| aggregate_group(group, method)),
    );
    output
}

fn aggregate_group(group: Vec<DataPoint>, method: AggregationMethod) -> Option<DataPoint> {
    let count = group.len();
    let sum = sum_values(group.iter().map(|dp| dp.value));
    let mut aggregated = group.into_iter().next()?;
    match method {
        AggregationMethod::Sum => aggregated.value = sum,
        AggregationMethod::Count => {
            aggregated.value = Value::Int(i64::try_from(count).unwrap_or(i64::MAX));
            aggregated.metric_type = MetricType::Gauge;
        }
        AggregationMethod::Avg => {
            aggregated.value = Value::Double(sum.as_f64() / count as f64);
            aggregated.metric_type = MetricType::Gauge;
        }
    }
    Some(aggregated)
}

/// Integer sums stay exact; any double member makes the sum a double
fn sum_values(values: impl Iterator<Item = Value>) -> Value {
    values.fold(Value::Int(0), |acc, value| match (acc, value) {
        (Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_add(b)),
        (a, b) => Value::Double(a.as_f64() + b.as_f64()),
    })
}

fn calculate_new_metric(
    points: &[DataPoint],
    metric_name: &str,
    operand1_metric: &str,
    operand2_metric: &str,
    operator: MetricOperator,
) -> Vec<DataPoint> {
    let mut operand2: FxHashMap<String, &DataPoint> = FxHashMap::default();
    for dp in points.iter().filter(|dp| dp.metric == operand2_metric) {
        operand2
            .entry(dimension_set_key(&dp.dimensions))
            .or_insert(dp);
    }

    let mut derived = Vec::new();
    for lhs in points.iter().filter(|dp| dp.metric == operand1_metric) {
        let Some(rhs) = operand2.get(&dimension_set_key(&lhs.dimensions)) else {
            tracing::debug!(
                metric = metric_name,
                operand = operand2_metric,
                "Missing second operand, nothing emitted"
            );
            continue;
        };
        let Some(value) = operator.apply(lhs.value.as_f64(), rhs.value.as_f64()) else {
            tracing::debug!(
                metric = metric_name,
                operator = %operator,
                operand = operand2_metric,
                "Division by zero, nothing emitted"
            );
            continue;
        };
        derived.push(DataPoint {
            metric: metric_name.to_string(),
            value: Value::Double(value),
            metric_type: MetricType::Gauge,
            timestamp: lhs.timestamp,
            dimensions: lhs.dimensions.clone(),
        });
    }
    derived
}

struct UtilizationGroup<'a> {
    first: &'a DataPoint,
    used: f64,
    free: f64,
    seen: FxHashSet<&'a str>,
}

fn compute_utilization(
    points: &[DataPoint],
    metric_name: &str,
    used_metrics: &[String],
    free_metrics: &[String],
) -> Vec<DataPoint> {
    let mut groups: Vec<UtilizationGroup<'_>> = Vec::new();
    let mut index: FxHashMap<String, usize> = FxHashMap::default();

    for dp in points {
        let is_used = used_metrics.contains(&dp.metric);
        if !is_used && !free_metrics.contains(&dp.metric) {
            continue;
        }
        let key = dimension_set_key(&dp.dimensions);
        let i = *index.entry(key).or_insert_with(|| {
            groups.push(UtilizationGroup {
                first: dp,
                used: 0.0,
                free: 0.0,
                seen: FxHashSet::default(),
            });
            groups.len() - 1
        });
        let group = &mut groups[i];
        if is_used {
            group.used += dp.value.as_f64();
        } else {
            group.free += dp.value.as_f64();
        }
        group.seen.insert(dp.metric.as_str());
    }

    groups
        .into_iter()
        .filter_map(|group| {
            let complete = used_metrics
                .iter()
                .chain(free_metrics)
                .all(|name| group.seen.contains(name.as_str()));
            if !complete {
                tracing::debug!(
                    metric = metric_name,
                    seen = group.seen.len(),
                    "Incomplete utilization sources, nothing emitted"
                );
                return None;
            }
            let total = group.used + group.free;
            if total == 0.0 {
                tracing::debug!(metric = metric_name, "Zero utilization total, nothing emitted");
                return None;
            }
            Some(DataPoint {
                metric: metric_name.to_string(),
                value: Value::Double(group.used / total * 100.0),
                metric_type: MetricType::Gauge,
                timestamp: group.first.timestamp,
                dimensions: group.first.dimensions.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
#[path = "translator_tests.rs"]
mod tests;
