//! Data point extraction from OTLP metrics
//!
//! Flattens one OTLP metric into vendor data points. Resource dimensions
//! come first; point attributes override them in place.
//!
//! Type mapping:
//! - Gauge: `gauge`
//! - Sum: `cumulative_counter` when monotonic and cumulative, `counter` when
//!   monotonic and delta, `gauge` otherwise
//! - Histogram: `<name>_count`, `<name>_sum` and one `<name>_bucket` point
//!   per bucket (cumulative counts, `upper_bound` dimension)
//! - Summary: `<name>_count`, `<name>_sum` and one `<name>_quantile` gauge
//!   per quantile (`quantile` dimension)
//! - ExponentialHistogram: not supported, skipped

use opentelemetry_proto::tonic::common::v1::KeyValue;
use opentelemetry_proto::tonic::metrics::v1::{
    AggregationTemporality, HistogramDataPoint, Metric, NumberDataPoint, SummaryDataPoint,
    metric::Data, number_data_point,
};

use crate::core::constants::{
    BUCKET_SUFFIX, COUNT_SUFFIX, INFINITY_BOUND, QUANTILE_DIMENSION, QUANTILE_SUFFIX,
    SUM_SUFFIX, UPPER_BOUND_DIMENSION,
};
use crate::data::{DataPoint, Dimension, MetricType, Value};
use crate::utils::otlp::attributes_to_dimensions;
use crate::utils::time::nanos_to_datetime;

/// Extract all data points of one metric
pub fn extract_data_points(metric: &Metric, resource_dims: &[Dimension]) -> Vec<DataPoint> {
    let mut result = Vec::new();
    let Some(ref data) = metric.data else {
        tracing::trace!(metric = %metric.name, "Metric without data");
        return result;
    };

    match data {
        Data::Gauge(g) => {
            for dp in &g.data_points {
                push_number_dp(&mut result, &metric.name, dp, MetricType::Gauge, resource_dims);
            }
        }
        Data::Sum(s) => {
            let metric_type = sum_metric_type(s.aggregation_temporality, s.is_monotonic);
            for dp in &s.data_points {
                push_number_dp(&mut result, &metric.name, dp, metric_type, resource_dims);
            }
        }
        Data::Histogram(h) => {
            let metric_type = counter_type(h.aggregation_temporality);
            for dp in &h.data_points {
                push_histogram_dp(&mut result, &metric.name, dp, metric_type, resource_dims);
            }
        }
        Data::Summary(s) => {
            for dp in &s.data_points {
                push_summary_dp(&mut result, &metric.name, dp, resource_dims);
            }
        }
        Data::ExponentialHistogram(_) => {
            tracing::warn!(
                metric = %metric.name,
                "Exponential histograms are not supported, metric skipped"
            );
        }
    }

    result
}

fn sum_metric_type(temporality: i32, is_monotonic: bool) -> MetricType {
    if !is_monotonic {
        return MetricType::Gauge;
    }
    match AggregationTemporality::try_from(temporality) {
        Ok(AggregationTemporality::Cumulative) => MetricType::CumulativeCounter,
        Ok(AggregationTemporality::Delta) => MetricType::Counter,
        _ => MetricType::Gauge,
    }
}

/// Counter type for histogram/summary counts and sums
fn counter_type(temporality: i32) -> MetricType {
    match AggregationTemporality::try_from(temporality) {
        Ok(AggregationTemporality::Delta) => MetricType::Counter,
        _ => MetricType::CumulativeCounter,
    }
}

/// Resource dimensions overlaid with point attributes
fn merge_dimensions(resource_dims: &[Dimension], attrs: &[KeyValue]) -> Vec<Dimension> {
    let mut dimensions = Vec::with_capacity(resource_dims.len() + attrs.len());
    dimensions.extend_from_slice(resource_dims);
    for attr in attributes_to_dimensions(attrs) {
        match dimensions.iter_mut().find(|d| d.key == attr.key) {
            Some(existing) => existing.value = attr.value,
            None => dimensions.push(attr),
        }
    }
    dimensions
}

fn push_number_dp(
    result: &mut Vec<DataPoint>,
    name: &str,
    dp: &NumberDataPoint,
    metric_type: MetricType,
    resource_dims: &[Dimension],
) {
    let value = match dp.value {
        Some(number_data_point::Value::AsInt(i)) => Value::Int(i),
        Some(number_data_point::Value::AsDouble(d)) => Value::Double(d),
        None => {
            tracing::trace!(metric = name, "Number data point without value");
            return;
        }
    };
    result.push(DataPoint {
        metric: name.to_string(),
        value,
        metric_type,
        timestamp: nanos_to_datetime(dp.time_unix_nano),
        dimensions: merge_dimensions(resource_dims, &dp.attributes),
    });
}

fn push_histogram_dp(
    result: &mut Vec<DataPoint>,
    name: &str,
    dp: &HistogramDataPoint,
    metric_type: MetricType,
    resource_dims: &[Dimension],
) {
    let timestamp = nanos_to_datetime(dp.time_unix_nano);
    let dimensions = merge_dimensions(resource_dims, &dp.attributes);

    result.push(DataPoint {
        metric: format!("{name}{COUNT_SUFFIX}"),
        value: Value::Int(count_value(dp.count)),
        metric_type,
        timestamp,
        dimensions: dimensions.clone(),
    });
    if let Some(sum) = dp.sum {
        result.push(DataPoint {
            metric: format!("{name}{SUM_SUFFIX}"),
            value: Value::Double(sum),
            metric_type,
            timestamp,
            dimensions: dimensions.clone(),
        });
    }

    // Bucket i covers (bounds[i-1], bounds[i]]; the extra last bucket is +Inf
    if !dp.bucket_counts.is_empty() && dp.bucket_counts.len() != dp.explicit_bounds.len() + 1 {
        tracing::debug!(
            metric = name,
            buckets = dp.bucket_counts.len(),
            bounds = dp.explicit_bounds.len(),
            "Histogram bucket counts do not match bounds, buckets skipped"
        );
        return;
    }
    let mut cumulative: u64 = 0;
    for (i, count) in dp.bucket_counts.iter().enumerate() {
        cumulative = cumulative.saturating_add(*count);
        let upper_bound = dp
            .explicit_bounds
            .get(i)
            .map(f64::to_string)
            .unwrap_or_else(|| INFINITY_BOUND.to_string());
        let mut bucket = DataPoint {
            metric: format!("{name}{BUCKET_SUFFIX}"),
            value: Value::Int(count_value(cumulative)),
            metric_type,
            timestamp,
            dimensions: dimensions.clone(),
        };
        bucket.set_dimension(UPPER_BOUND_DIMENSION, upper_bound);
        result.push(bucket);
    }
}

fn push_summary_dp(
    result: &mut Vec<DataPoint>,
    name: &str,
    dp: &SummaryDataPoint,
    resource_dims: &[Dimension],
) {
    let timestamp = nanos_to_datetime(dp.time_unix_nano);
    let dimensions = merge_dimensions(resource_dims, &dp.attributes);

    result.push(DataPoint {
        metric: format!("{name}{COUNT_SUFFIX}"),
        value: Value::Int(count_value(dp.count)),
        metric_type: MetricType::CumulativeCounter,
        timestamp,
        dimensions: dimensions.clone(),
    });
    result.push(DataPoint {
        metric: format!("{name}{SUM_SUFFIX}"),
        value: Value::Double(dp.sum),
        metric_type: MetricType::CumulativeCounter,
        timestamp,
        dimensions: dimensions.clone(),
    });
    for q in &dp.quantile_values {
        let mut quantile = DataPoint {
            metric: format!("{name}{QUANTILE_SUFFIX}"),
            value: Value::Double(q.value),
            metric_type: MetricType::Gauge,
            timestamp,
            dimensions: dimensions.clone(),
        };
        quantile.set_dimension(QUANTILE_DIMENSION, q.quantile.to_string());
        result.push(quantile);
    }
}

fn count_value(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}
