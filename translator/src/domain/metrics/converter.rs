//! OTLP resource metrics to vendor data points
//!
//! Pipeline per metric: extraction, translation, exclude/include filtering,
//! dimension key sanitization. Each OTLP metric is translated as its own
//! batch, so successive observations of a cumulative series reported as
//! separate metric entries meet in the translator's delta cache.

use std::sync::Arc;

use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::metrics::v1::ResourceMetrics;

use super::error::ConverterError;
use super::extract::extract_data_points;
use crate::core::constants::DIMENSION_KEY_REPLACEMENT;
use crate::data::{DataPoint, Dimension};
use crate::domain::filters::{FilterSet, MetricFilter};
use crate::domain::translation::MetricTranslator;
use crate::utils::otlp::attributes_to_dimensions;

pub struct MetricsConverter {
    translator: Option<Arc<MetricTranslator>>,
    filters: FilterSet,
    /// Non-alphanumeric characters kept in dimension keys
    allowed_key_chars: Vec<char>,
}

impl MetricsConverter {
    /// Build a converter. `excludes` is the already resolved exclude list.
    pub fn new(
        translator: Option<Arc<MetricTranslator>>,
        excludes: &[MetricFilter],
        includes: &[MetricFilter],
        nonalphanumeric_dimension_chars: &str,
    ) -> Result<Self, ConverterError> {
        let filters = FilterSet::new(excludes, includes)?;
        tracing::debug!(
            translate = translator.is_some(),
            excludes = filters.exclude_count(),
            includes = filters.include_count(),
            "Created metrics converter"
        );
        Ok(Self {
            translator,
            filters,
            allowed_key_chars: nonalphanumeric_dimension_chars.chars().collect(),
        })
    }

    pub fn translator(&self) -> Option<&MetricTranslator> {
        self.translator.as_deref()
    }

    /// Convert every resource of an export request
    pub fn request_to_data_points(&self, request: &ExportMetricsServiceRequest) -> Vec<DataPoint> {
        request
            .resource_metrics
            .iter()
            .flat_map(|rm| self.metrics_to_data_points(rm))
            .collect()
    }

    /// Convert one resource's metrics
    pub fn metrics_to_data_points(&self, resource_metrics: &ResourceMetrics) -> Vec<DataPoint> {
        let resource_dims = resource_metrics
            .resource
            .as_ref()
            .map(|r| attributes_to_dimensions(&r.attributes))
            .unwrap_or_default();

        let mut result = Vec::new();
        for scope_metrics in &resource_metrics.scope_metrics {
            for metric in &scope_metrics.metrics {
                let points = extract_data_points(metric, &resource_dims);
                let points = self.translate(&metric.name, points);
                let points = self.filters.filter(points);
                result.extend(points.into_iter().map(|dp| self.sanitize(dp)));
            }
        }
        tracing::trace!(points = result.len(), "Converted resource metrics");
        result
    }

    /// Translate a batch, forwarding it untranslated when a rule rejects it.
    ///
    /// The untranslated copy is only kept when the rule list can reject a
    /// batch. Cumulative observations recorded before the rejecting rule
    /// stay in the delta cache, so the next batch still yields deltas.
    fn translate(&self, metric: &str, points: Vec<DataPoint>) -> Vec<DataPoint> {
        let Some(translator) = &self.translator else {
            return points;
        };
        if points.is_empty() {
            return points;
        }
        let fallback = translator.may_reject().then(|| points.clone());
        match translator.translate_data_points(points) {
            Ok(translated) => translated,
            Err(e) => {
                tracing::warn!(
                    metric,
                    error = %e,
                    "Translation failed, forwarding untranslated data points"
                );
                fallback.unwrap_or_default()
            }
        }
    }

    fn sanitize(&self, mut dp: DataPoint) -> DataPoint {
        for Dimension { key, .. } in &mut dp.dimensions {
            if key.chars().all(|c| self.is_allowed(c)) {
                continue;
            }
            *key = key
                .chars()
                .map(|c| {
                    if self.is_allowed(c) {
                        c
                    } else {
                        DIMENSION_KEY_REPLACEMENT
                    }
                })
                .collect();
        }
        dp
    }

    fn is_allowed(&self, c: char) -> bool {
        c.is_ascii_alphanumeric() || self.allowed_key_chars.contains(&c)
    }
}

#[cfg(test)]
#[path = "converter_tests.rs"]
mod tests;
