//! Metric filter definitions and their compiled matchers

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::FilterError;
use super::string_filter::StringFilter;
use crate::data::DataPoint;

/// One value or a list of values for a dimension constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DimensionValues {
    One(String),
    Many(Vec<String>),
}

impl DimensionValues {
    pub fn as_slice(&self) -> &[String] {
        match self {
            Self::One(value) => std::slice::from_ref(value),
            Self::Many(values) => values,
        }
    }
}

/// Declarative include/exclude filter.
///
/// A point matches when its metric name matches `metric_name` or any of
/// `metric_names` (if any are given) and every dimension constraint holds:
/// the key is present and its value matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metric_names: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dimensions: BTreeMap<String, DimensionValues>,
}

impl MetricFilter {
    pub fn for_metrics<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            metric_names: names.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_dimension(mut self, key: impl Into<String>, values: DimensionValues) -> Self {
        self.dimensions.insert(key.into(), values);
        self
    }

    fn names(&self) -> Vec<&str> {
        self.metric_name
            .iter()
            .chain(&self.metric_names)
            .map(String::as_str)
            .collect()
    }
}

/// Compiled form of a [`MetricFilter`]
#[derive(Debug)]
pub struct MetricMatcher {
    names: Option<StringFilter>,
    dimensions: Vec<(String, StringFilter)>,
}

impl MetricMatcher {
    pub fn new(filter: &MetricFilter) -> Result<Self, FilterError> {
        let names = filter.names();
        if names.is_empty() && filter.dimensions.is_empty() {
            return Err(FilterError::EmptyFilter);
        }

        let names = if names.is_empty() {
            None
        } else {
            Some(StringFilter::new(&names)?)
        };

        let dimensions = filter
            .dimensions
            .iter()
            .map(|(key, values)| {
                let values = values.as_slice();
                if values.is_empty() {
                    return Err(FilterError::EmptyDimensionValues { key: key.clone() });
                }
                Ok((key.clone(), StringFilter::new(values)?))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { names, dimensions })
    }

    pub fn matches(&self, dp: &DataPoint) -> bool {
        if let Some(names) = &self.names
            && !names.matches(&dp.metric)
        {
            return false;
        }
        self.dimensions.iter().all(|(key, values)| {
            dp.dimension(key)
                .is_some_and(|value| values.matches(value))
        })
    }
}
