//! Post-translation exclude/include filtering

use super::error::FilterError;
use super::metric_filter::{MetricFilter, MetricMatcher};
use crate::data::DataPoint;

/// Exclude filters with include overrides.
///
/// A point is dropped when it matches an exclude filter and no include
/// filter. Include filters only rescue excluded points.
#[derive(Debug)]
pub struct FilterSet {
    excludes: Vec<MetricMatcher>,
    includes: Vec<MetricMatcher>,
}

impl FilterSet {
    pub fn new(excludes: &[MetricFilter], includes: &[MetricFilter]) -> Result<Self, FilterError> {
        Ok(Self {
            excludes: compile_all(excludes)?,
            includes: compile_all(includes)?,
        })
    }

    /// Filter set that keeps everything
    pub fn empty() -> Self {
        Self {
            excludes: Vec::new(),
            includes: Vec::new(),
        }
    }

    pub fn exclude_count(&self) -> usize {
        self.excludes.len()
    }

    pub fn include_count(&self) -> usize {
        self.includes.len()
    }

    pub fn should_exclude(&self, dp: &DataPoint) -> bool {
        self.excludes.iter().any(|f| f.matches(dp)) && !self.includes.iter().any(|f| f.matches(dp))
    }

    pub fn filter(&self, mut points: Vec<DataPoint>) -> Vec<DataPoint> {
        if self.excludes.is_empty() {
            return points;
        }
        let before = points.len();
        points.retain(|dp| !self.should_exclude(dp));
        let excluded = before - points.len();
        if excluded > 0 {
            tracing::trace!(excluded, remaining = points.len(), "Excluded data points");
        }
        points
    }
}

fn compile_all(filters: &[MetricFilter]) -> Result<Vec<MetricMatcher>, FilterError> {
    filters.iter().map(MetricMatcher::new).collect()
}
