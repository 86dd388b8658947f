//! Exclude/include filtering of translated data points

mod defaults;
mod error;
mod filter_set;
mod metric_filter;
mod string_filter;

pub use defaults::{default_exclude_metrics, resolve_exclude_metrics};
pub use error::FilterError;
pub use filter_set::FilterSet;
pub use metric_filter::{DimensionValues, MetricFilter, MetricMatcher};
pub use string_filter::StringFilter;
