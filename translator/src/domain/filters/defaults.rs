//! Built-in exclude filters and exclude list resolution

use super::error::FilterError;
use super::metric_filter::MetricFilter;

/// Embedded default exclude table (compile-time)
const DEFAULT_EXCLUDE_METRICS_JSON: &str =
    include_str!("../../../data/default_exclude_metrics.json");

/// Parse the built-in exclude table
pub fn default_exclude_metrics() -> Result<Vec<MetricFilter>, FilterError> {
    serde_json::from_str(DEFAULT_EXCLUDE_METRICS_JSON)
        .map_err(|e| FilterError::ParseError(e.to_string()))
}

/// Resolve the effective exclude list.
///
/// - `None`: the built-in defaults
/// - `Some([])`: nothing is excluded
/// - `Some(list)`: the defaults followed by `list`
pub fn resolve_exclude_metrics(
    configured: Option<Vec<MetricFilter>>,
) -> Result<Vec<MetricFilter>, FilterError> {
    match configured {
        None => default_exclude_metrics(),
        Some(list) if list.is_empty() => Ok(list),
        Some(list) => {
            let mut resolved = default_exclude_metrics()?;
            resolved.extend(list);
            Ok(resolved)
        }
    }
}
