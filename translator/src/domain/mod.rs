//! Domain logic for metric translation
//!
//! - `filters` - Exclude/include matching of translated data points
//! - `metrics` - OTLP resource metrics to data points
//! - `translation` - Rule engine and delta/rate state

pub mod filters;
pub mod metrics;
pub mod translation;

pub use filters::{FilterError, FilterSet, MetricFilter};
pub use metrics::{ConverterError, MetricsConverter};
pub use translation::{MetricTranslator, Rule, TranslationError};
