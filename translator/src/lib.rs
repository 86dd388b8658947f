//! Rule-driven translation of OpenTelemetry metrics into SignalFx data points.
//!
//! The library never installs a `tracing` subscriber; callers do.

pub mod core;
pub mod data;
pub mod domain;
pub mod utils;

pub use crate::core::TranslatorConfig;
pub use data::{DataPoint, Dimension, DimensionSignature, MetricType, Value, ValueKind};
pub use domain::{
    ConverterError, FilterError, FilterSet, MetricFilter, MetricTranslator, MetricsConverter,
    Rule, TranslationError,
};
